//! Password strength rules from the core settings.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PasswordPolicy {
    pub enabled: bool,
    pub min_length: usize,
    pub need_number: bool,
    pub need_letter: bool,
    pub need_caps: bool,
    pub need_symbol: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            min_length: 8,
            need_number: true,
            need_letter: true,
            need_caps: true,
            need_symbol: true,
        }
    }
}

impl PasswordPolicy {
    /// Every rule the password breaks, in a stable order.
    pub fn violations(&self, password: &str) -> Vec<&'static str> {
        let mut errors = Vec::new();
        if !self.enabled {
            return errors;
        }
        if password.chars().count() < self.min_length {
            errors.push("Password too short!");
        }
        if self.need_number && !password.chars().any(|c| c.is_ascii_digit()) {
            errors.push("Password must include at least a digit!");
        }
        if self.need_letter && !password.chars().any(|c| c.is_lowercase()) {
            errors.push("Password must include at least a lowercase letter!");
        }
        if self.need_caps && !password.chars().any(|c| c.is_uppercase()) {
            errors.push("Password must include at least a uppercase letter!");
        }
        if self.need_symbol && password.chars().all(|c| c.is_alphanumeric()) {
            errors.push("Password must include at least a symbol!");
        }
        errors
    }

    pub fn validate(&self, password: &str) -> Result<()> {
        let errors = self.violations(password);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors.join(" ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict() -> PasswordPolicy {
        PasswordPolicy {
            enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_policy_accepts_anything() {
        assert!(PasswordPolicy::default().validate("a").is_ok());
    }

    #[test]
    fn test_strong_password_passes() {
        assert!(strict().validate("Str0ng!Pass").is_ok());
    }

    #[test]
    fn test_each_rule_reported() {
        let policy = strict();
        assert_eq!(policy.violations("Ab1!"), vec!["Password too short!"]);
        assert_eq!(
            policy.violations("Abcdefg!"),
            vec!["Password must include at least a digit!"]
        );
        assert_eq!(
            policy.violations("ABCDEF1!"),
            vec!["Password must include at least a lowercase letter!"]
        );
        assert_eq!(
            policy.violations("abcdef1!"),
            vec!["Password must include at least a uppercase letter!"]
        );
        assert_eq!(
            policy.violations("Abcdefg1"),
            vec!["Password must include at least a symbol!"]
        );
    }

    #[test]
    fn test_validate_joins_messages() {
        let err = strict().validate("abc").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Password too short!"));
        assert!(message.contains("digit"));
    }
}
