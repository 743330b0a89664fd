//! Shared input validation helpers.
//!
//! Used by both handlers and services so that login and MAC address rules
//! are defined in one place.

use crate::error::{AppError, Result};

/// Punctuation allowed in a login besides letters and digits.
const LOGIN_PUNCTUATION: &str = "'@.-_ ";

/// Whether a login is acceptable: unicode letters and digits plus `' @ . - _` and space.
pub fn is_valid_login(login: &str) -> bool {
    !login.is_empty()
        && login
            .chars()
            .all(|c| c.is_alphanumeric() || LOGIN_PUNCTUATION.contains(c))
}

/// Require a non-blank name, returning it trimmed.
pub fn require_name(name: &str, label: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required", label)));
    }
    Ok(trimmed.to_string())
}

/// Normalize a MAC address to lowercase colon-separated octets.
///
/// Accepts `:`, `-` or `.` separators, or none at all.
pub fn normalize_mac(raw: &str) -> Result<String> {
    let hex: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect();
    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::Validation(format!(
            "Invalid MAC address '{}'",
            raw
        )));
    }
    let lower = hex.to_ascii_lowercase();
    let octets: Vec<&str> = (0..6).map(|i| &lower[i * 2..i * 2 + 2]).collect();
    Ok(octets.join(":"))
}
