//! Global key/value settings, grouped by context (`core` or a plugin name).
//!
//! Secured keys are sealed with [`SecretBox`] before they reach the store and
//! opened again on read.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{AppError, Result};
use crate::services::encryption::SecretBox;
use crate::services::password_expiration::{
    PasswordExpirationSettings, DISABLED, MAX_DELAY_DAYS,
};
use crate::services::password_policy::PasswordPolicy;
use crate::store::{ConfigStore, Store};

pub const CORE_CONTEXT: &str = "core";

/// Keys stored encrypted.
pub const SECURED_KEYS: [&str; 3] = ["smtp_passwd", "proxy_passwd", "glpinetwork_registration_key"];

/// Integer settings and their accepted range.
const INTEGER_KEYS: [(&str, i32, i32); 4] = [
    ("password_expiration_delay", DISABLED, MAX_DELAY_DAYS),
    ("password_expiration_notice", DISABLED, MAX_DELAY_DAYS),
    ("password_expiration_lock_delay", DISABLED, MAX_DELAY_DAYS),
    ("password_min_length", 1, 1024),
];

/// Typed view of the core context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreSettings {
    pub use_notifications: bool,
    pub password_policy: PasswordPolicy,
    pub password_expiration: PasswordExpirationSettings,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            use_notifications: false,
            password_policy: PasswordPolicy::default(),
            password_expiration: PasswordExpirationSettings::default(),
        }
    }
}

pub fn is_secured(key: &str) -> bool {
    SECURED_KEYS.contains(&key)
}

fn as_setting_string(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        _ => Err(AppError::Validation(format!(
            "Setting '{}' must be a scalar value",
            key
        ))),
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim(), "1" | "true" | "yes" | "on")
}

pub struct SettingsService {
    store: Arc<dyn Store>,
    secret: SecretBox,
}

impl SettingsService {
    pub fn new(store: Arc<dyn Store>, secret: SecretBox) -> Self {
        Self { store, secret }
    }

    /// Every value of a context, secured keys decrypted.
    pub async fn get_context(&self, context: &str) -> Result<BTreeMap<String, String>> {
        let rows = self.store.get_config_values(context).await?;
        let mut values = BTreeMap::new();
        for (name, raw) in rows {
            let value = if is_secured(&name) && !raw.is_empty() {
                match self.secret.open(&raw) {
                    Ok(plain) => plain,
                    Err(e) => {
                        tracing::warn!("Unable to decrypt setting {}.{}: {}", context, name, e);
                        String::new()
                    }
                }
            } else {
                raw
            };
            values.insert(name, value);
        }
        Ok(values)
    }

    pub async fn get_value(&self, context: &str, name: &str) -> Result<Option<String>> {
        Ok(self.get_context(context).await?.remove(name))
    }

    /// Store the given values. `id` is ignored; returns the names written.
    pub async fn update(
        &self,
        context: &str,
        values: &BTreeMap<String, Value>,
    ) -> Result<Vec<String>> {
        let mut prepared = Vec::with_capacity(values.len());
        for (name, value) in values {
            if name == "id" {
                continue;
            }
            let raw = as_setting_string(name, value)?;
            let bounds = INTEGER_KEYS.iter().find(|(key, _, _)| *key == name);
            if let Some((_, min, max)) = bounds {
                let parsed: i32 = raw.trim().parse().map_err(|_| {
                    AppError::Validation(format!("Setting '{}' must be an integer", name))
                })?;
                if parsed < *min || parsed > *max {
                    return Err(AppError::Validation(format!(
                        "Setting '{}' must be between {} and {}",
                        name, min, max
                    )));
                }
            }
            let stored = if is_secured(name) && !raw.is_empty() {
                self.secret.seal(&raw)?
            } else {
                raw
            };
            prepared.push((name.clone(), stored));
        }

        for (name, stored) in &prepared {
            self.store.set_config_value(context, name, stored).await?;
        }
        tracing::info!("Updated {} setting(s) in context '{}'", prepared.len(), context);
        Ok(prepared.into_iter().map(|(name, _)| name).collect())
    }

    pub async fn core_settings(&self) -> Result<CoreSettings> {
        let values = self.store.get_config_values(CORE_CONTEXT).await?;
        let values: BTreeMap<String, String> = values.into_iter().collect();
        let defaults = CoreSettings::default();

        let int = |key: &str, default: i32| -> i32 {
            values
                .get(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };
        let flag = |key: &str, default: bool| -> bool {
            values.get(key).map(|v| parse_flag(v)).unwrap_or(default)
        };

        let policy = &defaults.password_policy;
        Ok(CoreSettings {
            use_notifications: flag("use_notifications", defaults.use_notifications),
            password_policy: PasswordPolicy {
                enabled: flag("use_password_security", policy.enabled),
                min_length: int("password_min_length", policy.min_length as i32).max(1) as usize,
                need_number: flag("password_need_number", policy.need_number),
                need_letter: flag("password_need_letter", policy.need_letter),
                need_caps: flag("password_need_caps", policy.need_caps),
                need_symbol: flag("password_need_symbol", policy.need_symbol),
            },
            password_expiration: PasswordExpirationSettings {
                delay: int("password_expiration_delay", DISABLED),
                notice: int("password_expiration_notice", DISABLED),
                lock_delay: int("password_expiration_lock_delay", DISABLED),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use serde_json::json;

    fn service() -> (Arc<MemoryStore>, SettingsService) {
        let store = Arc::new(MemoryStore::new());
        let service = SettingsService::new(store.clone(), SecretBox::generate());
        (store, service)
    }

    fn values(v: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(v).unwrap()
    }

    #[tokio::test]
    async fn test_secured_keys_are_encrypted_at_rest() {
        let (store, service) = service();
        service
            .update(
                CORE_CONTEXT,
                &values(json!({"smtp_passwd": "s3cret", "smtp_host": "mail.local"})),
            )
            .await
            .unwrap();

        let raw: BTreeMap<String, String> = store
            .get_config_values(CORE_CONTEXT)
            .await
            .unwrap()
            .into_iter()
            .collect();
        assert_ne!(raw["smtp_passwd"], "s3cret");
        assert_eq!(raw["smtp_host"], "mail.local");

        let decoded = service.get_context(CORE_CONTEXT).await.unwrap();
        assert_eq!(decoded["smtp_passwd"], "s3cret");
    }

    #[tokio::test]
    async fn test_id_is_ignored() {
        let (_, service) = service();
        let written = service
            .update("plugin", &values(json!({"id": 1, "enabled": true})))
            .await
            .unwrap();
        assert_eq!(written, vec!["enabled".to_string()]);
        let ctx = service.get_context("plugin").await.unwrap();
        assert_eq!(ctx.get("enabled").map(String::as_str), Some("1"));
        assert!(!ctx.contains_key("id"));
    }

    #[tokio::test]
    async fn test_integer_settings_validated() {
        let (_, service) = service();
        let err = service
            .update(
                CORE_CONTEXT,
                &values(json!({"password_expiration_delay": "soon"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service
            .update(
                CORE_CONTEXT,
                &values(json!({"password_expiration_notice": -5})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_integer_settings_bounded() {
        let (_, service) = service();
        for value in [json!(2147483647), json!(3000000000i64), json!(MAX_DELAY_DAYS + 1)] {
            let err = service
                .update(
                    CORE_CONTEXT,
                    &values(json!({"password_expiration_delay": value})),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert!(service.get_context(CORE_CONTEXT).await.unwrap().is_empty());

        service
            .update(
                CORE_CONTEXT,
                &values(json!({"password_expiration_lock_delay": MAX_DELAY_DAYS})),
            )
            .await
            .unwrap();
        let settings = service.core_settings().await.unwrap();
        assert_eq!(settings.password_expiration.lock_delay, MAX_DELAY_DAYS);
    }

    #[tokio::test]
    async fn test_core_settings_defaults() {
        let (_, service) = service();
        let settings = service.core_settings().await.unwrap();
        assert_eq!(settings, CoreSettings::default());
        assert!(!settings.password_expiration.is_enabled());
    }

    #[tokio::test]
    async fn test_core_settings_parsed() {
        let (_, service) = service();
        service
            .update(
                CORE_CONTEXT,
                &values(json!({
                    "use_notifications": true,
                    "use_password_security": "1",
                    "password_min_length": 12,
                    "password_need_symbol": false,
                    "password_expiration_delay": 50,
                    "password_expiration_notice": 20,
                })),
            )
            .await
            .unwrap();
        let settings = service.core_settings().await.unwrap();
        assert!(settings.use_notifications);
        assert!(settings.password_policy.enabled);
        assert_eq!(settings.password_policy.min_length, 12);
        assert!(!settings.password_policy.need_symbol);
        assert_eq!(settings.password_expiration.delay, 50);
        assert_eq!(settings.password_expiration.notice, 20);
        assert_eq!(settings.password_expiration.lock_delay, -1);
    }
}
