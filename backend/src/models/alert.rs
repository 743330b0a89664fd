//! Alerts record that a notice was already sent for an item.

use serde::Serialize;

/// Alert kinds. Values match the persisted `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertKind {
    /// Password expiration notice sent to a user.
    PasswordExpiration,
}

impl AlertKind {
    pub fn code(&self) -> i32 {
        match self {
            AlertKind::PasswordExpiration => 1,
        }
    }
}

/// Item type recorded on alerts raised for users.
pub const USER_ALERT_ITEMTYPE: &str = "User";
