//! Password expiration arithmetic.
//!
//! All delays are in days; `-1` disables the corresponding step. Instants
//! that fall outside chrono's range are treated as "never".

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::user::User;

pub const DISABLED: i32 = -1;

/// Upper bound accepted for every expiration delay, in days.
pub const MAX_DELAY_DAYS: i32 = 36500;

/// `at` moved by `days`, or `None` when the result is out of range.
fn shift_days(at: DateTime<Utc>, days: i64) -> Option<DateTime<Utc>> {
    at.checked_add_signed(Duration::try_days(days)?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PasswordExpirationSettings {
    /// Days a password stays valid.
    pub delay: i32,
    /// Days before expiration when the user starts being told to change it.
    pub notice: i32,
    /// Days after expiration before the account is deactivated.
    pub lock_delay: i32,
}

impl Default for PasswordExpirationSettings {
    fn default() -> Self {
        Self {
            delay: DISABLED,
            notice: DISABLED,
            lock_delay: DISABLED,
        }
    }
}

impl PasswordExpirationSettings {
    pub fn is_enabled(&self) -> bool {
        self.delay != DISABLED
    }

    /// Passwords set before this instant are past the notice threshold.
    pub fn notice_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.is_enabled() || self.notice == DISABLED {
            return None;
        }
        shift_days(now, i64::from(self.notice) - i64::from(self.delay))
    }

    /// Passwords set before this instant belong to accounts that must be locked.
    pub fn lock_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.is_enabled() || self.lock_delay == DISABLED {
            return None;
        }
        shift_days(now, -(i64::from(self.delay) + i64::from(self.lock_delay)))
    }
}

pub fn expiration_time(
    password_last_update: Option<DateTime<Utc>>,
    settings: &PasswordExpirationSettings,
) -> Option<DateTime<Utc>> {
    if !settings.is_enabled() {
        return None;
    }
    password_last_update.and_then(|last| shift_days(last, i64::from(settings.delay)))
}

pub fn lock_time(
    password_last_update: Option<DateTime<Utc>>,
    settings: &PasswordExpirationSettings,
) -> Option<DateTime<Utc>> {
    if settings.lock_delay == DISABLED {
        return None;
    }
    expiration_time(password_last_update, settings)
        .and_then(|expires| shift_days(expires, i64::from(settings.lock_delay)))
}

pub fn has_password_expired(
    user: &User,
    settings: &PasswordExpirationSettings,
    now: DateTime<Utc>,
) -> bool {
    if !user.is_local() {
        return false;
    }
    expiration_time(user.password_last_update, settings)
        .map(|expires| expires < now)
        .unwrap_or(false)
}

pub fn should_change_password(
    user: &User,
    settings: &PasswordExpirationSettings,
    now: DateTime<Utc>,
) -> bool {
    if has_password_expired(user, settings, now) {
        return true;
    }
    if !user.is_local() || settings.notice == DISABLED {
        return false;
    }
    expiration_time(user.password_last_update, settings)
        .and_then(|expires| shift_days(expires, -i64::from(settings.notice)))
        .map(|notice_from| notice_from < now)
        .unwrap_or(false)
}
