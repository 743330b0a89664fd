//! Caller identity passed explicitly to services that depend on it.

use crate::api::middleware::auth::AuthExtension;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub is_admin: bool,
}

impl RequestContext {
    /// No authenticated user (scheduler, CLI, public endpoints).
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }
}

impl From<&AuthExtension> for RequestContext {
    fn from(auth: &AuthExtension) -> Self {
        Self {
            user_id: Some(auth.user_id),
            username: Some(auth.username.clone()),
            is_admin: auth.is_admin,
        }
    }
}
