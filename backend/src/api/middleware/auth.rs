//! Bearer authentication.
//!
//! Two credentials are accepted in the `Authorization` header:
//! - `Bearer <jwt>` issued by `POST /api/v1/auth/login`;
//! - `user_token <api_token>` carrying a user's API token.
//!
//! Either way the account is reloaded on every request: inactive or deleted
//! users are rejected and admin rights come from the current profile.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::api::SharedState;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::user::User;
use crate::store::UserStore;

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub username: String,
    pub is_admin: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthExtension {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
}

impl AuthExtension {
    pub fn for_user(user: &User, config: &Config) -> Self {
        Self {
            user_id: user.id,
            username: user.name.clone(),
            is_admin: user.profiles_id == config.admin_profile_id,
        }
    }

    /// Admins may act on anyone; others only on themselves.
    pub fn require_self_or_admin(&self, users_id: i64) -> Result<()> {
        if self.is_admin || self.user_id == users_id {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "You can only manage your own account".to_string(),
            ))
        }
    }
}

/// Issue an access token for the user.
pub fn issue_token(config: &Config, user: &User) -> Result<String> {
    let now = Utc::now().timestamp();
    let auth = AuthExtension::for_user(user, config);
    let claims = Claims {
        sub: auth.user_id,
        username: auth.username,
        is_admin: auth.is_admin,
        iat: now,
        exp: now + config.jwt_expiration_secs as i64,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?)
}

pub fn validate_token(config: &Config, token: &str) -> Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))?;
    Ok(data.claims)
}

async fn authenticate(state: &SharedState, header_value: &str) -> Result<AuthExtension> {
    if let Some(token) = header_value.strip_prefix("Bearer ") {
        let claims = validate_token(&state.config, token.trim())?;
        let user = state
            .store
            .get_user(claims.sub)
            .await?
            .filter(|u| u.is_active && !u.is_deleted)
            .ok_or_else(|| {
                AppError::Authentication("User account is disabled or deleted".to_string())
            })?;
        return Ok(AuthExtension::for_user(&user, &state.config));
    }
    if let Some(token) = header_value.strip_prefix("user_token ") {
        let user = state
            .users
            .get_by_token(token.trim(), "api_token")
            .await?
            .filter(|u| u.is_active && !u.is_deleted)
            .ok_or_else(|| AppError::Authentication("Invalid API token".to_string()))?;
        return Ok(AuthExtension::for_user(&user, &state.config));
    }
    Err(AppError::Unauthorized(
        "Unsupported authorization scheme".to_string(),
    ))
}

/// Require a valid credential and expose the caller as [`AuthExtension`].
pub async fn auth_middleware(
    State(state): State<SharedState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(header_value) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return AppError::Unauthorized("Missing Authorization header".to_string())
            .into_response();
    };

    match authenticate(&state, &header_value).await {
        Ok(auth) => {
            request.extensions_mut().insert(auth);
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(
                event = "auth_failure",
                path = %request.uri().path(),
                "Authentication failed: {}",
                e
            );
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::AuthType;

    fn user(profiles_id: i64) -> User {
        let now = Utc::now();
        User {
            id: 7,
            name: "glpi".into(),
            realname: None,
            firstname: None,
            phone: None,
            password: String::new(),
            password_last_update: None,
            password_forget_token: None,
            password_forget_token_date: None,
            personal_token: None,
            personal_token_date: None,
            api_token: None,
            api_token_date: None,
            authtype: AuthType::Local,
            auths_id: 0,
            is_active: true,
            is_deleted: false,
            entities_id: 0,
            profiles_id,
            timezone: None,
            date_creation: now,
            date_mod: now,
        }
    }

    #[test]
    fn test_token_roundtrip_carries_admin_flag() {
        let config = Config::for_tests();
        let token = issue_token(&config, &user(config.admin_profile_id)).unwrap();
        let claims = validate_token(&config, &token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "glpi");
        assert!(claims.is_admin);

        let token = issue_token(&config, &user(1)).unwrap();
        assert!(!validate_token(&config, &token).unwrap().is_admin);
    }

    #[test]
    fn test_token_signed_with_other_secret_rejected() {
        let config = Config::for_tests();
        let token = issue_token(&config, &user(1)).unwrap();
        let mut other = Config::for_tests();
        other.jwt_secret = "another-secret-another-secret-another".into();
        assert!(matches!(
            validate_token(&other, &token).unwrap_err(),
            AppError::Authentication(_)
        ));
    }

    #[test]
    fn test_self_or_admin() {
        let auth = AuthExtension {
            user_id: 3,
            username: "tech".into(),
            is_admin: false,
        };
        assert!(auth.require_self_or_admin(3).is_ok());
        assert!(auth.require_self_or_admin(4).is_err());
    }
}
