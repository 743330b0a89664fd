//! Authentication handlers: login, expired password change, lost password.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::api::middleware::auth::issue_token;
use crate::api::SharedState;
use crate::error::Result;
use crate::models::user::User;

#[derive(OpenApi)]
#[openapi(
    paths(login, change_password, forgot_password, reset_password),
    components(schemas(
        LoginRequest,
        LoginResponse,
        ChangePasswordRequest,
        ForgotPasswordRequest,
        ResetPasswordRequest,
        MessageResponse
    ))
)]
pub struct AuthApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/login", post(login))
        .route("/change-password", post(change_password))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the token expires.
    pub expires_in: u64,
    pub user: User,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub username: String,
    pub current_password: String,
    pub password: String,
    pub password2: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
    pub password2: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

fn login_response(state: &SharedState, user: User) -> Result<LoginResponse> {
    Ok(LoginResponse {
        access_token: issue_token(&state.config, &user)?,
        token_type: "Bearer".to_string(),
        expires_in: state.config.jwt_expiration_secs,
        user,
    })
}

/// POST /api/v1/auth/login
#[utoipa::path(
    post,
    path = "/login",
    context_path = "/api/v1/auth",
    tag = "auth",
    operation_id = "login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 401, description = "Invalid credentials or expired password", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let user = state
        .users
        .authenticate(&payload.username, &payload.password)
        .await?;
    tracing::info!(event = "login", users_id = user.id, "User logged in");
    Ok(Json(login_response(&state, user)?))
}

/// POST /api/v1/auth/change-password
#[utoipa::path(
    post,
    path = "/change-password",
    context_path = "/api/v1/auth",
    tag = "auth",
    operation_id = "change_expired_password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed, new session issued", body = LoginResponse),
        (status = 400, description = "Passwords differ or break the policy", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn change_password(
    State(state): State<SharedState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<LoginResponse>> {
    let user = state
        .users
        .change_expired_password(
            &payload.username,
            &payload.current_password,
            &payload.password,
            &payload.password2,
        )
        .await?;
    Ok(Json(login_response(&state, user)?))
}

/// POST /api/v1/auth/forgot-password
#[utoipa::path(
    post,
    path = "/forgot-password",
    context_path = "/api/v1/auth",
    tag = "auth",
    operation_id = "forgot_password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset token sent", body = MessageResponse),
        (status = 404, description = "No single user owns this address", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn forgot_password(
    State(state): State<SharedState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    state.users.forget_password(payload.email.trim()).await?;
    Ok(Json(MessageResponse {
        message: "An email has been sent to your email address.".to_string(),
    }))
}

/// POST /api/v1/auth/reset-password
#[utoipa::path(
    post,
    path = "/reset-password",
    context_path = "/api/v1/auth",
    tag = "auth",
    operation_id = "reset_password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = crate::api::openapi::ErrorResponse),
    )
)]
pub async fn reset_password(
    State(state): State<SharedState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    state
        .users
        .update_forgotten_password(&payload.token, &payload.password, &payload.password2)
        .await?;
    Ok(Json(MessageResponse {
        message: "Reset password successful.".to_string(),
    }))
}
