//! Maintenance mode middleware that blocks writes from non-admin users.

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::AppError;

/// Reject POST/PUT/DELETE/PATCH in maintenance mode unless the caller is an admin.
/// Must run after [`super::auth::auth_middleware`].
pub async fn maintenance_guard(
    State(state): State<SharedState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.maintenance_mode {
        return next.run(request).await;
    }

    let is_read_only = matches!(
        *request.method(),
        Method::GET | Method::HEAD | Method::OPTIONS
    );
    let is_admin = request
        .extensions()
        .get::<AuthExtension>()
        .map(|auth| auth.is_admin)
        .unwrap_or(false);

    if is_read_only || is_admin {
        return next.run(request).await;
    }

    AppError::Authorization(
        "The service is in maintenance mode, write operations are disabled".to_string(),
    )
    .into_response()
}
