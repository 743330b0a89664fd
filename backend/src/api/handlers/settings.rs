//! Configuration settings handlers (admin only).

use std::collections::BTreeMap;

use axum::{
    extract::{Extension, Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use utoipa::{OpenApi, ToSchema};

use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::services::settings_service::is_secured;

/// Placeholder returned instead of secured values.
const MASK: &str = "********";

#[derive(OpenApi)]
#[openapi(
    paths(get_settings, update_settings),
    components(schemas(SettingsResponse, UpdatedSettingsResponse))
)]
pub struct SettingsApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new().route("/:context", get(get_settings).put(update_settings))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SettingsResponse {
    pub context: String,
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdatedSettingsResponse {
    pub context: String,
    pub updated: Vec<String>,
}

fn mask_secured(values: BTreeMap<String, String>) -> BTreeMap<String, String> {
    values
        .into_iter()
        .map(|(name, value)| {
            if is_secured(&name) && !value.is_empty() {
                (name, MASK.to_string())
            } else {
                (name, value)
            }
        })
        .collect()
}

/// GET /api/v1/settings/{context}
#[utoipa::path(
    get,
    path = "/{context}",
    context_path = "/api/v1/settings",
    tag = "settings",
    operation_id = "get_settings",
    params(("context" = String, Path, description = "Settings context, e.g. `core`")),
    responses(
        (status = 200, description = "Values of the context, secrets masked", body = SettingsResponse),
        (status = 401, description = "Admin privileges required", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn get_settings(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(context): Path<String>,
) -> Result<Json<SettingsResponse>> {
    if !auth.is_admin {
        return Err(AppError::Unauthorized(
            "Admin privileges required".to_string(),
        ));
    }
    let values = state.settings.get_context(&context).await?;
    Ok(Json(SettingsResponse {
        context,
        values: mask_secured(values),
    }))
}

/// PUT /api/v1/settings/{context}
#[utoipa::path(
    put,
    path = "/{context}",
    context_path = "/api/v1/settings",
    tag = "settings",
    operation_id = "update_settings",
    params(("context" = String, Path, description = "Settings context, e.g. `core`")),
    request_body(content = BTreeMap<String, String>, description = "Setting names mapped to new values"),
    responses(
        (status = 200, description = "Names of the written settings", body = UpdatedSettingsResponse),
        (status = 400, description = "Invalid value", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn update_settings(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(context): Path<String>,
    Json(payload): Json<BTreeMap<String, Value>>,
) -> Result<Json<UpdatedSettingsResponse>> {
    if !auth.is_admin {
        return Err(AppError::Unauthorized(
            "Admin privileges required".to_string(),
        ));
    }
    let updated = state.settings.update(&context, &payload).await?;
    tracing::info!(
        event = "settings_updated",
        users_id = auth.user_id,
        context = %context,
        "Settings updated"
    );
    Ok(Json(UpdatedSettingsResponse { context, updated }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secured_hides_only_filled_secrets() {
        let values = BTreeMap::from([
            ("smtp_passwd".to_string(), "hunter2".to_string()),
            ("proxy_passwd".to_string(), String::new()),
            ("password_expiration_delay".to_string(), "30".to_string()),
        ]);
        let masked = mask_secured(values);
        assert_eq!(masked["smtp_passwd"], MASK);
        assert_eq!(masked["proxy_passwd"], "");
        assert_eq!(masked["password_expiration_delay"], "30");
    }
}
