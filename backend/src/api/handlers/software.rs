//! Software version and installation handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use utoipa::OpenApi;

use crate::api::SharedState;
use crate::error::Result;
use crate::models::itemtype::ItemRef;
use crate::models::software::{
    CreateSoftwareVersionRequest, InstallSoftwareRequest, SoftwareInstallation, SoftwareVersion,
};
use crate::services::software_service::SoftwareService;

#[derive(OpenApi)]
#[openapi(
    paths(list_versions, add_version, list_installations, install),
    components(schemas(
        SoftwareVersion,
        SoftwareInstallation,
        CreateSoftwareVersionRequest,
        InstallSoftwareRequest
    ))
)]
pub struct SoftwareApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/:id/versions", get(list_versions).post(add_version))
        .route(
            "/versions/:id/installations",
            get(list_installations).post(install),
        )
}

/// GET /api/v1/software/{id}/versions
#[utoipa::path(
    get,
    path = "/{id}/versions",
    context_path = "/api/v1/software",
    tag = "software",
    operation_id = "list_software_versions",
    params(("id" = i64, Path, description = "Software id")),
    responses((status = 200, description = "Versions of the software", body = Vec<SoftwareVersion>)),
    security(("bearer_auth" = [])),
)]
pub async fn list_versions(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<SoftwareVersion>>> {
    let service = SoftwareService::new(state.store.clone());
    Ok(Json(service.list_versions(id).await?))
}

/// POST /api/v1/software/{id}/versions
#[utoipa::path(
    post,
    path = "/{id}/versions",
    context_path = "/api/v1/software",
    tag = "software",
    operation_id = "add_software_version",
    params(("id" = i64, Path, description = "Software id")),
    request_body = CreateSoftwareVersionRequest,
    responses(
        (status = 201, description = "Version added", body = SoftwareVersion),
        (status = 404, description = "Unknown software", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn add_version(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateSoftwareVersionRequest>,
) -> Result<(StatusCode, Json<SoftwareVersion>)> {
    let service = SoftwareService::new(state.store.clone());
    Ok((StatusCode::CREATED, Json(service.add_version(id, payload).await?)))
}

/// GET /api/v1/software/versions/{id}/installations
#[utoipa::path(
    get,
    path = "/versions/{id}/installations",
    context_path = "/api/v1/software",
    tag = "software",
    operation_id = "list_software_installations",
    params(("id" = i64, Path, description = "Software version id")),
    responses((status = 200, description = "Items running this version", body = Vec<SoftwareInstallation>)),
    security(("bearer_auth" = [])),
)]
pub async fn list_installations(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<SoftwareInstallation>>> {
    let service = SoftwareService::new(state.store.clone());
    Ok(Json(service.list_installations(id).await?))
}

/// POST /api/v1/software/versions/{id}/installations
#[utoipa::path(
    post,
    path = "/versions/{id}/installations",
    context_path = "/api/v1/software",
    tag = "software",
    operation_id = "install_software",
    params(("id" = i64, Path, description = "Software version id")),
    request_body = InstallSoftwareRequest,
    responses(
        (status = 201, description = "Installation recorded", body = SoftwareInstallation),
        (status = 400, description = "Target cannot run software", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn install(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(payload): Json<InstallSoftwareRequest>,
) -> Result<(StatusCode, Json<SoftwareInstallation>)> {
    let service = SoftwareService::new(state.store.clone());
    let installation = service
        .install(id, ItemRef::new(payload.itemtype, payload.items_id))
        .await?;
    Ok((StatusCode::CREATED, Json(installation)))
}
