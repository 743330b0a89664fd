//! Asset handlers, shared by every item type.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi};

use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::asset::{Asset, CreateAssetRequest, UpdateAssetRequest};
use crate::models::impact_relation::ImpactRelation;
use crate::models::itemtype::ItemType;
use crate::models::network_port::NetworkPort;
use crate::services::asset_service::AssetService;
use crate::services::impact_service::ImpactService;
use crate::services::network_port_service::NetworkPortService;
use crate::store::PurgeSummary;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_assets,
        create_asset,
        get_asset,
        update_asset,
        delete_asset,
        restore_asset,
        purge_asset,
        list_asset_ports,
        list_asset_impacts
    ),
    components(schemas(
        Asset,
        CreateAssetRequest,
        UpdateAssetRequest,
        ItemType,
        PurgeSummary
    ))
)]
pub struct AssetsApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_assets).post(create_asset))
        .route(
            "/:id",
            get(get_asset).put(update_asset).delete(delete_asset),
        )
        .route("/:id/restore", post(restore_asset))
        .route("/:id/purge", post(purge_asset))
        .route("/:id/ports", get(list_asset_ports))
        .route("/:id/impacts", get(list_asset_impacts))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListAssetsQuery {
    /// Restrict to one item type, e.g. `Computer`.
    pub itemtype: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

/// GET /api/v1/assets
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/assets",
    tag = "assets",
    operation_id = "list_assets",
    params(ListAssetsQuery),
    responses(
        (status = 200, description = "Matching assets", body = Vec<Asset>),
        (status = 400, description = "Unknown item type", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn list_assets(
    State(state): State<SharedState>,
    Query(query): Query<ListAssetsQuery>,
) -> Result<Json<Vec<Asset>>> {
    let itemtype = query
        .itemtype
        .as_deref()
        .map(str::parse::<ItemType>)
        .transpose()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let service = AssetService::new(state.store.clone());
    Ok(Json(service.list(itemtype, query.include_deleted).await?))
}

/// POST /api/v1/assets
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/assets",
    tag = "assets",
    operation_id = "create_asset",
    request_body = CreateAssetRequest,
    responses(
        (status = 201, description = "Asset created", body = Asset),
        (status = 400, description = "Validation error", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn create_asset(
    State(state): State<SharedState>,
    Json(payload): Json<CreateAssetRequest>,
) -> Result<(StatusCode, Json<Asset>)> {
    let service = AssetService::new(state.store.clone());
    Ok((StatusCode::CREATED, Json(service.create(payload).await?)))
}

/// GET /api/v1/assets/{id}
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/assets",
    tag = "assets",
    operation_id = "get_asset",
    params(("id" = i64, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Asset", body = Asset),
        (status = 404, description = "Unknown asset", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn get_asset(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<Asset>> {
    let service = AssetService::new(state.store.clone());
    Ok(Json(service.get(id).await?))
}

/// PUT /api/v1/assets/{id}
#[utoipa::path(
    put,
    path = "/{id}",
    context_path = "/api/v1/assets",
    tag = "assets",
    operation_id = "update_asset",
    params(("id" = i64, Path, description = "Asset id")),
    request_body = UpdateAssetRequest,
    responses((status = 200, description = "Updated asset", body = Asset)),
    security(("bearer_auth" = [])),
)]
pub async fn update_asset(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateAssetRequest>,
) -> Result<Json<Asset>> {
    let service = AssetService::new(state.store.clone());
    Ok(Json(service.update(id, payload).await?))
}

/// DELETE /api/v1/assets/{id}
///
/// Moves the asset to the trash; see `/purge` for removal.
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/assets",
    tag = "assets",
    operation_id = "delete_asset",
    params(("id" = i64, Path, description = "Asset id")),
    responses((status = 200, description = "Trashed asset", body = Asset)),
    security(("bearer_auth" = [])),
)]
pub async fn delete_asset(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<Asset>> {
    let service = AssetService::new(state.store.clone());
    Ok(Json(service.delete(id).await?))
}

/// POST /api/v1/assets/{id}/restore
#[utoipa::path(
    post,
    path = "/{id}/restore",
    context_path = "/api/v1/assets",
    tag = "assets",
    operation_id = "restore_asset",
    params(("id" = i64, Path, description = "Asset id")),
    responses((status = 200, description = "Restored asset", body = Asset)),
    security(("bearer_auth" = [])),
)]
pub async fn restore_asset(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<Asset>> {
    let service = AssetService::new(state.store.clone());
    Ok(Json(service.restore(id).await?))
}

/// POST /api/v1/assets/{id}/purge
#[utoipa::path(
    post,
    path = "/{id}/purge",
    context_path = "/api/v1/assets",
    tag = "assets",
    operation_id = "purge_asset",
    params(("id" = i64, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Relation rows removed with the asset", body = PurgeSummary),
        (status = 401, description = "Admin privileges required", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn purge_asset(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<Json<PurgeSummary>> {
    if !auth.is_admin {
        return Err(AppError::Unauthorized(
            "Admin privileges required".to_string(),
        ));
    }
    let service = AssetService::new(state.store.clone());
    Ok(Json(service.purge(id).await?))
}

/// GET /api/v1/assets/{id}/ports
#[utoipa::path(
    get,
    path = "/{id}/ports",
    context_path = "/api/v1/assets",
    tag = "assets",
    operation_id = "list_asset_ports",
    params(("id" = i64, Path, description = "Asset id")),
    responses((status = 200, description = "Network ports of the asset", body = Vec<NetworkPort>)),
    security(("bearer_auth" = [])),
)]
pub async fn list_asset_ports(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<NetworkPort>>> {
    let asset = AssetService::new(state.store.clone()).get(id).await?;
    let ports = NetworkPortService::new(state.store.clone())
        .list_for_item(asset.item_ref())
        .await?;
    Ok(Json(ports))
}

/// GET /api/v1/assets/{id}/impacts
#[utoipa::path(
    get,
    path = "/{id}/impacts",
    context_path = "/api/v1/assets",
    tag = "assets",
    operation_id = "list_asset_impacts",
    params(("id" = i64, Path, description = "Asset id")),
    responses((status = 200, description = "Impact relations on either side of the asset", body = Vec<ImpactRelation>)),
    security(("bearer_auth" = [])),
)]
pub async fn list_asset_impacts(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ImpactRelation>>> {
    let asset = AssetService::new(state.store.clone()).get(id).await?;
    let relations = ImpactService::new(state.store.clone())
        .list_for_item(asset.item_ref())
        .await?;
    Ok(Json(relations))
}
