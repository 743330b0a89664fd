//! Appliance item handlers.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::Result;
use crate::models::appliance::{AddApplianceItemRequest, ApplianceItem};
use crate::models::itemtype::ItemRef;
use crate::services::appliance_service::ApplianceService;
use crate::services::request_context::RequestContext;

#[derive(OpenApi)]
#[openapi(
    paths(list_items, add_item, count_items, remove_item),
    components(schemas(ApplianceItem, AddApplianceItemRequest, ItemCountResponse))
)]
pub struct AppliancesApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/:id/items", get(list_items).post(add_item))
        .route("/:id/items/count", get(count_items))
        .route("/items/:id", delete(remove_item))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ItemCountResponse {
    pub count: i64,
}

/// GET /api/v1/appliances/{id}/items
#[utoipa::path(
    get,
    path = "/{id}/items",
    context_path = "/api/v1/appliances",
    tag = "appliances",
    operation_id = "list_appliance_items",
    params(("id" = i64, Path, description = "Appliance id")),
    responses(
        (status = 200, description = "Attached items", body = Vec<ApplianceItem>),
        (status = 404, description = "Unknown appliance", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn list_items(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ApplianceItem>>> {
    let service = ApplianceService::new(state.store.clone());
    Ok(Json(service.list_items(id).await?))
}

/// POST /api/v1/appliances/{id}/items
#[utoipa::path(
    post,
    path = "/{id}/items",
    context_path = "/api/v1/appliances",
    tag = "appliances",
    operation_id = "add_appliance_item",
    params(("id" = i64, Path, description = "Appliance id")),
    request_body = AddApplianceItemRequest,
    responses(
        (status = 201, description = "Item attached", body = ApplianceItem),
        (status = 409, description = "Item already attached", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn add_item(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(payload): Json<AddApplianceItemRequest>,
) -> Result<(StatusCode, Json<ApplianceItem>)> {
    let service = ApplianceService::new(state.store.clone());
    let item = service
        .add_item(id, ItemRef::new(payload.itemtype, payload.items_id))
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// GET /api/v1/appliances/{id}/items/count
#[utoipa::path(
    get,
    path = "/{id}/items/count",
    context_path = "/api/v1/appliances",
    tag = "appliances",
    operation_id = "count_appliance_items",
    params(("id" = i64, Path, description = "Appliance id")),
    responses((status = 200, description = "Number of attached items", body = ItemCountResponse)),
    security(("bearer_auth" = [])),
)]
pub async fn count_items(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<Json<ItemCountResponse>> {
    let service = ApplianceService::new(state.store.clone());
    let count = service
        .count_for_main_item(&RequestContext::from(&auth), id)
        .await?;
    Ok(Json(ItemCountResponse { count }))
}

/// DELETE /api/v1/appliances/items/{id}
#[utoipa::path(
    delete,
    path = "/items/{id}",
    context_path = "/api/v1/appliances",
    tag = "appliances",
    operation_id = "remove_appliance_item",
    params(("id" = i64, Path, description = "Appliance item id")),
    responses((status = 204, description = "Item detached")),
    security(("bearer_auth" = [])),
)]
pub async fn remove_item(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let service = ApplianceService::new(state.store.clone());
    service.remove_item(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
