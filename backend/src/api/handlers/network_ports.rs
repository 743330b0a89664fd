//! Network port handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use utoipa::OpenApi;

use crate::api::SharedState;
use crate::error::Result;
use crate::models::network_port::{CreateNetworkPortRequest, InstantiationType, NetworkPort};
use crate::services::network_port_service::NetworkPortService;

#[derive(OpenApi)]
#[openapi(
    paths(create_network_port, get_network_port, delete_network_port),
    components(schemas(NetworkPort, CreateNetworkPortRequest, InstantiationType))
)]
pub struct NetworkPortsApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(create_network_port))
        .route("/:id", get(get_network_port).delete(delete_network_port))
}

/// POST /api/v1/network-ports
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/network-ports",
    tag = "network-ports",
    operation_id = "create_network_port",
    request_body = CreateNetworkPortRequest,
    responses(
        (status = 201, description = "Port created", body = NetworkPort),
        (status = 400, description = "Unknown owner, instantiation type or bad MAC", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn create_network_port(
    State(state): State<SharedState>,
    Json(payload): Json<CreateNetworkPortRequest>,
) -> Result<(StatusCode, Json<NetworkPort>)> {
    let service = NetworkPortService::new(state.store.clone());
    Ok((StatusCode::CREATED, Json(service.create(payload).await?)))
}

/// GET /api/v1/network-ports/{id}
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/network-ports",
    tag = "network-ports",
    operation_id = "get_network_port",
    params(("id" = i64, Path, description = "Port id")),
    responses((status = 200, description = "Port", body = NetworkPort)),
    security(("bearer_auth" = [])),
)]
pub async fn get_network_port(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<NetworkPort>> {
    let service = NetworkPortService::new(state.store.clone());
    Ok(Json(service.get(id).await?))
}

/// DELETE /api/v1/network-ports/{id}
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/network-ports",
    tag = "network-ports",
    operation_id = "delete_network_port",
    params(("id" = i64, Path, description = "Port id")),
    responses((status = 204, description = "Port deleted")),
    security(("bearer_auth" = [])),
)]
pub async fn delete_network_port(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let service = NetworkPortService::new(state.store.clone());
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
