//! Impact relation handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::impact_relation::{ImpactRelation, ImpactRelationInput};
use crate::services::impact_service::ImpactService;

#[derive(OpenApi)]
#[openapi(
    paths(create_impact, find_impact, delete_impact),
    components(schemas(ImpactRelation, ImpactRelationInput, ImpactLookupResponse))
)]
pub struct ImpactsApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(find_impact).post(create_impact))
        .route("/:id", delete(delete_impact))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImpactLookupResponse {
    pub id: i64,
}

/// POST /api/v1/impacts
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/impacts",
    tag = "impacts",
    operation_id = "create_impact",
    request_body = ImpactRelationInput,
    responses(
        (status = 201, description = "Relation recorded", body = ImpactRelation),
        (status = 400, description = "Incomplete, self-referencing or dangling relation", body = crate::api::openapi::ErrorResponse),
        (status = 409, description = "Relation already recorded", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn create_impact(
    State(state): State<SharedState>,
    Json(payload): Json<ImpactRelationInput>,
) -> Result<(StatusCode, Json<ImpactRelation>)> {
    let service = ImpactService::new(state.store.clone());
    Ok((StatusCode::CREATED, Json(service.create(&payload).await?)))
}

/// GET /api/v1/impacts?itemtype_source=..&items_id_source=..&itemtype_impacted=..&items_id_impacted=..
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/impacts",
    tag = "impacts",
    operation_id = "find_impact",
    params(
        ("itemtype_source" = Option<String>, Query, description = "Source item type"),
        ("items_id_source" = Option<i64>, Query, description = "Source item id"),
        ("itemtype_impacted" = Option<String>, Query, description = "Impacted item type"),
        ("items_id_impacted" = Option<i64>, Query, description = "Impacted item id"),
    ),
    responses(
        (status = 200, description = "Id of the matching relation", body = ImpactLookupResponse),
        (status = 404, description = "No such relation", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn find_impact(
    State(state): State<SharedState>,
    Query(query): Query<ImpactRelationInput>,
) -> Result<Json<ImpactLookupResponse>> {
    let service = ImpactService::new(state.store.clone());
    let id = service
        .id_from_input(&query)
        .await?
        .ok_or_else(|| AppError::NotFound("Impact relation not found".to_string()))?;
    Ok(Json(ImpactLookupResponse { id }))
}

/// DELETE /api/v1/impacts/{id}
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/impacts",
    tag = "impacts",
    operation_id = "delete_impact",
    params(("id" = i64, Path, description = "Relation id")),
    responses((status = 204, description = "Relation deleted")),
    security(("bearer_auth" = [])),
)]
pub async fn delete_impact(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let service = ImpactService::new(state.store.clone());
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
