//! Line operator handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use utoipa::OpenApi;

use crate::api::SharedState;
use crate::error::Result;
use crate::models::line_operator::{LineOperator, LineOperatorInput};
use crate::services::line_operator_service::LineOperatorService;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_line_operators,
        create_line_operator,
        get_line_operator,
        update_line_operator,
        delete_line_operator
    ),
    components(schemas(LineOperator, LineOperatorInput))
)]
pub struct LineOperatorsApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_line_operators).post(create_line_operator))
        .route(
            "/:id",
            get(get_line_operator)
                .put(update_line_operator)
                .delete(delete_line_operator),
        )
}

/// GET /api/v1/line-operators
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/line-operators",
    tag = "line-operators",
    operation_id = "list_line_operators",
    responses((status = 200, description = "All line operators", body = Vec<LineOperator>)),
    security(("bearer_auth" = [])),
)]
pub async fn list_line_operators(
    State(state): State<SharedState>,
) -> Result<Json<Vec<LineOperator>>> {
    let service = LineOperatorService::new(state.store.clone());
    Ok(Json(service.list().await?))
}

/// POST /api/v1/line-operators
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/line-operators",
    tag = "line-operators",
    operation_id = "create_line_operator",
    request_body = LineOperatorInput,
    responses(
        (status = 201, description = "Line operator created", body = LineOperator),
        (status = 400, description = "Missing name or codes", body = crate::api::openapi::ErrorResponse),
        (status = 409, description = "MCC/MNC pair already used", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn create_line_operator(
    State(state): State<SharedState>,
    Json(payload): Json<LineOperatorInput>,
) -> Result<(StatusCode, Json<LineOperator>)> {
    let service = LineOperatorService::new(state.store.clone());
    Ok((StatusCode::CREATED, Json(service.create(payload).await?)))
}

/// GET /api/v1/line-operators/{id}
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/line-operators",
    tag = "line-operators",
    operation_id = "get_line_operator",
    params(("id" = i64, Path, description = "Line operator id")),
    responses((status = 200, description = "Line operator", body = LineOperator)),
    security(("bearer_auth" = [])),
)]
pub async fn get_line_operator(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<LineOperator>> {
    let service = LineOperatorService::new(state.store.clone());
    Ok(Json(service.get(id).await?))
}

/// PUT /api/v1/line-operators/{id}
#[utoipa::path(
    put,
    path = "/{id}",
    context_path = "/api/v1/line-operators",
    tag = "line-operators",
    operation_id = "update_line_operator",
    params(("id" = i64, Path, description = "Line operator id")),
    request_body = LineOperatorInput,
    responses((status = 200, description = "Updated line operator", body = LineOperator)),
    security(("bearer_auth" = [])),
)]
pub async fn update_line_operator(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(payload): Json<LineOperatorInput>,
) -> Result<Json<LineOperator>> {
    let service = LineOperatorService::new(state.store.clone());
    Ok(Json(service.update(id, payload).await?))
}

/// DELETE /api/v1/line-operators/{id}
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/line-operators",
    tag = "line-operators",
    operation_id = "delete_line_operator",
    params(("id" = i64, Path, description = "Line operator id")),
    responses((status = 204, description = "Line operator deleted")),
    security(("bearer_auth" = [])),
)]
pub async fn delete_line_operator(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let service = LineOperatorService::new(state.store.clone());
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
