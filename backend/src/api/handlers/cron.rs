//! Cron task handlers (admin only).

use axum::{
    extract::{Extension, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi};

use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::cron_task::{CronMode, CronState, CronTask, CronTaskLog, UpdateCronTaskRequest};
use crate::services::cron_service::CronRun;

const DEFAULT_LOG_LIMIT: i64 = 50;

#[derive(OpenApi)]
#[openapi(
    paths(list_tasks, get_task, update_task, run_task, list_logs),
    components(schemas(
        CronTask,
        CronTaskLog,
        CronState,
        CronMode,
        UpdateCronTaskRequest,
        CronRun
    ))
)]
pub struct CronApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_tasks))
        .route("/:name", get(get_task).put(update_task))
        .route("/:name/run", post(run_task))
        .route("/:name/logs", get(list_logs))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LogsQuery {
    /// Maximum number of entries, newest first.
    pub limit: Option<i64>,
}

fn require_admin(auth: &AuthExtension) -> Result<()> {
    if !auth.is_admin {
        return Err(AppError::Unauthorized(
            "Admin privileges required".to_string(),
        ));
    }
    Ok(())
}

/// GET /api/v1/cron
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/cron",
    tag = "cron",
    operation_id = "list_cron_tasks",
    responses((status = 200, description = "Registered tasks", body = Vec<CronTask>)),
    security(("bearer_auth" = [])),
)]
pub async fn list_tasks(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
) -> Result<Json<Vec<CronTask>>> {
    require_admin(&auth)?;
    Ok(Json(state.cron.list().await?))
}

/// GET /api/v1/cron/{name}
#[utoipa::path(
    get,
    path = "/{name}",
    context_path = "/api/v1/cron",
    tag = "cron",
    operation_id = "get_cron_task",
    params(("name" = String, Path, description = "Task name, e.g. `passwordexpiration`")),
    responses(
        (status = 200, description = "Task", body = CronTask),
        (status = 404, description = "Unknown task", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn get_task(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(name): Path<String>,
) -> Result<Json<CronTask>> {
    require_admin(&auth)?;
    Ok(Json(state.cron.get(&name).await?))
}

/// PUT /api/v1/cron/{name}
#[utoipa::path(
    put,
    path = "/{name}",
    context_path = "/api/v1/cron",
    tag = "cron",
    operation_id = "update_cron_task",
    params(("name" = String, Path, description = "Task name")),
    request_body = UpdateCronTaskRequest,
    responses(
        (status = 200, description = "Updated task", body = CronTask),
        (status = 400, description = "Invalid frequency, state or mode", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn update_task(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(name): Path<String>,
    Json(payload): Json<UpdateCronTaskRequest>,
) -> Result<Json<CronTask>> {
    require_admin(&auth)?;
    Ok(Json(state.cron.update(&name, payload).await?))
}

/// POST /api/v1/cron/{name}/run
#[utoipa::path(
    post,
    path = "/{name}/run",
    context_path = "/api/v1/cron",
    tag = "cron",
    operation_id = "run_cron_task",
    params(("name" = String, Path, description = "Task name")),
    responses(
        (status = 200, description = "Run summary", body = CronRun),
        (status = 409, description = "Task already running", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn run_task(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(name): Path<String>,
) -> Result<Json<CronRun>> {
    require_admin(&auth)?;
    let run = state.cron.run_task(&name).await?;
    Ok(Json(run))
}

/// GET /api/v1/cron/{name}/logs
#[utoipa::path(
    get,
    path = "/{name}/logs",
    context_path = "/api/v1/cron",
    tag = "cron",
    operation_id = "list_cron_logs",
    params(("name" = String, Path, description = "Task name"), LogsQuery),
    responses((status = 200, description = "Most recent runs", body = Vec<CronTaskLog>)),
    security(("bearer_auth" = [])),
)]
pub async fn list_logs(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(name): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<Vec<CronTaskLog>>> {
    require_admin(&auth)?;
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, 1000);
    Ok(Json(state.cron.logs(&name, limit).await?))
}
