//! Document type handlers.

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::document_type::{CreateDocumentTypeRequest, DocumentType};
use crate::services::document_type_service::DocumentTypeService;

#[derive(OpenApi)]
#[openapi(
    paths(
        list_document_types,
        create_document_type,
        delete_all_document_types,
        upload_pattern,
        check_upload
    ),
    components(schemas(
        DocumentType,
        CreateDocumentTypeRequest,
        DeletedResponse,
        UploadPatternResponse,
        UploadCheckResponse
    ))
)]
pub struct DocumentTypesApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/",
            get(list_document_types)
                .post(create_document_type)
                .delete(delete_all_document_types),
        )
        .route("/upload-pattern", get(upload_pattern))
        .route("/check", get(check_upload))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedResponse {
    pub deleted: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadPatternResponse {
    /// `None` when no document type allows uploads.
    pub pattern: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UploadCheckQuery {
    pub filename: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadCheckResponse {
    pub filename: String,
    pub uploadable: bool,
}

/// GET /api/v1/document-types
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/document-types",
    tag = "document-types",
    operation_id = "list_document_types",
    responses((status = 200, description = "All document types", body = Vec<DocumentType>)),
    security(("bearer_auth" = [])),
)]
pub async fn list_document_types(
    State(state): State<SharedState>,
) -> Result<Json<Vec<DocumentType>>> {
    let service = DocumentTypeService::new(state.store.clone());
    Ok(Json(service.list().await?))
}

/// POST /api/v1/document-types
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/document-types",
    tag = "document-types",
    operation_id = "create_document_type",
    request_body = CreateDocumentTypeRequest,
    responses(
        (status = 201, description = "Document type created", body = DocumentType),
        (status = 400, description = "Missing name or invalid extension", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn create_document_type(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<CreateDocumentTypeRequest>,
) -> Result<(StatusCode, Json<DocumentType>)> {
    if !auth.is_admin {
        return Err(AppError::Unauthorized(
            "Admin privileges required".to_string(),
        ));
    }
    let service = DocumentTypeService::new(state.store.clone());
    Ok((StatusCode::CREATED, Json(service.create(payload).await?)))
}

/// DELETE /api/v1/document-types
#[utoipa::path(
    delete,
    path = "",
    context_path = "/api/v1/document-types",
    tag = "document-types",
    operation_id = "delete_all_document_types",
    responses((status = 200, description = "Number of deleted types", body = DeletedResponse)),
    security(("bearer_auth" = [])),
)]
pub async fn delete_all_document_types(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
) -> Result<Json<DeletedResponse>> {
    if !auth.is_admin {
        return Err(AppError::Unauthorized(
            "Admin privileges required".to_string(),
        ));
    }
    let service = DocumentTypeService::new(state.store.clone());
    Ok(Json(DeletedResponse {
        deleted: service.delete_all().await?,
    }))
}

/// GET /api/v1/document-types/upload-pattern
#[utoipa::path(
    get,
    path = "/upload-pattern",
    context_path = "/api/v1/document-types",
    tag = "document-types",
    operation_id = "get_upload_pattern",
    responses((status = 200, description = "Regex matching uploadable file names", body = UploadPatternResponse)),
    security(("bearer_auth" = [])),
)]
pub async fn upload_pattern(
    State(state): State<SharedState>,
) -> Result<Json<UploadPatternResponse>> {
    let service = DocumentTypeService::new(state.store.clone());
    Ok(Json(UploadPatternResponse {
        pattern: service.uploadable_file_pattern().await?,
    }))
}

/// GET /api/v1/document-types/check?filename=...
#[utoipa::path(
    get,
    path = "/check",
    context_path = "/api/v1/document-types",
    tag = "document-types",
    operation_id = "check_upload",
    params(UploadCheckQuery),
    responses((status = 200, description = "Whether the file may be uploaded", body = UploadCheckResponse)),
    security(("bearer_auth" = [])),
)]
pub async fn check_upload(
    State(state): State<SharedState>,
    Query(query): Query<UploadCheckQuery>,
) -> Result<Json<UploadCheckResponse>> {
    let service = DocumentTypeService::new(state.store.clone());
    let uploadable = service.is_uploadable(&query.filename).await?;
    Ok(Json(UploadCheckResponse {
        filename: query.filename,
        uploadable,
    }))
}
