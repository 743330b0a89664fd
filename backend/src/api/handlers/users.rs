//! User management handlers.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::api::middleware::auth::AuthExtension;
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::user::{CreateUserRequest, TokenField, UpdateUserRequest, User};

#[derive(OpenApi)]
#[openapi(
    paths(
        list_users,
        create_user,
        get_user,
        update_user,
        delete_user,
        get_user_emails,
        regenerate_token,
        blank_password,
        clone_user
    ),
    components(schemas(
        User,
        CreateUserRequest,
        UpdateUserRequest,
        UserEmailsResponse,
        RegenerateTokenRequest,
        TokenResponse,
        TokenField
    ))
)]
pub struct UsersApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/:id/emails", get(get_user_emails))
        .route("/:id/token", post(regenerate_token))
        .route("/:id/blank-password", post(blank_password))
        .route("/:id/clone", post(clone_user))
}

fn require_admin(auth: &AuthExtension) -> Result<()> {
    if !auth.is_admin {
        return Err(AppError::Unauthorized(
            "Admin privileges required".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserEmailsResponse {
    pub default_email: Option<String>,
    pub emails: Vec<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RegenerateTokenRequest {
    /// Defaults to the personal token.
    pub field: Option<TokenField>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub field: TokenField,
    pub token: String,
}

/// GET /api/v1/users
#[utoipa::path(
    get,
    path = "",
    context_path = "/api/v1/users",
    tag = "users",
    operation_id = "list_users",
    responses((status = 200, description = "All users", body = Vec<User>)),
    security(("bearer_auth" = [])),
)]
pub async fn list_users(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
) -> Result<Json<Vec<User>>> {
    require_admin(&auth)?;
    Ok(Json(state.users.list().await?))
}

/// POST /api/v1/users
#[utoipa::path(
    post,
    path = "",
    context_path = "/api/v1/users",
    tag = "users",
    operation_id = "create_user",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid login or password", body = crate::api::openapi::ErrorResponse),
        (status = 409, description = "Login already used", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn create_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    require_admin(&auth)?;
    let user = state.users.create(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/users/{id}
#[utoipa::path(
    get,
    path = "/{id}",
    context_path = "/api/v1/users",
    tag = "users",
    operation_id = "get_user",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "Unknown user", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn get_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<Json<User>> {
    auth.require_self_or_admin(id)?;
    Ok(Json(state.users.get(id).await?))
}

/// PUT /api/v1/users/{id}
#[utoipa::path(
    put,
    path = "/{id}",
    context_path = "/api/v1/users",
    tag = "users",
    operation_id = "update_user",
    params(("id" = i64, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 400, description = "Invalid login or password", body = crate::api::openapi::ErrorResponse),
        (status = 409, description = "Login already used", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn update_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>> {
    auth.require_self_or_admin(id)?;
    let touches_rights = payload.profiles_id.is_some()
        || payload.entities_id.is_some()
        || payload.is_active.is_some()
        || payload.password_last_update.is_some();
    if touches_rights && !auth.is_admin {
        return Err(AppError::Authorization(
            "Only administrators can change profiles, entities or account state".to_string(),
        ));
    }
    Ok(Json(state.users.update(id, payload).await?))
}

/// DELETE /api/v1/users/{id}
#[utoipa::path(
    delete,
    path = "/{id}",
    context_path = "/api/v1/users",
    tag = "users",
    operation_id = "delete_user",
    params(("id" = i64, Path, description = "User id")),
    responses((status = 204, description = "User deleted")),
    security(("bearer_auth" = [])),
)]
pub async fn delete_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    require_admin(&auth)?;
    if auth.user_id == id {
        return Err(AppError::Validation(
            "You cannot delete your own account".to_string(),
        ));
    }
    state.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/users/{id}/emails
#[utoipa::path(
    get,
    path = "/{id}/emails",
    context_path = "/api/v1/users",
    tag = "users",
    operation_id = "get_user_emails",
    params(("id" = i64, Path, description = "User id")),
    responses((status = 200, description = "Addresses of the user", body = UserEmailsResponse)),
    security(("bearer_auth" = [])),
)]
pub async fn get_user_emails(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<Json<UserEmailsResponse>> {
    auth.require_self_or_admin(id)?;
    state.users.get(id).await?;
    Ok(Json(UserEmailsResponse {
        default_email: state.users.default_email(id).await?,
        emails: state.users.all_emails(id).await?,
    }))
}

/// POST /api/v1/users/{id}/token
#[utoipa::path(
    post,
    path = "/{id}/token",
    context_path = "/api/v1/users",
    tag = "users",
    operation_id = "regenerate_user_token",
    params(("id" = i64, Path, description = "User id")),
    request_body = RegenerateTokenRequest,
    responses((status = 200, description = "New token", body = TokenResponse)),
    security(("bearer_auth" = [])),
)]
pub async fn regenerate_token(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
    payload: Option<Json<RegenerateTokenRequest>>,
) -> Result<Json<TokenResponse>> {
    auth.require_self_or_admin(id)?;
    let field = payload
        .and_then(|Json(p)| p.field)
        .unwrap_or(TokenField::PersonalToken);
    let token = state.users.regenerate_token(id, field).await?;
    Ok(Json(TokenResponse { field, token }))
}

/// POST /api/v1/users/{id}/blank-password
#[utoipa::path(
    post,
    path = "/{id}/blank-password",
    context_path = "/api/v1/users",
    tag = "users",
    operation_id = "blank_user_password",
    params(("id" = i64, Path, description = "User id")),
    responses((status = 204, description = "Password removed")),
    security(("bearer_auth" = [])),
)]
pub async fn blank_password(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    require_admin(&auth)?;
    state.users.blank_password(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/users/{id}/clone
#[utoipa::path(
    post,
    path = "/{id}/clone",
    context_path = "/api/v1/users",
    tag = "users",
    operation_id = "clone_user",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 201, description = "Copy of the user", body = User),
        (status = 404, description = "User not found", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn clone_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<AuthExtension>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<User>)> {
    require_admin(&auth)?;
    let copy = state.users.clone_user(id).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}
