//! Router assembly.

use axum::{middleware as axum_middleware, routing::get, Json, Router};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware::auth::auth_middleware;
use super::middleware::maintenance::maintenance_guard;
use super::openapi::build_openapi;
use super::SharedState;

/// Build the application router.
///
/// `/health`, `/metrics`, the OpenAPI document and `/api/v1/auth/*` are
/// public; everything else under `/api/v1` requires a credential.
pub fn create_router(state: SharedState) -> Router {
    let protected = Router::new()
        .nest("/users", handlers::users::router())
        .nest("/assets", handlers::assets::router())
        .nest("/line-operators", handlers::line_operators::router())
        .nest("/network-ports", handlers::network_ports::router())
        .nest("/impacts", handlers::impacts::router())
        .nest("/appliances", handlers::appliances::router())
        .nest("/software", handlers::software::router())
        .nest("/document-types", handlers::document_types::router())
        .nest("/settings", handlers::settings::router())
        .nest("/cron", handlers::cron::router())
        .nest("/dropdown", handlers::dropdown::router())
        // Layers run bottom-up: auth first, then the maintenance guard.
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            maintenance_guard,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(handlers::health::router())
        .route(
            "/api/v1/openapi.json",
            get(|| async { Json(build_openapi()) }),
        )
        .nest("/api/v1/auth", handlers::auth::router())
        .nest("/api/v1", protected)
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
