//! OpenAPI specification generated from handler annotations via utoipa.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Top-level OpenAPI document for the Asset Keeper API.
///
/// Each handler module contributes its own paths and schemas via per-module
/// `#[derive(OpenApi)]` structs merged into this root document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Asset Keeper API",
        description = "IT asset inventory: assets and their relations, users, scheduled maintenance tasks.",
        version = "0.1.0",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login, expired and forgotten passwords"),
        (name = "users", description = "User management and tokens"),
        (name = "assets", description = "Inventory assets of every item type"),
        (name = "line-operators", description = "Mobile line operators"),
        (name = "network-ports", description = "Network ports of assets"),
        (name = "impacts", description = "Impact relations between assets"),
        (name = "appliances", description = "Items attached to appliances"),
        (name = "software", description = "Software versions and installations"),
        (name = "document-types", description = "Uploadable document types"),
        (name = "settings", description = "Configuration values"),
        (name = "cron", description = "Scheduled maintenance tasks"),
        (name = "dropdown", description = "Item picker lookups"),
        (name = "health", description = "Health checks"),
    ),
    components(schemas(ErrorResponse))
)]
pub struct ApiDoc;

/// Standard error response body returned by all endpoints on failure.
#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g. "NOT_FOUND", "VALIDATION_ERROR")
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

/// Adds the Bearer JWT and API token security schemes.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "api_token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Authorization",
                    "`user_token <api_token>`",
                ))),
            );
        }
    }
}

/// Build the merged OpenAPI document from all handler modules.
pub fn build_openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    doc.merge(super::handlers::auth::AuthApiDoc::openapi());
    doc.merge(super::handlers::users::UsersApiDoc::openapi());
    doc.merge(super::handlers::assets::AssetsApiDoc::openapi());
    doc.merge(super::handlers::line_operators::LineOperatorsApiDoc::openapi());
    doc.merge(super::handlers::network_ports::NetworkPortsApiDoc::openapi());
    doc.merge(super::handlers::impacts::ImpactsApiDoc::openapi());
    doc.merge(super::handlers::appliances::AppliancesApiDoc::openapi());
    doc.merge(super::handlers::software::SoftwareApiDoc::openapi());
    doc.merge(super::handlers::document_types::DocumentTypesApiDoc::openapi());
    doc.merge(super::handlers::settings::SettingsApiDoc::openapi());
    doc.merge(super::handlers::cron::CronApiDoc::openapi());
    doc.merge(super::handlers::dropdown::DropdownApiDoc::openapi());
    doc.merge(super::handlers::health::HealthApiDoc::openapi());

    doc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_contains_core_paths() {
        let doc = build_openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in [
            "/api/v1/auth/login",
            "/api/v1/assets/{id}/purge",
            "/api/v1/appliances/{id}/items/count",
            "/api/v1/cron/{name}/run",
            "/api/v1/dropdown/socket",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing path {}",
                expected
            );
        }
    }

    #[test]
    fn test_openapi_has_security_schemes() {
        let doc = build_openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.security_schemes.contains_key("api_token"));
    }
}
