//! Dropdown lookups used by item pickers.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use utoipa::{OpenApi, ToSchema};

use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::asset::DropdownEntry;
use crate::models::itemtype::{ItemRef, ItemType};
use crate::services::asset_service::AssetService;
use crate::services::network_port_service::NetworkPortService;

#[derive(OpenApi)]
#[openapi(paths(socket), components(schemas(DropdownAction, DropdownEntry)))]
pub struct DropdownApiDoc;

pub fn router() -> Router<SharedState> {
    Router::new().route("/socket", post(socket))
}

/// Item types arrive as raw strings so that unknown names surface as a
/// validation error rather than a JSON rejection.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "action")]
pub enum DropdownAction {
    #[serde(rename = "getItemsFromItemtype")]
    ItemsFromItemtype { itemtype: String },
    #[serde(rename = "getNetworkPortFromItem")]
    NetworkPortFromItem { itemtype: String, items_id: i64 },
}

fn parse_itemtype(raw: &str) -> Result<ItemType> {
    raw.parse::<ItemType>()
        .map_err(|e| AppError::Validation(e.to_string()))
}

/// POST /api/v1/dropdown/socket
#[utoipa::path(
    post,
    path = "/socket",
    context_path = "/api/v1/dropdown",
    tag = "dropdown",
    operation_id = "dropdown_socket",
    request_body = DropdownAction,
    responses(
        (status = 200, description = "Entries for the picker", body = Vec<DropdownEntry>),
        (status = 400, description = "Unknown item type", body = crate::api::openapi::ErrorResponse),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn socket(
    State(state): State<SharedState>,
    Json(action): Json<DropdownAction>,
) -> Result<Json<Vec<DropdownEntry>>> {
    let entries = match action {
        DropdownAction::ItemsFromItemtype { itemtype } => {
            let itemtype = parse_itemtype(&itemtype)?;
            AssetService::new(state.store.clone())
                .list(Some(itemtype), false)
                .await?
                .into_iter()
                .map(|asset| DropdownEntry {
                    id: asset.id,
                    name: asset.name,
                })
                .collect()
        }
        DropdownAction::NetworkPortFromItem { itemtype, items_id } => {
            let item = ItemRef::new(parse_itemtype(&itemtype)?, items_id);
            NetworkPortService::new(state.store.clone())
                .list_for_item(item)
                .await?
                .into_iter()
                .map(|port| DropdownEntry {
                    id: port.id,
                    name: port.name,
                })
                .collect()
        }
    };
    Ok(Json(entries))
}
