//! Inventory assets (computers, printers, software, appliances, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::itemtype::{ItemRef, ItemType};

/// One row of the shared `assets` table.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Asset {
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub itemtype: ItemType,
    pub name: String,
    pub entities_id: i64,
    pub serial: Option<String>,
    pub otherserial: Option<String>,
    pub comment: Option<String>,
    pub is_deleted: bool,
    pub date_creation: DateTime<Utc>,
    pub date_mod: DateTime<Utc>,
}

impl Asset {
    pub fn item_ref(&self) -> ItemRef {
        ItemRef::new(self.itemtype, self.id)
    }
}

/// Fields accepted when creating an asset.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateAssetRequest {
    pub itemtype: ItemType,
    pub name: String,
    #[serde(default)]
    pub entities_id: i64,
    pub serial: Option<String>,
    pub otherserial: Option<String>,
    pub comment: Option<String>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateAssetRequest {
    pub name: Option<String>,
    pub entities_id: Option<i64>,
    pub serial: Option<String>,
    pub otherserial: Option<String>,
    pub comment: Option<String>,
}

/// Minimal `{id, name}` entry returned by dropdown endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DropdownEntry {
    pub id: i64,
    pub name: String,
}
