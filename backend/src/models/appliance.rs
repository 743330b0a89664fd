//! Items attached to an appliance.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::itemtype::{ItemRef, ItemType};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ApplianceItem {
    pub id: i64,
    pub appliances_id: i64,
    #[sqlx(try_from = "String")]
    pub itemtype: ItemType,
    pub items_id: i64,
}

impl ApplianceItem {
    pub fn item(&self) -> ItemRef {
        ItemRef::new(self.itemtype, self.items_id)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddApplianceItemRequest {
    pub itemtype: ItemType,
    pub items_id: i64,
}
