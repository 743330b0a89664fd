//! Directed "impacts" edges between two assets.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::itemtype::{ItemRef, ItemType};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ImpactRelation {
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub itemtype_source: ItemType,
    pub items_id_source: i64,
    #[sqlx(try_from = "String")]
    pub itemtype_impacted: ItemType,
    pub items_id_impacted: i64,
}

impl ImpactRelation {
    pub fn source(&self) -> ItemRef {
        ItemRef::new(self.itemtype_source, self.items_id_source)
    }

    pub fn impacted(&self) -> ItemRef {
        ItemRef::new(self.itemtype_impacted, self.items_id_impacted)
    }
}

/// Raw relation input. Every field is optional so that missing fields are
/// reported as a validation failure instead of a deserialization error.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ImpactRelationInput {
    pub itemtype_source: Option<ItemType>,
    pub items_id_source: Option<i64>,
    pub itemtype_impacted: Option<ItemType>,
    pub items_id_impacted: Option<i64>,
}

impl ImpactRelationInput {
    pub fn between(source: ItemRef, impacted: ItemRef) -> Self {
        Self {
            itemtype_source: Some(source.itemtype),
            items_id_source: Some(source.items_id),
            itemtype_impacted: Some(impacted.itemtype),
            items_id_impacted: Some(impacted.items_id),
        }
    }

    /// Both endpoints, when all four fields are present.
    pub fn endpoints(&self) -> Option<(ItemRef, ItemRef)> {
        Some((
            ItemRef::new(self.itemtype_source?, self.items_id_source?),
            ItemRef::new(self.itemtype_impacted?, self.items_id_impacted?),
        ))
    }
}
