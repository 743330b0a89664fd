//! Software versions and their installations on assets.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::itemtype::ItemType;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct SoftwareVersion {
    pub id: i64,
    pub softwares_id: i64,
    pub name: String,
    pub arch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct SoftwareInstallation {
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub itemtype: ItemType,
    pub items_id: i64,
    pub softwareversions_id: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateSoftwareVersionRequest {
    pub name: String,
    pub arch: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InstallSoftwareRequest {
    pub itemtype: ItemType,
    pub items_id: i64,
}
