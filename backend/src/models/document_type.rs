//! Document types controlling which uploads are accepted.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct DocumentType {
    pub id: i64,
    pub name: String,
    /// Either a plain extension (`tar.gz`) or a regex between slashes (`/\.jpe?g$/`).
    pub ext: String,
    pub is_uploadable: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateDocumentTypeRequest {
    pub name: String,
    pub ext: String,
    #[serde(default = "default_uploadable")]
    pub is_uploadable: bool,
}

fn default_uploadable() -> bool {
    true
}
