//! Mobile line operators, identified by their MCC/MNC pair.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LineOperator {
    pub id: i64,
    pub name: String,
    pub comment: Option<String>,
    /// Mobile Country Code
    pub mcc: i32,
    /// Mobile Network Code
    pub mnc: i32,
    pub entities_id: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LineOperatorInput {
    pub name: String,
    pub comment: Option<String>,
    pub mcc: Option<i32>,
    pub mnc: Option<i32>,
    #[serde(default)]
    pub entities_id: i64,
}
