//! Mobile line operators, unique per (MCC, MNC).

use std::sync::Arc;

use crate::api::validation::require_name;
use crate::error::{AppError, Result};
use crate::models::line_operator::{LineOperator, LineOperatorInput};
use crate::store::{LineOperatorStore, Store};

pub const DUPLICATE_CODES_MESSAGE: &str =
    "Mobile country code and network code combination must be unique!";

pub struct LineOperatorService {
    store: Arc<dyn Store>,
}

impl LineOperatorService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn ensure_unique_codes(&self, mcc: i32, mnc: i32, exclude_id: Option<i64>) -> Result<()> {
        let count = self
            .store
            .count_line_operators_with_codes(mcc, mnc, exclude_id)
            .await?;
        if count > 0 {
            return Err(AppError::Conflict(DUPLICATE_CODES_MESSAGE.to_string()));
        }
        Ok(())
    }

    pub async fn create(&self, input: LineOperatorInput) -> Result<LineOperator> {
        let name = require_name(&input.name, "Name")?;
        let mcc = input.mcc.unwrap_or(0);
        let mnc = input.mnc.unwrap_or(0);
        self.ensure_unique_codes(mcc, mnc, None).await?;

        self.store
            .insert_line_operator(&name, input.comment.as_deref(), mcc, mnc, input.entities_id)
            .await
    }

    pub async fn update(&self, id: i64, input: LineOperatorInput) -> Result<LineOperator> {
        let mut operator = self.get(id).await?;
        operator.name = require_name(&input.name, "Name")?;
        operator.comment = input.comment;
        operator.mcc = input.mcc.unwrap_or(operator.mcc);
        operator.mnc = input.mnc.unwrap_or(operator.mnc);
        operator.entities_id = input.entities_id;
        self.ensure_unique_codes(operator.mcc, operator.mnc, Some(id))
            .await?;

        self.store.update_line_operator(&operator).await?;
        Ok(operator)
    }

    pub async fn get(&self, id: i64) -> Result<LineOperator> {
        self.store
            .get_line_operator(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Line operator {} not found", id)))
    }

    pub async fn list(&self) -> Result<Vec<LineOperator>> {
        self.store.list_line_operators().await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        if !self.store.delete_line_operator(id).await? {
            return Err(AppError::NotFound(format!("Line operator {} not found", id)));
        }
        Ok(())
    }
}
