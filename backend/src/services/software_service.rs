//! Software versions, their installations, and orphan cleanup.

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use crate::api::validation::require_name;
use crate::error::{AppError, Result};
use crate::models::itemtype::{ItemRef, ItemType};
use crate::models::software::{
    CreateSoftwareVersionRequest, SoftwareInstallation, SoftwareVersion,
};
use crate::store::{AssetStore, SoftwareStore, Store};

/// Outcome of one cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SoftwareCleanup {
    pub versions_purged: i64,
    pub software_trashed: i64,
    /// The limit was reached before every orphan was handled.
    pub limit_reached: bool,
}

impl SoftwareCleanup {
    pub fn total(&self) -> i64 {
        self.versions_purged + self.software_trashed
    }
}

pub struct SoftwareService {
    store: Arc<dyn Store>,
}

impl SoftwareService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn add_version(
        &self,
        softwares_id: i64,
        input: CreateSoftwareVersionRequest,
    ) -> Result<SoftwareVersion> {
        let software = ItemRef::new(ItemType::Software, softwares_id);
        if self.store.find_asset(software).await?.is_none() {
            return Err(AppError::NotFound(format!("{} not found", software)));
        }
        let name = require_name(&input.name, "Version name")?;
        self.store
            .insert_software_version(softwares_id, &name, input.arch.as_deref())
            .await
    }

    pub async fn list_versions(&self, softwares_id: i64) -> Result<Vec<SoftwareVersion>> {
        self.store.list_software_versions(softwares_id).await
    }

    pub async fn install(
        &self,
        softwareversions_id: i64,
        item: ItemRef,
    ) -> Result<SoftwareInstallation> {
        if self
            .store
            .get_software_version(softwareversions_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(format!(
                "Software version {} not found",
                softwareversions_id
            )));
        }
        if matches!(item.itemtype, ItemType::Software | ItemType::Appliance) {
            return Err(AppError::Validation(format!(
                "Software cannot be installed on {} items",
                item.itemtype
            )));
        }
        if self.store.find_asset(item).await?.is_none() {
            return Err(AppError::Validation(format!("{} does not exist", item)));
        }
        self.store
            .insert_software_installation(softwareversions_id, item)
            .await
    }

    pub async fn list_installations(
        &self,
        softwareversions_id: i64,
    ) -> Result<Vec<SoftwareInstallation>> {
        self.store
            .list_software_installations(softwareversions_id)
            .await
    }

    /// Purge versions nobody has installed, then trash software left without
    /// any version. At most `limit` rows are touched in total.
    pub async fn clean_orphans(&self, limit: i64) -> Result<SoftwareCleanup> {
        let mut result = SoftwareCleanup::default();
        if limit <= 0 {
            return Ok(result);
        }

        // Fetch one extra row to know whether work remains past the limit.
        let versions = self
            .store
            .list_versions_without_installation(limit + 1)
            .await?;
        for version in versions.iter().take(limit as usize) {
            if self.store.delete_software_version(version.id).await? {
                result.versions_purged += 1;
            }
        }
        if versions.len() as i64 > limit {
            result.limit_reached = true;
            return Ok(result);
        }

        let remaining = limit - result.versions_purged;
        if remaining <= 0 {
            result.limit_reached = !self
                .store
                .list_software_without_versions(1)
                .await?
                .is_empty();
            return Ok(result);
        }

        let software = self
            .store
            .list_software_without_versions(remaining + 1)
            .await?;
        for asset in software.iter().take(remaining as usize) {
            if self.store.set_asset_deleted(asset.id, true).await? {
                result.software_trashed += 1;
            }
        }
        result.limit_reached = software.len() as i64 > remaining;

        tracing::info!(
            "Software cleanup: {} version(s) purged, {} software trashed",
            result.versions_purged,
            result.software_trashed
        );
        Ok(result)
    }
}
