//! Generic asset CRUD shared by every item type.

use std::sync::Arc;

use crate::api::validation::require_name;
use crate::error::{AppError, Result};
use crate::models::asset::{Asset, CreateAssetRequest, UpdateAssetRequest};
use crate::models::itemtype::{ItemRef, ItemType};
use crate::services::metrics_service;
use crate::store::{AssetStore, PurgeSummary, Store};

pub struct AssetService {
    store: Arc<dyn Store>,
}

impl AssetService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, mut input: CreateAssetRequest) -> Result<Asset> {
        input.name = require_name(&input.name, "Name")?;
        let asset = self.store.insert_asset(&input).await?;
        tracing::info!("Created {} '{}'", asset.item_ref(), asset.name);
        Ok(asset)
    }

    pub async fn get(&self, id: i64) -> Result<Asset> {
        self.store
            .get_asset(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Asset {} not found", id)))
    }

    /// Asset matching both type and id.
    pub async fn find(&self, item: ItemRef) -> Result<Asset> {
        self.store
            .find_asset(item)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} not found", item)))
    }

    pub async fn exists(&self, item: ItemRef) -> Result<bool> {
        Ok(self.store.find_asset(item).await?.is_some())
    }

    pub async fn list(
        &self,
        itemtype: Option<ItemType>,
        include_deleted: bool,
    ) -> Result<Vec<Asset>> {
        self.store.list_assets(itemtype, include_deleted).await
    }

    pub async fn update(&self, id: i64, mut input: UpdateAssetRequest) -> Result<Asset> {
        if let Some(name) = &input.name {
            input.name = Some(require_name(name, "Name")?);
        }
        self.store
            .update_asset(id, &input)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Asset {} not found", id)))
    }

    /// Move to the trash.
    pub async fn delete(&self, id: i64) -> Result<Asset> {
        self.set_deleted(id, true).await
    }

    pub async fn restore(&self, id: i64) -> Result<Asset> {
        self.set_deleted(id, false).await
    }

    async fn set_deleted(&self, id: i64, is_deleted: bool) -> Result<Asset> {
        if !self.store.set_asset_deleted(id, is_deleted).await? {
            return Err(AppError::NotFound(format!("Asset {} not found", id)));
        }
        self.get(id).await
    }

    /// Hard delete, removing every relation row pointing at the asset.
    pub async fn purge(&self, id: i64) -> Result<PurgeSummary> {
        let asset = self.get(id).await?;
        let summary = self.store.purge_asset(asset.item_ref()).await?;
        metrics_service::record_purge(asset.itemtype);
        tracing::info!(
            "Purged {} '{}' ({} ports, {} impact relations, {} appliance items)",
            asset.item_ref(),
            asset.name,
            summary.network_ports,
            summary.impact_relations,
            summary.appliance_items
        );
        Ok(summary)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub async fn create_asset(store: &Arc<dyn Store>, itemtype: ItemType, name: &str) -> Asset {
        AssetService::new(store.clone())
            .create(CreateAssetRequest {
                itemtype,
                name: name.to_string(),
                entities_id: 0,
                serial: None,
                otherserial: None,
                comment: None,
            })
            .await
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::create_asset;
    use super::*;
    use crate::store::memory::MemoryStore;

    fn store() -> Arc<dyn Store> {
        Arc::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn test_create_requires_name() {
        let service = AssetService::new(store());
        let err = service
            .create(CreateAssetRequest {
                itemtype: ItemType::Computer,
                name: "  ".into(),
                entities_id: 0,
                serial: None,
                otherserial: None,
                comment: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_trash_and_restore() {
        let store = store();
        let pc = create_asset(&store, ItemType::Computer, "pc-01").await;
        let service = AssetService::new(store);

        let trashed = service.delete(pc.id).await.unwrap();
        assert!(trashed.is_deleted);
        assert!(service
            .list(Some(ItemType::Computer), false)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            service.list(Some(ItemType::Computer), true).await.unwrap().len(),
            1
        );

        let restored = service.restore(pc.id).await.unwrap();
        assert!(!restored.is_deleted);
    }

    #[tokio::test]
    async fn test_exists_checks_type() {
        let store = store();
        let pc = create_asset(&store, ItemType::Computer, "pc-01").await;
        let service = AssetService::new(store);
        assert!(service
            .exists(ItemRef::new(ItemType::Computer, pc.id))
            .await
            .unwrap());
        assert!(!service
            .exists(ItemRef::new(ItemType::Printer, pc.id))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_update_and_missing() {
        let store = store();
        let pc = create_asset(&store, ItemType::Computer, "pc-01").await;
        let service = AssetService::new(store);
        let updated = service
            .update(
                pc.id,
                UpdateAssetRequest {
                    serial: Some("SN-1".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.serial.as_deref(), Some("SN-1"));
        assert_eq!(updated.name, "pc-01");

        assert!(matches!(
            service.get(9999).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            service.purge(9999).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_purge_removes_asset() {
        let store = store();
        let pc = create_asset(&store, ItemType::Computer, "pc-01").await;
        let service = AssetService::new(store);
        let summary = service.purge(pc.id).await.unwrap();
        assert_eq!(summary, PurgeSummary::default());
        assert!(service.get(pc.id).await.is_err());
    }
}
