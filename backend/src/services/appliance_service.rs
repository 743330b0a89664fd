//! Items attached to appliances.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::appliance::ApplianceItem;
use crate::models::asset::Asset;
use crate::models::itemtype::{ItemRef, ItemType};
use crate::services::request_context::RequestContext;
use crate::store::{ApplianceStore, AssetStore, Store};

pub struct ApplianceService {
    store: Arc<dyn Store>,
}

impl ApplianceService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn appliance(&self, appliances_id: i64) -> Result<Asset> {
        self.store
            .find_asset(ItemRef::new(ItemType::Appliance, appliances_id))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Appliance {} not found", appliances_id)))
    }

    pub async fn add_item(&self, appliances_id: i64, item: ItemRef) -> Result<ApplianceItem> {
        let appliance = self.appliance(appliances_id).await?;
        if !ItemType::appliance_types().contains(&item.itemtype) {
            return Err(AppError::Validation(format!(
                "{} items cannot be attached to an appliance",
                item.itemtype
            )));
        }
        if item == appliance.item_ref() {
            return Err(AppError::Validation(
                "An appliance cannot contain itself".to_string(),
            ));
        }
        if self.store.find_asset(item).await?.is_none() {
            return Err(AppError::Validation(format!("{} does not exist", item)));
        }
        if self
            .store
            .find_appliance_item(appliances_id, item)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "{} is already attached to appliance '{}'",
                item, appliance.name
            )));
        }

        self.store.insert_appliance_item(appliances_id, item).await
    }

    pub async fn list_items(&self, appliances_id: i64) -> Result<Vec<ApplianceItem>> {
        self.appliance(appliances_id).await?;
        self.store.list_appliance_items(appliances_id).await
    }

    /// Attached items of appliance types. Anonymous callers always get 0.
    pub async fn count_for_main_item(
        &self,
        ctx: &RequestContext,
        appliances_id: i64,
    ) -> Result<i64> {
        if ctx.is_anonymous() {
            return Ok(0);
        }
        self.store
            .count_appliance_items(appliances_id, ItemType::appliance_types())
            .await
    }

    pub async fn remove_item(&self, id: i64) -> Result<()> {
        if !self.store.delete_appliance_item(id).await? {
            return Err(AppError::NotFound(format!("Appliance item {} not found", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::asset_service::test_support::create_asset;
    use crate::services::asset_service::AssetService;
    use crate::store::memory::MemoryStore;

    fn logged_in() -> RequestContext {
        RequestContext {
            user_id: Some(2),
            username: Some("glpi".into()),
            is_admin: true,
        }
    }

    #[tokio::test]
    async fn test_count_for_main_item() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let appliance = create_asset(&store, ItemType::Appliance, "erp").await;
        let pc = create_asset(&store, ItemType::Computer, "pc-01").await;
        let printer = create_asset(&store, ItemType::Printer, "prn-01").await;
        let service = ApplianceService::new(store);

        service.add_item(appliance.id, pc.item_ref()).await.unwrap();
        service
            .add_item(appliance.id, printer.item_ref())
            .await
            .unwrap();

        assert_eq!(
            service
                .count_for_main_item(&RequestContext::anonymous(), appliance.id)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            service
                .count_for_main_item(&logged_in(), appliance.id)
                .await
                .unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_add_item_rules() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let appliance = create_asset(&store, ItemType::Appliance, "erp").await;
        let pc = create_asset(&store, ItemType::Computer, "pc-01").await;
        let service = ApplianceService::new(store);

        service.add_item(appliance.id, pc.item_ref()).await.unwrap();
        assert!(matches!(
            service
                .add_item(appliance.id, pc.item_ref())
                .await
                .unwrap_err(),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            service
                .add_item(appliance.id, ItemRef::new(ItemType::Monitor, 555))
                .await
                .unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(
            service.add_item(pc.id, pc.item_ref()).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            service
                .add_item(appliance.id, appliance.item_ref())
                .await
                .unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_purge_cascades_items() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let appliance = create_asset(&store, ItemType::Appliance, "erp").await;
        let pc = create_asset(&store, ItemType::Computer, "pc-01").await;
        let other = create_asset(&store, ItemType::Appliance, "crm").await;
        let service = ApplianceService::new(store.clone());
        service.add_item(appliance.id, pc.item_ref()).await.unwrap();
        service.add_item(other.id, pc.item_ref()).await.unwrap();

        // Purging the attached item detaches it everywhere.
        let assets = AssetService::new(store.clone());
        let summary = assets.purge(pc.id).await.unwrap();
        assert_eq!(summary.appliance_items, 2);
        assert!(service.list_items(appliance.id).await.unwrap().is_empty());

        // Purging the appliance removes its own rows.
        let printer = create_asset(&store, ItemType::Printer, "prn-01").await;
        service
            .add_item(appliance.id, printer.item_ref())
            .await
            .unwrap();
        let summary = assets.purge(appliance.id).await.unwrap();
        assert_eq!(summary.appliance_items, 1);
    }
}
