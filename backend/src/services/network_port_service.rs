//! Network ports attached to assets.

use std::sync::Arc;

use crate::api::validation::normalize_mac;
use crate::error::{AppError, Result};
use crate::models::itemtype::ItemRef;
use crate::models::network_port::{
    CreateNetworkPortRequest, InstantiationType, NetworkPort, NewNetworkPort,
};
use crate::store::{AssetStore, NetworkPortStore, Store};

pub struct NetworkPortService {
    store: Arc<dyn Store>,
}

impl NetworkPortService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, input: CreateNetworkPortRequest) -> Result<NetworkPort> {
        let owner = ItemRef::new(input.itemtype, input.items_id);
        if !owner.itemtype.has_network_ports() {
            return Err(AppError::Validation(format!(
                "{} items cannot have network ports",
                owner.itemtype
            )));
        }
        if self.store.find_asset(owner).await?.is_none() {
            return Err(AppError::Validation(format!("{} does not exist", owner)));
        }
        let instantiation_type = input
            .instantiation_type
            .parse::<InstantiationType>()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let mac = match input.mac.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(normalize_mac(raw)?),
            _ => None,
        };

        let port = self
            .store
            .insert_network_port(&NewNetworkPort {
                owner,
                entities_id: input.entities_id,
                logical_number: input.logical_number,
                name: input.name.trim().to_string(),
                instantiation_type,
                mac,
            })
            .await?;
        tracing::debug!("Added {} port {} to {}", instantiation_type, port.id, owner);
        Ok(port)
    }

    pub async fn get(&self, id: i64) -> Result<NetworkPort> {
        self.store
            .get_network_port(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Network port {} not found", id)))
    }

    pub async fn list_for_item(&self, item: ItemRef) -> Result<Vec<NetworkPort>> {
        self.store.list_network_ports_for_item(item).await
    }

    pub async fn count_for_item(&self, item: ItemRef) -> Result<i64> {
        self.store.count_network_ports_for_item(item).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        if !self.store.delete_network_port(id).await? {
            return Err(AppError::NotFound(format!("Network port {} not found", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::itemtype::ItemType;
    use crate::services::asset_service::test_support::create_asset;
    use crate::services::asset_service::AssetService;
    use crate::store::memory::MemoryStore;

    fn request(item: ItemRef, kind: &str, mac: Option<&str>) -> CreateNetworkPortRequest {
        CreateNetworkPortRequest {
            itemtype: item.itemtype,
            items_id: item.items_id,
            entities_id: 0,
            logical_number: 1,
            name: "eth0".into(),
            instantiation_type: kind.into(),
            mac: mac.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_mac() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let switch = create_asset(&store, ItemType::NetworkEquipment, "sw-01").await;
        let service = NetworkPortService::new(store);

        let port = service
            .create(request(
                switch.item_ref(),
                "NetworkPortEthernet",
                Some("00-1A-2B-3C-4D-5E"),
            ))
            .await
            .unwrap();
        assert_eq!(port.mac.as_deref(), Some("00:1a:2b:3c:4d:5e"));
        assert_eq!(port.owner(), switch.item_ref());
        assert_eq!(service.count_for_item(switch.item_ref()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let pc = create_asset(&store, ItemType::Computer, "pc-01").await;
        let software = create_asset(&store, ItemType::Software, "editor").await;
        let service = NetworkPortService::new(store);

        let err = service
            .create(request(pc.item_ref(), "NetworkPortToaster", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service
            .create(request(pc.item_ref(), "NetworkPortWifi", Some("xyz")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service
            .create(request(software.item_ref(), "NetworkPortLocal", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service
            .create(request(
                ItemRef::new(ItemType::Computer, 999),
                "NetworkPortLocal",
                None,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_ports_removed_with_item() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let pc = create_asset(&store, ItemType::Computer, "pc-01").await;
        let service = NetworkPortService::new(store.clone());
        for _ in 0..2 {
            service
                .create(request(pc.item_ref(), "NetworkPortEthernet", None))
                .await
                .unwrap();
        }

        let summary = AssetService::new(store).purge(pc.id).await.unwrap();
        assert_eq!(summary.network_ports, 2);
        assert_eq!(service.count_for_item(pc.item_ref()).await.unwrap(), 0);
    }
}
