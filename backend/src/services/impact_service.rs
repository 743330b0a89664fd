//! Impact relations: "if the source fails, the impacted item is affected".

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::impact_relation::{ImpactRelation, ImpactRelationInput};
use crate::models::itemtype::ItemRef;
use crate::store::{AssetStore, ImpactStore, Store};

pub struct ImpactService {
    store: Arc<dyn Store>,
}

impl ImpactService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Checks run in order: completeness, self-link, duplicate, existence.
    pub async fn create(&self, input: &ImpactRelationInput) -> Result<ImpactRelation> {
        let Some((source, impacted)) = input.endpoints() else {
            return Err(AppError::Validation(
                "Source and impacted items are both required".to_string(),
            ));
        };
        if source == impacted {
            return Err(AppError::Validation(
                "An item cannot impact itself".to_string(),
            ));
        }
        if self
            .store
            .find_impact_relation(source, impacted)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "{} already impacts {}",
                source, impacted
            )));
        }
        for item in [source, impacted] {
            if self.store.find_asset(item).await?.is_none() {
                return Err(AppError::Validation(format!("{} does not exist", item)));
            }
        }

        let relation = self.store.insert_impact_relation(source, impacted).await?;
        tracing::info!("Recorded impact {} -> {}", source, impacted);
        Ok(relation)
    }

    /// Id of the relation described by the input, if it is recorded.
    pub async fn id_from_input(&self, input: &ImpactRelationInput) -> Result<Option<i64>> {
        match input.endpoints() {
            Some((source, impacted)) => self.store.find_impact_relation(source, impacted).await,
            None => Ok(None),
        }
    }

    pub async fn list_for_item(&self, item: ItemRef) -> Result<Vec<ImpactRelation>> {
        self.store.list_impact_relations_for_item(item).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        if !self.store.delete_impact_relation(id).await? {
            return Err(AppError::NotFound(format!(
                "Impact relation {} not found",
                id
            )));
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

    async fn setup() -> (Arc<dyn Store>, ItemRef, ItemRef) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let server = create_asset(&store, ItemType::Computer, "srv-01").await;
        let switch = create_asset(&store, ItemType::NetworkEquipment, "sw-01").await;
        (store, switch.item_ref(), server.item_ref())
    }

    #[tokio::test]
    async fn test_missing_field() {
        let (store, source, _) = setup().await;
        let service = ImpactService::new(store);
        let input = ImpactRelationInput {
            itemtype_source: Some(source.itemtype),
            items_id_source: Some(source.items_id),
            itemtype_impacted: Some(ItemType::Computer),
            items_id_impacted: None,
        };
        assert!(matches!(
            service.create(&input).await.unwrap_err(),
            AppError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_self_relation_rejected() {
        let (store, source, _) = setup().await;
        let service = ImpactService::new(store);
        let err = service
            .create(&ImpactRelationInput::between(source, source))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_duplicate_rejected() {
        let (store, source, impacted) = setup().await;
        let service = ImpactService::new(store);
        let input = ImpactRelationInput::between(source, impacted);
        let relation = service.create(&input).await.unwrap();
        assert_eq!(relation.source(), source);
        assert_eq!(relation.impacted(), impacted);

        assert!(matches!(
            service.create(&input).await.unwrap_err(),
            AppError::Conflict(_)
        ));
        // The reverse direction is a different relation.
        service
            .create(&ImpactRelationInput::between(impacted, source))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_detected_before_existence() {
        let (store, source, impacted) = setup().await;
        let service = ImpactService::new(store.clone());
        service
            .create(&ImpactRelationInput::between(source, impacted))
            .await
            .unwrap();
        // Trashing keeps the row, so the pair is still a duplicate.
        AssetService::new(store)
            .delete(impacted.items_id)
            .await
            .unwrap();
        assert!(matches!(
            service
                .create(&ImpactRelationInput::between(source, impacted))
                .await
                .unwrap_err(),
            AppError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_unknown_asset_rejected() {
        let (store, source, _) = setup().await;
        let service = ImpactService::new(store);
        let ghost = ItemRef::new(ItemType::Printer, 404);
        let err = service
            .create(&ImpactRelationInput::between(source, ghost))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_id_from_input() {
        let (store, source, impacted) = setup().await;
        let service = ImpactService::new(store);
        let input = ImpactRelationInput::between(source, impacted);
        assert_eq!(service.id_from_input(&input).await.unwrap(), None);

        let relation = service.create(&input).await.unwrap();
        assert_eq!(
            service.id_from_input(&input).await.unwrap(),
            Some(relation.id)
        );
        assert_eq!(
            service
                .id_from_input(&ImpactRelationInput::default())
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_relations_follow_purge() {
        let (store, source, impacted) = setup().await;
        let service = ImpactService::new(store.clone());
        service
            .create(&ImpactRelationInput::between(source, impacted))
            .await
            .unwrap();
        assert_eq!(service.list_for_item(impacted).await.unwrap().len(), 1);

        AssetService::new(store).purge(source.items_id).await.unwrap();
        assert!(service.list_for_item(impacted).await.unwrap().is_empty());
    }
}
