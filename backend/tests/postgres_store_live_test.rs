//! Live integration test for the PostgreSQL store.
//!
//! Requires env vars:
//!   DATABASE_URL (an empty, disposable database)
//!
//! Run with:
//!   cargo test --test postgres_store_live_test -- --ignored --nocapture

use asset_keeper_backend::models::asset::CreateAssetRequest;
use asset_keeper_backend::models::itemtype::{ItemRef, ItemType};
use asset_keeper_backend::services::cron_service::builtin_tasks;
use asset_keeper_backend::store::postgres::PgStore;
use asset_keeper_backend::store::{ApplianceStore, AssetStore, CronStore, ImpactStore};
use chrono::Utc;
use sqlx::postgres::PgPoolOptions;

async fn store() -> PgStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("Failed to connect");
    let store = PgStore::new(pool);
    store.migrate().await.expect("Failed to migrate");
    store
}

fn asset(itemtype: ItemType, name: &str) -> CreateAssetRequest {
    CreateAssetRequest {
        itemtype,
        name: name.to_string(),
        entities_id: 0,
        serial: None,
        otherserial: None,
        comment: None,
    }
}

#[tokio::test]
#[ignore]
async fn test_purge_removes_relations() {
    let store = store().await;
    let suffix = Utc::now().timestamp_nanos_opt().unwrap_or_default();

    let server = store
        .insert_asset(&asset(ItemType::Computer, &format!("srv-{}", suffix)))
        .await
        .unwrap();
    let app = store
        .insert_asset(&asset(ItemType::Appliance, &format!("app-{}", suffix)))
        .await
        .unwrap();
    let printer = store
        .insert_asset(&asset(ItemType::Printer, &format!("prn-{}", suffix)))
        .await
        .unwrap();

    store
        .insert_impact_relation(server.item_ref(), printer.item_ref())
        .await
        .unwrap();
    store
        .insert_appliance_item(app.id, server.item_ref())
        .await
        .unwrap();

    let summary = store.purge_asset(server.item_ref()).await.unwrap();
    assert_eq!(summary.impact_relations, 1);
    assert_eq!(summary.appliance_items, 1);
    assert!(store
        .find_asset(ItemRef::new(ItemType::Computer, server.id))
        .await
        .unwrap()
        .is_none());
    assert!(store
        .list_impact_relations_for_item(printer.item_ref())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
#[ignore]
async fn test_cron_claim_is_exclusive() {
    let store = store().await;
    let [definition, _] = builtin_tasks();
    store.register_cron_task(&definition).await.unwrap();
    let task = store
        .get_cron_task(definition.name)
        .await
        .unwrap()
        .expect("task registered");

    assert!(store.claim_cron_task(task.id).await.unwrap());
    assert!(!store.claim_cron_task(task.id).await.unwrap());
    store
        .release_cron_task(task.id, task.state, Utc::now())
        .await
        .unwrap();
    assert!(store.claim_cron_task(task.id).await.unwrap());
    store
        .release_cron_task(task.id, task.state, Utc::now())
        .await
        .unwrap();
}
