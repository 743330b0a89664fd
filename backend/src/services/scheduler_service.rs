//! Background task scheduler.
//!
//! Runs due cron tasks, prunes their logs, and refreshes metric gauges.

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};

use crate::config::Config;
use crate::services::cron_service::CronService;
use crate::services::metrics_service;
use crate::store::{AssetStore, Store, UserStore};

/// Spawn all background scheduler tasks (fire-and-forget).
pub fn spawn_all(store: Arc<dyn Store>, cron: Arc<CronService>, config: &Config) {
    // Internal cron mode
    {
        let tick = Duration::from_secs(config.scheduler_tick_secs.max(1));
        tokio::spawn(async move {
            // Initial delay to let the server start up
            tokio::time::sleep(Duration::from_secs(30)).await;
            let mut ticker = interval(tick);

            loop {
                ticker.tick().await;
                let now = Utc::now();
                match cron.run_due(now).await {
                    Ok(0) => {}
                    Ok(ran) => tracing::debug!("Ran {} due cron task(s)", ran),
                    Err(e) => tracing::warn!("Failed to run due cron tasks: {}", e),
                }
                if let Err(e) = cron.prune_logs(now).await {
                    tracing::warn!("Failed to prune cron logs: {}", e);
                }
            }
        });
    }

    // Gauge metrics updater (every 5 minutes)
    {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            let mut ticker = interval(Duration::from_secs(300)); // 5 minutes

            loop {
                ticker.tick().await;
                if let Err(e) = update_gauge_metrics(store.as_ref()).await {
                    tracing::warn!("Failed to update gauge metrics: {}", e);
                }
            }
        });
    }

    tracing::info!("Background schedulers started: cron, gauge metrics");
}

/// Update Prometheus gauge metrics from store state.
pub async fn update_gauge_metrics(store: &dyn Store) -> crate::error::Result<()> {
    for (itemtype, count) in store.count_assets_by_type().await? {
        metrics_service::set_asset_gauge(itemtype, count);
    }
    metrics_service::set_user_gauge(store.count_users().await?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::itemtype::ItemType;
    use crate::services::asset_service::test_support::create_asset;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn test_update_gauge_metrics() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        create_asset(&store, ItemType::Computer, "pc-01").await;
        create_asset(&store, ItemType::Printer, "prn-01").await;
        assert!(update_gauge_metrics(store.as_ref()).await.is_ok());
    }
}
