//! Prometheus metrics.
//!
//! The recorder is installed once at startup; the handle renders the
//! exposition text served at `/metrics`.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::{AppError, Result};
use crate::models::cron_task::CronStatus;
use crate::models::itemtype::ItemType;

/// Install the global Prometheus recorder.
pub fn init_metrics() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| AppError::Internal(format!("Failed to install metrics recorder: {}", e)))
}

pub fn record_cron_run(task: &str, status: CronStatus, volume: i64) {
    counter!(
        "asset_keeper_cron_runs_total",
        "task" => task.to_string(),
        "status" => status.as_str()
    )
    .increment(1);
    if volume > 0 {
        counter!("asset_keeper_cron_volume_total", "task" => task.to_string())
            .increment(volume as u64);
    }
}

pub fn record_users_locked(count: u64) {
    counter!("asset_keeper_users_locked_total").increment(count);
}

pub fn record_notification(event: &'static str) {
    counter!("asset_keeper_notifications_total", "event" => event).increment(1);
}

pub fn record_purge(itemtype: ItemType) {
    counter!("asset_keeper_assets_purged_total", "itemtype" => itemtype.as_str()).increment(1);
}

pub fn set_asset_gauge(itemtype: ItemType, count: i64) {
    gauge!("asset_keeper_assets", "itemtype" => itemtype.as_str()).set(count as f64);
}

pub fn set_user_gauge(count: i64) {
    gauge!("asset_keeper_users").set(count as f64);
}
