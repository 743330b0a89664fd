//! HTTP API: shared state, router and handlers.

pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod validation;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::services::cron_service::CronService;
use crate::services::encryption::SecretBox;
use crate::services::notification_service::{NotificationService, Notifier};
use crate::services::settings_service::SettingsService;
use crate::services::software_service::SoftwareService;
use crate::services::user_service::UserService;
use crate::store::Store;

/// Application state shared across handlers.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub settings: Arc<SettingsService>,
    pub notifications: Arc<NotificationService>,
    pub users: Arc<UserService>,
    pub cron: Arc<CronService>,
    /// Absent when no recorder is installed (tests).
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        secret: SecretBox,
        notifier: Arc<dyn Notifier>,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Self {
        let settings = Arc::new(SettingsService::new(store.clone(), secret));
        let notifications = Arc::new(NotificationService::new(store.clone(), notifier));
        let users = Arc::new(UserService::new(
            store.clone(),
            settings.clone(),
            notifications.clone(),
            config.bcrypt_cost,
        ));
        let cron = Arc::new(CronService::new(
            store.clone(),
            settings.clone(),
            notifications.clone(),
            Arc::new(SoftwareService::new(store.clone())),
        ));

        Self {
            config,
            store,
            settings,
            notifications,
            users,
            cron,
            metrics_handle,
        }
    }
}

pub type SharedState = Arc<AppState>;
