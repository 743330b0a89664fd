//! Business logic services

pub mod appliance_service;
pub mod asset_service;
pub mod cron_service;
pub mod document_type_service;
pub mod encryption;
pub mod impact_service;
pub mod line_operator_service;
pub mod metrics_service;
pub mod network_port_service;
pub mod notification_service;
pub mod password_expiration;
pub mod password_policy;
pub mod request_context;
pub mod scheduler_service;
pub mod settings_service;
pub mod software_service;
pub mod user_service;
