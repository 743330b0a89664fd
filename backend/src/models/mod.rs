//! Domain models (SQLx rows and request payloads).

pub mod alert;
pub mod appliance;
pub mod asset;
pub mod cron_task;
pub mod document_type;
pub mod impact_relation;
pub mod itemtype;
pub mod line_operator;
pub mod network_port;
pub mod software;
pub mod user;
