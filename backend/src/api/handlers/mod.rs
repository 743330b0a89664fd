//! Request handlers, one module per resource.

pub mod appliances;
pub mod assets;
pub mod auth;
pub mod cron;
pub mod document_types;
pub mod dropdown;
pub mod health;
pub mod impacts;
pub mod line_operators;
pub mod network_ports;
pub mod settings;
pub mod software;
pub mod users;
