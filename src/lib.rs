pub mod clock;
pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod domain;
pub mod email_client;
pub mod quotes;
pub mod startup;
pub mod store;
pub mod summary;
pub mod telemetry;
