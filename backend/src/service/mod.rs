// Service layer module for BlendBerry
pub mod remote_config_service;

pub use remote_config_service::{ConfigError, RemoteConfigService};
