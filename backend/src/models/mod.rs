// Core models
pub mod remote_config;

// Re-export commonly used types
pub use remote_config::*;
