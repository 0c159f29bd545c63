pub mod config;
pub mod error;

pub use config::{config_path, Config, EmptyReleases, RegistryConfig, UpstreamConfig};
pub use error::{ConfigError, Result};
