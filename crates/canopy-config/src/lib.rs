pub mod manager;
pub mod types;

pub use manager::{apply_overrides, validate, ConfigError, ConfigManager, CONFIG_FILE_NAME};
pub use types::{CanopyConfig, DiscoverySettings, OutputSettings, ProcessingSettings};
