use crate::types::CanopyConfig;
use canopy_fs::{FileSystem, NativeFileSystem};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Name of the configuration file looked up next to the analysed input.
pub const CONFIG_FILE_NAME: &str = "canopy.toml";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Config file not found at {0}")]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Loads `canopy.toml` and applies `CANOPY_*` environment overrides.
///
/// Lookup order when no explicit path is given: `canopy.toml` in the target
/// directory (or the target file's directory), then the user config
/// directory (`<config dir>/canopy/canopy.toml`). Without either file the
/// defaults are used.
#[derive(Debug)]
pub struct ConfigManager<F: FileSystem + ?Sized = NativeFileSystem> {
    fs: Arc<F>,
    config_path: Option<PathBuf>,
    config: CanopyConfig,
}

impl ConfigManager {
    /// `<user config dir>/canopy/canopy.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("canopy").join(CONFIG_FILE_NAME))
    }

    /// Finds and loads the configuration for `target`.
    pub async fn discover(target: &Path) -> Result<Self, ConfigError> {
        let fs = Arc::new(NativeFileSystem::unscoped(".")?);
        let anchor = if fs.metadata(target).await?.is_dir {
            target.to_path_buf()
        } else {
            target.parent().map(Path::to_path_buf).unwrap_or_default()
        };

        let mut candidates = vec![anchor.join(CONFIG_FILE_NAME)];
        candidates.extend(Self::user_config_path());
        Self::discover_with_filesystem(fs, &candidates).await
    }

    /// Loads an explicitly named configuration file.
    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let fs = Arc::new(NativeFileSystem::unscoped(".")?);
        Self::load_with_filesystem(fs, path).await
    }
}

impl<F: FileSystem + ?Sized> ConfigManager<F> {
    /// Load config with a custom FileSystem
    pub async fn load_with_filesystem(fs: Arc<F>, path: &Path) -> Result<Self, ConfigError> {
        if !fs.exists(path).await? {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }
        let contents = fs.read_to_string(path).await?;
        let config: CanopyConfig = toml::from_str(&contents)?;
        debug!("Loaded configuration from {}", path.display());

        Ok(Self {
            fs,
            config_path: Some(path.to_path_buf()),
            config: finish(config)?,
        })
    }

    /// Loads the first existing file among `candidates`, or the defaults.
    pub async fn discover_with_filesystem(
        fs: Arc<F>,
        candidates: &[PathBuf],
    ) -> Result<Self, ConfigError> {
        for candidate in candidates {
            if fs.metadata(candidate).await?.is_file {
                return Self::load_with_filesystem(fs, candidate).await;
            }
        }
        Self::defaults(fs)
    }

    /// Built-in defaults plus environment overrides.
    pub fn defaults(fs: Arc<F>) -> Result<Self, ConfigError> {
        Ok(Self {
            fs,
            config_path: None,
            config: finish(CanopyConfig::default())?,
        })
    }

    /// Path of the loaded file, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn config(&self) -> &CanopyConfig {
        &self.config
    }

    /// Get mutable reference to config (CLI flags are applied through this)
    pub fn config_mut(&mut self) -> &mut CanopyConfig {
        &mut self.config
    }

    pub fn into_config(self) -> CanopyConfig {
        self.config
    }

    pub fn filesystem(&self) -> &Arc<F> {
        &self.fs
    }

    /// Effective configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&self.config)?)
    }
}

fn finish(mut config: CanopyConfig) -> Result<CanopyConfig, ConfigError> {
    apply_overrides(&mut config, |name| std::env::var(name).ok());
    validate(&config)?;
    Ok(config)
}

fn env_override<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, var: &str, target: &mut T) {
    if let Some(value) = lookup(var) {
        match value.trim().parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!("Ignoring {}={:?}: not a valid value", var, value),
        }
    }
}

/// Applies `CANOPY_*` overrides read through `lookup`.
pub fn apply_overrides(config: &mut CanopyConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(value) = lookup("CANOPY_MAX_CONCURRENCY") {
        match value.trim().parse::<usize>() {
            Ok(n) => config.processing.max_concurrency = Some(n),
            Err(_) => warn!("Ignoring CANOPY_MAX_CONCURRENCY={:?}: not a number", value),
        }
    }
    env_override(
        &lookup,
        "CANOPY_PARALLEL_CHILD_THRESHOLD",
        &mut config.processing.parallel_child_threshold,
    );
    env_override(
        &lookup,
        "CANOPY_MAX_SOURCE_TEXT_LENGTH",
        &mut config.processing.max_source_text_length,
    );
    env_override(
        &lookup,
        "CANOPY_REJECT_SYNTAX_ERRORS",
        &mut config.processing.reject_syntax_errors,
    );
}

/// Checks value ranges that the TOML schema cannot express.
pub fn validate(config: &CanopyConfig) -> Result<(), ConfigError> {
    if config.processing.max_concurrency == Some(0) {
        return Err(ConfigError::Invalid(
            "processing.max_concurrency must be at least 1".to_string(),
        ));
    }
    if config.discovery.max_file_size == 0 {
        return Err(ConfigError::Invalid(
            "discovery.max_file_size must be greater than 0".to_string(),
        ));
    }
    Ok(())
}
