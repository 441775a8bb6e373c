//! Configuration management for the telemetry push engine.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Component-wise validation
mod engine;
mod registry;
pub use engine::*;
pub use registry::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::TreePath;

/// Main configuration container for the push engine components
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables with `PUSH__` prefix (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct PushConfig {
    /// Scheduling and delivery parameters
    #[serde(default)]
    pub engine: EngineConfig,
    /// Subscription id allocation and store mirroring
    #[serde(default)]
    pub registry: RegistryConfig,
}

impl Debug for PushConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PushConfig")
            .field("engine", &self.engine)
            .field("registry", &self.registry)
            .finish()
    }
}

impl PushConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Callers MUST call `validate()` once all overrides are applied.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/push.toml");
    /// std::env::set_var("PUSH__ENGINE__CLOSE_TIMEOUT_MS", "500");
    /// let cfg = PushConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("PUSH")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("PUSH")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.engine.validate()?;
        self.registry.validate()?;
        Ok(self)
    }
}

/// Ensures a configured tree path is absolute.
pub(super) fn validate_tree_path(
    raw: &str,
    name: &str,
) -> Result<TreePath> {
    if !raw.starts_with('/') {
        return Err(Error::Config(ConfigError::Message(format!(
            "{name} must be an absolute path, got '{raw}'"
        ))));
    }
    Ok(TreePath::from(raw))
}
