//! Configuration service abstraction, grounded on subx-cli's `ConfigService`
//! dependency-injection pattern.

use crate::config::Config;
use crate::error::OrchestratorError;
use crate::Result;
use config::{Config as ConfigCrate, Environment, File};
use std::path::PathBuf;
use std::sync::RwLock;

/// Abstracts configuration loading so components never reach into a global.
pub trait ConfigService: Send + Sync {
    /// Return the current configuration.
    fn get_config(&self) -> Result<Config>;

    /// Force a reload from the underlying sources.
    fn reload(&self) -> Result<()>;
}

/// Loads configuration from an optional TOML file plus `INSIGHT_FORGE_*`
/// environment variable overrides, falling back to [`Config::default`].
pub struct ProductionConfigService {
    config_path: Option<PathBuf>,
    cached: RwLock<Config>,
}

impl ProductionConfigService {
    /// Build a service reading `config_path` (if `Some` and present) plus
    /// environment overrides.
    pub fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let cached = Self::load(config_path.as_deref())?;
        Ok(Self {
            config_path,
            cached: RwLock::new(cached),
        })
    }

    fn load(config_path: Option<&std::path::Path>) -> Result<Config> {
        let defaults = Config::default();
        let mut builder = ConfigCrate::builder().add_source(
            config::Config::try_from(&defaults).map_err(OrchestratorError::from_config_crate)?,
        );
        if let Some(path) = config_path {
            if path.exists() {
                builder = builder.add_source(File::from(path.to_path_buf()));
            }
        }
        builder = builder.add_source(
            Environment::with_prefix("INSIGHT_FORGE")
                .separator("__")
                .try_parsing(true),
        );
        let built = builder.build().map_err(OrchestratorError::from_config_crate)?;
        built
            .try_deserialize()
            .map_err(OrchestratorError::from_config_crate)
    }
}

impl ConfigService for ProductionConfigService {
    fn get_config(&self) -> Result<Config> {
        Ok(self.cached.read().expect("config lock poisoned").clone())
    }

    fn reload(&self) -> Result<()> {
        let fresh = Self::load(self.config_path.as_deref())?;
        *self.cached.write().expect("config lock poisoned") = fresh;
        Ok(())
    }
}
