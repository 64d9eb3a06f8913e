//! In-memory [`ConfigService`] for tests, grounded on subx-cli's
//! `TestConfigService`/`TestConfigBuilder` pair.

use super::ConfigService;
use crate::Result;
use crate::config::Config;
use std::sync::RwLock;

/// A [`ConfigService`] backed by an in-memory [`Config`], mutable via
/// [`TestConfigService::set`] for test setup.
pub struct TestConfigService {
    config: RwLock<Config>,
}

impl TestConfigService {
    /// Build a service seeded with `config`.
    pub fn new(config: Config) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    /// Replace the held configuration.
    pub fn set(&self, config: Config) {
        *self.config.write().expect("config lock poisoned") = config;
    }
}

impl Default for TestConfigService {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl ConfigService for TestConfigService {
    fn get_config(&self) -> Result<Config> {
        Ok(self.config.read().expect("config lock poisoned").clone())
    }

    fn reload(&self) -> Result<()> {
        Ok(())
    }
}
