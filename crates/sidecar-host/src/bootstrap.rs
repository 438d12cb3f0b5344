//! Configuration loading seam used by the host binary and tests.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::OrthoError;

use sidecar_config::Config;

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the configuration, treating `args` as the process command line.
    ///
    /// # Errors
    ///
    /// Returns the loader's aggregated error when any layer fails to parse.
    fn load(&self, args: &[OsString]) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that layers defaults, files, environment and `args`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter(args.iter().cloned())
    }
}

/// Loader that always yields a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}
