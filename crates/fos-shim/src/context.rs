//! Shim Context
//!
//! Replaces the engine's ambient globals (host bridge, preferences, utils)
//! with explicit objects passed to every component at construction.

use crate::config::{ConfigError, ShimConfig};
use crate::host::Host;
use crate::prefs::Prefs;
use crate::registry::{Component, ComponentRegistry, RegistryError};
use crate::utils::Utils;
use std::fmt;
use std::rc::Rc;
use tracing::info;

/// Host handle plus configuration, cheap to clone.
#[derive(Clone)]
pub struct ShimContext {
    host: Rc<dyn Host>,
    config: Rc<ShimConfig>,
}

impl ShimContext {
    pub fn new(host: Rc<dyn Host>, config: ShimConfig) -> Self {
        Self {
            host,
            config: Rc::new(config),
        }
    }

    pub fn host(&self) -> &Rc<dyn Host> {
        &self.host
    }

    pub fn config(&self) -> &ShimConfig {
        &self.config
    }

    /// Separator used when appending path segments.
    pub fn separator(&self) -> char {
        self.config.path_separator
    }
}

impl fmt::Debug for ShimContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShimContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Everything the engine modules expect to find in their environment.
///
/// Built once at startup; the component table is fixed from then on.
pub struct ShimEnvironment {
    context: ShimContext,
    registry: Rc<ComponentRegistry>,
    prefs: Prefs,
    utils: Utils,
}

impl ShimEnvironment {
    /// Validate `config` and assemble the default component table.
    pub fn new(host: Rc<dyn Host>, config: ShimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let context = ShimContext::new(host, config);
        let registry = Rc::new(ComponentRegistry::with_defaults());

        info!(
            "Shim environment ready: {} components, data in {}",
            registry.len(),
            context.config().data_directory.display()
        );

        Ok(Self {
            prefs: Prefs::new(context.clone()),
            utils: Utils::new(context.clone()),
            context,
            registry,
        })
    }

    pub fn context(&self) -> &ShimContext {
        &self.context
    }

    pub fn registry(&self) -> &Rc<ComponentRegistry> {
        &self.registry
    }

    pub fn prefs(&self) -> &Prefs {
        &self.prefs
    }

    pub fn utils(&self) -> &Utils {
        &self.utils
    }

    /// Create a fresh component by its symbolic name.
    pub fn create_instance(&self, name: &str) -> Result<Component, RegistryError> {
        self.registry.create_instance(name, &self.context)
    }
}
