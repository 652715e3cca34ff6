//! Component Registry
//!
//! Symbolic-name → factory table emulating a capability lookup. Several
//! names may be backed by one factory through an explicit alias table; an
//! alias is resolved to its canonical name when it is created, so chains
//! collapse and no lookup ever falls through implicitly.

use crate::context::ShimContext;
use crate::file::VirtualFile;
use crate::input::LineInputStream;
use crate::json::JsonCodec;
use crate::output::OutputStream;
use crate::timer::RepeatingTimer;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, trace};

/// Symbolic component names the engine asks for.
pub mod contract {
    pub const LOCAL_FILE: &str = "@mozilla.org/file/local;1";
    pub const FILE_INPUT_STREAM: &str = "@mozilla.org/network/file-input-stream;1";
    pub const CONVERTER_INPUT_STREAM: &str = "@mozilla.org/intl/converter-input-stream;1";
    pub const FILE_OUTPUT_STREAM: &str = "@mozilla.org/network/file-output-stream;1";
    pub const SAFE_FILE_OUTPUT_STREAM: &str = "@mozilla.org/network/safe-file-output-stream;1";
    pub const CONVERTER_OUTPUT_STREAM: &str = "@mozilla.org/intl/converter-output-stream;1";
    pub const JSON: &str = "@mozilla.org/dom/json;1";
    pub const TIMER: &str = "@mozilla.org/timer;1";
}

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("No component registered as {0}")]
    Unregistered(String),

    #[error("Component {0} cannot alias itself")]
    SelfAlias(String),

    #[error("Expected a {expected} component, got a {actual}")]
    WrongKind {
        expected: ComponentKind,
        actual: ComponentKind,
    },
}

/// Kind of a [`Component`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    File,
    InputStream,
    OutputStream,
    Timer,
    Json,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::InputStream => "input stream",
            Self::OutputStream => "output stream",
            Self::Timer => "timer",
            Self::Json => "JSON codec",
        };
        f.write_str(name)
    }
}

/// A freshly created component instance.
#[derive(Debug)]
pub enum Component {
    File(VirtualFile),
    InputStream(LineInputStream),
    OutputStream(OutputStream),
    Timer(RepeatingTimer),
    Json(JsonCodec),
}

macro_rules! component_accessor {
    ($method:ident, $variant:ident, $ty:ty) => {
        pub fn $method(self) -> Result<$ty, RegistryError> {
            match self {
                Self::$variant(inner) => Ok(inner),
                other => Err(RegistryError::WrongKind {
                    expected: ComponentKind::$variant,
                    actual: other.kind(),
                }),
            }
        }
    };
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::File(_) => ComponentKind::File,
            Self::InputStream(_) => ComponentKind::InputStream,
            Self::OutputStream(_) => ComponentKind::OutputStream,
            Self::Timer(_) => ComponentKind::Timer,
            Self::Json(_) => ComponentKind::Json,
        }
    }

    component_accessor!(into_file, File, VirtualFile);
    component_accessor!(into_input_stream, InputStream, LineInputStream);
    component_accessor!(into_output_stream, OutputStream, OutputStream);
    component_accessor!(into_timer, Timer, RepeatingTimer);
    component_accessor!(into_json, Json, JsonCodec);
}

/// Factory producing a component for a context.
pub type ComponentFactory = Rc<dyn Fn(&ShimContext) -> Component>;

/// Name → factory table with explicit aliases.
#[derive(Default)]
pub struct ComponentRegistry {
    factories: HashMap<String, ComponentFactory>,
    aliases: HashMap<String, String>,
}

impl ComponentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every component the engine modules look up.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register(contract::LOCAL_FILE, Rc::new(|ctx: &ShimContext| {
            Component::File(VirtualFile::new(ctx, ""))
        }));
        registry.register(contract::FILE_INPUT_STREAM, Rc::new(|_: &ShimContext| {
            Component::InputStream(LineInputStream::new())
        }));
        registry.register(contract::FILE_OUTPUT_STREAM, Rc::new(|_: &ShimContext| {
            Component::OutputStream(OutputStream::new())
        }));
        registry.register(contract::JSON, Rc::new(|_: &ShimContext| {
            Component::Json(JsonCodec::new())
        }));
        registry.register(contract::TIMER, Rc::new(|ctx: &ShimContext| {
            Component::Timer(RepeatingTimer::new(ctx))
        }));

        // Converter and safe streams behave exactly like the plain ones
        let aliases = [
            (contract::CONVERTER_INPUT_STREAM, contract::FILE_INPUT_STREAM),
            (contract::SAFE_FILE_OUTPUT_STREAM, contract::FILE_OUTPUT_STREAM),
            (contract::CONVERTER_OUTPUT_STREAM, contract::FILE_OUTPUT_STREAM),
        ];
        for (alias, target) in aliases {
            registry.aliases.insert(alias.to_string(), target.to_string());
        }

        registry
    }

    /// Register (or replace) a factory under `name`.
    ///
    /// A name previously used as an alias stops being one.
    pub fn register(&mut self, name: &str, factory: ComponentFactory) {
        debug!("Registering component {}", name);
        self.aliases.remove(name);
        self.factories.insert(name.to_string(), factory);
    }

    /// Make `new_name` resolve exactly like `existing`.
    ///
    /// Aliases that pointed at `new_name` follow it to the new target.
    pub fn alias(&mut self, new_name: &str, existing: &str) -> Result<(), RegistryError> {
        let canonical = self.canonical_name(existing).to_string();
        if !self.factories.contains_key(&canonical) {
            return Err(RegistryError::Unregistered(existing.to_string()));
        }
        if canonical == new_name {
            return Err(RegistryError::SelfAlias(new_name.to_string()));
        }

        debug!("Aliasing component {} -> {}", new_name, canonical);
        if self.factories.remove(new_name).is_some() {
            for target in self.aliases.values_mut().filter(|t| t.as_str() == new_name) {
                trace!("Re-pointing alias of {} to {}", new_name, canonical);
                *target = canonical.clone();
            }
        }
        self.aliases.insert(new_name.to_string(), canonical);
        Ok(())
    }

    fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Look up the factory behind `name` (following an alias).
    pub fn resolve(&self, name: &str) -> Result<ComponentFactory, RegistryError> {
        let canonical = self.canonical_name(name);
        trace!("Resolving component {} as {}", name, canonical);
        self.factories
            .get(canonical)
            .cloned()
            .ok_or_else(|| RegistryError::Unregistered(name.to_string()))
    }

    /// Like [`resolve`](Self::resolve), but an unknown name yields `default`.
    pub fn resolve_or(&self, name: &str, default: ComponentFactory) -> ComponentFactory {
        self.resolve(name).unwrap_or(default)
    }

    /// Build a fresh component registered as `name`.
    pub fn create_instance(&self, name: &str, ctx: &ShimContext) -> Result<Component, RegistryError> {
        let factory = self.resolve(name)?;
        Ok(factory(ctx))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Number of resolvable names, aliases included.
    pub fn len(&self) -> usize {
        self.factories.len() + self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("ComponentRegistry")
            .field("factories", &names)
            .field("aliases", &self.aliases)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShimConfig;
    use crate::host::MemoryHost;

    fn ctx() -> ShimContext {
        ShimContext::new(Rc::new(MemoryHost::new()), ShimConfig::default())
    }

    #[test]
    fn test_default_components() {
        let registry = ComponentRegistry::with_defaults();
        let ctx = ctx();

        let kinds = [
            (contract::LOCAL_FILE, ComponentKind::File),
            (contract::FILE_INPUT_STREAM, ComponentKind::InputStream),
            (contract::CONVERTER_INPUT_STREAM, ComponentKind::InputStream),
            (contract::FILE_OUTPUT_STREAM, ComponentKind::OutputStream),
            (contract::SAFE_FILE_OUTPUT_STREAM, ComponentKind::OutputStream),
            (contract::CONVERTER_OUTPUT_STREAM, ComponentKind::OutputStream),
            (contract::JSON, ComponentKind::Json),
            (contract::TIMER, ComponentKind::Timer),
        ];
        for (name, kind) in kinds {
            assert_eq!(registry.create_instance(name, &ctx).unwrap().kind(), kind, "{}", name);
        }
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn test_aliases_share_one_factory() {
        let registry = ComponentRegistry::with_defaults();

        let plain = registry.resolve(contract::FILE_OUTPUT_STREAM).unwrap();
        let safe = registry.resolve(contract::SAFE_FILE_OUTPUT_STREAM).unwrap();
        let converter = registry.resolve(contract::CONVERTER_OUTPUT_STREAM).unwrap();

        assert!(Rc::ptr_eq(&plain, &safe));
        assert!(Rc::ptr_eq(&plain, &converter));
        assert!(registry.is_alias(contract::SAFE_FILE_OUTPUT_STREAM));
        assert!(!registry.is_alias(contract::FILE_OUTPUT_STREAM));
    }

    #[test]
    fn test_alias_chains_collapse() {
        let mut registry = ComponentRegistry::with_defaults();
        registry.alias("@example.org/chained;1", contract::SAFE_FILE_OUTPUT_STREAM).unwrap();

        let chained = registry.resolve("@example.org/chained;1").unwrap();
        let plain = registry.resolve(contract::FILE_OUTPUT_STREAM).unwrap();
        assert!(Rc::ptr_eq(&chained, &plain));
    }

    #[test]
    fn test_alias_back_onto_itself_rejected() {
        let mut registry = ComponentRegistry::with_defaults();

        assert_eq!(
            registry.alias(contract::FILE_OUTPUT_STREAM, contract::SAFE_FILE_OUTPUT_STREAM),
            Err(RegistryError::SelfAlias(contract::FILE_OUTPUT_STREAM.to_string()))
        );
        assert!(registry.alias(contract::JSON, contract::JSON).is_err());

        let plain = registry.resolve(contract::FILE_OUTPUT_STREAM).unwrap();
        let safe = registry.resolve(contract::SAFE_FILE_OUTPUT_STREAM).unwrap();
        assert!(Rc::ptr_eq(&plain, &safe));
        assert!(!registry.is_alias(contract::FILE_OUTPUT_STREAM));
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn test_aliasing_a_target_moves_its_aliases() {
        let mut registry = ComponentRegistry::with_defaults();
        registry.alias(contract::FILE_OUTPUT_STREAM, contract::JSON).unwrap();

        let json = registry.resolve(contract::JSON).unwrap();
        for name in [
            contract::FILE_OUTPUT_STREAM,
            contract::SAFE_FILE_OUTPUT_STREAM,
            contract::CONVERTER_OUTPUT_STREAM,
        ] {
            assert!(Rc::ptr_eq(&registry.resolve(name).unwrap(), &json), "{}", name);
        }
        assert!(registry.is_alias(contract::FILE_OUTPUT_STREAM));
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn test_unknown_names() {
        let mut registry = ComponentRegistry::with_defaults();

        assert_eq!(
            registry.resolve("@example.org/missing;1").err(),
            Some(RegistryError::Unregistered("@example.org/missing;1".to_string()))
        );
        assert!(registry.alias("@example.org/a;1", "@example.org/missing;1").is_err());

        let fallback: ComponentFactory = Rc::new(|_: &ShimContext| Component::Json(JsonCodec::new()));
        let factory = registry.resolve_or("@example.org/missing;1", fallback.clone());
        assert!(Rc::ptr_eq(&factory, &fallback));
    }

    #[test]
    fn test_register_replaces_alias() {
        let mut registry = ComponentRegistry::with_defaults();
        registry.register(contract::SAFE_FILE_OUTPUT_STREAM, Rc::new(|_: &ShimContext| {
            Component::Json(JsonCodec::new())
        }));

        assert!(!registry.is_alias(contract::SAFE_FILE_OUTPUT_STREAM));
        let component = registry.create_instance(contract::SAFE_FILE_OUTPUT_STREAM, &ctx()).unwrap();
        assert_eq!(component.kind(), ComponentKind::Json);
    }

    #[test]
    fn test_typed_accessors() {
        let registry = ComponentRegistry::with_defaults();
        let ctx = ctx();

        assert!(registry.create_instance(contract::TIMER, &ctx).unwrap().into_timer().is_ok());
        let err = registry
            .create_instance(contract::JSON, &ctx)
            .unwrap()
            .into_output_stream()
            .unwrap_err();
        assert!(matches!(
            err,
            RegistryError::WrongKind { expected: ComponentKind::OutputStream, actual: ComponentKind::Json }
        ));
    }
}
