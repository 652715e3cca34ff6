//! Runtime Patch Adapter
//!
//! The matcher stores filter keys, not filters. By default a key whose
//! filter is no longer live is skipped; after [`MatcherPatch::install`] the
//! matcher rebuilds such filters from their text on demand instead.

use crate::engine::{Filter, FilterFactory, FilterHandle, MatchRequest, Matcher};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, info, trace};

/// Patch errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("Matcher patch is already installed")]
    AlreadyInstalled,
}

/// Table of live filters keyed by their text (`Filter.knownFilters`).
#[derive(Default)]
pub struct KnownFilters {
    filters: RefCell<HashMap<String, FilterHandle>>,
}

impl KnownFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, text: &str) -> Option<FilterHandle> {
        self.filters.borrow().get(text).cloned()
    }

    pub fn insert(&self, filter: FilterHandle) {
        self.filters.borrow_mut().insert(filter.text().to_string(), filter);
    }

    pub fn remove(&self, text: &str) -> Option<FilterHandle> {
        self.filters.borrow_mut().remove(text)
    }

    pub fn contains(&self, text: &str) -> bool {
        self.filters.borrow().contains_key(text)
    }

    pub fn len(&self) -> usize {
        self.filters.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for KnownFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnownFilters").field("len", &self.len()).finish()
    }
}

/// Turns a filter key into a live filter.
pub trait FilterResolver {
    fn resolve(&self, key: &str) -> Option<FilterHandle>;
}

/// Unpatched lookup: only filters already in the table.
pub struct KnownFiltersOnly {
    known: Rc<KnownFilters>,
}

impl KnownFiltersOnly {
    pub fn new(known: Rc<KnownFilters>) -> Self {
        Self { known }
    }
}

impl FilterResolver for KnownFiltersOnly {
    fn resolve(&self, key: &str) -> Option<FilterHandle> {
        self.known.get(key)
    }
}

/// Patched lookup: parse and register filters missing from the table.
pub struct ConstructOnDemand {
    known: Rc<KnownFilters>,
    factory: Rc<dyn FilterFactory>,
}

impl ConstructOnDemand {
    pub fn new(known: Rc<KnownFilters>, factory: Rc<dyn FilterFactory>) -> Self {
        Self { known, factory }
    }
}

impl FilterResolver for ConstructOnDemand {
    fn resolve(&self, key: &str) -> Option<FilterHandle> {
        if let Some(filter) = self.known.get(key) {
            return Some(filter);
        }

        trace!("Constructing filter on demand: {}", key);
        let filter = self.factory.from_text(key)?;
        self.known.insert(filter.clone());
        Some(filter)
    }
}

/// The resolver a matcher consults, swappable exactly once.
pub struct ResolverSlot {
    resolver: RefCell<Rc<dyn FilterResolver>>,
    patched: Cell<bool>,
}

impl ResolverSlot {
    /// Slot with the unpatched lookup over `known`.
    pub fn new(known: Rc<KnownFilters>) -> Self {
        Self {
            resolver: RefCell::new(Rc::new(KnownFiltersOnly::new(known))),
            patched: Cell::new(false),
        }
    }

    pub fn resolver(&self) -> Rc<dyn FilterResolver> {
        self.resolver.borrow().clone()
    }

    pub fn is_patched(&self) -> bool {
        self.patched.get()
    }

    fn patch(&self, resolver: Rc<dyn FilterResolver>) -> Result<(), PatchError> {
        if self.patched.replace(true) {
            return Err(PatchError::AlreadyInstalled);
        }
        *self.resolver.borrow_mut() = resolver;
        Ok(())
    }
}

impl fmt::Debug for ResolverSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverSlot")
            .field("patched", &self.patched.get())
            .finish_non_exhaustive()
    }
}

/// The matcher's entry-match routine: first filter behind `keys` that
/// matches `request`.
pub fn check_entry_match(
    resolver: &dyn FilterResolver,
    keys: &[String],
    request: &MatchRequest<'_>,
) -> Option<FilterHandle> {
    keys.iter().find_map(|key| {
        let Some(filter) = resolver.resolve(key) else {
            debug!("Skipping unknown filter {}", key);
            return None;
        };
        filter.matches(request).then_some(filter)
    })
}

/// One-time startup step making the matcher construct filters on demand.
pub struct MatcherPatch;

impl MatcherPatch {
    pub fn install(
        matcher: &dyn Matcher,
        known: Rc<KnownFilters>,
        factory: Rc<dyn FilterFactory>,
    ) -> Result<(), PatchError> {
        matcher
            .resolver_slot()
            .patch(Rc::new(ConstructOnDemand::new(known, factory)))?;
        info!("Matcher now constructs filters on demand");
        Ok(())
    }
}
