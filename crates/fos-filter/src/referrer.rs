//! Referrer Mapping
//!
//! Remembers which page referred each request so a blocked resource can be
//! traced back through the frames that loaded it.

use lru::LruCache;
use std::num::NonZeroUsize;

/// Maximum number of remembered requests.
pub const MAX_ENTRIES: usize = 5000;

/// Longest chain returned; referrer loops stop here.
pub const MAX_CHAIN_LENGTH: usize = 10;

/// Access-ordered url → referrer cache.
#[derive(Debug)]
pub struct ReferrerMapping {
    entries: LruCache<String, String>,
}

impl Default for ReferrerMapping {
    fn default() -> Self {
        Self::with_capacity(MAX_ENTRIES)
    }
}

impl ReferrerMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Remember that `url` was requested from `referrer`.
    ///
    /// The least recently used entry is evicted once full.
    pub fn add(&mut self, url: &str, referrer: &str) {
        self.entries.put(url.to_string(), referrer.to_string());
    }

    /// Referrer of `url`, marking the entry as recently used.
    pub fn get(&mut self, url: &str) -> Option<String> {
        self.entries.get(url).cloned()
    }

    /// `url` and its referrers, outermost page first.
    pub fn build_referrer_chain(&mut self, url: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = Some(url.to_string());
        while let Some(url) = current {
            if chain.len() == MAX_CHAIN_LENGTH {
                break;
            }
            current = self.get(&url);
            chain.push(url);
        }
        chain.reverse();
        chain
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
