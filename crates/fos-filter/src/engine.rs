//! Engine Collaborators
//!
//! The filter engine itself (storage, matcher, synchronizer, notifier) is
//! loaded from outside. These traits are the contract the bridge relies on.

use crate::content_type::ContentType;
use crate::patch::{KnownFilters, ResolverSlot};
use crate::third_party::BaseDomain;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// What a filter is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRequest<'a> {
    pub location: &'a str,
    pub content_type: ContentType,
    pub doc_domain: Option<&'a str>,
    pub third_party: bool,
}

/// A parsed filter rule
pub trait Filter {
    /// Filter text as written, also its identity in [`KnownFilters`].
    fn text(&self) -> &str;

    fn matches(&self, request: &MatchRequest<'_>) -> bool;
}

pub type FilterHandle = Rc<dyn Filter>;

/// Parses filter text (`Filter.fromText`).
pub trait FilterFactory {
    fn from_text(&self, text: &str) -> Option<FilterHandle>;
}

/// Request matcher (`defaultMatcher`).
pub trait Matcher {
    fn matches_any(
        &self,
        location: &str,
        content_type: ContentType,
        doc_domain: Option<&str>,
        third_party: bool,
    ) -> Option<FilterHandle>;

    /// Where the matcher looks up filters by key.
    fn resolver_slot(&self) -> &ResolverSlot;
}

/// Kind-specific subscription state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// Fetched from a URL by the synchronizer
    Downloadable {
        /// Seconds since the epoch, 0 when never downloaded
        last_download: u64,
        download_status: Option<String>,
    },
    /// User-defined or built-in group
    Special,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub url: String,
    pub title: String,
    pub homepage: String,
    pub disabled: bool,
    pub kind: SubscriptionKind,
}

pub type SubscriptionHandle = Rc<RefCell<Subscription>>;

impl Subscription {
    pub fn downloadable(url: impl Into<String>) -> Self {
        Self::with_kind(
            url,
            SubscriptionKind::Downloadable {
                last_download: 0,
                download_status: None,
            },
        )
    }

    pub fn special(url: impl Into<String>) -> Self {
        Self::with_kind(url, SubscriptionKind::Special)
    }

    fn with_kind(url: impl Into<String>, kind: SubscriptionKind) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            homepage: String::new(),
            disabled: false,
            kind,
        }
    }

    pub fn into_handle(self) -> SubscriptionHandle {
        Rc::new(RefCell::new(self))
    }

    pub fn is_downloadable(&self) -> bool {
        matches!(self.kind, SubscriptionKind::Downloadable { .. })
    }

    /// Last download time in seconds; 0 for never and for special ones.
    pub fn last_download(&self) -> u64 {
        match self.kind {
            SubscriptionKind::Downloadable { last_download, .. } => last_download,
            SubscriptionKind::Special => 0,
        }
    }

    pub fn download_status(&self) -> Option<&str> {
        match &self.kind {
            SubscriptionKind::Downloadable { download_status, .. } => download_status.as_deref(),
            SubscriptionKind::Special => None,
        }
    }

    pub fn never_downloaded(&self) -> bool {
        self.is_downloadable() && self.last_download() == 0
    }
}

/// Subscription list persistence.
pub trait FilterStorage {
    /// Snapshot of the current subscriptions, in storage order.
    fn subscriptions(&self) -> Vec<SubscriptionHandle>;

    fn add_subscription(&self, subscription: SubscriptionHandle);

    fn remove_subscription(&self, subscription: &SubscriptionHandle);

    fn save_to_disk(&self) -> anyhow::Result<()>;
}

/// `Subscription.fromURL`
pub trait SubscriptionFactory {
    /// `None` when the URL names no valid subscription.
    fn from_url(&self, url: &str) -> Option<SubscriptionHandle>;
}

/// Why a download was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// Scheduled or first-time download; honours expiry and backoff
    Automatic,
    /// User-initiated
    Manual,
    /// User-initiated, ignoring expiry and backoff
    ManualForced,
}

impl SyncTrigger {
    pub fn is_manual(self) -> bool {
        !matches!(self, Self::Automatic)
    }

    pub fn is_forced(self) -> bool {
        matches!(self, Self::ManualForced)
    }
}

/// Downloads subscriptions in the background.
pub trait Synchronizer {
    fn startup(&self);

    fn execute(&self, subscription: &SubscriptionHandle, trigger: SyncTrigger);

    fn is_executing(&self, url: &str) -> bool;
}

/// A filter storage change notification.
#[derive(Debug, Clone)]
pub enum FilterChange {
    SubscriptionAdded(SubscriptionHandle),
    SubscriptionRemoved(SubscriptionHandle),
    SubscriptionLastDownload(SubscriptionHandle),
    SubscriptionDownloadStatus(SubscriptionHandle),
    /// Any other action, by name
    Other(String),
}

impl FilterChange {
    /// Action name as the engine spells it.
    pub fn action(&self) -> &str {
        match self {
            Self::SubscriptionAdded(_) => "subscription.added",
            Self::SubscriptionRemoved(_) => "subscription.removed",
            Self::SubscriptionLastDownload(_) => "subscription.lastDownload",
            Self::SubscriptionDownloadStatus(_) => "subscription.downloadStatus",
            Self::Other(action) => action,
        }
    }
}

pub type FilterListener = Rc<dyn Fn(&FilterChange)>;

/// Listener registration token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Broadcasts [`FilterChange`]s.
///
/// Listeners borrow the subscription they are handed; a change sent while
/// it is still mutably borrowed is skipped.
pub trait FilterNotifier {
    fn add_listener(&self, listener: FilterListener) -> ListenerId;

    /// Returns whether the listener was registered.
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// Every engine module the bridge drives.
#[derive(Clone)]
pub struct EngineModules {
    pub storage: Rc<dyn FilterStorage>,
    pub subscriptions: Rc<dyn SubscriptionFactory>,
    pub synchronizer: Rc<dyn Synchronizer>,
    pub notifier: Rc<dyn FilterNotifier>,
    pub matcher: Rc<dyn Matcher>,
    pub filters: Rc<dyn FilterFactory>,
    pub known_filters: Rc<KnownFilters>,
    pub base_domain: Rc<dyn BaseDomain>,
}

impl fmt::Debug for EngineModules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineModules")
            .field("known_filters", &self.known_filters.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_kinds() {
        let mut sub = Subscription::downloadable("https://easylist.to/easylist.txt");
        assert!(sub.is_downloadable());
        assert!(sub.never_downloaded());
        assert_eq!(sub.download_status(), None);

        sub.kind = SubscriptionKind::Downloadable {
            last_download: 1_700_000_000,
            download_status: Some("synchronize_ok".to_string()),
        };
        assert!(!sub.never_downloaded());
        assert_eq!(sub.last_download(), 1_700_000_000);
        assert_eq!(sub.download_status(), Some("synchronize_ok"));

        let special = Subscription::special("~user~12345");
        assert!(!special.is_downloadable());
        assert!(!special.never_downloaded());
        assert_eq!(special.last_download(), 0);
    }

    #[test]
    fn test_sync_triggers() {
        assert!(!SyncTrigger::Automatic.is_manual());
        assert!(SyncTrigger::Manual.is_manual());
        assert!(!SyncTrigger::Manual.is_forced());
        assert!(SyncTrigger::ManualForced.is_forced());
    }

    #[test]
    fn test_change_action_names() {
        let sub = Subscription::special("~fl~").into_handle();
        assert_eq!(FilterChange::SubscriptionLastDownload(sub.clone()).action(), "subscription.lastDownload");
        assert_eq!(FilterChange::SubscriptionDownloadStatus(sub).action(), "subscription.downloadStatus");
        assert_eq!(FilterChange::Other("filter.hitCount".to_string()).action(), "filter.hitCount");
    }
}
