//! In-memory engine modules for tests.

use crate::content_type::ContentType;
use crate::engine::{
    EngineModules, Filter, FilterChange, FilterFactory, FilterHandle, FilterListener, FilterNotifier, FilterStorage,
    ListenerId, MatchRequest, Matcher, Subscription, SubscriptionFactory, SubscriptionHandle, Synchronizer,
    SyncTrigger,
};
use crate::patch::{check_entry_match, KnownFilters, ResolverSlot};
use crate::third_party::TrailingLabels;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Matches any location containing its text.
pub struct MockFilter {
    text: String,
}

impl MockFilter {
    pub fn new(text: &str) -> Self {
        Self { text: text.to_string() }
    }
}

impl Filter for MockFilter {
    fn text(&self) -> &str {
        &self.text
    }

    fn matches(&self, request: &MatchRequest<'_>) -> bool {
        request.location.contains(&self.text)
    }
}

/// Parses anything except `!` comments.
#[derive(Default)]
pub struct MockFilterFactory {
    created: Cell<usize>,
}

impl MockFilterFactory {
    pub fn created(&self) -> usize {
        self.created.get()
    }
}

impl FilterFactory for MockFilterFactory {
    fn from_text(&self, text: &str) -> Option<FilterHandle> {
        if text.starts_with('!') {
            return None;
        }
        self.created.set(self.created.get() + 1);
        Some(Rc::new(MockFilter::new(text)))
    }
}

/// Owned copy of the last [`MatchRequest`] a matcher saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenRequest {
    pub location: String,
    pub content_type: ContentType,
    pub doc_domain: Option<String>,
    pub third_party: bool,
}

/// Keyword → filter keys, resolved through its slot.
pub struct MockMatcher {
    slot: ResolverSlot,
    keys: RefCell<Vec<(String, String)>>,
    last: RefCell<Option<SeenRequest>>,
}

impl MockMatcher {
    pub fn new(known: Rc<KnownFilters>) -> Self {
        Self {
            slot: ResolverSlot::new(known),
            keys: RefCell::new(Vec::new()),
            last: RefCell::new(None),
        }
    }

    pub fn add_key(&self, keyword: &str, key: &str) {
        self.keys.borrow_mut().push((keyword.to_string(), key.to_string()));
    }

    pub fn last_request(&self) -> Option<SeenRequest> {
        self.last.borrow().clone()
    }
}

impl Matcher for MockMatcher {
    fn matches_any(
        &self,
        location: &str,
        content_type: ContentType,
        doc_domain: Option<&str>,
        third_party: bool,
    ) -> Option<FilterHandle> {
        *self.last.borrow_mut() = Some(SeenRequest {
            location: location.to_string(),
            content_type,
            doc_domain: doc_domain.map(str::to_string),
            third_party,
        });

        let request = MatchRequest {
            location,
            content_type,
            doc_domain,
            third_party,
        };
        let keys: Vec<String> = self
            .keys
            .borrow()
            .iter()
            .filter(|(keyword, _)| location.contains(keyword.as_str()))
            .map(|(_, key)| key.clone())
            .collect();
        check_entry_match(self.slot.resolver().as_ref(), &keys, &request)
    }

    fn resolver_slot(&self) -> &ResolverSlot {
        &self.slot
    }
}

#[derive(Default)]
pub struct MockStorage {
    subscriptions: RefCell<Vec<SubscriptionHandle>>,
    saves: Cell<usize>,
    fail_saves: Cell<bool>,
}

impl MockStorage {
    pub fn saves(&self) -> usize {
        self.saves.get()
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.set(fail);
    }
}

impl FilterStorage for MockStorage {
    fn subscriptions(&self) -> Vec<SubscriptionHandle> {
        self.subscriptions.borrow().clone()
    }

    fn add_subscription(&self, subscription: SubscriptionHandle) {
        let mut subscriptions = self.subscriptions.borrow_mut();
        if !subscriptions.iter().any(|s| Rc::ptr_eq(s, &subscription)) {
            subscriptions.push(subscription);
        }
    }

    fn remove_subscription(&self, subscription: &SubscriptionHandle) {
        self.subscriptions.borrow_mut().retain(|s| !Rc::ptr_eq(s, subscription));
    }

    fn save_to_disk(&self) -> anyhow::Result<()> {
        if self.fail_saves.get() {
            anyhow::bail!("disk full");
        }
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

/// `http(s)://` URLs are downloadable, `~` URLs special, the rest invalid.
#[derive(Default)]
pub struct MockSubscriptionFactory {
    known: RefCell<HashMap<String, SubscriptionHandle>>,
}

impl MockSubscriptionFactory {
    /// Hand out this subscription for its URL from now on.
    pub fn prepare(&self, subscription: Subscription) {
        let url = subscription.url.clone();
        self.known.borrow_mut().insert(url, subscription.into_handle());
    }
}

impl SubscriptionFactory for MockSubscriptionFactory {
    fn from_url(&self, url: &str) -> Option<SubscriptionHandle> {
        if let Some(existing) = self.known.borrow().get(url) {
            return Some(existing.clone());
        }

        let subscription = if url.starts_with("http://") || url.starts_with("https://") {
            Subscription::downloadable(url)
        } else if url.starts_with('~') {
            Subscription::special(url)
        } else {
            return None;
        };
        let handle = subscription.into_handle();
        self.known.borrow_mut().insert(url.to_string(), handle.clone());
        Some(handle)
    }
}

#[derive(Default)]
pub struct MockSynchronizer {
    startups: Cell<usize>,
    executions: RefCell<Vec<(String, SyncTrigger)>>,
    executing: RefCell<HashSet<String>>,
}

impl MockSynchronizer {
    pub fn startups(&self) -> usize {
        self.startups.get()
    }

    pub fn executions(&self) -> Vec<(String, SyncTrigger)> {
        self.executions.borrow().clone()
    }

    pub fn set_executing(&self, url: &str, executing: bool) {
        let mut urls = self.executing.borrow_mut();
        if executing {
            urls.insert(url.to_string());
        } else {
            urls.remove(url);
        }
    }
}

impl Synchronizer for MockSynchronizer {
    fn startup(&self) {
        self.startups.set(self.startups.get() + 1);
    }

    fn execute(&self, subscription: &SubscriptionHandle, trigger: SyncTrigger) {
        let url = subscription.borrow().url.clone();
        self.executions.borrow_mut().push((url, trigger));
    }

    fn is_executing(&self, url: &str) -> bool {
        self.executing.borrow().contains(url)
    }
}

#[derive(Default)]
pub struct MockNotifier {
    listeners: RefCell<Vec<(ListenerId, FilterListener)>>,
    next_id: Cell<u64>,
}

impl MockNotifier {
    pub fn notify(&self, change: &FilterChange) {
        let listeners: Vec<FilterListener> = self.listeners.borrow().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(change);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl FilterNotifier for MockNotifier {
    fn add_listener(&self, listener: FilterListener) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }
}

/// Concrete handles to every mock, plus their [`EngineModules`] view.
pub struct MockEngine {
    pub storage: Rc<MockStorage>,
    pub subscriptions: Rc<MockSubscriptionFactory>,
    pub synchronizer: Rc<MockSynchronizer>,
    pub notifier: Rc<MockNotifier>,
    pub matcher: Rc<MockMatcher>,
    pub filters: Rc<MockFilterFactory>,
    pub known_filters: Rc<KnownFilters>,
}

impl MockEngine {
    pub fn new() -> Self {
        let known_filters = Rc::new(KnownFilters::new());
        Self {
            storage: Rc::default(),
            subscriptions: Rc::default(),
            synchronizer: Rc::default(),
            notifier: Rc::default(),
            matcher: Rc::new(MockMatcher::new(known_filters.clone())),
            filters: Rc::default(),
            known_filters,
        }
    }

    pub fn modules(&self) -> EngineModules {
        EngineModules {
            storage: self.storage.clone(),
            subscriptions: self.subscriptions.clone(),
            synchronizer: self.synchronizer.clone(),
            notifier: self.notifier.clone(),
            matcher: self.matcher.clone(),
            filters: self.filters.clone(),
            known_filters: self.known_filters.clone(),
            base_domain: Rc::new(TrailingLabels::default()),
        }
    }
}
