//! Filter Bridge
//!
//! The function surface the host calls into: engine startup, subscription
//! management, interactive status updates and request matching.

use crate::classifier::{ClassificationRequest, ClassifierConfig, RequestClassifier};
use crate::engine::{EngineModules, FilterChange, FilterListener, ListenerId, Synchronizer, SyncTrigger};
use crate::patch::{MatcherPatch, PatchError};
use crate::referrer::ReferrerMapping;
use crate::request::RequestError;
use crate::status::SyncStatus;
use fos_shim::{Host, HostError, ShimContext};
use serde::Deserialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Modules loaded before the matcher patch and synchronizer start.
pub const ENGINE_MODULES: &[&str] = &[
    "XMLHttpRequest",
    "FilterNotifier",
    "FilterClasses",
    "SubscriptionClasses",
    "FilterStorage",
    "FilterListener",
    "Matcher",
    "ElemHide",
    "Synchronizer",
];

/// Domain helpers loaded once the engine is running.
pub const DOMAIN_MODULES: &[&str] = &["publicSuffixList", "punycode", "basedomain"];

/// Bridge errors
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Failed to load module {module}: {source}")]
    Load {
        module: String,
        #[source]
        source: HostError,
    },

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error("Invalid subscription description: {0}")]
    InvalidSubscription(#[source] serde_json::Error),

    #[error("Failed to save filter storage: {0}")]
    Storage(#[source] anyhow::Error),

    #[error(transparent)]
    Request(#[from] RequestError),
}

/// What `addSubscription` receives from the host.
#[derive(Debug, Deserialize)]
struct SubscriptionInfo {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    homepage: String,
}

pub struct FilterBridge {
    ctx: ShimContext,
    modules: EngineModules,
    classifier: RequestClassifier,
    referrers: RefCell<ReferrerMapping>,
    listener: Cell<Option<ListenerId>>,
}

impl FilterBridge {
    pub fn new(ctx: ShimContext, modules: EngineModules, config: ClassifierConfig) -> Self {
        let classifier = RequestClassifier::new(config, modules.base_domain.clone());
        Self {
            ctx,
            modules,
            classifier,
            referrers: RefCell::new(ReferrerMapping::new()),
            listener: Cell::new(None),
        }
    }

    fn host(&self) -> &dyn Host {
        self.ctx.host().as_ref()
    }

    pub fn modules(&self) -> &EngineModules {
        &self.modules
    }

    pub fn classifier(&self) -> &RequestClassifier {
        &self.classifier
    }

    fn load_modules(&self, names: &[&str]) -> Result<(), BridgeError> {
        for name in names {
            debug!("Loading engine module {}", name);
            self.host().load(name).map_err(|source| BridgeError::Load {
                module: name.to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Load the engine, patch the matcher and start synchronizing.
    pub fn startup(&self) -> Result<(), BridgeError> {
        info!("Starting filter engine");
        self.load_modules(ENGINE_MODULES)?;

        MatcherPatch::install(
            self.modules.matcher.as_ref(),
            self.modules.known_filters.clone(),
            self.modules.filters.clone(),
        )?;
        self.modules.synchronizer.startup();

        self.load_modules(DOMAIN_MODULES)?;
        info!("Filter engine started");
        Ok(())
    }

    /// Remove every subscription from storage.
    pub fn clear_subscriptions(&self) {
        let mut removed = 0;
        loop {
            let Some(first) = self.modules.storage.subscriptions().into_iter().next() else {
                break;
            };
            self.modules.storage.remove_subscription(&first);
            removed += 1;
        }
        info!("Cleared {} subscriptions", removed);
    }

    /// Add a subscription described as `{"url", "title", "homepage"}` JSON.
    ///
    /// URLs the engine does not recognise are ignored.
    pub fn add_subscription(&self, json: &str) -> Result<(), BridgeError> {
        let info: SubscriptionInfo =
            serde_json::from_str(json).map_err(BridgeError::InvalidSubscription)?;

        let Some(subscription) = self.modules.subscriptions.from_url(&info.url) else {
            warn!("Not a subscription URL: {}", info.url);
            return Ok(());
        };

        let never_downloaded = {
            let mut sub = subscription.borrow_mut();
            sub.disabled = false;
            sub.title = info.title;
            sub.homepage = info.homepage;
            sub.never_downloaded()
        };
        if never_downloaded {
            self.modules.synchronizer.execute(&subscription, SyncTrigger::Automatic);
        }

        self.modules.storage.add_subscription(subscription);
        self.modules.storage.save_to_disk().map_err(BridgeError::Storage)?;
        info!("Added subscription {}", info.url);
        Ok(())
    }

    fn execute_downloadable(&self, trigger: SyncTrigger) -> usize {
        let mut executed = 0;
        for subscription in self.modules.storage.subscriptions() {
            if subscription.borrow().is_downloadable() {
                self.modules.synchronizer.execute(&subscription, trigger);
                executed += 1;
            }
        }
        executed
    }

    /// Download every subscription now, ignoring expiry.
    pub fn refresh_subscriptions(&self) {
        let count = self.execute_downloadable(SyncTrigger::ManualForced);
        info!("Refreshing {} subscriptions", count);
    }

    /// Let the synchronizer update whichever subscriptions are due.
    pub fn check_subscriptions(&self) {
        let count = self.execute_downloadable(SyncTrigger::Automatic);
        debug!("Checked {} subscriptions", count);
    }

    /// Report every downloadable subscription's status and start the
    /// download of those never fetched.
    ///
    /// Returns whether any downloadable subscription exists.
    pub fn verify_subscriptions(&self) -> bool {
        let mut has_subscriptions = false;
        for subscription in self.modules.storage.subscriptions() {
            if !subscription.borrow().is_downloadable() {
                continue;
            }
            has_subscriptions = true;

            let never_downloaded = {
                let sub = subscription.borrow();
                SyncStatus::of(&sub, self.modules.synchronizer.as_ref()).report(self.host());
                sub.never_downloaded()
            };
            if never_downloaded {
                self.modules.synchronizer.execute(&subscription, SyncTrigger::Automatic);
            }
        }
        has_subscriptions
    }

    /// Start forwarding download status changes to the host.
    pub fn start_interactive(&self) {
        if self.listener.get().is_some() {
            return;
        }

        let host = self.ctx.host().clone();
        let synchronizer: Rc<dyn Synchronizer> = self.modules.synchronizer.clone();
        let listener: FilterListener = Rc::new(move |change: &FilterChange| match change {
            FilterChange::SubscriptionLastDownload(sub) | FilterChange::SubscriptionDownloadStatus(sub) => {
                match sub.try_borrow() {
                    Ok(sub) => SyncStatus::of(&sub, synchronizer.as_ref()).report(host.as_ref()),
                    Err(_) => warn!("Skipping status of {}: subscription still being updated", change.action()),
                }
            }
            _ => {}
        });

        self.listener.set(Some(self.modules.notifier.add_listener(listener)));
        debug!("Interactive status updates on");
    }

    pub fn stop_interactive(&self) {
        if let Some(id) = self.listener.take() {
            self.modules.notifier.remove_listener(id);
            debug!("Interactive status updates off");
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.listener.get().is_some()
    }

    /// Whether any filter blocks the request.
    pub fn matches_any(&self, url: &str, query: &str, request_host: &str, referrer_host: &str, accept: &str) -> bool {
        self.matches(&ClassificationRequest::new(url, query, request_host, referrer_host, accept))
    }

    pub fn matches(&self, request: &ClassificationRequest) -> bool {
        let classification = self.classifier.classify(request);
        let hit = self.modules.matcher.matches_any(
            &classification.url,
            classification.content_type,
            None,
            classification.third_party,
        );

        if let Some(filter) = &hit {
            debug!("Blocked {} by {}", classification.url, filter.text());
        }
        hit.is_some()
    }

    /// Match a request straight from the proxy, remembering its referrer.
    pub fn matches_headers(
        &self,
        full_url: &str,
        referer: Option<&str>,
        accept: Option<&str>,
    ) -> Result<bool, BridgeError> {
        let request = ClassificationRequest::from_headers(full_url, referer, accept)?;
        if let Some(referer) = referer {
            self.referrers.borrow_mut().add(full_url, referer);
        }
        Ok(self.matches(&request))
    }

    /// Pages that led to `url`, outermost first, ending with `url`.
    pub fn referrer_chain(&self, url: &str) -> Vec<String> {
        self.referrers.borrow_mut().build_referrer_chain(url)
    }
}

impl Drop for FilterBridge {
    fn drop(&mut self) {
        self.stop_interactive();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{FilterStorage, Matcher, Subscription, SubscriptionKind};
    use crate::testing::MockEngine;
    use fos_shim::{MemoryHost, ShimConfig};

    fn bridge() -> (Rc<MemoryHost>, MockEngine, FilterBridge) {
        let host = Rc::new(MemoryHost::new());
        let engine = MockEngine::new();
        let ctx = ShimContext::new(host.clone(), ShimConfig::default());
        let bridge = FilterBridge::new(ctx, engine.modules(), ClassifierConfig::default());
        (host, engine, bridge)
    }

    #[test]
    fn test_startup_order() {
        let (host, engine, bridge) = bridge();
        bridge.startup().unwrap();

        let expected: Vec<String> = ENGINE_MODULES
            .iter()
            .chain(DOMAIN_MODULES)
            .map(|m| m.to_string())
            .collect();
        assert_eq!(host.loaded_modules(), expected);
        assert!(engine.matcher.resolver_slot().is_patched());
        assert_eq!(engine.synchronizer.startups(), 1);
    }

    #[test]
    fn test_second_startup_rejected() {
        let (_host, _engine, bridge) = bridge();
        bridge.startup().unwrap();
        assert!(matches!(bridge.startup(), Err(BridgeError::Patch(PatchError::AlreadyInstalled))));
    }

    #[test]
    fn test_add_subscription() {
        let (_host, engine, bridge) = bridge();
        bridge
            .add_subscription(r#"{"url":"http://x/list.txt","title":"T","homepage":"h"}"#)
            .unwrap();

        let subs = engine.storage.subscriptions();
        assert_eq!(subs.len(), 1);
        let sub = subs[0].borrow();
        assert_eq!(sub.url, "http://x/list.txt");
        assert_eq!(sub.title, "T");
        assert_eq!(sub.homepage, "h");
        assert!(!sub.disabled);

        assert_eq!(
            engine.synchronizer.executions(),
            vec![("http://x/list.txt".to_string(), SyncTrigger::Automatic)]
        );
        assert_eq!(engine.storage.saves(), 1);
    }

    #[test]
    fn test_add_downloaded_subscription_skips_sync() {
        let (_host, engine, bridge) = bridge();
        engine.subscriptions.prepare(Subscription {
            kind: SubscriptionKind::Downloadable {
                last_download: 1_600_000_000,
                download_status: None,
            },
            disabled: true,
            ..Subscription::downloadable("http://x/list.txt")
        });

        bridge.add_subscription(r#"{"url":"http://x/list.txt","title":"T","homepage":"h"}"#).unwrap();
        assert!(engine.synchronizer.executions().is_empty());
        assert!(!engine.storage.subscriptions()[0].borrow().disabled);
    }

    #[test]
    fn test_add_subscription_errors() {
        let (_host, engine, bridge) = bridge();

        assert!(matches!(bridge.add_subscription("{not json"), Err(BridgeError::InvalidSubscription(_))));
        assert!(matches!(bridge.add_subscription(r#"{"title":"T"}"#), Err(BridgeError::InvalidSubscription(_))));

        // Unknown URL is silently ignored
        bridge.add_subscription(r#"{"url":"nonsense"}"#).unwrap();
        assert!(engine.storage.subscriptions().is_empty());
        assert_eq!(engine.storage.saves(), 0);

        engine.storage.fail_saves(true);
        assert!(matches!(
            bridge.add_subscription(r#"{"url":"http://x/list.txt"}"#),
            Err(BridgeError::Storage(_))
        ));
    }

    #[test]
    fn test_clear_subscriptions() {
        let (_host, engine, bridge) = bridge();
        bridge.add_subscription(r#"{"url":"http://a/list.txt"}"#).unwrap();
        bridge.add_subscription(r#"{"url":"http://b/list.txt"}"#).unwrap();
        bridge.add_subscription(r#"{"url":"~user~1"}"#).unwrap();
        assert_eq!(engine.storage.subscriptions().len(), 3);

        bridge.clear_subscriptions();
        assert!(engine.storage.subscriptions().is_empty());
    }

    #[test]
    fn test_refresh_and_check_triggers() {
        let (_host, engine, bridge) = bridge();
        engine.storage.add_subscription(Subscription::downloadable("http://a/list.txt").into_handle());
        engine.storage.add_subscription(Subscription::special("~user~1").into_handle());

        bridge.refresh_subscriptions();
        bridge.check_subscriptions();
        assert_eq!(
            engine.synchronizer.executions(),
            vec![
                ("http://a/list.txt".to_string(), SyncTrigger::ManualForced),
                ("http://a/list.txt".to_string(), SyncTrigger::Automatic),
            ]
        );
    }

    #[test]
    fn test_verify_subscriptions() {
        let (host, engine, bridge) = bridge();
        assert!(!bridge.verify_subscriptions());

        engine.storage.add_subscription(Subscription::special("~user~1").into_handle());
        assert!(!bridge.verify_subscriptions());

        let mut fetched = Subscription::downloadable("http://a/list.txt");
        fetched.kind = SubscriptionKind::Downloadable {
            last_download: 1_500_000_000,
            download_status: Some("synchronize_ok".to_string()),
        };
        engine.storage.add_subscription(fetched.into_handle());
        engine.storage.add_subscription(Subscription::downloadable("http://b/list.txt").into_handle());

        assert!(bridge.verify_subscriptions());
        assert_eq!(
            host.statuses(),
            vec![
                ("synchronize_last_at".to_string(), 1_500_000_000_000),
                ("synchronize_never".to_string(), 0),
            ]
        );
        assert_eq!(
            engine.synchronizer.executions(),
            vec![("http://b/list.txt".to_string(), SyncTrigger::Automatic)]
        );
    }

    #[test]
    fn test_interactive_status_updates() {
        let (host, engine, bridge) = bridge();
        let sub = Subscription::downloadable("http://a/list.txt").into_handle();

        engine.notifier.notify(&FilterChange::SubscriptionLastDownload(sub.clone()));
        assert!(host.statuses().is_empty());

        bridge.start_interactive();
        bridge.start_interactive();
        assert_eq!(engine.notifier.listener_count(), 1);

        engine.synchronizer.set_executing("http://a/list.txt", true);
        engine.notifier.notify(&FilterChange::SubscriptionDownloadStatus(sub.clone()));
        engine.notifier.notify(&FilterChange::SubscriptionAdded(sub.clone()));
        assert_eq!(host.statuses(), vec![("synchronize_in_progress".to_string(), 0)]);

        bridge.stop_interactive();
        assert!(!bridge.is_interactive());
        engine.notifier.notify(&FilterChange::SubscriptionLastDownload(sub));
        assert_eq!(host.statuses().len(), 1);
    }

    #[test]
    fn test_status_skipped_while_subscription_borrowed() {
        let (host, engine, bridge) = bridge();
        let sub = Subscription::downloadable("http://a/list.txt").into_handle();
        bridge.start_interactive();

        {
            let mut guard = sub.borrow_mut();
            guard.kind = SubscriptionKind::Downloadable {
                last_download: 1_700_000_000,
                download_status: Some("synchronize_ok".to_string()),
            };
            engine.notifier.notify(&FilterChange::SubscriptionLastDownload(sub.clone()));
        }
        assert!(host.statuses().is_empty());

        engine.notifier.notify(&FilterChange::SubscriptionLastDownload(sub));
        assert_eq!(host.statuses(), vec![("synchronize_last_at".to_string(), 1_700_000_000_000)]);
    }

    #[test]
    fn test_invalid_url_leaves_referrers_untouched() {
        let (_host, _engine, bridge) = bridge();

        assert!(bridge.matches_headers("garbage", Some("http://news.com/"), None).is_err());
        assert_eq!(bridge.referrer_chain("garbage"), vec!["garbage"]);
        assert!(bridge.referrers.borrow().is_empty());
    }

    #[test]
    fn test_matches_any() {
        let (_host, engine, bridge) = bridge();
        engine.matcher.add_key("ads", "/ads/");
        bridge.startup().unwrap();

        assert!(bridge.matches_any("http://t.net/ads/x.js", "", "t.net", "news.com", ""));
        assert!(!bridge.matches_any("http://t.net/content.js", "", "t.net", "news.com", ""));

        let seen = engine.matcher.last_request().unwrap();
        assert_eq!(seen.content_type, crate::ContentType::Script);
        assert!(seen.third_party);
        assert_eq!(seen.doc_domain, None);
    }

    #[test]
    fn test_matching_needs_patch_for_unknown_filters() {
        let (_host, engine, bridge) = bridge();
        engine.matcher.add_key("ads", "/ads/");

        assert!(!bridge.matches_any("http://t.net/ads/x.js", "", "t.net", "", ""));
        bridge.startup().unwrap();
        assert!(bridge.matches_any("http://t.net/ads/x.js", "", "t.net", "", ""));
    }

    #[test]
    fn test_matches_headers_records_referrers() {
        let (_host, engine, bridge) = bridge();
        engine.matcher.add_key("ads", "/ads/");
        bridge.startup().unwrap();

        assert!(!bridge.matches_headers("http://frame.net/page", Some("http://news.com/"), Some("text/html")).unwrap());
        assert!(bridge.matches_headers("http://t.net/ads/x.js?id=1", Some("http://frame.net/page"), None).unwrap());

        let seen = engine.matcher.last_request().unwrap();
        assert_eq!(seen.location, "http://t.net/ads/x.js?id=1");
        assert_eq!(
            bridge.referrer_chain("http://t.net/ads/x.js?id=1"),
            vec!["http://news.com/", "http://frame.net/page", "http://t.net/ads/x.js?id=1"]
        );
        assert!(matches!(
            bridge.matches_headers("garbage", None, None),
            Err(BridgeError::Request(_))
        ));
    }
}
