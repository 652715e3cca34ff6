//! fOS Filter Bridge
//!
//! Host-facing side of the content filter:
//! - Classifies outgoing requests (content type, third-party flag)
//! - Drives the external filter engine through its collaborator traits
//! - Patches the matcher to rebuild filters on demand
//! - Reports subscription status back to the host

mod bridge;
mod classifier;
mod content_type;
pub mod engine;
mod patch;
mod referrer;
mod request;
mod status;
mod third_party;

#[cfg(test)]
mod testing;

pub use bridge::{BridgeError, FilterBridge, DOMAIN_MODULES, ENGINE_MODULES};
pub use classifier::{AcceptImageRule, Classification, ClassificationRequest, ClassifierConfig, RequestClassifier};
pub use content_type::{ContentType, UnknownContentType};
pub use patch::{
    check_entry_match, ConstructOnDemand, FilterResolver, KnownFilters, KnownFiltersOnly, MatcherPatch, PatchError,
    ResolverSlot,
};
pub use referrer::{ReferrerMapping, MAX_CHAIN_LENGTH, MAX_ENTRIES};
pub use request::RequestError;
pub use status::{SyncStatus, STATUS_OK};
pub use third_party::{document_domain, is_third_party, BaseDomain, TrailingLabels};
