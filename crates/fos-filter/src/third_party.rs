//! Third-party request detection.
//!
//! A request is first-party when its host sits under the document's base
//! domain (the registrable part, as decided by the public suffix list).

use std::net::IpAddr;

/// Reduces a hostname to its registrable base domain.
pub trait BaseDomain {
    fn base_domain(&self, host: &str) -> String;
}

impl<F> BaseDomain for F
where
    F: Fn(&str) -> String,
{
    fn base_domain(&self, host: &str) -> String {
        self(host)
    }
}

/// Keeps the last `labels` labels of a hostname.
///
/// Good enough for diagnostics; multi-label public suffixes such as
/// `co.uk` need the real suffix list.
#[derive(Debug, Clone, Copy)]
pub struct TrailingLabels {
    pub labels: usize,
}

impl Default for TrailingLabels {
    fn default() -> Self {
        Self { labels: 2 }
    }
}

impl BaseDomain for TrailingLabels {
    fn base_domain(&self, host: &str) -> String {
        let labels: Vec<&str> = host.split('.').collect();
        let start = labels.len().saturating_sub(self.labels.max(1));
        labels[start..].join(".")
    }
}

fn is_ip_literal(host: &str) -> bool {
    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    bare.parse::<IpAddr>().is_ok()
}

/// Base domain of `host`, leaving IP literals untouched.
pub fn document_domain(base: &dyn BaseDomain, host: &str) -> String {
    if is_ip_literal(host) {
        host.to_string()
    } else {
        base.base_domain(host)
    }
}

/// Whether a request to `request_host` is third-party for a document on
/// `document_host`.
pub fn is_third_party(base: &dyn BaseDomain, request_host: &str, document_host: &str) -> bool {
    let request_host = request_host.trim_end_matches('.');
    let document_host = document_host.trim_end_matches('.');

    let domain = document_domain(base, document_host);
    if request_host.len() > domain.len() {
        let same_party = request_host
            .strip_suffix(domain.as_str())
            .is_some_and(|rest| rest.ends_with('.'));
        !same_party
    } else {
        request_host != domain
    }
}
