//! Request Classifier
//!
//! Turns an outgoing request into what the matcher consumes:
//! 1. Content type from the Accept header, then the URL suffix
//! 2. Third-party flag when the referrer host is known
//! 3. The URL with its query re-attached

use crate::content_type::ContentType;
use crate::third_party::{is_third_party, BaseDomain};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::trace;

/// How a non-CSS Accept header is mapped to [`ContentType::Image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptImageRule {
    /// Any non-empty Accept header that does not start with `true` is an
    /// image request. This is what deployed filter lists were tuned against,
    /// even though it swallows `text/html` and `*/*`.
    #[default]
    Legacy,
    /// Only Accept headers naming an `image/` type.
    MimeType,
}

impl AcceptImageRule {
    fn is_image(self, accept: &str) -> bool {
        match self {
            Self::Legacy => !accept.starts_with("true"),
            Self::MimeType => accept.contains("image/"),
        }
    }
}

/// Classifier options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub accept_image_rule: AcceptImageRule,
}

/// One outgoing request, as seen by the proxy.
///
/// Empty strings stand for absent query, referrer host and Accept header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationRequest {
    pub url: String,
    pub query: String,
    pub request_host: String,
    pub referrer_host: String,
    pub accept: String,
}

impl ClassificationRequest {
    pub fn new(
        url: impl Into<String>,
        query: impl Into<String>,
        request_host: impl Into<String>,
        referrer_host: impl Into<String>,
        accept: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            query: query.into(),
            request_host: request_host.into(),
            referrer_host: referrer_host.into(),
            accept: accept.into(),
        }
    }
}

/// Matcher input derived from a [`ClassificationRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// URL with `?query` appended when a query was given
    pub url: String,
    pub content_type: ContentType,
    pub third_party: bool,
}

pub struct RequestClassifier {
    config: ClassifierConfig,
    base_domain: Rc<dyn BaseDomain>,
}

impl RequestClassifier {
    pub fn new(config: ClassifierConfig, base_domain: Rc<dyn BaseDomain>) -> Self {
        Self { config, base_domain }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Content type from the Accept header, falling back to the URL suffix.
    pub fn content_type(&self, url: &str, accept: &str) -> ContentType {
        if !accept.is_empty() {
            if accept.contains("text/css") {
                return ContentType::Stylesheet;
            }
            if self.config.accept_image_rule.is_image(accept) {
                return ContentType::Image;
            }
        }

        ContentType::from_path(url).unwrap_or(ContentType::Other)
    }

    pub fn is_third_party(&self, request_host: &str, document_host: &str) -> bool {
        is_third_party(self.base_domain.as_ref(), request_host, document_host)
    }

    pub fn classify(&self, request: &ClassificationRequest) -> Classification {
        // Suffix checks look at the bare URL, before the query goes back on
        let content_type = self.content_type(&request.url, &request.accept);

        let third_party = !request.referrer_host.is_empty()
            && self.is_third_party(&request.request_host, &request.referrer_host);

        let url = if request.query.is_empty() {
            request.url.clone()
        } else {
            format!("{}?{}", request.url, request.query)
        };

        trace!("Classified {} as {} (third party: {})", url, content_type, third_party);
        Classification {
            url,
            content_type,
            third_party,
        }
    }
}

impl std::fmt::Debug for RequestClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestClassifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
