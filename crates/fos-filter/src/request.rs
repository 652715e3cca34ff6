//! Building classification requests from raw proxy headers.

use crate::classifier::ClassificationRequest;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Request construction errors
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Invalid request URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Request URL has no host: {0}")]
    MissingHost(String),
}

impl ClassificationRequest {
    /// Split a full request URL and its `Referer`/`Accept` headers into the
    /// fields the classifier works on.
    ///
    /// An unparseable referrer is treated as absent.
    pub fn from_headers(
        full_url: &str,
        referer: Option<&str>,
        accept: Option<&str>,
    ) -> Result<Self, RequestError> {
        let mut parsed = Url::parse(full_url).map_err(|source| RequestError::InvalidUrl {
            url: full_url.to_string(),
            source,
        })?;

        let request_host = parsed
            .host_str()
            .ok_or_else(|| RequestError::MissingHost(full_url.to_string()))?
            .to_string();
        let query = parsed.query().unwrap_or_default().to_string();
        parsed.set_query(None);
        parsed.set_fragment(None);

        let referrer_host = match referer.map(Url::parse) {
            Some(Ok(referer)) => referer.host_str().unwrap_or_default().to_string(),
            Some(Err(e)) => {
                debug!("Ignoring unparseable referrer for {}: {}", full_url, e);
                String::new()
            }
            None => String::new(),
        };

        Ok(Self {
            url: parsed.to_string(),
            query,
            request_host,
            referrer_host,
            accept: accept.unwrap_or_default().to_string(),
        })
    }
}
