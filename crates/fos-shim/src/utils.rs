//! Utility Bridge
//!
//! Small helpers the engine expects from its platform: version comparison,
//! locale prefix matching, URI scheme extraction and async dispatch.

use crate::context::ShimContext;
use crate::file::VirtualFile;
use std::cmp::Ordering;
use thiserror::Error;

/// Platform version reported to the engine.
pub const PLATFORM_VERSION: &str = "10.0";

/// URI parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    #[error("Invalid URI: {0:?}")]
    InvalidUri(String),
}

/// Minimal URI: just the scheme and the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uri {
    pub scheme: String,
    pub spec: String,
}

impl Uri {
    /// Extract the scheme: everything before the first `:` or `/`, lower-cased.
    ///
    /// Empty input and input starting with `~` are rejected.
    pub fn parse(uri: &str) -> Result<Self, UriError> {
        if uri.is_empty() || uri.starts_with('~') {
            return Err(UriError::InvalidUri(uri.to_string()));
        }

        let end = uri.find([':', '/']).unwrap_or(uri.len());
        Ok(Self {
            scheme: uri[..end].to_lowercase(),
            spec: uri.to_string(),
        })
    }
}

/// Leading integer of a version part, `parseInt`-style.
///
/// Parts without leading digits count as 0. This makes `1.a` equal to `1.0`,
/// a known limitation kept for compatibility with stored version strings.
fn version_part(part: &str) -> i64 {
    let part = part.trim_start();
    let (negative, digits) = match part.as_bytes().first() {
        Some(b'-') => (true, &part[1..]),
        Some(b'+') => (false, &part[1..]),
        _ => (false, part),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return 0;
    }
    let value = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    if negative { -value } else { value }
}

/// Compare dotted version strings part by part.
///
/// Returns the first nonzero difference between corresponding parts
/// (missing parts are 0), or 0 when all parts agree.
pub fn compare_versions(v1: &str, v2: &str) -> i64 {
    let parts1: Vec<&str> = v1.split('.').collect();
    let parts2: Vec<&str> = v2.split('.').collect();

    for i in 0..parts1.len().max(parts2.len()) {
        let part1 = parts1.get(i).map_or(0, |p| version_part(p));
        let part2 = parts2.get(i).map_or(0, |p| version_part(p));
        if part1 != part2 {
            return part1.saturating_sub(part2);
        }
    }
    0
}

/// [`compare_versions`] as an [`Ordering`].
pub fn version_ordering(v1: &str, v2: &str) -> Ordering {
    compare_versions(v1, v2).cmp(&0)
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// First candidate of a comma-separated list that prefixes `locale` and is
/// followed by a word boundary (`de` matches `de-DE` but not `den`).
pub fn locale_prefix_match<'a>(prefixes: &'a str, locale: &str) -> Option<&'a str> {
    if prefixes.is_empty() {
        return None;
    }

    prefixes.split(',').find(|prefix| {
        let Some(rest) = locale.strip_prefix(*prefix) else {
            return false;
        };
        let before = prefix.chars().last().is_some_and(is_word_char);
        let after = rest.chars().next().is_some_and(is_word_char);
        before != after
    })
}

/// Utility object handed to the engine.
#[derive(Debug, Clone)]
pub struct Utils {
    ctx: ShimContext,
}

impl Utils {
    pub fn new(ctx: ShimContext) -> Self {
        Self { ctx }
    }

    /// Localised string lookup; ids are returned as-is.
    pub fn get_string(&self, id: &str) -> String {
        id.to_string()
    }

    pub fn line_break(&self) -> &'static str {
        "\n"
    }

    pub fn resolve_file_path(&self, path: &str) -> VirtualFile {
        VirtualFile::new(&self.ctx, path)
    }

    pub fn new_uri(&self, uri: &str) -> Result<Uri, UriError> {
        Uri::parse(uri)
    }

    pub fn make_uri(&self, url: &str) -> Result<Uri, UriError> {
        self.new_uri(url)
    }

    /// Run `callback` on the next turn of the host event loop.
    pub fn run_async<F: FnOnce() + 'static>(&self, callback: F) {
        self.ctx.host().set_timeout(Box::new(callback), 0);
    }

    pub fn addon_version(&self) -> &str {
        &self.ctx.config().addon_version
    }

    pub fn platform_version(&self) -> &'static str {
        PLATFORM_VERSION
    }

    /// Configured locale, falling back to the host's.
    pub fn app_locale(&self) -> String {
        self.ctx
            .config()
            .locale
            .clone()
            .unwrap_or_else(|| self.ctx.host().locale())
    }

    /// Checksums are not supported; subscriptions are accepted unverified.
    pub fn generate_checksum(&self, _lines: &[String]) -> Option<String> {
        None
    }

    pub fn check_locale_prefix_match(&self, prefixes: &str) -> Option<String> {
        let locale = self.app_locale();
        locale_prefix_match(prefixes, &locale).map(str::to_string)
    }

    pub fn compare_versions(&self, v1: &str, v2: &str) -> i64 {
        compare_versions(v1, v2)
    }
}
