//! Content types handed to the matcher.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of resource being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContentType {
    /// JavaScript
    Script,
    /// CSS stylesheet
    Stylesheet,
    /// Image
    Image,
    /// Web font
    Font,
    /// Anything else
    Other,
}

impl ContentType {
    /// Tag understood by the filter engine.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "SCRIPT",
            Self::Stylesheet => "STYLESHEET",
            Self::Image => "IMAGE",
            Self::Font => "FONT",
            Self::Other => "OTHER",
        }
    }

    /// Infer from the URL's suffix (case-insensitive).
    pub fn from_path(url: &str) -> Option<Self> {
        const SUFFIXES: &[(&str, ContentType)] = &[
            (".js", ContentType::Script),
            (".css", ContentType::Stylesheet),
            (".gif", ContentType::Image),
            (".png", ContentType::Image),
            (".jpg", ContentType::Image),
            (".jpeg", ContentType::Image),
            (".bmp", ContentType::Image),
            (".ico", ContentType::Image),
            (".ttf", ContentType::Font),
            (".woff", ContentType::Font),
        ];

        let url = url.to_lowercase();
        SUFFIXES
            .iter()
            .find(|(suffix, _)| url.ends_with(suffix))
            .map(|&(_, ty)| ty)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown content type tag
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown content type: {0}")]
pub struct UnknownContentType(pub String);

impl FromStr for ContentType {
    type Err = UnknownContentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCRIPT" => Ok(Self::Script),
            "STYLESHEET" => Ok(Self::Stylesheet),
            "IMAGE" => Ok(Self::Image),
            "FONT" => Ok(Self::Font),
            "OTHER" => Ok(Self::Other),
            _ => Err(UnknownContentType(s.to_string())),
        }
    }
}
