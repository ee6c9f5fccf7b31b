//! HTML link extraction
//!
//! Finds the download link in an email's HTML body. Two passes, first hit wins:
//!
//! 1. An anchor whose href equals or contains the configured link pattern
//!    (checked against both the raw and the normalized href).
//! 2. An anchor whose visible text matches the text pattern, `(?i)download`
//!    by default.
//!
//! Hrefs are normalized before they are returned: quoted-printable soft line
//! breaks are removed, `=3D` becomes `=`, and the whole string is
//! percent-decoded. Mail clients quoted-printable-encode href attributes often
//! enough that skipping this step yields broken URLs.

use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::types::{ExtractedLink, LinkProvenance};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why an anchor's href could not be turned into a URL
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HrefAnomaly {
    /// The anchor has no href attribute
    #[error("href attribute is missing")]
    Missing,
    /// The href is empty once soft line breaks are removed
    #[error("href attribute is empty")]
    Empty,
    /// The href holds several whitespace-separated URLs
    #[error("href has {0} joined URLs")]
    MultipleFragments(usize),
}

/// Normalize a raw href into a usable URL.
///
/// Total over its input: either a decoded URL or the reason there is none.
///
/// # Examples
///
/// ```
/// use inbox_dl::extract::normalize_href;
///
/// let url = normalize_href(Some("https://example.com/get?howpcode%3D1=\n&x=3D2")).unwrap();
/// assert_eq!(url, "https://example.com/get?howpcode=1&x=2");
/// ```
pub fn normalize_href(raw: Option<&str>) -> std::result::Result<String, HrefAnomaly> {
    let raw = raw.ok_or(HrefAnomaly::Missing)?;

    let cleaned = raw
        .replace("=\r\n", "")
        .replace("=\n", "")
        .replace("=3D", "=");
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return Err(HrefAnomaly::Empty);
    }

    // Spaces inside a single URL are fine; several absolute URLs are not
    let fragments = cleaned
        .split_whitespace()
        .filter(|part| part.contains("://"))
        .count();
    if fragments > 1 {
        return Err(HrefAnomaly::MultipleFragments(fragments));
    }

    let decoded = match urlencoding::decode(cleaned) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(cleaned.as_bytes()))
            .into_owned(),
    };

    Ok(decoded)
}

/// Finds download links in HTML message bodies
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    link_pattern: String,
    text_pattern: Regex,
    anchors: Selector,
}

impl LinkExtractor {
    /// Build an extractor from configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text pattern is not a valid regex.
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let text_pattern = regex::RegexBuilder::new(&config.text_pattern)
            .size_limit(1024 * 1024)
            .build()
            .map_err(|e| Error::config("DOWNLOAD_TEXT_PATTERN", format!("invalid regex: {e}")))?;

        let anchors = Selector::parse("a")
            .map_err(|e| Error::Other(format!("anchor selector failed to parse: {e}")))?;

        Ok(Self {
            link_pattern: config.link_pattern.clone(),
            text_pattern,
            anchors,
        })
    }

    /// Extract the download link from an HTML body.
    ///
    /// Returns `None` when no anchor qualifies, or when the chosen anchor's
    /// href cannot be normalized. Neither case is an error.
    pub fn extract(&self, html: &str) -> Option<ExtractedLink> {
        let document = Html::parse_document(html);

        let (anchor, provenance) = match self.find_by_pattern(&document) {
            Some(anchor) => (anchor, LinkProvenance::Pattern),
            None => match self.find_by_text(&document) {
                Some(anchor) => (anchor, LinkProvenance::Text),
                None => {
                    info!("No download link found");
                    return None;
                }
            },
        };

        match normalize_href(anchor.value().attr("href")) {
            Ok(url) => {
                info!(url = %url, ?provenance, "Download link found");
                Some(ExtractedLink { url, provenance })
            }
            Err(anomaly) => {
                warn!(%anomaly, ?provenance, "Matched anchor has no usable href");
                None
            }
        }
    }

    fn find_by_pattern<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        if self.link_pattern.is_empty() {
            return None;
        }

        document.select(&self.anchors).find(|anchor| {
            let Some(raw) = anchor.value().attr("href") else {
                return false;
            };
            if raw.trim().contains(self.link_pattern.as_str()) {
                return true;
            }
            normalize_href(Some(raw))
                .map(|url| url.contains(self.link_pattern.as_str()))
                .unwrap_or(false)
        })
    }

    fn find_by_text<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let found = document.select(&self.anchors).find(|anchor| {
            let text: String = anchor.text().collect();
            self.text_pattern.is_match(&text)
        });
        if found.is_some() {
            debug!("Falling back to anchor text match");
        }
        found
    }
}
