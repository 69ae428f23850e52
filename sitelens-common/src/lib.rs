//! Common types and utilities shared across SiteLens crates.
//!
//! This crate defines the page-section vocabulary, the score types every
//! stage produces, observability helpers, and the shared error type used
//! throughout the SiteLens workspace. It is intentionally lightweight so that
//! all crates can depend on it without introducing heavy transitive costs.
//!
//! # Overview
//!
//! - [`Section`]: the header / main / footer / full page regions we score
//! - [`WebsiteInput`]: one site submitted for comparison
//! - [`CriteriaScores`]: the five per-section sub-scores shown by the frontend
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`SiteLensError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! ```rust
//! use sitelens_common::{slugify, CriteriaScores, Section};
//!
//! assert_eq!(slugify("My Shop"), "my_shop");
//! assert_eq!(Section::Main.review_key(), Some("main_content"));
//!
//! let criteria = CriteriaScores::from_clip(0.6);
//! assert_eq!(criteria.clarity, 0.7);
//! assert_eq!(criteria.relevance, 0.6);
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

pub mod observability;

/// A region of a rendered page that gets its own screenshot and score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Header,
    Main,
    Footer,
    Full,
}

impl Section {
    /// Every section, in report order.
    pub const ALL: [Section; 4] = [Section::Header, Section::Main, Section::Footer, Section::Full];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Header => "header",
            Section::Main => "main",
            Section::Footer => "footer",
            Section::Full => "full",
        }
    }

    /// Key the design-review model uses for this section. The full page is
    /// rated through the review's `overall_score` instead.
    pub fn review_key(&self) -> Option<&'static str> {
        match self {
            Section::Header => Some("header"),
            Section::Main => Some("main_content"),
            Section::Footer => Some("footer"),
            Section::Full => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Section::Header => "HEADER",
            Section::Main => "MAIN",
            Section::Footer => "FOOTER",
            Section::Full => "FULL",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A website submitted for comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteInput {
    pub name: String,
    pub url: String,
}

impl WebsiteInput {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Filesystem-safe identifier derived from the display name.
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }

    /// Reject blank names, names that slugify to nothing, and non-http(s) URLs.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SiteLensError::Validation(
                "website name must not be empty".into(),
            ));
        }
        if self.slug().is_empty() {
            return Err(SiteLensError::Validation(format!(
                "website name {:?} has no usable characters",
                self.name
            )));
        }
        let parsed = Url::parse(self.url.trim()).map_err(|e| {
            SiteLensError::Validation(format!("invalid url for {}: {e}", self.name))
        })?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(SiteLensError::Validation(format!(
                "unsupported url scheme {other:?} for {}",
                self.name
            ))),
        }
    }
}

/// Lowercase, collapse whitespace runs to `_`, and drop anything outside
/// `[a-z0-9_-]`.
///
/// ```
/// use sitelens_common::slugify;
///
/// assert_eq!(slugify("  Big  Store!  "), "big_store");
/// assert_eq!(slugify("../etc"), "etc");
/// ```
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.trim().chars().flat_map(|c| c.to_lowercase()) {
        if ch.is_whitespace() {
            pending_sep = !out.is_empty();
            continue;
        }
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            if pending_sep {
                out.push('_');
                pending_sep = false;
            }
            out.push(ch);
        }
    }
    out
}

/// Cosmetic sub-scores the frontend renders as bars, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriteriaScores {
    #[serde(rename = "Clarity")]
    pub clarity: f64,
    #[serde(rename = "Modernity")]
    pub modernity: f64,
    #[serde(rename = "Relevance")]
    pub relevance: f64,
    #[serde(rename = "Consistency")]
    pub consistency: f64,
    #[serde(rename = "Visual Appeal")]
    pub visual_appeal: f64,
}

impl CriteriaScores {
    /// Spread a normalized CLIP score into the five criteria using fixed
    /// offsets, capped at 1 and rounded to two decimals.
    pub fn from_clip(normalized: f64) -> Self {
        let s = normalized.clamp(0.0, 1.0);
        let bump = |offset: f64| round2((s + offset).min(1.0));
        Self {
            clarity: bump(0.10),
            modernity: bump(0.05),
            relevance: round2(s),
            consistency: bump(0.07),
            visual_appeal: bump(0.08),
        }
    }

    /// All five criteria equal to `score`.
    pub fn uniform(score: f64) -> Self {
        let s = score.clamp(0.0, 1.0);
        Self {
            clarity: s,
            modernity: s,
            relevance: s,
            consistency: s,
            visual_appeal: s,
        }
    }

    pub fn average(&self) -> f64 {
        (self.clarity + self.modernity + self.relevance + self.consistency + self.visual_appeal)
            / 5.0
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Error types used across the SiteLens system.
#[derive(thiserror::Error, Debug)]
pub enum SiteLensError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller-supplied input was rejected.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The browser session or a page interaction failed.
    #[error("Browser error: {0}")]
    Browser(String),

    /// Image preprocessing or embedding failed.
    #[error("Vision error: {0}")]
    Vision(String),

    /// The hosted language model call failed or returned garbage.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Screenshot persistence or the image host failed.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation exceeded the configured timeout.
    #[error("Timeout occurred: {0}")]
    Timeout(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`SiteLensError`].
pub type Result<T> = std::result::Result<T, SiteLensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_serializes_lowercase() {
        let json = serde_json::to_string(&Section::Footer).unwrap();
        assert_eq!(json, "\"footer\"");
        let back: Section = serde_json::from_str("\"full\"").unwrap();
        assert_eq!(back, Section::Full);
    }

    #[test]
    fn full_page_has_no_review_key() {
        assert_eq!(Section::Full.review_key(), None);
        assert_eq!(Section::Header.review_key(), Some("header"));
    }

    #[test]
    fn slugify_matches_frontend_paths() {
        assert_eq!(slugify("Amazon"), "amazon");
        assert_eq!(slugify("Blink It\tNow"), "blink_it_now");
        assert_eq!(slugify("Ünïcode"), "ncode");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn criteria_offsets_cap_at_one() {
        let c = CriteriaScores::from_clip(0.95);
        assert_eq!(c.clarity, 1.0);
        assert_eq!(c.modernity, 1.0);
        assert_eq!(c.relevance, 0.95);
        assert_eq!(c.consistency, 1.0);
        assert_eq!(c.visual_appeal, 1.0);
    }

    #[test]
    fn criteria_serialize_with_display_keys() {
        let v = serde_json::to_value(CriteriaScores::uniform(0.4)).unwrap();
        assert_eq!(v["Visual Appeal"], 0.4);
        assert_eq!(v["Clarity"], 0.4);
    }

    #[test]
    fn website_validation() {
        assert!(WebsiteInput::new("Shop", "https://shop.example").validate().is_ok());
        assert!(WebsiteInput::new("", "https://shop.example").validate().is_err());
        assert!(WebsiteInput::new("???", "https://shop.example").validate().is_err());
        assert!(WebsiteInput::new("Shop", "ftp://shop.example").validate().is_err());
        assert!(WebsiteInput::new("Shop", "not a url").validate().is_err());
    }
}
