use thiserror::Error;

use crate::geometry::DEFAULT_OVERLAP_TOLERANCE;

pub const DEFAULT_MARGIN_THRESHOLD: f64 = 20.0;
pub const DEFAULT_LINE_HEIGHT: f64 = 12.0;
pub const DEFAULT_SHORT_COMMENT_MAX_CHARS: usize = 15;

pub const DEFAULT_CITATION_KEYWORDS: &[&str] = &["quelle", "source"];
pub const DEFAULT_LANGUAGE_KEYWORDS: &[&str] = &[
    "rechtschreib",
    "grammatik",
    "tippfehler",
    "ausdruck",
    "spelling",
    "grammar",
    "typo",
    "phrasing",
];
pub const DEFAULT_IGNORE_MARKERS: &[&str] = &["ab hier", "from here"];

/// Controls how a list of values is overridden from its defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ListOverride<T> {
    /// Use the built-in defaults.
    #[default]
    Default,
    /// Completely replace the defaults with these values.
    Replace(Vec<T>),
    /// Append these values to the defaults.
    Extend(Vec<T>),
}

impl<T: Clone> ListOverride<T> {
    /// Resolve this override against the given defaults.
    pub fn resolve(&self, defaults: &[T]) -> Vec<T> {
        match self {
            ListOverride::Default => defaults.to_vec(),
            ListOverride::Replace(v) => v.clone(),
            ListOverride::Extend(v) => {
                let mut result = defaults.to_vec();
                result.extend(v.iter().cloned());
                result
            }
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("overlap tolerance must be finite and non-negative, got {0}")]
    InvalidTolerance(f64),
    #[error("margin threshold must be finite, got {0}")]
    InvalidMarginThreshold(f64),
    #[error("line height must be finite and positive, got {0}")]
    InvalidLineHeight(f64),
}

/// Tunables for annotation classification and context resolution.
///
/// Keyword lists are stored lower-cased; classification compares against
/// the lower-cased, trimmed comment text.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    pub(crate) overlap_tolerance: f64,
    pub(crate) margin_threshold: f64,
    pub(crate) line_height: f64,
    pub(crate) short_comment_max_chars: usize,
    pub(crate) citation_keywords: Vec<String>,
    pub(crate) language_keywords: Vec<String>,
    pub(crate) ignore_markers: Vec<String>,
    /// When false, short citation comments are not split out as `quelle`.
    pub(crate) citation_filter: bool,
    /// More `quelle` comments than this counts as a frequent-citation problem.
    pub(crate) citation_issue_threshold: usize,
    /// More `language` comments than this counts as a frequent-language problem.
    pub(crate) language_issue_threshold: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            overlap_tolerance: DEFAULT_OVERLAP_TOLERANCE,
            margin_threshold: DEFAULT_MARGIN_THRESHOLD,
            line_height: DEFAULT_LINE_HEIGHT,
            short_comment_max_chars: DEFAULT_SHORT_COMMENT_MAX_CHARS,
            citation_keywords: owned(DEFAULT_CITATION_KEYWORDS),
            language_keywords: owned(DEFAULT_LANGUAGE_KEYWORDS),
            ignore_markers: owned(DEFAULT_IGNORE_MARKERS),
            citation_filter: true,
            citation_issue_threshold: 4,
            language_issue_threshold: 5,
        }
    }
}

impl ResolverConfig {
    /// Same settings with the citation filter switched on or off.
    pub fn with_citation_filter(mut self, enabled: bool) -> Self {
        self.citation_filter = enabled;
        self
    }

    pub fn overlap_tolerance(&self) -> f64 {
        self.overlap_tolerance
    }

    pub fn margin_threshold(&self) -> f64 {
        self.margin_threshold
    }

    pub fn line_height(&self) -> f64 {
        self.line_height
    }

    pub fn short_comment_max_chars(&self) -> usize {
        self.short_comment_max_chars
    }

    pub fn citation_keywords(&self) -> &[String] {
        &self.citation_keywords
    }

    pub fn language_keywords(&self) -> &[String] {
        &self.language_keywords
    }

    pub fn ignore_markers(&self) -> &[String] {
        &self.ignore_markers
    }

    pub fn citation_filter(&self) -> bool {
        self.citation_filter
    }

    pub fn citation_issue_threshold(&self) -> usize {
        self.citation_issue_threshold
    }

    pub fn language_issue_threshold(&self) -> usize {
        self.language_issue_threshold
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn normalize_keywords(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Builder for [`ResolverConfig`].
///
/// Scalars left unset keep their defaults. Keyword lists can be replaced or
/// extended. [`build()`](Self::build) validates the numeric settings.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfigBuilder {
    overlap_tolerance: Option<f64>,
    margin_threshold: Option<f64>,
    line_height: Option<f64>,
    short_comment_max_chars: Option<usize>,
    citation_keywords: ListOverride<String>,
    language_keywords: ListOverride<String>,
    ignore_markers: ListOverride<String>,
    citation_filter: Option<bool>,
    citation_issue_threshold: Option<usize>,
    language_issue_threshold: Option<usize>,
}

impl ResolverConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Geometry ──

    pub fn overlap_tolerance(mut self, tol: f64) -> Self {
        self.overlap_tolerance = Some(tol);
        self
    }

    pub fn margin_threshold(mut self, x: f64) -> Self {
        self.margin_threshold = Some(x);
        self
    }

    pub fn line_height(mut self, height: f64) -> Self {
        self.line_height = Some(height);
        self
    }

    // ── Classification ──

    pub fn short_comment_max_chars(mut self, n: usize) -> Self {
        self.short_comment_max_chars = Some(n);
        self
    }

    pub fn citation_filter(mut self, enabled: bool) -> Self {
        self.citation_filter = Some(enabled);
        self
    }

    pub fn set_citation_keywords(mut self, keywords: Vec<String>) -> Self {
        self.citation_keywords = ListOverride::Replace(keywords);
        self
    }

    pub fn add_citation_keyword(mut self, keyword: String) -> Self {
        push_extend(&mut self.citation_keywords, keyword);
        self
    }

    pub fn set_language_keywords(mut self, keywords: Vec<String>) -> Self {
        self.language_keywords = ListOverride::Replace(keywords);
        self
    }

    pub fn add_language_keyword(mut self, keyword: String) -> Self {
        push_extend(&mut self.language_keywords, keyword);
        self
    }

    pub fn set_ignore_markers(mut self, markers: Vec<String>) -> Self {
        self.ignore_markers = ListOverride::Replace(markers);
        self
    }

    pub fn add_ignore_marker(mut self, marker: String) -> Self {
        push_extend(&mut self.ignore_markers, marker);
        self
    }

    // ── Downstream heuristics ──

    pub fn citation_issue_threshold(mut self, n: usize) -> Self {
        self.citation_issue_threshold = Some(n);
        self
    }

    pub fn language_issue_threshold(mut self, n: usize) -> Self {
        self.language_issue_threshold = Some(n);
        self
    }

    pub fn build(self) -> Result<ResolverConfig, ConfigError> {
        let defaults = ResolverConfig::default();

        let overlap_tolerance = self.overlap_tolerance.unwrap_or(defaults.overlap_tolerance);
        if !overlap_tolerance.is_finite() || overlap_tolerance < 0.0 {
            return Err(ConfigError::InvalidTolerance(overlap_tolerance));
        }
        let margin_threshold = self.margin_threshold.unwrap_or(defaults.margin_threshold);
        if !margin_threshold.is_finite() {
            return Err(ConfigError::InvalidMarginThreshold(margin_threshold));
        }
        let line_height = self.line_height.unwrap_or(defaults.line_height);
        if !line_height.is_finite() || line_height <= 0.0 {
            return Err(ConfigError::InvalidLineHeight(line_height));
        }

        Ok(ResolverConfig {
            overlap_tolerance,
            margin_threshold,
            line_height,
            short_comment_max_chars: self
                .short_comment_max_chars
                .unwrap_or(defaults.short_comment_max_chars),
            citation_keywords: normalize_keywords(
                self.citation_keywords.resolve(&defaults.citation_keywords),
            ),
            language_keywords: normalize_keywords(
                self.language_keywords.resolve(&defaults.language_keywords),
            ),
            ignore_markers: normalize_keywords(
                self.ignore_markers.resolve(&defaults.ignore_markers),
            ),
            citation_filter: self.citation_filter.unwrap_or(defaults.citation_filter),
            citation_issue_threshold: self
                .citation_issue_threshold
                .unwrap_or(defaults.citation_issue_threshold),
            language_issue_threshold: self
                .language_issue_threshold
                .unwrap_or(defaults.language_issue_threshold),
        })
    }
}

fn push_extend(list: &mut ListOverride<String>, value: String) {
    match list {
        ListOverride::Extend(v) | ListOverride::Replace(v) => v.push(value),
        ListOverride::Default => *list = ListOverride::Extend(vec![value]),
    }
}
