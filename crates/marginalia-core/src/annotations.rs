//! Annotation extraction: geometry normalization and intent classification.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ResolverConfig;
use crate::geometry::{BBox, GeometryError, normalize_annotation_box};
use crate::page::PageIndex;

/// An annotation as read from the PDF, before any interpretation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAnnotation {
    /// `/Contents` of the annotation, if any.
    pub text: Option<String>,
    /// `/Subtype` name (`Highlight`, `Text`, `FreeText`, ...). Informational only.
    pub subtype: Option<String>,
    pub rect: Option<BBox>,
    /// Flat `x, y` list, 8 numbers per quad.
    pub quadpoints: Option<Vec<f64>>,
}

/// What the commenter wants done with an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Substantive remark that should be rewritten.
    Llm,
    /// Short "source missing" remark.
    Quelle,
    /// Spelling, grammar or phrasing remark.
    Language,
    /// Start-of-counting marker.
    Ignore,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Llm => "llm",
            Category::Quelle => "quelle",
            Category::Language => "language",
            Category::Ignore => "ignore",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a rule inspects the normalized (trimmed, lower-cased) comment text.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// Text equals one of the phrases.
    Equals(Vec<String>),
    /// Text contains one of the keywords and, if `max_chars` is set, is
    /// strictly shorter than that many characters.
    ContainsAny {
        keywords: Vec<String>,
        max_chars: Option<usize>,
    },
}

impl Matcher {
    fn matches(&self, text: &str) -> bool {
        match self {
            Matcher::Equals(phrases) => phrases.iter().any(|p| p == text),
            Matcher::ContainsAny {
                keywords,
                max_chars,
            } => {
                if let Some(max) = max_chars
                    && text.chars().count() >= *max
                {
                    return false;
                }
                keywords.iter().any(|k| text.contains(k.as_str()))
            }
        }
    }
}

/// One row of the classification table.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationRule {
    pub category: Category,
    pub matcher: Matcher,
}

/// Ordered, first-match-wins rule table. Text matching no rule is [`Category::Llm`].
#[derive(Debug, Clone, PartialEq)]
pub struct Classifier {
    rules: Vec<ClassificationRule>,
}

impl Classifier {
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    /// The standard table:
    ///
    /// 1. ignore marker phrase → `ignore`
    /// 2. citation keyword in a short comment → `quelle` (only with the citation filter on)
    /// 3. language keyword → `language`
    pub fn from_config(config: &ResolverConfig) -> Self {
        let mut rules = vec![ClassificationRule {
            category: Category::Ignore,
            matcher: Matcher::Equals(config.ignore_markers().to_vec()),
        }];
        if config.citation_filter() {
            rules.push(ClassificationRule {
                category: Category::Quelle,
                matcher: Matcher::ContainsAny {
                    keywords: config.citation_keywords().to_vec(),
                    max_chars: Some(config.short_comment_max_chars()),
                },
            });
        }
        rules.push(ClassificationRule {
            category: Category::Language,
            matcher: Matcher::ContainsAny {
                keywords: config.language_keywords().to_vec(),
                max_chars: None,
            },
        });
        Self { rules }
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn classify(&self, text: &str) -> Category {
        let normalized = text.trim().to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(&normalized))
            .map(|rule| rule.category)
            .unwrap_or(Category::Llm)
    }
}

/// A classified annotation with resolved geometry. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Trimmed comment text, never empty.
    pub text: String,
    pub subtype: Option<String>,
    pub rect: Option<BBox>,
    pub quadpoints: Option<Vec<f64>>,
    /// Box derived from `rect` or `quadpoints`.
    pub bbox: BBox,
    pub category: Category,
}

/// Per-document counts gathered while extracting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    pub llm: usize,
    pub quelle: usize,
    pub language: usize,
    pub ignore: usize,
    pub dropped_no_text: usize,
    pub dropped_no_geometry: usize,
}

impl ExtractionStats {
    fn record(&mut self, category: Category) {
        match category {
            Category::Llm => self.llm += 1,
            Category::Quelle => self.quelle += 1,
            Category::Language => self.language += 1,
            Category::Ignore => self.ignore += 1,
        }
    }

    pub fn kept(&self) -> usize {
        self.llm + self.quelle + self.language + self.ignore
    }

    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::Llm => self.llm,
            Category::Quelle => self.quelle,
            Category::Language => self.language,
            Category::Ignore => self.ignore,
        }
    }

    /// More citation remarks than the configured threshold.
    pub fn frequent_citation_issues(&self, config: &ResolverConfig) -> bool {
        self.quelle > config.citation_issue_threshold()
    }

    /// More language remarks than the configured threshold.
    pub fn frequent_language_issues(&self, config: &ResolverConfig) -> bool {
        self.language > config.language_issue_threshold()
    }
}

/// Output of [`AnnotationExtractor::extract`].
#[derive(Debug, Clone, Default)]
pub struct ClassifiedAnnotations {
    /// Only pages with at least one kept annotation appear.
    pub pages: BTreeMap<PageIndex, Vec<Annotation>>,
    pub stats: ExtractionStats,
}

impl ClassifiedAnnotations {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PageIndex, &Annotation)> {
        self.pages
            .iter()
            .flat_map(|(page, annots)| annots.iter().map(move |a| (*page, a)))
    }
}

/// Turns raw annotation records into classified [`Annotation`]s.
#[derive(Debug, Clone)]
pub struct AnnotationExtractor {
    classifier: Classifier,
}

impl AnnotationExtractor {
    pub fn new(config: &ResolverConfig) -> Self {
        Self {
            classifier: Classifier::from_config(config),
        }
    }

    pub fn with_classifier(classifier: Classifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Classify one raw annotation.
    ///
    /// Returns `Ok(None)` for annotations without text, `Err` for text
    /// annotations whose geometry cannot be resolved.
    pub fn classify_one(&self, raw: &RawAnnotation) -> Result<Option<Annotation>, GeometryError> {
        let Some(text) = raw
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        else {
            return Ok(None);
        };

        let bbox = normalize_annotation_box(raw.rect, raw.quadpoints.as_deref())?;

        Ok(Some(Annotation {
            text: text.to_string(),
            subtype: raw.subtype.clone(),
            rect: raw.rect,
            quadpoints: raw.quadpoints.clone(),
            bbox,
            category: self.classifier.classify(text),
        }))
    }

    /// Classify every annotation of a document. Never fails: annotations
    /// without text or usable geometry are dropped and counted.
    pub fn extract(&self, raw: &BTreeMap<PageIndex, Vec<RawAnnotation>>) -> ClassifiedAnnotations {
        let mut out = ClassifiedAnnotations::default();

        for (&page, annots) in raw {
            let mut kept = Vec::new();
            for annot in annots {
                match self.classify_one(annot) {
                    Ok(Some(a)) => {
                        out.stats.record(a.category);
                        kept.push(a);
                    }
                    Ok(None) => out.stats.dropped_no_text += 1,
                    Err(e) => {
                        tracing::debug!(%page, error = %e, "dropping annotation without usable geometry");
                        out.stats.dropped_no_geometry += 1;
                    }
                }
            }
            if !kept.is_empty() {
                out.pages.insert(page, kept);
            }
        }

        tracing::debug!(
            kept = out.stats.kept(),
            quelle = out.stats.quelle,
            language = out.stats.language,
            dropped_no_geometry = out.stats.dropped_no_geometry,
            "annotations classified"
        );
        out
    }
}
