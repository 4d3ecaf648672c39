//! Prompt-level tasks. Every task takes the generator explicitly.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use marginalia_core::{
    AnnotationContext, Category, ContextMap, Language, PageIndex, RewrittenComment, RewrittenMap,
};

use crate::{CompletionRequest, GenerationError, TextGenerator};

/// Pages of text sent for a summary.
pub const SUMMARY_PAGES: usize = 10;
/// Pages of text sent for metadata extraction.
pub const METADATA_PAGES: usize = 2;
/// Rewritten comments sampled for language detection.
pub const LANGUAGE_SAMPLE: usize = 3;

/// Target format of rewritten comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteStyle {
    /// LaTeX text for the colloquium letter, in the comment's own language.
    Latex,
    /// Markdown for a peer review, always English.
    Markdown,
}

fn rewrite_prompt(ctx: &AnnotationContext, style: RewriteStyle) -> String {
    match style {
        RewriteStyle::Latex => format!(
            "You are given a PDF paragraph, a highlighted text (the exact words the reader \
commented on), and the original rough comment/annotation.

Your task: Rewrite the comment into a clear, polite, and specific question or feedback that \
directly refers to the highlighted text and is understandable in the context of the paragraph.

IMPORTANT:
- Detect the language of the original comment.
- Always produce the rewritten comment in the SAME language (usually German, sometimes English).
- Format the result so that it can be directly inserted into a LaTeX document.
- Use normal LaTeX text, not markdown.

Paragraph:
{}

Highlighted text:
{}

Original Comment:
{}

Rewritten Comment (same language as original):
",
            ctx.paragraph, ctx.highlighted, ctx.comment
        ),
        RewriteStyle::Markdown => format!(
            "You are reviewing an academic paper.
Rewrite the following rough reviewer comment into a clear, polite, and constructive \
remark addressed to the authors. Keep the meaning, but phrase it in professional \
review style. Always write it in English.

Paragraph (if available):
{}

Highlighted text (if available):
{}

Original Comment:
{}

Rewritten comment (Markdown):
",
            ctx.paragraph, ctx.highlighted, ctx.comment
        ),
    }
}

/// Number of contexts [`rewrite_comments`] will send.
pub fn count_rewritable(contexts: &ContextMap) -> usize {
    contexts
        .values()
        .flatten()
        .filter(|c| c.category == Category::Llm)
        .count()
}

/// Rewrite every `llm`-category comment. Other categories are skipped and
/// pages left without a rewritten comment are omitted.
///
/// `on_each` runs after every completed request (progress reporting).
pub async fn rewrite_comments(
    contexts: &ContextMap,
    generator: &dyn TextGenerator,
    style: RewriteStyle,
    on_each: &(dyn Fn() + Sync),
) -> Result<RewrittenMap, GenerationError> {
    let mut out = RewrittenMap::new();

    for (&page, items) in contexts {
        let mut rewritten = Vec::new();
        for ctx in items.iter().filter(|c| c.category == Category::Llm) {
            let request = CompletionRequest::new(rewrite_prompt(ctx, style), 0.4);
            let text = generator.complete(&request).await?;
            tracing::debug!(%page, original = %ctx.comment, "comment rewritten");
            on_each();
            rewritten.push(RewrittenComment {
                original: ctx.comment.clone(),
                rewritten: text,
                highlighted: ctx.highlighted.clone(),
                paragraph: ctx.paragraph.clone(),
                line: ctx.line,
            });
        }
        if !rewritten.is_empty() {
            out.insert(page, rewritten);
        }
    }

    Ok(out)
}

/// Decide whether the rewritten comments are German or English from a
/// small sample. Without any comments the thesis default (German) is used
/// and no request is made.
pub async fn detect_language(
    rewritten: &RewrittenMap,
    generator: &dyn TextGenerator,
    sample_size: usize,
) -> Result<Language, GenerationError> {
    let sample: Vec<&str> = rewritten
        .values()
        .flatten()
        .take(sample_size)
        .map(|c| c.rewritten.as_str())
        .collect();
    if sample.is_empty() {
        tracing::debug!("no rewritten comments; assuming German");
        return Ok(Language::default());
    }

    let prompt = format!(
        "Decide if the following text is written in German or English.
Respond with exactly one word: \"German\" or \"English\".

Text:
{}
",
        sample.join("\n")
    );
    let answer = generator
        .complete(&CompletionRequest::new(prompt, 0.0).light())
        .await?;
    let language = Language::from_answer(&answer);
    tracing::info!(%language, answer = %answer, "detected comment language");
    Ok(language)
}

fn joined_pages(pages_text: &BTreeMap<PageIndex, String>, limit: usize) -> String {
    pages_text
        .values()
        .take(limit)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// LaTeX-ready summary of the first ten pages, written in `language`.
pub async fn summarize_document(
    pages_text: &BTreeMap<PageIndex, String>,
    language: Language,
    generator: &dyn TextGenerator,
) -> Result<String, GenerationError> {
    let prompt = format!(
        "You are given the first ten pages of a thesis submitted to a University.
Please provide a concise summary in {language}.

Format the summary so that it can be directly inserted into a LaTeX document.

Formatting rules:
- Use normal LaTeX text, not markdown.
- Use line breaks (`\\\\`) between sentences to improve readability.
- If appropriate, structure the summary as an itemized list with `\\begin{{itemize}} ... \\end{{itemize}}`.
- If you use itemize, then do not add line breaks (`\\\\`) at the end of an item.
- Avoid special characters that break LaTeX (like unescaped #, $, %, &, _, {{, }}).

The summary should highlight:
- The main topic of the thesis
- The research questions or goals
- The methods used
- The key results (if available in the text)

Text:
{text}

Now provide the LaTeX-formatted summary:
",
        text = joined_pages(pages_text, SUMMARY_PAGES)
    );
    generator
        .complete(&CompletionRequest::new(prompt, 0.3))
        .await
}

/// Accept strings, numbers and null for a text field; models often emit
/// matriculation numbers as JSON numbers.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Title-page data of a thesis. Missing fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThesisMetadata {
    #[serde(deserialize_with = "lenient_string")]
    pub author: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub matriculation_number: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub first_examiner: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub first_examiner_christian: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub first_examiner_family: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub second_examiner: Option<String>,
    /// "Bachelor" or "Master".
    #[serde(deserialize_with = "lenient_string")]
    pub bachelor_master: Option<String>,
}

/// Title-page data of a project report. Missing fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ProjectMetadata {
    #[serde(deserialize_with = "lenient_string")]
    pub student_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub student_first_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub matriculation_number: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub first_examiner: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub first_examiner_christian: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub first_examiner_family: Option<String>,
    /// e.g. "Praxisprojekt".
    #[serde(deserialize_with = "lenient_string")]
    pub work_type: Option<String>,
}

/// Parse a JSON object out of a model reply. Code fences and prose around
/// the object are tolerated; anything unparseable yields the default value.
pub fn parse_json_reply<T: DeserializeOwned + Default>(reply: &str) -> T {
    let object = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply,
    };
    match serde_json::from_str(object) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "could not parse metadata JSON; continuing without it");
            T::default()
        }
    }
}

/// Author, matriculation number, title and examiners of a thesis.
pub async fn extract_thesis_metadata(
    pages_text: &BTreeMap<PageIndex, String>,
    language: Language,
    generator: &dyn TextGenerator,
) -> Result<ThesisMetadata, GenerationError> {
    let prompt = format!(
        "You are given the first pages of a thesis submitted at a University.
It is written in {language}.
Extract the following information if available:

- Author full name
- Matriculation number (Matrikelnr.)
- Title of the thesis
- First examiner (Erstprüfer)
- Christian name of first examiner
- Family name of first examiner
- Second examiner (Zweitprüfer)
- 'Bachelor' if it is a Bachelor thesis or 'Master' if it is a Master thesis

Return the result as a valid JSON object with keys:
\"author\", \"matriculation_number\", \"title\", \"first_examiner\", \"first_examiner_christian\", \
\"first_examiner_family\", \"second_examiner\", \"bachelor_master\".

If something is missing, use null as the value.
Do not include any extra text.

Document text:
{text}
",
        text = joined_pages(pages_text, METADATA_PAGES)
    );
    let reply = generator
        .complete(&CompletionRequest::new(prompt, 0.0))
        .await?;
    Ok(parse_json_reply(&reply))
}

/// Student, matriculation number, title, examiner and work type of a project report.
pub async fn extract_project_metadata(
    pages_text: &BTreeMap<PageIndex, String>,
    generator: &dyn TextGenerator,
) -> Result<ProjectMetadata, GenerationError> {
    let prompt = format!(
        "You are given the first pages of a project work (Praxisprojekt) submitted
at TH Köln University. Extract the following information if available:

- Student's full name (Autor/Author)
- Student's first name only (Vorname)
- Matriculation number (Matrikelnr.)
- Title of the project work
- First examiner (Erstprüfer/Betreuer)
- Christian name of first examiner
- Family name of first examiner
- Type of work (e.g., \"Praxisprojekt\", \"Projektarbeit\")

Return the result as a valid JSON object with keys:
\"student_name\", \"student_first_name\", \"matriculation_number\", \"title\",
\"first_examiner\", \"first_examiner_christian\", \"first_examiner_family\",
\"work_type\".

If something is missing, use null as the value.
Do not include any extra text, only valid JSON.

Document text:
{text}
",
        text = joined_pages(pages_text, METADATA_PAGES)
    );
    let reply = generator
        .complete(&CompletionRequest::new(prompt, 0.0))
        .await?;
    Ok(parse_json_reply(&reply))
}

/// Formal German address for a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Salutation {
    Herr,
    Frau,
    /// Printed as "Herr/Frau" for the examiner to correct.
    #[default]
    Unknown,
}

impl Salutation {
    /// Anything other than exactly "Herr" or "Frau" is `Unknown`.
    pub fn from_answer(answer: &str) -> Self {
        match answer.trim().trim_end_matches('.') {
            "Herr" => Salutation::Herr,
            "Frau" => Salutation::Frau,
            _ => Salutation::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Salutation::Herr => "Herr",
            Salutation::Frau => "Frau",
            Salutation::Unknown => "Herr/Frau",
        }
    }
}

impl fmt::Display for Salutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ask how to address a student with this first name. No request is made
/// when the name is unknown.
pub async fn determine_salutation(
    first_name: Option<&str>,
    generator: &dyn TextGenerator,
) -> Result<Salutation, GenerationError> {
    let Some(name) = first_name.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(Salutation::Unknown);
    };
    let prompt = format!(
        "Based on the following German or international first name, determine whether
the person should be addressed as \"Herr\" (Mr.) or \"Frau\" (Ms./Mrs.) in a
formal German letter.

First name: {name}

Respond with ONLY one word: either \"Herr\" or \"Frau\".
If uncertain, respond with \"Herr/Frau\".
"
    );
    let answer = generator
        .complete(&CompletionRequest::new(prompt, 0.0).light())
        .await?;
    Ok(Salutation::from_answer(&answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelTier;
    use crate::mock::{MockGenerator, MockResponse};
    use marginalia_core::DisplayPageNumber;

    fn ctx(comment: &str, category: Category) -> AnnotationContext {
        AnnotationContext {
            comment: comment.to_string(),
            highlighted: "uses graphs".to_string(),
            paragraph: "The method uses graphs".to_string(),
            category,
            line: Some(4),
        }
    }

    fn page(n: usize) -> DisplayPageNumber {
        DisplayPageNumber::new(n).unwrap()
    }

    fn noop() {}

    #[tokio::test]
    async fn rewrites_only_llm_comments_and_drops_empty_pages() {
        let contexts = ContextMap::from([
            (
                page(1),
                vec![ctx("why?", Category::Llm), ctx("Quelle?", Category::Quelle)],
            ),
            (page(2), vec![ctx("Tippfehler", Category::Language)]),
        ]);
        let mock = MockGenerator::replying("  Warum wurde dieser Ansatz gewählt?  ");

        let out = rewrite_comments(&contexts, &mock, RewriteStyle::Latex, &noop)
            .await
            .unwrap();

        assert_eq!(mock.call_count(), 1);
        assert_eq!(out.keys().copied().collect::<Vec<_>>(), vec![page(1)]);
        let c = &out[&page(1)][0];
        assert_eq!(c.original, "why?");
        assert_eq!(c.rewritten, "Warum wurde dieser Ansatz gewählt?");
        assert_eq!(c.line, Some(4));

        let req = &mock.requests()[0];
        assert!(req.prompt.contains("SAME language"));
        assert!(req.prompt.contains("The method uses graphs"));
        assert!((req.temperature - 0.4).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn markdown_style_asks_for_english() {
        let contexts = ContextMap::from([(page(3), vec![ctx("unclear", Category::Llm)])]);
        let mock = MockGenerator::replying("Please clarify the claim.");
        rewrite_comments(&contexts, &mock, RewriteStyle::Markdown, &noop)
            .await
            .unwrap();
        assert!(mock.requests()[0].prompt.contains("Always write it in English"));
    }

    #[tokio::test]
    async fn rewrite_error_propagates() {
        let contexts = ContextMap::from([(page(1), vec![ctx("why?", Category::Llm)])]);
        let mock = MockGenerator::new(MockResponse::Error(GenerationError::Api {
            status: 401,
            body: "invalid key".into(),
        }));
        let err = rewrite_comments(&contexts, &mock, RewriteStyle::Latex, &noop)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Api { status: 401, .. }));
    }

    #[test]
    fn counts_rewritable() {
        let contexts = ContextMap::from([(
            page(1),
            vec![
                ctx("a", Category::Llm),
                ctx("b", Category::Ignore),
                ctx("c", Category::Llm),
            ],
        )]);
        assert_eq!(count_rewritable(&contexts), 2);
    }

    fn rewritten(texts: &[&str]) -> RewrittenMap {
        RewrittenMap::from([(
            page(1),
            texts
                .iter()
                .map(|t| RewrittenComment {
                    original: String::new(),
                    rewritten: t.to_string(),
                    highlighted: String::new(),
                    paragraph: String::new(),
                    line: None,
                })
                .collect(),
        )])
    }

    #[tokio::test]
    async fn language_detection_samples_and_uses_light_tier() {
        let mock = MockGenerator::replying("English");
        let lang = detect_language(&rewritten(&["one", "two", "three", "four"]), &mock, 3)
            .await
            .unwrap();
        assert_eq!(lang, Language::English);

        let req = &mock.requests()[0];
        assert_eq!(req.tier, ModelTier::Light);
        assert!(req.prompt.contains("three"));
        assert!(!req.prompt.contains("four"));
    }

    #[tokio::test]
    async fn language_defaults_to_german_without_comments() {
        let mock = MockGenerator::replying("English");
        let lang = detect_language(&RewrittenMap::new(), &mock, 3).await.unwrap();
        assert_eq!(lang, Language::German);
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn json_reply_with_fences_and_numbers() {
        let reply = "```json\n{\"author\": \"Erika Mustermann\", \"matriculation_number\": 1234567, \"title\": null}\n```";
        let meta: ThesisMetadata = parse_json_reply(reply);
        assert_eq!(meta.author.as_deref(), Some("Erika Mustermann"));
        assert_eq!(meta.matriculation_number.as_deref(), Some("1234567"));
        assert_eq!(meta.title, None);
        assert_eq!(meta.second_examiner, None);
    }

    #[test]
    fn unparseable_reply_yields_empty_metadata() {
        let meta: ProjectMetadata = parse_json_reply("I could not find anything.");
        assert_eq!(meta, ProjectMetadata::default());
    }

    #[tokio::test]
    async fn metadata_prompt_uses_first_two_pages() {
        let pages = BTreeMap::from([
            (PageIndex(0), "Titelblatt".to_string()),
            (PageIndex(1), "Erklärung".to_string()),
            (PageIndex(2), "Kapitel 1".to_string()),
        ]);
        let mock = MockGenerator::replying(r#"{"student_name": "Max Muster", "work_type": "Praxisprojekt"}"#);
        let meta = extract_project_metadata(&pages, &mock).await.unwrap();

        assert_eq!(meta.student_name.as_deref(), Some("Max Muster"));
        assert_eq!(meta.work_type.as_deref(), Some("Praxisprojekt"));
        let prompt = &mock.requests()[0].prompt;
        assert!(prompt.contains("Erklärung"));
        assert!(!prompt.contains("Kapitel 1"));
    }

    #[tokio::test]
    async fn summary_prompt_names_language() {
        let pages = BTreeMap::from([(PageIndex(0), "Einleitung".to_string())]);
        let mock = MockGenerator::replying("Die Arbeit untersucht Graphen.");
        let summary = summarize_document(&pages, Language::German, &mock)
            .await
            .unwrap();
        assert_eq!(summary, "Die Arbeit untersucht Graphen.");
        assert!(mock.requests()[0].prompt.contains("concise summary in German"));
    }

    #[test]
    fn salutation_from_answer() {
        assert_eq!(Salutation::from_answer("Frau"), Salutation::Frau);
        assert_eq!(Salutation::from_answer(" Herr.\n"), Salutation::Herr);
        assert_eq!(Salutation::from_answer("Herr/Frau"), Salutation::Unknown);
        assert_eq!(Salutation::from_answer("Mr."), Salutation::Unknown);
        assert_eq!(Salutation::Unknown.to_string(), "Herr/Frau");
    }

    #[tokio::test]
    async fn salutation_without_name_makes_no_request() {
        let mock = MockGenerator::replying("Frau");
        assert_eq!(
            determine_salutation(None, &mock).await.unwrap(),
            Salutation::Unknown
        );
        assert_eq!(
            determine_salutation(Some("Anna"), &mock).await.unwrap(),
            Salutation::Frau
        );
        assert_eq!(mock.call_count(), 1);
    }
}
