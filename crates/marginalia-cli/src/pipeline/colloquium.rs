//! Thesis colloquium: annotated thesis in, evaluation letter out.

use std::path::Path;

use indicatif::ProgressBar;
use marginalia_core::{
    DocumentBackend, ExtractionStats, Language, ResolverConfig, build_word_index,
    extract_annotations, resolve_contexts,
};
use marginalia_llm::tasks::{LANGUAGE_SAMPLE, SUMMARY_PAGES};
use marginalia_llm::{
    RewriteStyle, TextGenerator, count_rewritable, detect_language, extract_thesis_metadata,
    rewrite_comments, summarize_document,
};
use marginalia_reporting::{
    ColloquiumLetter, DEFAULT_RECIPIENT, append_issue_remarks, colloquium_file_name,
    concatenate_comments, examiner_mail,
};

use super::{OutputOptions, Written};

#[derive(Debug, Clone)]
pub struct ColloquiumReport {
    pub written: Written,
    pub stats: ExtractionStats,
    pub language: Language,
    pub rewritten_comments: usize,
    pub frequent_citation_issues: bool,
    pub frequent_language_issues: bool,
}

pub async fn run(
    backend: &dyn DocumentBackend,
    generator: &dyn TextGenerator,
    pdf: &Path,
    config: &ResolverConfig,
    options: &OutputOptions,
    progress: &ProgressBar,
) -> anyhow::Result<ColloquiumReport> {
    let index = build_word_index(backend, pdf)?;
    let annotations = extract_annotations(backend, pdf, config)?;
    let contexts = resolve_contexts(&index, &annotations, config)?;

    progress.set_length(count_rewritable(&contexts) as u64);
    let rewritten =
        rewrite_comments(&contexts, generator, RewriteStyle::Latex, &|| progress.inc(1)).await?;
    progress.finish_and_clear();

    let language = detect_language(&rewritten, generator, LANGUAGE_SAMPLE).await?;

    let pages = backend.extract_page_text(pdf, SUMMARY_PAGES)?;
    let summary = summarize_document(&pages, language, generator).await?;
    let metadata = extract_thesis_metadata(&pages, language, generator).await?;

    let stats = annotations.stats;
    let frequent_citation_issues = stats.frequent_citation_issues(config);
    let frequent_language_issues = stats.frequent_language_issues(config);
    if frequent_citation_issues {
        tracing::info!(count = stats.quelle, "frequent missing citations");
    }
    if frequent_language_issues {
        tracing::info!(count = stats.language, "frequent language errors");
    }

    let author = metadata.author.as_deref().unwrap_or("Unknown");
    let matriculation = metadata.matriculation_number.as_deref();
    let letter = ColloquiumLetter {
        recipient: DEFAULT_RECIPIENT.to_string(),
        subject: format!(
            "Bewertung {} von {}",
            metadata.bachelor_master.as_deref().unwrap_or("Arbeit"),
            author
        ),
        title: metadata.title.clone().unwrap_or_default(),
        author: format!("{}, Matr.-Nr. {}", author, matriculation.unwrap_or("unknown")),
        summary: append_issue_remarks(&summary, frequent_citation_issues, frequent_language_issues),
        first_examiner: metadata
            .first_examiner
            .clone()
            .unwrap_or_else(|| "Unbekannt".to_string()),
        second_examiner: metadata
            .second_examiner
            .clone()
            .unwrap_or_else(|| "Unbekannt".to_string()),
        first_examiner_mail: examiner_mail(
            metadata.first_examiner_christian.as_deref(),
            metadata.first_examiner_family.as_deref(),
        ),
        questions: concatenate_comments(&rewritten, language),
        place: options.place.clone(),
        date: r"\today".to_string(),
    };

    let dir = options.dir_for(pdf);
    let tex = letter.write_to(&dir, &colloquium_file_name(matriculation))?;

    Ok(ColloquiumReport {
        written: Written::compiled(tex, options, &dir),
        stats,
        language,
        rewritten_comments: rewritten.values().map(Vec::len).sum(),
        frequent_citation_issues,
        frequent_language_issues,
    })
}
