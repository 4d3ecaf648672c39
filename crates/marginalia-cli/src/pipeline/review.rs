//! Peer review: annotated paper in, Markdown review out.

use std::path::Path;

use indicatif::ProgressBar;
use marginalia_core::{
    DocumentBackend, ExtractionStats, ResolverConfig, build_word_index, extract_annotations,
    resolve_contexts_with_lines,
};
use marginalia_llm::{RewriteStyle, TextGenerator, count_rewritable, rewrite_comments};
use marginalia_reporting::write_review;

use super::OutputOptions;

#[derive(Debug, Clone)]
pub struct ReviewReport {
    pub path: std::path::PathBuf,
    pub stats: ExtractionStats,
    pub comments: usize,
}

/// Short citation remarks are reviewer comments here too, so the citation
/// filter is always off.
pub async fn run(
    backend: &dyn DocumentBackend,
    generator: &dyn TextGenerator,
    pdf: &Path,
    config: &ResolverConfig,
    options: &OutputOptions,
    progress: &ProgressBar,
) -> anyhow::Result<ReviewReport> {
    let config = config.clone().with_citation_filter(false);

    let index = build_word_index(backend, pdf)?;
    let annotations = extract_annotations(backend, pdf, &config)?;
    let heights = backend.page_heights(pdf)?;
    let contexts = resolve_contexts_with_lines(&index, &annotations, &heights, &config)?;

    progress.set_length(count_rewritable(&contexts) as u64);
    let rewritten =
        rewrite_comments(&contexts, generator, RewriteStyle::Markdown, &|| progress.inc(1))
            .await?;
    progress.finish_and_clear();

    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let path = write_review(&rewritten, &options.dir_for(pdf), &stem)?;

    Ok(ReviewReport {
        path,
        stats: annotations.stats,
        comments: rewritten.values().map(Vec::len).sum(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fixtures;
    use marginalia_llm::{MockGenerator, MockResponse};

    #[tokio::test]
    async fn writes_markdown_review_with_lines() {
        let generator = MockGenerator::from_fn(|req| {
            let text = if req.prompt.contains("Original Comment:\nQuelle?") {
                "Please add a reference here."
            } else {
                "Please explain this claim."
            };
            MockResponse::Text(text.to_string())
        });
        let dir = tempfile::tempdir().unwrap();
        let options = OutputOptions {
            out_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let report = run(
            &fixtures::thesis(),
            &generator,
            Path::new("/papers/paper42.pdf"),
            &ResolverConfig::default(),
            &options,
            &ProgressBar::hidden(),
        )
        .await
        .unwrap();

        // "Quelle?" is rewritten instead of counted; "Grammatik" still is not.
        assert_eq!(report.stats.quelle, 0);
        assert_eq!(report.stats.llm, 2);
        assert_eq!(report.comments, 2);
        assert_eq!(report.path, dir.path().join("review_comments_paper42.md"));

        // Annotation top y = 512 on an 842 high page: floor(330 / 12) + 1 = 28.
        let md = std::fs::read_to_string(&report.path).unwrap();
        assert!(md.starts_with("# Peer Review\n\nDear authors,"));
        assert!(md.contains("- Page 2, Line 28: Please explain this claim."));
        assert!(md.contains("- Page 2, Line 28: Please add a reference here."));
    }
}
