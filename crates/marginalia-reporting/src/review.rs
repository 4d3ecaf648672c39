//! Markdown peer review.

use std::path::{Path, PathBuf};

use marginalia_core::RewrittenMap;

use crate::ReportError;

/// Review document listing every rewritten comment with its page and line.
/// Comments whose line is unknown are listed with `?`.
pub fn render_review(rewritten: &RewrittenMap) -> String {
    let mut out = String::from(
        "# Peer Review\n\nDear authors,\n\nhere are my comments on your manuscript:\n",
    );
    for (page, items) in rewritten {
        for item in items {
            let line = item
                .line
                .map(|l| l.to_string())
                .unwrap_or_else(|| "?".to_string());
            out.push_str(&format!(
                "\n- Page {}, Line {}: {}",
                page,
                line,
                item.rewritten.trim()
            ));
        }
    }
    out
}

pub fn review_file_name(stem: &str) -> String {
    format!("review_comments_{}.md", stem)
}

/// Write the review as `review_comments_{stem}.md` into `dir`.
pub fn write_review(
    rewritten: &RewrittenMap,
    dir: &Path,
    stem: &str,
) -> Result<PathBuf, ReportError> {
    let path = dir.join(review_file_name(stem));
    std::fs::write(&path, render_review(rewritten))?;
    tracing::info!(path = %path.display(), comments = rewritten.values().map(Vec::len).sum::<usize>(), "review written");
    Ok(path)
}
