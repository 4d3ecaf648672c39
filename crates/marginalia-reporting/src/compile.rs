//! LaTeX compilation and `.tex` discovery.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use crate::ReportError;

pub const DEFAULT_ENGINE: &str = "lualatex";

/// Run `engine` on `tex` and return the path of the expected PDF.
///
/// Output goes to `out_dir`, or next to the `.tex` file when `None`.
pub fn compile_latex(
    tex: &Path,
    out_dir: Option<&Path>,
    engine: &str,
) -> Result<PathBuf, ReportError> {
    let dir = match out_dir {
        Some(d) => d.to_path_buf(),
        None => tex
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    tracing::info!(engine, tex = %tex.display(), "compiling LaTeX");
    let output = Command::new(engine)
        .arg("-interaction=nonstopmode")
        .arg(format!("-output-directory={}", dir.display()))
        .arg(tex)
        .output()
        .map_err(|e| ReportError::Compile(format!("failed to run {}: {}", engine, e)))?;

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let tail: Vec<&str> = stdout.lines().rev().take(20).collect();
        tracing::debug!(log_tail = %tail.into_iter().rev().collect::<Vec<_>>().join("\n"), "engine output");
        return Err(ReportError::Compile(format!(
            "{} exited with {}",
            engine, output.status
        )));
    }

    let stem = tex
        .file_stem()
        .ok_or_else(|| ReportError::Compile(format!("not a file: {}", tex.display())))?;
    let mut pdf = dir.join(stem);
    pdf.set_extension("pdf");
    Ok(pdf)
}

/// The most recently modified file in `folder` matching `pattern`
/// (e.g. `bewertung_brief_*.tex`), or `None` when nothing matches.
pub fn find_latest_tex(folder: &Path, pattern: &str) -> Result<Option<PathBuf>, ReportError> {
    let full = folder.join(pattern);
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in glob::glob(&full.to_string_lossy())? {
        let Ok(path) = entry else { continue };
        let Ok(modified) = std::fs::metadata(&path).and_then(|m| m.modified()) else {
            continue;
        };
        if newest.as_ref().is_none_or(|(t, _)| modified >= *t) {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}
