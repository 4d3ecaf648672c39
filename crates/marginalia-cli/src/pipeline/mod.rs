//! The workflows behind the subcommands.
//!
//! Each pipeline takes its document backend and text generator as trait
//! objects; the binary passes the MuPDF backend and a paced chat client.

use std::path::{Path, PathBuf};

use marginalia_reporting::{DEFAULT_ENGINE, DEFAULT_PLACE, DEFAULT_SIGNATURE, compile_latex};

pub mod colloquium;
pub mod project;
pub mod review;

/// Where and how output documents are written.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    /// Output folder; the PDF's folder when `None`.
    pub out_dir: Option<PathBuf>,
    pub compile: bool,
    pub engine: String,
    pub place: String,
    pub signature: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            out_dir: None,
            compile: true,
            engine: DEFAULT_ENGINE.to_string(),
            place: DEFAULT_PLACE.to_string(),
            signature: DEFAULT_SIGNATURE.to_string(),
        }
    }
}

impl OutputOptions {
    pub fn dir_for(&self, pdf: &Path) -> PathBuf {
        match &self.out_dir {
            Some(dir) => dir.clone(),
            None => pdf
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

/// A generated document and, when compilation was requested, its outcome.
#[derive(Debug, Clone, Default)]
pub struct Written {
    pub source: PathBuf,
    pub pdf: Option<PathBuf>,
    pub compile_error: Option<String>,
}

impl Written {
    /// Compile `source` when requested. Failures are kept, not raised.
    pub(crate) fn compiled(source: PathBuf, options: &OutputOptions, dir: &Path) -> Self {
        if !options.compile {
            return Self {
                source,
                ..Default::default()
            };
        }
        match compile_latex(&source, Some(dir), &options.engine) {
            Ok(pdf) => Self {
                source,
                pdf: Some(pdf),
                compile_error: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "LaTeX compilation failed");
                Self {
                    source,
                    pdf: None,
                    compile_error: Some(e.to_string()),
                }
            }
        }
    }
}
