//! Output documents for marginalia: LaTeX letters, Markdown peer reviews and
//! LaTeX compilation.

pub mod compile;
pub mod latex;
pub mod letter;
pub mod project;
pub mod review;

pub use compile::{DEFAULT_ENGINE, compile_latex, find_latest_tex};
pub use latex::{COMMENT_SEPARATOR, concatenate_comments, escape_for_latex};
pub use letter::{
    ColloquiumLetter, DEFAULT_PLACE, DEFAULT_RECIPIENT, LANGUAGE_ERRORS_REMARK,
    MISSING_CITATIONS_REMARK, append_issue_remarks, colloquium_file_name, examiner_mail,
};
pub use project::{
    DEFAULT_SIGNATURE, DEFAULT_WORK_TYPE, ProjectLetter, current_semester, project_file_name,
    semester_for,
};
pub use review::{render_review, review_file_name, write_review};

/// Errors from writing or compiling output documents.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("LaTeX compilation failed: {0}")]
    Compile(String),
    #[error("invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}
