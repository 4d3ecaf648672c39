//! Text generation for marginalia: an OpenAI-compatible chat client, request
//! pacing, and the prompt-level tasks the pipelines run.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

pub mod client;
pub mod mock;
pub mod pacing;
pub mod tasks;

pub use client::{ChatClient, Provider, select_provider};
pub use mock::{MockGenerator, MockResponse};
pub use pacing::{AdaptiveLimiter, Paced, PacingPolicy};
pub use tasks::{
    ProjectMetadata, RewriteStyle, Salutation, ThesisMetadata, count_rewritable, detect_language,
    determine_salutation, extract_project_metadata, extract_thesis_metadata, rewrite_comments,
    summarize_document,
};

/// Error type for text generation, distinguishing rate limiting from other failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    /// Server returned 429 Too Many Requests.
    #[error("rate limited (429){}", retry_suffix(.retry_after))]
    RateLimited { retry_after: Option<Duration> },
    /// Transport failure before a status code was received.
    #[error("HTTP error: {0}")]
    Http(String),
    /// Non-success status other than 429.
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("no API key configured for {0}")]
    MissingApiKey(String),
    #[error("cancelled")]
    Cancelled,
}

fn retry_suffix(retry_after: &Option<Duration>) -> String {
    retry_after
        .map(|d| format!(", retry after {:.1}s", d.as_secs_f64()))
        .unwrap_or_default()
}

impl GenerationError {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::RateLimited { .. } | GenerationError::Http(_) => true,
            GenerationError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Which of the provider's models a request should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelTier {
    /// Rewriting, summaries and metadata.
    #[default]
    Primary,
    /// Cheap classification such as language detection.
    Light,
}

/// A single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
    pub tier: ModelTier,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            temperature,
            tier: ModelTier::Primary,
        }
    }

    pub fn light(mut self) -> Self {
        self.tier = ModelTier::Light;
        self
    }
}

/// A text-generation service: prompt in, text out.
pub trait TextGenerator: Send + Sync {
    /// Name used in logs (e.g. "Groq").
    fn name(&self) -> &str;

    /// Run one completion and return the trimmed reply text.
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>>;
}
