//! Mock text generator for testing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::{CompletionRequest, GenerationError, TextGenerator};

/// A configurable mock response for [`MockGenerator`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    Text(String),
    /// Simulate a 429 rate-limit response.
    RateLimited { retry_after: Option<Duration> },
    Error(GenerationError),
}

type Responder = Box<dyn Fn(&CompletionRequest) -> MockResponse + Send + Sync>;

/// A hand-rolled mock implementing [`TextGenerator`].
///
/// Supports:
/// - A fixed response (used for every call), **or**
/// - A sequence of responses (one per call, repeating the last if exhausted), **or**
/// - A closure deciding the response from the request.
/// - Call counting and capture of every request.
pub struct MockGenerator {
    /// Each call pops the next response; reversed so `pop()` yields the first.
    responses: Mutex<Vec<MockResponse>>,
    fallback: MockResponse,
    responder: Option<Responder>,
    requests: Mutex<Vec<CompletionRequest>>,
    call_count: AtomicUsize,
}

impl MockGenerator {
    /// Create a mock that always returns `response`.
    pub fn new(response: MockResponse) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: response,
            responder: None,
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// A mock that always answers with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(MockResponse::Text(text.into()))
    }

    /// Create a mock that returns responses in order, repeating the last one.
    /// An empty sequence answers with empty text.
    pub fn with_sequence(mut responses: Vec<MockResponse>) -> Self {
        let fallback = responses
            .last()
            .cloned()
            .unwrap_or_else(|| MockResponse::Text(String::new()));
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            ..Self::new(fallback)
        }
    }

    /// Create a mock whose answer depends on the request.
    pub fn from_fn(
        responder: impl Fn(&CompletionRequest) -> MockResponse + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new(MockResponse::Text(String::new()))
        }
    }

    /// How many times `complete()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn next_response(&self, request: &CompletionRequest) -> MockResponse {
        if let Some(responder) = &self.responder {
            return responder(request);
        }
        match self.responses.lock() {
            Ok(mut seq) => seq.pop().unwrap_or_else(|| self.fallback.clone()),
            Err(_) => self.fallback.clone(),
        }
    }
}

impl TextGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        let response = self.next_response(request);

        Box::pin(async move {
            match response {
                MockResponse::Text(text) => Ok(text.trim().to_string()),
                MockResponse::RateLimited { retry_after } => {
                    Err(GenerationError::RateLimited { retry_after })
                }
                MockResponse::Error(e) => Err(e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequence_then_repeat_last() {
        let mock = MockGenerator::with_sequence(vec![
            MockResponse::Text("one".into()),
            MockResponse::Text("two".into()),
        ]);
        let req = CompletionRequest::new("p", 0.0);
        assert_eq!(mock.complete(&req).await.unwrap(), "one");
        assert_eq!(mock.complete(&req).await.unwrap(), "two");
        assert_eq!(mock.complete(&req).await.unwrap(), "two");
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.requests().len(), 3);
    }

    #[tokio::test]
    async fn responder_sees_prompt() {
        let mock = MockGenerator::from_fn(|req| {
            if req.prompt.contains("German or English") {
                MockResponse::Text("English".into())
            } else {
                MockResponse::Text("other".into())
            }
        });
        let answer = mock
            .complete(&CompletionRequest::new("German or English?", 0.0))
            .await
            .unwrap();
        assert_eq!(answer, "English");
    }
}
