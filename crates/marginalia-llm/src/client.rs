//! OpenAI-compatible chat-completions client.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{CompletionRequest, GenerationError, ModelTier, TextGenerator};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Hosted services speaking the chat-completions protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Groq,
    OpenAi,
}

impl Provider {
    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::Groq => "https://api.groq.com/openai/v1",
            Provider::OpenAi => "https://api.openai.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Groq => "openai/gpt-oss-120b",
            Provider::OpenAi => "gpt-4o",
        }
    }

    pub fn default_light_model(&self) -> &'static str {
        match self {
            Provider::Groq => "openai/gpt-oss-20b",
            Provider::OpenAi => "gpt-4o-mini",
        }
    }

    /// Environment variable holding the API key.
    pub fn key_var(&self) -> &'static str {
        match self {
            Provider::Groq => "GROQ_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Groq => f.write_str("Groq"),
            Provider::OpenAi => f.write_str("OpenAI"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(Provider::Groq),
            "openai" => Ok(Provider::OpenAi),
            other => Err(format!("unknown provider '{}' (expected groq or openai)", other)),
        }
    }
}

/// Pick the provider and its key.
///
/// An explicit choice must have its key. Otherwise Groq is preferred when
/// its key is present, then OpenAI.
pub fn select_provider(
    explicit: Option<Provider>,
    groq_key: Option<&str>,
    openai_key: Option<&str>,
) -> Result<(Provider, String), GenerationError> {
    let key_for = |p: Provider| match p {
        Provider::Groq => groq_key,
        Provider::OpenAi => openai_key,
    };
    let usable = |k: Option<&str>| k.map(str::trim).filter(|k| !k.is_empty()).map(String::from);

    if let Some(p) = explicit {
        return usable(key_for(p))
            .map(|k| (p, k))
            .ok_or_else(|| GenerationError::MissingApiKey(p.to_string()));
    }
    [Provider::Groq, Provider::OpenAi]
        .into_iter()
        .find_map(|p| usable(key_for(p)).map(|k| (p, k)))
        .ok_or_else(|| GenerationError::MissingApiKey("Groq or OpenAI".to_string()))
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Parse a Retry-After header value (seconds or HTTP-date).
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    // Fractional seconds appear on some OpenAI-compatible gateways
    if let Ok(secs) = value.trim().parse::<f64>()
        && secs.is_finite()
        && secs >= 0.0
    {
        return Some(Duration::from_secs_f64(secs));
    }
    // HTTP-date: use a conservative fixed wait
    if value.contains(',') || value.contains("GMT") {
        return Some(Duration::from_secs(5));
    }
    None
}

/// Check if an HTTP response is a 429 and extract Retry-After if present.
pub fn check_rate_limit_response(resp: &reqwest::Response) -> Result<(), GenerationError> {
    if resp.status().as_u16() == 429 {
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        Err(GenerationError::RateLimited { retry_after })
    } else {
        Ok(())
    }
}

/// Pull the reply text out of a chat-completions body.
fn reply_text(body: &str) -> Result<String, GenerationError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|c| c.trim().to_string())
        .ok_or_else(|| GenerationError::InvalidResponse("no message content".to_string()))
}

/// HTTP client for one provider. Construct once and pass it to the tasks.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    provider: Provider,
    api_key: String,
    base_url: String,
    model: String,
    light_model: String,
    temperature: Option<f32>,
    timeout: Duration,
}

impl ChatClient {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            provider,
            api_key: api_key.into(),
            base_url: provider.base_url().to_string(),
            model: provider.default_model().to_string(),
            light_model: provider.default_light_model().to_string(),
            temperature: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_light_model(mut self, model: impl Into<String>) -> Self {
        self.light_model = model.into();
        self
    }

    /// Point at a self-hosted or proxy endpoint. A trailing slash is ignored.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use this temperature for every request instead of the task's own.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Primary => &self.model,
            ModelTier::Light => &self.light_model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let model = self.model_for(request.tier);
        let body = ChatRequest {
            model,
            messages: [ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: self.temperature.unwrap_or(request.temperature),
        };

        tracing::debug!(provider = %self.provider, model, "sending completion request");

        let resp = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Http(e.to_string()))?;

        check_rate_limit_response(&resp)?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GenerationError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        reply_text(&text)
    }
}

impl TextGenerator for ChatClient {
    fn name(&self) -> &str {
        match self.provider {
            Provider::Groq => "Groq",
            Provider::OpenAi => "OpenAI",
        }
    }

    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String, GenerationError>> + Send + 'a>> {
        Box::pin(self.send(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse_retry_after ──────────────────────────────────────────────

    #[test]
    fn parse_integer_seconds() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
    }

    #[test]
    fn parse_fractional_seconds() {
        assert_eq!(parse_retry_after("1.5"), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn parse_http_date_gmt() {
        let val = "Wed, 21 Oct 2015 07:28:00 GMT";
        assert_eq!(parse_retry_after(val), Some(Duration::from_secs(5)));
    }

    #[test]
    fn parse_garbage_none() {
        assert_eq!(parse_retry_after("xyz"), None);
    }

    // ── check_rate_limit_response ──────────────────────────────────────

    #[test]
    fn ok_on_200() {
        let http_resp = http::Response::builder().status(200).body("").unwrap();
        let resp = reqwest::Response::from(http_resp);
        assert!(check_rate_limit_response(&resp).is_ok());
    }

    #[test]
    fn rate_limited_429_with_retry_after() {
        let http_resp = http::Response::builder()
            .status(429)
            .header("retry-after", "10")
            .body("")
            .unwrap();
        let resp = reqwest::Response::from(http_resp);
        assert_eq!(
            check_rate_limit_response(&resp).unwrap_err(),
            GenerationError::RateLimited {
                retry_after: Some(Duration::from_secs(10))
            }
        );
    }

    #[test]
    fn rate_limited_429_no_header() {
        let http_resp = http::Response::builder().status(429).body("").unwrap();
        let resp = reqwest::Response::from(http_resp);
        assert_eq!(
            check_rate_limit_response(&resp).unwrap_err(),
            GenerationError::RateLimited { retry_after: None }
        );
    }

    // ── reply parsing ──────────────────────────────────────────────────

    #[test]
    fn reply_text_is_trimmed_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  English\n"}}]}"#;
        assert_eq!(reply_text(body).unwrap(), "English");
    }

    #[test]
    fn reply_without_content_is_invalid() {
        let body = r#"{"choices":[]}"#;
        assert!(matches!(
            reply_text(body),
            Err(GenerationError::InvalidResponse(_))
        ));
        assert!(matches!(
            reply_text("not json"),
            Err(GenerationError::InvalidResponse(_))
        ));
    }

    // ── provider selection ─────────────────────────────────────────────

    #[test]
    fn groq_preferred_when_both_keys_present() {
        let (p, key) = select_provider(None, Some("gsk"), Some("sk")).unwrap();
        assert_eq!(p, Provider::Groq);
        assert_eq!(key, "gsk");
    }

    #[test]
    fn falls_back_to_openai() {
        let (p, _) = select_provider(None, Some("  "), Some("sk")).unwrap();
        assert_eq!(p, Provider::OpenAi);
    }

    #[test]
    fn explicit_provider_needs_its_key() {
        let err = select_provider(Some(Provider::OpenAi), Some("gsk"), None).unwrap_err();
        assert_eq!(err, GenerationError::MissingApiKey("OpenAI".into()));
        assert!(select_provider(None, None, None).is_err());
    }

    #[test]
    fn provider_from_str() {
        assert_eq!("Groq".parse::<Provider>().unwrap(), Provider::Groq);
        assert_eq!("openai".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert!("claude".parse::<Provider>().is_err());
    }

    #[test]
    fn client_model_tiers_and_base_url() {
        let client = ChatClient::new(Provider::Groq, "k")
            .with_light_model("tiny")
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(client.model_for(ModelTier::Primary), "openai/gpt-oss-120b");
        assert_eq!(client.model_for(ModelTier::Light), "tiny");
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
    }
}
