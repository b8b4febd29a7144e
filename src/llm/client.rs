//! LLM completion client
//!
//! The agent only needs one capability from a model: given a prompt, return
//! text or fail. `LlmClient` is that seam; `ChatCompletionClient` is the HTTP
//! implementation against an OpenAI-style chat-completions endpoint.

use async_trait::async_trait;
use serde::Deserialize;

/// Whether the provider reported the completion as usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    Success,
    Error,
}

/// One completion from the model.
#[derive(Debug, Clone)]
pub struct Completion {
    pub state: CompletionState,
    /// Completion text on success, provider error detail otherwise.
    pub content: String,
}

impl Completion {
    pub fn success(content: impl Into<String>) -> Self {
        Self { state: CompletionState::Success, content: content.into() }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self { state: CompletionState::Error, content: content.into() }
    }
}

/// Error type for transport-level completion failures.
#[derive(Debug)]
pub enum LlmError {
    Request(reqwest::Error),
    Parse(serde_json::Error),
    EmptyResponse,
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::Request(e) => write!(f, "Request error: {}", e),
            LlmError::Parse(e) => write!(f, "Parse error: {}", e),
            LlmError::EmptyResponse => write!(f, "Empty response from LLM endpoint"),
        }
    }
}

impl std::error::Error for LlmError {}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Request(e)
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(e: serde_json::Error) -> Self {
        LlmError::Parse(e)
    }
}

/// The single capability the agent consumes from a language model.
///
/// Transport failures surface as `Err` (retryable by the agent's inner loop);
/// provider-reported failures surface as `Ok` with `CompletionState::Error`
/// (a dependency failure, not retried).
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn async_completion(&self, prompt: &str) -> Result<Completion, LlmError>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    // Error payloads omit this field entirely
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// HTTP client for an OpenAI-style `/v1/chat/completions` endpoint.
#[derive(Clone)]
pub struct ChatCompletionClient {
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f64,
    client: reqwest::Client,
}

impl ChatCompletionClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            model: model.into(),
            temperature: 0.0,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl LlmClient for ChatCompletionClient {
    async fn async_completion(&self, prompt: &str) -> Result<Completion, LlmError> {
        let endpoint = format!("{}/v1/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
        });

        let mut request = self.client.post(&endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let text = response.text().await?;
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)?;
        if let Some(err) = parsed.error {
            return Ok(Completion::error(err.message));
        }

        match parsed.choices.first().and_then(|c| c.message.content.clone()) {
            Some(content) => Ok(Completion::success(content)),
            None => Ok(Completion::error("completion contained no choices")),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
