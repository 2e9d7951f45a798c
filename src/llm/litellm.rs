//! OpenAI-compatible chat client.
//!
//! Talks to any `/chat/completions` endpoint: a local Ollama server, a
//! LiteLLM proxy or a hosted gateway. The repair agent only sees the
//! [`LlmProvider`] trait.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use super::retry::with_retry;
use crate::error::LlmError;

/// Default API base, a local Ollama server's OpenAI-compatible endpoint.
pub const DEFAULT_API_BASE: &str = "http://localhost:11434/v1";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "qwen3:0.6b";

/// Request timeout in seconds.
pub(crate) const REQUEST_TIMEOUT_SECS: u64 = 300;

/// A message in a conversation with an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (e.g., "system", "user", "assistant").
    pub role: String,
    /// Content of the message.
    pub content: String,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Request for text generation from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier to use for generation.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Sampling temperature (0.0 - 2.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Create a new generation request with default parameters.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Set the temperature for this request.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the max tokens for this request.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Response from an LLM generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Unique identifier for this response.
    pub id: String,
    /// Model that generated this response.
    pub model: String,
    /// Generated choices/completions.
    pub choices: Vec<Choice>,
    /// Token usage statistics.
    pub usage: Usage,
}

impl GenerationResponse {
    /// Get the content of the first choice, if available.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// A single generated choice from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index of this choice in the response.
    pub index: u32,
    /// Generated message.
    pub message: Message,
    /// Reason the generation stopped (e.g., "stop", "length").
    pub finish_reason: String,
}

/// Token usage statistics for a generation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt.
    pub prompt_tokens: u32,
    /// Number of tokens generated.
    pub completion_tokens: u32,
    /// Total tokens used.
    pub total_tokens: u32,
}

/// Trait for LLM providers that can generate text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a response for the given request.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;
}

/// Builds the shared HTTP client used by the providers.
pub(crate) fn build_http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            Client::new()
        })
}

/// Client for OpenAI-compatible chat APIs.
pub struct LiteLlmClient {
    /// Base URL for the API.
    api_base: String,
    /// Optional API key for authentication.
    api_key: Option<String>,
    /// Default model to use for requests.
    default_model: String,
    /// HTTP client for making API requests.
    http_client: Client,
}

impl std::fmt::Debug for LiteLlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiteLlmClient")
            .field("api_base", &self.api_base)
            .field("default_model", &self.default_model)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl LiteLlmClient {
    /// Create a new client with explicit configuration.
    ///
    /// # Arguments
    ///
    /// * `api_base` - Base URL for the API (e.g., "http://localhost:11434/v1")
    /// * `api_key` - Optional API key for authentication
    /// * `default_model` - Default model to use when none is specified
    pub fn new(api_base: String, api_key: Option<String>, default_model: String) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            http_client: build_http_client(),
        }
    }

    /// Create a client for a local Ollama server with the default model.
    pub fn local() -> Self {
        Self::new(DEFAULT_API_BASE.to_string(), None, DEFAULT_MODEL.to_string())
    }

    /// Create a new client from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `LLM_API_BASE`: Base URL for the API (required)
    /// - `LLM_API_KEY`: API key for authentication (optional)
    /// - `LLM_MODEL`: Default model (defaults to `qwen3:0.6b`)
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingApiBase` if `LLM_API_BASE` is not set.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_base = env::var("LLM_API_BASE").map_err(|_| LlmError::MissingApiBase)?;
        let api_key = env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty());
        let default_model = env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self::new(api_base, api_key, default_model))
    }

    /// Get the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Get the default model.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Check if an API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl LlmProvider for LiteLlmClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        let api_request = ApiRequest {
            model,
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let url = format!("{}/chat/completions", self.api_base);
        let headers = ExtraHeaders::default();

        with_retry("litellm", || {
            post_chat_completion(
                &self.http_client,
                &url,
                self.api_key.as_deref(),
                &headers,
                &api_request,
            )
        })
        .await
    }
}

/// Extra attribution headers some gateways expect.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExtraHeaders {
    pub referer: Option<&'static str>,
    pub title: Option<&'static str>,
}

/// Request body for the OpenAI-compatible API.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ApiRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Response body from the OpenAI-compatible API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    index: u32,
    message: ApiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default = "assistant_role")]
    role: String,
    // Some servers send `null` content for reasoning-only turns.
    content: Option<String>,
}

fn assistant_role() -> String {
    "assistant".to_string()
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Sends a single chat completion request (no retry logic).
pub(crate) async fn post_chat_completion(
    http_client: &Client,
    url: &str,
    api_key: Option<&str>,
    headers: &ExtraHeaders,
    request: &ApiRequest,
) -> Result<GenerationResponse, LlmError> {
    let mut http_request = http_client
        .post(url)
        .header("Content-Type", "application/json");

    if let Some(api_key) = api_key {
        http_request = http_request.header("Authorization", format!("Bearer {}", api_key));
    }
    if let Some(referer) = headers.referer {
        http_request = http_request.header("HTTP-Referer", referer);
    }
    if let Some(title) = headers.title {
        http_request = http_request.header("X-Title", title);
    }

    let http_response = http_request
        .json(request)
        .send()
        .await
        .map_err(request_error)?;

    let status = http_response.status();

    if !status.is_success() {
        let status_code = status.as_u16();
        let error_text = http_response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());

        let message = serde_json::from_str::<ApiErrorResponse>(&error_text)
            .map(|r| r.error.message)
            .unwrap_or(error_text);

        if status_code == 429 {
            return Err(LlmError::RateLimited(message));
        }
        return Err(LlmError::ApiError {
            code: status_code,
            message,
        });
    }

    let body = http_response.text().await.map_err(request_error)?;

    parse_api_response(&body)
}

/// Maps a transport failure to an [`LlmError`].
///
/// Connect and timeout failures become `Network` so the retry policy picks
/// them up. The message carries the full source chain since reqwest's
/// `Display` only names the URL.
fn request_error(error: reqwest::Error) -> LlmError {
    use std::error::Error as _;

    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    if error.is_connect() || error.is_timeout() {
        LlmError::Network(message)
    } else {
        LlmError::RequestFailed(message)
    }
}

/// Converts a raw response body into a [`GenerationResponse`].
fn parse_api_response(body: &str) -> Result<GenerationResponse, LlmError> {
    let api_response: ApiResponse = serde_json::from_str(body)
        .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;

    let choices = api_response
        .choices
        .into_iter()
        .map(|choice| Choice {
            index: choice.index,
            message: Message {
                role: choice.message.role,
                content: choice.message.content.unwrap_or_default(),
            },
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
        })
        .collect();

    let usage = api_response.usage.unwrap_or_default();

    Ok(GenerationResponse {
        id: api_response.id,
        model: api_response.model,
        choices,
        usage: Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        },
    })
}
