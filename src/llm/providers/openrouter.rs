//! OpenRouter provider.
//!
//! OpenRouter exposes many hosted models behind one OpenAI-compatible
//! endpoint. Selected when an API key is supplied on the command line.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::LlmError;
use crate::llm::litellm::{build_http_client, post_chat_completion, ApiRequest, ExtraHeaders};
use crate::llm::retry::with_retry;
use crate::llm::{GenerationRequest, GenerationResponse, LlmProvider};

/// Default OpenRouter API endpoint.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model to use if none specified.
const DEFAULT_MODEL: &str = "qwen/qwen3-8b";

const ATTRIBUTION: ExtraHeaders = ExtraHeaders {
    referer: Some("https://fix-forge.local"),
    title: Some("fix-forge"),
};

/// OpenRouter provider for LLM requests.
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
}

impl std::fmt::Debug for OpenRouterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterProvider")
            .field("api_key", &self.api_key_masked())
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

impl OpenRouterProvider {
    /// Create a new OpenRouter provider with the given API key.
    pub fn new(api_key: String) -> Self {
        Self::with_custom_url(api_key, OPENROUTER_BASE_URL.to_string(), DEFAULT_MODEL.to_string())
    }

    /// Create a new OpenRouter provider with a specific default model.
    pub fn with_model(api_key: String, model: String) -> Self {
        Self::with_custom_url(api_key, OPENROUTER_BASE_URL.to_string(), model)
    }

    /// Create a new OpenRouter provider with custom base URL.
    ///
    /// Useful for testing or using OpenRouter-compatible proxies.
    pub fn with_custom_url(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: build_http_client(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_model: model,
        }
    }

    /// Get the API key (for debugging, returns masked value).
    pub fn api_key_masked(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() <= 8 {
            "*".repeat(chars.len())
        } else {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{head}...{tail}")
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the default model.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
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

        let url = format!("{}/chat/completions", self.base_url);

        with_retry("openrouter", || {
            post_chat_completion(
                &self.client,
                &url,
                Some(&self.api_key),
                &ATTRIBUTION,
                &api_request,
            )
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;

    #[test]
    fn test_openrouter_provider_new() {
        let provider = OpenRouterProvider::new("test-api-key".to_string());

        assert_eq!(provider.base_url(), OPENROUTER_BASE_URL);
        assert_eq!(provider.default_model(), DEFAULT_MODEL);
        assert_eq!(provider.api_key_masked(), "test...-key");
    }

    #[test]
    fn test_openrouter_provider_with_model() {
        let provider =
            OpenRouterProvider::with_model("test-key".to_string(), "qwen/qwen3-32b".to_string());
        assert_eq!(provider.default_model(), "qwen/qwen3-32b");
    }

    #[test]
    fn test_api_key_masked_short() {
        let provider = OpenRouterProvider::new("abc".to_string());
        assert_eq!(provider.api_key_masked(), "***");
    }

    #[test]
    fn test_debug_masks_key() {
        let provider = OpenRouterProvider::new("sk-1234567890abcdef".to_string());
        let debug = format!("{:?}", provider);
        assert!(debug.contains("sk-1...cdef"));
        assert!(!debug.contains("1234567890"));
    }

    #[tokio::test]
    async fn test_generate_connection_error() {
        let provider = OpenRouterProvider::with_custom_url(
            "test-key".to_string(),
            "http://127.0.0.1:1".to_string(),
            "test-model".to_string(),
        );

        let request = GenerationRequest::new("test-model", vec![Message::user("test")]);
        let result = provider.generate(request).await;

        assert!(matches!(result, Err(LlmError::Network(_))));
    }
}
