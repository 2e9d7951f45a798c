//! Model-facing side of the repair loop.
//!
//! Every step is a fresh two-message conversation: the fixed system
//! instruction and one user message. No conversation state carries over
//! between steps or tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::error::LlmError;
use crate::llm::{GenerationRequest, LlmProvider, Message};
use crate::metrics;

use super::prompts::{build_user_message, SYSTEM_RULES};

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

/// Requests candidate repairs from an LLM provider.
pub struct RepairAgent {
    llm: Arc<dyn LlmProvider>,
    model: String,
    temperature: f64,
    max_tokens: Option<u32>,
}

impl std::fmt::Debug for RepairAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepairAgent")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl RepairAgent {
    /// Creates an agent for `model` backed by `llm`.
    pub fn new(llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Model identifier sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The conversation sent for one step.
    pub fn conversation(
        &self,
        step: u32,
        prompt: &str,
        baseline_program: &str,
        last_log: &str,
    ) -> Vec<Message> {
        vec![
            Message::system(SYSTEM_RULES),
            Message::user(build_user_message(step, prompt, baseline_program, last_log)),
        ]
    }

    /// Asks the model for a repair and returns the raw response text.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::EmptyResponse` when the response has no choices,
    /// and propagates provider failures.
    pub async fn propose(
        &self,
        step: u32,
        prompt: &str,
        baseline_program: &str,
        last_log: &str,
    ) -> Result<String, LlmError> {
        let mut request = GenerationRequest::new(
            self.model.clone(),
            self.conversation(step, prompt, baseline_program, last_log),
        )
        .with_temperature(self.temperature);
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let started = Instant::now();
        let result = self.llm.generate(request).await;
        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_llm_request(&self.model, result.is_ok(), elapsed);

        let response = result?;
        tracing::debug!(
            model = %self.model,
            step,
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            latency_secs = elapsed,
            "Model response received"
        );

        response
            .first_content()
            .map(str::to_string)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Choice, GenerationResponse, Usage};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingProvider {
        requests: Mutex<Vec<GenerationRequest>>,
        reply: Option<String>,
    }

    #[async_trait]
    impl LlmProvider for RecordingProvider {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            self.requests.lock().expect("lock poisoned").push(request);
            let choices = self
                .reply
                .iter()
                .map(|content| Choice {
                    index: 0,
                    message: Message::assistant(content.clone()),
                    finish_reason: "stop".to_string(),
                })
                .collect();
            Ok(GenerationResponse {
                id: "test-id".to_string(),
                model: "test-model".to_string(),
                choices,
                usage: Usage::default(),
            })
        }
    }

    #[tokio::test]
    async fn test_propose_sends_fresh_two_message_conversation() {
        let provider = Arc::new(RecordingProvider {
            requests: Mutex::new(Vec::new()),
            reply: Some("<<<PYBODY>>>\nreturn 1\n<<<END>>>".to_string()),
        });
        let agent = RepairAgent::new(provider.clone(), "qwen3:0.6b").with_max_tokens(512);

        let text = agent
            .propose(1, "prompt", "def f():\n    return 0", "ASSERTION: ")
            .await
            .expect("propose should succeed");
        assert!(text.contains("return 1"));

        agent.propose(2, "prompt", "p", "log").await.unwrap();

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        for request in requests.iter() {
            assert_eq!(request.model, "qwen3:0.6b");
            assert_eq!(request.messages.len(), 2);
            assert_eq!(request.messages[0], Message::system(SYSTEM_RULES));
            assert_eq!(request.messages[1].role, "user");
            assert_eq!(request.temperature, Some(DEFAULT_TEMPERATURE));
            assert_eq!(request.max_tokens, Some(512));
        }
        assert!(requests[1].messages[1].content.starts_with("Attempt: 2\n"));
    }

    #[tokio::test]
    async fn test_propose_without_choices_is_empty_response() {
        let provider = Arc::new(RecordingProvider {
            requests: Mutex::new(Vec::new()),
            reply: None,
        });
        let agent = RepairAgent::new(provider, "m");

        let err = agent.propose(1, "", "", "").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
    }
}
