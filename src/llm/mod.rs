//! LLM integration.
//!
//! Providers implement [`LlmProvider`]; the repair agent is written
//! against the trait so tests can swap in a scripted model.
//!
//! ```ignore
//! use fix_forge::llm::{GenerationRequest, LiteLlmClient, LlmProvider, Message};
//!
//! let client = LiteLlmClient::local();
//! let request = GenerationRequest::new("qwen3:0.6b", vec![Message::user("Hello")])
//!     .with_temperature(0.2);
//! let response = client.generate(request).await?;
//! ```

pub mod litellm;
pub mod providers;
pub mod retry;

pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, LiteLlmClient, LlmProvider, Message, Usage,
    DEFAULT_API_BASE, DEFAULT_MODEL,
};
pub use providers::OpenRouterProvider;
pub use retry::{is_transient_error, MAX_RETRIES};
