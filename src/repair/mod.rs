//! Repair loop orchestration.
//!
//! For each task: execute the buggy baseline, then ask the model for a
//! repaired body up to `max_steps` times, feeding back the previous
//! transcript each time, until a candidate passes or the budget runs out.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fix_forge::execution::{DockerSandbox, SandboxConfig};
//! use fix_forge::llm::LiteLlmClient;
//! use fix_forge::repair::{RepairAgent, RepairConfig, RepairLoop};
//!
//! let sandbox = Arc::new(DockerSandbox::connect(SandboxConfig::default()).await?);
//! let agent = RepairAgent::new(Arc::new(LiteLlmClient::local()), "qwen3:0.6b");
//! let repair = RepairLoop::new(agent, sandbox, RepairConfig::default())?;
//! let results = repair.run_all(&tasks).await?;
//! println!("{:?}", results.summary());
//! ```

pub mod agent;
pub mod error;
pub mod prompts;
pub mod repair_loop;
pub mod result;

pub use agent::{RepairAgent, DEFAULT_TEMPERATURE};
pub use error::{RepairError, RepairResult};
pub use prompts::{build_user_message, SYSTEM_RULES};
pub use repair_loop::{RepairConfig, RepairLoop, RepairState, DEFAULT_MAX_STEPS};
pub use result::{AttemptResult, RunResults, RunSummary};
