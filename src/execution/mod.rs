//! Sandboxed execution layer.
//!
//! Runs an assembled program against a task's test script inside a Docker
//! container managed through the bollard crate, and classifies the
//! resulting transcript.
//!
//! # Architecture
//!
//! Each execution follows this lifecycle:
//! ```text
//! WORKSPACE → CREATE → START → WAIT (bounded) → LOGS → REMOVE → WORKSPACE DROPPED
//!                                   └── timeout → KILL → partial LOGS ──┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use fix_forge::execution::{DockerSandbox, SandboxConfig, SandboxExecutor};
//!
//! let sandbox = DockerSandbox::connect(SandboxConfig::default()).await?;
//! let transcript = sandbox
//!     .execute("def add(a, b):\n    return a + b\n", "assert add(2, 3) == 5", 12)
//!     .await?;
//! assert!(transcript.passed());
//! ```

pub mod docker_client;
pub mod resources;
pub mod runner;
pub mod sandbox;
pub mod transcript;

pub use docker_client::{ContainerConfig, ContainerLogs, DockerClient, LogBuffer, LOG_TRUNCATED_MARKER};
pub use resources::{SandboxLimits, DEFAULT_MAX_LOG_BYTES, DEFAULT_TIMEOUT_SECONDS};
pub use runner::{SandboxWorkspace, RUNNER_SCRIPT};
pub use sandbox::{DockerSandbox, SandboxConfig, SandboxExecutor, DEFAULT_IMAGE};
pub use transcript::{Transcript, Verdict, EMPTY_BODY};
