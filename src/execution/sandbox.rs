//! Sandboxed execution of assembled programs against test scripts.
//!
//! Every call gets a fresh workspace and a fresh container. The container
//! runs with networking disabled, a read-only root filesystem, capped
//! memory/CPU/process counts and a wall-clock timeout. Workspace and
//! container are torn down before the call returns, on every exit path.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SandboxError;
use crate::execution::docker_client::{ContainerConfig, ContainerLogs, DockerClient};
use crate::execution::resources::SandboxLimits;
use crate::execution::runner::{runner_command, SandboxWorkspace, WORKDIR};
use crate::execution::transcript::{Transcript, ERROR_MARKER};
use crate::metrics;

/// Default sandbox image.
pub const DEFAULT_IMAGE: &str = "python:3.12-slim";

/// Default hash seed exported to the interpreter for reproducible iteration order.
pub const DEFAULT_HASH_SEED: &str = "0";

/// Configuration for the sandbox executor.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Docker image providing the language runtime.
    pub image: String,
    /// Interpreter executable inside the image.
    pub python: String,
    /// Resource limits applied to every container.
    pub limits: SandboxLimits,
    /// Value of `PYTHONHASHSEED` passed to each run.
    pub hash_seed: String,
    /// Additional `KEY=value` environment entries for each run.
    pub extra_env: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            python: "python".to_string(),
            limits: SandboxLimits::default(),
            hash_seed: DEFAULT_HASH_SEED.to_string(),
            extra_env: Vec::new(),
        }
    }
}

impl SandboxConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sandbox image.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Set the resource limits.
    pub fn with_limits(mut self, limits: SandboxLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the default wall-clock timeout.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.limits.timeout_seconds = seconds;
        self
    }

    /// Set the hash seed.
    pub fn with_hash_seed(mut self, seed: impl Into<String>) -> Self {
        self.hash_seed = seed.into();
        self
    }

    /// Add an environment entry (`KEY=value`).
    pub fn with_env(mut self, entry: impl Into<String>) -> Self {
        self.extra_env.push(entry.into());
        self
    }

    /// Environment for a single run. Built per call; the host process
    /// environment is neither read nor modified.
    pub fn run_env(&self) -> Vec<String> {
        let mut env = vec![
            format!("PYTHONHASHSEED={}", self.hash_seed),
            "PYTHONDONTWRITEBYTECODE=1".to_string(),
        ];
        env.extend(self.extra_env.iter().cloned());
        env
    }
}

/// Executes a program together with a test script and returns the transcript.
///
/// Candidate failures (assertions, exceptions, timeouts) are transcript
/// data. An `Err` means the sandbox itself could not run and is fatal.
#[async_trait]
pub trait SandboxExecutor: Send + Sync {
    /// Runs `program` against `test_script` within `timeout_seconds`.
    async fn execute(
        &self,
        program: &str,
        test_script: &str,
        timeout_seconds: u64,
    ) -> Result<Transcript, SandboxError>;

    /// Default timeout for callers that have no per-call override.
    fn default_timeout(&self) -> u64 {
        SandboxLimits::default().timeout_seconds
    }
}

/// Docker-backed sandbox.
pub struct DockerSandbox {
    client: Arc<DockerClient>,
    config: SandboxConfig,
}

impl std::fmt::Debug for DockerSandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerSandbox")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DockerSandbox {
    /// Creates a sandbox from an existing Docker client.
    pub fn new(client: Arc<DockerClient>, config: SandboxConfig) -> Self {
        Self { client, config }
    }

    /// Connects to the local daemon and makes sure the image is present.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError` if the daemon is unreachable or the image
    /// cannot be pulled. Both indicate a misconfigured environment.
    pub async fn connect(config: SandboxConfig) -> Result<Self, SandboxError> {
        let client = DockerClient::new()?;
        client.ping().await?;

        if !client.image_exists(&config.image).await {
            info!(image = %config.image, "Pulling sandbox image");
            client.pull_image(&config.image).await?;
        }

        Ok(Self::new(Arc::new(client), config))
    }

    /// Returns the sandbox configuration.
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    fn container_config(&self, workspace: &SandboxWorkspace, timeout_seconds: u64) -> ContainerConfig {
        let name = format!("fix-forge-sbx-{}", Uuid::new_v4().simple());
        ContainerConfig::new(name, self.config.image.clone())
            .with_limits(self.config.limits.clone().with_timeout(timeout_seconds))
            .with_cmd(runner_command(&self.config.python))
            .with_env(self.config.run_env())
            .with_working_dir(WORKDIR)
            .with_readonly_bind(&workspace.host_path(), WORKDIR)
    }

    /// Starts the container and waits for it within the timeout.
    async fn run_container(
        &self,
        id: &str,
        timeout_seconds: u64,
        started: Instant,
    ) -> Result<Transcript, SandboxError> {
        self.client.start_container(id).await?;
        let max_log_bytes = self.config.limits.max_log_bytes;

        let limit = std::time::Duration::from_secs(timeout_seconds);
        match tokio::time::timeout(limit, self.client.wait_container(id)).await {
            Ok(Ok(exit_code)) => {
                let mut logs = self.client.get_logs(id, max_log_bytes).await?;
                if self.client.was_oom_killed(id).await {
                    logs.stderr.push_str(&format!(
                        "\n{ERROR_MARKER} sandbox killed: out of memory ({} MB limit)\n",
                        self.config.limits.memory_mb
                    ));
                }
                let duration_ms = started.elapsed().as_millis() as u64;
                Ok(Transcript::completed(
                    &logs.stdout,
                    &logs.stderr,
                    exit_code,
                    duration_ms,
                ))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                debug!(container = id, timeout_seconds, "Sandbox run timed out, killing container");
                if let Err(e) = self.client.kill_container(id).await {
                    debug!(container = id, error = %e, "Kill after timeout failed (may have exited)");
                }
                let logs = self.client.get_logs(id, max_log_bytes).await.unwrap_or_else(|e| {
                    debug!(container = id, error = %e, "No partial output after timeout");
                    ContainerLogs::default()
                });
                let duration_ms = started.elapsed().as_millis() as u64;
                Ok(Transcript::timed_out(
                    timeout_seconds,
                    &logs.stdout,
                    &logs.stderr,
                    duration_ms,
                ))
            }
        }
    }
}

#[async_trait]
impl SandboxExecutor for DockerSandbox {
    async fn execute(
        &self,
        program: &str,
        test_script: &str,
        timeout_seconds: u64,
    ) -> Result<Transcript, SandboxError> {
        let started = Instant::now();
        let workspace = SandboxWorkspace::materialize(program, test_script)?;
        let config = self.container_config(&workspace, timeout_seconds);

        let id = self.client.create_container(&config).await?;
        debug!(container = %config.name, workspace = %workspace.path().display(), "Sandbox container created");

        let result = self.run_container(&id, timeout_seconds, started).await;

        if let Err(e) = self.client.remove_container(&id).await {
            warn!(container = %config.name, error = %e, "Failed to remove sandbox container");
        }
        drop(workspace);

        if let Ok(transcript) = &result {
            metrics::record_sandbox_run(transcript);
            debug!(
                container = %config.name,
                verdict = %transcript.verdict(),
                exit_code = ?transcript.exit_code,
                duration_ms = transcript.duration_ms,
                "Sandbox run finished"
            );
        }
        result
    }

    fn default_timeout(&self) -> u64 {
        self.config.limits.timeout_seconds
    }
}
