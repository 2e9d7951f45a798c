//! Docker API wrapper using the bollard crate.
//!
//! This module provides the container operations the sandbox needs:
//! create with an isolation profile, start, bounded wait, capped log
//! capture, kill and forced removal.

use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, KillContainerOptions, LogOutput,
    LogsOptions, RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::CreateImageOptions;
use bollard::models::{HostConfig, HostConfigLogConfig};
use bollard::Docker;
use futures::StreamExt;

use crate::error::SandboxError;
use crate::execution::resources::SandboxLimits;

/// Configuration for creating a sandbox container.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Unique name for the container.
    pub name: String,
    /// Docker image to use.
    pub image: String,
    /// Command to run in the container.
    pub cmd: Vec<String>,
    /// Environment variables (`KEY=value`).
    pub env: Vec<String>,
    /// Working directory inside the container.
    pub working_dir: Option<String>,
    /// Resource limits for the container.
    pub limits: SandboxLimits,
    /// Bind mounts (`host:container[:mode]`).
    pub binds: Vec<String>,
}

impl ContainerConfig {
    /// Creates a new container configuration with the given name and image.
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            cmd: Vec::new(),
            env: Vec::new(),
            working_dir: None,
            limits: SandboxLimits::default(),
            binds: Vec::new(),
        }
    }

    /// Sets explicit resource limits.
    pub fn with_limits(mut self, limits: SandboxLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the command to run in the container.
    pub fn with_cmd(mut self, cmd: Vec<String>) -> Self {
        self.cmd = cmd;
        self
    }

    /// Sets environment variables.
    pub fn with_env(mut self, env: Vec<String>) -> Self {
        self.env = env;
        self
    }

    /// Sets the working directory.
    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Adds a read-only bind mount of `host_path` at `container_path`.
    pub fn with_readonly_bind(mut self, host_path: &str, container_path: &str) -> Self {
        self.binds.push(format!("{host_path}:{container_path}:ro"));
        self
    }

    /// Builds the host configuration enforcing the isolation profile.
    ///
    /// Networking is disabled, the root filesystem is read-only and only
    /// the tmpfs scratch mounts are writable.
    pub fn host_config(&self) -> HostConfig {
        let memory = self.limits.memory_bytes();
        HostConfig {
            memory: Some(memory),
            memory_swap: Some(memory),
            nano_cpus: Some(self.limits.nano_cpus()),
            pids_limit: Some(self.limits.max_processes as i64),
            network_mode: Some("none".to_string()),
            readonly_rootfs: Some(true),
            tmpfs: Some(self.limits.tmpfs_mounts()),
            binds: if self.binds.is_empty() {
                None
            } else {
                Some(self.binds.clone())
            },
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            log_config: Some(HostConfigLogConfig {
                typ: Some("json-file".to_string()),
                config: Some(self.limits.log_driver_options()),
            }),
            ..Default::default()
        }
    }
}

/// Marker appended to output cut at the capture limit.
pub const LOG_TRUNCATED_MARKER: &str = "...[truncated]";

/// Captured output streams of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerLogs {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

/// Accumulates log frames as raw bytes up to a combined limit.
///
/// Each stream is decoded once at the end so multi-byte characters split
/// across frames survive.
#[derive(Debug)]
pub struct LogBuffer {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    remaining: usize,
    truncated: bool,
}

impl LogBuffer {
    /// Creates a buffer holding at most `max_bytes` across both streams.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            remaining: max_bytes,
            truncated: false,
        }
    }

    /// Appends a frame. Returns false once the limit has been reached.
    pub fn push(&mut self, frame: LogOutput) -> bool {
        let (target, message) = match frame {
            LogOutput::StdOut { message } | LogOutput::Console { message } => {
                (&mut self.stdout, message)
            }
            LogOutput::StdErr { message } => (&mut self.stderr, message),
            LogOutput::StdIn { .. } => return !self.truncated,
        };

        let take = message.len().min(self.remaining);
        target.extend_from_slice(&message[..take]);
        self.remaining -= take;
        if take < message.len() {
            self.truncated = true;
        }
        !self.truncated
    }

    /// True when output was dropped at the limit.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Decodes both streams, marking stderr when output was cut.
    pub fn finish(self) -> ContainerLogs {
        let mut logs = ContainerLogs {
            stdout: String::from_utf8_lossy(&self.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&self.stderr).into_owned(),
        };
        if self.truncated {
            logs.stderr.push('\n');
            logs.stderr.push_str(LOG_TRUNCATED_MARKER);
            logs.stderr.push('\n');
        }
        logs
    }
}

/// Docker client wrapper for sandbox container operations.
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Creates a new Docker client connecting to the local Docker daemon.
    ///
    /// # Errors
    ///
    /// Returns `SandboxError::DaemonUnavailable` if the Docker daemon is not accessible.
    pub fn new() -> Result<Self, SandboxError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| SandboxError::DaemonUnavailable(format!("Failed to connect: {e}")))?;

        Ok(Self { docker })
    }

    /// Verifies that the daemon answers requests.
    pub async fn ping(&self) -> Result<(), SandboxError> {
        self.docker
            .ping()
            .await
            .map_err(|e| SandboxError::DaemonUnavailable(format!("Ping failed: {e}")))?;
        Ok(())
    }

    /// Creates a new container with the given configuration.
    ///
    /// # Returns
    ///
    /// The container ID on success.
    pub async fn create_container(&self, config: &ContainerConfig) -> Result<String, SandboxError> {
        let container_config = Config {
            image: Some(config.image.clone()),
            cmd: Some(config.cmd.clone()),
            env: if config.env.is_empty() {
                None
            } else {
                Some(config.env.clone())
            },
            working_dir: config.working_dir.clone(),
            network_disabled: Some(true),
            host_config: Some(config.host_config()),
            tty: Some(false),
            attach_stdin: Some(false),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: config.name.clone(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), container_config)
            .await
            .map_err(|e| SandboxError::LaunchFailed(format!("Failed to create container: {e}")))?;

        Ok(response.id)
    }

    /// Starts a container by ID.
    pub async fn start_container(&self, id: &str) -> Result<(), SandboxError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| SandboxError::LaunchFailed(format!("Failed to start container: {e}")))?;

        Ok(())
    }

    /// Waits for a container to stop running.
    ///
    /// # Returns
    ///
    /// The exit code of the container's main process.
    pub async fn wait_container(&self, id: &str) -> Result<i64, SandboxError> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };

        let mut stream = self.docker.wait_container(id, Some(options));

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit as an error carrying the code.
            Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(SandboxError::LaunchFailed(format!(
                "Error waiting for container: {e}"
            ))),
            None => Err(SandboxError::LaunchFailed(
                "Wait stream ended without a status".to_string(),
            )),
        }
    }

    /// Sends SIGKILL to a running container.
    pub async fn kill_container(&self, id: &str) -> Result<(), SandboxError> {
        self.docker
            .kill_container(id, None::<KillContainerOptions<String>>)
            .await
            .map_err(|e| SandboxError::LaunchFailed(format!("Failed to kill container: {e}")))?;

        Ok(())
    }

    /// Removes a container by ID, killing it first if it is still running.
    pub async fn remove_container(&self, id: &str) -> Result<(), SandboxError> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };

        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(|e| SandboxError::LaunchFailed(format!("Failed to remove container: {e}")))?;

        Ok(())
    }

    /// Gets stdout and stderr captured from a container so far, reading
    /// at most `max_bytes` of output.
    pub async fn get_logs(&self, id: &str, max_bytes: usize) -> Result<ContainerLogs, SandboxError> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: false,
            timestamps: false,
            ..Default::default()
        };

        let mut logs = self.docker.logs(id, Some(options));
        let mut buffer = LogBuffer::new(max_bytes);

        while let Some(chunk) = logs.next().await {
            let frame = chunk
                .map_err(|e| SandboxError::LaunchFailed(format!("Error reading logs: {e}")))?;
            if !buffer.push(frame) {
                tracing::debug!(container = id, max_bytes, "Container output truncated");
                break;
            }
        }

        Ok(buffer.finish())
    }

    /// Returns true when the daemon recorded an out-of-memory kill.
    pub async fn was_oom_killed(&self, id: &str) -> bool {
        match self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
        {
            Ok(info) => info
                .state
                .and_then(|state| state.oom_killed)
                .unwrap_or(false),
            Err(e) => {
                tracing::debug!(container = id, error = %e, "Failed to inspect container");
                false
            }
        }
    }

    /// Pulls a Docker image from a registry.
    ///
    /// # Arguments
    ///
    /// * `image` - Image name with optional tag (e.g., "python:3.12-slim")
    pub async fn pull_image(&self, image: &str) -> Result<(), SandboxError> {
        let options = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);

        while let Some(result) = stream.next().await {
            result.map_err(|e| SandboxError::ImageUnavailable {
                image: image.to_string(),
                reason: e.to_string(),
            })?;
        }

        Ok(())
    }

    /// Checks if an image exists locally.
    pub async fn image_exists(&self, image: &str) -> bool {
        self.docker.inspect_image(image).await.is_ok()
    }
}
