//! Resource limits for sandboxed test execution.
//!
//! The defaults form the isolation profile every candidate runs under:
//! one CPU, 512MB of memory with no extra swap, 128 processes/threads,
//! two 32MB writable tmpfs mounts, 64KB of captured output and a 12
//! second wall clock.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default wall-clock timeout for one sandboxed execution.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 12;

/// Default cap on captured container output, stdout and stderr combined.
pub const DEFAULT_MAX_LOG_BYTES: usize = 64 * 1024;

/// Writable scratch mounts inside an otherwise read-only root filesystem.
pub const SCRATCH_MOUNTS: [&str; 2] = ["/tmp", "/var/tmp"];

/// Execution resource limits for one sandbox container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxLimits {
    /// Memory limit in megabytes. Swap is capped at the same value.
    pub memory_mb: u64,
    /// CPU cores available (e.g., 0.5, 1.0, 2.0).
    pub cpu_cores: f64,
    /// Maximum number of processes and threads.
    pub max_processes: u64,
    /// Size of each writable tmpfs scratch mount in megabytes.
    pub scratch_mb: u64,
    /// Wall-clock timeout in seconds before the container is killed.
    pub timeout_seconds: u64,
    /// Bytes of output kept by the log driver and read back per run.
    pub max_log_bytes: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            memory_mb: 512,
            cpu_cores: 1.0,
            max_processes: 128,
            scratch_mb: 32,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_log_bytes: DEFAULT_MAX_LOG_BYTES,
        }
    }
}

impl SandboxLimits {
    /// Creates new limits with the given parameters.
    pub fn new(
        memory_mb: u64,
        cpu_cores: f64,
        max_processes: u64,
        scratch_mb: u64,
        timeout_seconds: u64,
    ) -> Self {
        Self {
            memory_mb,
            cpu_cores,
            max_processes,
            scratch_mb,
            timeout_seconds,
            max_log_bytes: DEFAULT_MAX_LOG_BYTES,
        }
    }

    /// Sets the wall-clock timeout.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the output cap.
    pub fn with_max_log_bytes(mut self, bytes: usize) -> Self {
        self.max_log_bytes = bytes;
        self
    }

    /// Options for the json-file log driver. Two files of `max_log_bytes`
    /// each bound host disk use while always retaining more than a reader
    /// capped at `max_log_bytes` consumes.
    pub fn log_driver_options(&self) -> HashMap<String, String> {
        HashMap::from([
            ("max-size".to_string(), self.max_log_bytes.to_string()),
            ("max-file".to_string(), "2".to_string()),
        ])
    }

    /// Returns memory limit in bytes.
    pub fn memory_bytes(&self) -> i64 {
        (self.memory_mb * 1024 * 1024) as i64
    }

    /// Returns the CPU allowance in units of 10^-9 CPUs, as Docker's `--cpus`.
    pub fn nano_cpus(&self) -> i64 {
        (self.cpu_cores * 1_000_000_000.0) as i64
    }

    /// Returns the wall-clock timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Returns tmpfs mount specifications keyed by mount point.
    pub fn tmpfs_mounts(&self) -> HashMap<String, String> {
        SCRATCH_MOUNTS
            .iter()
            .map(|mount| {
                (
                    mount.to_string(),
                    format!("rw,noexec,nosuid,size={}m", self.scratch_mb),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = SandboxLimits::default();
        assert_eq!(limits.memory_mb, 512);
        assert_eq!(limits.cpu_cores, 1.0);
        assert_eq!(limits.max_processes, 128);
        assert_eq!(limits.scratch_mb, 32);
        assert_eq!(limits.timeout_seconds, 12);
        assert_eq!(limits.max_log_bytes, 64 * 1024);
    }

    #[test]
    fn test_log_driver_options() {
        let options = SandboxLimits::default()
            .with_max_log_bytes(4096)
            .log_driver_options();
        assert_eq!(options["max-size"], "4096");
        assert_eq!(options["max-file"], "2");
    }

    #[test]
    fn test_memory_bytes_conversion() {
        let limits = SandboxLimits::default();
        assert_eq!(limits.memory_bytes(), 512 * 1024 * 1024);
    }

    #[test]
    fn test_nano_cpus() {
        let limits = SandboxLimits::new(256, 0.5, 64, 16, 5);
        assert_eq!(limits.nano_cpus(), 500_000_000);
        assert_eq!(SandboxLimits::default().nano_cpus(), 1_000_000_000);
    }

    #[test]
    fn test_tmpfs_mounts() {
        let mounts = SandboxLimits::default().tmpfs_mounts();
        assert_eq!(mounts.len(), 2);
        assert_eq!(mounts["/tmp"], "rw,noexec,nosuid,size=32m");
        assert_eq!(mounts["/var/tmp"], "rw,noexec,nosuid,size=32m");
    }

    #[test]
    fn test_with_timeout() {
        let limits = SandboxLimits::default().with_timeout(30);
        assert_eq!(limits.timeout(), Duration::from_secs(30));
    }
}
