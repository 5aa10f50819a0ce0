//! Sandbox configuration
//!
//! Configuration for process execution, loaded from environment variables.

use std::path::PathBuf;

use anyhow::Context;

use crate::runner::{ExecutionLimits, RunLimits};

/// Sandbox configuration
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Directory under which every submission gets its own workspace
    pub temp_root: PathBuf,
    /// Compile time limit in milliseconds (default: 30000ms = 30s)
    pub compile_timeout_ms: u64,
    /// Compiler output cap in bytes (default: 10MB)
    pub compile_max_output_bytes: u64,
    /// Deadline for ad-hoc runs (default: 10000ms)
    pub execute_timeout_ms: u64,
    /// Output cap for ad-hoc runs (default: 1MB)
    pub execute_max_output_bytes: u64,
    /// Limits used by batch runs that do not supply their own
    pub default_limits: ExecutionLimits,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            temp_root: std::env::temp_dir().join("judge-core"),
            compile_timeout_ms: 30_000,
            compile_max_output_bytes: 10 * 1024 * 1024,
            execute_timeout_ms: 10_000,
            execute_max_output_bytes: 1024 * 1024,
            default_limits: ExecutionLimits::new(10_000, 256),
        }
    }
}

impl SandboxConfig {
    /// Load configuration, falling back to defaults for unset variables
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let temp_root = std::env::var("JUDGE_TEMP_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.temp_root);

        Ok(Self {
            temp_root,
            compile_timeout_ms: env_u64("JUDGE_COMPILE_TIMEOUT_MS", defaults.compile_timeout_ms)?,
            compile_max_output_bytes: env_u64(
                "JUDGE_COMPILE_MAX_OUTPUT_BYTES",
                defaults.compile_max_output_bytes,
            )?,
            execute_timeout_ms: env_u64("JUDGE_EXECUTE_TIMEOUT_MS", defaults.execute_timeout_ms)?,
            execute_max_output_bytes: env_u64(
                "JUDGE_EXECUTE_MAX_OUTPUT_BYTES",
                defaults.execute_max_output_bytes,
            )?,
            default_limits: ExecutionLimits::new(
                env_u64(
                    "JUDGE_DEFAULT_TIME_LIMIT_MS",
                    defaults.default_limits.time_limit_ms,
                )?,
                env_u64(
                    "JUDGE_DEFAULT_MEMORY_LIMIT_MB",
                    defaults.default_limits.memory_limit_mb,
                )?,
            ),
        })
    }

    pub fn compile_limits(&self) -> RunLimits {
        RunLimits::new(self.compile_timeout_ms, self.compile_max_output_bytes)
    }

    pub fn execute_limits(&self) -> RunLimits {
        RunLimits::new(self.execute_timeout_ms, self.execute_max_output_bytes)
    }

    /// Config rooted at a specific directory, for tests and embedding
    pub fn with_temp_root(temp_root: impl Into<PathBuf>) -> Self {
        Self {
            temp_root: temp_root.into(),
            ..Self::default()
        }
    }
}

fn env_u64(key: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .with_context(|| format!("Invalid value for {}: {}", key, value)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SandboxConfig::default();
        assert_eq!(config.compile_timeout_ms, 30_000);
        assert!(config.compile_timeout_ms > config.execute_timeout_ms);
        assert_eq!(config.execute_limits().max_output_bytes, 1024 * 1024);
        assert_eq!(config.default_limits, ExecutionLimits::new(10_000, 256));
    }

    #[test]
    fn test_env_u64_falls_back_when_unset() {
        assert_eq!(env_u64("JUDGE_TEST_SURELY_UNSET_KEY", 42).unwrap(), 42);
    }
}
