//! Runner module - Execution abstraction layer
//!
//! This module provides a unified interface for running programs:
//! - `SandboxedRunner`: spawns the program through the process sandbox
//!
//! The runner module does NOT:
//! - Compare outputs or determine verdicts
//! - Compile sources
//! - Know about sample/hidden test sets

pub mod sandboxed;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{JudgeError, JudgeResult};

const MIB: u64 = 1024 * 1024;

/// Command specification for execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program path or name
    pub program: String,
    /// Arguments to the program
    pub args: Vec<String>,
    /// Working directory
    pub work_dir: PathBuf,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, work_dir: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: work_dir.as_ref().to_path_buf(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(|a| a.into()).collect();
        self
    }

    /// Create from a command vector (first element is program, rest are args)
    pub fn from_vec(cmd: &[String], work_dir: impl AsRef<Path>) -> Option<Self> {
        let (program, args) = cmd.split_first()?;
        Some(Self::new(program.clone(), work_dir).with_args(args.iter().cloned()))
    }

    /// Convert to a vector of strings (program + args)
    pub fn to_vec(&self) -> Vec<String> {
        let mut v = vec![self.program.clone()];
        v.extend(self.args.iter().cloned());
        v
    }
}

/// Time/memory ceiling applied to every run of a problem's submissions.
///
/// Both values are positive; deserializing a zero is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawLimits")]
pub struct ExecutionLimits {
    pub time_limit_ms: u64,
    pub memory_limit_mb: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLimits {
    time_limit_ms: u64,
    memory_limit_mb: u64,
}

impl ExecutionLimits {
    pub fn new(time_limit_ms: u64, memory_limit_mb: u64) -> Self {
        Self {
            time_limit_ms: time_limit_ms.max(1),
            memory_limit_mb: memory_limit_mb.max(1),
        }
    }

    /// Limits taken from a request, rejecting zeros instead of clamping them
    pub fn checked(time_limit_ms: u64, memory_limit_mb: u64) -> JudgeResult<Self> {
        if time_limit_ms == 0 || memory_limit_mb == 0 {
            return Err(JudgeError::BadRequest(
                "timeLimitMs and memoryLimitMb must be positive".to_string(),
            ));
        }
        Ok(Self {
            time_limit_ms,
            memory_limit_mb,
        })
    }
}

impl TryFrom<RawLimits> for ExecutionLimits {
    type Error = JudgeError;

    fn try_from(raw: RawLimits) -> Result<Self, Self::Error> {
        Self::checked(raw.time_limit_ms, raw.memory_limit_mb)
    }
}

/// Limits enforced on a single process spawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    /// Wall-clock deadline in milliseconds
    pub timeout_ms: u64,
    /// Cap on combined stdout + stderr bytes
    pub max_output_bytes: u64,
}

impl RunLimits {
    pub fn new(timeout_ms: u64, max_output_bytes: u64) -> Self {
        Self {
            timeout_ms,
            max_output_bytes,
        }
    }

    /// Output volume stands in for memory: the cap is the memory limit in bytes
    pub fn from_execution_limits(limits: &ExecutionLimits) -> Self {
        Self {
            timeout_ms: limits.time_limit_ms,
            max_output_bytes: limits.memory_limit_mb.saturating_mul(MIB),
        }
    }

    pub fn max_output_mb(&self) -> u64 {
        (self.max_output_bytes / MIB).max(1)
    }
}

/// Process-level classification of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    RuntimeError,
}

/// How the memory figure of a run was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    /// Peak sampled from the live process
    Sampled,
    /// High-water mark over every child the judge has reaped
    ChildRusage,
    /// The judge's own peak usage; not a measurement of the submission
    Degraded,
}

/// Outcome of running a program once
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// Exit code, if the process exited on its own
    pub exit_code: Option<i32>,
    /// Terminating signal, if the process was killed
    pub exit_signal: Option<i32>,
    /// Wall-clock time in milliseconds
    pub execution_time_ms: u64,
    /// Peak memory in KB
    pub memory_kb: u64,
    pub memory_source: MemorySource,
    pub outcome: Outcome,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Turn a failed run into the matching error, keeping `self` intact for its metrics
    pub fn check(&self, limits: &RunLimits) -> JudgeResult<()> {
        match self.outcome {
            Outcome::Success => Ok(()),
            Outcome::TimeLimitExceeded => Err(JudgeError::Timeout {
                limit_ms: limits.timeout_ms,
            }),
            Outcome::MemoryLimitExceeded => Err(JudgeError::OutputOverflow {
                limit_mb: limits.max_output_mb(),
            }),
            Outcome::RuntimeError => Err(JudgeError::ProcessFailure {
                message: self.failure_message(),
            }),
        }
    }

    fn failure_message(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        match (self.exit_code, self.exit_signal) {
            (_, Some(sig)) => format!("Process killed by signal {}", sig),
            (Some(code), None) => format!("Process exited with code {}", code),
            (None, None) => "Process terminated abnormally".to_string(),
        }
    }
}

/// Runner trait for executing programs
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run a command with the given limits and optional stdin
    async fn run(
        &self,
        cmd: &CommandSpec,
        limits: &RunLimits,
        stdin: Option<&str>,
    ) -> JudgeResult<ExecutionResult>;
}

// Re-exports
pub use sandboxed::SandboxedRunner;
