//! Sandboxed runner implementation
//!
//! Executes submitted programs as bounded child processes with a deadline and an output cap.

use async_trait::async_trait;
use std::sync::Arc;

use super::{CommandSpec, ExecutionResult, RunLimits, Runner};
use crate::error::JudgeResult;
use crate::sandbox::{default_monitor, spawn_limited, ResourceMonitor};

/// Runner that executes code through the process sandbox
pub struct SandboxedRunner {
    monitor: Arc<dyn ResourceMonitor>,
}

impl SandboxedRunner {
    /// Create a runner using the platform's memory monitor
    pub fn new() -> Self {
        Self::with_monitor(default_monitor())
    }

    pub fn with_monitor(monitor: Arc<dyn ResourceMonitor>) -> Self {
        Self { monitor }
    }

    pub fn monitor_name(&self) -> &'static str {
        self.monitor.name()
    }
}

impl Default for SandboxedRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Runner for SandboxedRunner {
    async fn run(
        &self,
        cmd: &CommandSpec,
        limits: &RunLimits,
        stdin: Option<&str>,
    ) -> JudgeResult<ExecutionResult> {
        spawn_limited(cmd, stdin, limits, self.monitor.as_ref()).await
    }
}
