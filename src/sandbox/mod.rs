//! Sandbox module - Bounded process execution
//!
//! This module provides the low-level execution layer. It handles:
//! - Per-submission workspaces under the temp root
//! - Spawning commands with a deadline and an output cap
//! - Killing the whole process group when a limit is hit
//! - Peak memory measurement
//!
//! The sandbox module does NOT:
//! - Interpret verdicts (that's the judge's job)
//! - Know about languages or compilation
//! - Compare outputs

pub mod config;
pub mod monitor;
pub mod process;
pub mod workspace;

// Re-exports for convenience
pub use config::SandboxConfig;
pub use monitor::{default_monitor, ProcfsMonitor, ResourceMonitor, RusageMonitor};
pub use process::spawn_limited;
pub use workspace::Workspace;
