//! Peak memory measurement
//!
//! A `ResourceMonitor` samples a live process and settles on a final figure once the process
//! has been reaped. When no live sample exists the figure comes from `getrusage`, and the
//! last resort (the judge's own usage) is reported as `MemorySource::Degraded`.

use std::sync::Arc;

use nix::sys::resource::{getrusage, UsageWho};
use tracing::warn;

use crate::runner::MemorySource;

pub trait ResourceMonitor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Current peak memory of a running process in KB, if the platform exposes it
    fn sample_kb(&self, pid: u32) -> Option<u64>;

    /// Final reading for a run, given the largest live sample
    fn settle(&self, sampled_kb: Option<u64>) -> (u64, MemorySource) {
        if let Some(kb) = sampled_kb {
            return (kb, MemorySource::Sampled);
        }
        if let Some(kb) = max_rss_kb(UsageWho::RUSAGE_CHILDREN) {
            return (kb, MemorySource::ChildRusage);
        }
        let kb = max_rss_kb(UsageWho::RUSAGE_SELF).unwrap_or(0);
        warn!(
            "{}: no measurement for the child process, reporting judge usage ({} KB)",
            self.name(),
            kb
        );
        (kb, MemorySource::Degraded)
    }
}

/// Reads `VmHWM` (falling back to `VmPeak`) from `/proc/<pid>/status`
pub struct ProcfsMonitor;

impl ResourceMonitor for ProcfsMonitor {
    fn name(&self) -> &'static str {
        "procfs"
    }

    fn sample_kb(&self, pid: u32) -> Option<u64> {
        let status = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
        status_field_kb(&status, "VmHWM").or_else(|| status_field_kb(&status, "VmPeak"))
    }
}

/// POSIX fallback: only the post-exit `getrusage` figure
pub struct RusageMonitor;

impl ResourceMonitor for RusageMonitor {
    fn name(&self) -> &'static str {
        "rusage"
    }

    fn sample_kb(&self, _pid: u32) -> Option<u64> {
        None
    }
}

/// Monitor for the current platform
pub fn default_monitor() -> Arc<dyn ResourceMonitor> {
    if cfg!(target_os = "linux") {
        Arc::new(ProcfsMonitor)
    } else {
        Arc::new(RusageMonitor)
    }
}

fn status_field_kb(status: &str, key: &str) -> Option<u64> {
    status.lines().find_map(|line| {
        let value = line.strip_prefix(key)?.strip_prefix(':')?;
        value.split_whitespace().next()?.parse().ok()
    })
}

fn max_rss_kb(who: UsageWho) -> Option<u64> {
    let max_rss = getrusage(who).ok()?.max_rss();
    if max_rss <= 0 {
        return None;
    }
    // macOS reports bytes, Linux kilobytes
    if cfg!(target_os = "macos") {
        Some(max_rss as u64 / 1024)
    } else {
        Some(max_rss as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "Name:\tcat\nVmPeak:\t    8200 kB\nVmSize:\t    8100 kB\nVmHWM:\t    1024 kB\nVmRSS:\t    1000 kB\n";

    #[test]
    fn test_status_field_parsing() {
        assert_eq!(status_field_kb(STATUS, "VmHWM"), Some(1024));
        assert_eq!(status_field_kb(STATUS, "VmPeak"), Some(8200));
        assert_eq!(status_field_kb(STATUS, "VmSwap"), None);
    }

    #[test]
    fn test_settle_prefers_sample() {
        assert_eq!(
            RusageMonitor.settle(Some(2048)),
            (2048, MemorySource::Sampled)
        );
    }

    #[test]
    fn test_settle_without_sample_is_not_sampled() {
        let (_, source) = RusageMonitor.settle(None);
        assert_ne!(source, MemorySource::Sampled);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_procfs_samples_own_process() {
        let kb = ProcfsMonitor.sample_kb(std::process::id());
        assert!(kb.unwrap() > 0);
    }
}
