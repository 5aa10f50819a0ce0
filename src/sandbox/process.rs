//! Bounded process execution
//!
//! Spawns one command as the leader of a fresh process group and races its exit against the
//! wall-clock deadline and the output budget. Whichever fires first decides the outcome; on
//! a deadline or an exhausted budget the whole group is killed so nothing outlives the run.

use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::Notify;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

use super::monitor::ResourceMonitor;
use crate::error::JudgeResult;
use crate::runner::{CommandSpec, ExecutionResult, Outcome, RunLimits};

const SAMPLE_INTERVAL: Duration = Duration::from_millis(5);
/// How long past the deadline the pipes may take to drain
const DRAIN_GRACE: Duration = Duration::from_millis(100);
const READ_CHUNK: usize = 8192;

/// Combined stdout + stderr allowance shared by both readers
struct OutputBudget {
    limit: u64,
    used: AtomicU64,
    exceeded: AtomicBool,
    notify: Notify,
}

impl OutputBudget {
    fn new(limit: u64) -> Self {
        Self {
            limit,
            used: AtomicU64::new(0),
            exceeded: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Claim `n` bytes; returns how many of them still fit
    fn take(&self, n: usize) -> usize {
        let prev = self.used.fetch_add(n as u64, Ordering::SeqCst);
        if prev.saturating_add(n as u64) <= self.limit {
            return n;
        }
        if !self.exceeded.swap(true, Ordering::SeqCst) {
            self.notify.notify_one();
        }
        self.limit.saturating_sub(prev).min(n as u64) as usize
    }

    fn is_exceeded(&self) -> bool {
        self.exceeded.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy)]
enum Termination {
    Exited(std::process::ExitStatus),
    TimedOut,
    OutputOverflow,
}

/// Run `cmd` to completion under `limits`
pub async fn spawn_limited(
    cmd: &CommandSpec,
    stdin: Option<&str>,
    limits: &RunLimits,
    monitor: &dyn ResourceMonitor,
) -> JudgeResult<ExecutionResult> {
    debug!("Spawning {:?} in {:?}", cmd.to_vec(), cmd.work_dir);

    // Stdin is materialized as a file in the workspace and removed after the run
    let stdin_file = match stdin {
        Some(content) => Some(write_stdin_file(cmd, content)?),
        None => None,
    };
    let stdin_stdio = match &stdin_file {
        Some(file) => Stdio::from(file.reopen().context("Failed to reopen stdin file")?),
        None => Stdio::null(),
    };

    let mut command = Command::new(&cmd.program);
    command
        .args(&cmd.args)
        .current_dir(&cmd.work_dir)
        .stdin(stdin_stdio)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);

    let started = Instant::now();
    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to spawn {}", cmd.program))?;
    let pid = child.id();

    let budget = Arc::new(OutputBudget::new(limits.max_output_bytes));
    let stdout_task = spawn_reader(child.stdout.take(), budget.clone());
    let stderr_task = spawn_reader(child.stderr.take(), budget.clone());

    let deadline = tokio::time::sleep(Duration::from_millis(limits.timeout_ms));
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
    let mut peak_kb: Option<u64> = None;

    let termination = loop {
        tokio::select! {
            status = child.wait() => {
                break Termination::Exited(status.context("Failed to wait for process")?);
            }
            _ = &mut deadline => break Termination::TimedOut,
            _ = budget.notify.notified() => break Termination::OutputOverflow,
            _ = ticker.tick() => {
                if let Some(kb) = pid.and_then(|pid| monitor.sample_kb(pid)) {
                    peak_kb = Some(peak_kb.map_or(kb, |peak| peak.max(kb)));
                }
            }
        }
    };
    let mut elapsed_ms = started.elapsed().as_millis() as u64;

    // Stragglers the program left behind would keep the pipes open
    if let Some(pid) = pid {
        kill_group(pid);
    }
    let status = match termination {
        Termination::Exited(status) => Some(status),
        Termination::TimedOut | Termination::OutputOverflow => reap(&mut child).await,
    };

    // A process that escaped the group can hold the pipes open; the deadline still applies
    let readers: Vec<AbortHandle> = [&stdout_task, &stderr_task]
        .into_iter()
        .flatten()
        .map(|task| task.abort_handle())
        .collect();
    let drain_until = tokio::time::Instant::from_std(started)
        + Duration::from_millis(limits.timeout_ms)
        + DRAIN_GRACE;
    let drain = async {
        let stdout = collect(stdout_task).await?;
        let stderr = collect(stderr_task).await?;
        JudgeResult::Ok((stdout, stderr))
    };
    let (stdout, stderr, drain_expired) = match tokio::time::timeout_at(drain_until, drain).await
    {
        Ok(output) => {
            let (stdout, stderr) = output?;
            (stdout, stderr, false)
        }
        Err(_) => {
            warn!(
                "{} left processes holding its output open past the deadline",
                cmd.program
            );
            for reader in &readers {
                reader.abort();
            }
            elapsed_ms = started.elapsed().as_millis() as u64;
            (String::new(), String::new(), true)
        }
    };

    if let Some(file) = stdin_file {
        if let Err(e) = file.close() {
            warn!("Failed to remove stdin file: {}", e);
        }
    }

    let (memory_kb, memory_source) = monitor.settle(peak_kb);

    let outcome = match termination {
        _ if drain_expired => Outcome::TimeLimitExceeded,
        Termination::TimedOut => Outcome::TimeLimitExceeded,
        Termination::OutputOverflow => Outcome::MemoryLimitExceeded,
        // The budget can run out between the exit and the last read
        Termination::Exited(_) if budget.is_exceeded() => Outcome::MemoryLimitExceeded,
        Termination::Exited(status) if status.success() => Outcome::Success,
        Termination::Exited(_) => Outcome::RuntimeError,
    };

    debug!(
        "{} finished: {:?} in {}ms, {} KB ({:?})",
        cmd.program, outcome, elapsed_ms, memory_kb, memory_source
    );

    Ok(ExecutionResult {
        stdout,
        stderr,
        exit_code: status.and_then(|s| s.code()),
        exit_signal: status.and_then(|s| s.signal()),
        execution_time_ms: elapsed_ms,
        memory_kb,
        memory_source,
        outcome,
    })
}

fn write_stdin_file(cmd: &CommandSpec, content: &str) -> JudgeResult<NamedTempFile> {
    use std::io::Write;

    let mut file = tempfile::Builder::new()
        .prefix("stdin_")
        .tempfile_in(&cmd.work_dir)
        .with_context(|| format!("Failed to create stdin file in {:?}", cmd.work_dir))?;
    file.write_all(content.as_bytes())
        .context("Failed to write stdin file")?;
    file.flush().context("Failed to flush stdin file")?;
    Ok(file)
}

fn spawn_reader<R>(
    reader: Option<R>,
    budget: Arc<OutputBudget>,
) -> Option<JoinHandle<std::io::Result<Vec<u8>>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    reader.map(|reader| tokio::spawn(read_capped(reader, budget)))
}

/// Read until EOF or until the shared budget runs out
async fn read_capped<R: AsyncRead + Unpin>(
    mut reader: R,
    budget: Arc<OutputBudget>,
) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let allowed = budget.take(n);
        buf.extend_from_slice(&chunk[..allowed]);
        if allowed < n {
            break;
        }
    }
    Ok(buf)
}

async fn collect(task: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> JudgeResult<String> {
    let Some(task) = task else {
        return Ok(String::new());
    };
    let bytes = task
        .await
        .context("Output reader panicked")?
        .context("Failed to read process output")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn kill_group(pid: u32) {
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!("Failed to kill process group {}: {}", pid, e),
    }
}

async fn reap(child: &mut Child) -> Option<std::process::ExitStatus> {
    if let Err(e) = child.kill().await {
        debug!("kill after group kill: {}", e);
    }
    match child.wait().await {
        Ok(status) => Some(status),
        Err(e) => {
            warn!("Failed to reap killed process: {}", e);
            None
        }
    }
}
