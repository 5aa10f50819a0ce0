//! Scripted runner for tests
//!
//! Build invocations are recognised by their `-o <artifact>` or `-d <class dir>` arguments;
//! the artifact is touched so the compile step sees a real file. Every other invocation is a
//! test run whose result comes from the script.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::JudgeResult;
use crate::runner::{CommandSpec, ExecutionResult, MemorySource, Outcome, RunLimits, Runner};

#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    Output(String),
    Timeout,
    Overflow,
    Crash(String),
}

type Script = Box<dyn Fn(&str) -> Scripted + Send + Sync>;

pub(crate) struct ScriptedRunner {
    script: Script,
    build_error: Option<String>,
    skip_artifact: bool,
    builds: AtomicUsize,
    inputs: Mutex<Vec<String>>,
    work_dirs: Mutex<Vec<PathBuf>>,
}

impl ScriptedRunner {
    pub(crate) fn new(script: impl Fn(&str) -> Scripted + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            build_error: None,
            skip_artifact: false,
            builds: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
            work_dirs: Mutex::new(Vec::new()),
        }
    }

    /// Prints its input back
    pub(crate) fn echo() -> Self {
        Self::new(|input| Scripted::Output(input.to_string()))
    }

    pub(crate) fn failing_build(mut self, output: &str) -> Self {
        self.build_error = Some(output.to_string());
        self
    }

    pub(crate) fn without_artifact(mut self) -> Self {
        self.skip_artifact = true;
        self
    }

    pub(crate) fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub(crate) fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }

    pub(crate) fn work_dirs(&self) -> Vec<PathBuf> {
        self.work_dirs.lock().unwrap().clone()
    }
}

pub(crate) fn execution(outcome: Outcome, stdout: &str, stderr: &str) -> ExecutionResult {
    ExecutionResult {
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        exit_code: match outcome {
            Outcome::Success => Some(0),
            Outcome::RuntimeError => Some(1),
            _ => None,
        },
        exit_signal: match outcome {
            Outcome::TimeLimitExceeded | Outcome::MemoryLimitExceeded => Some(9),
            _ => None,
        },
        execution_time_ms: 10,
        memory_kb: 1024,
        memory_source: MemorySource::Sampled,
        outcome,
    }
}

fn is_build(cmd: &CommandSpec) -> bool {
    cmd.args.iter().any(|a| a == "-o" || a == "-d")
}

/// `-o <artifact>`, or `-d <dir> <Class>.java` producing `<dir>/<Class>.class`
fn build_artifact(cmd: &CommandSpec) -> Option<PathBuf> {
    if let Some(artifact) = flag_value(cmd, "-o") {
        return Some(PathBuf::from(artifact));
    }
    let class_dir = Path::new(flag_value(cmd, "-d")?);
    let source = Path::new(cmd.args.last()?);
    Some(class_dir.join(source.file_stem()?).with_extension("class"))
}

fn flag_value<'a>(cmd: &'a CommandSpec, flag: &str) -> Option<&'a str> {
    let pos = cmd.args.iter().position(|a| a == flag)?;
    cmd.args.get(pos + 1).map(String::as_str)
}

#[async_trait]
impl Runner for ScriptedRunner {
    async fn run(
        &self,
        cmd: &CommandSpec,
        limits: &RunLimits,
        stdin: Option<&str>,
    ) -> JudgeResult<ExecutionResult> {
        if is_build(cmd) {
            self.builds.fetch_add(1, Ordering::SeqCst);
            if let Some(output) = &self.build_error {
                return Ok(execution(Outcome::RuntimeError, "", output));
            }
            if !self.skip_artifact {
                if let Some(artifact) = build_artifact(cmd) {
                    std::fs::write(artifact, b"")?;
                }
            }
            return Ok(execution(Outcome::Success, "", ""));
        }

        let input = stdin.unwrap_or_default();
        self.inputs.lock().unwrap().push(input.to_string());
        self.work_dirs.lock().unwrap().push(cmd.work_dir.clone());

        let result = match (self.script)(input) {
            Scripted::Output(stdout) => execution(Outcome::Success, &stdout, ""),
            Scripted::Timeout => {
                let mut result = execution(Outcome::TimeLimitExceeded, "", "");
                result.execution_time_ms = limits.timeout_ms;
                result
            }
            Scripted::Overflow => execution(Outcome::MemoryLimitExceeded, "", ""),
            Scripted::Crash(stderr) => execution(Outcome::RuntimeError, "", &stderr),
        };
        Ok(result)
    }
}
