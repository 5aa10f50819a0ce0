//! Compiler module - Source preparation and compilation
//!
//! This module turns submitted code into a runnable program:
//! - Writes the wrapped source into a fresh per-submission workspace
//! - Invokes the build recipe at most once
//! - Hands back a `PreparedProgram` reused for every test run
//!
//! Builds go through the same `Runner` as test runs, so they get the same deadline and
//! output cap enforcement.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info};

use crate::error::{JudgeError, JudgeResult};
use crate::languages::{Language, LanguageSpec, ProgramPaths};
use crate::runner::{CommandSpec, Outcome, RunLimits, Runner};
use crate::sandbox::{SandboxConfig, Workspace};

/// Result of a compilation attempt
#[derive(Debug)]
pub struct CompileResult {
    pub success: bool,
    pub message: Option<String>,
}

/// A submission ready to run, owning its workspace until dropped
pub struct PreparedProgram {
    workspace: Workspace,
    language: Language,
    run_command: CommandSpec,
    source_path: PathBuf,
}

impl PreparedProgram {
    pub fn language(&self) -> Language {
        self.language
    }

    pub fn run_command(&self) -> &CommandSpec {
        &self.run_command
    }

    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Release the workspace
    pub fn close(self) {
        self.workspace.close()
    }
}

/// Run a build command and check that it produced its artifact
pub async fn compile_in_sandbox(
    runner: &dyn Runner,
    build: &CommandSpec,
    artifact: Option<&Path>,
    limits: &RunLimits,
) -> JudgeResult<CompileResult> {
    debug!("Compiling with {:?}", build.to_vec());

    let result = runner.run(build, limits, None).await?;

    if result.is_success() {
        if let Some(artifact) = artifact {
            if !artifact.exists() {
                let output = pick_output(&result.stderr, &result.stdout)
                    .unwrap_or_else(|| "Build produced no executable".to_string());
                return Ok(CompileResult {
                    success: false,
                    message: Some(output),
                });
            }
        }
        return Ok(CompileResult {
            success: true,
            message: None,
        });
    }

    let error_msg = pick_output(&result.stderr, &result.stdout).unwrap_or_else(|| {
        match result.outcome {
            Outcome::TimeLimitExceeded => "Compilation timed out".to_string(),
            Outcome::MemoryLimitExceeded => "Compiler output exceeded limit".to_string(),
            _ => match result.exit_code {
                Some(code) => format!("Compilation failed with exit code {}", code),
                None => "Compiler crashed".to_string(),
            },
        }
    });

    Ok(CompileResult {
        success: false,
        message: Some(error_msg),
    })
}

fn pick_output(stderr: &str, stdout: &str) -> Option<String> {
    if !stderr.trim().is_empty() {
        Some(stderr.to_string())
    } else if !stdout.trim().is_empty() {
        Some(stdout.to_string())
    } else {
        None
    }
}

/// Write the submission into a new workspace and build it once
pub async fn prepare(
    runner: &dyn Runner,
    spec: &LanguageSpec,
    code: &str,
    config: &SandboxConfig,
) -> JudgeResult<PreparedProgram> {
    let workspace = Workspace::create(&config.temp_root)?;
    let stem = workspace.stem();
    let dir = workspace.path().to_path_buf();

    let source = spec.wrap_source(code);
    let entry = spec.entry_class(&source);
    let paths = ProgramPaths {
        source: dir.join(spec.source_file_name(&stem, &entry)),
        executable: dir.join(&stem),
        dir,
        entry,
    };

    tokio::fs::write(&paths.source, source.as_bytes())
        .await
        .with_context(|| format!("Failed to write source {:?}", paths.source))?;

    if let Some(build) = spec.build_command(&paths) {
        let artifact = spec.artifact_path(&paths);
        let compile_result =
            compile_in_sandbox(runner, &build, artifact.as_deref(), &config.compile_limits())
                .await?;

        if !compile_result.success {
            info!("{} build failed in {:?}", spec.language, paths.dir);
            return Err(JudgeError::BuildFailure {
                output: compile_result.message.unwrap_or_default(),
            });
        }
    }

    let run_command = spec.run_command(&paths).ok_or_else(|| {
        JudgeError::Internal(anyhow::anyhow!(
            "Empty run command for {}",
            spec.language
        ))
    })?;

    Ok(PreparedProgram {
        workspace,
        language: spec.language,
        run_command,
        source_path: paths.source,
    })
}
