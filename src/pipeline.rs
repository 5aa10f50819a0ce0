//! Submission pipeline
//!
//! `Judge` is the entry point for every kind of run. Submissions are evaluated in two
//! phases: sample tests first, and the hidden tests only if every sample passes. The program
//! is built once and reused by both phases.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::compiler::{prepare, PreparedProgram};
use crate::constraints::{validate_input, ConstraintRule};
use crate::core::Verdict;
use crate::error::{JudgeError, JudgeResult};
use crate::judger::{run_tests, BatchSummary, TestBatch, TestCase, TestOutcome};
use crate::languages::{self, LanguageSpec};
use crate::runner::{ExecutionLimits, ExecutionResult, Runner};
use crate::sandbox::SandboxConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub code: String,
    pub language: String,
    #[serde(default)]
    pub sample_test_cases: Vec<TestCase>,
    #[serde(default)]
    pub hidden_test_cases: Vec<TestCase>,
    #[serde(default)]
    pub limits: Option<ExecutionLimits>,
    /// Rules the sample inputs are checked against; violations are only logged
    #[serde(default)]
    pub constraints: Vec<ConstraintRule>,
}

/// The one record kept per submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub status: Verdict,
    pub test_cases_passed: usize,
    pub total_test_cases: usize,
    /// Longest single run across every executed test
    pub execution_time_ms: u64,
    /// Peak memory across every executed test
    pub memory_kb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReport {
    pub passed: bool,
    pub is_sample_test: bool,
    pub message: String,
    pub record: SubmissionRecord,
    pub results: Vec<TestOutcome>,
    pub summary: BatchSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_output: Option<String>,
}

impl SubmissionReport {
    fn compilation_error(sample_total: usize, output: String) -> Self {
        Self {
            passed: false,
            is_sample_test: true,
            message: Verdict::CompilationError.to_string(),
            record: SubmissionRecord {
                status: Verdict::CompilationError,
                test_cases_passed: 0,
                total_test_cases: sample_total,
                execution_time_ms: 0,
                memory_kb: 0,
            },
            results: Vec::new(),
            summary: BatchSummary::not_run(sample_total),
            compile_output: Some(output),
        }
    }
}

/// Shared handle to the runner and configuration
#[derive(Clone)]
pub struct Judge {
    runner: Arc<dyn Runner>,
    config: Arc<SandboxConfig>,
}

impl Judge {
    pub fn new(runner: Arc<dyn Runner>, config: SandboxConfig) -> Self {
        Self {
            runner,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Validate the request before touching the filesystem
    fn resolve(code: &str, language: &str) -> JudgeResult<&'static LanguageSpec> {
        if code.trim().is_empty() {
            return Err(JudgeError::BadRequest("Code is required".to_string()));
        }
        if language.trim().is_empty() {
            return Err(JudgeError::BadRequest("Language is required".to_string()));
        }
        languages::resolve(language)
    }

    async fn prepare(&self, spec: &LanguageSpec, code: &str) -> JudgeResult<PreparedProgram> {
        prepare(self.runner.as_ref(), spec, code, &self.config).await
    }

    /// Build and run once with the ad-hoc limits
    pub async fn execute(
        &self,
        code: &str,
        language: &str,
        input: Option<&str>,
    ) -> JudgeResult<ExecutionResult> {
        let spec = Self::resolve(code, language)?;
        let program = self.prepare(spec, code).await?;

        let result = self
            .runner
            .run(program.run_command(), &self.config.execute_limits(), input)
            .await;

        program.close();
        result
    }

    /// Build once and run every test case
    pub async fn execute_tests(
        &self,
        code: &str,
        language: &str,
        cases: &[TestCase],
        limits: &ExecutionLimits,
    ) -> JudgeResult<TestBatch> {
        let spec = Self::resolve(code, language)?;
        let program = self.prepare(spec, code).await?;

        let batch = run_tests(self.runner.as_ref(), &program, cases, limits).await;

        program.close();
        batch
    }

    /// Two-phase evaluation of a submission
    pub async fn submit(&self, request: &SubmissionRequest) -> JudgeResult<SubmissionReport> {
        let spec = Self::resolve(&request.code, &request.language)?;
        let limits = request.limits.unwrap_or(self.config.default_limits);

        if !request.constraints.is_empty() {
            for (index, case) in request.sample_test_cases.iter().enumerate() {
                let report = validate_input(&case.input, &request.constraints);
                if !report.valid {
                    warn!(
                        "Sample test {} violates constraints: {}",
                        index + 1,
                        report.errors.join(", ")
                    );
                }
            }
        }

        let program = match self.prepare(spec, &request.code).await {
            Ok(program) => program,
            Err(JudgeError::BuildFailure { output }) => {
                info!("Submission in {}: {}", spec.language, Verdict::CompilationError);
                return Ok(SubmissionReport::compilation_error(
                    request.sample_test_cases.len(),
                    output,
                ));
            }
            Err(e) => return Err(e),
        };

        let report = self.run_phases(&program, request, &limits).await;
        if let Ok(report) = &report {
            info!(
                "Submission in {} ({:?}): {} ({}/{})",
                spec.language,
                program.workspace_path(),
                report.record.status,
                report.record.test_cases_passed,
                report.record.total_test_cases
            );
        }

        program.close();
        report
    }

    async fn run_phases(
        &self,
        program: &PreparedProgram,
        request: &SubmissionRequest,
        limits: &ExecutionLimits,
    ) -> JudgeResult<SubmissionReport> {
        let runner = self.runner.as_ref();

        let sample = run_tests(runner, program, &request.sample_test_cases, limits).await?;

        if !sample.all_passed() {
            let record = SubmissionRecord {
                status: sample.verdict(),
                test_cases_passed: sample.summary.passed,
                total_test_cases: sample.summary.total,
                execution_time_ms: sample.max_time_ms(),
                memory_kb: sample.summary.max_memory_kb,
            };
            let message = format!(
                "Failed sample test cases. Passed {} out of {} sample tests",
                sample.summary.passed, sample.summary.total
            );
            return Ok(SubmissionReport {
                passed: false,
                is_sample_test: true,
                message,
                record,
                results: sample.outcomes,
                summary: sample.summary,
                compile_output: None,
            });
        }

        let hidden = run_tests(runner, program, &request.hidden_test_cases, limits).await?;
        let status = hidden.verdict();

        let record = SubmissionRecord {
            status,
            test_cases_passed: hidden.summary.passed,
            total_test_cases: hidden.summary.total,
            execution_time_ms: sample.max_time_ms().max(hidden.max_time_ms()),
            memory_kb: sample
                .summary
                .max_memory_kb
                .max(hidden.summary.max_memory_kb),
        };

        let message = match status {
            Verdict::Accepted => "All test cases passed!".to_string(),
            Verdict::TimeLimitExceeded => {
                format!("Time limit exceeded ({}ms)", limits.time_limit_ms)
            }
            Verdict::MemoryLimitExceeded => {
                format!("Memory limit exceeded ({}MB)", limits.memory_limit_mb)
            }
            _ => format!(
                "Passed {} out of {} hidden test cases",
                hidden.summary.passed, hidden.summary.total
            ),
        };

        Ok(SubmissionReport {
            passed: hidden.all_passed(),
            is_sample_test: false,
            message,
            record,
            results: hidden.outcomes,
            summary: hidden.summary,
            compile_output: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Scripted, ScriptedRunner};
    use tokio_test::assert_err;

    fn judge_with(runner: Arc<ScriptedRunner>, root: &std::path::Path) -> Judge {
        Judge::new(runner, SandboxConfig::with_temp_root(root))
    }

    fn request(sample: Vec<TestCase>, hidden: Vec<TestCase>) -> SubmissionRequest {
        SubmissionRequest {
            code: "int main() { return 0; }".to_string(),
            language: "cpp".to_string(),
            sample_test_cases: sample,
            hidden_test_cases: hidden,
            limits: Some(ExecutionLimits::new(1000, 64)),
            constraints: Vec::new(),
        }
    }

    fn echo_cases(inputs: &[&str]) -> Vec<TestCase> {
        inputs.iter().map(|i| TestCase::new(*i, *i)).collect()
    }

    fn workspace_count(root: &std::path::Path) -> usize {
        std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_accepted_builds_once() {
        let root = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::echo());
        let judge = judge_with(runner.clone(), root.path());

        let report = judge
            .submit(&request(
                echo_cases(&["1", "2"]),
                echo_cases(&["3", "4", "5"]),
            ))
            .await
            .unwrap();

        assert_eq!(runner.builds(), 1);
        assert!(report.passed);
        assert!(!report.is_sample_test);
        assert_eq!(report.message, "All test cases passed!");
        assert_eq!(
            report.record,
            SubmissionRecord {
                status: Verdict::Accepted,
                test_cases_passed: 3,
                total_test_cases: 3,
                execution_time_ms: 10,
                memory_kb: 1024,
            }
        );
        assert_eq!(report.results.len(), 3);
        assert_eq!(workspace_count(root.path()), 0);
    }

    #[tokio::test]
    async fn test_sample_failure_skips_hidden() {
        let root = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::echo());
        let judge = judge_with(runner.clone(), root.path());

        let sample = vec![TestCase::new("1", "1"), TestCase::new("2", "nope")];
        let hidden = echo_cases(&["hidden-1", "hidden-2"]);
        let report = judge.submit(&request(sample, hidden)).await.unwrap();

        assert_eq!(runner.inputs(), vec!["1", "2"]);
        assert!(report.is_sample_test);
        assert!(!report.passed);
        assert_eq!(report.record.status, Verdict::WrongAnswer);
        assert_eq!(report.record.test_cases_passed, 1);
        assert_eq!(report.record.total_test_cases, 2);
        assert_eq!(
            report.message,
            "Failed sample test cases. Passed 1 out of 2 sample tests"
        );
        assert_eq!(report.results.len(), 2);
    }

    #[tokio::test]
    async fn test_hidden_timeout_outranks_wrong_answer() {
        let root = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(|input| match input {
            "slow" => Scripted::Timeout,
            "wrong" => Scripted::Output("garbage".to_string()),
            other => Scripted::Output(other.to_string()),
        }));
        let judge = judge_with(runner.clone(), root.path());

        let hidden = vec![TestCase::new("slow", "1"), TestCase::new("wrong", "2")];
        let report = judge
            .submit(&request(echo_cases(&["ok"]), hidden))
            .await
            .unwrap();

        assert_eq!(report.record.status, Verdict::TimeLimitExceeded);
        assert_eq!(report.message, "Time limit exceeded (1000ms)");
        assert_eq!(report.record.test_cases_passed, 0);
        assert_eq!(report.record.total_test_cases, 2);
        assert_eq!(report.record.execution_time_ms, 1000);
        assert!(!report.is_sample_test);
    }

    #[tokio::test]
    async fn test_compilation_error_record() {
        let root = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::echo().failing_build("prog.cpp:1: error"));
        let judge = judge_with(runner.clone(), root.path());

        let report = judge
            .submit(&request(echo_cases(&["1", "2"]), echo_cases(&["3"])))
            .await
            .unwrap();

        assert_eq!(
            report.record,
            SubmissionRecord {
                status: Verdict::CompilationError,
                test_cases_passed: 0,
                total_test_cases: 2,
                execution_time_ms: 0,
                memory_kb: 0,
            }
        );
        assert_eq!(report.message, "Compilation Error");
        assert_eq!(report.compile_output.as_deref(), Some("prog.cpp:1: error"));
        assert!(runner.inputs().is_empty());
        assert_eq!(workspace_count(root.path()), 0);
    }

    #[tokio::test]
    async fn test_hidden_crash_reduces_to_wrong_answer() {
        let root = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(|input| match input {
            "crash" => Scripted::Crash("segfault".to_string()),
            other => Scripted::Output(other.to_string()),
        }));
        let judge = judge_with(runner, root.path());

        let hidden = vec![TestCase::new("crash", "1"), TestCase::new("ok", "ok")];
        let report = judge
            .submit(&request(echo_cases(&["ok"]), hidden))
            .await
            .unwrap();

        assert_eq!(report.record.status, Verdict::WrongAnswer);
        assert_eq!(report.results[0].verdict, Verdict::RuntimeError);
        assert_eq!(report.message, "Passed 1 out of 2 hidden test cases");
    }

    #[tokio::test]
    async fn test_crash_and_mismatch_reduce_to_wrong_answer() {
        let root = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(|input| match input {
            "crash" => Scripted::Crash("Traceback".to_string()),
            _ => Scripted::Output("nope".to_string()),
        }));
        let judge = judge_with(runner, root.path());

        let sample = vec![TestCase::new("ok", "nope")];
        let hidden = vec![TestCase::new("crash", "1"), TestCase::new("other", "2")];
        let report = judge.submit(&request(sample, hidden)).await.unwrap();

        assert!(!report.is_sample_test);
        assert_eq!(report.record.status, Verdict::WrongAnswer);
        assert_eq!(report.record.test_cases_passed, 0);
    }

    #[tokio::test]
    async fn test_rejects_before_any_io() {
        let root = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::echo());
        let judge = judge_with(runner.clone(), &root.path().join("never"));

        let mut bad_language = request(echo_cases(&["1"]), Vec::new());
        bad_language.language = "cobol".to_string();
        let err = assert_err!(judge.submit(&bad_language).await);
        assert!(matches!(err, JudgeError::UnsupportedLanguage(_)));

        let mut no_code = request(echo_cases(&["1"]), Vec::new());
        no_code.code = "   ".to_string();
        let err = assert_err!(judge.submit(&no_code).await);
        assert!(matches!(err, JudgeError::BadRequest(_)));

        assert!(!root.path().join("never").exists());
        assert_eq!(runner.builds(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_submissions_use_distinct_workspaces() {
        let root = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::echo());
        let judge = judge_with(runner.clone(), root.path());

        let req = request(echo_cases(&["1"]), echo_cases(&["2"]));
        let (a, b) = tokio::join!(judge.submit(&req), judge.submit(&req));
        assert!(a.unwrap().passed);
        assert!(b.unwrap().passed);

        let dirs = runner.work_dirs();
        assert_eq!(dirs.len(), 4);
        let mut unique = dirs.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 2);
        assert_eq!(workspace_count(root.path()), 0);
    }

    #[tokio::test]
    async fn test_execute_tests_reports_build_failure() {
        let root = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::echo().failing_build("boom"));
        let judge = judge_with(runner, root.path());

        let err = judge
            .execute_tests(
                "int main() {}",
                "c",
                &echo_cases(&["1"]),
                &ExecutionLimits::new(1000, 64),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, JudgeError::BuildFailure { output } if output == "boom"));
    }

    #[tokio::test]
    async fn test_execute_runs_once() {
        let root = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::echo());
        let judge = judge_with(runner.clone(), root.path());

        let result = judge
            .execute("fn main() {}", "rs", Some("hello"))
            .await
            .unwrap();
        assert_eq!(result.stdout, "hello");
        assert_eq!(runner.builds(), 1);
        assert_eq!(workspace_count(root.path()), 0);
    }

    fn toolchain_available(program: &str) -> bool {
        std::process::Command::new(program)
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .is_ok()
    }

    #[tokio::test]
    async fn test_echo_in_every_installed_language() {
        let programs = [
            ("py", "python3", "print(input())"),
            ("rb", "ruby", "puts gets"),
            (
                "c",
                "gcc",
                "#include <stdio.h>\nint main() { char s[64]; scanf(\"%63s\", s); printf(\"%s\\n\", s); return 0; }",
            ),
            (
                "cpp",
                "g++",
                "#include <iostream>\n#include <string>\nint main() { std::string s; std::cin >> s; std::cout << s << std::endl; }",
            ),
            (
                "go",
                "go",
                "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tvar s string\n\tfmt.Scan(&s)\n\tfmt.Println(s)\n}\n",
            ),
            (
                "rs",
                "rustc",
                "use std::io::Read;\nfn main() { let mut s = String::new(); std::io::stdin().read_to_string(&mut s).unwrap(); println!(\"{}\", s.trim()); }",
            ),
            (
                "java",
                "javac",
                "import java.util.Scanner;\npublic class Main { public static void main(String[] args) { System.out.println(new Scanner(System.in).next()); } }",
            ),
        ];

        let root = tempfile::tempdir().unwrap();
        let judge = real_judge(root.path());

        for (language, tool, code) in programs {
            if !toolchain_available(tool) {
                continue;
            }
            let req = SubmissionRequest {
                code: code.to_string(),
                language: language.to_string(),
                sample_test_cases: echo_cases(&["hello"]),
                hidden_test_cases: echo_cases(&["hello"]),
                limits: Some(ExecutionLimits::new(10_000, 64)),
                constraints: Vec::new(),
            };
            let report = judge.submit(&req).await.unwrap();
            assert_eq!(
                report.record.status,
                Verdict::Accepted,
                "{}: {:?}",
                language,
                report.compile_output
            );
        }
        assert_eq!(workspace_count(root.path()), 0);
    }

    fn real_judge(root: &std::path::Path) -> Judge {
        Judge::new(
            Arc::new(crate::runner::SandboxedRunner::new()),
            SandboxConfig::with_temp_root(root),
        )
    }

    #[tokio::test]
    async fn test_workspace_removed_after_real_timeout_and_crash() {
        if !toolchain_available("python3") {
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let judge = real_judge(root.path());

        let mut slow = request(echo_cases(&["1"]), Vec::new());
        slow.language = "py".to_string();
        slow.code = "import time\ntime.sleep(5)".to_string();
        slow.limits = Some(ExecutionLimits::new(300, 64));
        let report = judge.submit(&slow).await.unwrap();
        assert_eq!(report.record.status, Verdict::TimeLimitExceeded);
        assert_eq!(workspace_count(root.path()), 0);

        let mut crash = request(echo_cases(&["1"]), Vec::new());
        crash.language = "py".to_string();
        crash.code = "raise SystemExit(3)".to_string();
        crash.limits = Some(ExecutionLimits::new(5000, 64));
        let report = judge.submit(&crash).await.unwrap();
        assert_eq!(report.results[0].verdict, Verdict::RuntimeError);
        assert_eq!(report.record.status, Verdict::WrongAnswer);
        assert_eq!(workspace_count(root.path()), 0);
    }

    #[tokio::test]
    async fn test_java_public_class_other_than_main() {
        if !toolchain_available("javac") || !toolchain_available("java") {
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let judge = real_judge(root.path());

        let req = SubmissionRequest {
            code: "import java.util.Scanner;\n\npublic class Solution {\n    public static void main(String[] args) {\n        System.out.println(new Scanner(System.in).next());\n    }\n}\n".to_string(),
            language: "java".to_string(),
            sample_test_cases: echo_cases(&["hello"]),
            hidden_test_cases: echo_cases(&["world"]),
            limits: Some(ExecutionLimits::new(10_000, 64)),
            constraints: Vec::new(),
        };
        let report = judge.submit(&req).await.unwrap();
        assert_eq!(
            report.record.status,
            Verdict::Accepted,
            "{:?}",
            report.compile_output
        );
        assert_eq!(workspace_count(root.path()), 0);
    }
}
