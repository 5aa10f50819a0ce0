//! Judger module - runs a prepared program across a batch of test cases
//!
//! Runs are strictly sequential. A verdict-bearing failure becomes a failed `TestOutcome`
//! and the batch moves on; an internal error aborts the batch.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::compiler::PreparedProgram;
use crate::core::Verdict;
use crate::error::JudgeResult;
use crate::runner::{ExecutionLimits, RunLimits, Runner};

/// One input/expected-output pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    #[serde(alias = "expectedOutput")]
    pub output: String,
}

impl TestCase {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

/// Result of one test case
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub passed: bool,
    pub verdict: Verdict,
    pub execution_time_ms: u64,
    pub memory_kb: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub total_execution_time_ms: u64,
    pub max_memory_kb: u64,
}

impl BatchSummary {
    /// Summary of a batch that never ran
    pub fn not_run(total: usize) -> Self {
        Self {
            total,
            passed: 0,
            failed: total,
            total_execution_time_ms: 0,
            max_memory_kb: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestBatch {
    pub outcomes: Vec<TestOutcome>,
    pub summary: BatchSummary,
}

impl TestBatch {
    pub fn all_passed(&self) -> bool {
        self.summary.passed == self.summary.total
    }

    pub fn verdict(&self) -> Verdict {
        Verdict::classify(self.outcomes.iter().map(|o| o.verdict))
    }

    /// Longest single run in the batch
    pub fn max_time_ms(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|o| o.execution_time_ms)
            .max()
            .unwrap_or(0)
    }
}

/// Run every test case against the prepared program
pub async fn run_tests(
    runner: &dyn Runner,
    program: &PreparedProgram,
    cases: &[TestCase],
    limits: &ExecutionLimits,
) -> JudgeResult<TestBatch> {
    let run_limits = RunLimits::from_execution_limits(limits);
    let mut batch = TestBatch {
        outcomes: Vec::with_capacity(cases.len()),
        summary: BatchSummary {
            total: cases.len(),
            ..Default::default()
        },
    };

    for (index, case) in cases.iter().enumerate() {
        let result = runner
            .run(program.run_command(), &run_limits, Some(&case.input))
            .await?;

        let outcome = match result.check(&run_limits) {
            Ok(()) => {
                let actual = result.stdout.trim().to_string();
                let passed = compare_output(&result.stdout, &case.output);
                TestOutcome {
                    input: case.input.clone(),
                    expected_output: case.output.clone(),
                    actual_output: actual,
                    passed,
                    verdict: if passed {
                        Verdict::Accepted
                    } else {
                        Verdict::WrongAnswer
                    },
                    execution_time_ms: result.execution_time_ms,
                    memory_kb: result.memory_kb,
                    error: None,
                }
            }
            Err(e) => {
                let Some(verdict) = e.verdict() else {
                    return Err(e);
                };
                let message = e.to_string();
                TestOutcome {
                    input: case.input.clone(),
                    expected_output: case.output.clone(),
                    actual_output: message.clone(),
                    passed: false,
                    verdict,
                    execution_time_ms: result.execution_time_ms,
                    memory_kb: result.memory_kb,
                    error: Some(message),
                }
            }
        };

        debug!(
            "Test {}: {} in {}ms",
            index + 1,
            outcome.verdict,
            outcome.execution_time_ms
        );

        if outcome.passed {
            batch.summary.passed += 1;
        }
        batch.summary.total_execution_time_ms += outcome.execution_time_ms;
        batch.summary.max_memory_kb = batch.summary.max_memory_kb.max(outcome.memory_kb);
        batch.outcomes.push(outcome);
    }

    batch.summary.failed = batch.summary.total - batch.summary.passed;
    Ok(batch)
}

/// Compare program output with expected output, ignoring surrounding whitespace
pub fn compare_output(actual: &str, expected: &str) -> bool {
    actual.trim() == expected.trim()
}
