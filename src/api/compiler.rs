//! Ad-hoc execution endpoints: run once, run a batch, list languages

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::json_body;
use crate::core::Verdict;
use crate::error::{JudgeError, JudgeResult};
use crate::judger::{BatchSummary, TestCase, TestOutcome};
use crate::languages;
use crate::pipeline::Judge;
use crate::runner::{ExecutionLimits, MemorySource};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub input: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteSuccess {
    success: bool,
    message: &'static str,
    output: String,
    error: Option<String>,
    language: String,
    execution_time_ms: u64,
    memory_kb: u64,
    memory_source: MemorySource,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteFailure {
    success: bool,
    verdict: Verdict,
    message: String,
    output: String,
    error: String,
    execution_time_ms: u64,
    memory_kb: u64,
}

impl ExecuteFailure {
    fn new(verdict: Verdict, error: String, execution_time_ms: u64, memory_kb: u64) -> Self {
        Self {
            success: false,
            verdict,
            message: verdict.to_string(),
            output: String::new(),
            error,
            execution_time_ms,
            memory_kb,
        }
    }
}

pub async fn execute(
    State(judge): State<Judge>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> JudgeResult<Response> {
    let req = json_body(payload)?;

    let result = match judge
        .execute(&req.code, &req.language, req.input.as_deref())
        .await
    {
        Ok(result) => result,
        Err(JudgeError::BuildFailure { output }) => {
            let failure = ExecuteFailure::new(Verdict::CompilationError, output, 0, 0);
            return Ok(Json(failure).into_response());
        }
        Err(e) => return Err(e),
    };

    if let Err(e) = result.check(&judge.config().execute_limits()) {
        let verdict = e.verdict().unwrap_or(Verdict::RuntimeError);
        let error = if result.stderr.trim().is_empty() {
            e.to_string()
        } else {
            result.stderr
        };
        let failure =
            ExecuteFailure::new(verdict, error, result.execution_time_ms, result.memory_kb);
        return Ok(Json(failure).into_response());
    }

    let language = languages::resolve(&req.language)?.name.clone();
    let success = ExecuteSuccess {
        success: true,
        message: "Code executed successfully",
        output: result.stdout,
        error: Some(result.stderr).filter(|s| !s.is_empty()),
        language,
        execution_time_ms: result.execution_time_ms,
        memory_kb: result.memory_kb,
        memory_source: result.memory_source,
    };
    Ok(Json(success).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteTestsRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub test_cases: Option<Vec<TestCase>>,
    #[serde(default, alias = "timeLimit")]
    pub time_limit_ms: Option<u64>,
    #[serde(default, alias = "memoryLimit")]
    pub memory_limit_mb: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteTestsResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    results: Vec<TestOutcome>,
    summary: BatchSummary,
}

pub async fn execute_tests(
    State(judge): State<Judge>,
    payload: Result<Json<ExecuteTestsRequest>, JsonRejection>,
) -> JudgeResult<Json<impl Serialize>> {
    let req = json_body(payload)?;
    let Some(cases) = req.test_cases else {
        return Err(JudgeError::BadRequest(
            "Code, language and testCases are required".to_string(),
        ));
    };

    let defaults = judge.config().default_limits;
    let limits = ExecutionLimits::checked(
        req.time_limit_ms.unwrap_or(defaults.time_limit_ms),
        req.memory_limit_mb.unwrap_or(defaults.memory_limit_mb),
    )?;

    let response = match judge
        .execute_tests(&req.code, &req.language, &cases, &limits)
        .await
    {
        Ok(batch) => ExecuteTestsResponse {
            success: true,
            message: None,
            error: None,
            results: batch.outcomes,
            summary: batch.summary,
        },
        Err(JudgeError::BuildFailure { output }) => ExecuteTestsResponse {
            success: false,
            message: Some(Verdict::CompilationError.to_string()),
            error: Some(output),
            results: Vec::new(),
            summary: BatchSummary::not_run(cases.len()),
        },
        Err(e) => return Err(e),
    };

    Ok(Json(response))
}

#[derive(Serialize)]
struct LanguageEntry {
    value: &'static str,
    label: String,
    extension: String,
}

#[derive(Serialize)]
struct LanguageList {
    success: bool,
    message: &'static str,
    data: Vec<LanguageEntry>,
}

pub async fn languages() -> Json<impl Serialize> {
    let data = languages::supported_languages()
        .into_iter()
        .map(|spec| LanguageEntry {
            value: spec.language.id(),
            label: spec.name.clone(),
            extension: spec.extension.clone(),
        })
        .collect();

    Json(LanguageList {
        success: true,
        message: "Supported languages retrieved successfully",
        data,
    })
}
