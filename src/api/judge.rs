use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::json_body;
use crate::error::JudgeResult;
use crate::pipeline::{Judge, SubmissionReport, SubmissionRequest};

#[derive(Serialize)]
pub struct SubmitResponse {
    success: bool,
    #[serde(flatten)]
    report: SubmissionReport,
}

/// Grade a submission; `success` is false only when it stopped before the hidden tests
pub async fn submit(
    State(judge): State<Judge>,
    payload: Result<Json<SubmissionRequest>, JsonRejection>,
) -> JudgeResult<Json<SubmitResponse>> {
    let request = json_body(payload)?;
    let report = judge.submit(&request).await?;

    Ok(Json(SubmitResponse {
        success: !report.is_sample_test,
        report,
    }))
}
