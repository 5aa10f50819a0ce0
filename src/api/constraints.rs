use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::Deserialize;

use super::json_body;
use crate::constraints::{self, ConstraintRule, Difficulty, ParsedConstraints, ValidationReport};
use crate::error::JudgeResult;

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    #[serde(default)]
    pub constraints: String,
    #[serde(default)]
    pub difficulty: Difficulty,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub constraints: Vec<ConstraintRule>,
}

pub async fn parse(
    payload: Result<Json<ParseRequest>, JsonRejection>,
) -> JudgeResult<Json<ParsedConstraints>> {
    let req = json_body(payload)?;
    Ok(Json(constraints::parse(&req.constraints, req.difficulty)))
}

pub async fn validate(
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> JudgeResult<Json<ValidationReport>> {
    let req = json_body(payload)?;
    Ok(Json(constraints::validate_input(&req.input, &req.constraints)))
}
