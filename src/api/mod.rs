//! HTTP API
//!
//! JSON over axum. Every error body is `{success: false, message}`; internal failures are
//! logged and reported as a generic 500.

pub mod compiler;
pub mod constraints;
pub mod judge;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::error;

use crate::error::{JudgeError, JudgeResult};
use crate::pipeline::Judge;

#[derive(Debug, Serialize)]
pub struct Message {
    pub success: bool,
    pub message: String,
}

impl Message {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl IntoResponse for JudgeError {
    fn into_response(self) -> Response {
        if let JudgeError::Internal(e) = &self {
            error!("Internal error: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Message::failure("Internal server error")),
            )
                .into_response();
        }
        (StatusCode::BAD_REQUEST, Json(Message::failure(self.to_string()))).into_response()
    }
}

/// Unwrap a JSON body, turning malformed payloads into a 400
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> JudgeResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| JudgeError::BadRequest(e.body_text()))
}

#[derive(Serialize)]
struct Health {
    success: bool,
    message: &'static str,
    timestamp: String,
}

async fn health() -> Json<Health> {
    Json(Health {
        success: true,
        message: "Judge service is running",
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn not_found() -> (StatusCode, Json<Message>) {
    (StatusCode::NOT_FOUND, Json(Message::failure("Route not found")))
}

pub fn router(judge: Judge) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/compiler/execute", post(compiler::execute))
        .route("/api/v1/compiler/execute-tests", post(compiler::execute_tests))
        .route("/api/v1/compiler/languages", get(compiler::languages))
        .route("/api/v1/judge/submit", post(judge::submit))
        .route("/api/v1/constraints/parse", post(constraints::parse))
        .route("/api/v1/constraints/validate", post(constraints::validate))
        .fallback(not_found)
        .with_state(judge)
}

#[cfg(test)]
pub(crate) async fn body_json(response: Response) -> (StatusCode, serde_json::Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}
