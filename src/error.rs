//! Error taxonomy for the judge core
//!
//! Verdict-bearing variants describe what the submitted code did. `Internal` is the only
//! variant that means the judge itself malfunctioned.

use thiserror::Error;

use crate::core::verdict::Verdict;

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Compilation Error")]
    BuildFailure { output: String },

    #[error("Time limit of {limit_ms}ms exceeded")]
    Timeout { limit_ms: u64 },

    #[error("Memory limit of {limit_mb}MB exceeded")]
    OutputOverflow { limit_mb: u64 },

    #[error("{message}")]
    ProcessFailure { message: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl JudgeError {
    /// Verdict reported to the submitter, if this error is attributable to the submission
    pub fn verdict(&self) -> Option<Verdict> {
        match self {
            JudgeError::BuildFailure { .. } => Some(Verdict::CompilationError),
            JudgeError::Timeout { .. } => Some(Verdict::TimeLimitExceeded),
            JudgeError::OutputOverflow { .. } => Some(Verdict::MemoryLimitExceeded),
            JudgeError::ProcessFailure { .. } => Some(Verdict::RuntimeError),
            JudgeError::UnsupportedLanguage(_)
            | JudgeError::BadRequest(_)
            | JudgeError::Internal(_) => None,
        }
    }
}

impl From<std::io::Error> for JudgeError {
    fn from(e: std::io::Error) -> Self {
        JudgeError::Internal(e.into())
    }
}

pub type JudgeResult<T> = std::result::Result<T, JudgeError>;
