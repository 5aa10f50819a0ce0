use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical outcome label for a submission or a single test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "Accepted")]
    Accepted,
    #[serde(rename = "Wrong Answer")]
    WrongAnswer,
    #[serde(rename = "Runtime Error")]
    RuntimeError,
    #[serde(rename = "Memory Limit Exceeded")]
    MemoryLimitExceeded,
    #[serde(rename = "Time Limit Exceeded")]
    TimeLimitExceeded,
    #[serde(rename = "Compilation Error")]
    CompilationError,
}

impl Verdict {
    /// Rank used when reducing a batch; higher wins
    fn precedence(self) -> u8 {
        match self {
            Verdict::Accepted => 0,
            Verdict::WrongAnswer | Verdict::RuntimeError => 1,
            Verdict::MemoryLimitExceeded => 2,
            Verdict::TimeLimitExceeded => 3,
            Verdict::CompilationError => 4,
        }
    }

    /// Reduce per-test verdicts into one submission verdict.
    ///
    /// An empty batch is `Accepted`. A crash without a resource violation counts as a
    /// mismatch, so a batch never reduces to `Runtime Error`.
    pub fn classify<I>(verdicts: I) -> Verdict
    where
        I: IntoIterator<Item = Verdict>,
    {
        match verdicts.into_iter().max_by_key(|v| v.precedence()) {
            None => Verdict::Accepted,
            Some(Verdict::RuntimeError) => Verdict::WrongAnswer,
            Some(verdict) => verdict,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Accepted => "Accepted",
            Verdict::WrongAnswer => "Wrong Answer",
            Verdict::RuntimeError => "Runtime Error",
            Verdict::MemoryLimitExceeded => "Memory Limit Exceeded",
            Verdict::TimeLimitExceeded => "Time Limit Exceeded",
            Verdict::CompilationError => "Compilation Error",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
