//! Run-execution pipeline: bundle assembly, executor client, report
//! classification, and result recording.

pub mod bundle;
pub mod executor;
pub mod recorder;
pub mod report;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("executor unavailable: {reason}")]
    ExecutorUnavailable { reason: String },
}

/// Whether a run was triggered for a single scenario or a whole service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunScope {
    Scenario,
    Service,
}

impl RunScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunScope::Scenario => "SCENARIO",
            RunScope::Service => "SERVICE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SCENARIO" => Some(RunScope::Scenario),
            "SERVICE" => Some(RunScope::Service),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final classification of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Passed,
    Failed,
    Undefined,
    Completed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Passed => "PASSED",
            RunStatus::Failed => "FAILED",
            RunStatus::Undefined => "UNDEFINED",
            RunStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
