//! Error types for the asynchronous report protocol.

use std::time::Duration;

use thiserror::Error;

/// A report job did not produce an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    /// The server reported the job as failed.
    #[error("report job {task_id} failed: {message}")]
    Failed {
        /// Job handle.
        task_id: String,
        /// Server explanation, or a placeholder when none was given.
        message: String,
    },

    /// The job was still pending when the poll budget ran out.
    #[error("report job {task_id} not ready after {waited:?}")]
    Timeout {
        /// Job handle.
        task_id: String,
        /// Time spent polling.
        waited: Duration,
    },
}

impl ReportError {
    /// Creates a failed-job error.
    pub fn failed(task_id: impl Into<String>, message: Option<String>) -> Self {
        Self::Failed {
            task_id: task_id.into(),
            message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "no reason given".to_string()),
        }
    }

    /// Creates a poll-timeout error.
    pub fn timeout(task_id: impl Into<String>, waited: Duration) -> Self {
        Self::Timeout {
            task_id: task_id.into(),
            waited,
        }
    }
}
