use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::task::TaskId;

/// Per-task failure. Captured into the task's result, never raised to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchFailure {
    #[error("request failed: {message}")]
    Request { message: String },
    #[error("bad response{}: {message}", status_suffix(.status))]
    BadResponse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        message: String,
    },
    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

impl FetchFailure {
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    pub fn bad_status(status: u16, message: impl Into<String>) -> Self {
        Self::BadResponse {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::BadResponse {
            status: None,
            message: message.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::Timeout {
            after_ms: duration_ms(after),
        }
    }

    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::Request { .. } => "request_failure",
            Self::BadResponse { .. } => "bad_response",
            Self::Timeout { .. } => "timeout",
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::BadResponse { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    Success { payload: Value },
    Failure { error: FetchFailure },
}

/// Outcome of one submitted task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub task_id: TaskId,
    #[serde(flatten)]
    pub outcome: FetchOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl FetchResult {
    pub fn success(task_id: TaskId, payload: Value, latency: Option<Duration>) -> Self {
        Self {
            task_id,
            outcome: FetchOutcome::Success { payload },
            latency_ms: latency.map(duration_ms),
        }
    }

    pub fn failure(task_id: TaskId, error: FetchFailure, latency: Option<Duration>) -> Self {
        Self {
            task_id,
            outcome: FetchOutcome::Failure { error },
            latency_ms: latency.map(duration_ms),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, FetchOutcome::Success { .. })
    }

    pub fn payload(&self) -> Option<&Value> {
        match &self.outcome {
            FetchOutcome::Success { payload } => Some(payload),
            FetchOutcome::Failure { .. } => None,
        }
    }

    pub fn failure_detail(&self) -> Option<&FetchFailure> {
        match &self.outcome {
            FetchOutcome::Success { .. } => None,
            FetchOutcome::Failure { error } => Some(error),
        }
    }

    /// Decodes a successful payload into a typed record for rendering.
    pub fn decode<T: DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        self.payload()
            .map(|payload| serde_json::from_value(payload.clone()))
    }
}

/// Every result for one submission, in submission order.
#[derive(Debug, Clone, Serialize)]
pub struct FetchBatch {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    results: Vec<FetchResult>,
}

impl FetchBatch {
    pub(crate) fn new(
        started_at: DateTime<Utc>,
        elapsed: Duration,
        results: Vec<FetchResult>,
    ) -> Self {
        Self {
            started_at,
            elapsed_ms: duration_ms(elapsed),
            results,
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[FetchResult] {
        &self.results
    }

    pub fn iter(&self) -> impl Iterator<Item = &FetchResult> {
        self.results.iter()
    }

    pub fn get(&self, task_id: &TaskId) -> Option<&FetchResult> {
        self.results.iter().find(|result| &result.task_id == task_id)
    }

    pub fn successes(&self) -> impl Iterator<Item = &FetchResult> {
        self.results.iter().filter(|result| result.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &FetchResult> {
        self.results.iter().filter(|result| !result.is_success())
    }

    pub fn into_results(self) -> Vec<FetchResult> {
        self.results
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|code| format!(" ({code})")).unwrap_or_default()
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
