use std::io::Write;

use serde::Serialize;

use super::result::{FetchBatch, FetchOutcome, FetchResult};
use super::task::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Succeeded,
    Failed,
    TimedOut,
}

impl RowStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Succeeded => "OK",
            Self::Failed => "Failed",
            Self::TimedOut => "Timed out",
        }
    }

    fn of(result: &FetchResult) -> Self {
        match &result.outcome {
            FetchOutcome::Success { .. } => Self::Succeeded,
            FetchOutcome::Failure { error } if error.is_timeout() => Self::TimedOut,
            FetchOutcome::Failure { .. } => Self::Failed,
        }
    }
}

/// One table row per task; failed entries stay visible with their error detail.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRowView {
    pub task_id: TaskId,
    pub status: RowStatus,
    pub status_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub success_rate: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slowest_task: Option<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_latency_ms: Option<u64>,
    pub elapsed_ms: u64,
}

impl FetchBatch {
    pub fn rows(&self) -> Vec<BatchRowView> {
        self.iter()
            .map(|result| {
                let status = RowStatus::of(result);
                let failure = result.failure_detail();
                BatchRowView {
                    task_id: result.task_id.clone(),
                    status,
                    status_label: status.label(),
                    http_status: failure.and_then(|error| error.http_status()),
                    detail: failure.map(ToString::to_string),
                    latency_ms: result.latency_ms,
                }
            })
            .collect()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut succeeded = 0;
        let mut timed_out = 0;
        for result in self.iter() {
            match RowStatus::of(result) {
                RowStatus::Succeeded => succeeded += 1,
                RowStatus::TimedOut => timed_out += 1,
                RowStatus::Failed => {}
            }
        }

        let slowest = self
            .iter()
            .filter_map(|result| result.latency_ms.map(|latency| (latency, &result.task_id)))
            .max_by_key(|(latency, _)| *latency);

        let total = self.len();
        let success_rate = if total == 0 {
            0.0
        } else {
            succeeded as f32 / total as f32
        };

        BatchSummary {
            total,
            succeeded,
            failed: total - succeeded - timed_out,
            timed_out,
            success_rate,
            slowest_task: slowest.map(|(_, id)| id.clone()),
            max_latency_ms: slowest.map(|(latency, _)| latency),
            elapsed_ms: self.elapsed_ms,
        }
    }
}

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    task_id: &'a str,
    status: &'static str,
    http_status: Option<u16>,
    latency_ms: Option<u64>,
    detail: Option<&'a str>,
}

/// Writes `task_id,status,http_status,latency_ms,detail` rows for spreadsheet export.
pub fn write_csv<W: Write>(batch: &FetchBatch, writer: W) -> Result<(), csv::Error> {
    let rows = batch.rows();
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in &rows {
        csv_writer.serialize(CsvRow {
            task_id: row.task_id.as_str(),
            status: match row.status {
                RowStatus::Succeeded => "succeeded",
                RowStatus::Failed => "failed",
                RowStatus::TimedOut => "timed_out",
            },
            http_status: row.http_status,
            latency_ms: row.latency_ms,
            detail: row.detail.as_deref(),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}
