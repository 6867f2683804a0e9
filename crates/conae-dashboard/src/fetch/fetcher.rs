use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::result::{FetchBatch, FetchFailure, FetchResult};
use super::task::{FetchTask, TaskId};
use super::transport::FetchTransport;

/// Worker pool limits for one fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetcherConfig {
    /// Upper bound on requests in flight at once. Zero is treated as one.
    pub max_concurrency: usize,
    /// Bound on a single request once it holds a worker slot.
    pub request_timeout: Duration,
    /// Bound on the whole batch, queueing included.
    pub batch_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            request_timeout: Duration::from_secs(10),
            batch_timeout: Duration::from_secs(60),
        }
    }
}

/// Call-level failure. Raised before any request is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("invalid fetch input: {0}")]
    InvalidInput(String),
}

/// Fans a task set out over a bounded worker pool and joins every outcome.
pub struct ConcurrentFetcher<T> {
    transport: Arc<T>,
    config: FetcherConfig,
}

impl<T> ConcurrentFetcher<T>
where
    T: FetchTransport,
{
    pub fn new(transport: Arc<T>, config: FetcherConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Runs every task and returns exactly one result per task, in submission order.
    ///
    /// Per-task failures are recorded in the batch. The call itself only fails when the
    /// task set is empty or a task cannot be dispatched at all.
    pub async fn fetch_all(&self, tasks: Vec<FetchTask>) -> Result<FetchBatch, FetchError> {
        validate_tasks(&tasks)?;

        let started_at = Utc::now();
        let clock = Instant::now();
        let deadline = clock + self.config.batch_timeout;
        let request_timeout = self.config.request_timeout;
        let batch_timeout = self.config.batch_timeout;
        let max_concurrency = self.config.max_concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(max_concurrency));

        info!(tasks = tasks.len(), max_concurrency, "dispatching fetch batch");

        let ids: Vec<TaskId> = tasks.iter().map(|task| task.id().clone()).collect();
        let mut slots: Vec<Option<FetchResult>> = vec![None; tasks.len()];
        let mut workers = JoinSet::new();

        for (index, task) in tasks.into_iter().enumerate() {
            let transport = Arc::clone(&self.transport);
            let semaphore = Arc::clone(&semaphore);
            workers.spawn(async move {
                let limits = (request_timeout, batch_timeout);
                let result = run_task(transport.as_ref(), &semaphore, &task, limits).await;
                (index, result)
            });
        }

        let mut deadline_hit = false;
        loop {
            match tokio::time::timeout_at(deadline, workers.join_next()).await {
                Ok(Some(Ok((index, result)))) => slots[index] = Some(result),
                Ok(Some(Err(err))) => {
                    warn!(error = %err, "fetch worker stopped without reporting");
                }
                Ok(None) => break,
                Err(_) => {
                    deadline_hit = true;
                    // Queued workers wake to a closed pool instead of issuing late requests.
                    semaphore.close();
                    workers.abort_all();
                    break;
                }
            }
        }

        if deadline_hit {
            // Aborted workers resolve promptly; keep anything that finished in the meantime.
            while let Some(joined) = workers.join_next().await {
                if let Ok((index, result)) = joined {
                    slots[index] = Some(result);
                }
            }
        }

        let results: Vec<FetchResult> = slots
            .into_iter()
            .zip(ids)
            .map(|(slot, task_id)| {
                slot.unwrap_or_else(|| {
                    let failure = if deadline_hit {
                        FetchFailure::timeout(batch_timeout)
                    } else {
                        FetchFailure::request("worker stopped before reporting a result")
                    };
                    warn!(%task_id, error = %failure, "fetch task has no result");
                    FetchResult::failure(task_id, failure, None)
                })
            })
            .collect();

        let batch = FetchBatch::new(started_at, clock.elapsed(), results);
        let succeeded = batch.successes().count();
        info!(
            total = batch.len(),
            succeeded,
            failed = batch.len() - succeeded,
            elapsed_ms = batch.elapsed_ms,
            deadline_hit,
            "fetch batch complete"
        );

        Ok(batch)
    }
}

/// Runs one task once a worker slot is free. A pool closed by the batch deadline reports
/// the task as timed out without contacting the upstream.
pub(super) async fn run_task<T>(
    transport: &T,
    semaphore: &Semaphore,
    task: &FetchTask,
    (request_timeout, batch_timeout): (Duration, Duration),
) -> FetchResult
where
    T: FetchTransport,
{
    let task_id = task.id().clone();
    let _permit = match semaphore.acquire().await {
        Ok(permit) => permit,
        Err(_) => {
            debug!(%task_id, "worker pool closed before the task started");
            return FetchResult::failure(task_id, FetchFailure::timeout(batch_timeout), None);
        }
    };

    let started = Instant::now();
    let outcome = tokio::time::timeout(request_timeout, transport.execute(task)).await;
    let latency = started.elapsed();

    match outcome {
        Ok(Ok(payload)) => {
            debug!(%task_id, latency_ms = latency.as_millis() as u64, "fetch task succeeded");
            FetchResult::success(task_id, payload, Some(latency))
        }
        Ok(Err(failure)) => {
            warn!(%task_id, error = %failure, endpoint = task.endpoint(), "fetch task failed");
            FetchResult::failure(task_id, failure, Some(latency))
        }
        Err(_) => {
            warn!(%task_id, endpoint = task.endpoint(), "fetch task timed out");
            FetchResult::failure(task_id, FetchFailure::timeout(request_timeout), Some(latency))
        }
    }
}

fn validate_tasks(tasks: &[FetchTask]) -> Result<(), FetchError> {
    if tasks.is_empty() {
        return Err(FetchError::InvalidInput("task set is empty".to_string()));
    }

    let mut seen = HashSet::with_capacity(tasks.len());
    for task in tasks {
        task.validate().map_err(FetchError::InvalidInput)?;
        if !seen.insert(task.id()) {
            return Err(FetchError::InvalidInput(format!(
                "duplicate task id '{}'",
                task.id()
            )));
        }
    }

    Ok(())
}
