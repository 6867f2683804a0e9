use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::{extract::State, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fetcher::{ConcurrentFetcher, FetchError};
use super::report::{BatchRowView, BatchSummary};
use super::result::FetchResult;
use super::task::{FetchTask, FetchTaskSpec};
use super::transport::FetchTransport;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub tasks: Vec<FetchTaskSpec>,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub started_at: DateTime<Utc>,
    pub summary: BatchSummary,
    pub rows: Vec<BatchRowView>,
    pub results: Vec<FetchResult>,
}

/// Router builder exposing the batch fetch endpoint.
pub fn fetch_router<T>(fetcher: Arc<ConcurrentFetcher<T>>) -> Router
where
    T: FetchTransport,
{
    Router::new()
        .route("/api/v1/fetch/batch", post(batch_handler::<T>))
        .with_state(fetcher)
}

pub(crate) async fn batch_handler<T>(
    State(fetcher): State<Arc<ConcurrentFetcher<T>>>,
    request: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, AppError>
where
    T: FetchTransport,
{
    // Malformed task entries are input errors, not extractor rejections.
    let Json(request) =
        request.map_err(|rejection| FetchError::InvalidInput(rejection.body_text()))?;
    let tasks: Vec<FetchTask> = request.tasks.into_iter().map(FetchTask::from).collect();
    let batch = fetcher.fetch_all(tasks).await?;

    Ok(Json(BatchResponse {
        started_at: batch.started_at,
        summary: batch.summary(),
        rows: batch.rows(),
        results: batch.into_results(),
    }))
}
