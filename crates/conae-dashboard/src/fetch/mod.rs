//! Concurrent multi-endpoint retrieval for dashboard render cycles.
//!
//! A caller builds a set of [`FetchTask`]s (by hand or from a [`FetchPlan`]), hands them to
//! a [`ConcurrentFetcher`], and receives a [`FetchBatch`] holding exactly one
//! [`FetchResult`] per task. Per-task failures live inside the batch; only malformed input
//! fails the call.

mod fetcher;
pub mod plan;
pub mod report;
mod result;
pub mod router;
mod task;
mod transport;

#[cfg(test)]
mod tests;

pub use fetcher::{ConcurrentFetcher, FetchError, FetcherConfig};
pub use plan::{FetchPlan, PlanError};
pub use report::{write_csv, BatchRowView, BatchSummary, RowStatus};
pub use result::{FetchBatch, FetchFailure, FetchOutcome, FetchResult};
pub use router::{fetch_router, BatchRequest, BatchResponse};
pub use task::{FetchTask, FetchTaskSpec, HttpMethod, TaskId};
pub use transport::{FetchTransport, ReqwestTransport, TransportBuildError};
