use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::response::Response;
use serde_json::{json, Value};

use crate::fetch::{
    ConcurrentFetcher, FetchFailure, FetchTask, FetchTransport, FetcherConfig,
};

#[derive(Debug, Clone)]
pub(super) enum Behavior {
    Respond(Value),
    Fail(FetchFailure),
    Hang,
    Panic,
}

/// Fake upstream keyed by task id that records how many calls overlap.
#[derive(Debug, Default)]
pub(super) struct ScriptedTransport {
    behaviors: HashMap<String, Behavior>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedTransport {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn with(mut self, task_id: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(task_id.to_string(), behavior);
        self
    }

    pub(super) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(super) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FetchTransport for ScriptedTransport {
    async fn execute(&self, task: &FetchTask) -> Result<Value, FetchFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        let _in_flight = InFlight(&self.in_flight);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let behavior = self
            .behaviors
            .get(task.id().as_str())
            .cloned()
            .unwrap_or_else(|| Behavior::Respond(default_payload(task)));

        match behavior {
            Behavior::Respond(payload) => Ok(payload),
            Behavior::Fail(failure) => Err(failure),
            Behavior::Hang => std::future::pending().await,
            Behavior::Panic => panic!("scripted transport panic for {}", task.id()),
        }
    }
}

pub(super) fn default_payload(task: &FetchTask) -> Value {
    json!({ "entity": task.id().as_str(), "value": 1 })
}

pub(super) fn entity_tasks(count: usize) -> Vec<FetchTask> {
    (0..count)
        .map(|index| {
            FetchTask::get(
                format!("entity-{index}"),
                format!("https://dashboard.example.test/entities/{index}"),
            )
        })
        .collect()
}

pub(super) fn fast_config() -> FetcherConfig {
    FetcherConfig {
        max_concurrency: 4,
        request_timeout: Duration::from_millis(500),
        batch_timeout: Duration::from_secs(5),
    }
}

pub(super) fn build_fetcher(
    transport: ScriptedTransport,
    config: FetcherConfig,
) -> (ConcurrentFetcher<ScriptedTransport>, Arc<ScriptedTransport>) {
    let transport = Arc::new(transport);
    let fetcher = ConcurrentFetcher::new(transport.clone(), config);
    (fetcher, transport)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
