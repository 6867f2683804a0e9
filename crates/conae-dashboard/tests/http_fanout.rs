use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::routing::{get, post};
use axum::{Json, Router};
use conae_dashboard::config::FetchSettings;
use conae_dashboard::fetch::{
    ConcurrentFetcher, FetchFailure, FetchPlan, FetchTask, FetcherConfig, ReqwestTransport,
    TaskId,
};
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct UpstreamState {
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

async fn station(Path(id): Path<String>, uri: Uri) -> Json<Value> {
    Json(json!({ "station": id, "query": uri.query() }))
}

async fn broken() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable")
}

async fn not_json() -> &'static str {
    "<html>maintenance</html>"
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "late": true }))
}

async fn echo(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "echo": body }))
}

async fn tracked(State(state): State<UpstreamState>, Path(id): Path<String>) -> Json<Value> {
    let current = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    state.peak.fetch_max(current, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(30)).await;
    state.in_flight.fetch_sub(1, Ordering::SeqCst);
    Json(json!({ "id": id }))
}

async fn spawn_upstream() -> (String, UpstreamState) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream");
    let addr = listener.local_addr().expect("upstream addr");
    let state = UpstreamState::default();

    let app = Router::new()
        .route("/stations/:id", get(station))
        .route("/broken", get(broken))
        .route("/not-json", get(not_json))
        .route("/slow", get(slow))
        .route("/echo", post(echo))
        .route("/tracked/:id", get(tracked))
        .with_state(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("upstream serves");
    });

    (format!("http://{addr}"), state)
}

fn fetcher(config: FetcherConfig) -> ConcurrentFetcher<ReqwestTransport> {
    let transport =
        ReqwestTransport::from_settings(&FetchSettings::default()).expect("client builds");
    ConcurrentFetcher::new(Arc::new(transport), config)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mixed_upstream_outcomes_are_captured_per_task() {
    let (base, _) = spawn_upstream().await;
    let tasks = vec![
        FetchTask::get("cba", format!("{base}/stations/cba")).with_query("window", "24h"),
        FetchTask::get("broken", format!("{base}/broken")),
        FetchTask::get("html", format!("{base}/not-json")),
        FetchTask::post("echo", format!("{base}/echo"), json!({ "mission": "SAOCOM" })),
    ];

    let batch = fetcher(FetcherConfig::default())
        .fetch_all(tasks)
        .await
        .expect("batch runs");

    assert_eq!(batch.len(), 4);

    let station = batch.get(&TaskId::from("cba")).expect("station result");
    assert_eq!(
        station.payload(),
        Some(&json!({ "station": "cba", "query": "window=24h" }))
    );

    let broken = batch
        .get(&TaskId::from("broken"))
        .and_then(|result| result.failure_detail())
        .expect("broken endpoint fails");
    assert_eq!(
        broken,
        &FetchFailure::BadResponse {
            status: Some(500),
            message: "database unavailable".to_string(),
        }
    );

    let html = batch
        .get(&TaskId::from("html"))
        .and_then(|result| result.failure_detail())
        .expect("non-json payload fails");
    assert_eq!(html.kind_label(), "bad_response");
    assert_eq!(html.http_status(), None);

    let echo = batch.get(&TaskId::from("echo")).expect("echo result");
    assert_eq!(
        echo.payload(),
        Some(&json!({ "echo": { "mission": "SAOCOM" } }))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_upstream_times_out_and_call_returns_promptly() {
    let (base, _) = spawn_upstream().await;
    let config = FetcherConfig {
        request_timeout: Duration::from_millis(200),
        ..FetcherConfig::default()
    };
    let tasks = vec![
        FetchTask::get("slow", format!("{base}/slow")),
        FetchTask::get("usu", format!("{base}/stations/usu")),
    ];

    let started = Instant::now();
    let batch = fetcher(config).fetch_all(tasks).await.expect("batch runs");

    assert!(started.elapsed() < Duration::from_secs(3));
    let slow = batch.get(&TaskId::from("slow")).expect("slow result");
    assert_eq!(
        slow.failure_detail(),
        Some(&FetchFailure::Timeout { after_ms: 200 })
    );
    assert!(batch
        .get(&TaskId::from("usu"))
        .expect("usu result")
        .is_success());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn upstream_never_sees_more_than_the_worker_bound() {
    let (base, upstream) = spawn_upstream().await;
    let ids: Vec<String> = (0..12).map(|index| format!("site-{index}")).collect();
    let plan = FetchPlan::from_template(format!("{base}/tracked/{{id}}"), ids)
        .expect("template valid");
    let config = FetcherConfig {
        max_concurrency: 3,
        ..FetcherConfig::default()
    };

    let batch = fetcher(config)
        .fetch_all(plan.tasks())
        .await
        .expect("batch runs");

    assert_eq!(batch.successes().count(), 12);
    let peak = upstream.peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "peak in-flight was {peak}");
}

#[tokio::test]
async fn refused_connection_is_a_request_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe");
    let addr = listener.local_addr().expect("probe addr");
    drop(listener);

    let batch = fetcher(FetcherConfig::default())
        .fetch_all(vec![FetchTask::get("gone", format!("http://{addr}/stations/x"))])
        .await
        .expect("batch runs");

    let failure = batch.results()[0]
        .failure_detail()
        .expect("connection refused");
    assert_eq!(failure.kind_label(), "request_failure");
}
