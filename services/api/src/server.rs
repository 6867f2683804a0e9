use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use conae_dashboard::config::AppConfig;
use conae_dashboard::error::AppError;
use conae_dashboard::fetch::{ConcurrentFetcher, ReqwestTransport};
use conae_dashboard::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(max_concurrency) = args.max_concurrency.take() {
        config.fetch.max_concurrency = max_concurrency;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let transport = Arc::new(ReqwestTransport::from_settings(&config.fetch)?);
    let fetcher_config = config.fetch.fetcher_config();
    let fetcher = Arc::new(ConcurrentFetcher::new(transport, fetcher_config.clone()));

    let app = with_service_routes(fetcher)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        max_concurrency = fetcher_config.max_concurrency,
        request_timeout_ms = config.fetch.request_timeout_ms,
        "dashboard data service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
