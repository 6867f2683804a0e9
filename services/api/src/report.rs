use crate::infra::load_tasks;
use clap::builder::TypedValueParser;
use clap::Args;
use conae_dashboard::config::AppConfig;
use conae_dashboard::error::AppError;
use conae_dashboard::fetch::{
    write_csv, BatchRowView, BatchSummary, ConcurrentFetcher, FetchBatch, ReqwestTransport,
};
use conae_dashboard::telemetry;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct FetchArgs {
    /// JSON task file: a list of tasks, {"tasks": [...]}, or {"template", "ids"}
    #[arg(long)]
    pub(crate) tasks: PathBuf,
    /// Override the configured worker pool size
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize))]
    pub(crate) max_concurrency: Option<usize>,
    /// Override the per-request timeout in milliseconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) request_timeout_ms: Option<u64>,
    /// Emit CSV rows instead of the text report
    #[arg(long)]
    pub(crate) csv: bool,
}

pub(crate) async fn run_fetch_report(args: FetchArgs) -> Result<(), AppError> {
    let FetchArgs {
        tasks,
        max_concurrency,
        request_timeout_ms,
        csv,
    } = args;

    let mut config = AppConfig::load()?;
    if let Some(max_concurrency) = max_concurrency {
        config.fetch.max_concurrency = max_concurrency;
    }
    if let Some(timeout_ms) = request_timeout_ms {
        config.fetch.request_timeout_ms = timeout_ms;
    }

    telemetry::init(&config.telemetry)?;

    let tasks = load_tasks(&tasks)?;
    let transport = Arc::new(ReqwestTransport::from_settings(&config.fetch)?);
    let fetcher = ConcurrentFetcher::new(transport, config.fetch.fetcher_config());
    let batch = fetcher.fetch_all(tasks).await?;

    if csv {
        write_csv(&batch, std::io::stdout().lock())?;
    } else {
        print!("{}", render_batch_report(&batch));
    }

    Ok(())
}

fn render_batch_report(batch: &FetchBatch) -> String {
    let summary = batch.summary();
    let rows = batch.rows();
    let mut out = String::new();

    out.push_str("Dashboard fetch batch\n");
    out.push_str(&format!(
        "Started {} | {} ms elapsed\n",
        batch.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        summary.elapsed_ms
    ));
    out.push_str(&summary_line(&summary));

    let id_width = id_column_width(&rows);

    out.push_str(&format!(
        "\n{:<id_width$} | {:<9} | {:>6} | {:>8} | Detail\n",
        "Task", "Status", "HTTP", "Latency"
    ));
    for row in &rows {
        out.push_str(&row_line(row, id_width));
    }

    out
}

fn id_column_width(rows: &[BatchRowView]) -> usize {
    rows.iter()
        .map(|row| row.task_id.as_str().chars().count())
        .max()
        .unwrap_or(0)
        .max("Task".len())
}

fn summary_line(summary: &BatchSummary) -> String {
    let mut line = format!(
        "{} tasks | {} ok | {} failed | {} timed out | {:.0}% success",
        summary.total,
        summary.succeeded,
        summary.failed,
        summary.timed_out,
        summary.success_rate * 100.0
    );
    if let (Some(task), Some(latency)) = (&summary.slowest_task, summary.max_latency_ms) {
        line.push_str(&format!(" | slowest {task} ({latency} ms)"));
    }
    line.push('\n');
    line
}

fn row_line(row: &BatchRowView, id_width: usize) -> String {
    let http = row
        .http_status
        .map(|code| code.to_string())
        .unwrap_or_else(|| "-".to_string());
    let latency = row
        .latency_ms
        .map(|ms| format!("{ms} ms"))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<id_width$} | {:<9} | {:>6} | {:>8} | {}\n",
        row.task_id.as_str(),
        row.status_label,
        http,
        latency,
        row.detail.as_deref().unwrap_or("")
    )
}
