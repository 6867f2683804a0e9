use crate::report::{run_fetch_report, FetchArgs};
use crate::server;
use clap::builder::TypedValueParser;
use clap::{Args, Parser, Subcommand};
use conae_dashboard::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "CONAE Dashboard Data Service",
    about = "Aggregate dashboard data from many REST endpoints concurrently",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run one fetch batch from a task file and print the results
    Fetch(FetchArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the configured worker pool size
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..).map(|n| n as usize))]
    pub(crate) max_concurrency: Option<usize>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Fetch(args) => run_fetch_report(args).await,
    }
}
