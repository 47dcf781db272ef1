//! Main entry point for the course-downloader CLI

use clap::Parser;
use course_downloader::cli::{Cli, Commands};
use course_downloader::CancelToken;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    // Check if JSON output is requested via environment variable
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("course_downloader=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    // Ctrl+C requests cooperative cancellation; in-flight items abort
    // cleanly and the ledger keeps everything already completed
    let cancel = CancelToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - stopping after in-flight downloads...");
                cancel.cancel();
            }
        }
    });

    if let Some(addr) = cli.metrics_addr {
        if let Err(e) = course_downloader::metrics::init_metrics(addr).await {
            error!("Failed to initialize metrics exporter: {e}");
            std::process::exit(1);
        }
    }

    let result = match cli.command {
        Commands::Run(ref args) => args.execute(&cli, cancel.clone()).await,
        Commands::Queue { ref command } => command.execute(&cli),
        Commands::Progress { ref command } => command.execute(&cli),
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
