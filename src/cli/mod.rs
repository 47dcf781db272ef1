//! CLI command implementations

pub mod error;
pub mod progress;
pub mod queue;
pub mod run;

pub use error::CliError;
pub use progress::ProgressCommand;
pub use queue::QueueCommand;
pub use run::RunArgs;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Course Downloader CLI
#[derive(Parser, Debug)]
#[command(name = "course-downloader")]
#[command(about = "Resilient bulk downloader for course videos and documents", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file
    #[arg(long, global = true, default_value = "config.json")]
    pub config: PathBuf,

    /// Progress ledger file
    #[arg(long, global = true, default_value = "progress.json")]
    pub progress_file: PathBuf,

    /// Course queue file
    #[arg(long, global = true, default_value = "course-urls.json")]
    pub queue_file: PathBuf,

    /// Prometheus metrics listen address (e.g. 127.0.0.1:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download every queued course
    Run(RunArgs),

    /// Manage the course queue
    Queue {
        /// Queue operation
        #[command(subcommand)]
        command: QueueCommand,
    },

    /// Inspect or clear download progress
    Progress {
        /// Progress operation
        #[command(subcommand)]
        command: ProgressCommand,
    },
}
