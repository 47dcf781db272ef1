//! Progress command: inspect or reset the completion ledger.

use super::{Cli, CliError};
use crate::progress::ProgressLedger;
use clap::Subcommand;

/// Progress subcommands
#[derive(Subcommand, Debug)]
pub enum ProgressCommand {
    /// Show ledger statistics
    Stats,
    /// Forget all completed items (everything downloads again)
    Clear,
}

impl ProgressCommand {
    /// Execute the progress command.
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let mut ledger = ProgressLedger::load(&cli.progress_file);
        match self {
            ProgressCommand::Stats => {
                let stats = ledger.stats();
                println!(
                    "{} item(s) tracked, {} completed",
                    stats.total_items, stats.completed
                );
            }
            ProgressCommand::Clear => {
                ledger.clear()?;
                println!("Progress cleared.");
            }
        }
        Ok(())
    }
}
