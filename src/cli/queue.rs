//! Queue command: manage the list of courses to download.

use super::{Cli, CliError};
use crate::progress::CourseQueue;
use clap::Subcommand;

/// Queue subcommands
#[derive(Subcommand, Debug)]
pub enum QueueCommand {
    /// Add a course URL to the queue
    Add {
        /// Course URL (must point at the platform's lesson listing)
        url: String,
    },
    /// Remove a course URL from the queue
    Remove {
        /// Course URL to remove
        url: String,
    },
    /// List queued course URLs
    List,
    /// Remove every queued URL
    Clear,
}

impl QueueCommand {
    /// Execute the queue command.
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let mut queue = CourseQueue::load(&cli.queue_file);
        match self {
            QueueCommand::Add { url } => {
                queue.add(url)?;
                println!("Added. Queue now holds {} course(s).", queue.len());
            }
            QueueCommand::Remove { url } => {
                queue.remove(url)?;
                println!("Removed. Queue now holds {} course(s).", queue.len());
            }
            QueueCommand::List => {
                if queue.is_empty() {
                    println!("Queue is empty.");
                } else {
                    for (i, url) in queue.all().iter().enumerate() {
                        println!("{:3}. {url}", i + 1);
                    }
                }
            }
            QueueCommand::Clear => {
                queue.clear()?;
                println!("Queue cleared.");
            }
        }
        Ok(())
    }
}
