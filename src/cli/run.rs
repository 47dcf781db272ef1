//! Run command: download every queued course.

use super::{Cli, CliError};
use crate::cancel::CancelToken;
use crate::config::{DownloadConfig, VariantSelection};
use crate::discovery::ManifestDiscovery;
use crate::events::{EventConsumer, ProgressEvent};
use crate::orchestrator::Orchestrator;
use crate::progress::{CourseQueue, ProgressLedger};
use crate::Resolution;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Course manifest file (JSON export of the course tree with resolved
    /// download URLs)
    #[arg(long)]
    pub manifest: PathBuf,

    /// Override the preferred video resolution (720p, 480p, 360p)
    #[arg(long)]
    pub resolution: Option<String>,

    /// Override document renditions (simplified, original, annotated, all)
    #[arg(long)]
    pub variants: Option<String>,

    /// Also fetch companion materials alongside documents
    #[arg(long, default_value_t = false)]
    pub extras_with_documents: bool,

    /// Skip companion materials for videos
    #[arg(long, default_value_t = false)]
    pub no_video_extras: bool,
}

impl RunArgs {
    /// Execute the run command.
    pub async fn execute(&self, cli: &Cli, cancel: CancelToken) -> Result<(), CliError> {
        let mut config = DownloadConfig::load_or_default(&cli.config);
        self.apply_overrides(&mut config)?;
        config.validate()?;

        let queue = CourseQueue::load(&cli.queue_file);
        if queue.is_empty() {
            warn!("Course queue is empty; add courses with `queue add <url>`");
            return Ok(());
        }

        let ledger = ProgressLedger::load(&cli.progress_file);
        let stats = ledger.stats();
        info!(
            courses = queue.len(),
            already_completed = stats.completed,
            "Starting run"
        );

        let discovery = Arc::new(ManifestDiscovery::from_file(&self.manifest)?);
        let mut orchestrator = Orchestrator::new(config, discovery, ledger, cancel)?;
        let consumer = orchestrator.take_events();
        orchestrator.on_course_progress(|fraction| {
            info!(
                percent = (fraction * 100.0).round() as u32,
                "Course queue progress"
            );
        });

        let run = tokio::spawn(orchestrator.start(queue.all()));
        if let Some(consumer) = consumer {
            render_progress(consumer, || run.is_finished()).await;
        }

        let report = run
            .await
            .map_err(|e| CliError::Internal(e.to_string()))??;
        println!("Run finished: {report}");
        Ok(())
    }

    fn apply_overrides(&self, config: &mut DownloadConfig) -> Result<(), CliError> {
        if let Some(res) = &self.resolution {
            config.resolution = res
                .parse::<Resolution>()
                .map_err(CliError::InvalidArgument)?;
        }
        if let Some(variants) = &self.variants {
            config.document_variants = VariantSelection::try_from(variants.clone())
                .map_err(CliError::InvalidArgument)?;
        }
        if self.extras_with_documents {
            config.extras_with_documents = true;
        }
        if self.no_video_extras {
            config.extras_with_videos = false;
        }
        Ok(())
    }
}

/// Drive an indicatif bar from the progress bus until the run finishes.
async fn render_progress(mut consumer: EventConsumer, finished: impl Fn() -> bool) {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .expect("hardcoded template is valid")
            .progress_chars("#>-"),
    );

    loop {
        let was_finished = finished();
        for event in consumer.poll() {
            render_event(&pb, event);
        }
        // One extra drain after the run ends so the tail is not lost
        if was_finished {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    pb.finish_and_clear();
}

fn render_event(pb: &ProgressBar, event: ProgressEvent) {
    match event {
        ProgressEvent::CourseStarted { title } => {
            pb.println(format!("Course: {title}"));
        }
        ProgressEvent::CourseFinished { title, succeeded } => {
            let status = if succeeded { "done" } else { "failed" };
            pb.println(format!("Course {status}: {title}"));
        }
        ProgressEvent::ItemStarted { name, .. } => {
            pb.set_position(0);
            pb.set_length(0);
            pb.set_message(name);
        }
        ProgressEvent::ItemProgress {
            downloaded, total, ..
        } => {
            if let Some(total) = total {
                pb.set_length(total);
            }
            pb.set_position(downloaded);
        }
        ProgressEvent::ItemCompleted { .. } => {}
        ProgressEvent::ItemSkipped { .. } => {}
        ProgressEvent::ItemFailed { id, reason } => {
            pb.println(format!("Failed: {id}: {reason}"));
        }
        ProgressEvent::DropSummary { dropped } => {
            pb.println(format!("(progress display fell behind, {dropped} events dropped)"));
        }
    }
}
