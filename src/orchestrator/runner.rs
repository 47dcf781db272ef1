//! Course traversal and job execution.

use crate::cancel::CancelToken;
use crate::config::{ConfigError, DownloadConfig};
use crate::discovery::{
    CourseDiscovery, CourseInfo, DiscoveryError, LessonHandle, ResolveTarget,
};
use crate::events::{self, EventConsumer, EventPublisher, ProgressEvent};
use crate::fetch::{ConcurrencyGate, FetchEngine, FetchError, FetchOutcome, FetchRequest};
use crate::metrics::{RunMetrics, RunReport};
use crate::naming;
use crate::orchestrator::job::{plan_jobs, DownloadJob};
use crate::progress::{LedgerError, ProgressLedger};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

/// Top-level run failures.
///
/// Item-level faults are isolated and counted; this enum is for failures
/// that stop a course or the whole run.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// A queued course URL could not be parsed
    #[error("invalid course URL: {0}")]
    InvalidUrl(String),

    /// The run was cancelled
    #[error("run cancelled")]
    Cancelled,

    /// Configuration failed validation
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Discovery failed at the course level
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// The progress ledger could not be persisted
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The fetch engine could not be constructed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Local filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-course tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CourseOutcome {
    /// Items downloaded and verified
    pub ok: u64,
    /// Items that failed after all retries
    pub failed: u64,
    /// Items already in the ledger
    pub skipped: u64,
}

impl CourseOutcome {
    /// Lenient success policy: a course counts as succeeded when at least
    /// one of its items is downloaded or was already complete.
    pub fn succeeded(&self) -> bool {
        self.ok + self.skipped >= 1
    }
}

type CourseProgressFn = Box<dyn FnMut(f64) + Send + Sync>;

/// Walks queued courses and runs their download jobs.
pub struct Orchestrator {
    config: DownloadConfig,
    discovery: Arc<dyn CourseDiscovery>,
    ledger: ProgressLedger,
    engine: FetchEngine,
    events: EventPublisher,
    consumer: Option<EventConsumer>,
    metrics: RunMetrics,
    cancel: CancelToken,
    on_course_done: Option<CourseProgressFn>,
}

impl Orchestrator {
    /// Build an orchestrator with the standard gate and a fresh event bus.
    pub fn new(
        config: DownloadConfig,
        discovery: Arc<dyn CourseDiscovery>,
        ledger: ProgressLedger,
        cancel: CancelToken,
    ) -> Result<Self, DownloadError> {
        let (events, consumer) = events::bus();
        let engine = FetchEngine::new(ConcurrencyGate::standard(), events.clone(), cancel.clone())?;
        Ok(Self {
            config,
            discovery,
            ledger,
            engine,
            events,
            consumer: Some(consumer),
            metrics: RunMetrics::new(),
            cancel,
            on_course_done: None,
        })
    }

    /// Register a callback invoked with the completed fraction (queue entries
    /// processed / queue length) after each fully processed course.
    pub fn on_course_progress(&mut self, callback: impl FnMut(f64) + Send + Sync + 'static) {
        self.on_course_done = Some(Box::new(callback));
    }

    /// Take the consuming half of the progress bus. UIs poll it while
    /// [`start`](Self::start) runs; the first caller gets it.
    pub fn take_events(&mut self) -> Option<EventConsumer> {
        self.consumer.take()
    }

    /// Handle to the run counters, for progress displays.
    pub fn metrics(&self) -> RunMetrics {
        self.metrics.clone()
    }

    /// Process every queued course and return the final report.
    ///
    /// A failing course is logged and the run moves on; only cancellation
    /// stops the walk early, and even that still yields a report.
    pub async fn start(mut self, urls: Vec<String>) -> Result<RunReport, DownloadError> {
        self.config.validate()?;

        if urls.is_empty() {
            warn!("Course queue is empty, nothing to do");
            return Ok(self.metrics.report());
        }

        info!(courses = urls.len(), "Starting download run");
        let total = urls.len();
        for (done, raw_url) in urls.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!("Cancellation requested, stopping course walk");
                break;
            }

            let url = match Url::parse(raw_url) {
                Ok(url) => url,
                Err(e) => {
                    error!(url = %raw_url, error = %e, "Skipping unparsable course URL");
                    self.metrics.record_course(false);
                    self.report_course_done(done + 1, total);
                    continue;
                }
            };

            match self.process_course(&url).await {
                Ok(outcome) => {
                    info!(
                        course = %url,
                        ok = outcome.ok,
                        failed = outcome.failed,
                        skipped = outcome.skipped,
                        succeeded = outcome.succeeded(),
                        "Course finished"
                    );
                    self.metrics.record_course(outcome.succeeded());
                }
                Err(DownloadError::Cancelled) => {
                    info!(course = %url, "Course interrupted by cancellation");
                    break;
                }
                Err(e) => {
                    // Course isolation: the rest of the queue still runs
                    error!(course = %url, error = %e, "Course failed");
                    self.metrics.record_course(false);
                }
            }
            self.report_course_done(done + 1, total);
        }

        let report = self.metrics.report();
        info!(%report, "Run complete");
        Ok(report)
    }

    fn report_course_done(&mut self, done: usize, total: usize) {
        if let Some(callback) = self.on_course_done.as_mut() {
            callback(done as f64 / total as f64);
        }
    }

    async fn process_course(&mut self, url: &Url) -> Result<CourseOutcome, DownloadError> {
        let course = self.discovery.open_course(url).await?;
        self.events.publish(ProgressEvent::CourseStarted {
            title: course.title.clone(),
        });

        let subject = naming::subject_name(&course.title);
        let lessons = self.discovery.lessons(&course).await?;
        info!(course = %course.title, subject, lessons = lessons.len(), "Course opened");

        let mut outcome = CourseOutcome::default();
        let mut cancelled = false;
        for lesson in &lessons {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            match self.process_lesson(&course, lesson, &subject, &mut outcome).await {
                Ok(()) => {}
                Err(DownloadError::Cancelled) => {
                    cancelled = true;
                    break;
                }
                Err(e) => {
                    // Lesson isolation: log and move to the next lesson
                    warn!(
                        course = %course.title,
                        lesson = %lesson.title,
                        error = %e,
                        "Lesson failed"
                    );
                }
            }
        }

        self.events.publish(ProgressEvent::CourseFinished {
            title: course.title.clone(),
            succeeded: outcome.succeeded(),
        });

        if cancelled {
            return Err(DownloadError::Cancelled);
        }
        Ok(outcome)
    }

    async fn process_lesson(
        &mut self,
        course: &CourseInfo,
        lesson: &LessonHandle,
        subject: &str,
        outcome: &mut CourseOutcome,
    ) -> Result<(), DownloadError> {
        self.discovery.activate_lesson(lesson).await?;
        let items = self.discovery.items(lesson).await?;

        let lesson_dir = naming::sanitize_component(&lesson.title);
        let document_dir = self.config.document_dir.join(subject).join(&lesson_dir);
        let video_dir = self.config.video_dir.join(subject).join(&lesson_dir);

        // Fetches overlap through the gate, but the ledger is only touched
        // here, on this task, as completions are reaped
        let mut tasks: JoinSet<(DownloadJob, Result<FetchOutcome, FetchError>)> = JoinSet::new();

        // A ledger failure is held until every spawned task has been reaped;
        // aborting the set would kill fetches mid-write and strand temp files
        let mut deferred: Option<DownloadError> = None;
        let mut cancelled = false;
        'items: for item in &items {
            for job in plan_jobs(item, &self.config, &document_dir, &video_dir) {
                if self.cancel.is_cancelled() {
                    cancelled = true;
                    break 'items;
                }
                if deferred.is_some() {
                    break 'items;
                }

                if self.ledger.is_completed(&job.item_id) {
                    self.metrics.record_skip();
                    self.events.publish(ProgressEvent::ItemSkipped {
                        id: job.item_id.clone(),
                    });
                    outcome.skipped += 1;
                    continue;
                }

                // Resolution happens sequentially in discovery order; only
                // the byte transfer itself runs concurrently
                let url = match self.resolve_job(&job).await {
                    Ok(url) => url,
                    Err(e @ (DiscoveryError::NotFound(_) | DiscoveryError::Unavailable(_))) => {
                        // The platform simply does not offer this piece;
                        // move on without counting a failure
                        debug!(item = %job.item_id, reason = %e, "Item not offered, skipping");
                        continue;
                    }
                    Err(e) => {
                        warn!(item = %job.item_id, error = %e, "Could not resolve item");
                        self.record_job_failure(&job, &e.to_string(), outcome);
                        continue;
                    }
                };

                let engine = self.engine.clone();
                let request = FetchRequest {
                    item_id: job.item_id.clone(),
                    display_name: job.display_name.clone(),
                    url,
                    dest: job.dest.clone(),
                    kind: job.kind,
                };
                tasks.spawn(async move {
                    let result = engine.fetch(&request).await;
                    (job, result)
                });

                // Reap whatever already finished so ledger marks land early
                while let Some(done) = tasks.try_join_next() {
                    if let Err(e) = self.apply_completion(done, outcome) {
                        deferred.get_or_insert(e);
                    }
                }
            }
        }

        while let Some(done) = tasks.join_next().await {
            if let Err(e) = self.apply_completion(done, outcome) {
                deferred.get_or_insert(e);
            }
        }

        if cancelled {
            return Err(DownloadError::Cancelled);
        }
        if let Some(e) = deferred {
            return Err(e);
        }
        info!(
            course = %course.title,
            lesson = %lesson.title,
            ok = outcome.ok,
            "Lesson processed"
        );
        Ok(())
    }

    /// Resolve a job's download URL, walking the resolution fallback chain
    /// for videos.
    async fn resolve_job(&self, job: &DownloadJob) -> Result<Url, DiscoveryError> {
        match job.target {
            ResolveTarget::Video { resolution } => {
                let mut last = DiscoveryError::Unavailable(format!(
                    "no resolution available for {}",
                    job.item_id
                ));
                for candidate in resolution.fallback_order() {
                    let target = ResolveTarget::Video {
                        resolution: candidate,
                    };
                    match self.discovery.resolve(&job.item, target).await {
                        Ok(url) => {
                            if candidate != resolution {
                                info!(
                                    item = %job.item_id,
                                    wanted = %resolution,
                                    got = %candidate,
                                    "Preferred resolution unavailable, using fallback"
                                );
                            }
                            return Ok(url);
                        }
                        Err(e @ (DiscoveryError::Unavailable(_) | DiscoveryError::NotFound(_))) => {
                            last = e;
                        }
                        Err(e) => return Err(e),
                    }
                }
                Err(last)
            }
            target => self.discovery.resolve(&job.item, target).await,
        }
    }

    fn apply_completion(
        &mut self,
        done: Result<(DownloadJob, Result<FetchOutcome, FetchError>), tokio::task::JoinError>,
        outcome: &mut CourseOutcome,
    ) -> Result<(), DownloadError> {
        let (job, result) = match done {
            Ok(done) => done,
            Err(e) => {
                error!(error = %e, "Download task panicked");
                self.metrics.record_failure();
                outcome.failed += 1;
                return Ok(());
            }
        };

        match result {
            Ok(fetch) => {
                // Mark only after the artifact is verified and in place
                self.ledger.mark_completed(&job.item_id)?;
                self.metrics.record_download(fetch.bytes);
                self.events.publish(ProgressEvent::ItemCompleted {
                    id: job.item_id.clone(),
                    bytes: fetch.bytes,
                });
                outcome.ok += 1;
            }
            Err(FetchError::Cancelled) => {
                // Not a failure; the item simply runs again next time
            }
            Err(e) => {
                self.record_job_failure(&job, &e.to_string(), outcome);
            }
        }
        Ok(())
    }

    fn record_job_failure(&self, job: &DownloadJob, reason: &str, outcome: &mut CourseOutcome) {
        self.metrics.record_failure();
        self.events.publish(ProgressEvent::ItemFailed {
            id: job.item_id.clone(),
            reason: reason.to_string(),
        });
        outcome.failed += 1;
    }
}
