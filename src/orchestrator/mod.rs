//! Download orchestration.
//!
//! The orchestrator walks course → lesson → item through the discovery
//! adapter, plans one job per artifact, and runs jobs through the fetch
//! engine with failure isolation at every level: a failed item never sinks
//! its lesson, a failed lesson never sinks its course, and a failed course
//! never sinks the run.

mod job;
mod runner;

pub use job::{plan_jobs, DownloadJob};
pub use runner::{CourseOutcome, DownloadError, Orchestrator};
