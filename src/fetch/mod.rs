//! Resilient artifact fetching.
//!
//! The engine streams one URL to one destination path with retries,
//! verification and an atomic rename; the gate bounds how many of those run
//! at once.

mod engine;
mod gate;
mod verify;

pub use engine::{FetchEngine, FetchError, FetchOutcome, FetchRequest};
pub use gate::{ConcurrencyGate, GateError, GatePermit};
pub use verify::{verify_artifact, VerifyError};
