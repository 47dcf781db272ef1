//! Durable run state: the completion ledger and the pending course queue.
//!
//! Both files live next to the binary and survive crashes; the ledger is the
//! source of truth for what never needs downloading again.

mod ledger;
mod queue;

pub use ledger::{LedgerError, LedgerStats, ProgressLedger};
pub use queue::{CourseQueue, QueueError};
