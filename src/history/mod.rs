//! # History: traces of previous runs.
//!
//! The orchestrator writes one [`ActionTrace`] per run at shutdown; policies
//! may read earlier runs through [`HistoryStorage`] to steer exploration.
//!
//! ```text
//! Orchestrator::shutdown ─► record_new_trace(trace) ─► id
//! external oracle        ─► record_result(ok, elapsed)    (applies to the latest trace)
//! policy                 ─► search(prefix) / get_stored_history(id)
//! ```

mod memory;
mod trace;

use std::time::Duration;

use crate::error::HistoryError;
use crate::signal::Action;

pub use memory::MemoryHistoryStorage;
pub use trace::ActionTrace;

/// Storage of past runs.
pub trait HistoryStorage: Send + Sync + 'static {
    /// Appends a trace and returns its id.
    fn record_new_trace(&self, trace: ActionTrace) -> usize;

    /// Marks the most recent trace as passed or failed.
    fn record_result(&self, successful: bool, required_time: Duration) -> Result<(), HistoryError>;

    /// Number of stored traces.
    fn nr_stored_histories(&self) -> usize;

    /// The trace stored under `id`.
    fn get_stored_history(&self, id: usize) -> Result<ActionTrace, HistoryError>;

    /// Outcome of run `id`; `None` until a result is recorded.
    fn is_successful(&self, id: usize) -> Result<Option<bool>, HistoryError>;

    /// Wall time of run `id`; `None` until a result is recorded.
    fn required_time(&self, id: usize) -> Result<Option<Duration>, HistoryError>;

    /// Ids of traces whose first actions match `prefix`.
    fn search(&self, prefix: &[Action]) -> Vec<usize>;
}
