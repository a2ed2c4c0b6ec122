use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::HistoryError;
use crate::signal::Action;

use super::{ActionTrace, HistoryStorage};

#[derive(Clone, Debug)]
struct Record {
    trace: ActionTrace,
    successful: Option<bool>,
    required_time: Option<Duration>,
}

/// Keeps every run in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryHistoryStorage {
    records: RwLock<Vec<Record>>,
}

impl MemoryHistoryStorage {
    /// An empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStorage for MemoryHistoryStorage {
    fn record_new_trace(&self, trace: ActionTrace) -> usize {
        let mut records = self.records.write();
        records.push(Record {
            trace,
            successful: None,
            required_time: None,
        });
        let id = records.len() - 1;
        debug!(id, "trace recorded");
        id
    }

    fn record_result(&self, successful: bool, required_time: Duration) -> Result<(), HistoryError> {
        let mut records = self.records.write();
        let last = records.last_mut().ok_or(HistoryError::NoTrace)?;
        last.successful = Some(successful);
        last.required_time = Some(required_time);
        Ok(())
    }

    fn nr_stored_histories(&self) -> usize {
        self.records.read().len()
    }

    fn get_stored_history(&self, id: usize) -> Result<ActionTrace, HistoryError> {
        self.records
            .read()
            .get(id)
            .map(|r| r.trace.clone())
            .ok_or(HistoryError::NotFound { id })
    }

    fn is_successful(&self, id: usize) -> Result<Option<bool>, HistoryError> {
        self.records
            .read()
            .get(id)
            .map(|r| r.successful)
            .ok_or(HistoryError::NotFound { id })
    }

    fn required_time(&self, id: usize) -> Result<Option<Duration>, HistoryError> {
        self.records
            .read()
            .get(id)
            .map(|r| r.required_time)
            .ok_or(HistoryError::NotFound { id })
    }

    fn search(&self, prefix: &[Action]) -> Vec<usize> {
        self.records
            .read()
            .iter()
            .enumerate()
            .filter(|(_, r)| r.trace.starts_with(prefix))
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Event;
    use std::sync::Arc;

    fn trace_of(events: &[Event]) -> ActionTrace {
        events
            .iter()
            .map(|e| Arc::new(e.clone()).default_action())
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_record_and_query() {
        let storage = MemoryHistoryStorage::new();
        assert_eq!(storage.record_result(true, Duration::ZERO), Err(HistoryError::NoTrace));

        let ev = Event::log("n1", "hi");
        let id = storage.record_new_trace(trace_of(&[ev]));
        assert_eq!(id, 0);
        assert_eq!(storage.is_successful(id).unwrap(), None);

        storage
            .record_result(false, Duration::from_secs(3))
            .unwrap();
        assert_eq!(storage.nr_stored_histories(), 1);
        assert_eq!(storage.is_successful(id).unwrap(), Some(false));
        assert_eq!(storage.required_time(id).unwrap(), Some(Duration::from_secs(3)));
        assert_eq!(storage.get_stored_history(id).unwrap().len(), 1);
        assert_eq!(
            storage.get_stored_history(7).unwrap_err().as_label(),
            "history_not_found"
        );
    }

    #[test]
    fn test_search_by_prefix() {
        let storage = MemoryHistoryStorage::new();
        let a = Event::log("n1", "a");
        let b = Event::log("n2", "b");
        let c = Event::log("n3", "c");
        storage.record_new_trace(trace_of(&[a.clone(), b.clone()]));
        storage.record_new_trace(trace_of(&[a.clone(), c.clone()]));
        storage.record_new_trace(trace_of(&[b.clone()]));

        let prefix = trace_of(&[a.clone()]);
        assert_eq!(storage.search(prefix.actions()), vec![0, 1]);

        let prefix = trace_of(&[a, c]);
        assert_eq!(storage.search(prefix.actions()), vec![1]);
        assert_eq!(storage.search(&[]), vec![0, 1, 2]);
    }
}
