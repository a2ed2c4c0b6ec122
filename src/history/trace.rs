//! Ordered record of the actions of one run.

use serde_json::Value;

use crate::signal::Action;

/// Append-only during a run; frozen once handed out at shutdown.
#[derive(Clone, Debug, Default)]
pub struct ActionTrace {
    actions: Vec<Action>,
}

impl ActionTrace {
    /// An empty trace.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    /// Actions in the order they were handled.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// True if the first actions of `self` match `prefix` (ids ignored).
    pub fn starts_with(&self, prefix: &[Action]) -> bool {
        prefix.len() <= self.actions.len()
            && prefix
                .iter()
                .zip(&self.actions)
                .all(|(want, have)| want.equals(have))
    }

    /// JSON array of signal maps.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.actions
                .iter()
                .map(|a| Value::Object(a.to_map()))
                .collect(),
        )
    }
}

impl From<Vec<Action>> for ActionTrace {
    fn from(actions: Vec<Action>) -> Self {
        Self { actions }
    }
}

impl IntoIterator for ActionTrace {
    type Item = Action;
    type IntoIter = std::vec::IntoIter<Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}
