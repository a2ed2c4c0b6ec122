use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::signal::{Action, Event};

/// Inspector-facing side of a transport.
///
/// `send_event` returns a receiver for deferred events only; it resolves
/// once, with the action answering that event. Actions for non-deferred
/// events (e.g. scheduling updates) are delivered through the
/// implementation's unsolicited channel, if any.
#[async_trait]
pub trait Transceiver: Send + Sync {
    /// Starts the background receive loop. Fails on a second call.
    async fn start(&self) -> Result<(), TransportError>;

    /// Reports an event to the orchestrator.
    async fn send_event(
        &self,
        event: Event,
    ) -> Result<Option<oneshot::Receiver<Action>>, TransportError>;
}

/// Event id → response slot, shared by the built-in transceivers.
///
/// Slots are inserted before the event leaves, so an action can never
/// arrive ahead of its slot.
pub(crate) struct PendingActions {
    waiting: Mutex<HashMap<String, oneshot::Sender<Action>>>,
    unsolicited_tx: mpsc::Sender<Action>,
    unsolicited_rx: Mutex<Option<mpsc::Receiver<Action>>>,
}

impl PendingActions {
    pub(crate) fn new(capacity: usize) -> Self {
        let (unsolicited_tx, unsolicited_rx) = mpsc::channel(capacity.max(1));
        Self {
            waiting: Mutex::new(HashMap::new()),
            unsolicited_tx,
            unsolicited_rx: Mutex::new(Some(unsolicited_rx)),
        }
    }

    /// Reserves a slot for a deferred event.
    pub(crate) fn expect(&self, event: &Event) -> Option<oneshot::Receiver<Action>> {
        if !event.deferred() {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        self.waiting.lock().insert(event.id().to_string(), tx);
        Some(rx)
    }

    /// Drops the slot of an event that could not be sent.
    pub(crate) fn forget(&self, event_id: &str) {
        self.waiting.lock().remove(event_id);
    }

    /// Hands `action` to its waiter, or to the unsolicited channel.
    pub(crate) fn resolve(&self, action: Action) {
        let slot = action
            .event_id()
            .and_then(|id| self.waiting.lock().remove(id));
        match slot {
            Some(tx) => {
                if tx.send(action).is_err() {
                    debug!("waiter for action is gone");
                }
            }
            None => {
                if let Err(e) = self.unsolicited_tx.try_send(action) {
                    warn!(error = %e, "dropping unsolicited action");
                }
            }
        }
    }

    pub(crate) fn take_unsolicited(&self) -> Option<mpsc::Receiver<Action>> {
        self.unsolicited_rx.lock().take()
    }

    pub(crate) fn len(&self) -> usize {
        self.waiting.lock().len()
    }
}
