//! In-process transport.
//!
//! ```text
//! LocalTransceiver::send_event ──► inbox ──► LocalTransport ──► mux
//! LocalTransceiver::resolve    ◄── outbox ◄── LocalTransport ◄── mux
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::TransportError;
use crate::signal::{Action, Event};

use super::transceiver::PendingActions;
use super::{Transceiver, Transport, TransportKind, TransportLink};

/// Orchestrator side of the in-process pair.
pub struct LocalTransport {
    inbox: Mutex<Option<mpsc::Receiver<Event>>>,
    outbox: mpsc::Sender<Action>,
}

/// Inspector side of the in-process pair.
pub struct LocalTransceiver {
    events: mpsc::Sender<Event>,
    actions: Mutex<Option<mpsc::Receiver<Action>>>,
    pending: Arc<PendingActions>,
}

impl LocalTransport {
    /// Creates a connected transport / transceiver pair.
    pub fn pair(capacity: usize) -> (Arc<LocalTransport>, LocalTransceiver) {
        let capacity = capacity.max(1);
        let (events_tx, events_rx) = mpsc::channel(capacity);
        let (actions_tx, actions_rx) = mpsc::channel(capacity);
        let transport = Arc::new(LocalTransport {
            inbox: Mutex::new(Some(events_rx)),
            outbox: actions_tx,
        });
        let transceiver = LocalTransceiver {
            events: events_tx,
            actions: Mutex::new(Some(actions_rx)),
            pending: Arc::new(PendingActions::new(capacity)),
        };
        (transport, transceiver)
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Local
    }

    async fn start(&self, link: TransportLink) -> Result<Vec<JoinHandle<()>>, TransportError> {
        let mut inbox = self.inbox.lock().take().ok_or(TransportError::AlreadyStarted)?;
        let TransportLink {
            events,
            mut actions,
            token,
            ..
        } = link;

        let up_token = token.clone();
        let up = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = up_token.cancelled() => break,
                    ev = inbox.recv() => match ev {
                        Some(ev) => ev,
                        None => break,
                    },
                };
                tokio::select! {
                    _ = up_token.cancelled() => break,
                    sent = events.send(event) => if sent.is_err() {
                        break;
                    },
                }
            }
            debug!(transport = "local", "event pump stopped");
        });

        let outbox = self.outbox.clone();
        let down = tokio::spawn(async move {
            loop {
                let action = tokio::select! {
                    _ = token.cancelled() => break,
                    a = actions.recv() => match a {
                        Some(a) => a,
                        None => break,
                    },
                };
                tokio::select! {
                    _ = token.cancelled() => break,
                    sent = outbox.send(action) => if sent.is_err() {
                        break;
                    },
                }
            }
            debug!(transport = "local", "action pump stopped");
        });

        Ok(vec![up, down])
    }
}

impl LocalTransceiver {
    /// Actions that answer no pending event. Available once.
    pub fn unsolicited(&self) -> Option<mpsc::Receiver<Action>> {
        self.pending.take_unsolicited()
    }

    /// Number of deferred events still waiting for an action.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl Transceiver for LocalTransceiver {
    async fn start(&self) -> Result<(), TransportError> {
        let mut actions = self.actions.lock().take().ok_or(TransportError::AlreadyStarted)?;
        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            while let Some(action) = actions.recv().await {
                pending.resolve(action);
            }
        });
        Ok(())
    }

    async fn send_event(
        &self,
        event: Event,
    ) -> Result<Option<oneshot::Receiver<Action>>, TransportError> {
        let id = event.id().to_string();
        let slot = self.pending.expect(&event);
        if self.events.send(event).await.is_err() {
            self.pending.forget(&id);
            return Err(TransportError::Closed);
        }
        Ok(slot)
    }
}
