//! # Explore policy contract.
//!
//! A policy consumes events and, whenever it decides, emits actions:
//!
//! ```text
//! Orchestrator ── queue_event(Event) ──► Policy ──► TimeBoundedQueue
//!                                                        │ (delay)
//!                                                        ▼
//! Orchestrator ◄── action_chan().recv() ◄── decider task: Event ─► Action
//! ```
//!
//! ## Rules
//! - `queue_event` never awaits.
//! - `load_config` may be called again at runtime; it parses every parameter
//!   from defaults, so the same input always yields the same settings.
//! - `action_chan` hands out the receiver once.
//! - Policies read history; only the orchestrator writes it.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ConfigError;
use crate::history::HistoryStorage;
use crate::queue::{Dequeued, QueueSettings, TimeBoundedQueue};
use crate::signal::{Action, Event};

use super::params::PolicyParams;

/// Exploration algorithm deciding which action answers which event, and when.
#[async_trait]
pub trait ExplorePolicy: Send + Sync + 'static {
    /// Registry name, e.g. `"random"`.
    fn name(&self) -> &'static str;

    /// Parses and applies parameters.
    fn load_config(&self, params: &PolicyParams) -> Result<(), ConfigError>;

    /// Grants read access to previous runs.
    fn set_history_storage(&self, _storage: Arc<dyn HistoryStorage>) {}

    /// Accepts an event for scheduling.
    fn queue_event(&self, event: Event);

    /// Takes the action receiver. Returns `None` after the first call.
    fn action_chan(&self) -> Option<mpsc::Receiver<Action>>;

    /// Stops background tasks and waits for them.
    async fn shutdown(&self);
}

/// Queue, action channel and background tasks shared by the built-in policies.
pub(crate) struct PolicyCore {
    queue: TimeBoundedQueue<Arc<Event>>,
    actions_tx: mpsc::Sender<Action>,
    actions_rx: Mutex<Option<mpsc::Receiver<Action>>>,
    token: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PolicyCore {
    /// Creates the queue and spawns the decider running `decide` on every
    /// dequeued event.
    pub(crate) fn new<F>(settings: QueueSettings, decide: F) -> Self
    where
        F: Fn(Arc<Event>) -> Action + Send + 'static,
    {
        let (queue, dequeued) = TimeBoundedQueue::new(settings);
        let (actions_tx, actions_rx) = mpsc::channel(settings.capacity.max(1));
        let token = CancellationToken::new();
        let decider = spawn_decider(dequeued, actions_tx.clone(), token.clone(), decide);
        Self {
            queue,
            actions_tx,
            actions_rx: Mutex::new(Some(actions_rx)),
            token,
            tasks: Mutex::new(vec![decider]),
        }
    }

    pub(crate) fn queue(&self) -> &TimeBoundedQueue<Arc<Event>> {
        &self.queue
    }

    pub(crate) fn take_actions(&self) -> Option<mpsc::Receiver<Action>> {
        self.actions_rx.lock().take()
    }

    /// Sender for actions produced outside the queue (e.g. timers).
    pub(crate) fn actions(&self) -> mpsc::Sender<Action> {
        self.actions_tx.clone()
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub(crate) fn track(&self, handle: JoinHandle<()>) {
        self.tasks.lock().push(handle);
    }

    pub(crate) async fn shutdown(&self) {
        self.token.cancel();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for h in tasks {
            let _ = h.await;
        }
        self.queue.shutdown().await;
    }
}

impl Drop for PolicyCore {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

fn spawn_decider<F>(
    mut dequeued: mpsc::Receiver<Dequeued<Arc<Event>>>,
    actions: mpsc::Sender<Action>,
    token: CancellationToken,
    decide: F,
) -> JoinHandle<()>
where
    F: Fn(Arc<Event>) -> Action + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            let item = tokio::select! {
                _ = token.cancelled() => break,
                item = dequeued.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };
            let action = decide(item.value);
            tokio::select! {
                _ = token.cancelled() => break,
                sent = actions.send(action) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }
    })
}
