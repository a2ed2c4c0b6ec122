//! Event, action and control pumps.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::history::ActionTrace;
use crate::policies::{DumbPolicy, ExplorePolicy};
use crate::signal::{Action, Control, Event};

/// State shared by the pumps and the orchestrator handle.
pub(crate) struct Shared {
    pub(crate) policy: Arc<dyn ExplorePolicy>,
    pub(crate) dumb: Arc<DumbPolicy>,
    pub(crate) enabled: AtomicBool,
    pub(crate) collect_trace: bool,
    pub(crate) trace: Mutex<ActionTrace>,
}

impl Shared {
    pub(crate) fn set_enabled(&self, on: bool) {
        let was = self.enabled.swap(on, Ordering::AcqRel);
        if was == on {
            warn!(enabled = on, "orchestration already in requested state");
        } else {
            info!(enabled = on, "orchestration toggled");
        }
    }

    fn handle_event(&self, mut event: Event) {
        event.mark_arrived(SystemTime::now());
        if self.enabled.load(Ordering::Acquire) {
            debug!(entity = %event.entity_id(), class = %event.class(), "event to policy");
            self.policy.queue_event(event);
        } else {
            debug!(entity = %event.entity_id(), class = %event.class(), "orchestration disabled, event to passthrough");
            self.dumb.queue_event(event);
        }
    }

    async fn handle_action(
        &self,
        mut action: Action,
        endpoint: &mpsc::Sender<Action>,
        token: &CancellationToken,
    ) {
        action.set_triggered_time(SystemTime::now());

        let mut side_only = false;
        if let Some(side) = action.as_orchestrator_side() {
            side_only = side.orchestrator_side_only();
            if let Err(e) = side.execute_on_orchestrator().await {
                error!(action = %action.id(), error = %e, "orchestrator-side execution failed, ignoring");
            }
        }

        // Recorded before forwarding: an inspector that sees the action can
        // rely on it being in the trace.
        if self.collect_trace {
            self.trace.lock().push(action.clone());
        }
        if !side_only {
            debug!(entity = %action.entity_id(), class = %action.class(), "action to endpoint");
            tokio::select! {
                _ = token.cancelled() => {
                    warn!("stopping while the endpoint is backed up, action dropped");
                }
                sent = endpoint.send(action) => {
                    if sent.is_err() {
                        warn!("endpoint multiplexer is gone, action dropped");
                    }
                }
            }
        }
    }
}

pub(crate) async fn event_pump(
    shared: Arc<Shared>,
    mut events: mpsc::Receiver<Event>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            ev = events.recv() => match ev {
                Some(ev) => shared.handle_event(ev),
                None => {
                    warn!("endpoint event stream ended");
                    break;
                }
            },
        }
    }
    debug!("event pump stopped");
}

pub(crate) async fn action_pump(
    shared: Arc<Shared>,
    mut policy_actions: mpsc::Receiver<Action>,
    mut passthrough_actions: mpsc::Receiver<Action>,
    endpoint: mpsc::Sender<Action>,
    token: CancellationToken,
) {
    loop {
        let action = tokio::select! {
            _ = token.cancelled() => break,
            Some(a) = policy_actions.recv() => a,
            Some(a) = passthrough_actions.recv() => a,
            else => break,
        };
        shared.handle_action(action, &endpoint, &token).await;
    }
    debug!("action pump stopped");
}

pub(crate) async fn control_pump(
    shared: Arc<Shared>,
    mut controls: mpsc::Receiver<Control>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            c = controls.recv() => match c {
                Some(Control::EnableOrchestration) => shared.set_enabled(true),
                Some(Control::DisableOrchestration) => shared.set_enabled(false),
                None => break,
            },
        }
    }
    debug!("control pump stopped");
}
