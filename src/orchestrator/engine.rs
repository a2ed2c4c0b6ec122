use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::endpoint::{EndpointMux, RestEndpoint, RouteRegistry};
use crate::error::OrchestratorError;
use crate::history::{ActionTrace, HistoryStorage};
use crate::policies::ExplorePolicy;
use crate::signal::Control;

use super::pumps::{self, Shared};
use super::shutdown::wait_for_termination;

/// Lifecycle of an [`Orchestrator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Built, not started.
    Created,
    /// Pumps running.
    Running,
    /// Shut down; the trace was handed out.
    Stopped,
}

impl OrchestratorState {
    /// Stable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorState::Created => "created",
            OrchestratorState::Running => "running",
            OrchestratorState::Stopped => "stopped",
        }
    }
}

struct Pump {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Pump {
    fn spawn<F>(make: impl FnOnce(CancellationToken) -> F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = tokio::spawn(make(token.clone()));
        Self { token, handle }
    }

    async fn stop(self, name: &'static str) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!(pump = name, error = %e, "pump ended abnormally");
        }
    }
}

#[derive(Default)]
struct Pumps {
    event: Option<Pump>,
    action: Option<Pump>,
    control: Option<Pump>,
}

/// Wires transports to the explore policy and records the action trace.
///
/// ```text
/// inspector ─► transport ─► mux ─► event pump ─► policy (or passthrough when disabled)
/// inspector ◄─ transport ◄─ mux ◄─ action pump ◄─ policy / passthrough
///                                      └─► orchestrator-side actions run here
/// ```
pub struct Orchestrator {
    shared: Arc<Shared>,
    mux: EndpointMux,
    history: Option<Arc<dyn HistoryStorage>>,
    rest: Option<Arc<RestEndpoint>>,
    rpc_addr: Option<SocketAddr>,
    control: Mutex<Option<mpsc::Receiver<Control>>>,
    state: Mutex<OrchestratorState>,
    pumps: tokio::sync::Mutex<Pumps>,
}

impl Orchestrator {
    pub(super) fn new_internal(
        shared: Arc<Shared>,
        mux: EndpointMux,
        history: Option<Arc<dyn HistoryStorage>>,
        rest: Option<Arc<RestEndpoint>>,
        rpc_addr: Option<SocketAddr>,
        control: Option<mpsc::Receiver<Control>>,
    ) -> Self {
        Self {
            shared,
            mux,
            history,
            rest,
            rpc_addr,
            control: Mutex::new(control),
            state: Mutex::new(OrchestratorState::Created),
            pumps: tokio::sync::Mutex::new(Pumps::default()),
        }
    }

    /// Starts transports and the event, action and control pumps.
    pub async fn start(&self) -> Result<(), OrchestratorError> {
        self.transition("start", OrchestratorState::Created, OrchestratorState::Running)?;

        let streams = self.mux.start().await?;
        let policy_actions =
            self.shared
                .policy
                .action_chan()
                .ok_or(OrchestratorError::ActionChannelTaken {
                    policy: self.shared.policy.name(),
                })?;
        let passthrough_actions =
            self.shared
                .dumb
                .action_chan()
                .ok_or(OrchestratorError::ActionChannelTaken {
                    policy: self.shared.dumb.name(),
                })?;

        let mut slots = self.pumps.lock().await;
        let shared = Arc::clone(&self.shared);
        slots.event = Some(Pump::spawn(|t| pumps::event_pump(shared, streams.events, t)));

        let shared = Arc::clone(&self.shared);
        let endpoint = streams.actions;
        slots.action = Some(Pump::spawn(|t| {
            pumps::action_pump(shared, policy_actions, passthrough_actions, endpoint, t)
        }));

        let controls = self.control.lock().take();
        if let Some(controls) = controls {
            let shared = Arc::clone(&self.shared);
            slots.control = Some(Pump::spawn(|t| pumps::control_pump(shared, controls, t)));
        }

        info!(
            policy = self.shared.policy.name(),
            enabled = self.is_enabled(),
            collect_trace = self.shared.collect_trace,
            "orchestrator started"
        );
        Ok(())
    }

    /// Routes events to the configured policy.
    pub fn enable(&self) {
        self.shared.set_enabled(true);
    }

    /// Routes events to the passthrough policy.
    pub fn disable(&self) {
        self.shared.set_enabled(false);
    }

    /// Whether events go to the configured policy.
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> OrchestratorState {
        *self.state.lock()
    }

    /// Copy of the trace collected so far.
    pub fn trace(&self) -> ActionTrace {
        self.shared.trace.lock().clone()
    }

    /// The configured explore policy.
    pub fn policy(&self) -> Arc<dyn ExplorePolicy> {
        Arc::clone(&self.shared.policy)
    }

    /// Entity routes of the multiplexer.
    pub fn routes(&self) -> Arc<RouteRegistry> {
        self.mux.routes()
    }

    /// The REST handler, if enabled.
    pub fn rest(&self) -> Option<Arc<RestEndpoint>> {
        self.rest.clone()
    }

    /// Bound address of the RPC transport, if enabled.
    pub fn rpc_addr(&self) -> Option<SocketAddr> {
        self.rpc_addr
    }

    /// Stops everything and returns the trace.
    ///
    /// Order: event pump, action pump, control pump, transports, policies.
    /// The trace is recorded to history when both trace collection and a
    /// history storage are configured.
    pub async fn shutdown(&self) -> Result<ActionTrace, OrchestratorError> {
        self.transition("shut down", OrchestratorState::Running, OrchestratorState::Stopped)?;
        debug!("shutting down orchestrator");

        let mut slots = self.pumps.lock().await;
        if let Some(p) = slots.event.take() {
            p.stop("event").await;
        }
        if let Some(p) = slots.action.take() {
            p.stop("action").await;
        }
        if let Some(p) = slots.control.take() {
            p.stop("control").await;
        }
        drop(slots);

        self.mux.shutdown().await;
        self.shared.policy.shutdown().await;
        self.shared.dumb.shutdown().await;

        let trace = std::mem::take(&mut *self.shared.trace.lock());
        if self.shared.collect_trace {
            if let Some(history) = &self.history {
                let id = history.record_new_trace(trace.clone());
                debug!(id, actions = trace.len(), "trace stored");
            }
        }
        info!(actions = trace.len(), "orchestrator shut down");
        Ok(trace)
    }

    /// Starts if needed, waits for SIGINT/SIGTERM, then shuts down.
    pub async fn run_until_signal(&self) -> Result<ActionTrace, OrchestratorError> {
        if self.state() == OrchestratorState::Created {
            self.start().await?;
        }
        if let Err(e) = wait_for_termination().await {
            warn!(error = %e, "cannot listen for termination signals, shutting down");
        }
        self.shutdown().await
    }

    fn transition(
        &self,
        op: &'static str,
        from: OrchestratorState,
        to: OrchestratorState,
    ) -> Result<(), OrchestratorError> {
        let mut state = self.state.lock();
        if *state != from {
            return Err(OrchestratorError::InvalidState {
                op,
                state: state.as_str(),
            });
        }
        *state = to;
        Ok(())
    }
}
