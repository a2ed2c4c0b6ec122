use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use parking_lot::Mutex;

use crate::config::OrchestratorConfig;
use crate::endpoint::{EndpointMux, RestEndpoint, RpcEndpoint, Transport};
use crate::error::OrchestratorError;
use crate::history::{ActionTrace, HistoryStorage};
use crate::policies::{DumbPolicy, ExplorePolicy, PolicyRegistry};
use crate::signal::SignalRegistry;

use super::engine::Orchestrator;
use super::pumps::Shared;

/// Builder for an [`Orchestrator`] with optional transports and history.
pub struct OrchestratorBuilder {
    cfg: OrchestratorConfig,
    signals: Arc<SignalRegistry>,
    policies: Arc<PolicyRegistry>,
    policy: Option<Arc<dyn ExplorePolicy>>,
    transports: Vec<Arc<dyn Transport>>,
    history: Option<Arc<dyn HistoryStorage>>,
}

impl OrchestratorBuilder {
    /// Creates a builder resolving signals and policies through the given registries.
    pub fn new(
        cfg: OrchestratorConfig,
        signals: Arc<SignalRegistry>,
        policies: Arc<PolicyRegistry>,
    ) -> Self {
        Self {
            cfg,
            signals,
            policies,
            policy: None,
            transports: Vec::new(),
            history: None,
        }
    }

    /// Uses an already configured policy instead of `explore_policy`.
    pub fn with_policy(mut self, policy: Arc<dyn ExplorePolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Attaches an extra transport (e.g. a [`LocalTransport`](crate::endpoint::LocalTransport)).
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transports.push(transport);
        self
    }

    /// Records the final trace here and lets the policy read past runs.
    pub fn with_history(mut self, history: Arc<dyn HistoryStorage>) -> Self {
        self.history = Some(history);
        self
    }

    /// Builds the orchestrator.
    ///
    /// Binds the RPC listener when `rpc_addr` is set and creates the REST
    /// handler when `rest_enabled` is set. Must run inside a tokio runtime.
    pub async fn build(self) -> Result<Orchestrator, OrchestratorError> {
        self.cfg.validate()?;
        let settings = self.cfg.queue_settings();
        let capacity = self.cfg.channel_capacity_clamped();

        let policy = match self.policy {
            Some(p) => p,
            None => self.policies.create(
                &self.cfg.explore_policy,
                settings,
                &self.cfg.explore_policy_param,
            )?,
        };
        if let Some(history) = &self.history {
            policy.set_history_storage(Arc::clone(history));
        }

        let mut mux = EndpointMux::new(capacity);
        for t in self.transports {
            mux.attach(t)?;
        }

        let mut rpc_addr = None;
        if let Some(addr) = self.cfg.rpc_addr {
            let rpc = RpcEndpoint::bind(addr, Arc::clone(&self.signals), capacity).await?;
            rpc_addr = Some(rpc.local_addr());
            mux.attach(Arc::new(rpc))?;
        }

        let mut rest = None;
        let mut control = None;
        if self.cfg.rest_enabled {
            let endpoint = Arc::new(RestEndpoint::new(Arc::clone(&self.signals), capacity));
            control = endpoint.take_control();
            mux.attach(Arc::clone(&endpoint) as Arc<dyn Transport>)?;
            rest = Some(endpoint);
        }

        let shared = Arc::new(Shared {
            policy,
            dumb: Arc::new(DumbPolicy::new(settings)),
            enabled: AtomicBool::new(self.cfg.start_enabled),
            collect_trace: self.cfg.collect_trace,
            trace: Mutex::new(ActionTrace::new()),
        });

        Ok(Orchestrator::new_internal(
            shared,
            mux,
            self.history,
            rest,
            rpc_addr,
            control,
        ))
    }
}
