//! # Runtime context: the registries one process shares.
//!
//! [`Runtime`] replaces process-wide singletons: it owns the
//! [`SignalRegistry`] used to decode wire signals and the [`PolicyRegistry`]
//! used to build policies by name. Clone it freely; clones share registries.

use std::sync::Arc;

use crate::config::OrchestratorConfig;
use crate::error::ConfigError;
use crate::orchestrator::OrchestratorBuilder;
use crate::policies::{ExplorePolicy, PolicyRegistry};
use crate::signal::SignalRegistry;

/// Shared registries.
#[derive(Clone)]
pub struct Runtime {
    signals: Arc<SignalRegistry>,
    policies: Arc<PolicyRegistry>,
}

impl Runtime {
    /// Registries holding every built-in signal class and policy.
    pub fn new() -> Self {
        Self::with_registries(
            Arc::new(SignalRegistry::with_known_signals()),
            Arc::new(PolicyRegistry::with_known_policies()),
        )
    }

    /// Uses caller-provided registries (e.g. with custom policies).
    pub fn with_registries(signals: Arc<SignalRegistry>, policies: Arc<PolicyRegistry>) -> Self {
        Self { signals, policies }
    }

    /// Signal class registry.
    pub fn signals(&self) -> Arc<SignalRegistry> {
        Arc::clone(&self.signals)
    }

    /// Policy registry.
    pub fn policies(&self) -> Arc<PolicyRegistry> {
        Arc::clone(&self.policies)
    }

    /// Builds and configures the policy named by `cfg`.
    pub fn build_policy(
        &self,
        cfg: &OrchestratorConfig,
    ) -> Result<Arc<dyn ExplorePolicy>, ConfigError> {
        cfg.validate()?;
        self.policies.create(
            &cfg.explore_policy,
            cfg.queue_settings(),
            &cfg.explore_policy_param,
        )
    }

    /// Starts building an orchestrator for `cfg`.
    pub fn orchestrator(&self, cfg: OrchestratorConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg, self.signals(), self.policies())
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
