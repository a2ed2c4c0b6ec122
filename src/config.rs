//! # Orchestrator configuration.
//!
//! Provides [`OrchestratorConfig`] centralized settings for one run.
//!
//! Config is used in two ways:
//! 1. **Orchestrator creation**: `Runtime::orchestrator(config)`
//! 2. **Policy creation**: `Runtime::build_policy(&config)`
//!
//! Keys are camelCase when deserialized, matching the policy parameters:
//! ```json
//! {
//!   "explorePolicy": "random",
//!   "explorePolicyParam": { "minInterval": "30ms", "maxInterval": "100ms" },
//!   "rpcAddr": "127.0.0.1:10000"
//! }
//! ```
//!
//! ## Sentinel values
//! - `queue_high_water = 0` → never warn about queue depth
//! - `channel_capacity = 0` → clamped to 1

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::policies::PolicyParams;
use crate::queue::QueueSettings;

/// Settings for one orchestrated run.
///
/// ## Field semantics
/// - `explore_policy`: registry name of the policy (`dumb`, `random`, `replayable`)
/// - `explore_policy_param`: parameters handed to `ExplorePolicy::load_config`
/// - `collect_trace`: keep every handled action for the final trace
/// - `start_enabled`: route events to the policy (`true`) or to the passthrough
/// - `channel_capacity`: bound of every internal channel
/// - `rpc_addr`: bind the binary RPC transport here (port `0` picks one)
/// - `rest_enabled`: attach the REST request handler
/// - `queue_high_water`: scheduler queue depth that triggers a warning
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrchestratorConfig {
    /// Policy name.
    pub explore_policy: String,
    /// Policy parameters.
    pub explore_policy_param: PolicyParams,
    /// Record actions into the trace.
    pub collect_trace: bool,
    /// Initial enable state.
    pub start_enabled: bool,
    /// Channel bound.
    pub channel_capacity: usize,
    /// RPC listen address.
    pub rpc_addr: Option<SocketAddr>,
    /// REST handler on/off.
    pub rest_enabled: bool,
    /// Queue depth warning threshold.
    pub queue_high_water: usize,
}

impl Default for OrchestratorConfig {
    /// Default configuration:
    ///
    /// - `explore_policy = "random"` with no parameters (immediate, no faults)
    /// - `collect_trace = true`, `start_enabled = true`
    /// - `channel_capacity = 1024`, `queue_high_water = 4096`
    /// - no RPC listener, no REST handler
    fn default() -> Self {
        Self {
            explore_policy: "random".to_string(),
            explore_policy_param: PolicyParams::new(),
            collect_trace: true,
            start_enabled: true,
            channel_capacity: 1024,
            rpc_addr: None,
            rest_enabled: false,
            queue_high_water: 4096,
        }
    }
}

impl OrchestratorConfig {
    /// Parses a JSON document; missing keys take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.explore_policy.trim().is_empty() {
            return Err(ConfigError::InvalidParam {
                param: "explorePolicy".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Channel bound, at least 1.
    #[inline]
    pub fn channel_capacity_clamped(&self) -> usize {
        self.channel_capacity.max(1)
    }

    /// Scheduler queue settings derived from this config.
    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            capacity: self.channel_capacity_clamped(),
            high_water: self.queue_high_water,
        }
    }
}
