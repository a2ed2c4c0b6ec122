//! Name → factory map for explore policies.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::ConfigError;
use crate::queue::QueueSettings;

use super::{DumbPolicy, ExplorePolicy, PolicyParams, RandomPolicy, ReplayablePolicy};

/// Builds an unconfigured policy.
pub type PolicyFactory = Arc<dyn Fn(QueueSettings) -> Arc<dyn ExplorePolicy> + Send + Sync>;

/// Registry of explore policies by name.
pub struct PolicyRegistry {
    factories: RwLock<HashMap<String, PolicyFactory>>,
}

impl PolicyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// A registry holding `dumb`, `random` and `replayable`.
    pub fn with_known_policies() -> Self {
        let reg = Self::new();
        let known: [(&str, PolicyFactory); 3] = [
            (DumbPolicy::NAME, Arc::new(|s| Arc::new(DumbPolicy::new(s)) as Arc<dyn ExplorePolicy>)),
            (RandomPolicy::NAME, Arc::new(|s| Arc::new(RandomPolicy::new(s)) as Arc<dyn ExplorePolicy>)),
            (
                ReplayablePolicy::NAME,
                Arc::new(|s| Arc::new(ReplayablePolicy::new(s)) as Arc<dyn ExplorePolicy>),
            ),
        ];
        {
            let mut map = reg.factories.write();
            for (name, factory) in known {
                map.insert(name.to_string(), factory);
            }
        }
        reg
    }

    /// Adds a factory; fails if `name` is taken.
    pub fn register(&self, name: &str, factory: PolicyFactory) -> Result<(), ConfigError> {
        let mut map = self.factories.write();
        if map.contains_key(name) {
            return Err(ConfigError::DuplicatePolicy {
                name: name.to_string(),
            });
        }
        map.insert(name.to_string(), factory);
        Ok(())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Builds the policy `name` and applies `params`.
    ///
    /// Must be called inside a tokio runtime: policies spawn their timer and
    /// decider tasks on construction.
    pub fn create(
        &self,
        name: &str,
        settings: QueueSettings,
        params: &PolicyParams,
    ) -> Result<Arc<dyn ExplorePolicy>, ConfigError> {
        let factory = self
            .factories
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownPolicy {
                name: name.to_string(),
            })?;
        let policy = factory(settings);
        policy.load_config(params)?;
        debug!(policy = name, "policy created");
        Ok(policy)
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::with_known_policies()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_known_policies() {
        let reg = PolicyRegistry::with_known_policies();
        assert_eq!(reg.names(), vec!["dumb", "random", "replayable"]);
        let p = reg
            .create("random", QueueSettings::default(), &PolicyParams::new())
            .unwrap();
        assert_eq!(p.name(), "random");
        p.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_policy() {
        let reg = PolicyRegistry::with_known_policies();
        let err = reg
            .create("smart", QueueSettings::default(), &PolicyParams::new())
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "config_unknown_policy");
    }

    #[tokio::test]
    async fn test_bad_params_fail_creation() {
        let reg = PolicyRegistry::with_known_policies();
        let params = PolicyParams::new().with("faultActionProbability", 2.0);
        let err = reg
            .create("random", QueueSettings::default(), &params)
            .err()
            .unwrap();
        assert_eq!(err.as_label(), "config_invalid_probability");
    }

    #[test]
    fn test_duplicate_registration() {
        let reg = PolicyRegistry::with_known_policies();
        let err = reg
            .register(
                "dumb",
                Arc::new(|s| Arc::new(DumbPolicy::new(s)) as Arc<dyn ExplorePolicy>),
            )
            .unwrap_err();
        assert_eq!(err.as_label(), "config_duplicate_policy");
    }
}
