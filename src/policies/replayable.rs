//! # Replayable policy (experimental): hash-seeded delays.
//!
//! Each event waits `hash(seed, replay_hint) mod maxInterval` and is answered
//! with its default action. Running again with the same seed and the same
//! hints reproduces the same delays. Events whose hints collide still race
//! in wall-clock arrival order, so replay is only semi-deterministic.
//!
//! ## Parameters
//! - `maxInterval` (duration, default `10ms`)
//! - `seed` (string, default `""`); overridden by `RACEVISOR_REPLAY_SEED`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::queue::{DelayPick, DelayWindow, QueueSettings};
use crate::signal::{Action, Event};

use super::{ExplorePolicy, PolicyParams, explore::PolicyCore};

/// Environment variable that overrides the configured seed.
pub const REPLAY_SEED_ENV: &str = "RACEVISOR_REPLAY_SEED";

const DEFAULT_MAX_INTERVAL: Duration = Duration::from_millis(10);

/// Delay for `hint` under `seed`, in `[0, max)`.
///
/// FNV-1a over the seed bytes followed by the hint bytes. A zero `max`
/// yields a zero delay.
pub fn replay_delay(seed: &str, hint: &str, max: Duration) -> Duration {
    let max_ns = max.as_nanos() as u64;
    if max_ns == 0 {
        return Duration::ZERO;
    }
    let mut h: u64 = 0xcbf29ce484222325;
    for b in seed.as_bytes().iter().chain(hint.as_bytes()) {
        h ^= *b as u64;
        h = h.wrapping_mul(0x100000001b3);
    }
    Duration::from_nanos(h % max_ns)
}

#[derive(Clone, Debug, PartialEq)]
struct ReplaySettings {
    max_interval: Duration,
    seed: String,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            max_interval: DEFAULT_MAX_INTERVAL,
            seed: String::new(),
        }
    }
}

/// Semi-deterministic replay policy.
pub struct ReplayablePolicy {
    settings: RwLock<ReplaySettings>,
    core: PolicyCore,
}

impl ReplayablePolicy {
    /// Registry name.
    pub const NAME: &'static str = "replayable";

    /// Creates the policy with `maxInterval = 10ms` and an empty seed.
    pub fn new(settings: QueueSettings) -> Self {
        warn!(policy = Self::NAME, "replayable policy is experimental");
        Self {
            settings: RwLock::new(ReplaySettings::default()),
            core: PolicyCore::new(settings, |event: Arc<Event>| event.default_action()),
        }
    }

    /// Current seed.
    pub fn seed(&self) -> String {
        self.settings.read().seed.clone()
    }

    /// Current upper bound of the delay.
    pub fn max_interval(&self) -> Duration {
        self.settings.read().max_interval
    }

    /// Delay the policy assigns to `event`.
    pub fn delay_for(&self, event: &Event) -> Duration {
        let s = self.settings.read();
        replay_delay(&s.seed, &event.replay_hint(), s.max_interval)
    }
}

/// An unset or empty variable leaves the configured seed alone.
fn env_seed(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.is_empty())
}

#[async_trait]
impl ExplorePolicy for ReplayablePolicy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn load_config(&self, params: &PolicyParams) -> Result<(), ConfigError> {
        let max_interval = params
            .duration("maxInterval")?
            .unwrap_or(DEFAULT_MAX_INTERVAL);
        let mut seed = params.string("seed")?.unwrap_or_default();
        if let Some(from_env) = env_seed(std::env::var(REPLAY_SEED_ENV).ok()) {
            info!(env = REPLAY_SEED_ENV, "seed overridden from environment");
            seed = from_env;
        }
        info!(policy = Self::NAME, ?max_interval, %seed, "loaded config");
        *self.settings.write() = ReplaySettings { max_interval, seed };
        Ok(())
    }

    fn queue_event(&self, event: Event) {
        let delay = self.delay_for(&event);
        self.core.queue().enqueue(
            Arc::new(event),
            DelayWindow::fixed(delay),
            DelayPick::Exact(delay),
        );
    }

    fn action_chan(&self) -> Option<mpsc::Receiver<Action>> {
        self.core.take_actions()
    }

    async fn shutdown(&self) {
        self.core.shutdown().await;
    }
}
