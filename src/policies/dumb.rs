//! # Dumb policy: fixed delay, default actions.
//!
//! Every event waits exactly `interval` (default `0`) and is answered with
//! its default action. The orchestrator keeps one instance around as the
//! passthrough used while orchestration is disabled.
//!
//! ## Parameters
//! - `interval` (duration, default `0`)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::info;

use crate::error::ConfigError;
use crate::queue::{DelayPick, DelayWindow, QueueSettings};
use crate::signal::{Action, Event};

use super::{explore::PolicyCore, ExplorePolicy, PolicyParams};

/// Fixed-delay passthrough policy.
pub struct DumbPolicy {
    interval: RwLock<Duration>,
    core: PolicyCore,
}

impl DumbPolicy {
    /// Registry name.
    pub const NAME: &'static str = "dumb";

    /// Creates the policy with `interval = 0`.
    pub fn new(settings: QueueSettings) -> Self {
        Self {
            interval: RwLock::new(Duration::ZERO),
            core: PolicyCore::new(settings, |event: Arc<Event>| event.default_action()),
        }
    }

    /// Current delay.
    pub fn interval(&self) -> Duration {
        *self.interval.read()
    }
}

#[async_trait]
impl ExplorePolicy for DumbPolicy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn load_config(&self, params: &PolicyParams) -> Result<(), ConfigError> {
        let interval = params.duration("interval")?.unwrap_or(Duration::ZERO);
        *self.interval.write() = interval;
        info!(policy = Self::NAME, ?interval, "loaded config");
        Ok(())
    }

    fn queue_event(&self, event: Event) {
        let window = DelayWindow::fixed(self.interval());
        self.core
            .queue()
            .enqueue(Arc::new(event), window, DelayPick::Uniform);
    }

    fn action_chan(&self) -> Option<mpsc::Receiver<Action>> {
        self.core.take_actions()
    }

    async fn shutdown(&self) {
        self.core.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{ActionClass, OptionMap};

    #[tokio::test(start_paused = true)]
    async fn test_dumb_answers_in_order_with_defaults() {
        let policy = DumbPolicy::new(QueueSettings::default());
        policy.load_config(&PolicyParams::new()).unwrap();
        let mut rx = policy.action_chan().unwrap();
        assert!(policy.action_chan().is_none());

        let events: Vec<Event> = (0..5)
            .map(|i| Event::packet(format!("e{}", i % 2), "a", "b", OptionMap::new()))
            .collect();
        for ev in &events {
            policy.queue_event(ev.clone());
        }
        for ev in &events {
            let act = rx.recv().await.unwrap();
            assert_eq!(act.class(), ActionClass::EventAcceptance);
            assert_eq!(act.event_id(), Some(ev.id()));
        }
        policy.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dumb_interval_delays() {
        let policy = DumbPolicy::new(QueueSettings::default());
        policy
            .load_config(&PolicyParams::new().with("interval", "50ms"))
            .unwrap();
        assert_eq!(policy.interval(), Duration::from_millis(50));
        let mut rx = policy.action_chan().unwrap();

        let start = tokio::time::Instant::now();
        policy.queue_event(Event::log("e", "x"));
        let act = rx.recv().await.unwrap();
        assert_eq!(act.class(), ActionClass::Nop);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
