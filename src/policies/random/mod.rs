//! # Random policy: randomized delays, occasional faults, periodic shell actions.
//!
//! ```text
//! queue_event(ev) ──► window [minInterval, maxInterval]   (x0.8 for prioritized entities)
//!                     pick ≥ entity's previous due         (per-entity FIFO)
//!                         │
//!                         ▼
//!                  TimeBoundedQueue ──► decide(ev)
//!                                         ├─ ProcSetEvent ─► ProcPolicy ─► ProcSetSchedAction
//!                                         ├─ fault exists && coin(faultActionProbability) ─► fault
//!                                         └─ otherwise ─► default action
//!
//! shell routine (if shellActionCommand set):
//!   every shellActionInterval ─► ShellAction ─► action channel (bypasses the queue)
//! ```
//!
//! ## Parameters
//! - `minInterval` (duration, default `0`)
//! - `maxInterval` (duration, default `minInterval`)
//! - `prioritizedEntities` (list of strings)
//! - `faultActionProbability` (float in `[0, 1]`, default `0`)
//! - `shellActionInterval` (duration, default `0`)
//! - `shellActionCommand` (string; requires a positive interval)
//! - `procPolicy` / `procPolicyParam`, see [`ProcPolicy`]

mod proc;

pub use proc::ProcPolicy;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::queue::{DelayPick, DelayWindow, QueueSettings};
use crate::signal::{Action, Event, EventClass, OptionMap};

use super::{ExplorePolicy, PolicyParams, explore::PolicyCore};

/// Window factor applied to prioritized entities.
const PRIORITIZED_FACTOR: f64 = 0.8;

/// Pruning threshold for the per-entity due map.
const LAST_DUE_PRUNE_AT: usize = 1024;

/// Parsed parameters of [`RandomPolicy`].
#[derive(Clone, Debug, PartialEq)]
pub struct RandomSettings {
    /// Delay window for regular entities.
    pub window: DelayWindow,
    /// Entities whose window is shortened.
    pub prioritized_entities: HashSet<String>,
    /// Chance of answering with a fault action when one exists.
    pub fault_action_probability: f64,
    /// Period of the shell routine; zero disables it.
    pub shell_action_interval: Duration,
    /// Command run by the shell routine.
    pub shell_action_command: Option<String>,
    /// Scheduling attributes for `ProcSetEvent`.
    pub proc_policy: ProcPolicy,
}

impl Default for RandomSettings {
    fn default() -> Self {
        Self {
            window: DelayWindow::immediate(),
            prioritized_entities: HashSet::new(),
            fault_action_probability: 0.0,
            shell_action_interval: Duration::ZERO,
            shell_action_command: None,
            proc_policy: ProcPolicy::default(),
        }
    }
}

impl RandomSettings {
    /// Parses every parameter starting from defaults.
    pub fn from_params(params: &PolicyParams) -> Result<Self, ConfigError> {
        let min = params.duration("minInterval")?.unwrap_or(Duration::ZERO);
        let max = params.duration("maxInterval")?.unwrap_or(min);
        let window = DelayWindow::new(min, max).map_err(|_| ConfigError::InvertedInterval {
            min_param: "minInterval",
            min,
            max_param: "maxInterval",
            max,
        })?;

        let fault_action_probability = params.f64("faultActionProbability")?.unwrap_or(0.0);
        if !(0.0..=1.0).contains(&fault_action_probability) {
            return Err(ConfigError::InvalidProbability {
                param: "faultActionProbability".into(),
                value: fault_action_probability,
            });
        }

        let shell_action_interval = params
            .duration("shellActionInterval")?
            .unwrap_or(Duration::ZERO);
        let shell_action_command = params
            .string("shellActionCommand")?
            .filter(|c| !c.trim().is_empty());
        if let Some(command) = &shell_action_command {
            if shell_action_interval.is_zero() {
                return Err(ConfigError::ShellIntervalRequired {
                    command: command.clone(),
                });
            }
        }

        Ok(Self {
            window,
            prioritized_entities: params
                .string_list("prioritizedEntities")?
                .unwrap_or_default()
                .into_iter()
                .collect(),
            fault_action_probability,
            shell_action_interval,
            shell_action_command,
            proc_policy: ProcPolicy::from_params(params)?,
        })
    }

    /// Window used for `entity`.
    pub fn window_for(&self, entity: &str) -> DelayWindow {
        if self.prioritized_entities.contains(entity) {
            self.window.scaled(PRIORITIZED_FACTOR)
        } else {
            self.window
        }
    }

    fn shell_enabled(&self) -> bool {
        self.shell_action_command.is_some() && !self.shell_action_interval.is_zero()
    }
}

/// Randomized exploration policy.
pub struct RandomPolicy {
    settings: Arc<RwLock<RandomSettings>>,
    last_due: Mutex<HashMap<String, Instant>>,
    shell_running: Arc<AtomicBool>,
    core: PolicyCore,
}

impl RandomPolicy {
    /// Registry name.
    pub const NAME: &'static str = "random";

    /// Creates the policy with default settings (immediate, no faults).
    pub fn new(settings: QueueSettings) -> Self {
        let shared = Arc::new(RwLock::new(RandomSettings::default()));
        let for_decider = Arc::clone(&shared);
        Self {
            settings: shared,
            last_due: Mutex::new(HashMap::new()),
            shell_running: Arc::new(AtomicBool::new(false)),
            core: PolicyCore::new(settings, move |event| decide(&for_decider.read(), event)),
        }
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> RandomSettings {
        self.settings.read().clone()
    }

    /// Called with the settings write lock held, so it cannot interleave
    /// with the routine deciding to stop.
    fn start_shell_routine(&self) {
        if self.shell_running.swap(true, Ordering::AcqRel) {
            return;
        }
        let handle = tokio::spawn(shell_routine(
            Arc::clone(&self.settings),
            Arc::clone(&self.shell_running),
            self.core.actions(),
            self.core.token(),
        ));
        self.core.track(handle);
    }
}

#[async_trait]
impl ExplorePolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn load_config(&self, params: &PolicyParams) -> Result<(), ConfigError> {
        let parsed = RandomSettings::from_params(params)?;
        let shell = parsed.shell_enabled();
        info!(
            policy = Self::NAME,
            min = ?parsed.window.min(),
            max = ?parsed.window.max(),
            fault_probability = parsed.fault_action_probability,
            prioritized = parsed.prioritized_entities.len(),
            proc_policy = parsed.proc_policy.name(),
            shell,
            "loaded config"
        );
        let mut current = self.settings.write();
        *current = parsed;
        if shell {
            self.start_shell_routine();
        }
        Ok(())
    }

    fn queue_event(&self, event: Event) {
        let window = self.settings.read().window_for(event.entity_id());
        let now = Instant::now();

        let mut last_due = self.last_due.lock();
        if last_due.len() >= LAST_DUE_PRUNE_AT {
            last_due.retain(|_, due| *due > now);
        }
        let pick = match last_due.get(event.entity_id()) {
            Some(&prev) if prev > now => DelayPick::UniformNotBefore(prev),
            _ => DelayPick::Uniform,
        };
        let entity = event.entity_id().to_string();
        let due = self.core.queue().enqueue(Arc::new(event), window, pick);
        last_due.insert(entity, due);
    }

    fn action_chan(&self) -> Option<mpsc::Receiver<Action>> {
        self.core.take_actions()
    }

    async fn shutdown(&self) {
        self.core.shutdown().await;
    }
}

fn decide(settings: &RandomSettings, event: Arc<Event>) -> Action {
    if event.class() == EventClass::ProcSet {
        return match settings.proc_policy.action(Arc::clone(&event)) {
            Ok(action) => action,
            Err(e) => {
                warn!(entity = %event.entity_id(), error = %e, "cannot build sched action, using default");
                event.default_action()
            }
        };
    }

    match Arc::clone(&event).default_fault_action() {
        Some(fault) if rand::rng().random_bool(settings.fault_action_probability) => {
            debug!(entity = %event.entity_id(), class = %fault.class(), "injecting fault");
            fault
        }
        _ => event.default_action(),
    }
}

async fn shell_routine(
    settings: Arc<RwLock<RandomSettings>>,
    running: Arc<AtomicBool>,
    actions: mpsc::Sender<Action>,
    token: CancellationToken,
) {
    loop {
        let Some((interval, _)) = shell_command(&settings, &running) else {
            return;
        };
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        // Settings may have been reloaded while sleeping.
        let Some((_, command)) = shell_command(&settings, &running) else {
            return;
        };

        let mut comments = OptionMap::new();
        comments.insert("comment".into(), "injected by the random explorer".into());
        debug!(%command, "injecting shell action");
        tokio::select! {
            _ = token.cancelled() => break,
            sent = actions.send(Action::shell(command, comments)) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
    running.store(false, Ordering::Release);
}

/// Current shell interval and command. Clears `running` under the settings
/// lock when the routine is disabled.
fn shell_command(
    settings: &RwLock<RandomSettings>,
    running: &AtomicBool,
) -> Option<(Duration, String)> {
    let s = settings.read();
    match (&s.shell_action_command, s.shell_action_interval) {
        (Some(cmd), interval) if !interval.is_zero() => Some((interval, cmd.clone())),
        _ => {
            running.store(false, Ordering::Release);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{ActionClass, SHELL_ACTION_ENTITY};
    use serde_json::json;

    fn params(v: serde_json::Value) -> PolicyParams {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_max_defaults_to_min() {
        let s = RandomSettings::from_params(&params(json!({"minInterval": "20ms"}))).unwrap();
        assert_eq!(s.window.min(), Duration::from_millis(20));
        assert_eq!(s.window.max(), Duration::from_millis(20));
    }

    #[test]
    fn test_config_errors() {
        let cases = [
            (json!({"minInterval": "50ms", "maxInterval": "10ms"}), "config_inverted_interval"),
            (json!({"faultActionProbability": 1.5}), "config_invalid_probability"),
            (json!({"faultActionProbability": -0.1}), "config_invalid_probability"),
            (json!({"shellActionCommand": "echo hi"}), "config_shell_interval_required"),
            (json!({"procPolicy": "nope"}), "config_unknown_proc_policy"),
            (json!({"minInterval": "-1ms"}), "config_invalid_duration"),
        ];
        for (input, label) in cases {
            let err = RandomSettings::from_params(&params(input.clone())).unwrap_err();
            assert_eq!(err.as_label(), label, "{input}");
        }
    }

    #[test]
    fn test_prioritized_window_is_shorter() {
        let s = RandomSettings::from_params(&params(json!({
            "minInterval": "100ms",
            "maxInterval": "200ms",
            "prioritizedEntities": ["leader"]
        })))
        .unwrap();
        let w = s.window_for("leader");
        assert_eq!(w.min(), Duration::from_millis(80));
        assert_eq!(w.max(), Duration::from_millis(160));
        assert_eq!(s.window_for("follower"), s.window);
    }

    #[test]
    fn test_decide_always_faults_at_one() {
        let s = RandomSettings {
            fault_action_probability: 1.0,
            ..RandomSettings::default()
        };
        let ev = Arc::new(Event::packet("n1", "n1", "n2", OptionMap::new()));
        assert_eq!(decide(&s, ev).class(), ActionClass::PacketFault);

        let log = Arc::new(Event::log("n1", "hello"));
        assert_eq!(decide(&s, log).class(), ActionClass::Nop);
    }

    #[test]
    fn test_decide_never_faults_at_zero() {
        let s = RandomSettings::default();
        for _ in 0..20 {
            let ev = Arc::new(Event::packet("n1", "n1", "n2", OptionMap::new()));
            assert_eq!(decide(&s, ev).class(), ActionClass::EventAcceptance);
        }
    }

    #[test]
    fn test_decide_proc_set() {
        let ev = Arc::new(Event::proc_set("n1", ["10", "11"], OptionMap::new()));
        let act = decide(&RandomSettings::default(), ev);
        assert_eq!(act.class(), ActionClass::ProcSetSched);
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_entity_order_preserved() {
        let policy = RandomPolicy::new(QueueSettings::default());
        policy
            .load_config(&params(json!({"minInterval": "30ms", "maxInterval": "100ms"})))
            .unwrap();
        let mut rx = policy.action_chan().unwrap();

        let events: Vec<Event> = (0..20)
            .map(|i| Event::packet(format!("e{}", i % 2), "a", "b", OptionMap::new()))
            .collect();
        for ev in &events {
            policy.queue_event(ev.clone());
        }

        let mut seen: HashMap<String, Vec<String>> = HashMap::new();
        for _ in 0..events.len() {
            let act = rx.recv().await.unwrap();
            seen.entry(act.entity_id().to_string())
                .or_default()
                .push(act.event_id().unwrap().to_string());
        }
        for entity in ["e0", "e1"] {
            let expected: Vec<String> = events
                .iter()
                .filter(|e| e.entity_id() == entity)
                .map(|e| e.id().to_string())
                .collect();
            assert_eq!(seen[entity], expected);
        }
        policy.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shell_routine_emits_actions() {
        let policy = RandomPolicy::new(QueueSettings::default());
        policy
            .load_config(&params(json!({
                "shellActionInterval": "100ms",
                "shellActionCommand": "true"
            })))
            .unwrap();
        let mut rx = policy.action_chan().unwrap();

        for _ in 0..2 {
            let act = rx.recv().await.unwrap();
            assert_eq!(act.class(), ActionClass::Shell);
            assert_eq!(act.entity_id(), SHELL_ACTION_ENTITY);
            assert_eq!(act.option()["command"], "true");
        }
        policy.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shell_routine_stops_on_reload_mid_interval() {
        let policy = RandomPolicy::new(QueueSettings::default());
        let shell = params(json!({
            "shellActionInterval": "100ms",
            "shellActionCommand": "true"
        }));
        policy.load_config(&shell).unwrap();
        let mut rx = policy.action_chan().unwrap();

        tokio::time::sleep(Duration::from_millis(40)).await;
        policy.load_config(&params(json!({}))).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(rx.try_recv().is_err());
        assert!(!policy.shell_running.load(Ordering::Acquire));

        policy.load_config(&shell).unwrap();
        let act = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(act.class(), ActionClass::Shell);
        policy.shutdown().await;
    }
}
