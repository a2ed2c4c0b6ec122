//! # Events: what an inspector observed.
//!
//! An [`Event`] is reported once by an inspector and answered by at most one
//! [`Action`]. Deferred events block the inspector until that answer arrives;
//! the rest are fire-and-forget.
//!
//! ## Rules
//! - `id` and `entity` never change after construction.
//! - `arrived` is stamped once, by the receiving side.
//! - [`Event::default_action`] is total: deferred events are accepted,
//!   everything else gets an orchestrator-side `NopAction`.
//! - [`Event::default_fault_action`] only exists for packets and filesystem ops.

use std::sync::Arc;
use std::time::SystemTime;

use serde_json::Value;
use uuid::Uuid;

use crate::error::SignalError;

use super::{
    OptionMap,
    action::Action,
    class::{ActionClass, EventClass, FilesystemOp, FunctionEventType},
};

/// A signal from an inspector to the orchestrator.
#[derive(Clone, Debug)]
pub struct Event {
    pub(crate) id: String,
    pub(crate) entity: String,
    pub(crate) class: EventClass,
    pub(crate) deferred: bool,
    pub(crate) option: OptionMap,
    pub(crate) replay_hint: Option<String>,
    pub(crate) arrived: Option<SystemTime>,
}

impl Event {
    /// Creates an event of `class` with a fresh UUIDv4.
    ///
    /// Deferral follows [`EventClass::deferred_by_default`].
    pub fn new(class: EventClass, entity: impl Into<String>, option: OptionMap) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entity: entity.into(),
            class,
            deferred: class.deferred_by_default(),
            option,
            replay_hint: None,
            arrived: None,
        }
    }

    /// Overrides deferral.
    pub fn with_deferred(mut self, deferred: bool) -> Self {
        self.deferred = deferred;
        self
    }

    /// An empty, non-deferred event.
    pub fn nop(entity: impl Into<String>) -> Self {
        Self::new(EventClass::Nop, entity, OptionMap::new())
    }

    /// A fire-and-forget log line.
    pub fn log(entity: impl Into<String>, message: impl Into<String>) -> Self {
        let mut opt = OptionMap::new();
        opt.insert("message".into(), Value::String(message.into()));
        Self::new(EventClass::Log, entity, opt)
    }

    /// A packet from `src` to `dst`, intercepted by `entity`.
    pub fn packet(
        entity: impl Into<String>,
        src: impl Into<String>,
        dst: impl Into<String>,
        extra: OptionMap,
    ) -> Self {
        let mut opt = OptionMap::new();
        opt.insert("src_entity".into(), Value::String(src.into()));
        opt.insert("dst_entity".into(), Value::String(dst.into()));
        Self::new(EventClass::Packet, entity, merge(opt, extra))
    }

    /// A filesystem operation on `path`.
    pub fn filesystem(
        entity: impl Into<String>,
        op: FilesystemOp,
        path: impl Into<String>,
        extra: OptionMap,
    ) -> Self {
        let mut opt = OptionMap::new();
        opt.insert("op".into(), Value::String(op.as_str().into()));
        opt.insert("path".into(), Value::String(path.into()));
        Self::new(EventClass::Filesystem, entity, merge(opt, extra))
    }

    /// The set of PIDs an inspector can reschedule.
    ///
    /// PIDs are strings so the option bag survives JSON untouched.
    pub fn proc_set<I, S>(entity: impl Into<String>, procs: I, extra: OptionMap) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let procs: Vec<Value> = procs
            .into_iter()
            .map(|p| Value::String(p.into()))
            .collect();
        let mut opt = OptionMap::new();
        opt.insert("procs".into(), Value::Array(procs));
        Self::new(EventClass::ProcSet, entity, merge(opt, extra))
    }

    /// A function call or return.
    pub fn function(
        entity: impl Into<String>,
        function_name: impl Into<String>,
        ty: FunctionEventType,
        thread_name: Option<String>,
    ) -> Self {
        let mut opt = OptionMap::new();
        opt.insert("function_name".into(), Value::String(function_name.into()));
        opt.insert("function_event_type".into(), Value::String(ty.as_str().into()));
        if let Some(thread) = thread_name {
            opt.insert("thread_name".into(), Value::String(thread));
        }
        Self::new(EventClass::Function, entity, opt)
    }

    /// Unique id (UUIDv4 text).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Reporting inspector.
    pub fn entity_id(&self) -> &str {
        &self.entity
    }

    /// Event class.
    pub fn class(&self) -> EventClass {
        self.class
    }

    /// Whether the inspector waits for an action.
    pub fn deferred(&self) -> bool {
        self.deferred
    }

    /// Class-specific payload.
    pub fn option(&self) -> &OptionMap {
        &self.option
    }

    /// When the orchestrator received this event, if it did.
    pub fn arrived_time(&self) -> Option<SystemTime> {
        self.arrived
    }

    /// Stamps the arrival time. Returns `false` if it was already set.
    pub fn mark_arrived(&mut self, at: SystemTime) -> bool {
        if self.arrived.is_some() {
            return false;
        }
        self.arrived = Some(at);
        true
    }

    /// A time- and randomness-free summary used for replayable scheduling.
    ///
    /// An explicit hint wins; otherwise the hint is derived from class,
    /// entity and the option bag (keys are sorted, so the result is stable).
    pub fn replay_hint(&self) -> String {
        if let Some(h) = &self.replay_hint {
            return h.clone();
        }
        let opt = serde_json::to_string(&self.option).unwrap_or_default();
        format!("{}/{}/{}", self.class, self.entity, opt)
    }

    /// Sets an explicit replay hint.
    pub fn set_replay_hint(&mut self, hint: impl Into<String>) {
        self.replay_hint = Some(hint.into());
    }

    /// PIDs of a `ProcSetEvent`.
    pub fn procs(&self) -> Result<Vec<String>, SignalError> {
        let raw = self
            .option
            .get("procs")
            .ok_or(SignalError::MissingField { field: "procs" })?;
        let list = raw.as_array().ok_or_else(|| SignalError::InvalidField {
            field: "procs",
            reason: "expected an array".into(),
        })?;
        list.iter()
            .map(|v| match v {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                other => Err(SignalError::InvalidField {
                    field: "procs",
                    reason: format!("non-string pid {other}"),
                }),
            })
            .collect()
    }

    /// The action taken when nothing interesting is decided.
    pub fn default_action(self: Arc<Self>) -> Action {
        if self.deferred {
            Action::caused_by(ActionClass::EventAcceptance, self, OptionMap::new())
        } else {
            Action::caused_by(ActionClass::Nop, self, OptionMap::new())
        }
    }

    /// The negative outcome for this event, if its class has one.
    pub fn default_fault_action(self: Arc<Self>) -> Option<Action> {
        if !self.deferred {
            return None;
        }
        match self.class {
            EventClass::Packet => Some(Action::caused_by(
                ActionClass::PacketFault,
                self,
                OptionMap::new(),
            )),
            EventClass::Filesystem => Some(Action::caused_by(
                ActionClass::FilesystemFault,
                self,
                OptionMap::new(),
            )),
            _ => None,
        }
    }

    /// Compares every field except `id` and arrival time.
    pub fn equals(&self, other: &Event) -> bool {
        let mut a = self.to_map();
        let mut b = other.to_map();
        a.remove("uuid");
        b.remove("uuid");
        a == b
    }
}

fn merge(mut base: OptionMap, extra: OptionMap) -> OptionMap {
    for (k, v) in extra {
        base.insert(k, v);
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_default_actions() {
        let ev = Arc::new(Event::packet("n1", "n1", "n2", OptionMap::new()));
        assert!(ev.deferred());

        let act = ev.clone().default_action();
        assert_eq!(act.class(), ActionClass::EventAcceptance);
        assert_eq!(act.event_id(), Some(ev.id()));

        let fault = ev.clone().default_fault_action().expect("packet has a fault");
        assert_eq!(fault.class(), ActionClass::PacketFault);
        assert_eq!(fault.entity_id(), "n1");
    }

    #[test]
    fn test_non_deferred_gets_nop() {
        let ev = Arc::new(Event::log("n1", "hello"));
        assert!(!ev.deferred());
        let act = ev.clone().default_action();
        assert_eq!(act.class(), ActionClass::Nop);
        assert!(ev.default_fault_action().is_none());
    }

    #[test]
    fn test_function_event_has_no_fault() {
        let ev = Arc::new(Event::function("j1", "foo", FunctionEventType::Call, None));
        assert!(ev.deferred());
        assert!(ev.default_fault_action().is_none());
    }

    #[test]
    fn test_equals_ignores_id_and_arrival() {
        let mut a = Event::filesystem("fs", FilesystemOp::PreWrite, "/x", OptionMap::new());
        let b = Event::filesystem("fs", FilesystemOp::PreWrite, "/x", OptionMap::new());
        a.mark_arrived(SystemTime::now());
        assert_ne!(a.id(), b.id());
        assert!(a.equals(&b));

        let c = Event::filesystem("fs", FilesystemOp::PreMkdir, "/x", OptionMap::new());
        assert!(!a.equals(&c));
    }

    #[test]
    fn test_arrival_is_stamped_once() {
        let mut ev = Event::nop("e");
        let t0 = SystemTime::now();
        assert!(ev.mark_arrived(t0));
        assert!(!ev.mark_arrived(SystemTime::now()));
        assert_eq!(ev.arrived_time(), Some(t0));
    }

    #[test]
    fn test_replay_hint_is_stable_across_instances() {
        let a = Event::packet("n1", "n1", "n2", OptionMap::new());
        let b = Event::packet("n1", "n1", "n2", OptionMap::new());
        assert_eq!(a.replay_hint(), b.replay_hint());

        let mut c = a.clone();
        c.set_replay_hint("hint-0");
        assert_eq!(c.replay_hint(), "hint-0");
    }

    #[test]
    fn test_procs_accepts_numbers() {
        let mut ev = Event::proc_set("p", ["1", "2"], OptionMap::new());
        assert_eq!(ev.procs().unwrap(), vec!["1", "2"]);

        ev.option
            .insert("procs".into(), serde_json::json!([3, "4"]));
        assert_eq!(ev.procs().unwrap(), vec!["3", "4"]);

        ev.option.insert("procs".into(), serde_json::json!({}));
        assert!(ev.procs().is_err());
    }
}
