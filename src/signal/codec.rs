//! Transport-neutral map representation of signals.
//!
//! ```text
//! {
//!   "uuid":        "<uuid v4>",
//!   "entity":      "<entity id>",
//!   "type":        "event" | "action",
//!   "class":       "PacketEvent" | "EventAcceptanceAction" | ...,
//!   "option":      { ... },
//!   "deferred":    bool,            // events only
//!   "replay_hint": "<hint>",        // events only, when explicit
//!   "event_uuid":  "<uuid v4>"      // actions answering an event
//! }
//! ```
//!
//! The same map, serialized as JSON, is the payload of binary RPC frames.
//! Decoding resolves `class` through a [`SignalRegistry`](super::SignalRegistry).

use serde_json::Value;

use crate::error::SignalError;

use super::{
    OptionMap,
    action::Action,
    class::{ActionClass, EventClass, SignalType},
    event::Event,
};

/// Either direction of the protocol.
#[derive(Clone, Debug)]
pub enum Signal {
    /// Inspector → orchestrator.
    Event(Event),
    /// Orchestrator → inspector.
    Action(Action),
}

impl Signal {
    /// Unique id.
    pub fn id(&self) -> &str {
        match self {
            Signal::Event(e) => e.id(),
            Signal::Action(a) => a.id(),
        }
    }

    /// Map representation.
    pub fn to_map(&self) -> OptionMap {
        match self {
            Signal::Event(e) => e.to_map(),
            Signal::Action(a) => a.to_map(),
        }
    }

    /// JSON bytes of the map representation.
    pub fn to_json_vec(&self) -> Vec<u8> {
        // A map of JSON values always serializes.
        serde_json::to_vec(&Value::Object(self.to_map())).unwrap_or_default()
    }
}

impl From<Event> for Signal {
    fn from(e: Event) -> Self {
        Signal::Event(e)
    }
}

impl From<Action> for Signal {
    fn from(a: Action) -> Self {
        Signal::Action(a)
    }
}

impl Event {
    /// Map representation.
    pub fn to_map(&self) -> OptionMap {
        let mut m = base_map(&self.id, &self.entity, SignalType::Event, self.class.as_str());
        m.insert("option".into(), Value::Object(self.option.clone()));
        m.insert("deferred".into(), Value::Bool(self.deferred));
        if let Some(hint) = &self.replay_hint {
            m.insert("replay_hint".into(), Value::String(hint.clone()));
        }
        m
    }

    pub(crate) fn from_map(class: EventClass, m: &OptionMap) -> Result<Self, SignalError> {
        expect_type(m, SignalType::Event)?;
        Ok(Self {
            id: required_str(m, "uuid")?,
            entity: required_str(m, "entity")?,
            class,
            deferred: m.get("deferred").and_then(Value::as_bool).unwrap_or(false),
            option: option_of(m)?,
            replay_hint: optional_str(m, "replay_hint")?,
            arrived: None,
        })
    }
}

impl Action {
    /// Map representation. The causing event travels by id only.
    pub fn to_map(&self) -> OptionMap {
        let mut m = base_map(&self.id, &self.entity, SignalType::Action, self.class.as_str());
        m.insert("option".into(), Value::Object(self.option.clone()));
        if let Some(id) = self.event_id() {
            m.insert("event_uuid".into(), Value::String(id.to_string()));
        }
        m
    }

    pub(crate) fn from_map(class: ActionClass, m: &OptionMap) -> Result<Self, SignalError> {
        expect_type(m, SignalType::Action)?;
        Ok(Self {
            id: required_str(m, "uuid")?,
            entity: required_str(m, "entity")?,
            class,
            option: option_of(m)?,
            event_uuid: optional_str(m, "event_uuid")?,
            cause: None,
            arrived: None,
            triggered: None,
        })
    }
}

fn base_map(id: &str, entity: &str, ty: SignalType, class: &str) -> OptionMap {
    let mut m = OptionMap::new();
    m.insert("uuid".into(), Value::String(id.to_string()));
    m.insert("entity".into(), Value::String(entity.to_string()));
    m.insert("type".into(), Value::String(ty.as_str().into()));
    m.insert("class".into(), Value::String(class.to_string()));
    m
}

fn expect_type(m: &OptionMap, want: SignalType) -> Result<(), SignalError> {
    let raw = required_str(m, "type")?;
    match SignalType::from_name(&raw) {
        Some(t) if t == want => Ok(()),
        _ => Err(SignalError::InvalidField {
            field: "type",
            reason: format!("expected {:?}, got {raw:?}", want.as_str()),
        }),
    }
}

pub(crate) fn required_str(m: &OptionMap, field: &'static str) -> Result<String, SignalError> {
    match m.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(SignalError::InvalidField {
            field,
            reason: "expected a string".into(),
        }),
        None => Err(SignalError::MissingField { field }),
    }
}

fn optional_str(m: &OptionMap, field: &'static str) -> Result<Option<String>, SignalError> {
    match m.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(SignalError::InvalidField {
            field,
            reason: "expected a string".into(),
        }),
    }
}

fn option_of(m: &OptionMap) -> Result<OptionMap, SignalError> {
    match m.get("option") {
        None | Some(Value::Null) => Ok(OptionMap::new()),
        Some(Value::Object(o)) => Ok(o.clone()),
        Some(_) => Err(SignalError::InvalidField {
            field: "option",
            reason: "expected an object".into(),
        }),
    }
}
