//! # Signal class registry.
//!
//! Maps wire class names to [`SignalClass`]. Decoding consults the registry,
//! so a class that was not registered at startup cannot be received.
//!
//! The registry is owned by a [`Runtime`](crate::Runtime) and handed to the
//! transports that decode signals; there is no process-wide instance.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::error::SignalError;

use super::{
    OptionMap,
    action::Action,
    class::{ActionClass, EventClass, SignalClass},
    codec::{Signal, required_str},
    event::Event,
};

/// Name → class lookup used when decoding signals.
#[derive(Debug, Default)]
pub struct SignalRegistry {
    classes: RwLock<HashMap<String, SignalClass>>,
}

impl SignalRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with every built-in event and action class.
    pub fn with_known_signals() -> Self {
        let reg = Self::new();
        for c in EventClass::ALL {
            // Built-in names are distinct.
            let _ = reg.register(c.as_str(), SignalClass::Event(c));
        }
        for c in ActionClass::ALL {
            let _ = reg.register(c.as_str(), SignalClass::Action(c));
        }
        reg
    }

    /// Registers `name`. Registering a name twice is an error.
    pub fn register(&self, name: &str, class: SignalClass) -> Result<(), SignalError> {
        let mut classes = self.classes.write();
        if classes.contains_key(name) {
            return Err(SignalError::DuplicateClass {
                name: name.to_string(),
            });
        }
        debug!(name, "registering signal class");
        classes.insert(name.to_string(), class);
        Ok(())
    }

    /// Looks up `name`.
    pub fn get(&self, name: &str) -> Option<SignalClass> {
        self.classes.read().get(name).copied()
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }

    /// Decodes a map representation.
    pub fn decode_map(&self, m: &OptionMap) -> Result<Signal, SignalError> {
        let name = required_str(m, "class")?;
        match self.get(&name) {
            Some(SignalClass::Event(c)) => Ok(Signal::Event(Event::from_map(c, m)?)),
            Some(SignalClass::Action(c)) => Ok(Signal::Action(Action::from_map(c, m)?)),
            None => Err(SignalError::UnknownClass { name }),
        }
    }

    /// Decodes JSON bytes of a map representation.
    pub fn decode_json(&self, bytes: &[u8]) -> Result<Signal, SignalError> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| SignalError::Malformed {
            reason: e.to_string(),
        })?;
        match value {
            Value::Object(m) => self.decode_map(&m),
            _ => Err(SignalError::Malformed {
                reason: "top-level value is not an object".into(),
            }),
        }
    }

    /// Decodes JSON bytes that must hold an event.
    pub fn decode_event(&self, bytes: &[u8]) -> Result<Event, SignalError> {
        match self.decode_json(bytes)? {
            Signal::Event(e) => Ok(e),
            Signal::Action(a) => Err(SignalError::InvalidField {
                field: "type",
                reason: format!("expected an event, got {}", a.class()),
            }),
        }
    }

    /// Decodes JSON bytes that must hold an action.
    pub fn decode_action(&self, bytes: &[u8]) -> Result<Action, SignalError> {
        match self.decode_json(bytes)? {
            Signal::Action(a) => Ok(a),
            Signal::Event(e) => Err(SignalError::InvalidField {
                field: "type",
                reason: format!("expected an action, got {}", e.class()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::class::{FilesystemOp, FunctionEventType};
    use std::sync::Arc;

    fn all_events() -> Vec<Event> {
        let mut hinted = Event::packet("n1", "n1", "n2", OptionMap::new());
        hinted.set_replay_hint("hint-n1-0");
        vec![
            Event::nop("a"),
            Event::log("a", "line"),
            hinted,
            Event::filesystem("fs", FilesystemOp::PostRead, "/etc", OptionMap::new()),
            Event::proc_set("p", ["1", "2", "3"], OptionMap::new()),
            Event::function("j", "run", FunctionEventType::Return, Some("main".into())),
        ]
    }

    #[test]
    fn test_known_signals_registered() {
        let reg = SignalRegistry::with_known_signals();
        assert_eq!(reg.len(), EventClass::ALL.len() + ActionClass::ALL.len());
        assert_eq!(
            reg.get("PacketEvent"),
            Some(SignalClass::Event(EventClass::Packet))
        );
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let reg = SignalRegistry::with_known_signals();
        let err = reg
            .register("ShellAction", SignalClass::Action(ActionClass::Shell))
            .unwrap_err();
        assert_eq!(err.as_label(), "signal_duplicate_class");
    }

    #[test]
    fn test_event_roundtrip_keeps_identity() {
        let reg = SignalRegistry::with_known_signals();
        for ev in all_events() {
            let bytes = Signal::Event(ev.clone()).to_json_vec();
            let back = reg.decode_event(&bytes).unwrap();
            assert_eq!(back.id(), ev.id());
            assert_eq!(back.class(), ev.class());
            assert!(back.equals(&ev), "{} did not round-trip", ev.class());
        }
    }

    #[test]
    fn test_action_roundtrip_keeps_event_id() {
        let reg = SignalRegistry::with_known_signals();
        for ev in all_events() {
            let ev = Arc::new(ev);
            let act = ev.clone().default_action();
            let back = reg.decode_action(&Signal::Action(act.clone()).to_json_vec()).unwrap();
            assert_eq!(back.id(), act.id());
            assert_eq!(back.event_id(), Some(ev.id()));
            assert!(back.event().is_none());
            assert!(back.equals(&act));
        }
    }

    #[test]
    fn test_unknown_class_is_rejected() {
        let reg = SignalRegistry::with_known_signals();
        let raw = br#"{"uuid":"u","entity":"e","type":"event","class":"TeleportEvent","option":{}}"#;
        let err = reg.decode_json(raw).unwrap_err();
        assert_eq!(
            err,
            SignalError::UnknownClass {
                name: "TeleportEvent".into()
            }
        );
    }

    #[test]
    fn test_empty_registry_rejects_everything() {
        let reg = SignalRegistry::new();
        let bytes = Signal::Event(Event::nop("a")).to_json_vec();
        assert!(matches!(
            reg.decode_json(&bytes),
            Err(SignalError::UnknownClass { .. })
        ));
    }

    #[test]
    fn test_type_mismatch_is_rejected() {
        let reg = SignalRegistry::with_known_signals();
        let raw = br#"{"uuid":"u","entity":"e","type":"action","class":"PacketEvent","option":{}}"#;
        let err = reg.decode_json(raw).unwrap_err();
        assert_eq!(err.as_label(), "signal_invalid_field");

        let bytes = Signal::Event(Event::nop("a")).to_json_vec();
        assert!(reg.decode_action(&bytes).is_err());
    }

    #[test]
    fn test_garbage_is_malformed() {
        let reg = SignalRegistry::with_known_signals();
        assert_eq!(
            reg.decode_json(b"[1,2]").unwrap_err().as_label(),
            "signal_malformed"
        );
        assert_eq!(
            reg.decode_json(b"{not json").unwrap_err().as_label(),
            "signal_malformed"
        );
    }
}
