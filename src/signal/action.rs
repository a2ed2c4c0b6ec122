//! # Actions: what the orchestrator decided.
//!
//! An [`Action`] either answers a specific [`Event`] (and holds it by shared
//! reference) or stands alone, like a periodically injected shell command.
//!
//! Some classes run on the orchestrator instead of being sent to an inspector;
//! [`Action::as_orchestrator_side`] exposes that capability.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::SignalError;

use super::{
    OptionMap,
    class::{ActionClass, EventClass},
    event::Event,
    sched::SchedAttr,
};

/// Placeholder entity for actions that belong to no inspector.
pub const SHELL_ACTION_ENTITY: &str = "_racevisor_shell_action_entity";

/// A signal from the orchestrator to an inspector (or to itself).
#[derive(Clone, Debug)]
pub struct Action {
    pub(crate) id: String,
    pub(crate) entity: String,
    pub(crate) class: ActionClass,
    pub(crate) option: OptionMap,
    pub(crate) event_uuid: Option<String>,
    pub(crate) cause: Option<Arc<Event>>,
    pub(crate) arrived: Option<SystemTime>,
    pub(crate) triggered: Option<SystemTime>,
}

impl Action {
    pub(crate) fn caused_by(class: ActionClass, event: Arc<Event>, option: OptionMap) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entity: event.entity_id().to_string(),
            class,
            option,
            event_uuid: Some(event.id().to_string()),
            cause: Some(event),
            arrived: None,
            triggered: None,
        }
    }

    /// A no-op answer. `cause` may be absent for standalone bookkeeping.
    pub fn nop(entity: impl Into<String>, cause: Option<Arc<Event>>) -> Self {
        match cause {
            Some(ev) => Self::caused_by(ActionClass::Nop, ev, OptionMap::new()),
            None => Self {
                id: Uuid::new_v4().to_string(),
                entity: entity.into(),
                class: ActionClass::Nop,
                option: OptionMap::new(),
                event_uuid: None,
                cause: None,
                arrived: None,
                triggered: None,
            },
        }
    }

    /// Lets a deferred event proceed.
    pub fn event_acceptance(event: Arc<Event>) -> Result<Self, SignalError> {
        if !event.deferred() {
            return Err(SignalError::NotDeferred {
                event: event.id().to_string(),
            });
        }
        Ok(Self::caused_by(
            ActionClass::EventAcceptance,
            event,
            OptionMap::new(),
        ))
    }

    /// Drops an intercepted packet.
    pub fn packet_fault(event: Arc<Event>) -> Result<Self, SignalError> {
        expect_class(&event, EventClass::Packet)?;
        Ok(Self::caused_by(ActionClass::PacketFault, event, OptionMap::new()))
    }

    /// Fails a hooked filesystem operation.
    pub fn filesystem_fault(event: Arc<Event>) -> Result<Self, SignalError> {
        expect_class(&event, EventClass::Filesystem)?;
        Ok(Self::caused_by(
            ActionClass::FilesystemFault,
            event,
            OptionMap::new(),
        ))
    }

    /// Reschedules the processes of a `ProcSetEvent`.
    pub fn proc_set_sched(
        event: Arc<Event>,
        attrs: &BTreeMap<String, SchedAttr>,
    ) -> Result<Self, SignalError> {
        expect_class(&event, EventClass::ProcSet)?;
        let attrs = serde_json::to_value(attrs).map_err(|e| SignalError::InvalidField {
            field: "attrs",
            reason: e.to_string(),
        })?;
        let mut opt = OptionMap::new();
        opt.insert("attrs".into(), attrs);
        Ok(Self::caused_by(ActionClass::ProcSetSched, event, opt))
    }

    /// Runs `command` through `sh -c` on the orchestrator host.
    ///
    /// `comments` is free-form context for trace readers; it is not passed
    /// to the command.
    pub fn shell(command: impl Into<String>, comments: OptionMap) -> Self {
        let mut opt = OptionMap::new();
        opt.insert("command".into(), Value::String(command.into()));
        opt.insert("comments".into(), Value::Object(comments));
        Self {
            id: Uuid::new_v4().to_string(),
            entity: SHELL_ACTION_ENTITY.to_string(),
            class: ActionClass::Shell,
            option: opt,
            event_uuid: None,
            cause: None,
            arrived: None,
            triggered: None,
        }
    }

    /// Unique id (UUIDv4 text).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Destination inspector.
    pub fn entity_id(&self) -> &str {
        &self.entity
    }

    /// Action class.
    pub fn class(&self) -> ActionClass {
        self.class
    }

    /// Class-specific payload.
    pub fn option(&self) -> &OptionMap {
        &self.option
    }

    /// The causing event, when this side constructed the action.
    pub fn event(&self) -> Option<&Arc<Event>> {
        self.cause.as_ref()
    }

    /// Id of the causing event.
    ///
    /// Decoded actions carry only the id, so this works on both sides.
    pub fn event_id(&self) -> Option<&str> {
        match &self.cause {
            Some(ev) => Some(ev.id()),
            None => self.event_uuid.as_deref(),
        }
    }

    /// When the orchestrator released this action.
    pub fn triggered_time(&self) -> Option<SystemTime> {
        self.triggered
    }

    /// Stamps the release time.
    pub fn set_triggered_time(&mut self, at: SystemTime) {
        self.triggered = Some(at);
    }

    /// When the inspector received this action, if it did.
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

    /// Scheduling attributes of a `ProcSetSchedAction`, keyed by PID.
    pub fn sched_attrs(&self) -> Result<BTreeMap<String, SchedAttr>, SignalError> {
        let raw = self
            .option
            .get("attrs")
            .ok_or(SignalError::MissingField { field: "attrs" })?;
        serde_json::from_value(raw.clone()).map_err(|e| SignalError::InvalidField {
            field: "attrs",
            reason: e.to_string(),
        })
    }

    /// Compares every field except `id` and arrival time.
    pub fn equals(&self, other: &Action) -> bool {
        let mut a = self.to_map();
        let mut b = other.to_map();
        a.remove("uuid");
        b.remove("uuid");
        a == b
    }

    /// The orchestrator-side capability, if this class has one.
    pub fn as_orchestrator_side(&self) -> Option<OrchestratorSide<'_>> {
        match self.class {
            ActionClass::Nop => Some(OrchestratorSide::Nop),
            ActionClass::Shell => {
                let command = self
                    .option
                    .get("command")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Some(OrchestratorSide::Shell { command })
            }
            _ => None,
        }
    }
}

/// Behaviour of actions that execute on the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrchestratorSide<'a> {
    /// Nothing to do.
    Nop,
    /// Run a command and wait for it.
    Shell {
        /// Command line for `sh -c`.
        command: &'a str,
    },
}

impl OrchestratorSide<'_> {
    /// Whether the action must not be forwarded to an inspector.
    pub fn orchestrator_side_only(&self) -> bool {
        true
    }

    /// Executes the action. Shell commands block until the child exits.
    pub async fn execute_on_orchestrator(&self) -> Result<(), SignalError> {
        match self {
            OrchestratorSide::Nop => Ok(()),
            OrchestratorSide::Shell { command } => run_shell(command).await,
        }
    }
}

async fn run_shell(command: &str) -> Result<(), SignalError> {
    if command.is_empty() {
        return Err(SignalError::ShellCommand {
            command: String::new(),
            reason: "empty command".into(),
        });
    }
    debug!(command, "starting shell action");
    let status = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(command)
        .status()
        .await
        .map_err(|e| SignalError::ShellCommand {
            command: command.to_string(),
            reason: e.to_string(),
        })?;
    debug!(command, %status, "finished shell action");
    if status.success() {
        Ok(())
    } else {
        Err(SignalError::ShellCommand {
            command: command.to_string(),
            reason: status.to_string(),
        })
    }
}

fn expect_class(event: &Event, expected: EventClass) -> Result<(), SignalError> {
    if event.class() == expected {
        Ok(())
    } else {
        Err(SignalError::ClassMismatch {
            expected: expected.as_str(),
            actual: event.class().as_str(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::class::FilesystemOp;
    use crate::signal::sched::SchedPolicy;

    #[test]
    fn test_acceptance_requires_deferred() {
        let ev = Arc::new(Event::log("e", "x"));
        let err = Action::event_acceptance(ev).unwrap_err();
        assert_eq!(err.as_label(), "signal_not_deferred");
    }

    #[test]
    fn test_fault_constructors_check_class() {
        let fs = Arc::new(Event::filesystem(
            "e",
            FilesystemOp::PreFsync,
            "/d",
            OptionMap::new(),
        ));
        assert!(Action::packet_fault(fs.clone()).is_err());
        let act = Action::filesystem_fault(fs).unwrap();
        assert_eq!(act.class(), ActionClass::FilesystemFault);
    }

    #[test]
    fn test_sched_attrs_roundtrip_through_option() {
        let ev = Arc::new(Event::proc_set("p", ["10", "11"], OptionMap::new()));
        let mut attrs = BTreeMap::new();
        attrs.insert("10".to_string(), SchedAttr::with_nice(SchedPolicy::Batch, 5));
        attrs.insert("11".to_string(), SchedAttr::normal());
        let act = Action::proc_set_sched(ev, &attrs).unwrap();
        assert_eq!(act.sched_attrs().unwrap(), attrs);
    }

    #[test]
    fn test_shell_is_orchestrator_side_only() {
        let act = Action::shell("true", OptionMap::new());
        assert_eq!(act.entity_id(), SHELL_ACTION_ENTITY);
        assert!(act.event_id().is_none());
        let side = act.as_orchestrator_side().unwrap();
        assert!(side.orchestrator_side_only());
        assert_eq!(side, OrchestratorSide::Shell { command: "true" });
    }

    #[test]
    fn test_acceptance_is_forwarded() {
        let ev = Arc::new(Event::packet("n", "n", "m", OptionMap::new()));
        let act = Action::event_acceptance(ev).unwrap();
        assert!(act.as_orchestrator_side().is_none());
    }

    #[tokio::test]
    async fn test_shell_execution_reports_exit_status() {
        let ok = Action::shell("exit 0", OptionMap::new());
        ok.as_orchestrator_side()
            .unwrap()
            .execute_on_orchestrator()
            .await
            .unwrap();

        let bad = Action::shell("exit 3", OptionMap::new());
        let err = bad
            .as_orchestrator_side()
            .unwrap()
            .execute_on_orchestrator()
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "signal_shell_command");
    }
}
