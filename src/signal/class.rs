//! Closed sets of event and action classes.
//!
//! The class name doubles as the `class` discriminator on the wire, so the
//! strings returned by `as_str` are part of the protocol.

use std::fmt;

/// Whether a signal travels inspector → orchestrator or back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalType {
    /// Reported by an inspector.
    Event,
    /// Decided by the orchestrator.
    Action,
}

impl SignalType {
    /// Wire value of the `type` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Event => "event",
            SignalType::Action => "action",
        }
    }

    /// Parses the `type` field.
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "event" => Some(SignalType::Event),
            "action" => Some(SignalType::Action),
            _ => None,
        }
    }
}

/// Every event kind an inspector can report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventClass {
    /// Placeholder event; also used to represent a cause known only by id.
    Nop,
    /// Fire-and-forget log line.
    Log,
    /// A packet intercepted between two entities.
    Packet,
    /// A hooked filesystem operation.
    Filesystem,
    /// A snapshot of the processes an inspector can reschedule.
    ProcSet,
    /// A function call or return observed by a language agent.
    Function,
}

impl EventClass {
    /// All known event classes, in registration order.
    pub const ALL: [EventClass; 6] = [
        EventClass::Nop,
        EventClass::Log,
        EventClass::Packet,
        EventClass::Filesystem,
        EventClass::ProcSet,
        EventClass::Function,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventClass::Nop => "NopEvent",
            EventClass::Log => "LogEvent",
            EventClass::Packet => "PacketEvent",
            EventClass::Filesystem => "FilesystemEvent",
            EventClass::ProcSet => "ProcSetEvent",
            EventClass::Function => "FunctionEvent",
        }
    }

    /// Whether inspectors block on events of this class unless told otherwise.
    pub fn deferred_by_default(&self) -> bool {
        matches!(
            self,
            EventClass::Packet | EventClass::Filesystem | EventClass::Function
        )
    }
}

impl fmt::Display for EventClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every action kind the orchestrator can decide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionClass {
    /// Bookkeeping only; executed (as a no-op) on the orchestrator.
    Nop,
    /// Let the deferred event proceed.
    EventAcceptance,
    /// Drop the intercepted packet.
    PacketFault,
    /// Fail the hooked filesystem operation.
    FilesystemFault,
    /// Apply scheduling attributes to a set of processes.
    ProcSetSched,
    /// Run a command on the orchestrator host.
    Shell,
}

impl ActionClass {
    /// All known action classes, in registration order.
    pub const ALL: [ActionClass; 6] = [
        ActionClass::Nop,
        ActionClass::EventAcceptance,
        ActionClass::PacketFault,
        ActionClass::FilesystemFault,
        ActionClass::ProcSetSched,
        ActionClass::Shell,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionClass::Nop => "NopAction",
            ActionClass::EventAcceptance => "EventAcceptanceAction",
            ActionClass::PacketFault => "PacketFaultAction",
            ActionClass::FilesystemFault => "FilesystemFaultAction",
            ActionClass::ProcSetSched => "ProcSetSchedAction",
            ActionClass::Shell => "ShellAction",
        }
    }

    /// Whether actions of this class never leave the orchestrator.
    pub fn orchestrator_side_only(&self) -> bool {
        matches!(self, ActionClass::Nop | ActionClass::Shell)
    }
}

impl fmt::Display for ActionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered class of either direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalClass {
    /// Event class.
    Event(EventClass),
    /// Action class.
    Action(ActionClass),
}

impl SignalClass {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalClass::Event(c) => c.as_str(),
            SignalClass::Action(c) => c.as_str(),
        }
    }

    /// Direction of signals of this class.
    pub fn signal_type(&self) -> SignalType {
        match self {
            SignalClass::Event(_) => SignalType::Event,
            SignalClass::Action(_) => SignalType::Action,
        }
    }
}

/// Filesystem operations reported by `FilesystemEvent`.
///
/// Read-only operations are reported after they ran, mutating ones before.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilesystemOp {
    /// `post-read`
    PostRead,
    /// `post-opendir`
    PostOpenDir,
    /// `pre-write`
    PreWrite,
    /// `pre-mkdir`
    PreMkdir,
    /// `pre-rmdir`
    PreRmdir,
    /// `pre-fsync`
    PreFsync,
}

impl FilesystemOp {
    /// Wire value of the `op` option.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilesystemOp::PostRead => "post-read",
            FilesystemOp::PostOpenDir => "post-opendir",
            FilesystemOp::PreWrite => "pre-write",
            FilesystemOp::PreMkdir => "pre-mkdir",
            FilesystemOp::PreRmdir => "pre-rmdir",
            FilesystemOp::PreFsync => "pre-fsync",
        }
    }
}

/// Whether a `FunctionEvent` marks entry or exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FunctionEventType {
    /// Entry.
    Call,
    /// Exit.
    Return,
}

impl FunctionEventType {
    /// Wire value of the `function_event_type` option.
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionEventType::Call => "call",
            FunctionEventType::Return => "return",
        }
    }
}
