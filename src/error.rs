//! Error types used by the racevisor runtime.
//!
//! This module defines one enum per failure domain:
//!
//! - [`SignalError`]: malformed or unregistered signals, failed orchestrator-side execution.
//! - [`ConfigError`]: invalid policy names and parameters (fatal at startup).
//! - [`QueueError`]: invalid delay windows handed to the scheduler queue.
//! - [`TransportError`]: I/O and framing failures inside endpoint transports.
//! - [`OrchestratorError`]: invalid lifecycle transitions of the orchestrator.
//! - [`HistoryError`]: lookups into a history storage.
//!
//! Every type provides `as_label` (stable snake_case for logs) and `as_message`.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced while building, decoding or executing signals.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    /// The `class` discriminator is not present in the signal registry.
    #[error("unknown signal class {name:?}")]
    UnknownClass {
        /// Class name as found on the wire.
        name: String,
    },

    /// A class name was registered twice.
    #[error("signal class {name:?} is already registered")]
    DuplicateClass {
        /// Offending class name.
        name: String,
    },

    /// A required field is absent from the signal map.
    #[error("missing field {field:?}")]
    MissingField {
        /// Field name.
        field: &'static str,
    },

    /// A field is present but has the wrong shape.
    #[error("invalid field {field:?}: {reason}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// The payload could not be parsed as a signal at all.
    #[error("malformed signal: {reason}")]
    Malformed {
        /// Parser message.
        reason: String,
    },

    /// An acceptance action was requested for a fire-and-forget event.
    #[error("event {event} is not deferred")]
    NotDeferred {
        /// Event id.
        event: String,
    },

    /// An action constructor was handed an event of the wrong class.
    #[error("expected {expected} event, got {actual}")]
    ClassMismatch {
        /// Expected class name.
        expected: &'static str,
        /// Actual class name.
        actual: &'static str,
    },

    /// An orchestrator-side shell command failed to run or exited non-zero.
    #[error("shell command {command:?} failed: {reason}")]
    ShellCommand {
        /// Command line.
        command: String,
        /// Spawn error or exit status.
        reason: String,
    },
}

impl SignalError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use racevisor::SignalError;
    ///
    /// let err = SignalError::UnknownClass { name: "FooEvent".into() };
    /// assert_eq!(err.as_label(), "signal_unknown_class");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SignalError::UnknownClass { .. } => "signal_unknown_class",
            SignalError::DuplicateClass { .. } => "signal_duplicate_class",
            SignalError::MissingField { .. } => "signal_missing_field",
            SignalError::InvalidField { .. } => "signal_invalid_field",
            SignalError::Malformed { .. } => "signal_malformed",
            SignalError::NotDeferred { .. } => "signal_not_deferred",
            SignalError::ClassMismatch { .. } => "signal_class_mismatch",
            SignalError::ShellCommand { .. } => "signal_shell_command",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// # Configuration errors.
///
/// Returned by constructors and `load_config`; the caller is expected to
/// abort the run with a diagnostic.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// No policy is registered under this name.
    #[error("unknown explore policy {name:?}")]
    UnknownPolicy {
        /// Requested name.
        name: String,
    },

    /// A policy factory was registered twice.
    #[error("explore policy {name:?} is already registered")]
    DuplicatePolicy {
        /// Offending name.
        name: String,
    },

    /// A probability parameter is outside `[0, 1]`.
    #[error("{param} must be within [0, 1], got {value}")]
    InvalidProbability {
        /// Parameter name.
        param: String,
        /// Parsed value.
        value: f64,
    },

    /// A duration parameter could not be parsed or is negative.
    #[error("{param}: invalid duration {value:?}")]
    InvalidDuration {
        /// Parameter name.
        param: String,
        /// Raw value.
        value: String,
    },

    /// `min > max` for an interval pair.
    #[error("{min_param}({min:?}) exceeds {max_param}({max:?})")]
    InvertedInterval {
        /// Name of the lower bound parameter.
        min_param: &'static str,
        /// Lower bound.
        min: Duration,
        /// Name of the upper bound parameter.
        max_param: &'static str,
        /// Upper bound.
        max: Duration,
    },

    /// A shell command is configured without a positive injection interval.
    #[error("shellActionCommand {command:?} requires a positive shellActionInterval")]
    ShellIntervalRequired {
        /// Configured command.
        command: String,
    },

    /// `procPolicy` names no known process scheduling policy.
    #[error("unknown procPolicy {name:?}")]
    UnknownProcPolicy {
        /// Requested name.
        name: String,
    },

    /// A parameter has the wrong type.
    #[error("{param}: {reason}")]
    InvalidParam {
        /// Parameter name.
        param: String,
        /// What was expected.
        reason: String,
    },

    /// The configuration document could not be parsed.
    #[error("cannot parse configuration: {reason}")]
    Parse {
        /// Parser message.
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::UnknownPolicy { .. } => "config_unknown_policy",
            ConfigError::DuplicatePolicy { .. } => "config_duplicate_policy",
            ConfigError::InvalidProbability { .. } => "config_invalid_probability",
            ConfigError::InvalidDuration { .. } => "config_invalid_duration",
            ConfigError::InvertedInterval { .. } => "config_inverted_interval",
            ConfigError::ShellIntervalRequired { .. } => "config_shell_interval_required",
            ConfigError::UnknownProcPolicy { .. } => "config_unknown_proc_policy",
            ConfigError::InvalidParam { .. } => "config_invalid_param",
            ConfigError::Parse { .. } => "config_parse",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

/// # Errors produced by the scheduler queue.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The delay window has `min > max`.
    #[error("invalid delay window [{min:?}, {max:?}]")]
    InvalidWindow {
        /// Minimum delay.
        min: Duration,
        /// Maximum delay.
        max: Duration,
    },
}

impl QueueError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            QueueError::InvalidWindow { .. } => "queue_invalid_window",
        }
    }
}

/// # Errors produced by endpoint transports and transceivers.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Socket-level failure.
    #[error("i/o error: {reason}")]
    Io {
        /// OS error message.
        reason: String,
    },

    /// A frame header announced a payload above the configured limit.
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge {
        /// Announced length.
        len: usize,
        /// Configured limit.
        max: usize,
    },

    /// A frame payload did not decode into the expected signal.
    #[error("malformed message: {reason}")]
    Malformed {
        /// Decoder message.
        reason: String,
    },

    /// The peer or the local pump is gone.
    #[error("channel closed")]
    Closed,

    /// `start` was called twice.
    #[error("already started")]
    AlreadyStarted,

    /// Two transports of the same kind were attached to one multiplexer.
    #[error("transport {kind} attached twice")]
    DuplicateTransport {
        /// Transport kind label.
        kind: &'static str,
    },
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Io { .. } => "transport_io",
            TransportError::FrameTooLarge { .. } => "transport_frame_too_large",
            TransportError::Malformed { .. } => "transport_malformed",
            TransportError::Closed => "transport_closed",
            TransportError::AlreadyStarted => "transport_already_started",
            TransportError::DuplicateTransport { .. } => "transport_duplicate",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        self.to_string()
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io {
            reason: e.to_string(),
        }
    }
}

impl From<SignalError> for TransportError {
    fn from(e: SignalError) -> Self {
        TransportError::Malformed {
            reason: e.to_string(),
        }
    }
}

/// # Errors produced by the orchestrator lifecycle.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    /// The requested operation is not valid in the current state.
    #[error("cannot {op} while {state}")]
    InvalidState {
        /// Operation name.
        op: &'static str,
        /// Current state label.
        state: &'static str,
    },

    /// The policy's action channel was already taken by someone else.
    #[error("action channel of policy {policy:?} is already taken")]
    ActionChannelTaken {
        /// Policy name.
        policy: &'static str,
    },

    /// Building a policy from configuration failed.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// Starting a transport failed.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
}

impl OrchestratorError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            OrchestratorError::InvalidState { .. } => "orchestrator_invalid_state",
            OrchestratorError::ActionChannelTaken { .. } => "orchestrator_action_channel_taken",
            OrchestratorError::Config(_) => "orchestrator_config",
            OrchestratorError::Transport(_) => "orchestrator_transport",
        }
    }
}

/// # Errors produced by history storages.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// No trace is stored under this id.
    #[error("no stored history with id {id}")]
    NotFound {
        /// Requested id.
        id: usize,
    },

    /// `record_result` was called before any trace was recorded.
    #[error("no trace recorded yet")]
    NoTrace,
}

impl HistoryError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            HistoryError::NotFound { .. } => "history_not_found",
            HistoryError::NoTrace => "history_no_trace",
        }
    }
}
