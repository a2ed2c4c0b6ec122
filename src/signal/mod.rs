//! # Signal protocol: events, actions and their wire map.
//!
//! ```text
//!   inspector                          orchestrator
//!   ─────────                          ────────────
//!   Event{uuid, entity, class,  ──►    policy decides
//!         option, deferred}
//!                               ◄──    Action{uuid, entity, class,
//!   (blocks if deferred)                      option, event_uuid}
//! ```
//!
//! - [`Event`] / [`Action`]: the two directions.
//! - [`EventClass`] / [`ActionClass`]: closed sets of kinds; the name is the
//!   `class` discriminator on the wire.
//! - [`SignalRegistry`]: name → class lookup used for decoding.
//! - [`Signal`]: either direction, with map and JSON encodings.
//! - [`Control`]: enable/disable messages for the orchestrator.

mod action;
mod class;
mod codec;
mod control;
mod event;
mod registry;
mod sched;

/// Open string → value payload of a signal.
pub type OptionMap = serde_json::Map<String, serde_json::Value>;

pub use action::{Action, OrchestratorSide, SHELL_ACTION_ENTITY};
pub use class::{ActionClass, EventClass, FilesystemOp, FunctionEventType, SignalClass, SignalType};
pub use codec::Signal;
pub use control::Control;
pub use event::Event;
pub use registry::SignalRegistry;
pub use sched::{SCHED_FLAG_RESET_ON_FORK, SchedAttr, SchedPolicy};
