//! # racevisor
//!
//! **Racevisor** is a fault-injection and race-exploration orchestrator.
//!
//! Inspectors attached to the system under test report what they observe
//! (packets, filesystem operations, function calls, runnable processes) as
//! events. The orchestrator hands every event to an explore policy, which
//! decides *when* and *how* it is answered: accept it, inject a fault, or
//! reschedule processes. Shuffling those decisions across runs shakes out
//! concurrency bugs; replaying the recorded trace reproduces them.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//!  │ inspector A │   │ inspector B │   │ inspector C │
//!  │  (in-proc)  │   │   (REST)    │   │    (RPC)    │
//!  └──────┬──────┘   └──────┬──────┘   └──────┬──────┘
//!         ▼                 ▼                 ▼
//!  ┌──────────────┐ ┌──────────────┐ ┌──────────────┐
//!  │LocalTransport│ │ RestEndpoint │ │ RpcEndpoint  │
//!  └──────┬───────┘ └──────┬───────┘ └──────┬───────┘
//!         └────────────────┼────────────────┘
//!                          ▼
//!  ┌───────────────────────────────────────────────────────────┐
//!  │  EndpointMux                                              │
//!  │  - RouteRegistry (entity → transport, first one wins)     │
//!  │  - merges events up, dispatches actions down by entity    │
//!  └──────────────────────────┬────────────────────────────────┘
//!                             ▼
//!  ┌───────────────────────────────────────────────────────────┐
//!  │  Orchestrator                                             │
//!  │  - event pump:   enabled ? policy : passthrough           │
//!  │  - action pump:  stamp, run orchestrator-side, forward    │
//!  │  - control pump: enable / disable from REST               │
//!  │  - ActionTrace (recorded into HistoryStorage on shutdown) │
//!  └──────────────────────────┬────────────────────────────────┘
//!                             ▼
//!  ┌───────────────────────────────────────────────────────────┐
//!  │  ExplorePolicy (dumb / random / replayable)               │
//!  │  queue_event ─► TimeBoundedQueue ─► decider ─► action_chan │
//!  └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! Runtime::orchestrator(cfg) ──► OrchestratorBuilder::build() ──► start()
//!
//! per event:
//!   ├─► transport decodes, mux registers the entity route
//!   ├─► event pump stamps arrival, picks policy or passthrough
//!   ├─► policy waits a delay inside its window, then decides
//!   └─► action pump stamps trigger time
//!         ├─ Nop / Shell ─► executed here, never forwarded
//!         └─ others      ─► mux ─► owning transport ─► inspector
//!
//! shutdown() ──► pumps, transports, policies stop ──► ActionTrace
//! ```
//!
//! ## Features
//! | Area              | Description                                                         | Key types / traits                              |
//! |-------------------|---------------------------------------------------------------------|-------------------------------------------------|
//! | **Signals**       | Events, actions, their classes and JSON wire map.                   | [`Event`], [`Action`], [`SignalRegistry`]       |
//! | **Scheduling**    | Delay queue releasing items at a time inside their window.          | [`TimeBoundedQueue`], [`DelayWindow`]           |
//! | **Policies**      | Pluggable exploration: fixed, random with faults, seed-replayable.  | [`ExplorePolicy`], [`RandomPolicy`], [`ReplayablePolicy`] |
//! | **Transports**    | In-process, REST-shaped handler and length-framed RPC over TCP.     | [`Transport`], [`Transceiver`], [`EndpointMux`] |
//! | **Orchestration** | Wiring, toggling, orchestrator-side execution and traces.           | [`Orchestrator`], [`OrchestratorBuilder`]       |
//! | **History**       | Stored traces with outcome and duration, prefix search.             | [`HistoryStorage`], [`ActionTrace`]             |
//! | **Configuration** | Centralize run settings.                                            | [`OrchestratorConfig`], [`PolicyParams`]        |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use racevisor::{
//!     ActionClass, Event, LocalTransport, OrchestratorConfig, OptionMap, PolicyParams,
//!     Runtime, Transceiver,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = OrchestratorConfig {
//!         explore_policy: "random".into(),
//!         explore_policy_param: PolicyParams::new()
//!             .with("minInterval", "1ms")
//!             .with("maxInterval", "5ms"),
//!         ..OrchestratorConfig::default()
//!     };
//!
//!     let rt = Runtime::new();
//!     let (transport, inspector) = LocalTransport::pair(16);
//!     let orc = rt.orchestrator(cfg).with_transport(transport).build().await?;
//!     orc.start().await?;
//!     inspector.start().await?;
//!
//!     // A deferred packet event blocks until the orchestrator answers it.
//!     let event = Event::packet("node1", "node1", "node2", OptionMap::new());
//!     if let Some(answer) = inspector.send_event(event).await? {
//!         let action = tokio::time::timeout(Duration::from_secs(5), answer).await??;
//!         assert_eq!(action.class(), ActionClass::EventAcceptance);
//!     }
//!
//!     let trace = orc.shutdown().await?;
//!     assert_eq!(trace.len(), 1);
//!     Ok(())
//! }
//! ```
mod config;
mod error;
mod runtime;

pub mod endpoint;
pub mod history;
pub mod orchestrator;
pub mod policies;
pub mod queue;
pub mod signal;

// ---- Public re-exports ----

pub use config::OrchestratorConfig;
pub use endpoint::rest::{API_ROOT, RestMethod, RestRequest, RestResponse};
pub use endpoint::{
    EndpointMux, LocalTransceiver, LocalTransport, RestEndpoint, RouteRegistry, RouteStatus,
    RpcEndpoint, RpcTransceiver, Transceiver, Transport, TransportKind, TransportLink,
};
pub use error::{
    ConfigError, HistoryError, OrchestratorError, QueueError, SignalError, TransportError,
};
pub use history::{ActionTrace, HistoryStorage, MemoryHistoryStorage};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorState, wait_for_termination};
pub use policies::{
    DumbPolicy, ExplorePolicy, PolicyParams, PolicyRegistry, ProcPolicy, RandomPolicy,
    RandomSettings, ReplayablePolicy,
};
pub use queue::{DelayPick, DelayWindow, QueueSettings, TimeBoundedQueue};
pub use runtime::Runtime;
pub use signal::{
    Action, ActionClass, Control, Event, EventClass, OptionMap, Signal, SignalRegistry,
};
