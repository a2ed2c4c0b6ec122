//! # Orchestrator: the hub between transports and the explore policy.
//!
//! [`Orchestrator`] owns the endpoint multiplexer, the configured policy and a
//! passthrough [`DumbPolicy`](crate::policies::DumbPolicy) used while
//! orchestration is disabled.
//!
//! ## Architecture
//! ```text
//! OrchestratorBuilder::build()
//!   ├─► PolicyRegistry::create(explore_policy)   (or with_policy)
//!   ├─► EndpointMux + transports (local / REST / RPC)
//!   └─► Orchestrator
//!
//! start():
//!   event pump:   mux.events ─► enabled ? policy : passthrough
//!   action pump:  policy ∪ passthrough ─► stamp triggered time
//!                   ├─► orchestrator-side? execute here (errors logged)
//!                   ├─► not side-only? ─► mux.actions
//!                   └─► collect_trace? ─► trace
//!   control pump: REST control ─► enable / disable
//!
//! shutdown(): event pump → action pump → control pump → mux → policies
//!             └─► trace (also recorded to history when configured)
//! ```
//!
//! ## Rules
//! - `start` once, `shutdown` once, in that order.
//! - Toggling only redirects new events; events already queued in a policy
//!   are still answered by it.
//! - Orchestrator-side actions run on the action pump, one at a time.

mod builder;
mod engine;
mod pumps;
mod shutdown;

pub use builder::OrchestratorBuilder;
pub use engine::{Orchestrator, OrchestratorState};
pub use shutdown::wait_for_termination;
