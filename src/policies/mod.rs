//! Explore policies.
//!
//! This module groups the algorithms that decide **which** action answers an
//! event and **when** it is released.
//!
//! ## Contents
//! - [`ExplorePolicy`]    the contract the orchestrator drives
//! - [`DumbPolicy`]       fixed delay, default actions (also the disabled passthrough)
//! - [`RandomPolicy`]     random windows, fault injection, shell actions
//! - [`ReplayablePolicy`] hash-seeded delays (experimental)
//! - [`PolicyRegistry`]   name → factory
//!
//! ## Quick wiring
//! ```text
//! OrchestratorConfig { explore_policy, explore_policy_param }
//!      └─► PolicyRegistry::create(name, QueueSettings, &PolicyParams)
//!           └─► Arc<dyn ExplorePolicy>
//!                 queue_event(Event) ─► ... ─► action_chan() ─► Action
//! ```
//!
//! ## Defaults
//! - `random` is the configured policy unless another name is given.
//! - With empty parameters every built-in policy answers immediately with
//!   default actions.

mod dumb;
mod explore;
mod params;
mod random;
mod registry;
mod replayable;

pub use dumb::DumbPolicy;
pub use explore::ExplorePolicy;
pub use params::PolicyParams;
pub use random::{ProcPolicy, RandomPolicy, RandomSettings};
pub use registry::{PolicyFactory, PolicyRegistry};
pub use replayable::{REPLAY_SEED_ENV, ReplayablePolicy, replay_delay};
