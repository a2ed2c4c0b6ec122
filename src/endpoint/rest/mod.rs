//! REST transport: transport-neutral request handler over per-entity queues.
//!
//! ```text
//! inspector ─ POST events/{entity}/{uuid} ─► RestEndpoint ─► mux ─► orchestrator
//! inspector ─ GET  actions/{entity} ───────► ActionQueue::peek ◄─ propagator ◄─ mux
//! inspector ─ DELETE actions/{entity}/{id} ► ActionQueue::delete
//! operator  ─ POST control?op=... ─────────► Control channel
//! ```

mod endpoint;
mod queue;

pub use endpoint::{API_ROOT, RestEndpoint, RestMethod, RestRequest, RestResponse};
pub use queue::{ActionQueue, QueueSet};
