//! # Endpoint multiplexer: many transports, one event stream, one action sink.
//!
//! ```text
//!  Local ──┐  events                                   ┌──► Local
//!  REST  ──┼──────► drain (route entity → kind) ──►    │
//!  RPC   ──┘                     │              Orchestrator
//!                                ▼                     │
//!                          RouteRegistry ◄── dispatcher ◄── actions
//!                                              └──► REST / RPC by route
//! ```
//!
//! ## Rules
//! - An entity is routed to the transport of its first event; the route is
//!   recorded **before** the event is forwarded.
//! - An event whose entity is already routed to another transport is logged
//!   and still forwarded; the first route stays and the action answering it
//!   is dropped.
//! - Actions for entities without a route are logged and dropped.
//! - When a transport's event stream ends, every entity routed to it is
//!   evicted.
//!
//! ## Contents
//! - [`Transport`] / [`TransportLink`]  the orchestrator-facing side of a transport
//! - [`Transceiver`]                    the inspector-facing side
//! - [`EndpointMux`]                    the fan-in / fan-out
//! - [`LocalTransport`], [`RestEndpoint`], [`RpcEndpoint`]

mod local;
mod mux;
mod routes;
mod transceiver;

pub mod rest;
pub mod rpc;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::signal::{Action, Event};

pub use local::{LocalTransceiver, LocalTransport};
pub use mux::{EndpointMux, MuxStreams};
pub use rest::RestEndpoint;
pub use routes::{RouteRegistry, RouteStatus};
pub use rpc::{RpcEndpoint, RpcTransceiver};
pub use transceiver::Transceiver;

/// Transport family; at most one of each per multiplexer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// In-process channels.
    Local,
    /// REST request handler.
    Rest,
    /// Length-prefixed frames over TCP.
    Rpc,
}

impl TransportKind {
    /// Stable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Local => "local",
            TransportKind::Rest => "rest",
            TransportKind::Rpc => "rpc",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the multiplexer hands a transport on start.
pub struct TransportLink {
    /// Events towards the orchestrator. Dropping every clone ends the stream.
    pub events: mpsc::Sender<Event>,
    /// Actions routed to this transport.
    pub actions: mpsc::Receiver<Action>,
    /// Cancelled on multiplexer shutdown.
    pub token: CancellationToken,
    /// Shared routes; a transport may evict entities it lost.
    pub routes: Arc<RouteRegistry>,
}

/// Orchestrator-facing side of a transport.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Family of this transport.
    fn kind(&self) -> TransportKind;

    /// Starts the transport's tasks and returns their handles.
    async fn start(&self, link: TransportLink) -> Result<Vec<JoinHandle<()>>, TransportError>;
}
