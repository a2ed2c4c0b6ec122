//! TCP listener speaking length-prefixed JSON signals.
//!
//! ```text
//! accept ──► conn task ──┬─ reader: frame ─► decode Event ─► claim entity ─► mux
//!                        └─ writer: conn channel ─► encode Action ─► frame
//! action pump: mux ─► owners[entity] ─► conn channel
//! ```
//!
//! ## Rules
//! - An entity belongs to the connection that sent its first event.
//! - Events for an entity owned by another live connection are dropped.
//! - On disconnect the connection's entities are released and their routes
//!   evicted.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::endpoint::{RouteRegistry, Transport, TransportKind, TransportLink};
use crate::error::TransportError;
use crate::signal::{Action, Event, Signal, SignalRegistry};

use super::frame::{read_frame, write_frame};

type ConnId = u64;

struct Owner {
    conn: ConnId,
    tx: mpsc::Sender<Action>,
}

#[derive(Default)]
struct Owners {
    by_entity: RwLock<HashMap<String, Owner>>,
}

impl Owners {
    /// Binds `entity` to `conn` unless another connection owns it.
    fn claim(&self, entity: &str, conn: ConnId, tx: &mpsc::Sender<Action>) -> bool {
        let mut map = self.by_entity.write();
        match map.get(entity) {
            Some(owner) => owner.conn == conn,
            None => {
                map.insert(
                    entity.to_string(),
                    Owner {
                        conn,
                        tx: tx.clone(),
                    },
                );
                true
            }
        }
    }

    fn sender(&self, entity: &str) -> Option<mpsc::Sender<Action>> {
        self.by_entity.read().get(entity).map(|o| o.tx.clone())
    }

    fn release(&self, conn: ConnId) -> Vec<String> {
        let mut map = self.by_entity.write();
        let gone: Vec<String> = map
            .iter()
            .filter(|(_, o)| o.conn == conn)
            .map(|(e, _)| e.clone())
            .collect();
        for e in &gone {
            map.remove(e);
        }
        gone
    }
}

/// Binary RPC transport.
pub struct RpcEndpoint {
    signals: Arc<SignalRegistry>,
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    owners: Arc<Owners>,
    capacity: usize,
}

impl RpcEndpoint {
    /// Binds `addr`; port `0` picks a free port (see [`local_addr`](Self::local_addr)).
    pub async fn bind(
        addr: SocketAddr,
        signals: Arc<SignalRegistry>,
        capacity: usize,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        if addr.port() == 0 {
            info!(%local_addr, "rpc endpoint bound to an assigned port");
        }
        Ok(Self {
            signals,
            listener: Mutex::new(Some(listener)),
            local_addr,
            owners: Arc::new(Owners::default()),
            capacity: capacity.max(1),
        })
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl Transport for RpcEndpoint {
    fn kind(&self) -> TransportKind {
        TransportKind::Rpc
    }

    async fn start(&self, link: TransportLink) -> Result<Vec<JoinHandle<()>>, TransportError> {
        let listener = self
            .listener
            .lock()
            .take()
            .ok_or(TransportError::AlreadyStarted)?;
        let TransportLink {
            events,
            actions,
            token,
            routes,
        } = link;

        let pump = tokio::spawn(action_pump(actions, Arc::clone(&self.owners), token.clone()));
        let accept = tokio::spawn(accept_loop(
            listener,
            Conns {
                signals: Arc::clone(&self.signals),
                owners: Arc::clone(&self.owners),
                routes,
                events,
                capacity: self.capacity,
            },
            token,
        ));
        Ok(vec![pump, accept])
    }
}

#[derive(Clone)]
struct Conns {
    signals: Arc<SignalRegistry>,
    owners: Arc<Owners>,
    routes: Arc<RouteRegistry>,
    events: mpsc::Sender<Event>,
    capacity: usize,
}

async fn action_pump(
    mut actions: mpsc::Receiver<Action>,
    owners: Arc<Owners>,
    token: CancellationToken,
) {
    loop {
        let action = tokio::select! {
            _ = token.cancelled() => break,
            a = actions.recv() => match a {
                Some(a) => a,
                None => break,
            },
        };
        let Some(tx) = owners.sender(action.entity_id()) else {
            error!(entity = %action.entity_id(), "no rpc connection owns entity, dropping action");
            continue;
        };
        tokio::select! {
            _ = token.cancelled() => break,
            sent = tx.send(action) => if sent.is_err() {
                warn!("rpc connection closed before action was written");
            },
        }
    }
}

async fn accept_loop(listener: TcpListener, conns: Conns, token: CancellationToken) {
    let next_id = AtomicU64::new(1);
    let mut set = JoinSet::new();
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let id = next_id.fetch_add(1, Ordering::Relaxed);
                    debug!(%peer, conn = id, "rpc connection accepted");
                    set.spawn(serve_conn(stream, id, conns.clone(), token.child_token()));
                }
                Err(e) => {
                    error!(error = %e, "rpc accept failed");
                    break;
                }
            },
            Some(_) = set.join_next(), if !set.is_empty() => {}
        }
    }
    set.shutdown().await;
    debug!("rpc accept loop stopped");
}

async fn serve_conn(stream: TcpStream, conn: ConnId, conns: Conns, token: CancellationToken) {
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<Action>(conns.capacity);

    let writer_token = token.clone();
    let writer_task = tokio::spawn(async move {
        loop {
            let action = tokio::select! {
                _ = writer_token.cancelled() => break,
                a = rx.recv() => match a {
                    Some(a) => a,
                    None => break,
                },
            };
            let payload = Signal::from(action).to_json_vec();
            let written = tokio::select! {
                _ = writer_token.cancelled() => break,
                w = write_frame(&mut writer, &payload) => w,
            };
            if let Err(e) = written {
                warn!(conn, error = %e, "rpc write failed");
                break;
            }
        }
    });

    loop {
        let frame = tokio::select! {
            _ = token.cancelled() => break,
            f = read_frame(&mut reader) => f,
        };
        let bytes = match frame {
            Ok(Some(b)) => b,
            Ok(None) => {
                debug!(conn, "rpc peer closed");
                break;
            }
            Err(e) => {
                error!(conn, error = %e, "rpc read failed");
                break;
            }
        };
        let event = match conns.signals.decode_event(&bytes) {
            Ok(ev) => ev,
            Err(e) => {
                warn!(conn, error = %e, "dropping malformed rpc frame");
                continue;
            }
        };
        if !conns.owners.claim(event.entity_id(), conn, &tx) {
            error!(conn, entity = %event.entity_id(), "entity owned by another rpc connection, dropping event");
            continue;
        }
        tokio::select! {
            _ = token.cancelled() => break,
            sent = conns.events.send(event) => if sent.is_err() {
                break;
            },
        }
    }

    token.cancel();
    drop(tx);
    let _ = writer_task.await;
    for entity in conns.owners.release(conn) {
        conns.routes.evict(&entity);
        debug!(conn, %entity, "entity released");
    }
}
