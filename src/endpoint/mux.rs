use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::TransportError;
use crate::signal::{Action, Event};

use super::{RouteRegistry, RouteStatus, Transport, TransportKind, TransportLink};

/// Orchestrator-side ends of a started multiplexer.
pub struct MuxStreams {
    /// Events from every transport, in arrival order per transport.
    pub events: mpsc::Receiver<Event>,
    /// Actions to dispatch by entity route.
    pub actions: mpsc::Sender<Action>,
}

/// Deferred events that arrived on a transport not owning their entity,
/// keyed by event id.
type Strays = Mutex<HashMap<String, TransportKind>>;

/// Fans transport events in and routes actions back out.
pub struct EndpointMux {
    capacity: usize,
    transports: Vec<Arc<dyn Transport>>,
    routes: Arc<RouteRegistry>,
    strays: Arc<Strays>,
    token: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl EndpointMux {
    /// Creates an empty multiplexer; `capacity` bounds every channel.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            transports: Vec::new(),
            routes: Arc::new(RouteRegistry::new()),
            strays: Arc::new(Mutex::new(HashMap::new())),
            token: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Adds a transport. At most one per [`TransportKind`].
    pub fn attach(&mut self, transport: Arc<dyn Transport>) -> Result<(), TransportError> {
        let kind = transport.kind();
        if self.transports.iter().any(|t| t.kind() == kind) {
            return Err(TransportError::DuplicateTransport {
                kind: kind.as_str(),
            });
        }
        self.transports.push(transport);
        Ok(())
    }

    /// Shared route table.
    pub fn routes(&self) -> Arc<RouteRegistry> {
        Arc::clone(&self.routes)
    }

    /// Starts every transport plus the drain and dispatch tasks.
    pub async fn start(&self) -> Result<MuxStreams, TransportError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(TransportError::AlreadyStarted);
        }
        let (out_events_tx, out_events_rx) = mpsc::channel(self.capacity);
        let (in_actions_tx, in_actions_rx) = mpsc::channel(self.capacity);
        let mut sinks: HashMap<TransportKind, mpsc::Sender<Action>> = HashMap::new();
        let mut handles = Vec::new();

        for transport in &self.transports {
            let kind = transport.kind();
            let (events_tx, events_rx) = mpsc::channel(self.capacity);
            let (actions_tx, actions_rx) = mpsc::channel(self.capacity);
            let link = TransportLink {
                events: events_tx,
                actions: actions_rx,
                token: self.token.child_token(),
                routes: Arc::clone(&self.routes),
            };
            handles.extend(transport.start(link).await?);
            sinks.insert(kind, actions_tx);
            handles.push(tokio::spawn(drain(
                kind,
                events_rx,
                out_events_tx.clone(),
                Arc::clone(&self.routes),
                Arc::clone(&self.strays),
                self.token.clone(),
            )));
            info!(transport = %kind, "transport started");
        }

        handles.push(tokio::spawn(dispatch(
            in_actions_rx,
            sinks,
            Arc::clone(&self.routes),
            Arc::clone(&self.strays),
            self.token.clone(),
        )));
        self.handles.lock().extend(handles);

        Ok(MuxStreams {
            events: out_events_rx,
            actions: in_actions_tx,
        })
    }

    /// Stops transports and pumps, then waits for all of them.
    pub async fn shutdown(&self) {
        self.token.cancel();
        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        for res in futures::future::join_all(handles).await {
            if let Err(e) = res {
                warn!(error = %e, "endpoint task ended abnormally");
            }
        }
        debug!("endpoint multiplexer stopped");
    }
}

impl Drop for EndpointMux {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn drain(
    kind: TransportKind,
    mut events: mpsc::Receiver<Event>,
    out: mpsc::Sender<Event>,
    routes: Arc<RouteRegistry>,
    strays: Arc<Strays>,
    token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = token.cancelled() => return,
            ev = events.recv() => match ev {
                Some(ev) => ev,
                None => break,
            },
        };
        match routes.register(event.entity_id(), kind) {
            RouteStatus::Conflict { current } => {
                error!(
                    entity = %event.entity_id(),
                    transport = %kind,
                    current = %current,
                    "entity id conflict, its action will be dropped"
                );
                if event.deferred() {
                    strays.lock().insert(event.id().to_string(), kind);
                }
            }
            RouteStatus::New => debug!(entity = %event.entity_id(), transport = %kind, "entity routed"),
            RouteStatus::Known => {}
        }
        tokio::select! {
            _ = token.cancelled() => return,
            sent = out.send(event) => {
                if sent.is_err() {
                    return;
                }
            }
        }
    }
    let gone = routes.evict_kind(kind);
    info!(transport = %kind, evicted = gone.len(), "transport event stream ended");
}

async fn dispatch(
    mut actions: mpsc::Receiver<Action>,
    sinks: HashMap<TransportKind, mpsc::Sender<Action>>,
    routes: Arc<RouteRegistry>,
    strays: Arc<Strays>,
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
        let stray = action.event_id().and_then(|id| strays.lock().remove(id));
        if let Some(origin) = stray {
            error!(
                entity = %action.entity_id(),
                transport = %origin,
                "action answers a conflicting event, dropping action"
            );
            continue;
        }
        let Some(kind) = routes.lookup(action.entity_id()) else {
            error!(entity = %action.entity_id(), class = %action.class(), "unknown entity, dropping action");
            continue;
        };
        let Some(sink) = sinks.get(&kind) else {
            error!(entity = %action.entity_id(), transport = %kind, "no sink for transport, dropping action");
            continue;
        };
        tokio::select! {
            _ = token.cancelled() => break,
            sent = sink.send(action) => {
                if sent.is_err() {
                    warn!(transport = %kind, "transport stopped taking actions");
                }
            }
        }
    }
    debug!("action dispatcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{LocalTransport, Transceiver};
    use crate::signal::OptionMap;

    #[tokio::test]
    async fn test_routes_action_back_to_local() {
        let (transport, transceiver) = LocalTransport::pair(8);
        let mut mux = EndpointMux::new(8);
        mux.attach(transport).unwrap();
        let mut streams = mux.start().await.unwrap();
        transceiver.start().await.unwrap();

        let slot = transceiver
            .send_event(Event::packet("n1", "n1", "n2", OptionMap::new()))
            .await
            .unwrap()
            .unwrap();
        let ev = Arc::new(streams.events.recv().await.unwrap());
        assert_eq!(mux.routes().lookup("n1"), Some(TransportKind::Local));

        streams.actions.send(ev.clone().default_action()).await.unwrap();
        assert_eq!(slot.await.unwrap().event_id(), Some(ev.id()));
        mux.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_kind_rejected() {
        let mut mux = EndpointMux::new(8);
        mux.attach(LocalTransport::pair(1).0).unwrap();
        let err = mux.attach(LocalTransport::pair(1).0).unwrap_err();
        assert_eq!(err.as_label(), "transport_duplicate");
        assert!(mux.start().await.is_ok());
        assert_eq!(mux.start().await.err(), Some(TransportError::AlreadyStarted));
        mux.shutdown().await;
    }
}
