use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::TransportError;
use crate::signal::{Action, Control, Event, SignalRegistry};

use super::queue::QueueSet;
use crate::endpoint::{Transport, TransportKind, TransportLink};

/// Root of every REST route.
pub const API_ROOT: &str = "/api/v3";

/// HTTP verbs served by [`RestEndpoint`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
}

/// A transport-neutral HTTP request.
#[derive(Clone, Debug)]
pub struct RestRequest {
    /// Verb.
    pub method: RestMethod,
    /// Path without the query string.
    pub path: String,
    /// Decoded `k=v` query pairs.
    pub query: BTreeMap<String, String>,
    /// Raw body.
    pub body: Vec<u8>,
}

impl RestRequest {
    /// Builds a request from `target` (`/path?k=v&...`).
    pub fn new(method: RestMethod, target: &str, body: impl Into<Vec<u8>>) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p, q),
            None => (target, ""),
        };
        let query = query
            .split('&')
            .filter(|kv| !kv.is_empty())
            .map(|kv| match kv.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (kv.to_string(), String::new()),
            })
            .collect();
        Self {
            method,
            path: path.to_string(),
            query,
            body: body.into(),
        }
    }

    /// `GET target`.
    pub fn get(target: &str) -> Self {
        Self::new(RestMethod::Get, target, Vec::new())
    }

    /// `POST target` with `body`.
    pub fn post(target: &str, body: impl Into<Vec<u8>>) -> Self {
        Self::new(RestMethod::Post, target, body)
    }

    /// `DELETE target`.
    pub fn delete(target: &str) -> Self {
        Self::new(RestMethod::Delete, target, Vec::new())
    }
}

/// Status code plus JSON body.
#[derive(Clone, Debug, PartialEq)]
pub struct RestResponse {
    /// HTTP status.
    pub status: u16,
    /// JSON payload.
    pub body: Value,
}

impl RestResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn empty() -> Self {
        Self::ok(json!({}))
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    /// True for 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// REST request handler and transport.
///
/// | route                                   | effect                           |
/// |-----------------------------------------|----------------------------------|
/// | `GET  /`                                | liveness greeting                |
/// | `POST {root}/events/{entity}/{uuid}`    | forward an event                 |
/// | `GET  {root}/actions/{entity}`          | long-poll the head action        |
/// | `DELETE {root}/actions/{entity}/{uuid}` | drop a consumed action           |
/// | `POST {root}/control?op=...`            | enable / disable orchestration   |
///
/// The HTTP listener is left to the embedding server: it turns requests into
/// [`RestRequest`] and writes back [`RestResponse`].
pub struct RestEndpoint {
    signals: Arc<SignalRegistry>,
    queues: Arc<QueueSet>,
    events: RwLock<Option<mpsc::Sender<Event>>>,
    delivered: Mutex<HashSet<String>>,
    control_tx: mpsc::Sender<Control>,
    control_rx: Mutex<Option<mpsc::Receiver<Control>>>,
}

impl RestEndpoint {
    /// Creates an endpoint decoding signals through `signals`.
    pub fn new(signals: Arc<SignalRegistry>, capacity: usize) -> Self {
        let (control_tx, control_rx) = mpsc::channel(capacity.max(1));
        Self {
            signals,
            queues: Arc::new(QueueSet::new()),
            events: RwLock::new(None),
            delivered: Mutex::new(HashSet::new()),
            control_tx,
            control_rx: Mutex::new(Some(control_rx)),
        }
    }

    /// Control requests received on `/control`. Available once.
    pub fn take_control(&self) -> Option<mpsc::Receiver<Control>> {
        self.control_rx.lock().take()
    }

    /// Per-entity action queues.
    pub fn queues(&self) -> Arc<QueueSet> {
        Arc::clone(&self.queues)
    }

    /// Serves one request.
    pub async fn handle(&self, req: RestRequest) -> RestResponse {
        let segments: Vec<&str> = req.path.split('/').filter(|s| !s.is_empty()).collect();
        let api: Vec<&str> = API_ROOT.split('/').filter(|s| !s.is_empty()).collect();

        if segments.is_empty() {
            return match req.method {
                RestMethod::Get => RestResponse::ok(json!({
                    "message": "racevisor REST endpoint",
                    "pid": std::process::id(),
                })),
                _ => RestResponse::error(405, "method not allowed"),
            };
        }
        let Some(rest) = segments.strip_prefix(api.as_slice()) else {
            return RestResponse::error(404, format!("no route for {}", req.path));
        };

        match (req.method, rest) {
            (RestMethod::Post, ["events", entity, uuid]) => {
                self.post_event(entity, uuid, &req.body).await
            }
            (RestMethod::Get, ["actions", entity]) => self.get_action(entity).await,
            (RestMethod::Delete, ["actions", entity, uuid]) => self.delete_action(entity, uuid),
            (RestMethod::Post, ["control"]) => self.control(&req).await,
            _ => RestResponse::error(404, format!("no route for {:?} {}", req.method, req.path)),
        }
    }

    async fn post_event(&self, entity: &str, uuid: &str, body: &[u8]) -> RestResponse {
        let event = match self.signals.decode_event(body) {
            Ok(ev) => ev,
            Err(e) => return RestResponse::error(400, e.as_message()),
        };
        if event.id() != uuid {
            return RestResponse::error(
                400,
                format!("uuid mismatch: {} vs {}", uuid, event.id()),
            );
        }
        if event.entity_id() != entity {
            return RestResponse::error(
                400,
                format!("entity mismatch: {} vs {}", entity, event.entity_id()),
            );
        }
        self.queues.get_or_register(entity);

        if !self.delivered.lock().insert(event.id().to_string()) {
            debug!(entity, event = uuid, "event already delivered");
            return RestResponse::empty();
        }
        let Some(events) = self.events.read().clone() else {
            self.delivered.lock().remove(uuid);
            return RestResponse::error(503, "endpoint not started");
        };
        if events.send(event).await.is_err() {
            self.delivered.lock().remove(uuid);
            return RestResponse::error(503, "orchestrator is gone");
        }
        RestResponse::empty()
    }

    async fn get_action(&self, entity: &str) -> RestResponse {
        let queue = self.queues.get_or_register(entity);
        match queue.peek().await {
            Some(action) => RestResponse::ok(Value::Object(action.to_map())),
            None => RestResponse::error(409, "could not get action"),
        }
    }

    fn delete_action(&self, entity: &str, uuid: &str) -> RestResponse {
        let queue = self.queues.get_or_register(entity);
        match queue.delete(uuid) {
            Some(action) => {
                if let Some(event) = action.event_id() {
                    self.delivered.lock().remove(event);
                }
            }
            None => debug!(entity, action = uuid, "delete of unknown action"),
        }
        RestResponse::empty()
    }

    async fn control(&self, req: &RestRequest) -> RestResponse {
        let op = req.query.get("op").map(String::as_str).unwrap_or_default();
        let Some(control) = Control::from_op(op) else {
            return RestResponse::error(400, format!("unknown op {op:?}"));
        };
        info!(%control, "control request");
        if self.control_tx.send(control).await.is_err() {
            return RestResponse::error(503, "orchestrator is gone");
        }
        RestResponse::empty()
    }
}

#[async_trait]
impl Transport for RestEndpoint {
    fn kind(&self) -> TransportKind {
        TransportKind::Rest
    }

    async fn start(&self, link: TransportLink) -> Result<Vec<JoinHandle<()>>, TransportError> {
        {
            let mut events = self.events.write();
            if events.is_some() {
                return Err(TransportError::AlreadyStarted);
            }
            *events = Some(link.events);
        }

        let queues = Arc::clone(&self.queues);
        let token = link.token;
        let mut actions = link.actions;
        let propagator = tokio::spawn(async move {
            loop {
                let action: Action = tokio::select! {
                    _ = token.cancelled() => break,
                    a = actions.recv() => match a {
                        Some(a) => a,
                        None => break,
                    },
                };
                match queues.get(action.entity_id()) {
                    Some(q) => q.put(action),
                    None => error!(
                        entity = %action.entity_id(),
                        class = %action.class(),
                        "action for unregistered entity ignored"
                    ),
                }
            }
            debug!(transport = "rest", "action propagator stopped");
        });
        Ok(vec![propagator])
    }
}
