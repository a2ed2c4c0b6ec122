//! Entity → transport routes.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::TransportKind;

/// Outcome of [`RouteRegistry::register`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteStatus {
    /// First event of this entity.
    New,
    /// Already routed to the same transport.
    Known,
    /// Routed to a different transport; the current route is kept.
    Conflict {
        /// Transport the entity is routed to.
        current: TransportKind,
    },
}

/// Concurrent entity → transport map.
#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: RwLock<HashMap<String, TransportKind>>,
}

impl RouteRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `entity` to `kind` unless it is routed already.
    pub fn register(&self, entity: &str, kind: TransportKind) -> RouteStatus {
        if let Some(current) = self.routes.read().get(entity) {
            return classify(*current, kind);
        }
        let mut routes = self.routes.write();
        match routes.get(entity) {
            Some(current) => classify(*current, kind),
            None => {
                routes.insert(entity.to_string(), kind);
                RouteStatus::New
            }
        }
    }

    /// Transport of `entity`.
    pub fn lookup(&self, entity: &str) -> Option<TransportKind> {
        self.routes.read().get(entity).copied()
    }

    /// Removes one route. Returns whether it existed.
    pub fn evict(&self, entity: &str) -> bool {
        self.routes.write().remove(entity).is_some()
    }

    /// Removes every route to `kind` and returns the evicted entities.
    pub fn evict_kind(&self, kind: TransportKind) -> Vec<String> {
        let mut routes = self.routes.write();
        let gone: Vec<String> = routes
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(e, _)| e.clone())
            .collect();
        for e in &gone {
            routes.remove(e);
        }
        gone
    }

    /// Number of routed entities.
    pub fn len(&self) -> usize {
        self.routes.read().len()
    }

    /// True if nothing is routed.
    pub fn is_empty(&self) -> bool {
        self.routes.read().is_empty()
    }
}

fn classify(current: TransportKind, requested: TransportKind) -> RouteStatus {
    if current == requested {
        RouteStatus::Known
    } else {
        RouteStatus::Conflict { current }
    }
}
