//! Per-entity action queues polled by REST inspectors.
//!
//! An inspector long-polls `peek`, then `delete`s what it consumed: GET and
//! DELETE stay idempotent. A second concurrent `peek` on the same queue
//! supersedes the first one, which returns `None`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::signal::Action;

/// Deletable FIFO of actions for one entity.
#[derive(Debug)]
pub struct ActionQueue {
    entity: String,
    actions: Mutex<VecDeque<Action>>,
    updated: Notify,
    generation: AtomicU64,
    peeking: AtomicBool,
}

struct PeekGuard<'a> {
    queue: &'a ActionQueue,
    generation: u64,
}

impl Drop for PeekGuard<'_> {
    fn drop(&mut self) {
        if self.queue.generation.load(Ordering::Acquire) == self.generation {
            self.queue.peeking.store(false, Ordering::Release);
        }
    }
}

impl ActionQueue {
    /// An empty queue for `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            actions: Mutex::new(VecDeque::new()),
            updated: Notify::new(),
            generation: AtomicU64::new(0),
            peeking: AtomicBool::new(false),
        }
    }

    /// Owning entity.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Waits for the head action without removing it.
    ///
    /// Returns `None` when a newer `peek` took over.
    pub async fn peek(&self) -> Option<Action> {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        if self.peeking.swap(true, Ordering::AcqRel) {
            warn!(entity = %self.entity, "concurrent peek, superseding the older call");
            self.updated.notify_waiters();
        }
        let _guard = PeekGuard {
            queue: self,
            generation,
        };

        loop {
            let notified = self.updated.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.generation.load(Ordering::Acquire) != generation {
                debug!(entity = %self.entity, "peek superseded");
                return None;
            }
            if let Some(action) = self.actions.lock().front().cloned() {
                return Some(action);
            }
            notified.await;
        }
    }

    /// Appends an action and wakes the peeker.
    pub fn put(&self, action: Action) {
        let len = {
            let mut actions = self.actions.lock();
            actions.push_back(action);
            actions.len()
        };
        debug!(entity = %self.entity, len, "action queued");
        self.updated.notify_waiters();
    }

    /// Removes and returns the action with `id`. Idempotent.
    pub fn delete(&self, id: &str) -> Option<Action> {
        let mut actions = self.actions.lock();
        let pos = actions.iter().position(|a| a.id() == id)?;
        actions.remove(pos)
    }

    /// Number of queued actions.
    pub fn count(&self) -> usize {
        self.actions.lock().len()
    }

    /// True while a `peek` is in flight.
    pub fn peeking(&self) -> bool {
        self.peeking.load(Ordering::Acquire)
    }
}

/// Entity → queue map.
#[derive(Debug, Default)]
pub struct QueueSet {
    queues: RwLock<HashMap<String, Arc<ActionQueue>>>,
}

impl QueueSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue of `entity`, if registered.
    pub fn get(&self, entity: &str) -> Option<Arc<ActionQueue>> {
        self.queues.read().get(entity).cloned()
    }

    /// Queue of `entity`, registering it on first use.
    pub fn get_or_register(&self, entity: &str) -> Arc<ActionQueue> {
        if let Some(q) = self.get(entity) {
            return q;
        }
        let mut queues = self.queues.write();
        Arc::clone(
            queues
                .entry(entity.to_string())
                .or_insert_with(|| Arc::new(ActionQueue::new(entity))),
        )
    }

    /// Drops the queue of `entity`.
    pub fn remove(&self, entity: &str) -> bool {
        self.queues.write().remove(entity).is_some()
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.queues.read().len()
    }

    /// True if no entity is registered.
    pub fn is_empty(&self) -> bool {
        self.queues.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Event;
    use std::time::Duration;

    fn action(entity: &str) -> Action {
        Arc::new(Event::packet(entity, "a", "b", Default::default())).default_action()
    }

    #[tokio::test]
    async fn test_peek_waits_for_put() {
        let q = Arc::new(ActionQueue::new("n1"));
        let peeker = tokio::spawn({
            let q = Arc::clone(&q);
            async move { q.peek().await }
        });
        while !q.peeking() {
            tokio::task::yield_now().await;
        }
        let a = action("n1");
        q.put(a.clone());
        let got = peeker.await.unwrap().unwrap();
        assert_eq!(got.id(), a.id());
        assert_eq!(q.count(), 1);
        assert!(!q.peeking());
    }

    #[tokio::test]
    async fn test_newer_peek_supersedes_older() {
        let q = Arc::new(ActionQueue::new("n1"));
        let older = tokio::spawn({
            let q = Arc::clone(&q);
            async move { q.peek().await }
        });
        while !q.peeking() {
            tokio::task::yield_now().await;
        }
        let newer = tokio::spawn({
            let q = Arc::clone(&q);
            async move { q.peek().await }
        });
        assert!(older.await.unwrap().is_none());

        let a = action("n1");
        q.put(a.clone());
        let got = tokio::time::timeout(Duration::from_secs(5), newer)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(got.id(), a.id());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let q = ActionQueue::new("n1");
        let a = action("n1");
        let b = action("n1");
        q.put(a.clone());
        q.put(b.clone());
        let removed = q.delete(a.id()).unwrap();
        assert_eq!(removed.id(), a.id());
        assert!(q.delete(a.id()).is_none());
        assert_eq!(q.count(), 1);
    }

    #[test]
    fn test_get_or_register_is_stable() {
        let set = QueueSet::new();
        assert!(set.get("n1").is_none());
        let a = set.get_or_register("n1");
        let b = set.get_or_register("n1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(set.len(), 1);
    }
}
