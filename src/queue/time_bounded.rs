//! # Time-bounded delay queue.
//!
//! [`TimeBoundedQueue`] accepts items from any number of producers and emits
//! them on one consumer channel, each inside its `[min, max]` delay window,
//! in due-instant order (ties: enqueue order).
//!
//! ## Architecture
//! ```text
//! enqueue(item, window, pick)            timer task (one per queue)
//!   │ lock                                 loop {
//!   ├─► due = pick.due(now, window)          head = peek()
//!   ├─► heap.push((due, seq, item))          select! {
//!   └─► new head? ──► wake.notify_one() ───►   wake.notified()  ─► re-peek
//!                                              sleep_until(head) ─► pop all due,
//!                                                                   send in order
//!                                              token.cancelled() ─► exit
//!                                            }
//!                                          }
//! ```
//!
//! ## Rules
//! - `enqueue` never awaits; it only takes the heap lock.
//! - No item is dropped; the heap is unbounded. Crossing the high-water
//!   mark is logged once until the queue drains below half of it.
//! - A slow consumer delays emission but never reorders it.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::window::{DelayPick, DelayWindow};

/// Capacity and pressure settings shared by every queue a policy creates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueSettings {
    /// Capacity of the consumer channel (min 1).
    pub capacity: usize,
    /// Pending depth that triggers a warning (`0` = never).
    pub high_water: usize,
}

impl Default for QueueSettings {
    /// `capacity = 1024`, `high_water = 4096`.
    fn default() -> Self {
        Self {
            capacity: 1024,
            high_water: 4096,
        }
    }
}

/// An item leaving the queue.
#[derive(Clone, Debug)]
pub struct Dequeued<T> {
    /// The payload.
    pub value: T,
    /// When `enqueue` was called.
    pub enqueued_at: Instant,
    /// When the item became eligible.
    pub due: Instant,
    /// The window it was enqueued with.
    pub window: DelayWindow,
}

struct Entry<T> {
    seq: u64,
    item: Dequeued<T>,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Reversed: BinaryHeap is a max-heap, the earliest entry must be on top.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .item
            .due
            .cmp(&self.item.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Pending<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
    above_high_water: bool,
}

struct Shared<T> {
    pending: Mutex<Pending<T>>,
    wake: Notify,
    high_water: usize,
}

/// Delay queue with a single timer task.
pub struct TimeBoundedQueue<T> {
    shared: Arc<Shared<T>>,
    token: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> TimeBoundedQueue<T> {
    /// Creates the queue and spawns its timer task.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(settings: QueueSettings) -> (Self, mpsc::Receiver<Dequeued<T>>) {
        let (tx, rx) = mpsc::channel(settings.capacity.max(1));
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending {
                heap: BinaryHeap::new(),
                next_seq: 0,
                above_high_water: false,
            }),
            wake: Notify::new(),
            high_water: settings.high_water,
        });
        let token = CancellationToken::new();
        let worker = tokio::spawn(run_timer(Arc::clone(&shared), tx, token.clone()));

        let q = Self {
            shared,
            token,
            worker: Mutex::new(Some(worker)),
        };
        (q, rx)
    }

    /// Schedules `value`; returns its due instant.
    pub fn enqueue(&self, value: T, window: DelayWindow, pick: DelayPick) -> Instant {
        // Read the clock under the lock: an item popped by the timer then
        // always has a due no later than this one's.
        let mut p = self.shared.pending.lock();
        let now = Instant::now();
        let due = pick.due(now, window);
        let new_head = p.heap.peek().is_none_or(|head| due < head.item.due);
        let seq = p.next_seq;
        p.next_seq += 1;
        p.heap.push(Entry {
            seq,
            item: Dequeued {
                value,
                enqueued_at: now,
                due,
                window,
            },
        });

        let depth = p.heap.len();
        let hw = self.shared.high_water;
        if hw > 0 && depth > hw && !p.above_high_water {
            p.above_high_water = true;
            warn!(depth, high_water = hw, "scheduler queue above high-water mark");
        }
        drop(p);

        if new_head {
            self.shared.wake.notify_one();
        }
        due
    }

    /// Number of items not yet emitted.
    pub fn len(&self) -> usize {
        self.shared.pending.lock().heap.len()
    }

    /// True if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops the timer task and waits for it. Pending items are discarded.
    pub async fn shutdown(&self) {
        self.token.cancel();
        let handle = self.worker.lock().take();
        if let Some(h) = handle {
            let _ = h.await;
        }
    }
}

impl<T> Drop for TimeBoundedQueue<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run_timer<T: Send + 'static>(
    shared: Arc<Shared<T>>,
    tx: mpsc::Sender<Dequeued<T>>,
    token: CancellationToken,
) {
    loop {
        let head = shared.pending.lock().heap.peek().map(|e| e.item.due);
        match head {
            None => {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = shared.wake.notified() => continue,
                }
            }
            Some(due) => {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = shared.wake.notified() => continue,
                    _ = tokio::time::sleep_until(due) => {}
                }
            }
        }

        for item in pop_due(&shared) {
            tokio::select! {
                _ = token.cancelled() => return,
                sent = tx.send(item) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

fn pop_due<T>(shared: &Shared<T>) -> Vec<Dequeued<T>> {
    let now = Instant::now();
    let mut p = shared.pending.lock();
    let mut out = Vec::new();
    while p.heap.peek().is_some_and(|e| e.item.due <= now) {
        if let Some(e) = p.heap.pop() {
            out.push(e.item);
        }
    }
    if p.above_high_water && p.heap.len() <= shared.high_water / 2 {
        p.above_high_water = false;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_zero_window_is_fifo() {
        let (q, mut rx) = TimeBoundedQueue::new(QueueSettings::default());
        for i in 0..50 {
            q.enqueue(i, DelayWindow::immediate(), DelayPick::Uniform);
        }
        for i in 0..50 {
            assert_eq!(rx.recv().await.unwrap().value, i);
        }
        assert!(q.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_earlier_item_rearms_timer() {
        let (q, mut rx) = TimeBoundedQueue::new(QueueSettings::default());
        let start = Instant::now();
        q.enqueue("late", DelayWindow::fixed(Duration::from_secs(10)), DelayPick::Uniform);
        q.enqueue("early", DelayWindow::fixed(Duration::from_secs(1)), DelayPick::Uniform);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.value, "early");
        assert!(Instant::now() - start >= Duration::from_secs(1));
        assert!(Instant::now() - start < Duration::from_secs(10));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.value, "late");
        assert!(Instant::now() >= second.due);
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_respect_window() {
        let (q, mut rx) = TimeBoundedQueue::new(QueueSettings::default());
        let w = DelayWindow::new(Duration::from_millis(30), Duration::from_millis(100)).unwrap();
        for i in 0..20 {
            q.enqueue(i, w, DelayPick::Uniform);
        }
        let mut last_due = None;
        for _ in 0..20 {
            let item = rx.recv().await.unwrap();
            let waited = item.due - item.enqueued_at;
            assert!(waited >= w.min() && waited <= w.max());
            assert!(Instant::now() >= item.due);
            if let Some(prev) = last_due {
                assert!(item.due >= prev, "emitted out of due order");
            }
            last_due = Some(item.due);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ties_keep_enqueue_order() {
        let (q, mut rx) = TimeBoundedQueue::new(QueueSettings::default());
        let floor = Instant::now() + Duration::from_millis(5);
        for i in 0..10 {
            q.enqueue(i, DelayWindow::fixed(Duration::from_millis(5)), DelayPick::UniformNotBefore(floor));
        }
        for i in 0..10 {
            assert_eq!(rx.recv().await.unwrap().value, i);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_emission() {
        let (q, mut rx) = TimeBoundedQueue::new(QueueSettings::default());
        q.enqueue(1u32, DelayWindow::fixed(Duration::from_secs(60)), DelayPick::Uniform);
        q.shutdown().await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_producers_keep_due_order() {
        const PRODUCERS: usize = 8;
        const PER_PRODUCER: usize = 50;

        let (q, mut rx) = TimeBoundedQueue::new(QueueSettings::default());
        let q = Arc::new(q);
        let windows = [
            DelayWindow::immediate(),
            DelayWindow::fixed(Duration::from_millis(2)),
            DelayWindow::new(Duration::from_millis(1), Duration::from_millis(10)).unwrap(),
            DelayWindow::new(Duration::ZERO, Duration::from_millis(5)).unwrap(),
        ];

        let mut producers = Vec::new();
        for p in 0..PRODUCERS {
            let q = Arc::clone(&q);
            producers.push(tokio::spawn(async move {
                for i in 0..PER_PRODUCER {
                    let window = windows[(p + i) % windows.len()];
                    q.enqueue((p, i), window, DelayPick::Uniform);
                    if i % 5 == 0 {
                        tokio::time::sleep(Duration::from_millis(1)).await;
                    } else {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }

        let mut seen = std::collections::HashSet::new();
        let mut last_due = None;
        for _ in 0..PRODUCERS * PER_PRODUCER {
            let item = tokio::time::timeout(Duration::from_secs(10), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(Instant::now() >= item.due);
            let waited = item.due - item.enqueued_at;
            assert!(waited >= item.window.min() && waited <= item.window.max(), "{waited:?}");
            if let Some(prev) = last_due {
                assert!(item.due >= prev, "emitted out of due order");
            }
            last_due = Some(item.due);
            assert!(seen.insert(item.value), "{:?} emitted twice", item.value);
        }
        for p in producers {
            p.await.unwrap();
        }
        assert_eq!(seen.len(), PRODUCERS * PER_PRODUCER);
        assert!(q.is_empty());
        assert!(rx.try_recv().is_err());
        q.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_does_not_block_on_full_consumer() {
        let settings = QueueSettings {
            capacity: 1,
            high_water: 4,
        };
        let (q, mut rx) = TimeBoundedQueue::new(settings);
        for i in 0..16 {
            q.enqueue(i, DelayWindow::immediate(), DelayPick::Uniform);
        }
        for i in 0..16 {
            assert_eq!(rx.recv().await.unwrap().value, i);
        }
    }
}
