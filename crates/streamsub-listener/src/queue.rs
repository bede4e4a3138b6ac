use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{ListenerError, Result};

/// Returned by [`DeliveryQueue::try_push`] when the queue is at capacity.
///
/// Hands the rejected item back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFull<T>(pub T);

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    capacity: usize,
}

/// Bounded multi-producer, multi-consumer FIFO.
///
/// Clones share the same queue. Consumers block in
/// [`pop_timeout`](Self::pop_timeout) or poll with [`try_pop`](Self::try_pop).
pub struct DeliveryQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for DeliveryQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> DeliveryQueue<T> {
    /// Create a queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ListenerError::Config(
                "delivery queue capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                items: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
                not_empty: Condvar::new(),
                capacity,
            }),
        })
    }

    /// Enqueue without blocking; a full queue hands the item back.
    pub fn try_push(&self, item: T) -> std::result::Result<(), QueueFull<T>> {
        let mut items = self.inner.items.lock();
        if items.len() >= self.inner.capacity {
            return Err(QueueFull(item));
        }
        items.push_back(item);
        drop(items);
        self.inner.not_empty.notify_one();
        Ok(())
    }

    /// Enqueue, evicting the oldest item if the queue is full.
    ///
    /// Eviction and insertion happen under one lock, so a concurrent consumer
    /// never observes the queue one short of capacity in between. Returns the
    /// evicted item, if any.
    pub fn push_evicting(&self, item: T) -> Option<T> {
        let mut items = self.inner.items.lock();
        let evicted = if items.len() >= self.inner.capacity {
            items.pop_front()
        } else {
            None
        };
        items.push_back(item);
        drop(items);
        self.inner.not_empty.notify_one();
        evicted
    }

    /// Dequeue, waiting up to `timeout` for an item.
    ///
    /// A timeout too large to express as a deadline waits until an item
    /// arrives.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let mut items = self.inner.items.lock();
        if let Some(item) = items.pop_front() {
            return Some(item);
        }

        let Some(deadline) = Instant::now().checked_add(timeout) else {
            loop {
                self.inner.not_empty.wait(&mut items);
                if let Some(item) = items.pop_front() {
                    return Some(item);
                }
            }
        };
        loop {
            if self
                .inner
                .not_empty
                .wait_until(&mut items, deadline)
                .timed_out()
            {
                return items.pop_front();
            }
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
        }
    }

    /// Dequeue if an item is ready.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.items.lock().pop_front()
    }

    /// Take everything currently queued, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.inner.items.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl<T> std::fmt::Debug for DeliveryQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("len", &self.len())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            DeliveryQueue::<u32>::new(0),
            Err(ListenerError::Config(_))
        ));
    }

    #[test]
    fn reject_keeps_existing_items() {
        let queue = DeliveryQueue::new(3).expect("queue should build");
        for n in 1..=3 {
            queue.try_push(n).expect("push under capacity should succeed");
        }

        assert_eq!(queue.try_push(4), Err(QueueFull(4)));
        assert_eq!(queue.drain(), vec![1, 2, 3]);
    }

    #[test]
    fn drop_oldest_keeps_newest_items() {
        let queue = DeliveryQueue::new(3).expect("queue should build");
        let mut evicted = Vec::new();
        for n in 1..=4 {
            evicted.extend(queue.push_evicting(n));
        }

        assert_eq!(evicted, vec![1]);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.drain(), vec![2, 3, 4]);
    }

    #[test]
    fn pop_timeout_returns_none_when_idle() {
        let queue = DeliveryQueue::<u8>::new(1).expect("queue should build");
        let start = Instant::now();
        assert_eq!(queue.pop_timeout(Duration::from_millis(30)), None);
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn pop_timeout_wakes_on_push_from_other_thread() {
        let queue = DeliveryQueue::new(4).expect("queue should build");
        let producer = queue.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.try_push("record").expect("push should succeed");
        });

        assert_eq!(queue.pop_timeout(Duration::from_secs(5)), Some("record"));
        handle.join().expect("producer should finish");
        assert!(queue.is_empty());
    }

    #[test]
    fn pop_timeout_accepts_unbounded_wait() {
        let queue = DeliveryQueue::new(1).expect("queue should build");
        queue.try_push(1).expect("push should succeed");
        assert_eq!(queue.pop_timeout(Duration::MAX), Some(1));

        let producer = queue.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.try_push(2).expect("push should succeed");
        });
        assert_eq!(queue.pop_timeout(Duration::MAX), Some(2));
        handle.join().expect("producer should finish");
    }

    #[test]
    fn clones_share_storage() {
        let queue = DeliveryQueue::new(2).expect("queue should build");
        let other = queue.clone();
        queue.try_push(7).expect("push should succeed");
        assert_eq!(other.try_pop(), Some(7));
        assert_eq!(queue.capacity(), 2);
    }
}
