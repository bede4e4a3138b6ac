use std::sync::Arc;

use streamsub_frame::Record;
use tracing::trace;

use crate::config::OverflowPolicy;
use crate::error::{BoxError, ListenerError, Result};
use crate::queue::{DeliveryQueue, QueueFull};
use crate::status::Counters;

/// Per-record hook run on the worker before enqueueing.
///
/// `Ok(Some(item))` enqueues `item`, `Ok(None)` silently drops the record, and
/// `Err` is handled like any other listener error.
pub type Transform<T> = Box<dyn FnMut(Record) -> std::result::Result<Option<T>, BoxError> + Send>;

/// Error callback, invoked on the worker thread for every error.
pub type NotifyFn = Arc<dyn Fn(&ListenerError) + Send + Sync>;

/// Receives the one-line informational messages the listener emits.
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Transform plus queue, applied to each decoded record.
///
/// Without a queue the transform is the only consumer and its results are
/// dropped.
pub(crate) struct Delivery<T> {
    transform: Transform<T>,
    queue: Option<DeliveryQueue<T>>,
    overflow: OverflowPolicy,
}

impl<T> Delivery<T> {
    pub(crate) fn new(
        transform: Transform<T>,
        queue: Option<DeliveryQueue<T>>,
        overflow: OverflowPolicy,
    ) -> Self {
        Self {
            transform,
            queue,
            overflow,
        }
    }

    pub(crate) fn deliver(&mut self, record: Record, counters: &Counters) -> Result<()> {
        let Some(item) = (self.transform)(record).map_err(ListenerError::Transform)? else {
            trace!("record discarded by transform");
            counters.discarded();
            return Ok(());
        };
        let Some(queue) = &self.queue else {
            counters.discarded();
            return Ok(());
        };

        match self.overflow {
            OverflowPolicy::Reject => {
                queue
                    .try_push(item)
                    .map_err(|QueueFull(_)| ListenerError::QueueFull {
                        capacity: queue.capacity(),
                    })?;
            }
            OverflowPolicy::DropOldest => {
                if queue.push_evicting(item).is_some() {
                    trace!("queue full, evicted oldest item");
                    counters.evicted();
                }
            }
        }
        counters.delivered();
        Ok(())
    }
}

/// Transform that forwards every record unchanged.
pub(crate) fn passthrough() -> Transform<Record> {
    Box::new(|record| Ok(Some(record)))
}
