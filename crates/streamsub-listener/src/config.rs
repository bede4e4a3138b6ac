use std::time::Duration;

use serde::Deserialize;
use streamsub_frame::{RecordShape, DEFAULT_MAX_FRAME, MIN_FRAME_SIZE};
use streamsub_transport::Endpoint;

use crate::error::{ListenerError, Result};

/// Default bound on a single wait for incoming bytes.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Default pause after a failed connection attempt.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// What to do when the delivery queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Treat a full queue as a fatal error for the current connection.
    #[default]
    Reject,
    /// Evict the oldest queued item to make room.
    DropOldest,
}

/// Listener configuration, fixed once the listener is spawned.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Publisher address.
    pub endpoint: Endpoint,
    /// Wire shape of the records.
    pub shape: RecordShape,
    /// Name used for the worker thread and in log lines.
    pub name: String,
    /// Reconnect after errors instead of terminating.
    ///
    /// | notify | retry | on error |
    /// |---|---|---|
    /// | none | false | listener terminates, error returned from `stop`/`join` |
    /// | set | false | notify called, then listener terminates as above |
    /// | none | true | error absorbed, listener reconnects |
    /// | set | true | notify called, listener reconnects |
    pub retry: bool,
    /// Full-queue behavior.
    pub overflow: OverflowPolicy,
    /// Bound on a single wait for incoming bytes; also the stop latency.
    pub poll_timeout: Duration,
    /// Pause after a failed connection attempt, also taken before a
    /// non-retrying listener terminates on that failure.
    pub retry_backoff: Duration,
    /// Largest object frame accepted.
    pub max_frame_size: usize,
}

impl ListenerConfig {
    /// Configuration with defaults for everything but address and shape.
    pub fn new(endpoint: Endpoint, shape: RecordShape) -> Self {
        Self {
            endpoint,
            shape,
            name: "Listener".to_string(),
            retry: false,
            overflow: OverflowPolicy::Reject,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            max_frame_size: DEFAULT_MAX_FRAME,
        }
    }

    /// Override the listener name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Enable or disable reconnecting after errors.
    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = retry;
        self
    }

    /// Override the full-queue behavior.
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Override the poll timeout.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Override the reconnect backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Override the largest accepted object frame.
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Reject values the listener cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ListenerError::Config("listener name is empty".to_string()));
        }
        if self.poll_timeout.is_zero() {
            return Err(ListenerError::Config(
                "poll timeout must be greater than zero".to_string(),
            ));
        }
        if self.max_frame_size < MIN_FRAME_SIZE {
            return Err(ListenerError::Config(format!(
                "max frame size {} is below the {MIN_FRAME_SIZE}-byte minimum frame",
                self.max_frame_size
            )));
        }
        if let RecordShape::Fixed(layout) = &self.shape {
            if layout.width() == 0 {
                return Err(ListenerError::Config("record width is zero".to_string()));
            }
        }
        Ok(())
    }
}
