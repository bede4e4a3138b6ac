use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::endpoint::Endpoint;
use crate::error::Result;

/// A connected subscription: delivers broadcast bytes in arbitrary chunks.
///
/// Chunk boundaries carry no meaning. Reassembling records out of the chunks
/// is the frame layer's job.
pub trait SubscriberSocket: Send {
    /// Wait up to `timeout` for the next chunk.
    ///
    /// `Ok(None)` means the timeout elapsed with nothing received and is not an
    /// error. `Ok(Some(chunk))` may carry an empty chunk; callers treat it as a
    /// plain poll result.
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Bytes>>;

    /// A handle that can force this socket closed from another thread.
    ///
    /// Closing wakes a pending [`recv_timeout`](Self::recv_timeout), which then
    /// returns an error or `Ok(None)`.
    fn closer(&self) -> Result<SocketCloser>;
}

/// Opens subscriber sockets for an endpoint.
pub trait Connector: Send + Sync {
    /// Connect and subscribe to every message published at `endpoint`.
    fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn SubscriberSocket>>;
}

impl<F> Connector for F
where
    F: Fn(&Endpoint) -> Result<Box<dyn SubscriberSocket>> + Send + Sync,
{
    fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn SubscriberSocket>> {
        self(endpoint)
    }
}

/// Thread-safe handle that shuts a subscriber socket down.
///
/// Cloning shares the same underlying close action. Closing more than once is
/// harmless.
#[derive(Clone)]
pub struct SocketCloser {
    close: Arc<dyn Fn() + Send + Sync>,
}

impl SocketCloser {
    /// Wrap a close action.
    pub fn new(close: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            close: Arc::new(close),
        }
    }

    /// A closer for sockets that need no forced shutdown.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Force the socket closed.
    pub fn close(&self) {
        (self.close)();
    }
}

impl fmt::Debug for SocketCloser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketCloser").finish_non_exhaustive()
    }
}
