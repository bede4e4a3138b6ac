use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use streamsub_transport::SocketCloser;

/// Where the worker is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ListenerState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Polling = 3,
    Reassembling = 4,
    Terminated = 5,
}

impl ListenerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Polling,
            4 => Self::Reassembling,
            5 => Self::Terminated,
            _ => Self::Disconnected,
        }
    }
}

/// Counters snapshot, see [`Listener::stats`](crate::Listener::stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ListenerStats {
    /// Successful connections, including reconnects.
    pub connections: u64,
    /// Items placed on the delivery queue.
    pub delivered: u64,
    /// Records the transform chose to drop.
    pub discarded: u64,
    /// Queued items evicted under drop-oldest.
    pub evictions: u64,
    /// Errors observed, whether retried or fatal.
    pub errors: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    connections: AtomicU64,
    delivered: AtomicU64,
    discarded: AtomicU64,
    evictions: AtomicU64,
    errors: AtomicU64,
}

impl Counters {
    pub(crate) fn connected(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn evicted(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ListenerStats {
        ListenerStats {
            connections: self.connections.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// One-shot stop flag the worker can sleep on.
#[derive(Debug, Default)]
pub(crate) struct StopSignal {
    stopped: Mutex<bool>,
    cond: Condvar,
}

impl StopSignal {
    pub(crate) fn set(&self) {
        *self.stopped.lock() = true;
        self.cond.notify_all();
    }

    pub(crate) fn is_set(&self) -> bool {
        *self.stopped.lock()
    }

    /// Sleep up to `timeout`, returning early if stop is requested.
    /// Returns whether stop is set.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            let _ = self.cond.wait_for(&mut stopped, timeout);
        }
        *stopped
    }
}

/// State shared between the [`Listener`](crate::Listener) handle and its worker.
#[derive(Default)]
pub(crate) struct Shared {
    pub(crate) stop: StopSignal,
    closer: Mutex<Option<SocketCloser>>,
    state: AtomicU8,
    pub(crate) counters: Counters,
}

impl Shared {
    pub(crate) fn set_state(&self, state: ListenerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn state(&self) -> ListenerState {
        ListenerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Register the live connection so a stop request can force it closed.
    ///
    /// If stop was already requested the connection is closed immediately.
    pub(crate) fn attach(&self, closer: SocketCloser) {
        let mut slot = self.closer.lock();
        if self.stop.is_set() {
            closer.close();
        }
        *slot = Some(closer);
    }

    pub(crate) fn detach(&self) {
        self.closer.lock().take();
    }

    /// Request stop and unblock a worker waiting on its socket.
    pub(crate) fn request_stop(&self) {
        let slot = self.closer.lock();
        self.stop.set();
        if let Some(closer) = slot.as_ref() {
            closer.close();
        }
    }
}
