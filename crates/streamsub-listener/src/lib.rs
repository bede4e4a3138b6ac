//! Background broadcast subscriber with reconnect and bounded delivery queue.
//!
//! A [`Listener`] owns one connection and one reassembly buffer on its own
//! thread. Decoded records pass through an optional transform and land in a
//! [`DeliveryQueue`] that any number of consumers drain at their own pace.
//!
//! Errors are handled according to two independent switches: a notify callback
//! and the retry flag. See [`ListenerConfig::retry`].

#[cfg(feature = "async")]
pub mod async_listener;
pub mod config;
pub mod delivery;
pub mod error;
pub mod listener;
pub mod queue;
pub mod status;

#[cfg(feature = "async")]
pub use async_listener::AsyncListener;
pub use config::{ListenerConfig, OverflowPolicy, DEFAULT_POLL_TIMEOUT, DEFAULT_RETRY_BACKOFF};
pub use delivery::{LogSink, NotifyFn, Transform};
pub use error::{BoxError, ListenerError, Result};
pub use listener::{Listener, ListenerBuilder};
pub use queue::{DeliveryQueue, QueueFull};
pub use status::{ListenerState, ListenerStats};
