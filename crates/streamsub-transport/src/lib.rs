//! Subscription transport for broadcast byte streams.
//!
//! A subscriber attaches to a publisher endpoint and receives every byte the
//! publisher broadcasts. There is no topic filtering: connecting is subscribing.
//!
//! This is the lowest layer of streamsub. The frame and listener crates build on
//! the [`SubscriberSocket`] and [`Connector`] seams provided here.
//!
//! Only plain TCP broadcasters are supported out of the box. A ZeroMQ PUB socket
//! cannot be consumed without a ZeroMQ-backed [`Connector`].

pub mod endpoint;
pub mod error;
pub mod tcp;
pub mod traits;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use tcp::{TcpConnector, TcpSubscriber, DEFAULT_CONNECT_TIMEOUT, READ_CHUNK_SIZE};
pub use traits::{Connector, SocketCloser, SubscriberSocket};

#[cfg(feature = "async")]
pub use tcp::connect_async;
