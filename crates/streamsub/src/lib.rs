//! Broadcast stream subscription with checksummed framing and bounded delivery.
//!
//! streamsub attaches to a publisher, reassembles its byte stream into records
//! and hands them to a bounded queue drained by the application.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP subscriber sockets and endpoint parsing
//! - [`frame`]: object framing, fixed-width layouts and stream reassembly
//! - [`listener`]: background subscription with reconnect and overflow policy
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use streamsub::frame::{RecordLayout, RecordShape};
//! use streamsub::listener::{DeliveryQueue, Listener, ListenerConfig};
//! use streamsub::transport::Endpoint;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = RecordLayout::parse("timestamp:i64,streamNum:u32,value:f32")?;
//! let config = ListenerConfig::new("127.0.0.1:40020".parse::<Endpoint>()?, RecordShape::Fixed(layout))
//!     .with_retry(true);
//! let queue = DeliveryQueue::new(1024)?;
//! let listener = Listener::builder(config).queue(queue.clone()).spawn()?;
//!
//! while let Some(record) = queue.pop_timeout(Duration::from_secs(1)) {
//!     println!("{}", serde_json::to_string(&record)?);
//! }
//! listener.stop()?;
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use streamsub_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use streamsub_frame::*;
}

/// Re-export listener types.
pub mod listener {
    pub use streamsub_listener::*;
}
