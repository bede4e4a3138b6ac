/// Errors that can occur in subscription transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The endpoint string could not be parsed.
    #[error("invalid endpoint {input:?}: {reason}")]
    InvalidEndpoint { input: String, reason: &'static str },

    /// The endpoint host did not resolve to any socket address.
    #[error("failed to resolve {endpoint}")]
    Resolve { endpoint: String },

    /// Failed to connect to the publisher.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the subscription stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The publisher closed the stream.
    #[error("publisher closed the connection")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
