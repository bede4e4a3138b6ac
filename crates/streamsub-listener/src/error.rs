/// Boxed error returned by caller-supplied transforms.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// Transport-level error (connect, read, publisher gone).
    #[error("transport error: {0}")]
    Transport(#[from] streamsub_transport::TransportError),

    /// Stream corruption (bad cookie, length, checksum or payload).
    #[error("frame error: {0}")]
    Frame(#[from] streamsub_frame::FrameError),

    /// Invalid listener configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The delivery queue is full and the overflow policy rejects new records.
    #[error("delivery queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The caller-supplied transform failed.
    #[error("transform failed: {0}")]
    Transform(#[source] BoxError),

    /// The worker could not be started.
    #[error("failed to start listener: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker panicked.
    #[error("listener worker panicked: {0}")]
    Panicked(String),
}

impl From<streamsub_frame::LayoutError> for ListenerError {
    fn from(err: streamsub_frame::LayoutError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ListenerError>;
