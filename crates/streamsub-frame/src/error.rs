/// Errors that can occur during frame encoding/decoding.
///
/// Needing more bytes is not an error: decoders report it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The first four bytes are not the frame cookie; the stream is desynchronized.
    #[error("invalid frame cookie (expected 52 00 57 00)")]
    InvalidHeader,

    /// The declared frame length cannot hold cookie, length and checksum.
    #[error("invalid frame length {declared} (minimum {min})")]
    InvalidLength { declared: usize, min: usize },

    /// The declared frame length exceeds the configured maximum.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The payload checksum does not match the trailer.
    #[error("checksum mismatch (frame says {expected:#010x}, payload hashes to {actual:#010x})")]
    ChecksumMismatch { expected: u32, actual: u32 },

    /// The checksum matched but the payload does not deserialize.
    #[error("bad payload: {0}")]
    BadPayload(#[source] serde_json::Error),

    /// A value could not be serialized into a payload.
    #[error("failed to serialize payload: {0}")]
    Serialize(#[source] serde_json::Error),

    /// An I/O error surfaced through a stream decoder.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// True when the error means the byte stream itself is corrupt.
    ///
    /// A corrupt stream cannot be resynchronized; its connection must be
    /// dropped together with every buffered byte.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::InvalidHeader
                | Self::InvalidLength { .. }
                | Self::FrameTooLarge { .. }
                | Self::ChecksumMismatch { .. }
                | Self::BadPayload(_)
        )
    }
}

/// Errors in fixed record layout definitions.
///
/// These are configuration errors and surface when a layout is built, never
/// while records are decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// A layout needs at least one field.
    #[error("record layout has no fields")]
    Empty,

    /// Two fields share a name.
    #[error("duplicate field name {0:?}")]
    DuplicateField(String),

    /// A field spec names a type that is not a known scalar.
    #[error("field {field:?} has unknown type {ty:?}")]
    UnknownType { field: String, ty: String },

    /// A field spec is not of the form `name:type`.
    #[error("malformed field spec {0:?} (expected name:type)")]
    MalformedField(String),

    /// The computed width disagrees with the width the publisher uses.
    #[error("record width mismatch (layout is {actual} bytes, expected {expected})")]
    WidthMismatch { expected: usize, actual: usize },

    /// Values handed to the layout do not match its fields.
    #[error("value for field {field:?} does not match the layout")]
    ValueMismatch { field: String },
}

pub type Result<T> = std::result::Result<T, FrameError>;
