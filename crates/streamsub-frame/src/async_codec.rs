use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::DEFAULT_MAX_FRAME;
use crate::error::FrameError;
use crate::record::{decode_record, Record, RecordShape};

/// `tokio_util` decoder yielding [`Record`]s of one shape.
///
/// Shares its decode step with [`Reassembler`](crate::Reassembler), so both
/// paths agree on what is incomplete and what is corrupt.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    shape: RecordShape,
    max_frame: usize,
}

impl RecordCodec {
    /// Create a decoder for a record shape.
    pub fn new(shape: RecordShape) -> Self {
        Self {
            shape,
            max_frame: DEFAULT_MAX_FRAME,
        }
    }

    /// Override the largest object frame accepted.
    pub fn with_max_frame(mut self, max_frame: usize) -> Self {
        self.max_frame = max_frame;
        self
    }
}

impl Decoder for RecordCodec {
    type Item = Record;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_record(&self.shape, src, self.max_frame)
    }
}
