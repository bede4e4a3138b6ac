use bytes::BytesMut;
use tracing::{debug, trace};

use crate::codec::DEFAULT_MAX_FRAME;
use crate::error::Result;
use crate::record::{decode_record, Record, RecordShape};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Turns arbitrarily chunked stream bytes into whole records.
///
/// New bytes are appended with [`extend`](Self::extend); complete records are
/// pulled with [`next_record`](Self::next_record) until it returns `Ok(None)`,
/// which leaves any partial tail buffered for the next read.
///
/// A corruption error discards everything buffered. There is no attempt to
/// resynchronize on a later cookie.
pub struct Reassembler {
    shape: RecordShape,
    buf: BytesMut,
    max_frame: usize,
}

impl Reassembler {
    /// Create a reassembler for a record shape.
    pub fn new(shape: RecordShape) -> Self {
        Self {
            shape,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_frame: DEFAULT_MAX_FRAME,
        }
    }

    /// Override the largest object frame accepted.
    pub fn with_max_frame(mut self, max_frame: usize) -> Self {
        self.max_frame = max_frame;
        self
    }

    /// Append newly received bytes. An empty chunk is a no-op.
    pub fn extend(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            trace!("empty chunk");
            return;
        }
        self.buf.extend_from_slice(chunk);
    }

    /// Pull the next complete record, or `Ok(None)` when more bytes are needed.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        match decode_record(&self.shape, &mut self.buf, self.max_frame) {
            Ok(record) => Ok(record),
            Err(err) => {
                debug!(discarded = self.buf.len(), error = %err, "stream corrupt, dropping buffer");
                self.buf.clear();
                Err(err)
            }
        }
    }

    /// Append a chunk and collect every record it completes.
    ///
    /// Records decoded before an error in the same chunk are lost; callers that
    /// must deliver them pull with [`next_record`](Self::next_record) instead.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Record>> {
        self.extend(chunk);
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    /// Bytes held for a record that is not complete yet.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop every buffered byte.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// The shape records are decoded with.
    pub fn shape(&self) -> &RecordShape {
        &self.shape
    }
}

impl std::fmt::Debug for Reassembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reassembler")
            .field("shape", &self.shape)
            .field("buffered", &self.buf.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use serde_json::json;

    use super::*;
    use crate::codec::{encode_object, HEADER_SIZE};
    use crate::error::FrameError;
    use crate::layout::{RecordLayout, Scalar};

    fn sensor_layout() -> RecordLayout {
        RecordLayout::parse("timestamp:i64,streamNum:u32,value:f32").unwrap()
    }

    fn sensor_bytes(layout: &RecordLayout, stream: u32) -> BytesMut {
        let record = layout
            .record(vec![
                Scalar::I64(1_000 + i64::from(stream)),
                Scalar::U32(stream),
                Scalar::F32(stream as f32 * 0.5),
            ])
            .unwrap();
        let mut wire = BytesMut::new();
        layout.encode(&record, &mut wire).unwrap();
        wire
    }

    #[test]
    fn fixed_records_in_one_read() {
        let layout = sensor_layout();
        let mut wire = BytesMut::new();
        for stream in [2, 26, 3] {
            wire.extend_from_slice(&sensor_bytes(&layout, stream));
        }

        let mut reassembler = Reassembler::new(RecordShape::Fixed(layout));
        let records = reassembler.push(&wire).unwrap();

        let streams: Vec<_> = records
            .iter()
            .map(|r| r.as_fixed().unwrap().get("streamNum").copied())
            .collect();
        assert_eq!(
            streams,
            vec![Some(Scalar::U32(2)), Some(Scalar::U32(26)), Some(Scalar::U32(3))]
        );
        assert_eq!(reassembler.buffered(), 0);
    }

    #[test]
    fn fixed_tail_waits_for_next_read() {
        let layout = sensor_layout();
        let wire = sensor_bytes(&layout, 9);
        let mut reassembler = Reassembler::new(RecordShape::Fixed(layout));

        assert!(reassembler.push(&wire[..10]).unwrap().is_empty());
        assert_eq!(reassembler.buffered(), 10);

        let records = reassembler.push(&wire[10..]).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(reassembler.buffered(), 0);
    }

    #[test]
    fn object_frames_split_across_reads() {
        let mut wire = BytesMut::new();
        encode_object(&json!({"seq": 1}), &mut wire).unwrap();
        encode_object(&json!({"seq": 2}), &mut wire).unwrap();

        let mut reassembler = Reassembler::new(RecordShape::Object);
        let mut out = reassembler.push(&wire[..HEADER_SIZE + 3]).unwrap();
        assert!(out.is_empty());
        out.extend(reassembler.push(&wire[HEADER_SIZE + 3..]).unwrap());

        assert_eq!(
            out,
            vec![
                Record::Object(json!({"seq": 1})),
                Record::Object(json!({"seq": 2}))
            ]
        );
    }

    #[test]
    fn empty_chunk_is_a_noop() {
        let mut reassembler = Reassembler::new(RecordShape::Object);
        assert!(reassembler.push(&[]).unwrap().is_empty());
        assert_eq!(reassembler.buffered(), 0);
    }

    #[test]
    fn corruption_discards_buffer() {
        let mut wire = BytesMut::new();
        encode_object(&json!("good"), &mut wire).unwrap();
        let first_len = wire.len();
        encode_object(&json!("bad"), &mut wire).unwrap();
        wire[first_len + HEADER_SIZE] ^= 0x20;
        wire.extend_from_slice(b"tail");

        let mut reassembler = Reassembler::new(RecordShape::Object);
        reassembler.extend(&wire);

        assert_eq!(
            reassembler.next_record().unwrap(),
            Some(Record::Object(json!("good")))
        );
        let err = reassembler.next_record().unwrap_err();
        assert!(matches!(err, FrameError::ChecksumMismatch { .. }));
        assert_eq!(reassembler.buffered(), 0);
        assert!(reassembler.next_record().unwrap().is_none());
    }

    #[test]
    fn desynchronized_stream_is_invalid_header() {
        let mut reassembler = Reassembler::new(RecordShape::Object);
        let err = reassembler.push(b"garbage!").unwrap_err();
        assert!(matches!(err, FrameError::InvalidHeader));
    }

    #[test]
    fn max_frame_is_enforced() {
        let mut wire = BytesMut::new();
        encode_object(&"x".repeat(256), &mut wire).unwrap();

        let mut reassembler = Reassembler::new(RecordShape::Object).with_max_frame(64);
        let err = reassembler.push(&wire).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { max: 64, .. }));
    }
}
