use bytes::{Buf, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::decode_object;
use crate::error::{FrameError, Result};
use crate::layout::{FixedRecord, RecordLayout};

/// What the publisher puts on the wire, chosen once per subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordShape {
    /// Back-to-back fixed-width records, no framing.
    Fixed(RecordLayout),
    /// Cookie/length/checksum frames carrying JSON objects.
    Object,
}

impl RecordShape {
    /// Record width for fixed shapes.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::Fixed(layout) => Some(layout.width()),
            Self::Object => None,
        }
    }
}

/// One record pulled out of the stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Fixed(FixedRecord),
    Object(serde_json::Value),
}

impl Record {
    /// The fixed record, if this came from a fixed shape.
    pub fn as_fixed(&self) -> Option<&FixedRecord> {
        match self {
            Self::Fixed(record) => Some(record),
            Self::Object(_) => None,
        }
    }

    /// The JSON value, if this came from an object frame.
    pub fn as_object(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Object(value) => Some(value),
            Self::Fixed(_) => None,
        }
    }

    /// Deserialize into a caller type.
    ///
    /// Fixed records are viewed as a map of field name to value.
    pub fn into_object<T: DeserializeOwned>(self) -> Result<T> {
        let value = match self {
            Self::Object(value) => value,
            Self::Fixed(record) => serde_json::to_value(&record).map_err(FrameError::Serialize)?,
        };
        serde_json::from_value(value).map_err(FrameError::BadPayload)
    }
}

/// Pull one record off the head of `buf` according to `shape`.
///
/// Returns `Ok(None)` if the buffer does not yet hold a whole record. On
/// success exactly the record's bytes are consumed.
pub(crate) fn decode_record(
    shape: &RecordShape,
    buf: &mut BytesMut,
    max_frame: usize,
) -> Result<Option<Record>> {
    match shape {
        RecordShape::Fixed(layout) => {
            let width = layout.width();
            if buf.len() < width {
                return Ok(None);
            }
            let record = layout.decode_one(&buf[..width]);
            buf.advance(width);
            Ok(Some(Record::Fixed(record)))
        }
        RecordShape::Object => {
            let Some(decoded) = decode_object::<serde_json::Value>(&buf[..], max_frame)? else {
                return Ok(None);
            };
            let consumed = buf.len() - decoded.residual.len();
            let value = decoded.value;
            buf.advance(consumed);
            Ok(Some(Record::Object(value)))
        }
    }
}
