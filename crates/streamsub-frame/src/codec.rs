use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{FrameError, Result};

/// Magic bytes opening every object frame.
pub const COOKIE: [u8; 4] = [0x52, 0x00, 0x57, 0x00];

/// Cookie (4) + total length (4).
pub const HEADER_SIZE: usize = 8;

/// Trailing CRC-32 of the payload.
pub const CHECKSUM_SIZE: usize = 4;

/// Smallest legal frame: header and checksum around an empty payload.
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + CHECKSUM_SIZE;

/// Default maximum frame size: 64 MiB.
pub const DEFAULT_MAX_FRAME: usize = 64 * 1024 * 1024;

/// A complete, checksum-verified frame borrowed from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame<'a> {
    /// The payload bytes between length field and checksum.
    pub payload: &'a [u8],
    /// Total bytes the frame occupies on the wire.
    pub wire_size: usize,
}

/// A decoded value together with the bytes that followed its frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<'a, T> {
    /// The deserialized payload.
    pub value: T,
    /// Unconsumed input after the frame.
    pub residual: &'a [u8],
}

/// CRC-32 (IEEE) of a payload.
pub fn checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

/// Encode a raw payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬─────────────────┬──────────────┐
/// │ Cookie (4B)  │ Length (4B)  │ Payload         │ CRC-32 (4B)  │
/// │ 52 00 57 00  │ LE, counts   │ (Length - 12 B) │ LE, payload  │
/// │              │ whole frame  │                 │ bytes only   │
/// └──────────────┴──────────────┴─────────────────┴──────────────┘
/// ```
pub fn encode_payload(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let total = MIN_FRAME_SIZE + payload.len();
    if total > u32::MAX as usize {
        return Err(FrameError::FrameTooLarge {
            size: total,
            max: u32::MAX as usize,
        });
    }
    dst.reserve(total);
    dst.put_slice(&COOKIE);
    dst.put_u32_le(total as u32);
    dst.put_slice(payload);
    dst.put_u32_le(checksum(payload));
    Ok(())
}

/// Serialize `value` as JSON and append it as one frame.
pub fn encode_object<T: Serialize + ?Sized>(value: &T, dst: &mut BytesMut) -> Result<()> {
    let payload = serde_json::to_vec(value).map_err(FrameError::Serialize)?;
    encode_payload(&payload, dst)
}

/// Decode the frame at the head of `src`.
///
/// Returns `Ok(None)` if more bytes are needed. The cookie is checked as soon
/// as four bytes are present, so a desynchronized stream fails early instead of
/// waiting on a garbage length.
pub fn decode_frame(src: &[u8], max_frame: usize) -> Result<Option<RawFrame<'_>>> {
    if src.len() < COOKIE.len() {
        return Ok(None);
    }
    if src[..COOKIE.len()] != COOKIE {
        return Err(FrameError::InvalidHeader);
    }
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&src[4..HEADER_SIZE]);
    let total = u32::from_le_bytes(len_bytes) as usize;

    if total < MIN_FRAME_SIZE {
        return Err(FrameError::InvalidLength {
            declared: total,
            min: MIN_FRAME_SIZE,
        });
    }
    if total > max_frame {
        return Err(FrameError::FrameTooLarge {
            size: total,
            max: max_frame,
        });
    }
    if src.len() < total {
        return Ok(None);
    }

    let payload = &src[HEADER_SIZE..total - CHECKSUM_SIZE];
    let mut crc_bytes = [0u8; 4];
    crc_bytes.copy_from_slice(&src[total - CHECKSUM_SIZE..total]);
    let expected = u32::from_le_bytes(crc_bytes);
    let actual = checksum(payload);
    if expected != actual {
        return Err(FrameError::ChecksumMismatch { expected, actual });
    }

    Ok(Some(RawFrame {
        payload,
        wire_size: total,
    }))
}

/// Decode and deserialize the frame at the head of `src`.
///
/// Returns `Ok(None)` if more bytes are needed.
pub fn decode_object<T: DeserializeOwned>(
    src: &[u8],
    max_frame: usize,
) -> Result<Option<Decoded<'_, T>>> {
    let Some(frame) = decode_frame(src, max_frame)? else {
        return Ok(None);
    };
    let value = serde_json::from_slice(frame.payload).map_err(FrameError::BadPayload)?;
    Ok(Some(Decoded {
        value,
        residual: &src[frame.wire_size..],
    }))
}
