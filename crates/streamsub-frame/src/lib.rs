//! Checksummed object framing, fixed-width record layouts and stream reassembly.
//!
//! Two wire shapes are understood:
//! - Object frames: a 4-byte cookie, a 4-byte little-endian total length, a
//!   JSON payload and a CRC-32 of the payload
//! - Fixed records: back-to-back binary records of a width fixed by a
//!   [`RecordLayout`], with no framing at all
//!
//! The [`Reassembler`] turns arbitrarily chunked bytes into whole [`Record`]s.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod layout;
pub mod reassembler;
pub mod record;

#[cfg(feature = "async")]
pub use async_codec::RecordCodec;
pub use codec::{
    checksum, decode_frame, decode_object, encode_object, encode_payload, Decoded, RawFrame,
    CHECKSUM_SIZE, COOKIE, DEFAULT_MAX_FRAME, HEADER_SIZE, MIN_FRAME_SIZE,
};
pub use error::{FrameError, LayoutError, Result};
pub use layout::{FieldSpec, FixedRecord, LayoutBuilder, Packing, RecordLayout, Scalar, ScalarType};
pub use reassembler::Reassembler;
pub use record::{Record, RecordShape};
