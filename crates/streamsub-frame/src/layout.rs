//! Fixed-width binary record layouts.
//!
//! A layout is a flat list of named scalar fields. Offsets follow C struct
//! rules by default (each field aligned to its own size, total width padded to
//! the largest alignment), which is what a publisher writing `repr(C)` structs
//! puts on the wire. [`Packing::Packed`] drops all padding.
//!
//! All scalars are little-endian.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::LayoutError;

/// Scalar field types understood by [`RecordLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ScalarType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ScalarType {
    /// Width in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Canonical type name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    fn read(self, bytes: &[u8]) -> Scalar {
        match self {
            Self::Bool => Scalar::Bool(bytes[0] != 0),
            Self::I8 => Scalar::I8(i8::from_le_bytes(take(bytes))),
            Self::U8 => Scalar::U8(bytes[0]),
            Self::I16 => Scalar::I16(i16::from_le_bytes(take(bytes))),
            Self::U16 => Scalar::U16(u16::from_le_bytes(take(bytes))),
            Self::I32 => Scalar::I32(i32::from_le_bytes(take(bytes))),
            Self::U32 => Scalar::U32(u32::from_le_bytes(take(bytes))),
            Self::I64 => Scalar::I64(i64::from_le_bytes(take(bytes))),
            Self::U64 => Scalar::U64(u64::from_le_bytes(take(bytes))),
            Self::F32 => Scalar::F32(f32::from_le_bytes(take(bytes))),
            Self::F64 => Scalar::F64(f64::from_le_bytes(take(bytes))),
        }
    }
}

fn take<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

impl FromStr for ScalarType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.trim().to_ascii_lowercase().as_str() {
            "bool" | "c_bool" => Self::Bool,
            "i8" | "byte" | "c_byte" => Self::I8,
            "u8" | "ubyte" | "c_ubyte" => Self::U8,
            "i16" | "short" | "c_short" => Self::I16,
            "u16" | "ushort" | "c_ushort" => Self::U16,
            "i32" | "int" | "c_int" => Self::I32,
            "u32" | "uint" | "c_uint" => Self::U32,
            "i64" | "longlong" | "c_longlong" => Self::I64,
            "u64" | "ulonglong" | "c_ulonglong" => Self::U64,
            "f32" | "float" | "c_float" => Self::F32,
            "f64" | "double" | "c_double" => Self::F64,
            other => return Err(other.to_string()),
        };
        Ok(ty)
    }
}

impl TryFrom<String> for ScalarType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .parse()
            .map_err(|ty| format!("unknown scalar type {ty:?}"))
    }
}

impl Serialize for ScalarType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded field value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Scalar {
    /// The type this value belongs to.
    pub const fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Bool(_) => ScalarType::Bool,
            Self::I8(_) => ScalarType::I8,
            Self::U8(_) => ScalarType::U8,
            Self::I16(_) => ScalarType::I16,
            Self::U16(_) => ScalarType::U16,
            Self::I32(_) => ScalarType::I32,
            Self::U32(_) => ScalarType::U32,
            Self::I64(_) => ScalarType::I64,
            Self::U64(_) => ScalarType::U64,
            Self::F32(_) => ScalarType::F32,
            Self::F64(_) => ScalarType::F64,
        }
    }

    /// Lossy numeric view, handy for aggregation.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Bool(v) => f64::from(u8::from(v)),
            Self::I8(v) => f64::from(v),
            Self::U8(v) => f64::from(v),
            Self::I16(v) => f64::from(v),
            Self::U16(v) => f64::from(v),
            Self::I32(v) => f64::from(v),
            Self::U32(v) => f64::from(v),
            Self::I64(v) => v as f64,
            Self::U64(v) => v as f64,
            Self::F32(v) => f64::from(v),
            Self::F64(v) => v,
        }
    }

    /// Integer view; `None` for floats and out-of-range `u64`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Bool(v) => Some(i64::from(v)),
            Self::I8(v) => Some(i64::from(v)),
            Self::U8(v) => Some(i64::from(v)),
            Self::I16(v) => Some(i64::from(v)),
            Self::U16(v) => Some(i64::from(v)),
            Self::I32(v) => Some(i64::from(v)),
            Self::U32(v) => Some(i64::from(v)),
            Self::I64(v) => Some(v),
            Self::U64(v) => i64::try_from(v).ok(),
            Self::F32(_) | Self::F64(_) => None,
        }
    }

    fn write(&self, dst: &mut BytesMut) {
        match *self {
            Self::Bool(v) => dst.put_u8(u8::from(v)),
            Self::I8(v) => dst.put_i8(v),
            Self::U8(v) => dst.put_u8(v),
            Self::I16(v) => dst.put_i16_le(v),
            Self::U16(v) => dst.put_u16_le(v),
            Self::I32(v) => dst.put_i32_le(v),
            Self::U32(v) => dst.put_u32_le(v),
            Self::I64(v) => dst.put_i64_le(v),
            Self::U64(v) => dst.put_u64_le(v),
            Self::F32(v) => dst.put_f32_le(v),
            Self::F64(v) => dst.put_f64_le(v),
        }
    }
}

/// Field placement rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Packing {
    /// C struct alignment (`repr(C)`).
    #[default]
    Native,
    /// No padding between or after fields.
    Packed,
}

/// One placed field of a layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ScalarType,
    pub offset: usize,
}

/// Shape of a fixed-width record, computed once per record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    fields: Vec<FieldSpec>,
    names: Arc<[String]>,
    width: usize,
    packing: Packing,
}

impl RecordLayout {
    /// Start building a layout.
    pub fn builder() -> LayoutBuilder {
        LayoutBuilder::default()
    }

    /// Parse `name:type,name:type,...` with C alignment.
    pub fn parse(spec: &str) -> Result<Self, LayoutError> {
        Self::parse_with(spec, Packing::Native)
    }

    /// Parse `name:type,name:type,...` with explicit packing.
    pub fn parse_with(spec: &str, packing: Packing) -> Result<Self, LayoutError> {
        let mut builder = LayoutBuilder::default().packing(packing);
        for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, ty) = part
                .split_once(':')
                .ok_or_else(|| LayoutError::MalformedField(part.to_string()))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(LayoutError::MalformedField(part.to_string()));
            }
            let ty = ty.parse().map_err(|ty| LayoutError::UnknownType {
                field: name.to_string(),
                ty,
            })?;
            builder = builder.field(name, ty);
        }
        builder.build()
    }

    /// Record width in bytes, including padding.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Placed fields in wire order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Packing rule used to place the fields.
    pub fn packing(&self) -> Packing {
        self.packing
    }

    /// Assert the width the publisher is known to use.
    pub fn expect_width(self, expected: usize) -> Result<Self, LayoutError> {
        if self.width != expected {
            return Err(LayoutError::WidthMismatch {
                expected,
                actual: self.width,
            });
        }
        Ok(self)
    }

    /// Reinterpret the first [`width`](Self::width) bytes as one record.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than the layout width. Callers only invoke
    /// this once a full record is buffered.
    pub fn decode_one(&self, bytes: &[u8]) -> FixedRecord {
        assert!(
            bytes.len() >= self.width,
            "decode_one needs {} bytes, got {}",
            self.width,
            bytes.len()
        );
        let values = self
            .fields
            .iter()
            .map(|field| field.ty.read(&bytes[field.offset..]))
            .collect();
        FixedRecord {
            names: Arc::clone(&self.names),
            values,
        }
    }

    /// Build a record for this layout from values in field order.
    pub fn record(&self, values: Vec<Scalar>) -> Result<FixedRecord, LayoutError> {
        self.check_values(&values)?;
        Ok(FixedRecord {
            names: Arc::clone(&self.names),
            values,
        })
    }

    /// Append the wire form of `record`, zero-filling padding.
    pub fn encode(&self, record: &FixedRecord, dst: &mut BytesMut) -> Result<(), LayoutError> {
        self.check_values(&record.values)?;
        let start = dst.len();
        dst.reserve(self.width);
        for (field, value) in self.fields.iter().zip(&record.values) {
            dst.put_bytes(0, start + field.offset - dst.len());
            value.write(dst);
        }
        dst.put_bytes(0, start + self.width - dst.len());
        Ok(())
    }

    fn check_values(&self, values: &[Scalar]) -> Result<(), LayoutError> {
        for (i, field) in self.fields.iter().enumerate() {
            match values.get(i) {
                Some(value) if value.scalar_type() == field.ty => {}
                _ => {
                    return Err(LayoutError::ValueMismatch {
                        field: field.name.clone(),
                    })
                }
            }
        }
        if values.len() != self.fields.len() {
            return Err(LayoutError::ValueMismatch {
                field: format!("#{}", self.fields.len()),
            });
        }
        Ok(())
    }
}

/// Builder for [`RecordLayout`].
#[derive(Debug, Clone, Default)]
pub struct LayoutBuilder {
    fields: Vec<(String, ScalarType)>,
    packing: Packing,
}

impl LayoutBuilder {
    /// Append a field.
    pub fn field(mut self, name: impl Into<String>, ty: ScalarType) -> Self {
        self.fields.push((name.into(), ty));
        self
    }

    /// Choose the packing rule.
    pub fn packing(mut self, packing: Packing) -> Self {
        self.packing = packing;
        self
    }

    /// Drop all padding.
    pub fn packed(self) -> Self {
        self.packing(Packing::Packed)
    }

    /// Place the fields and compute the width.
    pub fn build(self) -> Result<RecordLayout, LayoutError> {
        if self.fields.is_empty() {
            return Err(LayoutError::Empty);
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(self.fields.len());
        let mut offset = 0usize;
        let mut max_align = 1usize;

        for (name, ty) in self.fields {
            if !seen.insert(name.clone()) {
                return Err(LayoutError::DuplicateField(name));
            }
            let align = match self.packing {
                Packing::Native => ty.size(),
                Packing::Packed => 1,
            };
            max_align = max_align.max(align);
            offset = offset.next_multiple_of(align);
            fields.push(FieldSpec { name, ty, offset });
            offset += ty.size();
        }

        let width = offset.next_multiple_of(max_align);
        let names = fields.iter().map(|f| f.name.clone()).collect();

        Ok(RecordLayout {
            fields,
            names,
            width,
            packing: self.packing,
        })
    }
}

/// One decoded fixed-width record.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedRecord {
    names: Arc<[String]>,
    values: Vec<Scalar>,
}

impl FixedRecord {
    /// Value of a named field.
    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.values.get(i))
    }

    /// Values in field order.
    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    /// `(name, value)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.names.iter().map(String::as_str).zip(&self.values)
    }
}

impl Serialize for FixedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
