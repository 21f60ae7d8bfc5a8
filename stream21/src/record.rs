//!
//! # Stream21 Record Codec
//!
//! Record-types, data-types, typed payloads,
//! and the conversions between them and GDSII's binary encoding.
//!

// Std-Lib Imports
use std::io::Write;

// Crates.io
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Local Imports
use crate::error::{GdsError, GdsResult};

/// Maximum record length in bytes, including the four header bytes
pub const MAX_RECORD_LEN: usize = 0xFFFE;
/// Maximum number of points in a single `XY` record
pub const MAX_XY_POINTS: usize = 8191;

///
/// # Gds Record Types
///
/// In the numeric-order specified by GDSII, for automatic [FromPrimitive] conversions.
///
#[derive(
    FromPrimitive, Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash,
)]
pub enum GdsRecordType {
    Header = 0x00,
    BgnLib,
    LibName,
    Units,
    EndLib,
    BgnStruct,
    StructName, // STRNAME
    EndStruct,
    Boundary,
    Path,
    StructRef,
    ArrayRef,
    Text,
    Layer,
    DataType,
    Width,
    Xy,
    EndElement,
    StructRefName, // SNAME
    ColRow,
    TextNode, // "Not currently used"
    Node,
    TextType,
    Presentation,
    Spacing, // "Discontinued"
    String,
    Strans,
    Mag,
    Angle,
    Uinteger, // "No longer used"
    Ustring,  // "No longer used"
    RefLibs,
    Fonts,
    PathType,
    Generations,
    AttrTable,
    StypTable, // "Unreleased Feature"
    StrType,   // "Unreleased Feature"
    ElemFlags,
    ElemKey,  // "Unreleased Feature"
    LinkType, // "Unreleased Feature"
    LinkKeys, // "Unreleased Feature"
    Nodetype,
    PropAttr,
    PropValue,
    Box,
    BoxType,
    Plex,
    BeginExtn,
    EndExtn,
    TapeNum,
    TapeCode,
    StrClass,
    Reserved, // "Reserved for future use"
    Format,
    Mask,
    EndMasks,
    LibDirSize,
    SrfName,
    LibSecur,
}
impl GdsRecordType {
    /// Boolean indication of valid record types
    /// Many are either deprecated or provisioned without ever being implemented;
    /// all from this list are deemed invalid.
    pub fn valid(&self) -> bool {
        match self {
            Self::TextNode | // "Not currently used"
            Self::Spacing | // "Discontinued"
            Self::Uinteger | // "No longer used"
            Self::Ustring |  // "No longer used"
            Self::StypTable | // "Unreleased Feature"
            Self::StrType |   // "Unreleased Feature"
            Self::ElemKey |   // "Unreleased Feature"
            Self::LinkType |  // "Unreleased Feature"
            Self::LinkKeys |  // "Unreleased Feature"
            Self::Reserved   // "Reserved for future use"
              => false,
            _ => true,
        }
    }
    /// Get the [GdsDataType] which GDSII fixes for records of this type
    pub fn dtype(&self) -> GdsDataType {
        use GdsDataType::*;
        match self {
            Self::EndLib
            | Self::EndStruct
            | Self::Boundary
            | Self::Path
            | Self::StructRef
            | Self::ArrayRef
            | Self::Text
            | Self::EndElement
            | Self::TextNode
            | Self::Node
            | Self::Box
            | Self::EndMasks => NoData,

            Self::Presentation | Self::Strans | Self::ElemFlags | Self::StrClass => BitArray,

            Self::Header
            | Self::BgnLib
            | Self::BgnStruct
            | Self::Layer
            | Self::DataType
            | Self::ColRow
            | Self::TextType
            | Self::Spacing
            | Self::PathType
            | Self::Generations
            | Self::StrType
            | Self::LinkType
            | Self::Nodetype
            | Self::PropAttr
            | Self::BoxType
            | Self::TapeNum
            | Self::TapeCode
            | Self::Format
            | Self::LibDirSize
            | Self::LibSecur => I16,

            Self::Width
            | Self::Xy
            | Self::Uinteger
            | Self::ElemKey
            | Self::LinkKeys
            | Self::Plex
            | Self::BeginExtn
            | Self::EndExtn
            | Self::Reserved => I32,

            Self::Units | Self::Mag | Self::Angle => F64,

            Self::LibName
            | Self::StructName
            | Self::StructRefName
            | Self::String
            | Self::Ustring
            | Self::RefLibs
            | Self::Fonts
            | Self::AttrTable
            | Self::StypTable
            | Self::PropValue
            | Self::Mask
            | Self::SrfName => Str,
        }
    }
}

/// # Gds DataType Enumeration
/// In order as decoded from 16-bit integers in binary data
#[derive(FromPrimitive, Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum GdsDataType {
    NoData = 0,
    BitArray = 1,
    I16 = 2,
    I32 = 3,
    F32 = 4,
    F64 = 5,
    Str = 6,
}

/// # Gds Record Header
/// Decoded contents of a record's four header bytes,
/// including its record-type, data-type, and payload length in bytes.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct GdsRecordHeader {
    pub rtype: GdsRecordType,
    pub dtype: GdsDataType,
    /// Payload length, *excluding* the four header bytes
    pub len: u16,
}
impl GdsRecordHeader {
    /// Decode from four header bytes.
    /// Checks the length is even and covers the header,
    /// and that the record-type is known, valid, and paired with its fixed data-type.
    pub fn decode(bytes: [u8; 4]) -> GdsResult<Self> {
        let len = BigEndian::read_u16(&bytes[0..2]);
        if len < 4 || len % 2 != 0 {
            return Err(GdsError::format(format!("invalid record length {}", len)));
        }
        let rtype: GdsRecordType = FromPrimitive::from_u8(bytes[2])
            .ok_or_else(|| GdsError::format(format!("unknown record type 0x{:02x}", bytes[2])))?;
        if !rtype.valid() {
            return Err(GdsError::format(format!("invalid record type {:?}", rtype)));
        }
        let dtype: GdsDataType = FromPrimitive::from_u8(bytes[3])
            .ok_or_else(|| GdsError::format(format!("unknown data type 0x{:02x}", bytes[3])))?;
        if dtype != rtype.dtype() {
            return Err(GdsError::format(format!(
                "{:?} record with data type {:?}, expected {:?}",
                rtype,
                dtype,
                rtype.dtype()
            )));
        }
        Ok(Self {
            rtype,
            dtype,
            len: len - 4,
        })
    }
}

///
/// # Gds Record Data
///
/// Typed record payload, one variant per [GdsDataType].
/// Numeric payloads are always vectors, as decoded; scalar access is via the `into_*` methods.
/// Strings are kept as raw bytes, absent their single padding null.
///
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub enum GdsRecordData {
    #[default]
    NoData,
    BitArray(u16),
    I16(Vec<i16>),
    I32(Vec<i32>),
    /// Four-byte reals. No record-type carries them, so they arise only from
    /// [GdsRecordData::decode]; [GdsRecord::check] rejects them for every record-type.
    F32(Vec<f64>),
    F64(Vec<f64>),
    Str(Vec<u8>),
}
impl GdsRecordData {
    /// Create a string payload
    pub fn str(s: impl AsRef<[u8]>) -> Self {
        Self::Str(s.as_ref().to_vec())
    }
    /// Get our [GdsDataType]
    pub fn dtype(&self) -> GdsDataType {
        match self {
            Self::NoData => GdsDataType::NoData,
            Self::BitArray(_) => GdsDataType::BitArray,
            Self::I16(_) => GdsDataType::I16,
            Self::I32(_) => GdsDataType::I32,
            Self::F32(_) => GdsDataType::F32,
            Self::F64(_) => GdsDataType::F64,
            Self::Str(_) => GdsDataType::Str,
        }
    }
    /// Encoded payload length in bytes, including string padding
    pub fn len(&self) -> usize {
        match self {
            Self::NoData => 0,
            Self::BitArray(_) => 2,
            Self::I16(v) => 2 * v.len(),
            Self::I32(v) => 4 * v.len(),
            Self::F32(v) => 4 * v.len(),
            Self::F64(v) => 8 * v.len(),
            Self::Str(s) => s.len() + s.len() % 2,
        }
    }
    /// Boolean indication of an empty payload
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Encode the payload onto `dest`
    pub fn encode(&self, dest: &mut impl Write) -> GdsResult<()> {
        match self {
            Self::NoData => (),
            Self::BitArray(bits) => dest.write_u16::<BigEndian>(*bits)?,
            Self::I16(v) => {
                for val in v {
                    dest.write_i16::<BigEndian>(*val)?;
                }
            }
            Self::I32(v) => {
                for val in v {
                    dest.write_i32::<BigEndian>(*val)?;
                }
            }
            Self::F32(v) => {
                for val in v {
                    dest.write_u32::<BigEndian>(GdsFloat32::encode(*val)?)?;
                }
            }
            Self::F64(v) => {
                for val in v {
                    dest.write_u64::<BigEndian>(GdsFloat64::encode(*val)?)?;
                }
            }
            Self::Str(s) => {
                dest.write_all(s)?;
                if s.len() % 2 != 0 {
                    dest.write_u8(0x00)?;
                }
            }
        }
        Ok(())
    }
    /// Decode a payload of [GdsDataType] `dtype` from `bytes`
    pub fn decode(dtype: GdsDataType, bytes: &[u8]) -> GdsResult<Self> {
        let size = match dtype {
            GdsDataType::NoData => 0,
            GdsDataType::BitArray => 2,
            GdsDataType::I16 => 2,
            GdsDataType::I32 | GdsDataType::F32 => 4,
            GdsDataType::F64 => 8,
            GdsDataType::Str => 1,
        };
        let len_ok = match dtype {
            GdsDataType::NoData | GdsDataType::BitArray => bytes.len() == size,
            _ => bytes.len() % size == 0,
        };
        if !len_ok {
            return Err(GdsError::format(format!(
                "invalid {:?} payload length {}",
                dtype,
                bytes.len()
            )));
        }
        let data = match dtype {
            GdsDataType::NoData => Self::NoData,
            GdsDataType::BitArray => Self::BitArray(BigEndian::read_u16(bytes)),
            GdsDataType::I16 => {
                let mut v = vec![0; bytes.len() / 2];
                BigEndian::read_i16_into(bytes, &mut v);
                Self::I16(v)
            }
            GdsDataType::I32 => {
                let mut v = vec![0; bytes.len() / 4];
                BigEndian::read_i32_into(bytes, &mut v);
                Self::I32(v)
            }
            GdsDataType::F32 => Self::F32(
                bytes
                    .chunks_exact(4)
                    .map(|c| GdsFloat32::decode(BigEndian::read_u32(c)))
                    .collect(),
            ),
            GdsDataType::F64 => Self::F64(
                bytes
                    .chunks_exact(8)
                    .map(|c| GdsFloat64::decode(BigEndian::read_u64(c)))
                    .collect(),
            ),
            GdsDataType::Str => {
                // Strip the optional end-of-string null
                let s = match bytes.last() {
                    Some(0x00) => &bytes[..bytes.len() - 1],
                    _ => bytes,
                };
                Self::Str(s.to_vec())
            }
        };
        Ok(data)
    }
    /// Error-generation helper for mismatched payload types
    fn mismatch<T>(&self, expected: &str) -> GdsResult<T> {
        Err(GdsError::format(format!(
            "expected {} payload, found {:?}",
            expected,
            self.dtype()
        )))
    }
    /// Convert into a vector of `i16`
    pub fn into_i16s(self) -> GdsResult<Vec<i16>> {
        match self {
            Self::I16(v) => Ok(v),
            _ => self.mismatch("I16"),
        }
    }
    /// Convert into a single `i16`. Fails for payloads of any other count.
    pub fn into_i16(self) -> GdsResult<i16> {
        match self.into_i16s()?.as_slice() {
            [v] => Ok(*v),
            v => Err(GdsError::format(format!("expected one I16, found {}", v.len()))),
        }
    }
    /// Convert into a vector of `i32`
    pub fn into_i32s(self) -> GdsResult<Vec<i32>> {
        match self {
            Self::I32(v) => Ok(v),
            _ => self.mismatch("I32"),
        }
    }
    /// Convert into a single `i32`. Fails for payloads of any other count.
    pub fn into_i32(self) -> GdsResult<i32> {
        match self.into_i32s()?.as_slice() {
            [v] => Ok(*v),
            v => Err(GdsError::format(format!("expected one I32, found {}", v.len()))),
        }
    }
    /// Convert into a vector of `f64`. Accepts either real format.
    pub fn into_f64s(self) -> GdsResult<Vec<f64>> {
        match self {
            Self::F64(v) | Self::F32(v) => Ok(v),
            _ => self.mismatch("F64"),
        }
    }
    /// Convert into a single `f64`. Fails for payloads of any other count.
    pub fn into_f64(self) -> GdsResult<f64> {
        match self.into_f64s()?.as_slice() {
            [v] => Ok(*v),
            v => Err(GdsError::format(format!("expected one F64, found {}", v.len()))),
        }
    }
    /// Convert into the 16 bits of a bit-array
    pub fn into_bits(self) -> GdsResult<u16> {
        match self {
            Self::BitArray(b) => Ok(b),
            _ => self.mismatch("BitArray"),
        }
    }
    /// Convert into raw string bytes
    pub fn into_bytes(self) -> GdsResult<Vec<u8>> {
        match self {
            Self::Str(s) => Ok(s),
            _ => self.mismatch("Str"),
        }
    }
    /// Convert into a [String]. Fails for non-UTF-8 content.
    pub fn into_string(self) -> GdsResult<String> {
        let bytes = self.into_bytes()?;
        String::from_utf8(bytes).map_err(|e| GdsError::from(e.utf8_error()))
    }
    /// Check for an empty payload
    pub fn into_none(self) -> GdsResult<()> {
        match self {
            Self::NoData => Ok(()),
            _ => self.mismatch("NoData"),
        }
    }
}

///
/// # Gds Record
///
/// A record-type and its typed payload.
/// Records are kept in "raw" form here; their interpretation is left to the schema tables.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GdsRecord {
    pub rtype: GdsRecordType,
    pub data: GdsRecordData,
}
impl GdsRecord {
    /// Create a new [GdsRecord]
    pub fn new(rtype: GdsRecordType, data: GdsRecordData) -> Self {
        Self { rtype, data }
    }
    /// Create a new payload-free [GdsRecord], e.g. for terminators
    pub fn empty(rtype: GdsRecordType) -> Self {
        Self::new(rtype, GdsRecordData::NoData)
    }
    /// Encoded length in bytes, including the header
    pub fn len(&self) -> usize {
        self.data.len() + 4
    }
    /// Check the record is encodable: its data-type matches its record-type,
    /// and it fits in a single record.
    pub fn check(&self) -> GdsResult<()> {
        if self.data.dtype() != self.rtype.dtype() {
            return Err(GdsError::Value(format!(
                "{:?} record requires {:?} data, found {:?}",
                self.rtype,
                self.rtype.dtype(),
                self.data.dtype()
            )));
        }
        if self.len() > MAX_RECORD_LEN {
            return Err(GdsError::Value(format!(
                "{:?} record too long: {} bytes",
                self.rtype,
                self.len()
            )));
        }
        Ok(())
    }
    /// Encode to bytes and write onto `dest`.
    /// Returns the number of bytes written.
    pub fn encode(&self, dest: &mut impl Write) -> GdsResult<usize> {
        self.check()?;
        // Encode the payload first, so that range errors leave `dest` untouched
        let mut payload = Vec::with_capacity(self.data.len());
        self.data.encode(&mut payload)?;
        dest.write_u16::<BigEndian>(self.len() as u16)?;
        dest.write_u8(self.rtype as u8)?;
        dest.write_u8(self.rtype.dtype() as u8)?;
        dest.write_all(&payload)?;
        Ok(self.len())
    }
    /// Encode to a new byte-vector
    pub fn to_bytes(&self) -> GdsResult<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.len());
        self.encode(&mut bytes)?;
        Ok(bytes)
    }
    /// Decode from a complete record's `bytes`, header included
    pub fn from_bytes(bytes: &[u8]) -> GdsResult<Self> {
        if bytes.len() < 4 {
            return Err(GdsError::format("truncated record header"));
        }
        let header = GdsRecordHeader::decode([bytes[0], bytes[1], bytes[2], bytes[3]])?;
        let payload = &bytes[4..];
        if payload.len() != usize::from(header.len) {
            return Err(GdsError::format(format!(
                "{:?} record declares {} payload bytes, found {}",
                header.rtype,
                header.len,
                payload.len()
            )));
        }
        let data = GdsRecordData::decode(header.dtype, payload)?;
        Ok(Self::new(header.rtype, data))
    }
}

/// Exact power of two, for exponents within the normal `f64` range
fn pow2(exp: i32) -> f64 {
    f64::from_bits(((exp + 1023) as u64) << 52)
}

/// Split a finite, nonzero `val` into its sign bit, excess-64 base-16 exponent,
/// and a 56-bit mantissa whose leading nibble is nonzero.
/// The exponent is *not* range-checked.
fn split_real(val: f64) -> (u64, i32, u64) {
    let bits = val.to_bits();
    let sign = bits >> 63;
    let biased = ((bits >> 52) & 0x7FF) as i32;
    let frac = bits & 0x000F_FFFF_FFFF_FFFF;
    // Integer significand and binary exponent, such that |val| = sig * 2^exp
    let (mut sig, mut exp) = match biased {
        0 => (frac, -1074), // Subnormal
        _ => (frac | (1 << 52), biased - 1075),
    };
    while sig & (1 << 52) == 0 {
        sig <<= 1;
        exp -= 1;
    }
    // Now |val| = (sig / 2^53) * 2^p, with (sig / 2^53) in [1/2, 1)
    let p = exp + 53;
    // Base-16 exponent k = ceil(p / 4), leaving a shift of 0-3 bits into the leading nibble
    let k = (p + 3).div_euclid(4);
    let shift = 3 + p - 4 * k;
    (sign, k + 64, sig << shift)
}

/// # Gds Floating Point
/// ## GDSII's Home-Grown Floating-Point Format
///
/// Incredibly, GDSII is old enough to have its own float-format,
/// like most computers did before IEEE754.
///
/// The [GdsFloat64] struct is not used as a data-store, but largely a namespace
/// for the `encode` and `decode` operations to and from IEEE754 double-precision format.
/// Both are exact bit-manipulations: every `f64` in the representable range `[16^-65, 16^63)`
/// survives an encode-decode cycle unchanged.
///
pub struct GdsFloat64;
impl GdsFloat64 {
    /// Decode GDSII's eight-byte representation, stored as a `u64`, to IEEE (and Rust)-compatible `f64`
    pub fn decode(val: u64) -> f64 {
        let neg = (val & 0x8000_0000_0000_0000) != 0;
        let exp = ((val >> 56) & 0x7F) as i32 - 64;
        // Integer-valued mantissa from the 7 least-significant bytes.
        // The `as` conversion rounds to the nearest double; the scaling is exact.
        let mantissa = (val & 0x00FF_FFFF_FFFF_FFFF) as f64;
        let mag = mantissa * pow2(4 * exp - 56);
        if neg {
            -mag
        } else {
            mag
        }
    }
    /// Encode `f64` to GDSII's eight bytes, stored as `u64`.
    /// Fails for NaN, infinities, and magnitudes outside `[16^-65, 16^63)`.
    pub fn encode(val: f64) -> GdsResult<u64> {
        if val == 0.0 {
            return Ok(0);
        }
        if !val.is_finite() {
            return Err(GdsError::Range(format!("{} has no GDSII real encoding", val)));
        }
        let (sign, exponent, mantissa) = split_real(val);
        if !(0..=127).contains(&exponent) {
            return Err(GdsError::Range(format!(
                "{} outside the GDSII real range",
                val
            )));
        }
        Ok((sign << 63) | ((exponent as u64) << 56) | mantissa)
    }
}

/// # Gds Four-Byte Floating Point
///
/// GDSII's legacy single-precision real: the same layout as [GdsFloat64], with a three-byte mantissa.
/// No standard record uses it, but it remains decodable.
pub struct GdsFloat32;
impl GdsFloat32 {
    /// Decode four bytes, stored as `u32`, to `f64`
    pub fn decode(val: u32) -> f64 {
        let neg = (val & 0x8000_0000) != 0;
        let exp = ((val >> 24) & 0x7F) as i32 - 64;
        let mag = (val & 0x00FF_FFFF) as f64 * pow2(4 * exp - 24);
        if neg {
            -mag
        } else {
            mag
        }
    }
    /// Encode `f64` to four bytes, rounding the mantissa to 24 bits
    pub fn encode(val: f64) -> GdsResult<u32> {
        if val == 0.0 {
            return Ok(0);
        }
        if !val.is_finite() {
            return Err(GdsError::Range(format!("{} has no GDSII real encoding", val)));
        }
        let (sign, mut exponent, mantissa) = split_real(val);
        let mut mantissa = (mantissa + (1 << 31)) >> 32;
        if mantissa >> 24 != 0 {
            // Rounding carried into a new leading nibble
            mantissa >>= 4;
            exponent += 1;
        }
        if !(0..=127).contains(&exponent) {
            return Err(GdsError::Range(format!(
                "{} outside the GDSII real range",
                val
            )));
        }
        Ok(((sign as u32) << 31) | ((exponent as u32) << 24) | mantissa as u32)
    }
}
