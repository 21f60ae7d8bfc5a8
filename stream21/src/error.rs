//!
//! # Stream21 Errors
//!

// Crates.io
use thiserror::Error;

// Local Imports
use crate::record::GdsRecordType;

/// # Gds Context
/// Enumeration of each context in which a record can be parsed, primarily for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GdsContext {
    Library,
    Struct,
    StructRef,
    ArrayRef,
    Boundary,
    Box,
    Path,
    Text,
    Node,
    Property,
}

/// # Gds Stream Position
/// Location of a parsing failure: record index, byte offset, offending record-type,
/// and the stack of [GdsContext]s being parsed at the time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdsPosition {
    /// Number of records read, including the offending one
    pub recordnum: usize,
    /// Byte offset just past the offending record
    pub bytepos: u64,
    /// Record-type of the offending record, if one was decoded
    pub rtype: Option<GdsRecordType>,
    /// Context stack, outermost first
    pub ctx: Vec<GdsContext>,
}
impl std::fmt::Display for GdsPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "record #{} ", self.recordnum)?;
        if let Some(rtype) = self.rtype {
            write!(f, "({:?}) ", rtype)?;
        }
        write!(f, "ending at byte {}, in {:?}", self.bytepos, self.ctx)
    }
}

/// # GdsResult Type-Alias
pub type GdsResult<T> = Result<T, GdsError>;

/// # Gds Error Enumeration
///
/// Parsing failures are [GdsError::Format], and are fatal to the read in progress.
/// Once a valid [crate::GdsLibrary] is created in memory, it can generally be streamed to bytes;
/// the remaining cases cover in-memory content which GDSII cannot represent.
#[derive(Debug, Error)]
pub enum GdsError {
    /// Malformed, truncated, unexpected or unterminated records
    #[error("Invalid GDSII: {msg}{}", fmt_pos(.pos))]
    Format {
        msg: String,
        pos: Option<GdsPosition>,
    },
    /// Numeric value not representable in its GDSII encoding
    #[error("Value out of GDSII range: {0}")]
    Range(String),
    /// Missing or invalid attribute of an in-memory object
    #[error("Invalid GDSII content: {0}")]
    Value(String),
    /// Errors from the underlying source or destination, passed through unchanged
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Text-format (JSON, YAML, TOML) serialization errors
    #[error(transparent)]
    Serialization(#[from] stream21utils::ser::Error),
}
impl GdsError {
    /// Create a position-less [GdsError::Format]
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format {
            msg: msg.into(),
            pos: None,
        }
    }
    /// Boolean indication of whether this is a [GdsError::Format]
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }
}
fn fmt_pos(pos: &Option<GdsPosition>) -> String {
    match pos {
        Some(p) => format!(", at {}", p),
        None => String::new(),
    }
}
impl From<derive_builder::UninitializedFieldError> for GdsError {
    fn from(e: derive_builder::UninitializedFieldError) -> Self {
        Self::Value(format!("missing required field `{}`", e.field_name()))
    }
}
impl From<std::str::Utf8Error> for GdsError {
    fn from(e: std::str::Utf8Error) -> Self {
        Self::format(format!("non-text string record: {}", e))
    }
}
