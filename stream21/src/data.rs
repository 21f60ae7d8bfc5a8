//!
//! # Stream21 Data Model
//!

// Std-Lib Imports
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

// Crates.io
use chrono::{Datelike, NaiveDate, NaiveDateTime, SubsecRound, Timelike, Utc};
use derive_builder::Builder;
use derive_more::{Add, AddAssign, Sub, SubAssign};
use memmap2::Mmap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

// Workspace Imports
use stream21utils::SerdeFile;

// Local Imports
use crate::error::{GdsError, GdsResult};
use crate::read::{GdsRecordStream, GdsScanner, GdsStructIter, GdsStructScan};
use crate::schema::GdsSchema;
use crate::write::GdsWriter;

/// # Gds Translation Settings
/// Reflection, rotation, and magnification for text-elements and references.
/// As configured by `STRANS` records, and their optional `MAG` and `ANGLE` followers.
#[derive(Default, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct GdsStrans {
    /// Reflection, about the x-axis.
    /// Applied before rotation.
    #[serde(default, skip_serializing_if = "is_false")]
    pub reflected: bool,
    /// Absolute Magnification Setting
    #[serde(default, skip_serializing_if = "is_false")]
    pub abs_mag: bool,
    /// Absolute Angle Setting
    #[serde(default, skip_serializing_if = "is_false")]
    pub abs_angle: bool,
    /// Magnification Factor. Interpreted as unit-scaling (mag==1.0) if not specified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mag: Option<f64>,
    /// Angle, in degrees counter-clockwise. Defaults to zero if not specified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f64>,
    /// Remaining `STRANS` bits, reserved by the format, kept as read
    #[serde(default, skip_serializing_if = "is_zero")]
    pub other_bits: u16,
}
impl GdsStrans {
    const FLAG_BITS: u16 = 0x8006;

    /// Encode the three flags, plus any reserved bits, into `STRANS` bits
    pub fn bits(&self) -> u16 {
        let mut bits = self.other_bits & !Self::FLAG_BITS;
        if self.reflected {
            bits |= 0x8000;
        }
        if self.abs_mag {
            bits |= 0x0004;
        }
        if self.abs_angle {
            bits |= 0x0002;
        }
        bits
    }
    /// Decode the three flags from `STRANS` bits. `mag` and `angle` are left unset.
    pub fn from_bits(bits: u16) -> Self {
        Self {
            reflected: bits & 0x8000 != 0,
            abs_mag: bits & 0x0004 != 0,
            abs_angle: bits & 0x0002 != 0,
            other_bits: bits & !Self::FLAG_BITS,
            ..Default::default()
        }
    }
}

/// # Gds Text-Presentation Flags
/// Sets fonts and text justification. Stored in raw `u16` form.
#[derive(Default, Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct GdsPresentation(pub u16);
impl GdsPresentation {
    /// Create from font number (0-3), and vertical and horizontal justifications (0-2 each)
    pub fn new(font: u8, vjust: u8, hjust: u8) -> Self {
        let bits = (u16::from(font & 3) << 4) | (u16::from(vjust & 3) << 2) | u16::from(hjust & 3);
        Self(bits)
    }
    /// Font number
    pub fn font(&self) -> u8 {
        ((self.0 >> 4) & 3) as u8
    }
    /// Vertical justification. 0: top, 1: middle, 2: bottom.
    pub fn vjust(&self) -> u8 {
        ((self.0 >> 2) & 3) as u8
    }
    /// Horizontal justification. 0: left, 1: center, 2: right.
    pub fn hjust(&self) -> u8 {
        (self.0 & 3) as u8
    }
}

/// # Gds Element Flags
/// As configured by `ELFLAGS` records. Stored in raw `u16` form.
#[derive(Default, Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct GdsElemFlags(pub u16);
impl GdsElemFlags {
    /// Template-data flag
    pub fn template(&self) -> bool {
        self.0 & 0x0001 != 0
    }
    /// External-data flag
    pub fn external(&self) -> bool {
        self.0 & 0x0002 != 0
    }
}

/// # Gds Plex
/// "A unique positive number which is common to all elements of the Plex to which this element belongs."
/// In practice, `PLEX` records are highly uncommon.
#[derive(Default, Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct GdsPlex(pub i32);

/// # Gds Library Units
///
/// Each GDSII Library has two length-units, referred to as "DB Units" and "User Units" respectively.
/// Essentially all spatial data throughout the Library is denoted in "DB Units".
/// "User units" are a sort of recommendation for GUI programs to use when displaying the Library.
///
/// From the `UNITS` record-description:
/// ```text
/// Contains two eight-byte real numbers.
/// The first number is the size of a database-unit, in user-units.
/// The second is the size of a database-unit in meters.
/// To calculate the size of a user-unit in meters, divide the second number by the first.
/// ```
///
/// These two numbers are stored as-is in the [GdsUnits] tuple-struct.
/// Nothing else in the library holds unit state; conversions go through these methods.
///
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct GdsUnits(pub f64, pub f64);
impl GdsUnits {
    /// Create a new [GdsUnits]
    pub fn new(db_in_user: f64, db_in_meters: f64) -> Self {
        Self(db_in_user, db_in_meters)
    }
    /// Get the database-unit size, in meters. Used for all spatial data.
    pub fn db_unit(&self) -> f64 {
        self.1
    }
    /// Get the user-unit size, in meters. Largely for display/ debug.
    pub fn user_unit(&self) -> f64 {
        self.1 / self.0
    }
    /// Convert `val`, in user units, to the nearest database unit
    pub fn to_db(&self, val: f64) -> GdsResult<i32> {
        let db = (val / self.0).round();
        if !(f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&db) {
            return Err(GdsError::Range(format!(
                "{} user units is outside the database-unit range",
                val
            )));
        }
        Ok(db as i32)
    }
    /// Convert `val`, in database units, to user units
    pub fn to_user(&self, val: i32) -> f64 {
        f64::from(val) * self.0
    }
}
impl Default for GdsUnits {
    /// Default values for GDS Units:
    /// * DB-Unit = 1nm
    /// * User-Unit = 1µm (1000x the DB-Unit)
    fn default() -> Self {
        Self(1e-3, 1e-9)
    }
}

/// # Gds Spatial Point
/// Coordinate in (x,y) layout-space.
/// Denoted in each [GdsLibrary]'s [GdsUnits].
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct GdsPoint {
    pub x: i32,
    pub y: i32,
}
impl GdsPoint {
    /// Create a new [GdsPoint]
    pub fn new(x: i32, y: i32) -> Self {
        GdsPoint { x, y }
    }
    /// Create a vector of [GdsPoint] from an array of tuples
    pub fn vec(pts: &[(i32, i32)]) -> Vec<Self> {
        pts.iter().map(|pt| Self::new(pt.0, pt.1)).collect()
    }
    /// Convert an n-element slice of `i32` into an n/2-element vector of [GdsPoint]s.
    pub(crate) fn parse_vec(from: &[i32]) -> GdsResult<Vec<GdsPoint>> {
        if from.len() % 2 != 0 {
            return Err(GdsError::format(format!(
                "odd number of XY coordinates: {}",
                from.len()
            )));
        }
        Ok(from
            .chunks_exact(2)
            .map(|c| GdsPoint::new(c[0], c[1]))
            .collect())
    }
    /// Convert into a fixed-size array of exactly `N` [GdsPoint]s
    pub(crate) fn parse_array<const N: usize>(from: &[i32]) -> GdsResult<[GdsPoint; N]> {
        let pts = Self::parse_vec(from)?;
        let len = pts.len();
        pts.try_into()
            .map_err(|_| GdsError::format(format!("expected {} XY points, found {}", N, len)))
    }
    /// Convert a slice of [GdsPoint]s to a flat `i32` vector
    pub(crate) fn flatten_vec(src: &[GdsPoint]) -> Vec<i32> {
        src.iter().flat_map(|pt| [pt.x, pt.y]).collect()
    }
}

/// # Gds Property
/// An `(attribute, value)` pair attached to an element.
/// Values are raw bytes, no more than 126 of them in valid GDSII.
#[derive(Default, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct GdsProperty {
    /// Attribute Number
    pub attr: i16,
    /// Attribute Value
    pub value: Vec<u8>,
}
impl GdsProperty {
    /// Maximum value length, in bytes
    pub const MAX_LEN: usize = 126;
    /// Create a new [GdsProperty]
    pub fn new(attr: i16, value: impl Into<Vec<u8>>) -> Self {
        Self {
            attr,
            value: value.into(),
        }
    }
}

/// # Gds Access-Control Entry
/// One `(group, user, rights)` triple of a `LIBSECUR` record.
#[derive(Default, Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct GdsAccessControl {
    pub group: i16,
    pub user: i16,
    pub rights: i16,
}

///
/// # Gds Path Element
///
/// Record order:
/// ```text
/// PATH [ELFLAGS] [PLEX] LAYER DATATYPE [PATHTYPE] [WIDTH] [BGNEXTN] [ENDEXTN] XY
/// ```
///
#[derive(Default, Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", build_fn(error = "GdsError"))]
pub struct GdsPath {
    // Required Fields
    /// Layer Number
    pub layer: i16,
    /// DataType ID
    pub datatype: i16,
    /// Vector of x,y coordinates
    pub xy: Vec<GdsPoint>,

    // Optional Fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub width: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub path_type: Option<i16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub begin_extn: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub end_extn: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub elflags: Option<GdsElemFlags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub plex: Option<GdsPlex>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub properties: Vec<GdsProperty>,
}

///
/// # Gds Boundary Element
///
/// The most common type for closed-form shapes in GDSII.
/// Most IC layout is comprised of [GdsBoundary] elements, which represent individual polygons.
/// GDSII dictates that the first and final coordinates in each [GdsBoundary]
/// shall be identical, "closing" the polygon.
/// Hence an N-sided polygon is represented by an (N+1)-point `xy` vector.
///
/// Record order:
/// ```text
/// BOUNDARY [ELFLAGS] [PLEX] LAYER DATATYPE XY
/// ```
///
#[derive(Default, Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", build_fn(error = "GdsError"))]
pub struct GdsBoundary {
    // Required Fields
    /// Layer Number
    pub layer: i16,
    /// DataType ID
    pub datatype: i16,
    /// Vector of x,y coordinates
    pub xy: Vec<GdsPoint>,

    // Optional Fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub elflags: Option<GdsElemFlags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub plex: Option<GdsPlex>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub properties: Vec<GdsProperty>,
}
///
/// # Gds Struct Reference (Cell Instance)
///
/// Represents an instance of a layout-cell.
/// Coordinate `xy` is the instance's origin.
/// Options for rotation and reflection are configured in the [GdsStrans] attribute `strans`.
///
/// Record order:
/// ```text
/// SREF [ELFLAGS] [PLEX] SNAME [STRANS [MAG] [ANGLE]] XY
/// ```
///
#[derive(Default, Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", build_fn(error = "GdsError"))]
pub struct GdsStructRef {
    // Required Fields
    /// Struct (Cell) Name
    #[builder(setter(into))]
    pub name: String,
    /// Location x,y coordinates
    pub xy: GdsPoint,

    // Optional Fields
    /// Translation & Reflection Options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub strans: Option<GdsStrans>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub elflags: Option<GdsElemFlags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub plex: Option<GdsPlex>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub properties: Vec<GdsProperty>,
}
///
/// # Gds Array Reference
///
/// A two-dimensional array of struct (cell) instances.
/// The three `xy` points are the array origin, the displacement past its last column,
/// and the displacement past its last row.
///
/// Record order:
/// ```text
/// AREF [ELFLAGS] [PLEX] SNAME [STRANS [MAG] [ANGLE]] COLROW XY
/// ```
///
#[derive(Default, Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", build_fn(error = "GdsError"))]
pub struct GdsArrayRef {
    // Required Fields
    /// Struct (Cell) Name
    #[builder(setter(into))]
    pub name: String,
    /// Vector of x,y coordinates
    pub xy: [GdsPoint; 3],
    /// Number of columns
    pub cols: i16,
    /// Number of rows
    pub rows: i16,

    // Optional Fields
    /// Translation & Reflection Options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub strans: Option<GdsStrans>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub elflags: Option<GdsElemFlags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub plex: Option<GdsPlex>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub properties: Vec<GdsProperty>,
}
///
/// # Gds Text Element
///
/// Record order:
/// ```text
/// TEXT [ELFLAGS] [PLEX] LAYER
/// TEXTTYPE [PRESENTATION] [PATHTYPE] [WIDTH] [STRANS [MAG] [ANGLE]] XY STRING
/// ```
#[derive(Default, Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", build_fn(error = "GdsError"))]
pub struct GdsTextElem {
    // Required Fields
    /// Text Value
    #[builder(setter(into))]
    pub string: String,
    /// Layer Number
    pub layer: i16,
    /// Text-Type ID
    pub texttype: i16,
    /// Vector of x,y coordinates
    pub xy: GdsPoint,

    // Optional Fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub presentation: Option<GdsPresentation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub path_type: Option<i16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub width: Option<i32>,
    /// Translation & Reflection Options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub strans: Option<GdsStrans>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub elflags: Option<GdsElemFlags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub plex: Option<GdsPlex>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub properties: Vec<GdsProperty>,
}
///
/// # Gds Node Element
///
/// Record order:
/// ```text
/// NODE [ELFLAGS] [PLEX] LAYER NODETYPE XY
/// ```
///
#[derive(Default, Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", build_fn(error = "GdsError"))]
pub struct GdsNode {
    // Required Fields
    /// Layer Number
    pub layer: i16,
    /// Node-Type ID
    pub nodetype: i16,
    /// Vector of x,y coordinates
    pub xy: Vec<GdsPoint>,

    // Optional Fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub elflags: Option<GdsElemFlags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub plex: Option<GdsPlex>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub properties: Vec<GdsProperty>,
}
///
/// # Gds Box Element
///
/// Record order:
/// ```text
/// BOX [ELFLAGS] [PLEX] LAYER BOXTYPE XY
/// ```
///
#[derive(Default, Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", build_fn(error = "GdsError"))]
pub struct GdsBox {
    // Required Fields
    /// Layer Number
    pub layer: i16,
    /// Box-Type ID
    pub boxtype: i16,
    /// Vector of x,y coordinates
    pub xy: [GdsPoint; 5],

    // Optional Fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub elflags: Option<GdsElemFlags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub plex: Option<GdsPlex>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub properties: Vec<GdsProperty>,
}
///
/// # Gds Element Enumeration
///
/// Primary union of geometric elements, instances, and arrays which comprise a GDSII struct (cell).
///
/// ```text
/// {<boundary> | <path> | <SREF> | <AREF> | <text> | <node> | <box>} {<property>}* ENDEL
/// ```
///
/// Note the `properties` vectors are pushed down to each enum variant.
///
#[derive(derive_more::From, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub enum GdsElement {
    GdsBoundary(GdsBoundary),
    GdsPath(GdsPath),
    GdsStructRef(GdsStructRef),
    GdsArrayRef(GdsArrayRef),
    GdsTextElem(GdsTextElem),
    GdsNode(GdsNode),
    GdsBox(GdsBox),
}
impl GdsElement {
    /// Get the element's properties
    pub fn properties(&self) -> &[GdsProperty] {
        use GdsElement::*;
        match self {
            GdsBoundary(e) => &e.properties,
            GdsPath(e) => &e.properties,
            GdsStructRef(e) => &e.properties,
            GdsArrayRef(e) => &e.properties,
            GdsTextElem(e) => &e.properties,
            GdsNode(e) => &e.properties,
            GdsBox(e) => &e.properties,
        }
    }
}

/// # Gds Summary Stats
///
/// Summary statistics for a [GdsLibrary] or [GdsStruct].
/// Total numbers of elements of each type.
#[derive(
    Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Add, AddAssign, Sub, SubAssign,
)]
pub struct GdsStats {
    pub libraries: usize,
    pub structs: usize,
    pub boundaries: usize,
    pub paths: usize,
    pub struct_refs: usize,
    pub array_refs: usize,
    pub text_elems: usize,
    pub nodes: usize,
    pub boxes: usize,
}

/// # Gds Date & Time
///
/// Six two-byte integers: year, month, day, hour, minute, and second.
///
/// When reading from GDSII, [`GdsDateTime`] accepts any twelve bytes and stores them as-is;
/// no validation for real dates & times, e.g. month 30 or hour 99, is performed,
/// so that such values survive a round-trip.
///
/// Writers disagree on the year: most store it in full, some as an offset from 1900.
/// Conversions from [`NaiveDateTime`] store the full year;
/// conversions to it read years below 1900 as offsets from 1900.
/// Years outside the `i16` range saturate to its bounds.
///
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct GdsDateTime {
    pub year: i16,
    pub month: i16,
    pub day: i16,
    pub hour: i16,
    pub minute: i16,
    pub second: i16,
}
impl From<NaiveDateTime> for GdsDateTime {
    fn from(dt: NaiveDateTime) -> Self {
        Self {
            year: dt.year().clamp(i16::MIN.into(), i16::MAX.into()) as i16,
            month: dt.month() as i16,
            day: dt.day() as i16,
            hour: dt.hour() as i16,
            minute: dt.minute() as i16,
            second: dt.second() as i16,
        }
    }
}
impl TryFrom<GdsDateTime> for NaiveDateTime {
    type Error = GdsError;

    /// Try converting a [`GdsDateTime`] to a [`chrono::NaiveDateTime`].
    /// Fails if any of the GDSII values are invalid. e.g. "month 30" or "hour 99".
    fn try_from(dt: GdsDateTime) -> GdsResult<NaiveDateTime> {
        let year = match dt.year {
            y if y < 1900 => i32::from(y) + 1900,
            y => i32::from(y),
        };
        NaiveDate::from_ymd_opt(year, dt.month as u32, dt.day as u32)
            .and_then(|d| d.and_hms_opt(dt.hour as u32, dt.minute as u32, dt.second as u32))
            .ok_or_else(|| GdsError::Value(format!("invalid date & time {:?}", dt)))
    }
}
impl GdsDateTime {
    /// Get the current time
    ///
    /// Note GDSII's time format is specified in seconds, whereas `NaiveDateTime` has nanosecond precision.
    /// Always round to the nearest second to match data coming in from GDSII files.
    ///
    pub fn now() -> Self {
        Utc::now().naive_utc().round_subsecs(0).into()
    }
    /// Flatten to GDSII's six-integer order
    pub fn encode(&self) -> [i16; 6] {
        [
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        ]
    }
}
impl Default for GdsDateTime {
    /// Default dates & times: what better time than now!
    fn default() -> Self {
        Self::now()
    }
}
impl From<&[i16; 6]> for GdsDateTime {
    /// Convert from a 6-element array of i16s to a [`GdsDateTime`],
    /// in the order prescribed by GDSII.
    fn from(vals: &[i16; 6]) -> Self {
        Self {
            year: vals[0],
            month: vals[1],
            day: vals[2],
            hour: vals[3],
            minute: vals[4],
            second: vals[5],
        }
    }
}

/// # Gds Modification & Access Dates & Times
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct GdsDateTimes {
    /// Last Modification Date & Time
    pub modified: GdsDateTime,
    /// Last Access Date & Time
    pub accessed: GdsDateTime,
}
impl GdsDateTimes {
    /// Flatten to the twelve integers of a `BGNLIB` or `BGNSTR` record
    pub fn encode(&self) -> Vec<i16> {
        let mut v = self.modified.encode().to_vec();
        v.extend_from_slice(&self.accessed.encode());
        v
    }
    /// Decode from the twelve integers of a `BGNLIB` or `BGNSTR` record
    pub fn decode(vals: &[i16]) -> GdsResult<Self> {
        if vals.len() != 12 {
            return Err(GdsError::format(format!(
                "expected 12 date & time values, found {}",
                vals.len()
            )));
        }
        let mut modified = [0; 6];
        modified.copy_from_slice(&vals[0..6]);
        let mut accessed = [0; 6];
        accessed.copy_from_slice(&vals[6..12]);
        Ok(Self {
            modified: GdsDateTime::from(&modified),
            accessed: GdsDateTime::from(&accessed),
        })
    }
}
impl Default for GdsDateTimes {
    /// Default dates & times: what better time than now!
    /// Note this makes a *single* call to `Utc::now()`, so the two dates will be the same.
    fn default() -> Self {
        let now = GdsDateTime::now();
        Self {
            modified: now,
            accessed: now,
        }
    }
}

///
/// # Gds Struct (Cell) Definition
///
/// GDSII's primary hierarchical layout-definition object is its "struct",
/// which most other layout systems would call a "cell" or "module".
/// (Most GDSII software calls them one of these as well.)
///
/// [GdsStruct]s are principally composed of an un-ordered, un-indexed vector
/// of [GdsElement]s, which can be polygons ([GdsBoundary]),
/// instances of other layouts ([GdsStructRef]),
/// two-dimensional arrays thereof ([GdsArrayRef]),
/// and a handful of other [GdsElement]s.
///
/// Record order:
/// ```text
/// BGNSTR STRNAME [STRCLASS] {<element>}* ENDSTR
/// ```
///
#[derive(Default, Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", build_fn(error = "GdsError"))]
pub struct GdsStruct {
    /// Struct Name
    #[builder(setter(into))]
    pub name: String,
    /// Modification & Access Dates & Times
    #[builder(default)]
    pub dates: GdsDateTimes,
    /// Structure-Class Bits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub strclass: Option<u16>,
    /// Elements List
    #[builder(default)]
    pub elems: Vec<GdsElement>,
}
impl GdsStruct {
    /// Create a new and empty [GdsStruct]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
    /// Count and return our element statistics
    pub fn stats(&self) -> GdsStats {
        let mut stats = GdsStats::default();
        stats.structs += 1;
        for elem in &self.elems {
            use GdsElement::*;
            match elem {
                GdsBoundary(_) => stats.boundaries += 1,
                GdsPath(_) => stats.paths += 1,
                GdsStructRef(_) => stats.struct_refs += 1,
                GdsArrayRef(_) => stats.array_refs += 1,
                GdsTextElem(_) => stats.text_elems += 1,
                GdsNode(_) => stats.nodes += 1,
                GdsBox(_) => stats.boxes += 1,
            };
        }
        stats
    }
}

///
/// # Gds Library
///
/// The Library is GDSII's primary idiom for a suite of layout-cells.
/// A Library generally corresponds one-to-one with a `.gds` file.
/// Libraries consist primarily of cell-definitions ([GdsStruct]s),
/// and secondarily include library-level meta-data, including the distance units, GDS-spec version, and modification dates.
///
/// The less common library-level attributes are optional fields, written only when set.
///
/// Record order:
/// ```text
/// HEADER BGNLIB [LIBDIRSIZE] [SRFNAME] [LIBSECUR] LIBNAME [REFLIBS] [FONTS] [ATTRTABLE] [GENERATIONS]
/// [FORMAT {MASK}* [ENDMASKS]] UNITS {<structure>}* ENDLIB
/// ```
///
#[derive(Default, Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[builder(pattern = "owned", build_fn(error = "GdsError"))]
pub struct GdsLibrary {
    // Required fields
    /// Library Name
    #[builder(setter(into))]
    pub name: String,
    /// Gds Spec Version
    pub version: i16,
    /// Modification & Access Dates & Times
    #[builder(default)]
    pub dates: GdsDateTimes,
    /// Spatial Units
    #[builder(default)]
    pub units: GdsUnits,
    /// Struct Definitions
    #[builder(default)]
    pub structs: Vec<GdsStruct>,

    // Optional fields
    /// Number of pages in the library directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub libdirsize: Option<i16>,
    /// Sticks-rules file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(into, strip_option))]
    pub srfname: Option<String>,
    /// Access-control list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub libsecur: Option<Vec<GdsAccessControl>>,
    /// Reference-library names, in their raw fixed-width form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub reflibs: Option<Vec<u8>>,
    /// Text-font definition-file names, in their raw fixed-width form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub fonts: Option<Vec<u8>>,
    /// Attribute-definition file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(into, strip_option))]
    pub attrtable: Option<String>,
    /// Number of copies of deleted or backed-up structures to retain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub generations: Option<i16>,
    /// Archive (0) or filtered (1) format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option))]
    pub format: Option<i16>,
    /// Mask-layer list of a filtered-format library
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub masks: Vec<String>,
    /// Whether the mask list is terminated by `ENDMASKS`
    #[serde(default, skip_serializing_if = "is_false")]
    #[builder(default)]
    pub endmasks: bool,
}
impl GdsLibrary {
    /// Create a new and empty [GdsLibrary]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 3,
            ..Default::default()
        }
    }
    /// Read a GDS loaded from file at path `fname`
    pub fn open(fname: impl AsRef<Path>) -> GdsResult<GdsLibrary> {
        debug!("Reading GDSII library from {:?}", fname.as_ref());
        GdsRecordStream::new(open_mmap(&fname)?).parse_lib()
    }
    /// Read a [GdsLibrary] from byte-vector `bytes`
    pub fn from_bytes(bytes: &[u8]) -> GdsResult<GdsLibrary> {
        GdsRecordStream::new(bytes).parse_lib()
    }
    /// Read a [GdsLibrary] from any [Read] source
    pub fn read(src: impl Read) -> GdsResult<GdsLibrary> {
        GdsRecordStream::new(src).parse_lib()
    }
    /// Read the library-level records from `src`, and return an iterator over its [GdsStruct]s.
    /// The returned library-header has an empty `structs` list.
    pub fn structs_iter<R: Read>(src: R) -> GdsResult<GdsStructIter<R>> {
        GdsStructIter::new(src)
    }
    /// Run a first-pass scan of GDSII data in `fname`.
    /// Returns a vector of [GdsStructScan]s including name and byte-offsets per struct.
    pub fn scan(fname: impl AsRef<Path>) -> GdsResult<Vec<GdsStructScan>> {
        GdsScanner::new(open_mmap(&fname)?)?.scan_lib()
    }
    /// Read the single struct at the offsets of `scan`, as produced by [GdsLibrary::scan]
    pub fn read_struct(fname: impl AsRef<Path>, scan: &GdsStructScan) -> GdsResult<GdsStruct> {
        let mut src = open_mmap(&fname)?;
        src.seek(SeekFrom::Start(scan.start))?;
        let mut stream = GdsRecordStream::with_offset(src, scan.start);
        stream.advance()?;
        GdsStruct::load(&mut stream)
    }
    /// Collect and return the library's aggregate statistics
    /// (numbers of structs, elements by type)
    pub fn stats(&self) -> GdsStats {
        let mut stats = GdsStats::default();
        stats.libraries += 1;
        for strukt in self.structs.iter() {
            stats += strukt.stats();
        }
        stats
    }
    /// Check the library is encodable, without writing anything
    pub fn validate(&self) -> GdsResult<()> {
        GdsSchema::validate(self)
    }
    /// Save to file `fname`.
    ///
    /// Content is written to a temporary file in the destination directory,
    /// which replaces `fname` only once complete.
    /// On failure `fname` is left untouched.
    pub fn save(&self, fname: impl AsRef<Path>) -> GdsResult<()> {
        let fname = fname.as_ref();
        self.validate()?;
        let dir = match fname.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut wr = GdsWriter::new(BufWriter::new(tmp.as_file()));
            wr.write_lib(self)?;
            wr.flush()?;
        }
        tmp.persist(fname).map_err(|e| GdsError::Io(e.error))?;
        debug!("Saved GDSII library {} to {:?}", self.name, fname);
        Ok(())
    }
    /// Write to destination `dest`
    pub fn write(&self, dest: impl Write) -> GdsResult<()> {
        let mut wr = GdsWriter::new(dest);
        wr.write_lib(self)?;
        wr.flush()
    }
    /// Set the library and all its structs' modification and access times
    pub fn set_all_dates(&mut self, time: impl Into<GdsDateTime>) {
        let time: GdsDateTime = time.into();
        let dates = GdsDateTimes {
            modified: time,
            accessed: time,
        };
        self.dates = dates;
        for gds_struct in &mut self.structs {
            gds_struct.dates = dates;
        }
    }
}
// Enable [GdsLibrary] and [GdsStruct] serialization to file, in each of `utils` supported formats.
impl SerdeFile for GdsLibrary {}
impl SerdeFile for GdsStruct {}

/// Open and memory-map the file at path `fname`
pub(crate) fn open_mmap(fname: impl AsRef<Path>) -> GdsResult<Cursor<Mmap>> {
    let file = File::open(fname)?;
    // This is our one line of `unsafe`, for loading memory-mapped data.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(Cursor::new(mmap))
}

/// # Gds Layer Spec
///
/// Each GDSII element's layer is specified by a set of two numbers,
/// commonly referred to as `layer` and `datatype`.
/// Several element-types refer to their analog of `datatype` by different names,
/// e.g. `texttype` and `nodetype`.
///
/// `GdsLayerSpecs` generalize across these via the `xtype` field,
/// which holds whichever is appropriate for the given element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GdsLayerSpec {
    /// Layer ID Number
    pub layer: i16,
    /// DataType (or TextType, NodeType, etc.) ID Number
    pub xtype: i16,
}
/// # Has-Layer Trait
/// Sole function `layerspec` returns a [GdsLayerSpec] including the two numbers `layer` and `xtype`.
pub trait HasLayer {
    fn layerspec(&self) -> GdsLayerSpec;
}
impl GdsLayerSpec {
    /// Create a new [GdsLayerSpec]
    pub fn new(layer: i16, xtype: i16) -> GdsLayerSpec {
        GdsLayerSpec { layer, xtype }
    }
}
impl HasLayer for GdsBoundary {
    fn layerspec(&self) -> GdsLayerSpec {
        GdsLayerSpec::new(self.layer, self.datatype)
    }
}
impl HasLayer for GdsTextElem {
    fn layerspec(&self) -> GdsLayerSpec {
        GdsLayerSpec::new(self.layer, self.texttype)
    }
}
impl HasLayer for GdsNode {
    fn layerspec(&self) -> GdsLayerSpec {
        GdsLayerSpec::new(self.layer, self.nodetype)
    }
}
impl HasLayer for GdsBox {
    fn layerspec(&self) -> GdsLayerSpec {
        GdsLayerSpec::new(self.layer, self.boxtype)
    }
}
impl HasLayer for GdsPath {
    fn layerspec(&self) -> GdsLayerSpec {
        GdsLayerSpec::new(self.layer, self.datatype)
    }
}

/// Our helper for "do not serialize default `false` boolean values".
/// This is a function primarily because those are what `#[serde(skip_serializing_if)]` understands.
fn is_false(b: &bool) -> bool {
    !b
}
fn is_zero(v: &u16) -> bool {
    *v == 0
}
