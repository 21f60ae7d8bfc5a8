//!
//! # Stream21 Field-Descriptor Schema
//!
//! Each entity type ([GdsLibrary], [GdsStruct], and each [GdsElement] variant)
//! describes its record layout as a static table of [GdsField]s:
//! the record-type of each attribute, in order, paired with plain-function accessors.
//! One generic routine per direction (`load`, `save`, `validate`) walks these tables,
//! so that record order and optionality are stated exactly once per type.
//!

// Std-Lib Imports
use std::io::{Read, Write};

// Crates.io
use tracing::warn;

// Workspace Imports
use stream21utils::ErrorHelper;

// Local Imports
use crate::data::*;
use crate::error::{GdsContext, GdsError, GdsResult};
use crate::read::GdsRecordStream;
use crate::record::{GdsDataType, GdsFloat64, GdsRecord, GdsRecordData, GdsRecordType};
use crate::write::GdsRecordSink;

/// # Single-Record Accessor
/// Getter returns `None` for absent attributes.
pub struct GdsAccessor<T> {
    pub get: fn(&T) -> Option<GdsRecordData>,
    pub set: fn(&mut T, GdsRecordData) -> GdsResult<()>,
}
/// # Repeated-Record Accessor
/// One payload per record, in order.
pub struct GdsListAccessor<T> {
    pub get: fn(&T) -> Vec<GdsRecordData>,
    pub set: fn(&mut T, Vec<GdsRecordData>) -> GdsResult<()>,
}
/// # Property-List Accessor
pub struct GdsPropAccessor<T> {
    pub get: fn(&T) -> &[GdsProperty],
    pub set: fn(&mut T, Vec<GdsProperty>),
}

/// # Field Kinds
pub enum GdsFieldKind<T> {
    /// Exactly one record
    Required(GdsAccessor<T>),
    /// Zero or one record
    Optional(GdsAccessor<T>),
    /// A run of one or more records whose payloads concatenate, i.e. `XY`
    Concat(GdsAccessor<T>),
    /// Zero or more independent records, e.g. `MASK`
    Repeated(GdsListAccessor<T>),
    /// Zero or more `PROPATTR` `PROPVALUE` pairs
    Properties(GdsPropAccessor<T>),
}

/// # Field Descriptor
/// One attribute of a schema type: its (first) record-type and how to get & set it.
pub struct GdsField<T> {
    pub rtype: GdsRecordType,
    pub kind: GdsFieldKind<T>,
}

///
/// # Gds Schema Trait
///
/// Implemented by each type with a GDSII record layout.
/// Implementers supply the opening and closing record-types, the ordered field table,
/// and for container types, hooks for their children.
/// Loading, saving, and validation are provided.
///
pub trait GdsSchema: Default + Sized + 'static {
    /// Opening record-type
    const OPEN: GdsRecordType;
    /// Closing record-type
    const CLOSE: GdsRecordType;
    /// Context for error reporting
    const CONTEXT: GdsContext;

    /// Accessor for the opening record's payload, if it has one
    fn opener() -> Option<GdsAccessor<Self>> {
        None
    }
    /// Ordered field table
    fn fields() -> &'static [GdsField<Self>];
    /// Load child objects, from just past the last field to the closing record
    fn load_children<R: Read>(&mut self, _stream: &mut GdsRecordStream<R>) -> GdsResult<()> {
        Ok(())
    }
    /// Save child objects
    fn save_children<W: Write>(&self, _sink: &mut GdsRecordSink<W>) -> GdsResult<()> {
        Ok(())
    }
    /// Validate child objects
    fn validate_children(&self) -> GdsResult<()> {
        Ok(())
    }

    /// Load from `stream`, which must be positioned at our opening record.
    /// Leaves `stream` positioned just past our closing record.
    fn load<R: Read>(stream: &mut GdsRecordStream<R>) -> GdsResult<Self> {
        let mut me = Self::load_head(stream)?;
        me.load_children(stream)?;
        Self::load_tail(stream)?;
        Ok(me)
    }
    /// Load the opening record and all fields, stopping before any children
    fn load_head<R: Read>(stream: &mut GdsRecordStream<R>) -> GdsResult<Self> {
        stream.push_ctx(Self::CONTEXT);
        stream.expect(Self::OPEN)?;
        let mut me = Self::default();
        if let Some(acc) = Self::opener() {
            let data = stream.take_data()?;
            (acc.set)(&mut me, data).map_err(|e| locate(stream, e))?;
        }
        stream.advance()?;
        for field in Self::fields() {
            load_field(&mut me, field, stream)?;
        }
        Ok(me)
    }
    /// Require and consume the closing record
    fn load_tail<R: Read>(stream: &mut GdsRecordStream<R>) -> GdsResult<()> {
        stream.expect(Self::CLOSE)?;
        stream.pop_ctx();
        stream.advance()
    }

    /// Save to `sink`
    fn save<W: Write>(&self, sink: &mut GdsRecordSink<W>) -> GdsResult<()> {
        self.save_head(sink)?;
        self.save_children(sink)?;
        Self::save_tail(sink)
    }
    /// Save the opening record and all fields
    fn save_head<W: Write>(&self, sink: &mut GdsRecordSink<W>) -> GdsResult<()> {
        let data = match Self::opener() {
            Some(acc) => (acc.get)(self).ok_or_else(|| missing::<Self>(Self::OPEN))?,
            None => GdsRecordData::NoData,
        };
        sink.emit(Self::OPEN, data)?;
        for field in Self::fields() {
            save_field(self, field, sink)?;
        }
        Ok(())
    }
    /// Save the closing record
    fn save_tail<W: Write>(sink: &mut GdsRecordSink<W>) -> GdsResult<()> {
        sink.emit(Self::CLOSE, GdsRecordData::NoData)
    }

    /// Check that we can be saved, without writing anything:
    /// required fields are present, reals are in range,
    /// and strings and property values fit their records.
    fn validate(&self) -> GdsResult<()> {
        self.validate_head()?;
        self.validate_children()
    }
    /// Check the opening record and all fields, as written by [GdsSchema::save_head]
    fn validate_head(&self) -> GdsResult<()> {
        if let Some(acc) = Self::opener() {
            let data = (acc.get)(self).ok_or_else(|| missing::<Self>(Self::OPEN))?;
            check_record(Self::OPEN, data)?;
        }
        for field in Self::fields() {
            validate_field(self, field)?;
        }
        Ok(())
    }
}

/// Attach the position of `stream` to position-less format errors
fn locate<R: Read>(stream: &GdsRecordStream<R>, e: GdsError) -> GdsError {
    match e {
        GdsError::Format { msg, pos: None } => stream.err(msg),
        e => e,
    }
}

/// Error for a missing required attribute of `T`
fn missing<T: GdsSchema>(rtype: GdsRecordType) -> GdsError {
    GdsError::Value(format!(
        "missing required {:?} in {:?}",
        rtype,
        T::CONTEXT
    ))
}

/// Load one field of `me` from `stream`
fn load_field<T: GdsSchema, R: Read>(
    me: &mut T,
    field: &GdsField<T>,
    stream: &mut GdsRecordStream<R>,
) -> GdsResult<()> {
    let matched = stream.tag() == Some(field.rtype);
    match &field.kind {
        GdsFieldKind::Required(acc) | GdsFieldKind::Optional(acc) => {
            if !matched {
                if let GdsFieldKind::Required(_) = field.kind {
                    return stream.fail(format!(
                        "unexpected record {:?}, expected {:?}",
                        stream.tag(),
                        field.rtype
                    ));
                }
                return Ok(());
            }
            let data = stream.take_data()?;
            (acc.set)(me, data).map_err(|e| locate(stream, e))?;
            stream.advance()
        }
        GdsFieldKind::Concat(acc) => {
            if !matched {
                return stream.fail(format!(
                    "unexpected record {:?}, expected {:?}",
                    stream.tag(),
                    field.rtype
                ));
            }
            let mut vals = Vec::new();
            while stream.tag() == Some(field.rtype) {
                let data = stream.take_data()?;
                vals.extend(data.into_i32s().map_err(|e| locate(stream, e))?);
                stream.advance()?;
            }
            (acc.set)(me, GdsRecordData::I32(vals)).map_err(|e| locate(stream, e))
        }
        GdsFieldKind::Repeated(acc) => {
            let mut items = Vec::new();
            while stream.tag() == Some(field.rtype) {
                items.push(stream.take_data()?);
                stream.advance()?;
            }
            if items.is_empty() {
                return Ok(());
            }
            (acc.set)(me, items).map_err(|e| locate(stream, e))
        }
        GdsFieldKind::Properties(acc) => {
            let mut props = Vec::new();
            stream.push_ctx(GdsContext::Property);
            while stream.tag() == Some(GdsRecordType::PropAttr) {
                let attr = stream.take_data()?;
                let attr = attr.into_i16().map_err(|e| locate(stream, e))?;
                stream.advance()?;
                // `PROPATTR` must be *immediately* followed by `PROPVALUE`
                stream.expect(GdsRecordType::PropValue)?;
                let value = stream.take_data()?;
                let value = value.into_bytes().map_err(|e| locate(stream, e))?;
                if value.len() > GdsProperty::MAX_LEN {
                    warn!(
                        attr,
                        len = value.len(),
                        "property value longer than {} bytes",
                        GdsProperty::MAX_LEN
                    );
                }
                props.push(GdsProperty { attr, value });
                stream.advance()?;
            }
            stream.pop_ctx();
            (acc.set)(me, props);
            Ok(())
        }
    }
}

/// Save one field of `me` to `sink`
fn save_field<T: GdsSchema, W: Write>(
    me: &T,
    field: &GdsField<T>,
    sink: &mut GdsRecordSink<W>,
) -> GdsResult<()> {
    match &field.kind {
        GdsFieldKind::Required(acc) | GdsFieldKind::Concat(acc) => {
            let data = (acc.get)(me).ok_or_else(|| missing::<T>(field.rtype))?;
            sink.emit(field.rtype, data)
        }
        GdsFieldKind::Optional(acc) => match (acc.get)(me) {
            Some(data) => sink.emit(field.rtype, data),
            None => Ok(()),
        },
        GdsFieldKind::Repeated(acc) => {
            for data in (acc.get)(me) {
                sink.emit(field.rtype, data)?;
            }
            Ok(())
        }
        GdsFieldKind::Properties(acc) => {
            for prop in (acc.get)(me) {
                check_property(prop)?;
                sink.emit(GdsRecordType::PropAttr, GdsRecordData::I16(vec![prop.attr]))?;
                sink.emit(GdsRecordType::PropValue, GdsRecordData::str(&prop.value))?;
            }
            Ok(())
        }
    }
}

/// Validate one field of `me`
fn validate_field<T: GdsSchema>(me: &T, field: &GdsField<T>) -> GdsResult<()> {
    match &field.kind {
        GdsFieldKind::Required(acc) | GdsFieldKind::Concat(acc) => {
            let data = (acc.get)(me).ok_or_else(|| missing::<T>(field.rtype))?;
            check_record(field.rtype, data)
        }
        GdsFieldKind::Optional(acc) => match (acc.get)(me) {
            Some(data) => check_record(field.rtype, data),
            None => Ok(()),
        },
        GdsFieldKind::Repeated(acc) => {
            for data in (acc.get)(me) {
                check_record(field.rtype, data)?;
            }
            Ok(())
        }
        GdsFieldKind::Properties(acc) => {
            for prop in (acc.get)(me) {
                check_property(prop)?;
            }
            Ok(())
        }
    }
}

/// Check a record's content is encodable.
/// `XY` records are exempt from the length limit, as they are split on write.
fn check_record(rtype: GdsRecordType, data: GdsRecordData) -> GdsResult<()> {
    if let GdsRecordData::F64(vals) = &data {
        for val in vals {
            GdsFloat64::encode(*val)?;
        }
    }
    match rtype {
        GdsRecordType::Xy if data.dtype() == GdsDataType::I32 => Ok(()),
        _ => GdsRecord::new(rtype, data).check(),
    }
}

/// Check a property value fits in its record
fn check_property(prop: &GdsProperty) -> GdsResult<()> {
    if prop.value.len() > GdsProperty::MAX_LEN {
        return Err(GdsError::Value(format!(
            "property {} value is {} bytes, more than the maximum {}",
            prop.attr,
            prop.value.len(),
            GdsProperty::MAX_LEN
        )));
    }
    Ok(())
}

//
// Field-descriptor macros, for the attributes shared between types.
// Each expands to a single [GdsField] expression.
//

/// Required `i16` attribute
macro_rules! i16_field {
    ($rtype:ident, $T:ty, $f:ident) => {
        GdsField {
            rtype: GdsRecordType::$rtype,
            kind: GdsFieldKind::Required(GdsAccessor {
                get: |e: &$T| Some(GdsRecordData::I16(vec![e.$f])),
                set: |e: &mut $T, d: GdsRecordData| -> GdsResult<()> {
                    e.$f = d.into_i16()?;
                    Ok(())
                },
            }),
        }
    };
}
/// Optional `i16` attribute
macro_rules! opt_i16_field {
    ($rtype:ident, $T:ty, $f:ident) => {
        GdsField {
            rtype: GdsRecordType::$rtype,
            kind: GdsFieldKind::Optional(GdsAccessor {
                get: |e: &$T| e.$f.map(|v| GdsRecordData::I16(vec![v])),
                set: |e: &mut $T, d: GdsRecordData| -> GdsResult<()> {
                    e.$f = Some(d.into_i16()?);
                    Ok(())
                },
            }),
        }
    };
}
/// Optional `i32` attribute
macro_rules! opt_i32_field {
    ($rtype:ident, $T:ty, $f:ident) => {
        GdsField {
            rtype: GdsRecordType::$rtype,
            kind: GdsFieldKind::Optional(GdsAccessor {
                get: |e: &$T| e.$f.map(|v| GdsRecordData::I32(vec![v])),
                set: |e: &mut $T, d: GdsRecordData| -> GdsResult<()> {
                    e.$f = Some(d.into_i32()?);
                    Ok(())
                },
            }),
        }
    };
}
/// Required [String] attribute
macro_rules! string_field {
    ($rtype:ident, $T:ty, $f:ident) => {
        GdsField {
            rtype: GdsRecordType::$rtype,
            kind: GdsFieldKind::Required(GdsAccessor {
                get: |e: &$T| Some(GdsRecordData::str(&e.$f)),
                set: |e: &mut $T, d: GdsRecordData| -> GdsResult<()> {
                    e.$f = d.into_string()?;
                    Ok(())
                },
            }),
        }
    };
}
/// `ELFLAGS`
macro_rules! elflags_field {
    ($T:ty) => {
        GdsField {
            rtype: GdsRecordType::ElemFlags,
            kind: GdsFieldKind::Optional(GdsAccessor {
                get: |e: &$T| e.elflags.map(|f| GdsRecordData::BitArray(f.0)),
                set: |e: &mut $T, d: GdsRecordData| -> GdsResult<()> {
                    e.elflags = Some(GdsElemFlags(d.into_bits()?));
                    Ok(())
                },
            }),
        }
    };
}
/// `PLEX`
macro_rules! plex_field {
    ($T:ty) => {
        GdsField {
            rtype: GdsRecordType::Plex,
            kind: GdsFieldKind::Optional(GdsAccessor {
                get: |e: &$T| e.plex.map(|p| GdsRecordData::I32(vec![p.0])),
                set: |e: &mut $T, d: GdsRecordData| -> GdsResult<()> {
                    e.plex = Some(GdsPlex(d.into_i32()?));
                    Ok(())
                },
            }),
        }
    };
}
/// `STRANS` flags
macro_rules! strans_field {
    ($T:ty) => {
        GdsField {
            rtype: GdsRecordType::Strans,
            kind: GdsFieldKind::Optional(GdsAccessor {
                get: |e: &$T| e.strans.as_ref().map(|s| GdsRecordData::BitArray(s.bits())),
                set: |e: &mut $T, d: GdsRecordData| -> GdsResult<()> {
                    e.strans = Some(GdsStrans::from_bits(d.into_bits()?));
                    Ok(())
                },
            }),
        }
    };
}
/// `MAG`, or `ANGLE`, stored in `strans`, and invalid without it
macro_rules! strans_real_field {
    ($rtype:ident, $T:ty, $f:ident) => {
        GdsField {
            rtype: GdsRecordType::$rtype,
            kind: GdsFieldKind::Optional(GdsAccessor {
                get: |e: &$T| {
                    e.strans
                        .as_ref()
                        .and_then(|s| s.$f)
                        .map(|v| GdsRecordData::F64(vec![v]))
                },
                set: |e: &mut $T, d: GdsRecordData| -> GdsResult<()> {
                    let val = d.into_f64()?;
                    match e.strans.as_mut() {
                        Some(s) => s.$f = Some(val),
                        None => {
                            return Err(GdsError::format(format!(
                                "{:?} without preceding STRANS",
                                GdsRecordType::$rtype
                            )))
                        }
                    }
                    Ok(())
                },
            }),
        }
    };
}
/// `XY` into a point-vector
macro_rules! xy_vec_field {
    ($T:ty) => {
        GdsField {
            rtype: GdsRecordType::Xy,
            kind: GdsFieldKind::Concat(GdsAccessor {
                get: |e: &$T| match e.xy.is_empty() {
                    true => None,
                    false => Some(GdsRecordData::I32(GdsPoint::flatten_vec(&e.xy))),
                },
                set: |e: &mut $T, d: GdsRecordData| -> GdsResult<()> {
                    e.xy = GdsPoint::parse_vec(&d.into_i32s()?)?;
                    Ok(())
                },
            }),
        }
    };
}
/// `XY` into a single point
macro_rules! xy_point_field {
    ($T:ty) => {
        GdsField {
            rtype: GdsRecordType::Xy,
            kind: GdsFieldKind::Concat(GdsAccessor {
                get: |e: &$T| Some(GdsRecordData::I32(vec![e.xy.x, e.xy.y])),
                set: |e: &mut $T, d: GdsRecordData| -> GdsResult<()> {
                    let [pt] = GdsPoint::parse_array::<1>(&d.into_i32s()?)?;
                    e.xy = pt;
                    Ok(())
                },
            }),
        }
    };
}
/// `XY` into a fixed-size point-array
macro_rules! xy_array_field {
    ($T:ty) => {
        GdsField {
            rtype: GdsRecordType::Xy,
            kind: GdsFieldKind::Concat(GdsAccessor {
                get: |e: &$T| Some(GdsRecordData::I32(GdsPoint::flatten_vec(&e.xy))),
                set: |e: &mut $T, d: GdsRecordData| -> GdsResult<()> {
                    e.xy = GdsPoint::parse_array(&d.into_i32s()?)?;
                    Ok(())
                },
            }),
        }
    };
}
/// Trailing properties
macro_rules! properties_field {
    ($T:ty) => {
        GdsField {
            rtype: GdsRecordType::PropAttr,
            kind: GdsFieldKind::Properties(GdsPropAccessor {
                get: {
                    fn get(e: &$T) -> &[GdsProperty] {
                        &e.properties
                    }
                    get
                },
                set: |e: &mut $T, props: Vec<GdsProperty>| e.properties = props,
            }),
        }
    };
}

static BOUNDARY_FIELDS: [GdsField<GdsBoundary>; 6] = [
    elflags_field!(GdsBoundary),
    plex_field!(GdsBoundary),
    i16_field!(Layer, GdsBoundary, layer),
    i16_field!(DataType, GdsBoundary, datatype),
    xy_vec_field!(GdsBoundary),
    properties_field!(GdsBoundary),
];
impl GdsSchema for GdsBoundary {
    const OPEN: GdsRecordType = GdsRecordType::Boundary;
    const CLOSE: GdsRecordType = GdsRecordType::EndElement;
    const CONTEXT: GdsContext = GdsContext::Boundary;
    fn fields() -> &'static [GdsField<Self>] {
        &BOUNDARY_FIELDS
    }
}

static PATH_FIELDS: [GdsField<GdsPath>; 10] = [
    elflags_field!(GdsPath),
    plex_field!(GdsPath),
    i16_field!(Layer, GdsPath, layer),
    i16_field!(DataType, GdsPath, datatype),
    opt_i16_field!(PathType, GdsPath, path_type),
    opt_i32_field!(Width, GdsPath, width),
    opt_i32_field!(BeginExtn, GdsPath, begin_extn),
    opt_i32_field!(EndExtn, GdsPath, end_extn),
    xy_vec_field!(GdsPath),
    properties_field!(GdsPath),
];
impl GdsSchema for GdsPath {
    const OPEN: GdsRecordType = GdsRecordType::Path;
    const CLOSE: GdsRecordType = GdsRecordType::EndElement;
    const CONTEXT: GdsContext = GdsContext::Path;
    fn fields() -> &'static [GdsField<Self>] {
        &PATH_FIELDS
    }
}

static STRUCT_REF_FIELDS: [GdsField<GdsStructRef>; 8] = [
    elflags_field!(GdsStructRef),
    plex_field!(GdsStructRef),
    string_field!(StructRefName, GdsStructRef, name),
    strans_field!(GdsStructRef),
    strans_real_field!(Mag, GdsStructRef, mag),
    strans_real_field!(Angle, GdsStructRef, angle),
    xy_point_field!(GdsStructRef),
    properties_field!(GdsStructRef),
];
impl GdsSchema for GdsStructRef {
    const OPEN: GdsRecordType = GdsRecordType::StructRef;
    const CLOSE: GdsRecordType = GdsRecordType::EndElement;
    const CONTEXT: GdsContext = GdsContext::StructRef;
    fn fields() -> &'static [GdsField<Self>] {
        &STRUCT_REF_FIELDS
    }
}

static ARRAY_REF_FIELDS: [GdsField<GdsArrayRef>; 9] = [
    elflags_field!(GdsArrayRef),
    plex_field!(GdsArrayRef),
    string_field!(StructRefName, GdsArrayRef, name),
    strans_field!(GdsArrayRef),
    strans_real_field!(Mag, GdsArrayRef, mag),
    strans_real_field!(Angle, GdsArrayRef, angle),
    GdsField {
        rtype: GdsRecordType::ColRow,
        kind: GdsFieldKind::Required(GdsAccessor {
            get: |e: &GdsArrayRef| Some(GdsRecordData::I16(vec![e.cols, e.rows])),
            set: |e: &mut GdsArrayRef, d: GdsRecordData| -> GdsResult<()> {
                match d.into_i16s()?.as_slice() {
                    [cols, rows] => {
                        e.cols = *cols;
                        e.rows = *rows;
                        Ok(())
                    }
                    v => Err(GdsError::format(format!(
                        "COLROW requires two values, found {}",
                        v.len()
                    ))),
                }
            },
        }),
    },
    xy_array_field!(GdsArrayRef),
    properties_field!(GdsArrayRef),
];
impl GdsSchema for GdsArrayRef {
    const OPEN: GdsRecordType = GdsRecordType::ArrayRef;
    const CLOSE: GdsRecordType = GdsRecordType::EndElement;
    const CONTEXT: GdsContext = GdsContext::ArrayRef;
    fn fields() -> &'static [GdsField<Self>] {
        &ARRAY_REF_FIELDS
    }
}

static TEXT_FIELDS: [GdsField<GdsTextElem>; 13] = [
    elflags_field!(GdsTextElem),
    plex_field!(GdsTextElem),
    i16_field!(Layer, GdsTextElem, layer),
    i16_field!(TextType, GdsTextElem, texttype),
    GdsField {
        rtype: GdsRecordType::Presentation,
        kind: GdsFieldKind::Optional(GdsAccessor {
            get: |e: &GdsTextElem| e.presentation.map(|p| GdsRecordData::BitArray(p.0)),
            set: |e: &mut GdsTextElem, d: GdsRecordData| -> GdsResult<()> {
                e.presentation = Some(GdsPresentation(d.into_bits()?));
                Ok(())
            },
        }),
    },
    opt_i16_field!(PathType, GdsTextElem, path_type),
    opt_i32_field!(Width, GdsTextElem, width),
    strans_field!(GdsTextElem),
    strans_real_field!(Mag, GdsTextElem, mag),
    strans_real_field!(Angle, GdsTextElem, angle),
    xy_point_field!(GdsTextElem),
    string_field!(String, GdsTextElem, string),
    properties_field!(GdsTextElem),
];
impl GdsSchema for GdsTextElem {
    const OPEN: GdsRecordType = GdsRecordType::Text;
    const CLOSE: GdsRecordType = GdsRecordType::EndElement;
    const CONTEXT: GdsContext = GdsContext::Text;
    fn fields() -> &'static [GdsField<Self>] {
        &TEXT_FIELDS
    }
}

static NODE_FIELDS: [GdsField<GdsNode>; 6] = [
    elflags_field!(GdsNode),
    plex_field!(GdsNode),
    i16_field!(Layer, GdsNode, layer),
    i16_field!(Nodetype, GdsNode, nodetype),
    xy_vec_field!(GdsNode),
    properties_field!(GdsNode),
];
impl GdsSchema for GdsNode {
    const OPEN: GdsRecordType = GdsRecordType::Node;
    const CLOSE: GdsRecordType = GdsRecordType::EndElement;
    const CONTEXT: GdsContext = GdsContext::Node;
    fn fields() -> &'static [GdsField<Self>] {
        &NODE_FIELDS
    }
}

static BOX_FIELDS: [GdsField<GdsBox>; 6] = [
    elflags_field!(GdsBox),
    plex_field!(GdsBox),
    i16_field!(Layer, GdsBox, layer),
    i16_field!(BoxType, GdsBox, boxtype),
    xy_array_field!(GdsBox),
    properties_field!(GdsBox),
];
impl GdsSchema for GdsBox {
    const OPEN: GdsRecordType = GdsRecordType::Box;
    const CLOSE: GdsRecordType = GdsRecordType::EndElement;
    const CONTEXT: GdsContext = GdsContext::Box;
    fn fields() -> &'static [GdsField<Self>] {
        &BOX_FIELDS
    }
}

impl GdsElement {
    /// Load whichever element-type opens at the current record of `stream`.
    /// Any record other than the seven element-openers fails.
    pub fn load<R: Read>(stream: &mut GdsRecordStream<R>) -> GdsResult<Self> {
        use GdsRecordType as T;
        let elem = match stream.tag() {
            Some(T::Boundary) => GdsBoundary::load(stream)?.into(),
            Some(T::Path) => GdsPath::load(stream)?.into(),
            Some(T::StructRef) => GdsStructRef::load(stream)?.into(),
            Some(T::ArrayRef) => GdsArrayRef::load(stream)?.into(),
            Some(T::Text) => GdsTextElem::load(stream)?.into(),
            Some(T::Node) => GdsNode::load(stream)?.into(),
            Some(T::Box) => GdsBox::load(stream)?.into(),
            Some(t) => return stream.fail(format!("unexpected record {:?} in struct", t)),
            None => return stream.fail("no current record"),
        };
        Ok(elem)
    }
    /// Save to `sink`
    pub fn save<W: Write>(&self, sink: &mut GdsRecordSink<W>) -> GdsResult<()> {
        use GdsElement::*;
        match self {
            GdsBoundary(e) => e.save(sink),
            GdsPath(e) => e.save(sink),
            GdsStructRef(e) => e.save(sink),
            GdsArrayRef(e) => e.save(sink),
            GdsTextElem(e) => e.save(sink),
            GdsNode(e) => e.save(sink),
            GdsBox(e) => e.save(sink),
        }
    }
    /// Check the element is encodable
    pub fn validate(&self) -> GdsResult<()> {
        use GdsElement::*;
        match self {
            GdsBoundary(e) => e.validate(),
            GdsPath(e) => e.validate(),
            GdsStructRef(e) => e.validate(),
            GdsArrayRef(e) => e.validate(),
            GdsTextElem(e) => e.validate(),
            GdsNode(e) => e.validate(),
            GdsBox(e) => e.validate(),
        }
    }
}

static STRUCT_FIELDS: [GdsField<GdsStruct>; 2] = [
    string_field!(StructName, GdsStruct, name),
    GdsField {
        rtype: GdsRecordType::StrClass,
        kind: GdsFieldKind::Optional(GdsAccessor {
            get: |e: &GdsStruct| e.strclass.map(GdsRecordData::BitArray),
            set: |e: &mut GdsStruct, d: GdsRecordData| -> GdsResult<()> {
                e.strclass = Some(d.into_bits()?);
                Ok(())
            },
        }),
    },
];
impl GdsSchema for GdsStruct {
    const OPEN: GdsRecordType = GdsRecordType::BgnStruct;
    const CLOSE: GdsRecordType = GdsRecordType::EndStruct;
    const CONTEXT: GdsContext = GdsContext::Struct;
    fn opener() -> Option<GdsAccessor<Self>> {
        Some(GdsAccessor {
            get: |e: &GdsStruct| Some(GdsRecordData::I16(e.dates.encode())),
            set: |e: &mut GdsStruct, d: GdsRecordData| -> GdsResult<()> {
                e.dates = GdsDateTimes::decode(&d.into_i16s()?)?;
                Ok(())
            },
        })
    }
    fn fields() -> &'static [GdsField<Self>] {
        &STRUCT_FIELDS
    }
    fn load_children<R: Read>(&mut self, stream: &mut GdsRecordStream<R>) -> GdsResult<()> {
        while stream.tag() != Some(GdsRecordType::EndStruct) {
            self.elems.push(GdsElement::load(stream)?);
        }
        Ok(())
    }
    fn save_children<W: Write>(&self, sink: &mut GdsRecordSink<W>) -> GdsResult<()> {
        for elem in self.elems.iter() {
            elem.save(sink)?;
        }
        Ok(())
    }
    fn validate_children(&self) -> GdsResult<()> {
        for elem in self.elems.iter() {
            elem.validate()?;
        }
        Ok(())
    }
}

static LIBRARY_FIELDS: [GdsField<GdsLibrary>; 13] = [
    GdsField {
        rtype: GdsRecordType::BgnLib,
        kind: GdsFieldKind::Required(GdsAccessor {
            get: |e: &GdsLibrary| Some(GdsRecordData::I16(e.dates.encode())),
            set: |e: &mut GdsLibrary, d: GdsRecordData| -> GdsResult<()> {
                e.dates = GdsDateTimes::decode(&d.into_i16s()?)?;
                Ok(())
            },
        }),
    },
    opt_i16_field!(LibDirSize, GdsLibrary, libdirsize),
    GdsField {
        rtype: GdsRecordType::SrfName,
        kind: GdsFieldKind::Optional(GdsAccessor {
            get: |e: &GdsLibrary| e.srfname.as_ref().map(GdsRecordData::str),
            set: |e: &mut GdsLibrary, d: GdsRecordData| -> GdsResult<()> {
                e.srfname = Some(d.into_string()?);
                Ok(())
            },
        }),
    },
    GdsField {
        rtype: GdsRecordType::LibSecur,
        kind: GdsFieldKind::Optional(GdsAccessor {
            get: |e: &GdsLibrary| {
                e.libsecur.as_ref().map(|acl| {
                    GdsRecordData::I16(
                        acl.iter()
                            .flat_map(|a| [a.group, a.user, a.rights])
                            .collect(),
                    )
                })
            },
            set: |e: &mut GdsLibrary, d: GdsRecordData| -> GdsResult<()> {
                let vals = d.into_i16s()?;
                if vals.len() % 3 != 0 {
                    return Err(GdsError::format(format!(
                        "LIBSECUR requires triples, found {} values",
                        vals.len()
                    )));
                }
                let acl = vals
                    .chunks_exact(3)
                    .map(|c| GdsAccessControl {
                        group: c[0],
                        user: c[1],
                        rights: c[2],
                    })
                    .collect();
                e.libsecur = Some(acl);
                Ok(())
            },
        }),
    },
    string_field!(LibName, GdsLibrary, name),
    GdsField {
        rtype: GdsRecordType::RefLibs,
        kind: GdsFieldKind::Optional(GdsAccessor {
            get: |e: &GdsLibrary| e.reflibs.as_ref().map(GdsRecordData::str),
            set: |e: &mut GdsLibrary, d: GdsRecordData| -> GdsResult<()> {
                e.reflibs = Some(d.into_bytes()?);
                Ok(())
            },
        }),
    },
    GdsField {
        rtype: GdsRecordType::Fonts,
        kind: GdsFieldKind::Optional(GdsAccessor {
            get: |e: &GdsLibrary| e.fonts.as_ref().map(GdsRecordData::str),
            set: |e: &mut GdsLibrary, d: GdsRecordData| -> GdsResult<()> {
                e.fonts = Some(d.into_bytes()?);
                Ok(())
            },
        }),
    },
    GdsField {
        rtype: GdsRecordType::AttrTable,
        kind: GdsFieldKind::Optional(GdsAccessor {
            get: |e: &GdsLibrary| e.attrtable.as_ref().map(GdsRecordData::str),
            set: |e: &mut GdsLibrary, d: GdsRecordData| -> GdsResult<()> {
                e.attrtable = Some(d.into_string()?);
                Ok(())
            },
        }),
    },
    opt_i16_field!(Generations, GdsLibrary, generations),
    opt_i16_field!(Format, GdsLibrary, format),
    GdsField {
        rtype: GdsRecordType::Mask,
        kind: GdsFieldKind::Repeated(GdsListAccessor {
            get: |e: &GdsLibrary| e.masks.iter().map(GdsRecordData::str).collect(),
            set: |e: &mut GdsLibrary, d: Vec<GdsRecordData>| -> GdsResult<()> {
                e.masks = d
                    .into_iter()
                    .map(GdsRecordData::into_string)
                    .collect::<GdsResult<_>>()?;
                Ok(())
            },
        }),
    },
    GdsField {
        rtype: GdsRecordType::EndMasks,
        kind: GdsFieldKind::Optional(GdsAccessor {
            get: |e: &GdsLibrary| e.endmasks.then_some(GdsRecordData::NoData),
            set: |e: &mut GdsLibrary, d: GdsRecordData| -> GdsResult<()> {
                d.into_none()?;
                e.endmasks = true;
                Ok(())
            },
        }),
    },
    GdsField {
        rtype: GdsRecordType::Units,
        kind: GdsFieldKind::Required(GdsAccessor {
            get: |e: &GdsLibrary| Some(GdsRecordData::F64(vec![e.units.0, e.units.1])),
            set: |e: &mut GdsLibrary, d: GdsRecordData| -> GdsResult<()> {
                match d.into_f64s()?.as_slice() {
                    [db_in_user, db_in_meters] => {
                        e.units = GdsUnits(*db_in_user, *db_in_meters);
                        Ok(())
                    }
                    v => Err(GdsError::format(format!(
                        "UNITS requires two values, found {}",
                        v.len()
                    ))),
                }
            },
        }),
    },
];
impl GdsSchema for GdsLibrary {
    const OPEN: GdsRecordType = GdsRecordType::Header;
    const CLOSE: GdsRecordType = GdsRecordType::EndLib;
    const CONTEXT: GdsContext = GdsContext::Library;
    fn opener() -> Option<GdsAccessor<Self>> {
        Some(GdsAccessor {
            get: |e: &GdsLibrary| Some(GdsRecordData::I16(vec![e.version])),
            set: |e: &mut GdsLibrary, d: GdsRecordData| -> GdsResult<()> {
                e.version = d.into_i16()?;
                Ok(())
            },
        })
    }
    fn fields() -> &'static [GdsField<Self>] {
        &LIBRARY_FIELDS
    }
    fn load_children<R: Read>(&mut self, stream: &mut GdsRecordStream<R>) -> GdsResult<()> {
        while stream.tag() == Some(GdsRecordType::BgnStruct) {
            self.structs.push(GdsStruct::load(stream)?);
        }
        Ok(())
    }
    fn save_children<W: Write>(&self, sink: &mut GdsRecordSink<W>) -> GdsResult<()> {
        for strukt in self.structs.iter() {
            strukt.save(sink)?;
        }
        Ok(())
    }
    fn validate_children(&self) -> GdsResult<()> {
        for strukt in self.structs.iter() {
            strukt.validate()?;
        }
        Ok(())
    }
}
