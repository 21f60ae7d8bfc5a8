use std::io::Cursor;

// Crates.io
use chrono::{NaiveDate, NaiveDateTime};
use tempfile::tempdir;

// Local Imports
use super::*;
use stream21utils::SerializationFormat::{Json, Yaml};

/// Specified creation date for test cases
fn test_dates() -> GdsDateTimes {
    let test_date = NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 1))
        .unwrap();
    GdsDateTimes {
        modified: test_date.into(),
        accessed: test_date.into(),
    }
}
/// Encode a list of records to bytes
fn encode(records: &[GdsRecord]) -> GdsResult<Vec<u8>> {
    let mut bytes = Vec::new();
    for record in records {
        record.encode(&mut bytes)?;
    }
    Ok(bytes)
}
/// Decode every record in `bytes`, without merging
fn decode_all(bytes: &[u8]) -> GdsResult<Vec<GdsRecord>> {
    let mut rdr = GdsRecordReader::new(bytes);
    let mut records = Vec::new();
    while rdr.bytepos() < bytes.len() as u64 {
        records.push(rdr.read_record()?);
    }
    Ok(records)
}
/// Encode a single element
fn element_bytes(elem: &GdsElement) -> GdsResult<Vec<u8>> {
    let mut sink = GdsRecordSink::new(Vec::new());
    elem.save(&mut sink)?;
    Ok(sink.into_inner())
}
/// Records which open a library and a struct named "cell0"
fn raw_head() -> Vec<GdsRecord> {
    use GdsRecordType as T;
    vec![
        GdsRecord::new(T::Header, GdsRecordData::I16(vec![3])),
        GdsRecord::new(T::BgnLib, GdsRecordData::I16(test_dates().encode())),
        GdsRecord::new(T::LibName, GdsRecordData::str("raw")),
        GdsRecord::new(T::Units, GdsRecordData::F64(vec![1e-3, 1e-9])),
        GdsRecord::new(T::BgnStruct, GdsRecordData::I16(test_dates().encode())),
        GdsRecord::new(T::StructName, GdsRecordData::str("cell0")),
    ]
}
/// Wrap `body` records in [raw_head] and the struct and library terminators
fn raw_lib(body: Vec<GdsRecord>) -> GdsResult<Vec<u8>> {
    let mut records = raw_head();
    records.extend(body);
    records.push(GdsRecord::empty(GdsRecordType::EndStruct));
    records.push(GdsRecord::empty(GdsRecordType::EndLib));
    encode(&records)
}
/// Records of a simple, valid boundary
fn raw_boundary() -> Vec<GdsRecord> {
    use GdsRecordType as T;
    vec![
        GdsRecord::empty(T::Boundary),
        GdsRecord::new(T::Layer, GdsRecordData::I16(vec![1])),
        GdsRecord::new(T::DataType, GdsRecordData::I16(vec![0])),
        GdsRecord::new(T::Xy, GdsRecordData::I32(vec![0, 0, 10, 0, 10, 10, 0, 0])),
    ]
}

/// Create a library exercising every element type and library attribute
fn kitchen_sink() -> GdsResult<GdsLibrary> {
    let boundary = GdsBoundaryBuilder::default()
        .layer(1)
        .datatype(2)
        .xy(GdsPoint::vec(&[(0, 0), (0, 100), (100, 100), (100, 0), (0, 0)]))
        .elflags(GdsElemFlags(0x0003))
        .plex(GdsPlex(7))
        .properties(vec![
            GdsProperty::new(1, "net=vdd"),
            GdsProperty::new(2, vec![0xFF_u8, 0x01]),
        ])
        .build()?;
    let path = GdsPathBuilder::default()
        .layer(3)
        .datatype(4)
        .xy(GdsPoint::vec(&[(0, 0), (500, 0), (500, -500)]))
        .width(20)
        .path_type(4)
        .begin_extn(5)
        .end_extn(-5)
        .build()?;
    let sref = GdsStructRefBuilder::default()
        .name("leaf")
        .xy(GdsPoint::new(-1000, 2000))
        .strans(GdsStrans {
            reflected: true,
            mag: Some(2.5),
            angle: Some(90.0),
            ..Default::default()
        })
        .build()?;
    let aref = GdsArrayRefBuilder::default()
        .name("leaf")
        .xy([
            GdsPoint::new(0, 0),
            GdsPoint::new(10_000, 0),
            GdsPoint::new(0, 20_000),
        ])
        .cols(10)
        .rows(20)
        .properties(vec![GdsProperty::new(9, "array")])
        .build()?;
    let text = GdsTextElemBuilder::default()
        .string("hello")
        .layer(5)
        .texttype(6)
        .xy(GdsPoint::new(1, 2))
        .presentation(GdsPresentation::new(1, 1, 2))
        .path_type(0)
        .width(-100)
        .strans(GdsStrans {
            abs_angle: true,
            angle: Some(45.0),
            ..Default::default()
        })
        .build()?;
    let node = GdsNodeBuilder::default()
        .layer(7)
        .nodetype(8)
        .xy(GdsPoint::vec(&[(5, 5), (6, 6)]))
        .build()?;
    let gds_box = GdsBoxBuilder::default()
        .layer(9)
        .boxtype(10)
        .xy([
            GdsPoint::new(0, 0),
            GdsPoint::new(0, 1),
            GdsPoint::new(1, 1),
            GdsPoint::new(1, 0),
            GdsPoint::new(0, 0),
        ])
        .build()?;

    let leaf = GdsStructBuilder::default()
        .name("leaf")
        .dates(test_dates())
        .strclass(0x0001_u16)
        .elems(vec![boundary.into(), path.into(), text.into(), node.into(), gds_box.into()])
        .build()?;
    let top = GdsStructBuilder::default()
        .name("top")
        .dates(test_dates())
        .elems(vec![sref.into(), aref.into()])
        .build()?;

    let lib = GdsLibraryBuilder::default()
        .name("kitchen_sink")
        .version(600)
        .dates(test_dates())
        .units(GdsUnits::new(1e-3, 1e-9))
        .structs(vec![leaf, top])
        .libdirsize(2)
        .srfname("rules.srf")
        .libsecur(vec![GdsAccessControl {
            group: 1,
            user: 2,
            rights: 3,
        }])
        .reflibs(b"reflib_a".to_vec())
        .fonts(b"font0".to_vec())
        .attrtable("attrs.txt")
        .generations(3)
        .format(1)
        .masks(vec!["1 2 3".to_string(), "4;5".to_string()])
        .endmasks(true)
        .build()?;
    Ok(lib)
}

/// Create an empty library with known dates
fn empty_lib() -> GdsLibrary {
    let mut lib = GdsLibrary::new("empty");
    // Set its dates to some known value, so we can check it round-trips
    lib.dates = test_dates();
    lib
}

#[test]
fn floats() -> GdsResult<()> {
    // Test conversions between normal-human and GDSII floating-point formats
    assert_eq!(GdsFloat64::encode(0.0)?, 0);
    assert_eq!(GdsFloat64::decode(0), 0.0);
    assert_eq!(GdsFloat64::encode(1.0)?, 0x4110_0000_0000_0000);
    assert_eq!(GdsFloat64::encode(-1.0)?, 0xC110_0000_0000_0000);
    assert_eq!(GdsFloat64::encode(0.5)?, 0x4080_0000_0000_0000);
    assert_eq!(GdsFloat64::encode(1e-9)?, 0x3944_B82F_A09B_5A54);
    assert_eq!(GdsFloat64::decode(0x4110_0000_0000_0000), 1.0);
    assert_eq!(GdsFloat64::decode(0x3944_B82F_A09B_5A54), 1e-9);

    for val in [1.0, 1e-3, 1e-9, 1e-11, -0.69, -33.33e-33, 123456.789, 90.0] {
        let f = GdsFloat64::encode(val)?;
        assert_eq!(GdsFloat64::decode(f), val);
    }
    Ok(())
}
#[test]
fn float_range() -> GdsResult<()> {
    // Range limits: [16^-65, 16^63)
    let smallest = 2f64.powi(-260);
    assert_eq!(GdsFloat64::encode(smallest)?, 0x0010_0000_0000_0000);
    assert_eq!(GdsFloat64::decode(0x0010_0000_0000_0000), smallest);
    let big = 2f64.powi(252) * 0.99;
    assert_eq!(GdsFloat64::decode(GdsFloat64::encode(big)?), big);

    for val in [smallest / 2.0, 2f64.powi(252), 1e300, -1e300, f64::MIN_POSITIVE] {
        assert!(matches!(GdsFloat64::encode(val), Err(GdsError::Range(_))));
    }
    for val in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        assert!(matches!(GdsFloat64::encode(val), Err(GdsError::Range(_))));
    }
    Ok(())
}
#[test]
fn four_byte_floats() -> GdsResult<()> {
    assert_eq!(GdsFloat32::encode(1.0)?, 0x4110_0000);
    assert_eq!(GdsFloat32::decode(0x4110_0000), 1.0);
    assert_eq!(GdsFloat32::encode(0.0)?, 0);
    // Rounding which carries into a new leading nibble
    assert_eq!(GdsFloat32::encode(1.0 - f64::EPSILON / 2.0)?, 0x4110_0000);
    let d = GdsFloat32::decode(GdsFloat32::encode(0.1)?);
    assert!((d - 0.1).abs() < 1e-7);
    assert!(matches!(GdsFloat32::encode(f64::NAN), Err(GdsError::Range(_))));

    // Four-byte payloads decode, but no record-type accepts them
    let data = GdsRecordData::decode(GdsDataType::F32, &[0x41, 0x10, 0, 0])?;
    assert_eq!(data, GdsRecordData::F32(vec![1.0]));
    let record = GdsRecord::new(GdsRecordType::Units, data);
    assert!(matches!(record.check(), Err(GdsError::Value(_))));
    Ok(())
}
#[test]
fn string_records() -> GdsResult<()> {
    // Odd-length strings gain a padding null, which is stripped on decode
    let record = GdsRecord::new(GdsRecordType::LibName, GdsRecordData::str("abc"));
    let bytes = record.to_bytes()?;
    assert_eq!(bytes, vec![0, 8, 0x02, 0x06, b'a', b'b', b'c', 0]);
    assert_eq!(GdsRecord::from_bytes(&bytes)?, record);

    // Even-length strings are written as-is
    let record = GdsRecord::new(GdsRecordType::LibName, GdsRecordData::str("ab"));
    let bytes = record.to_bytes()?;
    assert_eq!(bytes, vec![0, 6, 0x02, 0x06, b'a', b'b']);
    assert_eq!(GdsRecord::from_bytes(&bytes)?, record);

    // Non-text strings fail conversion
    let data = GdsRecordData::Str(vec![0xFF, 0xFE]);
    assert!(data.into_string().unwrap_err().is_format());
    Ok(())
}
#[test]
fn record_lengths() -> GdsResult<()> {
    // Every encoded record has an even length within the limit
    for record in raw_head() {
        let bytes = record.to_bytes()?;
        assert_eq!(bytes.len() % 2, 0);
        assert!(bytes.len() <= MAX_RECORD_LEN);
        assert_eq!(bytes.len(), record.len());
        assert_eq!(usize::from(u16::from_be_bytes([bytes[0], bytes[1]])), bytes.len());
    }
    // The longest string which fits
    let record = GdsRecord::new(GdsRecordType::LibName, GdsRecordData::str(vec![b'a'; 65530]));
    assert_eq!(record.to_bytes()?.len(), MAX_RECORD_LEN);
    // And one byte too many
    let record = GdsRecord::new(GdsRecordType::LibName, GdsRecordData::str(vec![b'a'; 65531]));
    let mut dest = Vec::new();
    assert!(matches!(record.encode(&mut dest), Err(GdsError::Value(_))));
    assert!(dest.is_empty());
    Ok(())
}
#[test]
fn record_mismatches() -> GdsResult<()> {
    // Data types are fixed per record type
    let record = GdsRecord::new(GdsRecordType::Layer, GdsRecordData::I32(vec![1]));
    assert!(matches!(record.check(), Err(GdsError::Value(_))));
    let data = GdsRecordData::I16(vec![1]);
    assert!(data.into_i32s().unwrap_err().is_format());
    let data = GdsRecordData::I16(vec![1, 2]);
    assert!(data.into_i16().unwrap_err().is_format());
    Ok(())
}
#[test]
fn bad_headers() -> GdsResult<()> {
    // Odd length
    assert!(GdsRecordHeader::decode([0, 5, 0x0D, 0x02]).unwrap_err().is_format());
    // Shorter than the header itself
    assert!(GdsRecordHeader::decode([0, 2, 0x0D, 0x02]).unwrap_err().is_format());
    // Unknown record type, e.g. vendor extensions
    assert!(GdsRecordHeader::decode([0, 4, 0x40, 0x00]).unwrap_err().is_format());
    // Known, but invalid record type (TEXTNODE)
    assert!(GdsRecordHeader::decode([0, 4, 0x14, 0x00]).unwrap_err().is_format());
    // LAYER with four-byte integers
    assert!(GdsRecordHeader::decode([0, 8, 0x0D, 0x03]).unwrap_err().is_format());
    // Unknown data type
    assert!(GdsRecordHeader::decode([0, 4, 0x04, 0x07]).unwrap_err().is_format());

    let header = GdsRecordHeader::decode([0, 6, 0x0D, 0x02])?;
    assert_eq!(header.rtype, GdsRecordType::Layer);
    assert_eq!(header.dtype, GdsDataType::I16);
    assert_eq!(header.len, 2);
    Ok(())
}
#[test]
fn bad_payloads() -> GdsResult<()> {
    // Declared length disagrees with the actual payload
    assert!(GdsRecord::from_bytes(&[0, 6, 0x0D, 0x02, 0])
        .unwrap_err()
        .is_format());
    // WIDTH payload not a multiple of four bytes
    assert!(GdsRecord::from_bytes(&[0, 10, 0x0F, 0x03, 0, 0, 0, 0, 0, 0])
        .unwrap_err()
        .is_format());
    // Non-empty payload for a no-data record
    assert!(GdsRecord::from_bytes(&[0, 6, 0x04, 0x00, 0, 0])
        .unwrap_err()
        .is_format());
    Ok(())
}
#[test]
fn stream_cursor() -> GdsResult<()> {
    use GdsRecordType as T;
    let bytes = encode(&[
        GdsRecord::new(T::Header, GdsRecordData::I16(vec![3])),
        GdsRecord::empty(T::EndLib),
    ])?;
    let mut stream = GdsRecordStream::new(&bytes[..]);
    assert!(stream.current().is_none());
    stream.advance()?;
    assert_eq!(stream.tag(), Some(T::Header));
    stream.expect(T::Header)?;
    assert!(stream.expect(T::BgnLib).unwrap_err().is_format());
    stream.advance()?;
    assert_eq!(stream.tag(), Some(T::EndLib));
    // Nothing is read past ENDLIB
    stream.advance()?;
    assert_eq!(stream.tag(), Some(T::EndLib));
    Ok(())
}
#[test]
fn merges_xy_records() -> GdsResult<()> {
    use GdsRecordType as T;
    let bytes = raw_lib(vec![
        GdsRecord::empty(T::Boundary),
        GdsRecord::new(T::Layer, GdsRecordData::I16(vec![1])),
        GdsRecord::new(T::DataType, GdsRecordData::I16(vec![0])),
        GdsRecord::new(T::Xy, GdsRecordData::I32(vec![0, 0, 10, 0])),
        GdsRecord::new(T::Xy, GdsRecordData::I32(vec![10, 10, 0, 0])),
        GdsRecord::empty(T::EndElement),
    ])?;
    let lib = GdsLibrary::from_bytes(&bytes)?;
    match &lib.structs[0].elems[0] {
        GdsElement::GdsBoundary(b) => {
            assert_eq!(b.xy, GdsPoint::vec(&[(0, 0), (10, 0), (10, 10), (0, 0)]))
        }
        other => panic!("unexpected element {:?}", other),
    }
    Ok(())
}
#[test]
fn splits_long_xy() -> GdsResult<()> {
    // 20k points require three XY records
    let xy: Vec<GdsPoint> = (0..20_000).map(|i| GdsPoint::new(i, -i)).collect();
    let mut lib = empty_lib();
    let mut cell = GdsStruct::new("big");
    cell.dates = test_dates();
    cell.elems.push(
        GdsBoundary {
            xy,
            ..Default::default()
        }
        .into(),
    );
    lib.structs.push(cell);

    let mut bytes = Vec::new();
    lib.write(&mut bytes)?;
    let xys: Vec<usize> = decode_all(&bytes)?
        .into_iter()
        .filter(|r| r.rtype == GdsRecordType::Xy)
        .map(|r| r.data.len() / 8)
        .collect();
    assert_eq!(xys, vec![MAX_XY_POINTS, MAX_XY_POINTS, 20_000 - 2 * MAX_XY_POINTS]);

    // And read back as one
    assert_eq!(GdsLibrary::from_bytes(&bytes)?, lib);
    Ok(())
}
#[test]
fn omits_empty_properties() -> GdsResult<()> {
    let boundary = GdsBoundaryBuilder::default()
        .layer(0)
        .datatype(0)
        .xy(GdsPoint::vec(&[(0, 0), (1, 0), (1, 1), (0, 0)]))
        .build()?;
    let rtypes: Vec<GdsRecordType> = decode_all(&element_bytes(&boundary.into())?)?
        .into_iter()
        .map(|r| r.rtype)
        .collect();
    use GdsRecordType as T;
    assert_eq!(
        rtypes,
        vec![T::Boundary, T::Layer, T::DataType, T::Xy, T::EndElement]
    );
    Ok(())
}
#[test]
fn sref_without_strans() -> GdsResult<()> {
    // An untransformed reference writes no STRANS, MAG, or ANGLE
    let sref = GdsStructRefBuilder::default()
        .name("cell0")
        .xy(GdsPoint::new(0, 0))
        .build()?;
    let bytes = element_bytes(&sref.into())?;
    #[rustfmt::skip]
    let expected = vec![
        0, 4, 0x0A, 0x00, // SREF
        0, 10, 0x12, 0x06, b'c', b'e', b'l', b'l', b'0', 0, // SNAME
        0, 12, 0x10, 0x03, 0, 0, 0, 0, 0, 0, 0, 0, // XY
        0, 4, 0x11, 0x00, // ENDEL
    ];
    assert_eq!(bytes, expected);
    Ok(())
}
#[test]
fn sref_with_strans() -> GdsResult<()> {
    let sref = GdsStructRefBuilder::default()
        .name("cell0")
        .xy(GdsPoint::new(0, 0))
        .strans(GdsStrans {
            reflected: true,
            abs_mag: true,
            mag: Some(2.0),
            ..Default::default()
        })
        .build()?;
    let records = decode_all(&element_bytes(&sref.into())?)?;
    assert_eq!(records[2].rtype, GdsRecordType::Strans);
    assert_eq!(records[2].data, GdsRecordData::BitArray(0x8004));
    assert_eq!(records[3].rtype, GdsRecordType::Mag);
    assert_eq!(records[3].data, GdsRecordData::F64(vec![2.0]));
    assert_eq!(records[4].rtype, GdsRecordType::Xy);
    Ok(())
}
#[test]
fn keeps_reserved_strans_bits() -> GdsResult<()> {
    use GdsRecordType as T;
    let bytes = raw_lib(vec![
        GdsRecord::empty(T::StructRef),
        GdsRecord::new(T::StructName, GdsRecordData::str("cell0")),
        GdsRecord::new(T::Strans, GdsRecordData::BitArray(0x8001)),
        GdsRecord::new(T::Xy, GdsRecordData::I32(vec![0, 0])),
        GdsRecord::empty(T::EndElement),
    ])?;
    let lib = GdsLibrary::from_bytes(&bytes)?;
    match &lib.structs[0].elems[0] {
        GdsElement::GdsStructRef(sref) => {
            let strans = sref.strans.as_ref().unwrap();
            assert!(strans.reflected);
            assert_eq!(strans.other_bits, 0x0001);
        }
        e => panic!("unexpected element {:?}", e),
    }
    let mut written = Vec::new();
    lib.write(&mut written)?;
    assert_eq!(written, bytes);
    Ok(())
}
#[test]
fn unit_square() -> GdsResult<()> {
    // One-micron user units, one-nanometer database units
    let mut lib = GdsLibrary::new("squares");
    lib.units = GdsUnits::new(1e-3, 1e-9);
    let mut cell = GdsStruct::new("cell0");
    let square = GdsPoint::vec(&[(0, 0), (2000, 0), (2000, 2000), (0, 2000)]);
    cell.elems.push(
        GdsBoundaryBuilder::default()
            .layer(0)
            .datatype(1000)
            .xy(square.clone())
            .build()?
            .into(),
    );
    lib.structs.push(cell);

    let mut bytes = Vec::new();
    lib.write(&mut bytes)?;
    let lib2 = GdsLibrary::from_bytes(&bytes)?;
    assert_eq!(lib2.units, GdsUnits(1e-3, 1e-9));
    assert_eq!(lib2.structs[0].name, "cell0");
    match &lib2.structs[0].elems[..] {
        [GdsElement::GdsBoundary(b)] => {
            assert_eq!(b.layerspec(), GdsLayerSpec::new(0, 1000));
            assert_eq!(b.xy, square);
            assert!(b.properties.is_empty());
        }
        other => panic!("unexpected elements {:?}", other),
    }
    assert_eq!(lib2, lib);
    Ok(())
}
#[test]
fn it_round_trips() -> GdsResult<()> {
    roundtrip(&kitchen_sink()?)?;
    roundtrip(&empty_lib())?;
    Ok(())
}
#[test]
fn writes_incrementally() -> GdsResult<()> {
    // Writing struct-by-struct matches writing the whole library
    let lib = kitchen_sink()?;
    let mut wr = GdsWriter::new(Vec::new());
    wr.begin_lib(&lib)?;
    for strukt in lib.structs.iter() {
        wr.write_struct(strukt)?;
    }
    wr.end_lib()?;
    let bytes = wr.into_inner();

    let mut whole = Vec::new();
    lib.write(&mut whole)?;
    assert_eq!(bytes, whole);
    assert_eq!(GdsLibrary::read(&bytes[..])?, lib);
    Ok(())
}
#[test]
fn begin_lib_validates_first() -> GdsResult<()> {
    // Unencodable library-level content writes nothing
    let mut lib = empty_lib();
    lib.units = GdsUnits(f64::NAN, 1e-9);
    let mut wr = GdsWriter::new(Vec::new());
    assert!(matches!(wr.begin_lib(&lib), Err(GdsError::Range(_))));
    assert!(wr.into_inner().is_empty());
    Ok(())
}
#[test]
fn tolerates_trailing_padding() -> GdsResult<()> {
    // Tape-era files pad past ENDLIB
    let lib = kitchen_sink()?;
    let mut bytes = Vec::new();
    lib.write(&mut bytes)?;
    bytes.extend(vec![0; 1024]);
    assert_eq!(GdsLibrary::from_bytes(&bytes)?, lib);
    Ok(())
}
#[test]
fn missing_endel() -> GdsResult<()> {
    let mut body = raw_boundary();
    body.extend(raw_boundary());
    body.push(GdsRecord::empty(GdsRecordType::EndElement));
    let bytes = raw_lib(body)?;
    match GdsLibrary::from_bytes(&bytes) {
        Err(GdsError::Format { pos: Some(pos), .. }) => {
            assert_eq!(pos.rtype, Some(GdsRecordType::Boundary));
            assert_eq!(
                pos.ctx,
                vec![GdsContext::Library, GdsContext::Struct, GdsContext::Boundary]
            );
        }
        other => panic!("expected a format error, got {:?}", other),
    }
    Ok(())
}
#[test]
fn unexpected_element() -> GdsResult<()> {
    // LAYER where an element should begin
    let bytes = raw_lib(vec![GdsRecord::new(
        GdsRecordType::Layer,
        GdsRecordData::I16(vec![1]),
    )])?;
    assert!(GdsLibrary::from_bytes(&bytes).unwrap_err().is_format());
    Ok(())
}
#[test]
fn mag_without_strans() -> GdsResult<()> {
    use GdsRecordType as T;
    let bytes = raw_lib(vec![
        GdsRecord::empty(T::StructRef),
        GdsRecord::new(T::StructRefName, GdsRecordData::str("leaf")),
        GdsRecord::new(T::Mag, GdsRecordData::F64(vec![2.0])),
        GdsRecord::new(T::Xy, GdsRecordData::I32(vec![0, 0])),
        GdsRecord::empty(T::EndElement),
    ])?;
    assert!(GdsLibrary::from_bytes(&bytes).unwrap_err().is_format());
    Ok(())
}
#[test]
fn odd_xy_count() -> GdsResult<()> {
    use GdsRecordType as T;
    let bytes = raw_lib(vec![
        GdsRecord::empty(T::Node),
        GdsRecord::new(T::Layer, GdsRecordData::I16(vec![1])),
        GdsRecord::new(T::Nodetype, GdsRecordData::I16(vec![0])),
        GdsRecord::new(T::Xy, GdsRecordData::I32(vec![0, 0, 1])),
        GdsRecord::empty(T::EndElement),
    ])?;
    assert!(GdsLibrary::from_bytes(&bytes).unwrap_err().is_format());
    Ok(())
}
#[test]
fn truncated() -> GdsResult<()> {
    let mut bytes = Vec::new();
    kitchen_sink()?.write(&mut bytes)?;
    // Mid-header
    let cut = &bytes[..bytes.len() - 2];
    assert!(GdsLibrary::from_bytes(cut).unwrap_err().is_format());
    // Mid-payload
    let cut = &bytes[..bytes.len() / 2 + 1];
    assert!(GdsLibrary::from_bytes(cut).unwrap_err().is_format());
    // Nothing at all
    assert!(GdsLibrary::from_bytes(&[]).unwrap_err().is_format());
    Ok(())
}
#[test]
fn property_pairs() -> GdsResult<()> {
    use GdsRecordType as T;
    // Over-long values are accepted on read
    let mut body = raw_boundary();
    body.push(GdsRecord::new(T::PropAttr, GdsRecordData::I16(vec![1])));
    body.push(GdsRecord::new(T::PropValue, GdsRecordData::str(vec![b'x'; 200])));
    body.push(GdsRecord::empty(T::EndElement));
    let lib = GdsLibrary::from_bytes(&raw_lib(body)?)?;
    let props = lib.structs[0].elems[0].properties();
    assert_eq!(props.len(), 1);
    assert_eq!(props[0].attr, 1);
    assert_eq!(props[0].value.len(), 200);
    // But not on write
    let mut dest = Vec::new();
    assert!(matches!(lib.write(&mut dest), Err(GdsError::Value(_))));
    assert!(dest.is_empty());

    // PROPATTR must be followed by PROPVALUE
    let mut body = raw_boundary();
    body.push(GdsRecord::new(T::PropAttr, GdsRecordData::I16(vec![1])));
    body.push(GdsRecord::empty(T::EndElement));
    assert!(GdsLibrary::from_bytes(&raw_lib(body)?)
        .unwrap_err()
        .is_format());
    Ok(())
}
#[test]
fn invalid_content() -> GdsResult<()> {
    // Missing required attribute
    assert!(matches!(
        GdsBoundaryBuilder::default().layer(0).build(),
        Err(GdsError::Value(_))
    ));
    // Empty point-list
    let mut lib = empty_lib();
    let mut cell = GdsStruct::new("cell");
    cell.elems.push(GdsBoundary::default().into());
    lib.structs.push(cell);
    assert!(matches!(lib.validate(), Err(GdsError::Value(_))));
    // Unencodable real
    let mut lib = empty_lib();
    lib.units = GdsUnits(f64::NAN, 1e-9);
    assert!(matches!(lib.validate(), Err(GdsError::Range(_))));
    let mut dest = Vec::new();
    assert!(lib.write(&mut dest).is_err());
    assert!(dest.is_empty());
    Ok(())
}
#[test]
fn atomic_save() -> GdsResult<()> {
    let dir = tempdir()?;
    let fname = dir.path().join("lib.gds");
    std::fs::write(&fname, b"precious")?;

    // Failed saves leave the destination, and its directory, untouched
    let mut lib = empty_lib();
    lib.units = GdsUnits(f64::INFINITY, 1e-9);
    assert!(lib.save(&fname).is_err());
    assert_eq!(std::fs::read(&fname)?, b"precious");
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);

    // Successful ones replace it
    let lib = kitchen_sink()?;
    lib.save(&fname)?;
    assert_eq!(GdsLibrary::open(&fname)?, lib);
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
    Ok(())
}
#[test]
fn struct_iter() -> GdsResult<()> {
    let lib = kitchen_sink()?;
    let dir = tempdir()?;
    let fname = dir.path().join("lib.gds");
    lib.save(&fname)?;

    let mut iter = GdsLibrary::structs_iter(std::fs::File::open(&fname)?)?;
    assert_eq!(iter.library().name, "kitchen_sink");
    assert!(iter.library().structs.is_empty());
    let first = iter.next().unwrap()?;
    assert_eq!(first, lib.structs[0]);

    assert_eq!(GdsStructIter::open(&fname)?.collect_lib()?, lib);
    Ok(())
}
#[test]
fn struct_iter_errors() -> GdsResult<()> {
    let mut bytes = Vec::new();
    kitchen_sink()?.write(&mut bytes)?;
    bytes.truncate(bytes.len() - 20);
    let mut iter = GdsStructIter::new(&bytes[..])?;
    assert!(iter.next().unwrap().is_ok());
    assert!(iter.next().unwrap().is_err());
    // Fused after the first error
    assert!(iter.next().is_none());
    Ok(())
}
#[test]
fn scan() -> GdsResult<()> {
    // First-pass scanning, then reading single structs
    let lib = kitchen_sink()?;
    let dir = tempdir()?;
    let fname = dir.path().join("lib.gds");
    lib.save(&fname)?;
    let bytes = std::fs::read(&fname)?;

    let scans = GdsLibrary::scan(&fname)?;
    let names: Vec<&str> = scans.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["leaf", "top"]);
    for (scan, strukt) in scans.iter().zip(lib.structs.iter()) {
        // Starting at BGNSTR, ending past ENDSTR
        assert_eq!(bytes[scan.start as usize + 2], GdsRecordType::BgnStruct as u8);
        assert_eq!(bytes[scan.end as usize - 2], GdsRecordType::EndStruct as u8);
        assert_eq!(GdsLibrary::read_struct(&fname, scan)?, *strukt);
    }
    assert_eq!(scans[0].end, scans[1].start);
    Ok(())
}
#[test]
fn scan_errors() -> GdsResult<()> {
    use GdsRecordType as T;
    // Nested BGNSTR
    let mut records = raw_head();
    records.push(GdsRecord::new(T::BgnStruct, GdsRecordData::I16(test_dates().encode())));
    records.push(GdsRecord::empty(T::EndStruct));
    records.push(GdsRecord::empty(T::EndLib));
    let bytes = encode(&records)?;
    let mut scanner = GdsScanner::new(Cursor::new(bytes))?;
    assert!(scanner.scan_lib().unwrap_err().is_format());

    // Unterminated struct
    let mut records = raw_head();
    records.push(GdsRecord::empty(T::EndLib));
    let bytes = encode(&records)?;
    let mut scanner = GdsScanner::new(Cursor::new(bytes))?;
    assert!(scanner.scan_lib().unwrap_err().is_format());

    // Missing HEADER
    let bytes = encode(&raw_head()[1..])?;
    let mut scanner = GdsScanner::new(Cursor::new(bytes))?;
    assert!(scanner.scan_lib().unwrap_err().is_format());
    Ok(())
}
#[test]
fn dumps_records() -> GdsResult<()> {
    let mut bytes = Vec::new();
    kitchen_sink()?.write(&mut bytes)?;
    let numrecords = decode_all(&bytes)?.len();

    let mut dest = Vec::new();
    GdsRecordStream::new(&bytes[..]).dump(&mut dest)?;
    let dumped: serde_json::Value = serde_json::from_slice(&dest).unwrap();
    let entries = dumped.as_array().unwrap();
    assert_eq!(entries.len(), numrecords);
    assert_eq!(entries[0][1]["rtype"], "Header");
    assert_eq!(entries[numrecords - 1][0], numrecords - 1);
    assert_eq!(entries[numrecords - 1][1]["rtype"], "EndLib");
    Ok(())
}
#[test]
fn stats() -> GdsResult<()> {
    let lib = kitchen_sink()?;
    assert_eq!(
        lib.stats(),
        GdsStats {
            libraries: 1,
            structs: 2,
            boundaries: 1,
            paths: 1,
            struct_refs: 1,
            array_refs: 1,
            text_elems: 1,
            nodes: 1,
            boxes: 1,
        }
    );
    Ok(())
}
#[test]
fn flags() -> GdsResult<()> {
    let strans = GdsStrans {
        reflected: true,
        abs_angle: true,
        ..Default::default()
    };
    assert_eq!(strans.bits(), 0x8002);
    assert_eq!(GdsStrans::from_bits(0x8002), strans);
    let pres = GdsPresentation::new(1, 1, 2);
    assert_eq!(pres.0, 0x0016);
    assert_eq!((pres.font(), pres.vjust(), pres.hjust()), (1, 1, 2));
    let flags = GdsElemFlags(0x0002);
    assert!(!flags.template());
    assert!(flags.external());
    Ok(())
}
#[test]
fn dates() -> GdsResult<()> {
    let dt = NaiveDate::from_ymd_opt(2022, 3, 4)
        .and_then(|d| d.and_hms_opt(5, 6, 7))
        .unwrap();
    let gds = GdsDateTime::from(dt);
    assert_eq!(gds.encode(), [2022, 3, 4, 5, 6, 7]);
    assert_eq!(NaiveDateTime::try_from(gds)?, dt);
    // Years before 1900 are offsets from it
    let gds = GdsDateTime::from(&[122, 3, 4, 5, 6, 7]);
    assert_eq!(NaiveDateTime::try_from(gds)?, dt);
    // Invalid dates survive as raw values, but do not convert
    let gds = GdsDateTime::from(&[0, 30, 0, 99, 0, 0]);
    assert!(matches!(NaiveDateTime::try_from(gds), Err(GdsError::Value(_))));
    let mut lib = empty_lib();
    lib.dates.modified = gds;
    roundtrip(&lib)?;

    assert!(GdsDateTimes::decode(&[0; 11]).unwrap_err().is_format());

    // Out-of-range years saturate
    let far = NaiveDate::from_ymd_opt(40000, 1, 2)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    assert_eq!(GdsDateTime::from(far).encode(), [i16::MAX, 1, 2, 0, 0, 0]);

    // Setting all dates
    let mut lib = kitchen_sink()?;
    lib.set_all_dates(dt);
    assert_eq!(lib.dates.accessed, GdsDateTime::from(dt));
    for strukt in lib.structs.iter() {
        assert_eq!(strukt.dates.modified, GdsDateTime::from(dt));
    }
    Ok(())
}
#[test]
fn units() -> GdsResult<()> {
    let units = GdsUnits::default();
    assert_eq!(units, GdsUnits(1e-3, 1e-9));
    assert_eq!(units.db_unit(), 1e-9);
    assert!((units.user_unit() - 1e-6).abs() < 1e-18);
    assert_eq!(units.to_db(1.5)?, 1500);
    assert_eq!(units.to_db(-0.0004)?, 0);
    assert!((units.to_user(2000) - 2.0).abs() < 1e-12);
    assert!(matches!(units.to_db(1e10), Err(GdsError::Range(_))));
    Ok(())
}
#[test]
fn text_formats() -> GdsResult<()> {
    // Save and re-load via JSON and YAML
    let lib = kitchen_sink()?;
    let dir = tempdir()?;
    for (fmt, fname) in [(Json, "lib.json"), (Yaml, "lib.yaml")] {
        let fname = dir.path().join(fname);
        fmt.save(&lib, &fname)?;
        let lib2: GdsLibrary = fmt.open(&fname)?;
        assert_eq!(lib2, lib);
    }
    Ok(())
}
