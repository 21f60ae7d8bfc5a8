//!
//! # Stream21 Byte-Encoding and Writing
//!

// Std-Lib Imports
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

// Crates.io
use tracing::trace;

// Local Imports
use crate::data::{GdsLibrary, GdsStruct};
use crate::error::GdsResult;
use crate::record::{GdsRecord, GdsRecordData, GdsRecordType, MAX_XY_POINTS};
use crate::schema::GdsSchema;

///
/// # Gds Record Sink
///
/// Appends encoded records to a [Write] destination, in call order.
/// Point-lists too long for a single `XY` record are split across consecutive ones.
///
pub struct GdsRecordSink<W> {
    /// Write Destination
    dest: W,
    /// Number of records written
    numwritten: usize,
    /// Number of bytes written
    bytepos: u64,
}
impl<W: Write> GdsRecordSink<W> {
    /// Create a new [GdsRecordSink] to destination `dest`
    pub fn new(dest: W) -> Self {
        Self {
            dest,
            numwritten: 0,
            bytepos: 0,
        }
    }
    /// Encode and write a record of type `rtype` with payload `data`
    pub fn emit(&mut self, rtype: GdsRecordType, data: GdsRecordData) -> GdsResult<()> {
        match data {
            GdsRecordData::I32(xy)
                if rtype == GdsRecordType::Xy && xy.len() > 2 * MAX_XY_POINTS =>
            {
                let chunks = xy.chunks(2 * MAX_XY_POINTS);
                trace!(points = xy.len() / 2, records = chunks.len(), "splitting XY");
                for chunk in chunks {
                    self.write_record(&GdsRecord::new(rtype, GdsRecordData::I32(chunk.to_vec())))?;
                }
                Ok(())
            }
            data => self.write_record(&GdsRecord::new(rtype, data)),
        }
    }
    /// Encode and write a single `record`
    pub fn write_record(&mut self, record: &GdsRecord) -> GdsResult<()> {
        let len = record.encode(&mut self.dest)?;
        self.numwritten += 1;
        self.bytepos += len as u64;
        trace!(rtype = ?record.rtype, len, "encoded record");
        Ok(())
    }
    /// Get the number of records written
    pub fn numwritten(&self) -> usize {
        self.numwritten
    }
    /// Get the number of bytes written
    pub fn bytepos(&self) -> u64 {
        self.bytepos
    }
    /// Flush the destination
    pub fn flush(&mut self) -> GdsResult<()> {
        self.dest.flush()?;
        Ok(())
    }
    /// Consume the sink, returning its destination
    pub fn into_inner(self) -> W {
        self.dest
    }
}

///
/// # Gds Writer
///
/// Writes [GdsLibrary]s, either whole via [GdsWriter::write_lib],
/// or incrementally, one [GdsStruct] at a time:
/// [GdsWriter::begin_lib], then [GdsWriter::write_struct] per struct, then [GdsWriter::end_lib].
///
pub struct GdsWriter<W> {
    sink: GdsRecordSink<W>,
}
impl GdsWriter<BufWriter<File>> {
    /// Create new [GdsWriter] with destination file `fname`
    pub fn open(fname: impl AsRef<Path>) -> GdsResult<Self> {
        let file = BufWriter::new(File::create(fname)?);
        Ok(Self::new(file))
    }
}
impl<W: Write> GdsWriter<W> {
    /// Create a new [GdsWriter] to destination `dest`
    pub fn new(dest: W) -> Self {
        Self {
            sink: GdsRecordSink::new(dest),
        }
    }
    /// Write a [GdsLibrary] to the destination.
    /// The library is validated first, so that invalid content writes nothing.
    pub fn write_lib(&mut self, lib: &GdsLibrary) -> GdsResult<()> {
        GdsSchema::validate(lib)?;
        GdsSchema::save(lib, &mut self.sink)
    }
    /// Write the library-level records of `lib`, ignoring its `structs`.
    /// The records are checked first, so that invalid content writes nothing.
    pub fn begin_lib(&mut self, lib: &GdsLibrary) -> GdsResult<()> {
        lib.validate_head()?;
        lib.save_head(&mut self.sink)
    }
    /// Write [GdsStruct] `strukt` to the destination
    pub fn write_struct(&mut self, strukt: &GdsStruct) -> GdsResult<()> {
        strukt.validate()?;
        strukt.save(&mut self.sink)
    }
    /// Write the library terminator
    pub fn end_lib(&mut self) -> GdsResult<()> {
        GdsLibrary::save_tail(&mut self.sink)?;
        self.flush()
    }
    /// Flush the destination
    pub fn flush(&mut self) -> GdsResult<()> {
        self.sink.flush()
    }
    /// Consume the writer, returning its destination
    pub fn into_inner(self) -> W {
        self.sink.into_inner()
    }
}
