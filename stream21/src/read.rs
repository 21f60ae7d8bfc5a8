//!
//! # Stream21 Reading & Scanning
//!

// Std-Lib Imports
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::mem;
use std::path::Path;

// Crates.io
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

// Workspace Imports
use stream21utils::ser::Error as SerError;
use stream21utils::ErrorHelper;

// Local Imports
use crate::data::{open_mmap, GdsLibrary, GdsStruct};
use crate::error::{GdsContext, GdsError, GdsPosition, GdsResult};
use crate::record::{GdsRecord, GdsRecordData, GdsRecordHeader, GdsRecordType};
use crate::schema::GdsSchema;

/// Convert reading errors, mapping a premature end-of-source to [GdsError::Format]
fn read_err(e: io::Error) -> GdsError {
    match e.kind() {
        io::ErrorKind::UnexpectedEof => GdsError::format("unexpected end of GDSII stream"),
        _ => GdsError::Io(e),
    }
}

/// # GdsRecordReader
/// Byte-level record decoder, over any [Read] source.
/// Tracks its byte-offset for error reporting and scanning.
pub struct GdsRecordReader<R> {
    /// Source being read
    src: R,
    /// Payload read buffer
    buf: Vec<u8>,
    /// Byte offset into `src`
    bytepos: u64,
}
impl<R: Read> GdsRecordReader<R> {
    /// Create a [GdsRecordReader] at the start of `src`
    pub fn new(src: R) -> Self {
        Self::with_offset(src, 0)
    }
    /// Create a [GdsRecordReader] of `src`, which is already `bytepos` bytes into its content
    pub fn with_offset(src: R, bytepos: u64) -> Self {
        Self {
            src,
            buf: Vec::with_capacity(1024),
            bytepos,
        }
    }
    /// Get the current byte offset
    pub fn bytepos(&self) -> u64 {
        self.bytepos
    }
    /// Read and decode the next record-header
    pub fn read_header(&mut self) -> GdsResult<GdsRecordHeader> {
        let mut bytes = [0; 4];
        self.src.read_exact(&mut bytes).map_err(read_err)?;
        self.bytepos += 4;
        GdsRecordHeader::decode(bytes)
    }
    /// Read and decode the payload described by `header`
    pub fn read_data(&mut self, header: &GdsRecordHeader) -> GdsResult<GdsRecordData> {
        let len = usize::from(header.len);
        self.buf.resize(len, 0);
        self.src.read_exact(&mut self.buf[..len]).map_err(read_err)?;
        self.bytepos += len as u64;
        GdsRecordData::decode(header.dtype, &self.buf[..len])
    }
    /// Read the next binary-encoded [GdsRecord].
    /// Returns a [GdsError] if `src` is not on a record-boundary,
    /// or if binary decoding otherwise fails.
    pub fn read_record(&mut self) -> GdsResult<GdsRecord> {
        let header = self.read_header()?;
        let data = self.read_data(&header)?;
        trace!(rtype = ?header.rtype, len = header.len, "decoded record");
        Ok(GdsRecord::new(header.rtype, data))
    }
}
impl<R: Read + Seek> GdsRecordReader<R> {
    /// Skip over `len` payload bytes
    pub fn skip(&mut self, len: u16) -> GdsResult<()> {
        self.src.seek(SeekFrom::Current(i64::from(len)))?;
        self.bytepos += u64::from(len);
        Ok(())
    }
}

///
/// # Gds Record Stream
///
/// Single-lookahead cursor over a source's records.
/// [GdsRecordStream::current] is the record under examination;
/// [GdsRecordStream::advance] replaces it with the next.
///
/// Runs of consecutive `XY` records are merged into one logical record before being exposed,
/// undoing the splitting of long point-lists on write.
/// Finding the end of such a run requires reading one record past it,
/// which is held internally and served by the following `advance`.
///
pub struct GdsRecordStream<R> {
    /// Record reader
    rdr: GdsRecordReader<R>,
    /// Current record
    current: Option<GdsRecord>,
    /// Record read past the end of an `XY` run, not yet exposed
    held: Option<GdsRecord>,
    /// Number of records read
    numread: usize,
    /// Context Stack
    ctx_stack: Vec<GdsContext>,
}
impl GdsRecordStream<Cursor<Mmap>> {
    /// Create a new [GdsRecordStream] for the file at path `fname`
    pub fn open(fname: impl AsRef<Path>) -> GdsResult<Self> {
        Ok(Self::new(open_mmap(fname)?))
    }
}
impl<R: Read> GdsRecordStream<R> {
    /// Create a new [GdsRecordStream] at the start of `src`.
    /// No record is read until the first call to [GdsRecordStream::advance].
    pub fn new(src: R) -> Self {
        Self::from_reader(GdsRecordReader::new(src))
    }
    /// Create a new [GdsRecordStream] of `src`, which is already `bytepos` bytes into its content
    pub fn with_offset(src: R, bytepos: u64) -> Self {
        Self::from_reader(GdsRecordReader::with_offset(src, bytepos))
    }
    fn from_reader(rdr: GdsRecordReader<R>) -> Self {
        Self {
            rdr,
            current: None,
            held: None,
            numread: 0,
            ctx_stack: Vec::new(),
        }
    }
    /// Get the current record. `None` before the first [GdsRecordStream::advance].
    pub fn current(&self) -> Option<&GdsRecord> {
        self.current.as_ref()
    }
    /// Get the current record's type
    pub fn tag(&self) -> Option<GdsRecordType> {
        self.current.as_ref().map(|r| r.rtype)
    }
    /// Decode the next record, making it current.
    /// Once an `ENDLIB` is current, it remains so forever, and nothing past it is read.
    pub fn advance(&mut self) -> GdsResult<()> {
        if self.tag() == Some(GdsRecordType::EndLib) {
            return Ok(());
        }
        let mut record = match self.held.take() {
            Some(r) => r,
            None => self.read()?,
        };
        if record.rtype == GdsRecordType::Xy {
            // Merge any immediately-following XY records
            let mut merged = 0;
            loop {
                let next = self.read()?;
                match (&mut record.data, next) {
                    (
                        GdsRecordData::I32(xy),
                        GdsRecord {
                            rtype: GdsRecordType::Xy,
                            data: GdsRecordData::I32(more),
                        },
                    ) => {
                        xy.extend(more);
                        merged += 1;
                    }
                    (_, next) => {
                        self.held = Some(next);
                        break;
                    }
                }
            }
            if merged > 0 {
                trace!(records = merged + 1, "merged XY records");
            }
        }
        self.current = Some(record);
        Ok(())
    }
    /// Require the current record be of type `rtype`
    pub fn expect(&self, rtype: GdsRecordType) -> GdsResult<()> {
        match self.tag() {
            Some(t) if t == rtype => Ok(()),
            Some(t) => self.fail(format!("unexpected record {:?}, expected {:?}", t, rtype)),
            None => self.fail(format!("no current record, expected {:?}", rtype)),
        }
    }
    /// Move the payload out of the current record, leaving it empty
    pub(crate) fn take_data(&mut self) -> GdsResult<GdsRecordData> {
        let data = self.current.as_mut().map(|r| mem::take(&mut r.data));
        self.unwrap(data, "no current record")
    }
    /// Read the next physical record, attaching our position to any errors
    fn read(&mut self) -> GdsResult<GdsRecord> {
        self.numread += 1;
        match self.rdr.read_record() {
            Ok(r) => Ok(r),
            Err(GdsError::Format { msg, pos: None }) => Err(GdsError::Format {
                msg,
                pos: Some(self.position(None)),
            }),
            Err(e) => Err(e),
        }
    }
    /// Get our current [GdsPosition]
    fn position(&self, rtype: Option<GdsRecordType>) -> GdsPosition {
        GdsPosition {
            recordnum: self.numread,
            bytepos: self.rdr.bytepos(),
            rtype,
            ctx: self.ctx_stack.clone(),
        }
    }
    /// Push a new [GdsContext] onto our stack
    pub(crate) fn push_ctx(&mut self, ctx: GdsContext) {
        self.ctx_stack.push(ctx);
    }
    /// Pop the innermost [GdsContext]
    pub(crate) fn pop_ctx(&mut self) {
        self.ctx_stack.pop();
    }
    /// Parse a [GdsLibrary]. Generally the start-state when reading a GDS file.
    pub fn parse_lib(&mut self) -> GdsResult<GdsLibrary> {
        self.advance()?;
        let lib = GdsLibrary::load(self)?;
        debug!(
            "Read GDSII library {} with {} structs",
            lib.name,
            lib.structs.len()
        );
        Ok(lib)
    }
    /// JSON-serialize and write all records through `ENDLIB` to `dest`,
    /// as a list of `[index, record]` entries.
    /// This streams one record at a time, rather than loading all into memory.
    pub fn dump(&mut self, mut dest: impl Write) -> GdsResult<()> {
        writeln!(dest, "[")?;
        let mut index: usize = 0;
        loop {
            self.advance()?;
            let record = self.unwrap(self.current(), "no current record")?;
            let entry = serde_json::to_string(&(index, record)).map_err(SerError::from)?;
            if index > 0 {
                writeln!(dest, ",")?;
            }
            write!(dest, "\t{}", entry)?;
            if record.rtype == GdsRecordType::EndLib {
                break;
            }
            index += 1;
        }
        writeln!(dest, "\n]")?;
        dest.flush()?;
        Ok(())
    }
}
impl<R: Read> ErrorHelper for GdsRecordStream<R> {
    type Error = GdsError;
    fn err(&self, msg: impl Into<String>) -> GdsError {
        GdsError::Format {
            msg: msg.into(),
            pos: Some(self.position(self.tag())),
        }
    }
}

///
/// # Gds Struct Iterator
///
/// Lazy reader of a library's [GdsStruct]s.
/// Creation reads the library-level records; each step then parses and yields one complete struct.
/// Iteration ends after `ENDLIB`, or after the first error.
///
pub struct GdsStructIter<R> {
    /// Record stream
    stream: GdsRecordStream<R>,
    /// Library-level content, absent its structs
    lib: GdsLibrary,
    /// Set after `ENDLIB` or any error
    done: bool,
}
impl GdsStructIter<Cursor<Mmap>> {
    /// Open the file at path `fname`
    pub fn open(fname: impl AsRef<Path>) -> GdsResult<Self> {
        Self::new(open_mmap(fname)?)
    }
}
impl<R: Read> GdsStructIter<R> {
    /// Create a [GdsStructIter], reading the library-level records of `src`
    pub fn new(src: R) -> GdsResult<Self> {
        let mut stream = GdsRecordStream::new(src);
        stream.advance()?;
        let lib = GdsLibrary::load_head(&mut stream)?;
        Ok(Self {
            stream,
            lib,
            done: false,
        })
    }
    /// Get the library-level content. Its `structs` list is always empty.
    pub fn library(&self) -> &GdsLibrary {
        &self.lib
    }
    /// Consume all remaining structs, returning a complete [GdsLibrary]
    pub fn collect_lib(self) -> GdsResult<GdsLibrary> {
        let mut lib = self.lib.clone();
        for strukt in self {
            lib.structs.push(strukt?);
        }
        Ok(lib)
    }
    fn step(&mut self) -> GdsResult<Option<GdsStruct>> {
        match self.stream.tag() {
            Some(GdsRecordType::BgnStruct) => Ok(Some(GdsStruct::load(&mut self.stream)?)),
            Some(GdsRecordType::EndLib) => {
                GdsLibrary::load_tail(&mut self.stream)?;
                Ok(None)
            }
            Some(t) => self.stream.fail(format!("unexpected record {:?} in library", t)),
            None => self.stream.fail("no current record"),
        }
    }
}
impl<R: Read> Iterator for GdsStructIter<R> {
    type Item = GdsResult<GdsStruct>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let rv = self.step();
        if !matches!(rv, Ok(Some(_))) {
            self.done = true;
        }
        rv.transpose()
    }
}

/// # GdsStructScan
/// Typically generated by first-pass scanning.
/// Stores a struct name and byte-offsets in its source.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GdsStructScan {
    /// Struct Name
    pub name: String,
    /// Starting byte offset, at beginning of its `BGNSTR` record
    pub start: u64,
    /// Ending byte offset, just past its `ENDSTR` record
    pub end: u64,
}

/// # GdsScanner
/// Scans a source for [GdsStruct] definitions,
/// creating a first-pass list of their names and byte-locations.
/// Payloads other than struct names are skipped without decoding.
pub struct GdsScanner<R> {
    /// Record reader
    rdr: GdsRecordReader<R>,
    /// Number of records read
    numread: usize,
    /// Most recent record-type
    rtype: Option<GdsRecordType>,
}
impl<R: Read + Seek> GdsScanner<R> {
    /// Create a new [GdsScanner], starting from the current position of `src`
    pub fn new(mut src: R) -> GdsResult<Self> {
        let pos = src.stream_position()?;
        Ok(Self {
            rdr: GdsRecordReader::with_offset(src, pos),
            numread: 0,
            rtype: None,
        })
    }
    /// Read the next record-header
    fn next(&mut self) -> GdsResult<GdsRecordHeader> {
        self.numread += 1;
        let header = match self.rdr.read_header() {
            Ok(h) => h,
            Err(GdsError::Format { msg, pos: None }) => return self.fail(msg),
            Err(e) => return Err(e),
        };
        self.rtype = Some(header.rtype);
        Ok(header)
    }
    /// Scan the library for struct definitions
    pub fn scan_lib(&mut self) -> GdsResult<Vec<GdsStructScan>> {
        let header = self.next()?;
        self.assert(
            header.rtype == GdsRecordType::Header,
            "missing HEADER record",
        )?;
        self.rdr.skip(header.len)?;

        let mut scans = Vec::new();
        let mut open: Option<GdsStructScan> = None;
        loop {
            let start = self.rdr.bytepos();
            let header = self.next()?;
            match header.rtype {
                GdsRecordType::BgnStruct => {
                    self.assert(open.is_none(), "nested BGNSTR")?;
                    open = Some(GdsStructScan {
                        start,
                        ..Default::default()
                    });
                    self.rdr.skip(header.len)?;
                }
                GdsRecordType::StructName if open.is_some() => {
                    let name = self.rdr.read_data(&header)?.into_string()?;
                    if let Some(s) = open.as_mut() {
                        s.name = name;
                    }
                }
                GdsRecordType::EndStruct => {
                    let mut s = self.unwrap(open.take(), "ENDSTR outside a struct")?;
                    self.rdr.skip(header.len)?;
                    s.end = self.rdr.bytepos();
                    scans.push(s);
                }
                GdsRecordType::EndLib => {
                    self.assert(open.is_none(), "unterminated struct at ENDLIB")?;
                    break;
                }
                _ => self.rdr.skip(header.len)?,
            }
        }
        debug!("Scanned {} structs", scans.len());
        Ok(scans)
    }
}
impl<R> ErrorHelper for GdsScanner<R> {
    type Error = GdsError;
    fn err(&self, msg: impl Into<String>) -> GdsError {
        GdsError::Format {
            msg: msg.into(),
            pos: Some(GdsPosition {
                recordnum: self.numread,
                bytepos: self.rdr.bytepos,
                rtype: self.rtype,
                ctx: Vec::new(),
            }),
        }
    }
}
