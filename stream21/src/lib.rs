//!
//! # Stream21 GDSII Stream Reader & Writer
//!
//! GDSII is the IC industry's de facto standard for storing and sharing layout data,
//! for mask-making and electron-beam lithography alike.
//! Stream21 reads and writes GDSII Stream data, storing it on GDSII's terms,
//! using GDSII's idioms and naming conventions.
//! Reading and generating byte-exact GDSII are primary goals;
//! geometric manipulation of the resulting data is not.
//!
//! Layout data is represented in three primary forms:
//!
//! * A short tree with three layers:
//!   * The root is a [GdsLibrary], which primarily consists of a set of cells ([GdsStruct]s), and secondarily a set of metadata.
//!     Each [GdsLibrary] is a universe unto itself, in that it has no mechanisms for comprehending layout cells or data defined outside itself.
//!     On-disk each [GdsLibrary] is typically paired one-to-one with a `.gds` file.
//!   * Libraries consist of cell definitions AKA [GdsStruct]s, which define each layout cell (or module, or "struct" in GDSII terms).
//!   * Cells consist of [GdsElement]s, an enumeration which includes individual polygons ([GdsBoundary]),
//!     instances of other layout cells ([GdsStructRef]), text ([GdsTextElem]), and a few other geometric elements.
//! * For storage, the [GdsLibrary] tree is flattened to a series of [GdsRecord]s.
//!   These records indicate the beginning, end, and content of each tree-node.
//!   The order and optionality of each type's records is declared once, in the [schema] tables,
//!   and shared by reading, writing, and validation.
//! * Records are stored in binary form, each with a length, record-type, and data-type header.
//!   These raw-bytes are never stored by Stream21, only generated and consumed on their way into and out of
//!   [Read](std::io::Read) and [Write](std::io::Write) objects (typically files).
//!
//! ## Alternate Serialization
//!
//! Each element in Stream21's [GdsLibrary] tree is [serde]-serializable,
//! and [GdsLibrary] and [GdsStruct] can be saved to and loaded from JSON, YAML, and TOML files
//! via [stream21utils::SerdeFile].
//! Note these text-based representations will generally be substantially larger than binary GDSII data.
//!
//! ## Usage
//!
//! Loading a [GdsLibrary] from disk:
//!
//! ```skip
//! let lib = GdsLibrary::open("sample.gds")?;
//! ```
//!
//! Creating a new and empty [GdsLibrary], and adding a [GdsStruct] cell-definition:
//!
//! ```
//! use stream21::{GdsLibrary, GdsStruct};
//! let mut lib = GdsLibrary::new("mylib");
//! lib.structs.push(GdsStruct::new("mycell"));
//! ```
//!
//! Saving a [GdsLibrary] to disk:
//!
//! ```skip
//! lib.save("mylib.gds")?;
//! ```
//!
//! Reading one struct at a time, from a library too large to hold in memory:
//!
//! ```skip
//! for strukt in GdsStructIter::open("huge.gds")? {
//!     println!("{}", strukt?.name);
//! }
//! ```
//!
//! ## Logging
//!
//! Stream21 emits [tracing] events: `debug` for file-level operations,
//! `trace` per record, and `warn` for tolerated irregularities in read data.
//! Installing a subscriber is left to the application.
//!

pub mod data;
pub mod error;
pub mod read;
pub mod record;
pub mod schema;
pub mod write;

pub use data::*;
pub use error::*;
pub use read::*;
pub use record::*;
pub use schema::GdsSchema;
pub use write::*;

#[cfg(any(test, feature = "selftest"))]
/// Check `lib` matches across a write-read round-trip cycle
pub fn roundtrip(lib: &GdsLibrary) -> GdsResult<()> {
    use std::io::{Read, Seek, SeekFrom};
    use tempfile::tempfile;

    // Write to a temporary file
    let mut file = tempfile()?;
    lib.write(&mut file)?;

    // Rewind to the file-start, and read it back
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let lib2 = GdsLibrary::from_bytes(&bytes)?;

    // And check the two line up
    assert_eq!(*lib, lib2);
    Ok(())
}

#[cfg(test)]
mod tests;
