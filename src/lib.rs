//! Longan - a Rust library for reading and writing OLE2 Compound File
//! Binary containers
//!
//! The compound file format is a miniature filesystem inside one file:
//! fixed-size sectors, allocation tables chaining them into streams, and a
//! directory tree naming those streams. Legacy Office binary formats
//! (.doc, .xls, .ppt) store their record streams in such containers. This
//! crate implements the container layer only: it reconstructs and writes
//! named byte streams and never interprets their contents.
//!
//! # Features
//!
//! - **Reader**: header validation, FAT/MiniFAT/DIFAT resolution, directory
//!   tree with case-insensitive path lookup, whole-stream materialization
//! - **Open-time audit**: every chain is resolved once on open, so a broken
//!   allocation table surfaces immediately instead of corrupting reads
//! - **Writer**: staged streams and storages serialized into a fresh
//!   container, mini stream packing, DIFAT overflow for large files
//! - **Round-trip fidelity**: root CLSID, nested storages, and allocator
//!   placement survive open, rewrite, and reopen
//!
//! # Example - reading streams
//!
//! ```no_run
//! use longan::CompoundFile;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = CompoundFile::open_path("book.xls")?;
//! for path in file.stream_paths() {
//!     println!("Stream: {}", path);
//! }
//! let workbook = file.get_stream("Workbook")?;
//! println!("{} bytes", workbook.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Example - building a container
//!
//! ```
//! use longan::CompoundFile;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut file = CompoundFile::create_empty()?;
//! file.put_stream("Workbook", b"record bytes")?;
//! file.put_stream("Macros/VBA/Module1", b"Sub Main")?;
//!
//! let mut buffer = Vec::new();
//! file.write(&mut buffer)?;
//! # Ok(())
//! # }
//! ```

/// Constants for the container format
pub mod consts;

/// Error types
pub mod error;

/// Header parsing
pub mod header;

/// Sector store and bound sector views
pub mod sector;

/// Allocation-table chain resolution (FAT and MiniFAT)
pub mod alloc;

/// Directory tree parsing and path lookup
pub mod dir;

/// The compound file facade
pub mod file;

/// Container writing
pub mod writer;

// Re-export public types for convenient access
pub use alloc::{AllocTable, SectorChain, SectorClass};
pub use dir::{DirTree, Entry, EntryKind};
pub use error::{Error, Result};
pub use file::{CompoundFile, is_compound_file};
pub use header::Header;
pub use sector::{Block, SectorRole, SectorStore};
pub use writer::ContainerWriter;
