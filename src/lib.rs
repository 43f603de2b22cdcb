//! lazyzip reads a ZIP archive out of an in-memory buffer
//! and only decompresses the entries you ask for:
//!
//! ```no_run
//! # use std::fs;
//! # use lazyzip::*;
//! let bytes = fs::read("foo.zip")?;
//! let archive = ZipArchive::new(&bytes);
//!
//! for entry in archive.entries()? {
//!     let entry = entry?;
//!     if entry.is_file() {
//!         // Decompressed now, and cached for next time.
//!         let contents = entry.data()?;
//!         println!("{}: {} bytes", entry.file_name(), contents.len());
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The library doesn't implement DEFLATE itself.
//! [`ZipArchive::new()`] uses flate2, but any inflater can be plugged in:
//!
//! ```no_run
//! # use std::io;
//! # use lazyzip::*;
//! # let bytes: Vec<u8> = Vec::new();
//! let archive = ZipArchive::with_inflater(&bytes, |raw: &[u8]| -> io::Result<Vec<u8>> {
//!     my_favorite_inflate(raw)
//! });
//! # fn my_favorite_inflate(raw: &[u8]) -> io::Result<Vec<u8>> { Ok(raw.to_vec()) }
//! ```
//!
//! A ZIP archive keeps its table of contents, the _central directory_,
//! at the very end of the file, after the compressed files themselves.
//! We find it by searching backwards for the End of central directory record,
//! walk the central directory, and peek at each file's local header
//! to find where its data starts. Data is only read when an [`Entry`] asks.

pub mod cursor;
pub mod inflate;
pub mod read;
pub mod result;
pub mod spec;

pub use inflate::Inflate;
pub use read::CompressionMethod;
pub use read::{Entries, Entry, ZipArchive};
pub use result::{ZipError, ZipResult};
