//! Tools for reading a ZIP archive.
//!
//! To start reading an archive, first create a [`ZipArchive`] from its bytes,
//! then walk its [`entries()`](ZipArchive::entries).
//! Nothing is decompressed until an [`Entry`] is asked for its data.

use std::borrow::Cow;
use std::cell::OnceCell;
use std::fmt;
use std::iter::FusedIterator;

use camino::Utf8Path;
use chrono::NaiveDateTime;
use log::*;

use crate::cursor::ByteCursor;
use crate::inflate::{Deflate, Inflate};
use crate::result::*;
use crate::spec;

/// The compression method used to store a file
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompressionMethod {
    /// The file is uncompressed
    None,
    /// The file is [DEFLATE](https://en.wikipedia.org/wiki/DEFLATE)d.
    /// This is the most common format used by ZIP archives.
    Deflate,
    /// The file is compressed with a yet-unsupported format.
    /// (The u16 indicates the internal format code.)
    Unsupported(u16),
}

/// A ZIP archive to be read
///
/// The archive only ever reads from its buffer, so it can be shared between
/// threads and have several entries read out of it at once.
pub struct ZipArchive<'a> {
    /// The contents of the ZIP archive, as a byte slice.
    mapping: &'a [u8],
    /// Decompresses DEFLATE'd entries
    inflater: Box<dyn Inflate + 'a>,
}

impl fmt::Debug for ZipArchive<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipArchive")
            .field("len", &self.mapping.len())
            .finish_non_exhaustive()
    }
}

impl<'a> ZipArchive<'a> {
    /// Prepares to read a ZIP archive from a byte slice,
    /// inflating DEFLATE'd entries with flate2.
    ///
    /// ```no_run
    /// # use std::fs;
    /// # use lazyzip::*;
    /// let bytes = fs::read("foo.zip")?;
    /// let archive = ZipArchive::new(&bytes);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(mapping: &'a [u8]) -> Self {
        Self::with_inflater(mapping, Deflate)
    }

    /// Like `ZipArchive::new()`, but with a caller-provided way to inflate
    /// DEFLATE'd entries.
    ///
    /// Nothing is parsed until [`entries()`](Self::entries) is called.
    pub fn with_inflater<I: Inflate + 'a>(mapping: &'a [u8], inflater: I) -> Self {
        Self {
            mapping,
            inflater: Box::new(inflater),
        }
    }

    /// The raw bytes of the archive
    pub fn as_bytes(&self) -> &'a [u8] {
        self.mapping
    }

    /// Finds the central directory and returns an iterator over its entries,
    /// in the order they're listed there.
    ///
    /// The iterator can only be walked once;
    /// call `entries()` again to start over.
    /// No effort is made to deduplicate or otherwise validate the entries.
    pub fn entries(&self) -> ZipResult<Entries<'_, 'a>> {
        let mut cursor = ByteCursor::new(self.mapping);
        spec::find_eocdr(&mut cursor)?;
        let eocdr = spec::EndOfCentralDirectory::parse(&mut cursor)?;
        trace!("{:?}", eocdr);

        if eocdr.disk_number != eocdr.disk_with_central_directory {
            return Err(ZipError::UnsupportedArchive(format!(
                "No support for multi-disk archives: disk ({}) != disk with central directory ({})",
                eocdr.disk_number, eocdr.disk_with_central_directory
            )));
        }
        if eocdr.entries != eocdr.entries_on_this_disk {
            return Err(ZipError::UnsupportedArchive(format!(
                "No support for multi-disk archives: entries ({}) != entries this disk ({})",
                eocdr.entries, eocdr.entries_on_this_disk
            )));
        }

        trace!(
            "{} entries at offset {}",
            eocdr.entries_on_this_disk,
            eocdr.central_directory_offset
        );
        cursor.seek(eocdr.central_directory_offset as usize);

        Ok(Entries {
            archive: self,
            cursor,
            remaining: eocdr.entries_on_this_disk,
            eocdr,
        })
    }

    /// Reads `compressed_size` bytes starting at `offset`
    /// and decompresses them with the given method.
    ///
    /// This doesn't touch any shared state, so it's fine to call
    /// from several threads at once.
    pub fn read_payload(
        &self,
        offset: usize,
        compressed_size: usize,
        method: CompressionMethod,
    ) -> ZipResult<Vec<u8>> {
        let mut cursor = ByteCursor::at(self.mapping, offset);
        let compressed = cursor.bytes(compressed_size)?;
        debug!(
            "Reading {} bytes at {} ({:?})",
            compressed_size, offset, method
        );

        match method {
            CompressionMethod::None => Ok(compressed.to_vec()),
            CompressionMethod::Deflate => Ok(self.inflater.inflate(compressed)?),
            CompressionMethod::Unsupported(code) => {
                Err(ZipError::UnsupportedCompressionMethod(code))
            }
        }
    }

    /// Reads the data descriptor following an entry's compressed data,
    /// if its local header says there is one.
    pub fn read_data_descriptor(&self, entry: &Entry) -> ZipResult<Option<spec::DataDescriptor>> {
        if !spec::has_data_descriptor(entry.flags) {
            return Ok(None);
        }
        let mut cursor = ByteCursor::at(
            self.mapping,
            entry.data_start.saturating_add(entry.compressed_size),
        );
        let descriptor = spec::DataDescriptor::parse(&mut cursor)?;
        trace!("{:?}", descriptor);
        Ok(Some(descriptor))
    }
}

/// Walks the central directory of a [`ZipArchive`], yielding each [`Entry`].
///
/// Stops after the first error.
pub struct Entries<'z, 'a> {
    archive: &'z ZipArchive<'a>,
    cursor: ByteCursor<'a>,
    remaining: u16,
    eocdr: spec::EndOfCentralDirectory<'a>,
}

impl<'z, 'a> Entries<'z, 'a> {
    /// The End of central directory record found while setting up iteration.
    /// Its `file_comment` is the archive's comment.
    pub fn end_of_central_directory(&self) -> &spec::EndOfCentralDirectory<'a> {
        &self.eocdr
    }

    fn next_entry(&mut self) -> ZipResult<Entry<'z, 'a>> {
        let central = spec::CentralDirectoryEntry::parse(&mut self.cursor)?;
        trace!("{:?}", central);

        // The local header's name and extra field can be a different length
        // than the central directory's, so we have to read it to know where
        // the file's data starts.
        let next_central = self.cursor.position();
        self.cursor.seek(central.header_offset as usize);
        let local = spec::LocalFileHeader::parse(&mut self.cursor)?;
        trace!("{:?}", local);
        let data_start = self.cursor.position();
        self.cursor.seek(next_central);

        if cfg!(feature = "check-local-metadata") {
            check_local_metadata(&central, &local)?;
        }

        let entry = Entry {
            archive: self.archive,
            file_name: local.file_name,
            flags: local.flags,
            last_modified_time: local.last_modified_time,
            last_modified_date: local.last_modified_date,
            compression_method: CompressionMethod::from_u16(central.compression_method),
            compressed_size: central.compressed_size as usize,
            size: central.uncompressed_size as usize,
            crc32: central.crc32,
            external_file_attributes: central.external_file_attributes,
            comment: central.file_comment,
            header_offset: central.header_offset as usize,
            data_start,
            data: OnceCell::new(),
        };
        debug!("{:?}", entry);
        Ok(entry)
    }
}

impl<'z, 'a> Iterator for Entries<'z, 'a> {
    type Item = ZipResult<Entry<'z, 'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let next = self.next_entry();
        if next.is_err() {
            self.remaining = 0;
        }
        Some(next)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}

impl FusedIterator for Entries<'_, '_> {}

/// Makes sure the local file header agrees with the central directory
/// about how to read the file.
fn check_local_metadata(
    central: &spec::CentralDirectoryEntry,
    local: &spec::LocalFileHeader,
) -> ZipResult<()> {
    let mismatch = |what: &str, central_value: u32, local_value: u32| {
        ZipError::LocalHeaderMismatch(format!(
            "{} has {} {} in the central directory but {} in its local header",
            central.file_name, what, central_value, local_value
        ))
    };

    if central.compression_method != local.compression_method {
        return Err(mismatch(
            "compression method",
            central.compression_method as u32,
            local.compression_method as u32,
        ));
    }
    // These are zeroed out in the local header when they follow the data.
    if spec::has_data_descriptor(local.flags) {
        return Ok(());
    }
    if central.crc32 != local.crc32 {
        return Err(mismatch("CRC32", central.crc32, local.crc32));
    }
    if central.compressed_size != local.compressed_size {
        return Err(mismatch(
            "compressed size",
            central.compressed_size,
            local.compressed_size,
        ));
    }
    if central.uncompressed_size != local.uncompressed_size {
        return Err(mismatch(
            "size",
            central.uncompressed_size,
            local.uncompressed_size,
        ));
    }
    Ok(())
}

/// A file or directory in the archive
///
/// Metadata comes from the entry's local file header, except for the sizes,
/// CRC, and compression method, which come from the central directory.
/// The contents are read and decompressed the first time [`data()`] is called
/// and kept around after that.
///
/// [`data()`]: Entry::data
pub struct Entry<'z, 'a> {
    archive: &'z ZipArchive<'a>,
    file_name: Cow<'a, str>,
    flags: u16,
    last_modified_time: u16,
    last_modified_date: u16,
    compression_method: CompressionMethod,
    compressed_size: usize,
    size: usize,
    crc32: u32,
    external_file_attributes: u32,
    comment: Cow<'a, str>,
    header_offset: usize,
    data_start: usize,
    data: OnceCell<Vec<u8>>,
}

impl fmt::Debug for Entry<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("file_name", &self.file_name)
            .field("compression_method", &self.compression_method)
            .field("compressed_size", &self.compressed_size)
            .field("size", &self.size)
            .field("crc32", &format_args!("{:#010x}", self.crc32))
            .field("header_offset", &self.header_offset)
            .field("data_start", &self.data_start)
            .field("cached", &self.data.get().is_some())
            .finish()
    }
}

impl<'z, 'a> Entry<'z, 'a> {
    /// The file's name, as stored in its local header
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The file's name as a path. Directory names keep their trailing `/`.
    pub fn path(&self) -> &Utf8Path {
        Utf8Path::new(self.file_name())
    }

    /// Returns true if the given entry is a directory
    pub fn is_dir(&self) -> bool {
        // Path::ends_with() doesn't consider separators,
        // so we need a different approach.
        self.file_name.ends_with('/')
    }

    /// Returns true if the given entry is a file
    pub fn is_file(&self) -> bool {
        !self.is_dir()
    }

    /// The date and time the file was last modified,
    /// or `None` if the archive stored a nonsensical one.
    pub fn last_modified(&self) -> Option<NaiveDateTime> {
        spec::parse_msdos(self.last_modified_time, self.last_modified_date)
    }

    /// Compression algorithm used to store the file
    pub fn compression_method(&self) -> CompressionMethod {
        self.compression_method
    }

    /// Compressed size of the file in bytes
    pub fn compressed_size(&self) -> usize {
        self.compressed_size
    }

    /// Uncompressed size of the file in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// The CRC-32 of the decompressed file. (It isn't checked.)
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// General purpose bit flags from the local header
    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn external_file_attributes(&self) -> u32 {
        self.external_file_attributes
    }

    /// The file's comment from the central directory
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Offset of the file's local header in the archive
    pub fn header_offset(&self) -> usize {
        self.header_offset
    }

    /// Offset of the file's compressed data in the archive
    pub fn data_start(&self) -> usize {
        self.data_start
    }

    /// Returns the file's decompressed contents,
    /// reading them out of the archive on the first call.
    pub fn data(&self) -> ZipResult<&[u8]> {
        if let Some(data) = self.data.get() {
            return Ok(data.as_slice());
        }
        let data = self.archive.read_payload(
            self.data_start,
            self.compressed_size,
            self.compression_method,
        )?;
        Ok(self.data.get_or_init(|| data).as_slice())
    }

    /// Like [`data()`](Self::data), but hands over the contents.
    pub fn into_data(self) -> ZipResult<Vec<u8>> {
        match self.data.into_inner() {
            Some(data) => Ok(data),
            None => self.archive.read_payload(
                self.data_start,
                self.compressed_size,
                self.compression_method,
            ),
        }
    }
}
