//! Code specific to the ZIP file format specification.
//!
//! We try to keep the nitty gritty here,
//! and higher-level stuff in the [`read`] module.
//!
//! Most comments quote the ZIP spec, [`APPNOTE.TXT`].
//!
//! [`read`]: ../read/index.html
//! [`APPNOTE.TXT`]: https://pkware.cachefly.net/webdocs/APPNOTE/APPNOTE-6.3.6.TXT

use std::borrow::Cow;

use chrono::{NaiveDate, NaiveDateTime};
use codepage_437::*;
use log::*;
use memchr::memmem;

use crate::cursor::ByteCursor;
use crate::read::CompressionMethod;
use crate::result::*;

// Magic numbers denoting various sections of a ZIP archive

/// End of central directory magic number
pub const EOCDR_MAGIC: u32 = 0x06054b50;
/// Central directory magic number
pub const CENTRAL_DIRECTORY_MAGIC: u32 = 0x02014b50;
/// Local file header magic number
pub const LOCAL_FILE_HEADER_MAGIC: u32 = 0x04034b50;
/// Optional data descriptor magic number
pub const DATA_DESCRIPTOR_MAGIC: u32 = 0x08074b50;

/// Size of the End of central directory record, sans comment
pub const EOCDR_SIZE: usize = 22;

/// Offset of the comment length within the End of central directory record
const EOCDR_COMMENT_LENGTH_OFFSET: usize = 20;

impl CompressionMethod {
    pub(crate) fn from_u16(u: u16) -> Self {
        match u {
            0 => CompressionMethod::None,
            8 => CompressionMethod::Deflate,
            v => CompressionMethod::Unsupported(v),
        }
    }

    /// The method's code as stored in ZIP headers
    pub fn as_u16(self) -> u16 {
        match self {
            CompressionMethod::None => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unsupported(v) => v,
        }
    }
}

fn check_magic(record: &'static str, expected: u32, actual: u32) -> ZipResult<()> {
    if actual != expected {
        return Err(ZipError::BadSignature {
            record,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Extracts the "is this text UTF-8?" bit from the 16-bit flags field.
///
/// If false, text is assumped to be CP437.
pub fn is_utf8(flags: u16) -> bool {
    // Bit 11: Language encoding flag (EFS).  If this bit is set,
    //         the filename and comment fields for this file
    //         MUST be encoded using UTF-8. (see APPENDIX D)
    flags & (1 << 11) != 0
}

/// Extracts the "sizes follow the data" bit from the 16-bit flags field.
pub fn has_data_descriptor(flags: u16) -> bool {
    // Bit 3: If this bit is set, the fields crc-32, compressed
    //        size and uncompressed size are set to zero in the
    //        local header.  The correct values are put in the
    //        data descriptor immediately following the compressed
    //        data.
    flags & (1 << 3) != 0
}

fn decode_text(raw: &[u8], flags: u16) -> Cow<'_, str> {
    if is_utf8(flags) {
        String::from_utf8_lossy(raw)
    } else {
        Cow::borrow_from_cp437(raw, &CP437_CONTROL)
    }
}

/// Data from the End of central directory record
///
/// Found at the back of the ZIP archive and provides offsets for finding
/// its central directory, along with lots of stuff that stopped being relevant
/// when we stopped breaking ZIP archives onto multiple floppies.
#[derive(Debug)]
pub struct EndOfCentralDirectory<'a> {
    pub disk_number: u16,
    pub disk_with_central_directory: u16,
    pub entries_on_this_disk: u16,
    pub entries: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
    pub file_comment_length: u16,
    pub file_comment: Cow<'a, str>,
}

impl<'a> EndOfCentralDirectory<'a> {
    pub fn parse(cursor: &mut ByteCursor<'a>) -> ZipResult<Self> {
        let signature = cursor.u32()?;
        Self::parse_after_signature(signature, cursor)
    }

    pub fn parse_after_signature(signature: u32, cursor: &mut ByteCursor<'a>) -> ZipResult<Self> {
        // 4.3.16  End of central directory record:
        //
        // end of central dir signature    4 bytes  (0x06054b50)
        // number of this disk             2 bytes
        // number of the disk with the
        // start of the central directory  2 bytes
        // total number of entries in
        // the central dir on this disk    2 bytes
        // total number of entries in
        // the central dir                 2 bytes
        // size of the central directory   4 bytes
        // offset of start of central
        // directory with respect to
        // the starting disk number        4 bytes
        // zipfile comment length          2 bytes
        // .ZIP file comment       (variable size)
        check_magic("End of central directory", EOCDR_MAGIC, signature)?;
        let disk_number = cursor.u16()?;
        let disk_with_central_directory = cursor.u16()?;
        let entries_on_this_disk = cursor.u16()?;
        let entries = cursor.u16()?;
        let central_directory_size = cursor.u32()?;
        let central_directory_offset = cursor.u32()?;
        let file_comment_length = cursor.u16()?;
        // No flags here to tell us the encoding.
        let file_comment = String::from_utf8_lossy(cursor.bytes(file_comment_length as usize)?);

        Ok(Self {
            disk_number,
            disk_with_central_directory,
            entries_on_this_disk,
            entries,
            central_directory_size,
            central_directory_offset,
            file_comment_length,
            file_comment,
        })
    }
}

/// Searches backward from the end of the archive to find the
/// End of central directory record, leaving the cursor at its start.
///
/// It should be right at the end of the file,
/// but its trailing comment can be up to 64 kB long (and contain anything),
/// so we can't jump to a known offset. A candidate only counts if its
/// comment length runs exactly to the end of the buffer.
pub fn find_eocdr(cursor: &mut ByteCursor) -> ZipResult<usize> {
    let len = cursor.len();
    let last_candidate = len
        .checked_sub(EOCDR_SIZE)
        .ok_or(ZipError::EndOfCentralDirectoryNotFound)?;
    let floor = last_candidate.saturating_sub(u16::MAX as usize);

    let magic = EOCDR_MAGIC.to_le_bytes();
    let search_space = &cursor.get_ref()[floor..last_candidate + magic.len()];

    for found in memmem::rfind_iter(search_space, &magic) {
        let posit = floor + found;
        cursor.seek(posit + EOCDR_COMMENT_LENGTH_OFFSET);
        let comment_length = cursor.u16()? as usize;
        if posit + EOCDR_SIZE + comment_length == len {
            if posit != last_candidate {
                debug!(
                    "End of central directory at {} with a {} byte comment",
                    posit, comment_length
                );
            }
            cursor.seek(posit);
            return Ok(posit);
        }
        warn!(
            "Ignoring stray End of central directory signature at {} \
             (its {} byte comment doesn't reach the end of the archive)",
            posit, comment_length
        );
    }
    Err(ZipError::EndOfCentralDirectoryNotFound)
}

/// Data from a central directory entry
///
/// Each of these records contians information about a file or folder
/// stored in the ZIP archive.
#[derive(Debug)]
pub struct CentralDirectoryEntry<'a> {
    pub source_version: u16,
    pub minimum_extract_version: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified_time: u16,
    pub last_modified_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
    pub file_comment_length: u16,
    pub disk_number: u16,
    pub internal_file_attributes: u16,
    pub external_file_attributes: u32,
    pub header_offset: u32,
    pub file_name: Cow<'a, str>,
    pub extra_field: &'a [u8],
    pub file_comment: Cow<'a, str>,
}

impl<'a> CentralDirectoryEntry<'a> {
    pub fn parse(cursor: &mut ByteCursor<'a>) -> ZipResult<Self> {
        let signature = cursor.u32()?;
        Self::parse_after_signature(signature, cursor)
    }

    pub fn parse_after_signature(signature: u32, cursor: &mut ByteCursor<'a>) -> ZipResult<Self> {
        // 4.3.12  Central directory structure:
        //
        //   central file header signature   4 bytes  (0x02014b50)
        //   version made by                 2 bytes
        //   version needed to extract       2 bytes
        //   general purpose bit flag        2 bytes
        //   compression method              2 bytes
        //   last mod file time              2 bytes
        //   last mod file date              2 bytes
        //   crc-32                          4 bytes
        //   compressed size                 4 bytes
        //   uncompressed size               4 bytes
        //   file name length                2 bytes
        //   extra field length              2 bytes
        //   file comment length             2 bytes
        //   disk number start               2 bytes
        //   internal file attributes        2 bytes
        //   external file attributes        4 bytes
        //   relative offset of local header 4 bytes
        //
        //   file name (variable size)
        //   extra field (variable size)
        //   file comment (variable size)
        check_magic(
            "central directory file header",
            CENTRAL_DIRECTORY_MAGIC,
            signature,
        )?;
        let source_version = cursor.u16()?;
        let minimum_extract_version = cursor.u16()?;
        let flags = cursor.u16()?;
        let compression_method = cursor.u16()?;
        let last_modified_time = cursor.u16()?;
        let last_modified_date = cursor.u16()?;
        let crc32 = cursor.u32()?;
        let compressed_size = cursor.u32()?;
        let uncompressed_size = cursor.u32()?;
        let file_name_length = cursor.u16()?;
        let extra_field_length = cursor.u16()?;
        let file_comment_length = cursor.u16()?;
        let disk_number = cursor.u16()?;
        let internal_file_attributes = cursor.u16()?;
        let external_file_attributes = cursor.u32()?;
        let header_offset = cursor.u32()?;
        let file_name = decode_text(cursor.bytes(file_name_length as usize)?, flags);
        let extra_field = cursor.bytes(extra_field_length as usize)?;
        let file_comment = decode_text(cursor.bytes(file_comment_length as usize)?, flags);

        Ok(Self {
            source_version,
            minimum_extract_version,
            flags,
            compression_method,
            last_modified_time,
            last_modified_date,
            crc32,
            compressed_size,
            uncompressed_size,
            file_name_length,
            extra_field_length,
            file_comment_length,
            disk_number,
            internal_file_attributes,
            external_file_attributes,
            header_offset,
            file_name,
            extra_field,
            file_comment,
        })
    }
}

/// Data from a local file header
///
/// Each files' actual contents is preceded by this header.
/// We only really read it to find out where those contents start,
/// since its name and extra field can differ in length from
/// the central directory's copies.
#[derive(Debug)]
pub struct LocalFileHeader<'a> {
    pub minimum_extract_version: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified_time: u16,
    pub last_modified_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
    pub file_name: Cow<'a, str>,
    pub extra_field: &'a [u8],
}

impl<'a> LocalFileHeader<'a> {
    pub fn parse(cursor: &mut ByteCursor<'a>) -> ZipResult<Self> {
        let signature = cursor.u32()?;
        Self::parse_after_signature(signature, cursor)
    }

    pub fn parse_after_signature(signature: u32, cursor: &mut ByteCursor<'a>) -> ZipResult<Self> {
        // 4.3.7  Local file header:
        //
        // local file header signature     4 bytes  (0x04034b50)
        // version needed to extract       2 bytes
        // general purpose bit flag        2 bytes
        // compression method              2 bytes
        // last mod file time              2 bytes
        // last mod file date              2 bytes
        // crc-32                          4 bytes
        // compressed size                 4 bytes
        // uncompressed size               4 bytes
        // file name length                2 bytes
        // extra field length              2 bytes
        //
        // file name (variable size)
        // extra field (variable size)
        check_magic("local file header", LOCAL_FILE_HEADER_MAGIC, signature)?;
        let minimum_extract_version = cursor.u16()?;
        let flags = cursor.u16()?;
        let compression_method = cursor.u16()?;
        let last_modified_time = cursor.u16()?;
        let last_modified_date = cursor.u16()?;
        let crc32 = cursor.u32()?;
        let compressed_size = cursor.u32()?;
        let uncompressed_size = cursor.u32()?;
        let file_name_length = cursor.u16()?;
        let extra_field_length = cursor.u16()?;
        let file_name = decode_text(cursor.bytes(file_name_length as usize)?, flags);
        let extra_field = cursor.bytes(extra_field_length as usize)?;

        Ok(Self {
            minimum_extract_version,
            flags,
            compression_method,
            last_modified_time,
            last_modified_date,
            crc32,
            compressed_size,
            uncompressed_size,
            file_name_length,
            extra_field_length,
            file_name,
            extra_field,
        })
    }
}

/// Data from a data descriptor, which follows a file's compressed contents
/// when bit 3 of its flags is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataDescriptor {
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
}

impl DataDescriptor {
    pub fn parse(cursor: &mut ByteCursor) -> ZipResult<Self> {
        // 4.3.9.3 Although not originally assigned a signature, the value
        // 0x08074b50 has commonly been adopted as a signature value
        // for the data descriptor record.  Implementers SHOULD be
        // aware that ZIP files MAY be encountered with or without this
        // signature marking data descriptors and SHOULD account for
        // either case when reading ZIP files to ensure compatibility.
        let first = cursor.u32()?;
        let crc32 = if first == DATA_DESCRIPTOR_MAGIC {
            cursor.u32()?
        } else {
            first
        };
        let compressed_size = cursor.u32()?;
        let uncompressed_size = cursor.u32()?;

        Ok(Self {
            crc32,
            compressed_size,
            uncompressed_size,
        })
    }
}

/// Decodes an MS-DOS packed time and date.
///
/// Returns `None` if the fields don't make a real date and time
/// (zeroed dates from some archivers, 62 seconds, etc.).
pub fn parse_msdos(time: u16, date: u16) -> Option<NaiveDateTime> {
    let seconds = (0b0000_0000_0001_1111 & time) as u32 * 2; // MSDOS uses 2-second precision
    let minutes = (0b0000_0111_1110_0000 & time) as u32 >> 5;
    let hours = (0b1111_1000_0000_0000 & time) as u32 >> 11;

    let days = (0b0000_0000_0001_1111 & date) as u32;
    let months = (0b0000_0001_1110_0000 & date) as u32 >> 5;
    // MSDOS uses years since 1980; Always interpreted as a positive value
    let years = ((0b1111_1110_0000_0000 & date) >> 9) as i32 + 1980;

    NaiveDate::from_ymd_opt(years, months, days)?.and_hms_opt(hours, minutes, seconds)
}
