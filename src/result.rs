//! Error types and the related `Result<T>`

use thiserror::Error;

pub type ZipResult<T> = Result<T, ZipError>;

#[derive(Debug, Error)]
pub enum ZipError {
    /// An error from the decompression capability
    #[error("I/O Error")]
    Io(#[from] std::io::Error),

    /// A record didn't start with the magic number we expected.
    #[error("Invalid {record} signature (expected {expected:#010x}, got {actual:#010x})")]
    BadSignature {
        record: &'static str,
        expected: u32,
        actual: u32,
    },

    /// No End of central directory record whose comment runs to the end
    /// of the buffer could be found. This probably isn't a ZIP archive.
    #[error("Couldn't find End Of Central Directory Record")]
    EndOfCentralDirectoryNotFound,

    /// An entry is compressed with something other than store or DEFLATE.
    #[error("Unsupported compression method {0}")]
    UnsupportedCompressionMethod(u16),

    /// A read ran off the end of the buffer.
    #[error("Read of {wanted} bytes at offset {offset} overruns {len}-byte archive")]
    OutOfBounds {
        offset: usize,
        wanted: usize,
        len: usize,
    },

    /// The ZIP archive uses an unsupported feature
    #[error("Unsupported Zip archive: {0}")]
    UnsupportedArchive(String),

    /// The local file header disagrees with its central directory entry.
    #[error("Central directory entry doesn't match local file header: {0}")]
    LocalHeaderMismatch(String),
}
