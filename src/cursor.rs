//! A bounds-checked, little-endian reader over an in-memory archive.

use std::convert::TryInto;

use crate::result::*;

/// Reads little-endian integers and byte runs from a fixed buffer.
///
/// Each read advances the position by exactly the number of bytes consumed.
/// Reads that would run past the end of the buffer fail with
/// [`ZipError::OutOfBounds`] and leave the position where it was.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    posit: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, posit: 0 }
    }

    /// Like `new()`, but starting at the given offset.
    pub fn at(buf: &'a [u8], posit: usize) -> Self {
        Self { buf, posit }
    }

    pub fn position(&self) -> usize {
        self.posit
    }

    /// Moves to an absolute offset.
    ///
    /// Seeking past the end is allowed; the next read will fail.
    pub fn seek(&mut self, posit: usize) {
        self.posit = posit;
    }

    /// The whole underlying buffer, regardless of position
    pub fn get_ref(&self) -> &'a [u8] {
        self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Returns the next `n` bytes and advances past them.
    pub fn bytes(&mut self, n: usize) -> ZipResult<&'a [u8]> {
        let buf: &'a [u8] = self.buf;
        let start = self.posit;
        let out_of_bounds = || ZipError::OutOfBounds {
            offset: start,
            wanted: n,
            len: buf.len(),
        };
        let end = start.checked_add(n).ok_or_else(out_of_bounds)?;
        let slice = buf.get(start..end).ok_or_else(out_of_bounds)?;
        self.posit = end;
        Ok(slice)
    }

    pub fn u8(&mut self) -> ZipResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> ZipResult<u16> {
        let int_bytes = self.bytes(std::mem::size_of::<u16>())?;
        Ok(u16::from_le_bytes(
            int_bytes.try_into().expect("two bytes for u16"),
        ))
    }

    pub fn u32(&mut self) -> ZipResult<u32> {
        let int_bytes = self.bytes(std::mem::size_of::<u32>())?;
        Ok(u32::from_le_bytes(
            int_bytes.try_into().expect("four bytes for u32"),
        ))
    }
}
