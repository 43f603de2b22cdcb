//! The decompression capability handed to a [`ZipArchive`]
//!
//! This library doesn't implement DEFLATE itself. Callers pass in
//! something that does, either [`Deflate`] (backed by flate2)
//! or any `Fn(&[u8]) -> io::Result<Vec<u8>>`.
//!
//! [`ZipArchive`]: ../read/struct.ZipArchive.html

use std::io::{self, Read};

use flate2::read::DeflateDecoder;

/// Turns a raw DEFLATE stream (no zlib or gzip framing) into its contents.
pub trait Inflate: Send + Sync {
    fn inflate(&self, compressed: &[u8]) -> io::Result<Vec<u8>>;
}

impl<F> Inflate for F
where
    F: Fn(&[u8]) -> io::Result<Vec<u8>> + Send + Sync,
{
    fn inflate(&self, compressed: &[u8]) -> io::Result<Vec<u8>> {
        self(compressed)
    }
}

/// The default inflater, using [flate2](https://docs.rs/flate2)
#[derive(Debug, Default, Clone, Copy)]
pub struct Deflate;

impl Inflate for Deflate {
    fn inflate(&self, compressed: &[u8]) -> io::Result<Vec<u8>> {
        let mut decompressed = Vec::new();
        DeflateDecoder::new(compressed).read_to_end(&mut decompressed)?;
        Ok(decompressed)
    }
}
