//! Builds small ZIP archives in memory for the tests to pick apart.

#![allow(dead_code)]

use std::io::Write;

use flate2::write::DeflateEncoder;
use flate2::{Compression, Crc};

pub const STORE: u16 = 0;
pub const DEFLATE: u16 = 8;

const DATA_DESCRIPTOR_FLAG: u16 = 1 << 3;

/// One file or directory to put in a test archive
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub method: u16,
    pub flags: u16,
    pub time: u16,
    pub date: u16,
    /// What's actually written after the local header
    pub payload: Vec<u8>,
    pub uncompressed_size: u32,
    pub crc32: u32,
    pub local_extra: Vec<u8>,
    pub central_extra: Vec<u8>,
    pub comment: Vec<u8>,
    /// Write a data descriptor after the payload (with or without its signature)
    pub data_descriptor: Option<bool>,
    /// Lie about the compressed size in the local header
    pub local_compressed_size: Option<u32>,
}

fn crc(contents: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(contents);
    crc.sum()
}

impl Member {
    pub fn stored(name: &str, contents: &[u8]) -> Self {
        Self::raw(name, STORE, contents.to_vec(), contents)
    }

    pub fn deflated(name: &str, contents: &[u8]) -> Self {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(contents).unwrap();
        let payload = encoder.finish().unwrap();
        Self::raw(name, DEFLATE, payload, contents)
    }

    pub fn directory(name: &str) -> Self {
        assert!(name.ends_with('/'));
        Self::stored(name, b"")
    }

    /// A member with the given method code and payload, written as-is.
    pub fn raw(name: &str, method: u16, payload: Vec<u8>, contents: &[u8]) -> Self {
        Self {
            name: name.to_owned(),
            method,
            flags: 0,
            time: 0,
            // 1980-01-01
            date: 0x0021,
            payload,
            uncompressed_size: contents.len() as u32,
            crc32: crc(contents),
            local_extra: Vec::new(),
            central_extra: Vec::new(),
            comment: Vec::new(),
            data_descriptor: None,
            local_compressed_size: None,
        }
    }

    pub fn with_data_descriptor(mut self, signed: bool) -> Self {
        self.flags |= DATA_DESCRIPTOR_FLAG;
        self.data_descriptor = Some(signed);
        self
    }

    fn write_local(&self, out: &mut Vec<u8>) {
        let streamed = self.data_descriptor.is_some();
        let (crc32, compressed_size, uncompressed_size) = if streamed {
            (0, 0, 0)
        } else {
            (
                self.crc32,
                self.local_compressed_size
                    .unwrap_or(self.payload.len() as u32),
                self.uncompressed_size,
            )
        };

        out.extend_from_slice(&0x04034b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.method.to_le_bytes());
        out.extend_from_slice(&self.time.to_le_bytes());
        out.extend_from_slice(&self.date.to_le_bytes());
        out.extend_from_slice(&crc32.to_le_bytes());
        out.extend_from_slice(&compressed_size.to_le_bytes());
        out.extend_from_slice(&uncompressed_size.to_le_bytes());
        out.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(self.local_extra.len() as u16).to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(&self.local_extra);
        out.extend_from_slice(&self.payload);

        if let Some(signed) = self.data_descriptor {
            if signed {
                out.extend_from_slice(&0x08074b50u32.to_le_bytes());
            }
            out.extend_from_slice(&self.crc32.to_le_bytes());
            out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
            out.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        }
    }

    fn write_central(&self, header_offset: usize, out: &mut Vec<u8>) {
        out.extend_from_slice(&0x02014b50u32.to_le_bytes());
        out.extend_from_slice(&0x031eu16.to_le_bytes()); // Unix, 3.0
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.method.to_le_bytes());
        out.extend_from_slice(&self.time.to_le_bytes());
        out.extend_from_slice(&self.date.to_le_bytes());
        out.extend_from_slice(&self.crc32.to_le_bytes());
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        out.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(self.central_extra.len() as u16).to_le_bytes());
        out.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // disk number
        out.extend_from_slice(&0u16.to_le_bytes()); // internal attributes
        out.extend_from_slice(&(0o100644u32 << 16).to_le_bytes());
        out.extend_from_slice(&(header_offset as u32).to_le_bytes());
        out.extend_from_slice(self.name.as_bytes());
        out.extend_from_slice(&self.central_extra);
        out.extend_from_slice(&self.comment);
    }
}

/// Lays out members, then the central directory, then the EOCDR.
pub fn build(members: &[Member], comment: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();

    let mut offsets = Vec::with_capacity(members.len());
    for member in members {
        offsets.push(out.len());
        member.write_local(&mut out);
    }

    let central_directory_offset = out.len();
    for (member, offset) in members.iter().zip(offsets) {
        member.write_central(offset, &mut out);
    }
    let central_directory_size = out.len() - central_directory_offset;

    out.extend(eocdr(
        members.len() as u16,
        central_directory_size as u32,
        central_directory_offset as u32,
        comment,
    ));
    out
}

pub fn eocdr(entries: u16, size: u32, offset: u32, comment: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0x06054b50u32.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&entries.to_le_bytes());
    out.extend_from_slice(&entries.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&(comment.len() as u16).to_le_bytes());
    out.extend_from_slice(comment);
    out
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
