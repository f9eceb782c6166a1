// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Chunk header parsing and whole-file chunk location.
//!
//! A JFR recording is a concatenation of self-contained chunks. This module
//! validates and decodes each chunk's fixed-width header, then slices the
//! whole mapped image into the byte ranges each chunk occupies.

use crate::error::{Error, Result};
use nom::{
    number::complete::{be_u16, be_u32, be_u64},
    sequence::tuple,
};

pub const MAGIC: [u8; 4] = *b"FLR\0";

/// Parsed fixed-width chunk header. Big-endian, 68 bytes total.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChunkHeader {
    pub major: u16,
    pub minor: u16,

    /// Total chunk length in bytes, inclusive of this header.
    pub chunk_size: u64,

    /// Offset of the constant pool section, relative to the start of this header.
    ///
    /// On the wire this is actually the low 32 bits of an 8-byte field whose
    /// high 32 bits are unused; reading the whole 8 bytes big-endian yields
    /// the same numeric offset directly.
    pub constant_pool_position: u64,

    /// Offset of the metadata section, relative to the start of this header.
    pub metadata_position: u64,

    pub start_nanos: u64,
    pub duration_nanos: u64,
    pub start_ticks: u64,
    pub ticks_per_second: u64,

    /// First byte is chunk state, last byte is flags; the middle two bytes
    /// are unused. Not otherwise interpreted by this reader.
    pub state_and_flags: u32,
}

impl ChunkHeader {
    /// Length in bytes of the chunk header. Chunk body data begins here.
    pub const HEADER_SIZE: usize = 68;

    /// Parse a chunk header from the start of `input`.
    ///
    /// `input` must contain at least [Self::HEADER_SIZE] bytes.
    pub fn parse(input: &[u8]) -> Result<Self> {
        if input.len() < 4 {
            return Err(Error::UnexpectedEof);
        }

        if input[..4] != MAGIC {
            return Err(Error::NotJfr);
        }

        if input.len() < Self::HEADER_SIZE {
            return Err(Error::UnexpectedEof);
        }

        let (
            _,
            (
                major,
                minor,
                chunk_size,
                constant_pool_position,
                metadata_position,
                start_nanos,
                duration_nanos,
                start_ticks,
                ticks_per_second,
                state_and_flags,
            ),
        ): (
            &[u8],
            (u16, u16, u64, u64, u64, u64, u64, u64, u64, u32),
        ) = tuple((
            be_u16, be_u16, be_u64, be_u64, be_u64, be_u64, be_u64, be_u64, be_u64, be_u32,
        ))(&input[4..])
        .map_err(Error::from)?;

        // Major version 2 is the only supported wire format; this is
        // equivalent to requiring the combined 32-bit version field to fall
        // in 0x20000..=0x2ffff.
        if major != 2 {
            return Err(Error::UnsupportedVersion(major, minor));
        }

        Ok(Self {
            major,
            minor,
            chunk_size,
            constant_pool_position,
            metadata_position,
            start_nanos,
            duration_nanos,
            start_ticks,
            ticks_per_second,
            state_and_flags,
        })
    }
}

/// The byte ranges of one chunk within the whole file image.
#[derive(Clone, Copy, Debug)]
pub struct ChunkLocation {
    pub header: ChunkHeader,

    /// Absolute offset of this chunk's header within the image.
    pub start: usize,

    /// Absolute offset one past the end of this chunk.
    pub end: usize,

    /// Absolute offset where event body data begins.
    pub body_start: usize,

    /// Absolute offset of the metadata section.
    pub metadata_offset: usize,

    /// Absolute offset of the first constant pool block.
    pub constant_pool_offset: usize,
}

/// Walk the whole image and locate every chunk's byte ranges.
///
/// Validates each chunk's header in turn; a malformed or truncated chunk
/// aborts the whole scan, since there is no way to locate a subsequent chunk
/// without first trusting this one's declared size.
pub fn locate_chunks(data: &[u8]) -> Result<Vec<ChunkLocation>> {
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < data.len() {
        let header = ChunkHeader::parse(&data[start..])?;

        let end = start
            .checked_add(header.chunk_size as usize)
            .ok_or_else(|| Error::InvalidFormat("chunk size overflows file offset".into()))?;

        if end > data.len() {
            return Err(Error::UnexpectedEof);
        }

        chunks.push(ChunkLocation {
            body_start: start + ChunkHeader::HEADER_SIZE,
            metadata_offset: start + header.metadata_position as usize,
            constant_pool_offset: start + header.constant_pool_position as usize,
            start,
            end,
            header,
        });

        start = end;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const HEADER_HEX: &str = indoc! {"
        464c5200000200010000000000ce143d
        0000000000ce13dd0000000000003910
        177d216b5fbe159d0000000a6c74c4c5
        0000016d60607b51000000003b9aca00
        00000001
    "};

    #[test]
    fn parse_header() {
        let bytes = HEADER_HEX
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect::<Vec<_>>();
        let raw = hex::decode(&bytes).unwrap();

        let header = ChunkHeader::parse(&raw).unwrap();

        assert_eq!(
            header,
            ChunkHeader {
                major: 2,
                minor: 1,
                chunk_size: 13505597,
                constant_pool_position: 13505501,
                metadata_position: 14608,
                start_nanos: 1692545780012684701,
                duration_nanos: 44769264837,
                start_ticks: 1569279998801,
                ticks_per_second: 1000000000,
                state_and_flags: 1,
            }
        );
    }

    #[test]
    fn bad_magic_is_not_jfr() {
        let data = [0u8; 68];

        assert!(matches!(ChunkHeader::parse(&data), Err(Error::NotJfr)));
    }

    #[test]
    fn unsupported_version_rejected() {
        let mut bytes = HEADER_HEX
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect::<Vec<_>>();
        let mut raw = hex::decode(&bytes).unwrap();
        // Flip major version from 2 to 1.
        raw[5] = 1;
        bytes.clear();

        assert!(matches!(
            ChunkHeader::parse(&raw),
            Err(Error::UnsupportedVersion(1, 1))
        ));
    }
}
