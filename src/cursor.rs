// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A positioned view over a fixed byte image, with compact integer and
//! string primitives layered on top.
//!
//! [Cursor] never copies the backing image. Reads either advance a position
//! and return scalars, or return a borrowed slice into the image.

use crate::error::{Error, Result};

/// A movable position plus a soft upper bound ("limit") into a byte slice.
///
/// The limit is distinct from the length of the backing slice: callers
/// narrow it to confine reads to the current chunk body, then widen it again
/// when moving to the next chunk. See [Cursor::set_limit].
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    data: &'a [u8],
    position: usize,
    limit: usize,
}

impl<'a> Cursor<'a> {
    /// Construct a cursor over the entire image, with the limit initialized
    /// to the image length.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            position: 0,
            limit: data.len(),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit;
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.position)
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.limit
    }

    fn ensure_available(&self, n: usize) -> Result<()> {
        let end = self
            .position
            .checked_add(n)
            .ok_or(Error::UnexpectedEof)?;

        if end > self.limit || end > self.data.len() {
            Err(Error::UnexpectedEof)
        } else {
            Ok(())
        }
    }

    /// Read a single byte and advance the position.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure_available(1)?;

        let b = self.data[self.position];
        self.position += 1;

        Ok(b)
    }

    fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read `n` raw bytes as a zero-copy slice into the backing image.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure_available(n)?;

        let slice = &self.data[self.position..self.position + n];
        self.position += n;

        Ok(slice)
    }

    /// Varint `n` followed by `n` raw bytes.
    fn read_byte_array(&mut self) -> Result<&'a [u8]> {
        let n = self.read_varint()? as usize;

        self.read_bytes(n)
    }

    /// Little-endian LEB128 with a 9-byte terminator for the 64-bit case.
    ///
    /// Reads up to 8 bytes with MSB-continuation; if all 8 carried the
    /// continuation bit, a 9th byte is read as a full 8 bits and placed
    /// unshifted into bits 56-63.
    pub fn read_varlong(&mut self) -> Result<i64> {
        let mut res: i64 = 0;

        for i in 0..8u32 {
            let x = self.read_i8()?;

            res += (x as i64 & 0x7f) << (7 * i);

            if x >= 0 {
                return Ok(res);
            }
        }

        let x = self.read_i8()?;
        res += (x as i64 & 0xff) << 56;

        Ok(res)
    }

    /// Same continuation-bit algorithm as [Self::read_varlong], truncated to
    /// 32 bits. Overflow beyond 32 bits is not checked; callers only use this
    /// for sizes, type ids, counts, and other small integers.
    pub fn read_varint(&mut self) -> Result<i32> {
        Ok(self.read_varlong()? as i32)
    }

    /// Decode the JFR string encoding at the current position.
    ///
    /// Dispatches on a leading tag byte: `0` is null, `1` is empty, `3` is
    /// UTF-8, `4` is a UTF-16 code unit array, `5` is ISO-8859-1. Tag `2`
    /// (constant pool reference) and any tag `>= 6` are malformed here: this
    /// reader has no generic string-constant-pool indirection to resolve
    /// through.
    pub fn read_string(&mut self) -> Result<Option<String>> {
        let tag = self.read_u8()?;

        match tag {
            0 => Ok(None),
            1 => Ok(Some(String::new())),
            3 => {
                let bytes = self.read_byte_array()?;

                std::str::from_utf8(bytes)
                    .map(|s| Some(s.to_string()))
                    .map_err(|_| Error::InvalidFormat("invalid UTF-8 string data".into()))
            }
            4 => {
                let n = self.read_varint()? as usize;
                let mut units = Vec::with_capacity(n);

                for _ in 0..n {
                    units.push(self.read_varint()? as u16);
                }

                Ok(Some(String::from_utf16_lossy(&units)))
            }
            5 => {
                let bytes = self.read_byte_array()?;

                Ok(Some(bytes.iter().map(|&b| b as char).collect()))
            }
            other => Err(Error::InvalidFormat(format!(
                "invalid string encoding tag: {other}"
            ))),
        }
    }

    /// Read the symbol-pool string encoding, which must be tag `3` (UTF-8).
    ///
    /// Unlike [Self::read_string], this returns the raw bytes with no UTF-8
    /// validation cost paid up front — symbols are stored verbatim and only
    /// interpreted lazily by consumers.
    pub fn read_symbol_bytes(&mut self) -> Result<&'a [u8]> {
        let tag = self.read_u8()?;

        if tag != 3 {
            return Err(Error::InvalidFormat("Invalid symbol encoding".into()));
        }

        self.read_byte_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varlong_single_byte() {
        let data = [0x01];
        let mut c = Cursor::new(&data);

        assert_eq!(c.read_varlong().unwrap(), 1);
        assert_eq!(c.position(), 1);
    }

    #[test]
    fn varlong_multi_byte() {
        // 300 = 0b1_0010_1100 -> low 7 bits 0x2c with continuation, then 0x02.
        let data = [0xac, 0x02];
        let mut c = Cursor::new(&data);

        assert_eq!(c.read_varlong().unwrap(), 300);
    }

    #[test]
    fn varlong_nine_byte_terminator() {
        // First eight bytes all carry the continuation bit and encode zero
        // in their low 7 bits; the ninth byte is the literal top byte 0xA5.
        let data = [0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0x80, 0xA5u8 as u8];
        let mut c = Cursor::new(&data);

        assert_eq!(c.read_varlong().unwrap(), 0xA5i64 << 56);
        assert_eq!(c.position(), 9);
    }

    #[test]
    fn varint_round_trips_negative_and_large() {
        // -1i32 as varint per JFR's writer encodes as all-0xff low 7 bits
        // with continuation set across 5 bytes.
        let data = [0xff, 0xff, 0xff, 0xff, 0x0f];
        let mut c = Cursor::new(&data);

        assert_eq!(c.read_varint().unwrap(), -1);
    }

    #[test]
    fn string_null_and_empty() {
        let data = [0u8, 1u8];
        let mut c = Cursor::new(&data);

        assert_eq!(c.read_string().unwrap(), None);
        assert_eq!(c.read_string().unwrap(), Some(String::new()));
    }

    #[test]
    fn string_utf8() {
        let mut data = vec![3u8, 5u8];
        data.extend_from_slice(b"hello");

        let mut c = Cursor::new(&data);

        assert_eq!(c.read_string().unwrap(), Some("hello".to_string()));
    }

    #[test]
    fn string_utf16_code_units() {
        // tag=4, count=1, one varint code unit for 'A' (0x41).
        let data = [4u8, 1u8, 0x41];
        let mut c = Cursor::new(&data);

        assert_eq!(c.read_string().unwrap(), Some("A".to_string()));
    }

    #[test]
    fn string_latin1() {
        // tag=5, length=1, byte 0xe9 ('é' in ISO-8859-1).
        let data = [5u8, 1u8, 0xe9];
        let mut c = Cursor::new(&data);

        assert_eq!(c.read_string().unwrap(), Some("\u{e9}".to_string()));
    }

    #[test]
    fn string_invalid_tags_fail() {
        for tag in [2u8, 6u8, 255u8] {
            let data = [tag];
            let mut c = Cursor::new(&data);

            assert!(matches!(c.read_string(), Err(Error::InvalidFormat(_))));
        }
    }

    #[test]
    fn symbol_bytes_requires_tag_three() {
        let data = [4u8];
        let mut c = Cursor::new(&data);

        let err = c.read_symbol_bytes().unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(m) if m == "Invalid symbol encoding"));
    }

    #[test]
    fn symbol_bytes_reads_utf8_payload() {
        let mut data = vec![3u8, 3u8];
        data.extend_from_slice(b"abc");

        let mut c = Cursor::new(&data);

        assert_eq!(c.read_symbol_bytes().unwrap(), b"abc");
    }

    #[test]
    fn reads_past_limit_fail() {
        let data = [1u8, 2u8, 3u8];
        let mut c = Cursor::new(&data);
        c.set_limit(1);

        assert!(c.read_u8().is_ok());
        assert!(matches!(c.read_u8(), Err(Error::UnexpectedEof)));
    }
}
