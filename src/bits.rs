// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounds-checked primitive reads over an in-memory buffer.
//!
//! Every read validates `offset + width` against the buffer length first and
//! returns [`Error::OutOfBounds`] instead of touching memory it doesn't own.

use byteorder::{BigEndian, ByteOrder};

use crate::{Error, Result};

/// Borrow `width` bytes at `offset`, checking for overflow and buffer end.
#[inline]
fn window(buf: &[u8], offset: usize, width: usize) -> Result<&[u8]> {
    let end = offset.checked_add(width).ok_or(Error::OutOfBounds)?;
    buf.get(offset..end).ok_or(Error::OutOfBounds)
}

pub fn read_u8(buf: &[u8], offset: usize) -> Result<u8> {
    buf.get(offset).copied().ok_or(Error::OutOfBounds)
}

pub fn read_u16_be(buf: &[u8], offset: usize) -> Result<u16> {
    window(buf, offset, 2).map(BigEndian::read_u16)
}

/// Read a big-endian `u32` at `offset`.
pub fn read_u32_be(buf: &[u8], offset: usize) -> Result<u32> {
    window(buf, offset, 4).map(BigEndian::read_u32)
}

/// Read a big-endian `u64` at `offset`.
pub fn read_u64_be(buf: &[u8], offset: usize) -> Result<u64> {
    window(buf, offset, 8).map(BigEndian::read_u64)
}

/// Read `num_bits` (at most 8) from a single byte, starting at `bit_offset`
/// counted from the most significant bit.
///
/// This deliberately does not continue into a following byte: a request that
/// would cross the byte boundary fails with [`Error::BitFieldOverflow`]
/// rather than returning fewer bits than asked for. Fields wider than the
/// remaining bits of one byte are read with a [`bitreader::BitReader`].
pub fn read_bits(byte: u8, bit_offset: u8, num_bits: u8) -> Result<u8> {
    if num_bits == 0 {
        return Ok(0);
    }
    if bit_offset.checked_add(num_bits).is_none_or(|end| end > 8) {
        return Err(Error::BitFieldOverflow);
    }
    let shift = 8 - bit_offset - num_bits;
    let mask = (0xffu16 >> (8 - num_bits)) as u8;
    Ok((byte >> shift) & mask)
}

/// Single-bit convenience over [`read_bits`].
pub fn read_flag(byte: u8, bit_offset: u8) -> Result<bool> {
    read_bits(byte, bit_offset, 1).map(|bit| bit == 1)
}

/// Decode an unsigned LEB128 integer starting at `offset`.
///
/// Returns the value and the number of bytes it occupied. A sequence whose
/// last byte still has the continuation bit set is [`Error::Truncated`].
pub fn read_leb128(buf: &[u8], offset: usize) -> Result<(u64, usize)> {
    let start = buf.get(offset..).ok_or(Error::OutOfBounds)?;
    let mut cursor = start;
    let value = leb128::read::unsigned(&mut cursor)?;
    Ok((value, start.len() - cursor.len()))
}

#[test]
fn be_reads_check_bounds() {
    let buf = [0x00, 0x00, 0x03, 0x20, 0x00, 0x00, 0x02, 0x58];
    assert_eq!(read_u32_be(&buf, 0).unwrap(), 800);
    assert_eq!(read_u32_be(&buf, 4).unwrap(), 600);
    assert_eq!(read_u64_be(&buf, 0).unwrap(), 0x0000_0320_0000_0258);
    assert_eq!(read_u16_be(&buf, 2).unwrap(), 0x0320);
    assert!(matches!(read_u32_be(&buf, 5), Err(Error::OutOfBounds)));
    assert!(matches!(read_u64_be(&buf, 1), Err(Error::OutOfBounds)));
    assert!(matches!(read_u32_be(&buf, usize::MAX - 1), Err(Error::OutOfBounds)));
    assert!(matches!(read_u8(&buf, 8), Err(Error::OutOfBounds)));
}

#[test]
fn bit_fields_within_one_byte() {
    // 101 10 011
    let byte = 0b1011_0011;
    assert_eq!(read_bits(byte, 0, 3).unwrap(), 0b101);
    assert_eq!(read_bits(byte, 3, 2).unwrap(), 0b10);
    assert_eq!(read_bits(byte, 5, 3).unwrap(), 0b011);
    assert_eq!(read_bits(byte, 0, 8).unwrap(), byte);
    assert_eq!(read_bits(byte, 7, 0).unwrap(), 0);
    assert!(read_flag(byte, 0).unwrap());
    assert!(!read_flag(byte, 1).unwrap());
}

#[test]
fn bit_fields_never_cross_a_byte() {
    assert!(matches!(read_bits(0xff, 6, 3), Err(Error::BitFieldOverflow)));
    assert!(matches!(read_bits(0xff, 0, 9), Err(Error::BitFieldOverflow)));
    assert!(matches!(read_bits(0xff, 250, 8), Err(Error::BitFieldOverflow)));
}

#[test]
fn leb128_matches_reference_encoder() {
    for value in [0u64, 1, 127, 128, 300, 16_383, 16_384, 0xdead_beef, u32::MAX as u64] {
        let mut encoded = Vec::new();
        leb128::write::unsigned(&mut encoded, value).unwrap();
        encoded.push(0xaa); // trailing data must not be consumed
        let (decoded, len) = read_leb128(&encoded, 0).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(len, encoded.len() - 1);
    }
}

#[test]
fn leb128_truncated() {
    assert!(matches!(read_leb128(&[0x80, 0x80], 0), Err(Error::Truncated)));
    assert!(matches!(read_leb128(&[], 0), Err(Error::Truncated)));
    assert!(matches!(read_leb128(&[0x01], 2), Err(Error::OutOfBounds)));
    assert_eq!(read_leb128(&[0x00, 0xe5, 0x8e, 0x26], 1).unwrap(), (624_485, 3));
}

/// Pack `(value, width)` fields MSB-first, zero-padding the last byte.
#[cfg(test)]
pub(crate) fn pack_bits(fields: &[(u64, u8)]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut used = 0u8;
    for &(value, width) in fields {
        for bit in (0..width).rev() {
            if used % 8 == 0 {
                out.push(0);
            }
            if let Some(last) = out.last_mut() {
                *last |= (((value >> bit) & 1) as u8) << (7 - used % 8);
            }
            used = (used + 1) % 8;
        }
    }
    out
}

#[test]
fn pack_bits_is_msb_first() {
    assert_eq!(pack_bits(&[(0b101, 3), (0b10, 2), (0b011, 3)]), [0b1011_0011]);
    assert_eq!(pack_bits(&[(1, 1), (0x1ff, 9)]), [0xff, 0xc0]);
}
