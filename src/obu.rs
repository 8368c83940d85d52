// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! AV1 OBU headers.
//! See AV1 Bitstream & Decoding Process Specification § 5.3

use bitreader::BitReader;
use log::warn;

use crate::bits::{read_bits, read_flag, read_leb128, read_u8};
use crate::tables;
use crate::value::Fields;
use crate::{Error, Result};

const OBU_SEQUENCE_HEADER: u8 = 1;

/// Leading fields of a sequence header OBU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceHeaderSummary {
    pub seq_profile: u8,
    pub still_picture: bool,
    pub reduced_still_picture_header: bool,
    /// Only coded right here for reduced still picture headers.
    pub seq_level_idx: Option<u8>,
}

impl SequenceHeaderSummary {
    fn read(payload: &[u8]) -> Result<Self> {
        let mut r = BitReader::new(payload);
        let seq_profile = r.read_u8(3)?;
        let still_picture = r.read_bool()?;
        let reduced_still_picture_header = r.read_bool()?;
        let seq_level_idx = if reduced_still_picture_header {
            Some(r.read_u8(5)?)
        } else {
            None
        };
        Ok(Self {
            seq_profile,
            still_picture,
            reduced_still_picture_header,
            seq_level_idx,
        })
    }

    fn fields(&self) -> Fields {
        Fields::new()
            .with("seq_profile", self.seq_profile)
            .with("profile", tables::av1_profile_name(self.seq_profile))
            .with("still_picture", self.still_picture)
            .with("reduced_still_picture_header", self.reduced_still_picture_header)
            .with("seq_level_idx", self.seq_level_idx)
            .with("level", self.seq_level_idx.map(tables::av1_level_name))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Av1ObuHeader {
    /// 4 bits
    pub obu_type: Option<u8>,
    pub extension_flag: Option<bool>,
    pub has_size_field: Option<bool>,
    /// From the extension byte, 3 bits.
    pub temporal_id: Option<u8>,
    /// From the extension byte, 2 bits.
    pub spatial_id: Option<u8>,
    /// LEB128 `obu_size`, when `has_size_field` is set.
    pub payload_size: Option<u64>,
    pub sequence_header: Option<SequenceHeaderSummary>,
    /// Bytes taken by the header byte(s) and the size field.
    pub header_len: usize,
    pub parsing_error: Option<String>,
}

impl Av1ObuHeader {
    /// Parse the OBU at the start of `data`.
    pub fn parse(data: &[u8]) -> Self {
        let mut obu = Self::default();
        if let Err(e) = obu.read(data) {
            warn!("AV1 OBU: {e}");
            obu.parsing_error = Some(e.to_string());
        }
        obu
    }

    fn read(&mut self, data: &[u8]) -> Result<()> {
        let header = read_u8(data, 0)?;
        let obu_type = read_bits(header, 1, 4)?;
        let extension_flag = read_flag(header, 5)?;
        let has_size_field = read_flag(header, 6)?;
        self.obu_type = Some(obu_type);
        self.extension_flag = Some(extension_flag);
        self.has_size_field = Some(has_size_field);
        self.header_len = 1;
        if read_flag(header, 0)? {
            return Err(Error::InvalidData("OBU forbidden bit is set"));
        }

        if extension_flag {
            let extension = read_u8(data, 1)?;
            self.temporal_id = Some(read_bits(extension, 0, 3)?);
            self.spatial_id = Some(read_bits(extension, 3, 2)?);
            self.header_len = 2;
        }

        let mut payload = data.get(self.header_len..).unwrap_or_default();
        if has_size_field {
            let (size, len) = read_leb128(data, self.header_len)?;
            self.payload_size = Some(size);
            self.header_len += len;
            let rest = data.get(self.header_len..).unwrap_or_default();
            payload = rest.get(..usize::try_from(size)?).unwrap_or(rest);
        }

        if obu_type == OBU_SEQUENCE_HEADER {
            self.sequence_header = Some(SequenceHeaderSummary::read(payload)?);
        }
        Ok(())
    }

    /// Offset of the next OBU, if this one has a usable size.
    pub(crate) fn next_offset(&self) -> Option<usize> {
        if self.parsing_error.is_some() {
            return None;
        }
        let size = usize::try_from(self.payload_size?).ok()?;
        self.header_len.checked_add(size)
    }

    pub fn fields(&self) -> Fields {
        Fields::new()
            .with("obu_type", self.obu_type)
            .with("obu_type_name", self.obu_type.map(tables::obu_type_name))
            .with("extension_flag", self.extension_flag)
            .with("has_size_field", self.has_size_field)
            .with("temporal_id", self.temporal_id)
            .with("spatial_id", self.spatial_id)
            .with("payload_size", self.payload_size)
            .with("sequence_header", self.sequence_header.as_ref().map(SequenceHeaderSummary::fields))
    }
}

#[test]
fn temporal_delimiter() {
    // type 2, has_size, size 0
    let obu = Av1ObuHeader::parse(&[0x12, 0x00]);
    assert_eq!(obu.parsing_error, None);
    assert_eq!(obu.obu_type, Some(2));
    assert_eq!(obu.payload_size, Some(0));
    assert_eq!(obu.header_len, 2);
    assert_eq!(obu.next_offset(), Some(2));
    assert_eq!(obu.fields().get("obu_type_name").and_then(crate::Value::as_str), Some("OBU_TEMPORAL_DELIMITER"));
}

#[test]
fn sequence_header_with_extension() {
    // type 1, extension, has_size; temporal 2 spatial 1; size 2; profile 0 still reduced level 8
    let obu = Av1ObuHeader::parse(&[0x0e, 0b0100_1000, 0x02, 0b0001_1010, 0b0000_0000]);
    assert_eq!(obu.parsing_error, None);
    assert_eq!(obu.temporal_id, Some(2));
    assert_eq!(obu.spatial_id, Some(1));
    assert_eq!(obu.header_len, 3);
    let seq = obu.sequence_header.unwrap();
    assert_eq!(seq.seq_profile, 0);
    assert!(seq.still_picture);
    assert!(seq.reduced_still_picture_header);
    assert_eq!(seq.seq_level_idx, Some(8));
}

#[test]
fn malformed_obu_headers() {
    let forbidden = Av1ObuHeader::parse(&[0x92, 0x00]);
    assert!(forbidden.parsing_error.is_some());
    assert_eq!(forbidden.obu_type, Some(2));
    assert_eq!(forbidden.next_offset(), None);

    let cut_size = Av1ObuHeader::parse(&[0x12, 0x80]);
    assert_eq!(cut_size.parsing_error.as_deref(), Some("truncated"));
    assert_eq!(cut_size.payload_size, None);

    let no_size = Av1ObuHeader::parse(&[0x30]);
    assert_eq!(no_size.obu_type, Some(6));
    assert_eq!(no_size.next_offset(), None);
}
