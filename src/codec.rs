// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use log::{debug, warn};

use crate::bits::read_bits;
use crate::h264::{H264Pps, H264Sps};
use crate::hevc::HevcVps;
use crate::obu::Av1ObuHeader;
use crate::sniff::{self, InputKind};
use crate::value::{Fields, Value};
use crate::{Result, TryVec};

const H264_NAL_SPS: u8 = 7;
const H264_NAL_PPS: u8 = 8;
const HEVC_NAL_VPS: u8 = 32;

/// One decoded codec configuration record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecConfig {
    H264Sps(H264Sps),
    H264Pps(H264Pps),
    HevcVps(HevcVps),
    Av1ObuHeader(Av1ObuHeader),
}

impl CodecConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::H264Sps(_) => "h264_sps",
            Self::H264Pps(_) => "h264_pps",
            Self::HevcVps(_) => "hevc_vps",
            Self::Av1ObuHeader(_) => "av1_obu_header",
        }
    }

    /// Why decoding stopped early, if it did.
    pub fn parsing_error(&self) -> Option<&str> {
        match self {
            Self::H264Sps(r) => r.parsing_error.as_deref(),
            Self::H264Pps(r) => r.parsing_error.as_deref(),
            Self::HevcVps(r) => r.parsing_error.as_deref(),
            Self::Av1ObuHeader(r) => r.parsing_error.as_deref(),
        }
    }

    pub fn fields(&self) -> Fields {
        match self {
            Self::H264Sps(r) => r.fields(),
            Self::H264Pps(r) => r.fields(),
            Self::HevcVps(r) => r.fields(),
            Self::Av1ObuHeader(r) => r.fields(),
        }
    }

    pub fn to_value(&self) -> Value {
        Fields::new()
            .with("kind", self.kind())
            .with("fields", self.fields())
            .with("parsing_error", self.parsing_error())
            .into()
    }

    /// Non-null decoded fields; `parsing_error` does not count.
    pub fn field_count(&self) -> usize {
        self.fields().field_count()
    }
}

/// Decode every SPS and PPS in an H.264 Annex-B stream.
pub fn h264_parameter_sets(stream: &[u8]) -> Result<TryVec<CodecConfig>> {
    let mut out = TryVec::new();
    for nal in sniff::nal_units(stream) {
        let nal_type = read_bits(nal[0], 3, 5)?;
        let record = match nal_type {
            H264_NAL_SPS => CodecConfig::H264Sps(H264Sps::parse(&sniff::unescape_rbsp(&nal[1..])?)),
            H264_NAL_PPS => CodecConfig::H264Pps(H264Pps::parse(&sniff::unescape_rbsp(&nal[1..])?)),
            _ => {
                debug!("skipping H.264 NAL unit type {nal_type}");
                continue;
            },
        };
        out.push(record)?;
    }
    Ok(out)
}

/// Decode every VPS in an HEVC Annex-B stream.
pub fn hevc_parameter_sets(stream: &[u8]) -> Result<TryVec<CodecConfig>> {
    let mut out = TryVec::new();
    for nal in sniff::nal_units(stream) {
        let nal_type = read_bits(nal[0], 1, 6)?;
        if nal_type != HEVC_NAL_VPS {
            debug!("skipping HEVC NAL unit type {nal_type}");
            continue;
        }
        let rbsp = sniff::unescape_rbsp(nal.get(2..).unwrap_or_default())?;
        out.push(CodecConfig::HevcVps(HevcVps::parse(&rbsp)))?;
    }
    Ok(out)
}

/// Decode the OBU headers of an IVF file or of a bare OBU sequence.
pub fn av1_obu_headers(stream: &[u8]) -> Result<TryVec<CodecConfig>> {
    let mut out = TryVec::new();
    if sniff::detect(stream) == InputKind::Ivf {
        let header = match sniff::parse_ivf_header(stream) {
            Ok(header) => header,
            Err(e) => {
                warn!("IVF header: {e}");
                return Ok(out);
            },
        };
        for frame in sniff::ivf_frames(stream, &header) {
            read_obus(frame, &mut out)?;
        }
    } else {
        read_obus(stream, &mut out)?;
    }
    Ok(out)
}

/// Walk OBUs until the data ends or an OBU can't be sized.
fn read_obus(mut data: &[u8], out: &mut TryVec<CodecConfig>) -> Result<()> {
    while !data.is_empty() {
        let obu = Av1ObuHeader::parse(data);
        let next = obu.next_offset();
        out.push(CodecConfig::Av1ObuHeader(obu))?;
        match next.and_then(|n| data.get(n..)) {
            Some(rest) => data = rest,
            None => break,
        }
    }
    Ok(())
}

#[cfg(test)]
use crate::bits::pack_bits;

#[test]
fn h264_stream_yields_sps_and_pps() {
    let sps = pack_bits(&[
        (0x67, 8),
        (100, 8), // High
        (0, 8),
        (31, 8), // 3.1
        (0, 4),
        (1, 2),
        (0, 3),
        (0, 3),
        (0, 4),
        (79, 13),
        (44, 13),
        (0, 1),
    ]);
    #[rustfmt::skip]
    let pps = pack_bits(&[
        (0x68, 8), (1, 6), (0, 4), (0, 3), (0, 3), (1, 1), (0, 1), (0, 3), (0, 3), (0, 3), (0, 1),
        (1, 1), // rbsp_stop_one_bit
    ]);
    let mut stream = Vec::new();
    stream.extend_from_slice(&[0, 0, 0, 1, 0x09, 0xf0]); // access unit delimiter
    stream.extend_from_slice(&[0, 0, 0, 1]);
    stream.extend_from_slice(&sps);
    stream.extend_from_slice(&[0, 0, 1]);
    stream.extend_from_slice(&pps);

    let records = h264_parameter_sets(&stream).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].kind(), "h264_sps");
    let fields = records[0].fields();
    assert_eq!(fields.get("profile_name").and_then(Value::as_str), Some("High"));
    assert_eq!(fields.get("level_name").and_then(Value::as_str), Some("3.1"));
    assert_eq!(fields.get("width").and_then(Value::as_u64), Some(1280));
    assert_eq!(fields.get("height").and_then(Value::as_u64), Some(720));
    assert_eq!(records[1].kind(), "h264_pps");
    assert_eq!(records[1].fields().get("entropy_coder").and_then(Value::as_str), Some("CABAC"));
}

#[test]
fn hevc_stream_yields_vps_only() {
    // VPS header 0x40 0x01, then a SPS (type 33)
    let stream = [0, 0, 0, 1, 0x40, 0x01, 0x00, 0x38, 0xff, 0, 0, 1, 0x42, 0x01, 0x01];
    let records = hevc_parameter_sets(&stream).unwrap();
    assert_eq!(records.len(), 1);
    let CodecConfig::HevcVps(vps) = &records[0] else { panic!("{:?}", records[0]) };
    assert_eq!(vps.vps_id, Some(0));
    assert_eq!(vps.max_layers, Some(1));
    assert_eq!(vps.max_sub_layers, Some(1));
    assert_eq!(vps.temporal_id_nesting, Some(true));
    assert_eq!(vps.profile_present, Some(true));
    assert_eq!(records[0].parsing_error(), None);
}

#[test]
fn bare_and_ivf_obu_sequences() {
    let sequence = [
        0x12, 0x00, // temporal delimiter
        0x0a, 0x02, 0b0001_1010, 0x00, // sequence header, reduced still picture
        0x32, 0x02, 0xaa, 0xbb, // frame
    ];
    let records = av1_obu_headers(&sequence).unwrap();
    let types: Vec<_> = records
        .iter()
        .map(|r| match r {
            CodecConfig::Av1ObuHeader(h) => h.obu_type,
            _ => None,
        })
        .collect();
    assert_eq!(types, [Some(2), Some(1), Some(6)]);
    let value = records[1].to_value();
    let profile = value.get("fields").and_then(|f| f.get("sequence_header")).and_then(|s| s.get("profile"));
    assert_eq!(profile.and_then(Value::as_str), Some("Main"));

    let ivf = sniff::make_ivf(&[&sequence[..2], &sequence[2..]]);
    assert_eq!(av1_obu_headers(&ivf).unwrap().len(), 3);

    // second OBU has no size field, so the walk ends there
    let r#unsized = [0x12, 0x00, 0x30, 0xaa, 0x12, 0x00];
    assert_eq!(av1_obu_headers(&r#unsized).unwrap().len(), 2);
}

#[test]
fn parsing_error_does_not_count_as_a_field() {
    let record = CodecConfig::HevcVps(HevcVps::parse(&[0x0c]));
    assert!(record.parsing_error().is_some());
    // vps_id and max_layers
    assert_eq!(record.field_count(), 2);
    let value = record.to_value();
    assert!(value.get("parsing_error").and_then(Value::as_str).is_some());
}
