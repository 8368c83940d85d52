// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Signature sniffing and the framings codec data arrives in: Annex-B byte
//! streams and IVF files.

use byteorder::{LittleEndian, ReadBytesExt};

use crate::boxes::{BoxType, FourCC};
use crate::{Error, Result, TryVec};

const IVF_SIGNATURE: &[u8; 4] = b"DKIF";
const IVF_FRAME_HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// ISO Base Media file, starting with a top-level box such as `ftyp`.
    Isobmff,
    /// H.264/HEVC byte stream with start codes.
    AnnexB,
    Ivf,
    Unknown,
}

/// Classify `data` by its leading bytes.
pub fn detect(data: &[u8]) -> InputKind {
    if data.starts_with(IVF_SIGNATURE) {
        return InputKind::Ivf;
    }
    if let Some(&[a, b, c, d]) = data.get(4..8) {
        if BoxType::from(u32::from_be_bytes([a, b, c, d])).is_top_level_signature() {
            return InputKind::Isobmff;
        }
    }
    if data.starts_with(&[0, 0, 1]) || data.starts_with(&[0, 0, 0, 1]) {
        return InputKind::AnnexB;
    }
    InputKind::Unknown
}

/// Iterator over the NAL units of an Annex-B byte stream, start codes
/// removed. Leading bytes before the first start code are ignored.
#[derive(Debug, Clone)]
pub struct NalUnits<'a> {
    rest: &'a [u8],
}

pub fn nal_units(stream: &[u8]) -> NalUnits<'_> {
    let rest = match find_start_code(stream) {
        Some((_, end)) => &stream[end..],
        None => &[],
    };
    NalUnits { rest }
}

/// Position of the next `00 00 01` and the index just past it.
fn find_start_code(data: &[u8]) -> Option<(usize, usize)> {
    data.windows(3).position(|w| w == [0, 0, 1]).map(|pos| (pos, pos + 3))
}

impl<'a> Iterator for NalUnits<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        while !self.rest.is_empty() {
            let (unit, rest) = match find_start_code(self.rest) {
                Some((start, end)) => (&self.rest[..start], &self.rest[end..]),
                None => (self.rest, &[][..]),
            };
            self.rest = rest;
            // trailing_zero_8bits and the leading zero of a 4-byte start code
            let trimmed_len = unit.iter().rposition(|&b| b != 0).map_or(0, |last| last + 1);
            if trimmed_len > 0 {
                return Some(&unit[..trimmed_len]);
            }
        }
        None
    }
}

/// Drop emulation prevention bytes: every `03` following two zero bytes.
pub fn unescape_rbsp(nal: &[u8]) -> Result<TryVec<u8>> {
    let mut out = TryVec::with_capacity(nal.len())?;
    let mut zeros = 0;
    for &b in nal {
        if zeros >= 2 && b == 3 {
            zeros = 0;
            continue;
        }
        zeros = if b == 0 { zeros + 1 } else { 0 };
        out.push(b)?;
    }
    Ok(out)
}

/// The 32-byte file header of an IVF file. Little-endian throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IvfHeader {
    pub version: u16,
    pub header_len: u16,
    /// Codec, `AV01` for AV1.
    pub fourcc: FourCC,
    pub width: u16,
    pub height: u16,
    pub timebase_num: u32,
    pub timebase_den: u32,
    pub frame_count: u32,
}

pub fn parse_ivf_header(data: &[u8]) -> Result<IvfHeader> {
    if !data.starts_with(IVF_SIGNATURE) {
        return Err(Error::InvalidData("missing DKIF signature"));
    }
    let mut src = data.get(4..32).ok_or(Error::Truncated)?;
    let version = src.read_u16::<LittleEndian>()?;
    let header_len = src.read_u16::<LittleEndian>()?;
    let mut fourcc = [0; 4];
    std::io::Read::read_exact(&mut src, &mut fourcc)?;
    let header = IvfHeader {
        version,
        header_len,
        fourcc: FourCC::from(fourcc),
        width: src.read_u16::<LittleEndian>()?,
        height: src.read_u16::<LittleEndian>()?,
        timebase_num: src.read_u32::<LittleEndian>()?,
        timebase_den: src.read_u32::<LittleEndian>()?,
        frame_count: src.read_u32::<LittleEndian>()?,
    };
    if usize::from(header.header_len) < 32 {
        return Err(Error::InvalidData("IVF header shorter than 32 bytes"));
    }
    Ok(header)
}

/// Iterator over IVF frame payloads. Stops at the first frame whose
/// declared size runs past the end of the data.
#[derive(Debug, Clone)]
pub struct IvfFrames<'a> {
    rest: &'a [u8],
}

/// Frames following a header of `header.header_len` bytes.
pub fn ivf_frames<'a>(data: &'a [u8], header: &IvfHeader) -> IvfFrames<'a> {
    IvfFrames {
        rest: data.get(usize::from(header.header_len)..).unwrap_or_default(),
    }
}

impl<'a> Iterator for IvfFrames<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let mut frame_header = self.rest.get(..IVF_FRAME_HEADER_LEN)?;
        let size = usize::try_from(frame_header.read_u32::<LittleEndian>().ok()?).ok()?;
        let end = IVF_FRAME_HEADER_LEN.checked_add(size)?;
        let Some(frame) = self.rest.get(IVF_FRAME_HEADER_LEN..end) else {
            log::warn!("IVF frame of {size} bytes runs past the end of the data");
            self.rest = &[];
            return None;
        };
        self.rest = &self.rest[end..];
        Some(frame)
    }
}

#[cfg(test)]
pub(crate) fn make_ivf(frames: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"DKIF");
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&32u16.to_le_bytes());
    out.extend_from_slice(b"AV01");
    out.extend_from_slice(&640u16.to_le_bytes());
    out.extend_from_slice(&480u16.to_le_bytes());
    out.extend_from_slice(&30u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&u32::try_from(frames.len()).unwrap().to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    for frame in frames {
        out.extend_from_slice(&u32::try_from(frame.len()).unwrap().to_le_bytes());
        out.extend_from_slice(&[0; 8]);
        out.extend_from_slice(frame);
    }
    out
}

#[test]
fn detect_signatures() {
    assert_eq!(detect(b"\0\0\0\x18ftypavif\0\0\0\0"), InputKind::Isobmff);
    assert_eq!(detect(b"DKIF\0\0\x20\0AV01"), InputKind::Ivf);
    assert_eq!(detect(&[0, 0, 0, 1, 0x67, 0x64]), InputKind::AnnexB);
    assert_eq!(detect(&[0, 0, 1, 0x40, 0x01]), InputKind::AnnexB);
    assert_eq!(detect(b"\x89PNG\r\n\x1a\n"), InputKind::Unknown);
    assert_eq!(detect(&[]), InputKind::Unknown);
}

#[test]
fn annexb_units_are_split_and_trimmed() {
    let stream = [
        0xff, // garbage before the first start code
        0, 0, 0, 1, 0x67, 0x64, 0x00, 0x1f, //
        0, 0, 1, 0x68, 0xee, 0, 0, //
        0, 0, 1, //
        0, 0, 0, 1, 0x65, 0x88,
    ];
    let units: Vec<&[u8]> = nal_units(&stream).collect();
    assert_eq!(units, [&[0x67, 0x64, 0x00, 0x1f][..], &[0x68, 0xee][..], &[0x65, 0x88][..]]);
    assert_eq!(nal_units(&[0x67, 0x64]).count(), 0);
}

#[test]
fn emulation_prevention_is_removed() {
    let rbsp = unescape_rbsp(&[0x64, 0, 0, 3, 1, 0, 0, 3, 0, 3]).unwrap();
    assert_eq!(&rbsp[..], &[0x64, 0, 0, 1, 0, 0, 0, 3]);
    assert_eq!(&unescape_rbsp(&[0, 3, 0, 0, 3]).unwrap()[..], &[0, 3, 0, 0]);
}

#[test]
fn ivf_header_and_frames() {
    let data = make_ivf(&[&[0x12, 0x00], &[0x0a, 0x01, 0xaa]]);
    let header = parse_ivf_header(&data).unwrap();
    assert_eq!(header.fourcc, FourCC::from(*b"AV01"));
    assert_eq!((header.width, header.height), (640, 480));
    assert_eq!((header.timebase_num, header.timebase_den), (30, 1));
    assert_eq!(header.frame_count, 2);
    let frames: Vec<&[u8]> = ivf_frames(&data, &header).collect();
    assert_eq!(frames, [&[0x12, 0x00][..], &[0x0a, 0x01, 0xaa][..]]);

    let cut = &data[..data.len() - 1];
    assert_eq!(ivf_frames(cut, &header).count(), 1);
    assert!(matches!(parse_ivf_header(&data[..20]), Err(Error::Truncated)));
    assert!(matches!(parse_ivf_header(b"RIFF"), Err(Error::InvalidData(_))));
}
