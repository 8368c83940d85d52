// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Box tree walk over an in-memory file.
//!
//! A range of bytes is read as a sequence of boxes. Each box is decoded on
//! its own; container boxes are walked recursively over their payload. A
//! header that can't be read, or a size that overruns the enclosing range,
//! ends the walk of that range only. Siblings already read and everything
//! outside the range are kept.

use std::ops::Range;

use enough::Stop;
use log::{debug, warn};

use crate::bits::{read_u8, read_u32_be, read_u64_be};
use crate::boxes::{BoxType, ChildLayout, FourCC};
use crate::decode::{BoxFields, decode_box};
use crate::value::{Fields, Value};
use crate::{Diagnostic, Error, ParseConfig, Result, ToU64, TryVec};

/// Basic ISO box structure.
///
/// mp4 files are a sequence of possibly-nested 'box' structures.  Each box
/// begins with a header describing the length of the box's data and a
/// four-byte box type which identifies the type of the box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxHeader {
    /// Box type.
    pub name: BoxType,
    /// Absolute offset of the first header byte.
    pub offset: usize,
    /// Size of the box in bytes, header included. A stored size of 0 is
    /// resolved to the end of the enclosing range.
    pub size: u64,
    /// 8, or 16 when a 64-bit size follows the type.
    pub header_size: u8,
    /// Absolute byte range of the payload.
    pub payload: Range<usize>,
}

impl BoxHeader {
    const MIN_SIZE: u64 = 8; // 4-byte size + 4-byte type
    const MIN_LARGE_SIZE: u64 = 16; // 4-byte size + 4-byte type + 8-byte size

    /// Offset of the first byte after this box.
    pub fn end(&self) -> usize {
        self.payload.end
    }
}

/// Read the header of the box at `offset`, which must end by `end`.
fn read_box_header(raw: &[u8], offset: usize, end: usize) -> Result<BoxHeader> {
    let available = end.saturating_sub(offset).to_u64();
    if available < BoxHeader::MIN_SIZE {
        return Err(Error::MalformedBox("truncated box header"));
    }
    let size32 = read_u32_be(raw, offset)?;
    let name = BoxType::from(read_u32_be(raw, offset + 4)?);
    let (size, header_size) = match size32 {
        // Box extends to the end of its enclosing range; usually the last top-level mdat.
        0 => (available, BoxHeader::MIN_SIZE),
        1 => {
            if available < BoxHeader::MIN_LARGE_SIZE {
                return Err(Error::MalformedBox("truncated large box header"));
            }
            let size64 = read_u64_be(raw, offset + 8)?;
            if size64 < BoxHeader::MIN_LARGE_SIZE {
                return Err(Error::MalformedBox("malformed wide size"));
            }
            (size64, BoxHeader::MIN_LARGE_SIZE)
        },
        _ => {
            if u64::from(size32) < BoxHeader::MIN_SIZE {
                return Err(Error::MalformedBox("malformed size"));
            }
            (u64::from(size32), BoxHeader::MIN_SIZE)
        },
    };
    if size > available {
        return Err(Error::MalformedBox("box extends past its container"));
    }
    let payload = offset + usize::try_from(header_size)?..offset + usize::try_from(size)?;
    Ok(BoxHeader {
        name,
        offset,
        size,
        header_size: header_size as u8,
        payload,
    })
}

/// Where the nested boxes of a container start within its payload.
fn child_offset(layout: ChildLayout, payload: &[u8]) -> Result<usize> {
    let lead = match layout {
        ChildLayout::Plain => 0,
        // QuickTime writes meta without version/flags.
        ChildLayout::FullBox if payload.get(4..8) == Some(&b"hdlr"[..]) => 0,
        ChildLayout::FullBox => 4,
        ChildLayout::ItemInfo => match read_u8(payload, 0)? {
            0 => 4 + 2,
            _ => 4 + 4,
        },
    };
    if lead > payload.len() {
        return Err(Error::MalformedBox("container header longer than its payload"));
    }
    Ok(lead)
}

/// Nesting depth no configuration can raise. The walk, the result tree and
/// its drop all recurse once per level.
pub(crate) const MAX_NESTING: u32 = 64;

/// One box of the tree, with its decoded fields and children.
#[derive(Debug)]
pub struct ParsedBox {
    pub header: BoxHeader,
    pub fields: BoxFields,
    /// Nested boxes, for containers.
    pub children: TryVec<ParsedBox>,
    /// Set when the payload failed to decode.
    pub error: Option<String>,
}

impl ParsedBox {
    pub fn box_type(&self) -> FourCC {
        self.header.name.into()
    }

    /// Payload bytes of this box within the buffer it was parsed from.
    pub fn payload<'a>(&self, raw: &'a [u8]) -> &'a [u8] {
        raw.get(self.header.payload.clone()).unwrap_or_default()
    }

    /// This box and all of its descendants, depth first.
    pub fn walk(&self) -> impl Iterator<Item = &Self> {
        walk(std::slice::from_ref(self))
    }

    /// First box of type `name` in [`ParsedBox::walk`] order.
    pub fn find(&self, name: BoxType) -> Option<&Self> {
        self.walk().find(|b| b.header.name == name)
    }

    pub fn to_value(&self) -> Value {
        let mut fields = Fields::new().with("type", self.box_type());
        let decoded = self.fields.to_fields();
        if !decoded.is_empty() {
            fields.insert("fields", decoded);
        }
        if !self.children.is_empty() {
            fields.insert("children", Value::List(self.children.iter().map(Self::to_value).collect()));
        }
        fields.into()
    }
}

/// Every box of `roots` and their descendants, depth first.
pub(crate) fn walk(roots: &[ParsedBox]) -> impl Iterator<Item = &ParsedBox> {
    let mut stack: Vec<&ParsedBox> = roots.iter().rev().collect();
    std::iter::from_fn(move || {
        let next = stack.pop()?;
        stack.extend(next.children.as_slice().iter().rev());
        Some(next)
    })
}

pub(crate) struct TreeParser<'a> {
    raw: &'a [u8],
    config: &'a ParseConfig,
    stop: &'a dyn Stop,
    boxes_read: u32,
    halted: bool,
    diagnostics: TryVec<Diagnostic>,
}

impl<'a> TreeParser<'a> {
    pub(crate) fn new(raw: &'a [u8], config: &'a ParseConfig, stop: &'a dyn Stop) -> Self {
        Self {
            raw,
            config,
            stop,
            boxes_read: 0,
            halted: false,
            diagnostics: TryVec::new(),
        }
    }

    /// Walk the whole buffer as the top-level box sequence.
    pub(crate) fn parse(mut self) -> (TryVec<ParsedBox>, TryVec<Diagnostic>) {
        let boxes = self.parse_range(0, self.raw.len(), 0);
        (boxes, self.diagnostics)
    }

    fn record(&mut self, offset: usize, box_type: Option<FourCC>, error: Error) {
        warn!("{box_type:?} at {offset}: {error}");
        let diagnostic = Diagnostic {
            offset: offset.to_u64(),
            box_type,
            error,
        };
        if self.diagnostics.push(diagnostic).is_err() {
            self.halted = true;
        }
    }

    fn parse_range(&mut self, start: usize, end: usize, depth: u32) -> TryVec<ParsedBox> {
        let mut boxes = TryVec::new();
        let mut offset = start;
        while offset < end && !self.halted {
            if let Err(reason) = self.stop.check() {
                self.record(offset, None, reason.into());
                self.halted = true;
                break;
            }
            if self.config.max_boxes.is_some_and(|limit| self.boxes_read >= limit) {
                self.record(offset, None, Error::ResourceLimitExceeded("box count limit exceeded"));
                self.halted = true;
                break;
            }

            let header = match read_box_header(self.raw, offset, end) {
                Ok(header) => header,
                Err(e) => {
                    let box_type = read_u32_be(self.raw, offset + 4).ok().filter(|_| offset + 8 <= end).map(FourCC::from);
                    self.record(offset, box_type, e);
                    break;
                },
            };
            self.boxes_read += 1;
            offset = header.end();

            let parsed = self.parse_box(header, depth);
            if boxes.push(parsed).is_err() {
                self.record(offset, None, Error::OutOfMemory);
                self.halted = true;
            }
        }
        boxes
    }

    fn parse_box(&mut self, header: BoxHeader, depth: u32) -> ParsedBox {
        let raw = self.raw;
        let payload = raw.get(header.payload.clone()).unwrap_or_default();
        debug!("{:?} at {} size {}", header.name, header.offset, header.size);

        let (fields, error) = decode_box(header.name, payload, header.payload.start.to_u64(), self.config);
        let error = error.map(|e| {
            let message = e.to_string();
            self.record(header.offset, Some(header.name.into()), e);
            message
        });

        let mut children = TryVec::new();
        if let Some(layout) = header.name.child_layout() {
            let limit = self.config.max_depth.map_or(MAX_NESTING, |limit| limit.min(MAX_NESTING));
            if depth >= limit {
                self.record(
                    header.offset,
                    Some(header.name.into()),
                    Error::ResourceLimitExceeded("nesting depth limit exceeded"),
                );
            } else {
                match child_offset(layout, payload) {
                    Ok(lead) => children = self.parse_range(header.payload.start + lead, header.payload.end, depth + 1),
                    Err(e) => self.record(header.offset, Some(header.name.into()), e),
                }
            }
        }

        ParsedBox {
            header,
            fields,
            children,
            error,
        }
    }
}

#[cfg(test)]
pub(crate) fn make_box(name: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let size = u32::try_from(payload.len() + 8).unwrap();
    let mut out = Vec::from(size.to_be_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
fn parse_all(raw: &[u8], config: &ParseConfig) -> (TryVec<ParsedBox>, TryVec<Diagnostic>) {
    TreeParser::new(raw, config, &enough::Unstoppable).parse()
}

#[test]
fn offsets_advance_by_box_size() {
    let mut raw = make_box(b"free", &[0; 4]);
    raw.extend(make_box(b"skip", &[]));
    raw.extend(make_box(b"zzzz", &[1, 2, 3]));
    let (boxes, diagnostics) = parse_all(&raw, &ParseConfig::default());
    assert!(diagnostics.is_empty());
    assert_eq!(boxes.len(), 3);
    let mut expected = 0;
    for b in boxes.iter() {
        assert_eq!(b.header.offset, expected);
        expected += usize::try_from(b.header.size).unwrap();
    }
    assert_eq!(expected, raw.len());
    assert_eq!(boxes[2].payload(&raw), [1, 2, 3]);
    assert!(boxes[2].fields == BoxFields::Opaque);
}

#[test]
fn size_zero_runs_to_end_of_range() {
    let mut raw = make_box(b"free", &[]);
    raw.extend_from_slice(&[0, 0, 0, 0]);
    raw.extend_from_slice(b"mdat");
    raw.extend_from_slice(&[9; 20]);
    let (boxes, diagnostics) = parse_all(&raw, &ParseConfig::default());
    assert!(diagnostics.is_empty());
    let mdat = &boxes[1];
    assert_eq!(mdat.header.size, 28);
    assert_eq!(mdat.header.header_size, 8);
    assert_eq!(mdat.header.payload, 16..36);
}

#[test]
fn large_size_header() {
    let mut raw = Vec::from([0, 0, 0, 1]);
    raw.extend_from_slice(b"free");
    raw.extend_from_slice(&24u64.to_be_bytes());
    raw.extend_from_slice(&[0; 8]);
    let (boxes, diagnostics) = parse_all(&raw, &ParseConfig::default());
    assert!(diagnostics.is_empty());
    assert_eq!(boxes[0].header.header_size, 16);
    assert_eq!(boxes[0].header.payload, 16..24);
}

#[test]
fn oversized_box_stops_its_range_only() {
    // moov { free(ok), free(claims 100 bytes) } followed by a valid top-level box
    let mut inner = make_box(b"free", &[]);
    inner.extend_from_slice(&100u32.to_be_bytes());
    inner.extend_from_slice(b"free");
    let mut raw = make_box(b"moov", &inner);
    raw.extend(make_box(b"skip", &[]));

    let (boxes, diagnostics) = parse_all(&raw, &ParseConfig::default());
    assert_eq!(boxes.len(), 2);
    assert_eq!(boxes[0].children.len(), 1);
    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(diagnostics[0].error, Error::MalformedBox(_)));
    assert_eq!(diagnostics[0].offset, 16);
    assert!(diagnostics[0].box_type.is_some_and(|t| t == b"free"));
}

#[test]
fn undersized_box_is_malformed() {
    let mut raw = Vec::from([0, 0, 0, 4]);
    raw.extend_from_slice(b"free");
    let (boxes, diagnostics) = parse_all(&raw, &ParseConfig::default());
    assert!(boxes.is_empty());
    assert!(matches!(diagnostics[0].error, Error::MalformedBox("malformed size")));
}

#[test]
fn meta_children_follow_full_box_header() {
    let hdlr = make_box(b"hdlr", &[0; 25]);
    let mut meta_payload = Vec::from([0, 0, 0, 0]);
    meta_payload.extend(&hdlr);
    let raw = make_box(b"meta", &meta_payload);
    let (boxes, _) = parse_all(&raw, &ParseConfig::default());
    assert_eq!(boxes[0].children.len(), 1);
    assert_eq!(boxes[0].children[0].header.name, BoxType::HandlerBox);

    // QuickTime style, no version/flags
    let raw = make_box(b"meta", &hdlr);
    let (boxes, _) = parse_all(&raw, &ParseConfig::default());
    assert_eq!(boxes[0].children[0].header.offset, 8);
}

#[test]
fn depth_and_box_limits() {
    let mut raw = make_box(b"stbl", &make_box(b"free", &[]));
    for _ in 0..3 {
        raw = make_box(b"trak", &raw);
    }
    let (boxes, diagnostics) = parse_all(&raw, &ParseConfig::default().with_max_depth(2));
    assert_eq!(boxes[0].walk().count(), 3);
    assert!(matches!(diagnostics[0].error, Error::ResourceLimitExceeded(_)));

    let (boxes, diagnostics) = parse_all(&raw, &ParseConfig::default().with_max_boxes(2));
    assert_eq!(boxes[0].walk().count(), 2);
    assert!(matches!(diagnostics[0].error, Error::ResourceLimitExceeded(_)));

    let (boxes, diagnostics) = parse_all(&raw, &ParseConfig::unlimited());
    assert!(diagnostics.is_empty());
    assert!(boxes[0].find(BoxType::FreeSpaceBox).is_some());
}

#[test]
fn nesting_is_capped_without_limits() {
    const LEVELS: u32 = 100_000;
    let mut raw = Vec::new();
    for level in 0..LEVELS {
        raw.extend_from_slice(&(8 * (LEVELS - level)).to_be_bytes());
        raw.extend_from_slice(b"trak");
    }
    let (boxes, diagnostics) = parse_all(&raw, &ParseConfig::unlimited());
    assert_eq!(boxes[0].walk().count(), MAX_NESTING as usize + 1);
    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(diagnostics[0].error, Error::ResourceLimitExceeded(_)));
    assert_eq!(diagnostics[0].offset, 8 * u64::from(MAX_NESTING));

    // a configured depth above the ceiling is held to it
    let (boxes, _) = parse_all(&raw, &ParseConfig::default().with_max_depth(1_000));
    assert_eq!(boxes[0].walk().count(), MAX_NESTING as usize + 1);
}

#[test]
fn stop_is_recorded() {
    struct Cancelled;
    impl Stop for Cancelled {
        fn check(&self) -> std::result::Result<(), enough::StopReason> {
            Err(enough::StopReason::Cancelled)
        }
    }
    let raw = make_box(b"free", &[]);
    let config = ParseConfig::default();
    let (boxes, diagnostics) = TreeParser::new(&raw, &config, &Cancelled).parse();
    assert!(boxes.is_empty());
    assert!(matches!(diagnostics[0].error, Error::Stopped(enough::StopReason::Cancelled)));
}
