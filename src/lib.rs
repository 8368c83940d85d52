#![deny(unsafe_code)]
//! Structural metadata for ISO Base Media (AVIF/HEIF) containers and for
//! H.264, HEVC and AV1 parameter sets.
//!
//! Nothing here decodes pixels. The container side walks the box tree of an
//! in-memory file and summarizes it as a [`Document`]; the codec side decodes
//! individual parameter sets and OBU headers into [`CodecConfig`] records.
//! Both convert to a plain [`Value`] tree.
//!
//! Parsing never panics on hostile input and degrades to partial results:
//! a malformed box ends the walk of its enclosing range only, and a codec
//! record that runs out of bits keeps whatever fields it had already read.
//!
//! ```no_run
//! let bytes = std::fs::read("image.avif")?;
//! let doc = zenmedia_probe::Document::from_bytes(&bytes);
//! if doc.is_valid_container {
//!     println!("{:?} boxes, heif={}", doc.total_boxes, doc.is_heif);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

pub mod bits;
mod boxes;
mod codec;
mod decode;
mod document;
mod h264;
mod hevc;
mod obu;
pub mod sniff;
pub mod tables;
mod tree;
mod value;

pub use crate::boxes::{BoxType, FourCC};
pub use crate::codec::{CodecConfig, av1_obu_headers, h264_parameter_sets, hevc_parameter_sets};
pub use crate::decode::{
    Av1ConfigBox, BoxFields, CleanAperture, ColourInformation, ConstructionMethod, Extent, FileTypeBox,
    HandlerBox, HevcConfigBox, ImageSpatialExtents, ItemInfoBox, ItemInfoEntry, ItemLocation, ItemLocationBox,
    ItemReference, ItemReferenceBox, PixelInformation, PrimaryItemBox, PropertyAssociation,
    PropertyAssociationBox, Rational, SidecarVideo, VendorExtension,
};
pub use crate::document::{CropEdges, Document, Thumbnail};
pub use crate::h264::{FrameCropping, H264Pps, H264Sps};
pub use crate::hevc::HevcVps;
pub use crate::obu::{Av1ObuHeader, SequenceHeaderSummary};
pub use crate::tree::{BoxHeader, ParsedBox};
pub use crate::value::{Fields, Value};

pub use enough::{Stop, StopReason, Unstoppable};

/// A trait to indicate a type can be infallibly converted to `u64`.
/// This should only be implemented for infallible conversions, so only unsigned types are valid.
pub(crate) trait ToU64 {
    fn to_u64(self) -> u64;
}

/// Statically verify that the platform `usize` can fit within a `u64`.
impl ToU64 for usize {
    fn to_u64(self) -> u64 {
        const _: () = assert!(std::mem::size_of::<usize>() <= std::mem::size_of::<u64>());
        self as u64
    }
}

/// A trait to indicate a type can be infallibly converted to `usize`.
/// This should only be implemented for infallible conversions, so only unsigned types are valid.
pub(crate) trait ToUsize {
    fn to_usize(self) -> usize;
}

macro_rules! impl_to_usize_from {
    ( $from_type:ty ) => {
        impl ToUsize for $from_type {
            fn to_usize(self) -> usize {
                const _: () = assert!(std::mem::size_of::<$from_type>() <= std::mem::size_of::<usize>());
                self as usize
            }
        }
    };
}

impl_to_usize_from!(u8);
impl_to_usize_from!(u16);
impl_to_usize_from!(u32);

#[doc(hidden)]
pub type TryVec<T> = fallible_collections::TryVec<T>;

/// Describes parser failures.
///
/// None of these abort a container parse as a whole; they are attached to
/// the box or range where they happened (see [`Diagnostic`]) or carried as a
/// `parsing_error` string on codec records.
#[derive(Debug)]
pub enum Error {
    /// A fixed-width read past the end of the buffer.
    OutOfBounds,
    /// Declared box size inconsistent with its header or its container.
    MalformedBox(&'static str),
    /// A LEB128 or bit-packed field runs past the end of its data.
    Truncated,
    /// A single-byte bit field request that would cross into the next byte.
    BitFieldOverflow,
    /// Parse error caused by corrupt or malformed data.
    InvalidData(&'static str),
    /// Parse error caused by limited parser support rather than invalid data.
    Unsupported(&'static str),
    /// Propagate underlying errors from `std::io`.
    Io(std::io::Error),
    /// Out of memory
    OutOfMemory,
    /// Resource limit exceeded during parsing
    ResourceLimitExceeded(&'static str),
    /// Operation was stopped/cancelled
    Stopped(enough::StopReason),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::MalformedBox(s) | Self::InvalidData(s) | Self::Unsupported(s) | Self::ResourceLimitExceeded(s) => *s,
            Self::OutOfBounds => "read out of bounds",
            Self::Truncated => "truncated",
            Self::BitFieldOverflow => "bit field crosses a byte boundary",
            Self::Io(err) => return fmt::Display::fmt(err, f),
            Self::OutOfMemory => "OOM",
            Self::Stopped(reason) => return write!(f, "Stopped: {reason}"),
        };
        f.write_str(msg)
    }
}

impl std::error::Error for Error {}

impl From<bitreader::BitReaderError> for Error {
    #[cold]
    #[cfg_attr(debug_assertions, track_caller)]
    fn from(err: bitreader::BitReaderError) -> Self {
        log::debug!("bitreader: {err}");
        match err {
            bitreader::BitReaderError::NotEnoughData { .. } => Self::Truncated,
            _ => Self::InvalidData("bit field wider than its type"),
        }
    }
}

impl From<leb128::read::Error> for Error {
    fn from(err: leb128::read::Error) -> Self {
        match err {
            leb128::read::Error::IoError(_) => Self::Truncated,
            leb128::read::Error::Overflow => Self::InvalidData("LEB128 value overflows u64"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Self::Truncated,
            _ => Self::Io(err),
        }
    }
}

impl From<fallible_collections::TryReserveError> for Error {
    fn from(_: fallible_collections::TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

impl From<std::num::TryFromIntError> for Error {
    fn from(_: std::num::TryFromIntError) -> Self {
        Self::Unsupported("integer conversion failed")
    }
}

impl From<enough::StopReason> for Error {
    fn from(reason: enough::StopReason) -> Self {
        Self::Stopped(reason)
    }
}

/// Result shorthand using our Error enum.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error recorded during a container parse, with where it happened.
#[derive(Debug)]
pub struct Diagnostic {
    /// Absolute offset of the box (or range) the error belongs to.
    pub offset: u64,
    /// Type of the box being decoded, when the header could be read.
    pub box_type: Option<FourCC>,
    pub error: Error,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.box_type {
            Some(t) => write!(f, "'{t}' at {}: {}", self.offset, self.error),
            None => write!(f, "at {}: {}", self.offset, self.error),
        }
    }
}

/// Limits and validation options for a container parse.
///
/// Limits are checked before the work they guard, so a file claiming absurd
/// nesting or entry counts can't make the parser allocate or recurse without
/// bound. Hitting a limit ends the affected range and is reported in
/// [`Document::errors`]; boxes already read are kept.
///
/// # Examples
///
/// ```rust
/// use zenmedia_probe::ParseConfig;
///
/// // Default limits (suitable for most apps)
/// let config = ParseConfig::default();
///
/// // Tighter limits for untrusted uploads
/// let config = ParseConfig::default()
///     .with_max_depth(8)
///     .with_max_boxes(10_000)
///     .lenient(true);
///
/// // No limits
/// let config = ParseConfig::unlimited();
/// ```
#[derive(Debug, Clone)]
pub struct ParseConfig {
    /// Maximum container nesting depth. Never above 64, even when `None`.
    /// Default: 16
    pub max_depth: Option<u32>,

    /// Maximum number of boxes read across the whole tree.
    /// Default: 100,000
    pub max_boxes: Option<u32>,

    /// Maximum number of entries read from item tables (`iloc`, `iref`, `ipma`).
    /// Default: 65,535
    pub max_item_entries: Option<u32>,

    /// Enable lenient parsing mode.
    ///
    /// When true, non-zero flags in boxes that require zero flags and a
    /// cleared `av1C` marker bit are ignored instead of failing that box.
    /// Default: false (strict validation)
    pub lenient: bool,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            max_depth: Some(16),
            max_boxes: Some(100_000),
            max_item_entries: Some(65_535),
            lenient: false,
        }
    }
}

impl ParseConfig {
    /// Create a configuration with no resource limits.
    pub fn unlimited() -> Self {
        Self {
            max_depth: None,
            max_boxes: None,
            max_item_entries: None,
            lenient: false,
        }
    }

    /// Set the maximum container nesting depth
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set the maximum number of boxes read
    pub fn with_max_boxes(mut self, boxes: u32) -> Self {
        self.max_boxes = Some(boxes);
        self
    }

    /// Set the maximum number of item table entries
    pub fn with_max_item_entries(mut self, entries: u32) -> Self {
        self.max_item_entries = Some(entries);
        self
    }

    /// Enable lenient parsing mode
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    pub(crate) fn check_item_entries(&self, count: u64) -> Result<()> {
        match self.max_item_entries {
            Some(limit) if count > u64::from(limit) => {
                Err(Error::ResourceLimitExceeded("item entry count limit exceeded"))
            },
            _ => Ok(()),
        }
    }
}

/// Parse an in-memory ISOBMFF file with default limits.
///
/// Shorthand for [`Document::from_bytes`].
pub fn parse_container(data: &[u8]) -> Document {
    Document::from_bytes(data)
}

#[test]
fn parse_config_builder() {
    let config = ParseConfig::default().with_max_depth(3).with_max_boxes(7).with_max_item_entries(2).lenient(true);
    assert_eq!(config.max_depth, Some(3));
    assert_eq!(config.max_boxes, Some(7));
    assert!(config.lenient);
    assert!(config.check_item_entries(2).is_ok());
    assert!(matches!(config.check_item_entries(3), Err(Error::ResourceLimitExceeded(_))));
    assert!(ParseConfig::unlimited().check_item_entries(u64::MAX).is_ok());
}

#[test]
fn error_conversions() {
    let eof = std::io::Error::from(std::io::ErrorKind::UnexpectedEof);
    assert!(matches!(Error::from(eof), Error::Truncated));
    assert!(matches!(Error::from(leb128::read::Error::Overflow), Error::InvalidData(_)));
    assert_eq!(Error::BitFieldOverflow.to_string(), "bit field crosses a byte boundary");
    let d = Diagnostic { offset: 8, box_type: Some(FourCC::from(*b"ispe")), error: Error::OutOfBounds };
    assert_eq!(d.to_string(), "'ispe' at 8: read out of bounds");
}
