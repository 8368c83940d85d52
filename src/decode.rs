// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Payload decoders for the box types we understand.
//!
//! Each decoder sees exactly one box payload (the bytes after the header)
//! and never looks outside it.

use arrayvec::ArrayVec;
use bitreader::BitReader;
use byteorder::ReadBytesExt;
use log::{debug, warn};

use crate::bits::{read_bits, read_flag, read_u8, read_u16_be, read_u32_be};
use crate::boxes::{BoxType, FourCC};
use crate::tables;
use crate::value::{Fields, Value};
use crate::{Error, ParseConfig, Result, ToU64, ToUsize, TryVec};

/// Decoded contents of one box.
#[derive(Debug, PartialEq)]
pub enum BoxFields {
    FileType(FileTypeBox),
    Av1Config(Av1ConfigBox),
    ItemInfo(ItemInfoBox),
    ItemInfoEntry(ItemInfoEntry),
    ItemLocation(ItemLocationBox),
    PrimaryItem(PrimaryItemBox),
    ItemReference(ItemReferenceBox),
    PropertyAssociation(PropertyAssociationBox),
    ColourInformation(ColourInformation),
    ImageSpatialExtents(ImageSpatialExtents),
    PixelInformation(PixelInformation),
    CleanAperture(CleanAperture),
    Handler(HandlerBox),
    VendorExtension(VendorExtension),
    HevcConfig(HevcConfigBox),
    MotionPhotoVideo(SidecarVideo),
    /// Only nested boxes, no fields of its own.
    Container,
    /// Payload not decoded (unknown type, media data, or a failed decode).
    Opaque,
}

impl BoxFields {
    pub fn to_fields(&self) -> Fields {
        match self {
            Self::FileType(b) => b.to_fields(),
            Self::Av1Config(b) => b.to_fields(),
            Self::ItemInfo(b) => b.to_fields(),
            Self::ItemInfoEntry(b) => b.to_fields(),
            Self::ItemLocation(b) => b.to_fields(),
            Self::PrimaryItem(b) => Fields::new().with("item_id", b.item_id),
            Self::ItemReference(b) => b.to_fields(),
            Self::PropertyAssociation(b) => b.to_fields(),
            Self::ColourInformation(b) => b.to_fields(),
            Self::ImageSpatialExtents(b) => b.to_fields(),
            Self::PixelInformation(b) => b.to_fields(),
            Self::CleanAperture(b) => b.to_fields(),
            Self::Handler(b) => b.to_fields(),
            Self::VendorExtension(b) => b.to_fields(),
            Self::HevcConfig(b) => b.to_fields(),
            Self::MotionPhotoVideo(b) => b.to_fields(),
            Self::Container | Self::Opaque => Fields::new(),
        }
    }
}

/// Decode one payload. A failed decode yields [`BoxFields::Opaque`] plus the
/// error, unless the decoder could keep a partial result.
pub(crate) fn decode_box(
    name: BoxType,
    payload: &[u8],
    payload_offset: u64,
    config: &ParseConfig,
) -> (BoxFields, Option<Error>) {
    let decoded = match name {
        BoxType::FileTypeBox => read_ftyp(payload).map(BoxFields::FileType),
        BoxType::AV1CodecConfigurationBox => read_av1c(payload, config).map(BoxFields::Av1Config),
        BoxType::ItemInfoBox => read_iinf(payload, config).map(BoxFields::ItemInfo),
        BoxType::ItemInfoEntry => read_infe(payload).map(BoxFields::ItemInfoEntry),
        BoxType::ItemLocationBox => {
            return match read_iloc(payload, config) {
                Ok((iloc, partial)) => (BoxFields::ItemLocation(iloc), partial),
                Err(e) => (BoxFields::Opaque, Some(e)),
            };
        },
        BoxType::PrimaryItemBox => read_pitm(payload, config).map(BoxFields::PrimaryItem),
        BoxType::ImageReferenceBox => read_iref(payload, config).map(BoxFields::ItemReference),
        BoxType::ItemPropertyAssociationBox => read_ipma(payload, config).map(BoxFields::PropertyAssociation),
        BoxType::ColourInformationBox => read_colr(payload, payload_offset).map(BoxFields::ColourInformation),
        BoxType::ImageSpatialExtentsBox => read_ispe(payload, config).map(BoxFields::ImageSpatialExtents),
        BoxType::PixelInformationBox => read_pixi(payload, config).map(BoxFields::PixelInformation),
        BoxType::CleanApertureBox => read_clap(payload).map(BoxFields::CleanAperture),
        BoxType::HandlerBox => read_hdlr(payload, config).map(BoxFields::Handler),
        BoxType::UuidBox => read_uuid(payload, payload_offset).map(BoxFields::VendorExtension),
        BoxType::HEVCConfigurationBox => read_hvcc(payload).map(BoxFields::HevcConfig),
        BoxType::MotionPhotoVideoBox => Ok(BoxFields::MotionPhotoVideo(SidecarVideo {
            offset: payload_offset,
            size: payload.len().to_u64(),
        })),
        t if t.child_layout().is_some() => Ok(BoxFields::Container),
        _ => Ok(BoxFields::Opaque),
    };
    match decoded {
        Ok(fields) => (fields, None),
        Err(e) => {
            debug!("{name:?} decode failed: {e}");
            (BoxFields::Opaque, Some(e))
        },
    }
}

/// See ISO 14496-12:2015 § 4.2
fn read_fullbox_extra<T: ReadBytesExt>(src: &mut T) -> Result<(u8, u32)> {
    let version = src.read_u8()?;
    let flags = src.read_u24::<byteorder::BigEndian>()?;
    Ok((version, flags))
}

// Parse the extra fields for a full box whose flag fields must be zero.
fn read_fullbox_version_no_flags<T: ReadBytesExt>(src: &mut T, config: &ParseConfig) -> Result<u8> {
    let (version, flags) = read_fullbox_extra(src)?;

    if flags != 0 && !config.lenient {
        return Err(Error::Unsupported("expected flags to be 0"));
    }

    Ok(version)
}

fn be_u16<T: ReadBytesExt>(src: &mut T) -> Result<u16> {
    src.read_u16::<byteorder::BigEndian>().map_err(From::from)
}

fn be_u32<T: ReadBytesExt>(src: &mut T) -> Result<u32> {
    src.read_u32::<byteorder::BigEndian>().map_err(From::from)
}

/// Null-terminated UTF-8 string; a missing terminator takes the rest.
fn read_cstring(src: &mut &[u8]) -> String {
    let bytes = *src;
    let (text, rest) = match bytes.iter().position(|&b| b == 0) {
        Some(nul) => (&bytes[..nul], &bytes[nul + 1..]),
        None => (bytes, &bytes[bytes.len()..]),
    };
    *src = rest;
    String::from_utf8_lossy(text).into_owned()
}

fn list<T>(items: &[T], f: impl Fn(&T) -> Value) -> Value {
    Value::List(items.iter().map(f).collect())
}

/// See ISO 14496-12:2015 § 4.3
#[derive(Debug, PartialEq)]
pub struct FileTypeBox {
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: TryVec<FourCC>,
}

impl FileTypeBox {
    /// Any of the major or compatible brands marks the file as HEIF.
    pub fn is_heif(&self) -> bool {
        tables::is_heif_brand(self.major_brand) || self.compatible_brands.iter().any(|&b| tables::is_heif_brand(b))
    }

    pub fn to_fields(&self) -> Fields {
        Fields::new()
            .with("major_brand", self.major_brand)
            .with("major_brand_name", tables::brand_name(self.major_brand))
            .with("minor_version", self.minor_version)
            .with("compatible_brands", list(&self.compatible_brands, |&b| b.into()))
    }
}

fn read_ftyp(mut src: &[u8]) -> Result<FileTypeBox> {
    let major = be_u32(&mut src)?;
    let minor = be_u32(&mut src)?;
    if src.len() % 4 != 0 {
        debug!("ignoring {} trailing bytes in ftyp", src.len() % 4);
    }
    let brand_count = src.len() / 4;
    let mut brands = TryVec::with_capacity(brand_count)?;
    for _ in 0..brand_count {
        brands.push(be_u32(&mut src)?.into())?;
    }
    Ok(FileTypeBox {
        major_brand: From::from(major),
        minor_version: minor,
        compatible_brands: brands,
    })
}

/// AV1 codec configuration record.
/// See AV1 Codec ISO Media File Format Binding § 2.3
#[derive(Debug, Clone, PartialEq)]
pub struct Av1ConfigBox {
    pub marker: bool,
    pub version: u8,
    pub seq_profile: u8,
    pub seq_level_idx_0: u8,
    pub seq_tier_0: bool,
    pub high_bitdepth: bool,
    pub twelve_bit: bool,
    pub monochrome: bool,
    pub chroma_subsampling_x: bool,
    pub chroma_subsampling_y: bool,
    pub chroma_sample_position: u8,
    pub initial_presentation_delay: Option<u8>,
    /// Length of the trailing configOBUs.
    pub config_obus_size: usize,
}

impl Av1ConfigBox {
    pub fn bit_depth(&self) -> u8 {
        match (self.seq_profile, self.high_bitdepth, self.twelve_bit) {
            (2, true, true) => 12,
            (_, true, _) => 10,
            _ => 8,
        }
    }

    pub fn chroma_subsampling(&self) -> &'static str {
        if self.monochrome {
            return "4:0:0";
        }
        match (self.chroma_subsampling_x, self.chroma_subsampling_y) {
            (true, true) => "4:2:0",
            (true, false) => "4:2:2",
            (false, false) => "4:4:4",
            (false, true) => tables::UNKNOWN,
        }
    }

    pub fn to_fields(&self) -> Fields {
        Fields::new()
            .with("version", self.version)
            .with("seq_profile", self.seq_profile)
            .with("profile", tables::av1_profile_name(self.seq_profile))
            .with("seq_level_idx_0", self.seq_level_idx_0)
            .with("level", tables::av1_level_name(self.seq_level_idx_0))
            .with("tier", if self.seq_tier_0 { "High" } else { "Main" })
            .with("bit_depth", self.bit_depth())
            .with("monochrome", self.monochrome)
            .with("chroma_subsampling", self.chroma_subsampling())
            .with("chroma_sample_position", self.chroma_sample_position)
            .with("initial_presentation_delay", self.initial_presentation_delay)
            .with("config_obus_size", self.config_obus_size)
    }
}

fn read_av1c(payload: &[u8], config: &ParseConfig) -> Result<Av1ConfigBox> {
    let b0 = read_u8(payload, 0)?;
    let b1 = read_u8(payload, 1)?;
    let b2 = read_u8(payload, 2)?;
    let b3 = read_u8(payload, 3)?;

    let marker = read_flag(b0, 0)?;
    if !marker && !config.lenient {
        return Err(Error::InvalidData("av1C marker bit is not set"));
    }
    let delay_present = read_flag(b3, 3)?;
    let delay_minus_one = read_bits(b3, 4, 4)?;

    Ok(Av1ConfigBox {
        marker,
        version: read_bits(b0, 1, 7)?,
        seq_profile: read_bits(b1, 0, 3)?,
        seq_level_idx_0: read_bits(b1, 3, 5)?,
        seq_tier_0: read_flag(b2, 0)?,
        high_bitdepth: read_flag(b2, 1)?,
        twelve_bit: read_flag(b2, 2)?,
        monochrome: read_flag(b2, 3)?,
        chroma_subsampling_x: read_flag(b2, 4)?,
        chroma_subsampling_y: read_flag(b2, 5)?,
        chroma_sample_position: read_bits(b2, 6, 2)?,
        initial_presentation_delay: delay_present.then_some(delay_minus_one + 1),
        config_obus_size: payload.len() - 4,
    })
}

/// Header of an Item Information Box; the entries are its child boxes.
/// See ISO 14496-12:2015 § 8.11.6
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemInfoBox {
    pub version: u8,
    pub entry_count: u32,
}

impl ItemInfoBox {
    pub fn to_fields(&self) -> Fields {
        Fields::new().with("version", self.version).with("entry_count", self.entry_count)
    }
}

fn read_iinf(mut src: &[u8], config: &ParseConfig) -> Result<ItemInfoBox> {
    let version = read_fullbox_version_no_flags(&mut src, config)?;

    let entry_count = match version {
        0 => be_u16(&mut src)?.into(),
        1 => be_u32(&mut src)?,
        _ => return Err(Error::Unsupported("unsupported iinf version")),
    };
    config.check_item_entries(entry_count.into())?;

    Ok(ItemInfoBox { version, entry_count })
}

/// See ISO 14496-12:2015 § 8.11.6.2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemInfoEntry {
    pub version: u8,
    pub item_id: u32,
    pub item_protection_index: u16,
    /// Absent before version 2.
    pub item_type: Option<FourCC>,
    pub item_name: String,
    pub content_type: Option<String>,
}

impl ItemInfoEntry {
    pub fn to_fields(&self) -> Fields {
        Fields::new()
            .with("item_id", self.item_id)
            .with("item_type", self.item_type)
            .with("item_name", self.item_name.as_str())
            .with("content_type", self.content_type.as_deref())
            .with("protected", self.item_protection_index != 0)
    }
}

fn read_infe(mut src: &[u8]) -> Result<ItemInfoEntry> {
    // According to the standard, it seems the flags field should be 0, but
    // at least one sample AVIF image has a nonzero value.
    let (version, _) = read_fullbox_extra(&mut src)?;

    let item_id = match version {
        0..=2 => be_u16(&mut src)?.into(),
        3 => be_u32(&mut src)?,
        _ => return Err(Error::Unsupported("unsupported version in 'infe' box")),
    };
    let item_protection_index = be_u16(&mut src)?;

    let item_type = if version >= 2 {
        Some(FourCC::from(be_u32(&mut src)?))
    } else {
        None
    };
    let item_name = read_cstring(&mut src);
    let content_type = match item_type {
        None => Some(read_cstring(&mut src)).filter(|s| !s.is_empty()),
        Some(t) if t == b"mime" => Some(read_cstring(&mut src)),
        Some(_) => None,
    };
    debug!("infe item_id {item_id} item_type: {item_type:?}");

    Ok(ItemInfoEntry {
        version,
        item_id,
        item_protection_index,
        item_type,
        item_name,
        content_type,
    })
}

/// Potential sizes (in bytes) of variable-sized fields of the 'iloc' box
/// See ISO 14496-12:2015 § 8.11.3
#[derive(Debug, Clone, Copy)]
enum IlocFieldSize {
    Zero,
    Four,
    Eight,
}

impl IlocFieldSize {
    const fn to_bits(self) -> u8 {
        match self {
            Self::Zero => 0,
            Self::Four => 32,
            Self::Eight => 64,
        }
    }

    const fn to_bytes(self) -> u8 {
        self.to_bits() / 8
    }
}

impl TryFrom<u8> for IlocFieldSize {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Zero),
            4 => Ok(Self::Four),
            8 => Ok(Self::Eight),
            _ => Err(Error::InvalidData("value must be in the set {0, 4, 8}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum IlocVersion {
    Zero,
    One,
    Two,
}

impl TryFrom<u8> for IlocVersion {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Zero),
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            _ => Err(Error::Unsupported("unsupported version in 'iloc' box")),
        }
    }
}

/// See ISO 14496-12:2015 § 8.11.3
#[derive(Debug, PartialEq)]
pub struct ItemLocationBox {
    pub version: u8,
    /// Field widths in bytes, each 0, 4 or 8.
    pub offset_size: u8,
    pub length_size: u8,
    pub base_offset_size: u8,
    /// Absent in version 0.
    pub index_size: Option<u8>,
    pub item_count: u32,
    /// May hold fewer than `item_count` entries when the table was cut short.
    pub items: TryVec<ItemLocation>,
}

#[derive(Debug, PartialEq)]
pub struct ItemLocation {
    pub item_id: u32,
    pub construction_method: ConstructionMethod,
    pub data_reference_index: u16,
    pub base_offset: u64,
    pub extents: TryVec<Extent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstructionMethod {
    File,
    Idat,
    Item,
}

impl ConstructionMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Idat => "idat",
            Self::Item => "item",
        }
    }
}

/// One extent. `offset` already includes the item's base offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Extent {
    pub index: Option<u64>,
    pub offset: u64,
    /// Zero means the extent runs to the end of its source.
    pub length: u64,
}

impl ItemLocationBox {
    pub fn to_fields(&self) -> Fields {
        Fields::new()
            .with("version", self.version)
            .with("offset_size", self.offset_size)
            .with("length_size", self.length_size)
            .with("base_offset_size", self.base_offset_size)
            .with("index_size", self.index_size)
            .with("item_count", self.item_count)
            .with(
                "items",
                list(&self.items, |item| {
                    Fields::new()
                        .with("item_id", item.item_id)
                        .with("construction_method", item.construction_method.as_str())
                        .with("data_reference_index", item.data_reference_index)
                        .with("base_offset", item.base_offset)
                        .with(
                            "extents",
                            list(&item.extents, |e| {
                                Fields::new()
                                    .with("index", e.index)
                                    .with("offset", e.offset)
                                    .with("length", e.length)
                                    .into()
                            }),
                        )
                        .into()
                }),
            )
    }
}

/// The header always decodes if present; a table that fails part way
/// keeps the items read so far and returns the error alongside.
fn read_iloc(mut src: &[u8], config: &ParseConfig) -> Result<(ItemLocationBox, Option<Error>)> {
    let version: IlocVersion = read_fullbox_version_no_flags(&mut src, config)?.try_into()?;

    let sizes = read_u8(src, 0)?;
    let more_sizes = read_u8(src, 1)?;
    let offset_size: IlocFieldSize = read_bits(sizes, 0, 4)?.try_into()?;
    let length_size: IlocFieldSize = read_bits(sizes, 4, 4)?.try_into()?;
    let base_offset_size: IlocFieldSize = read_bits(more_sizes, 0, 4)?.try_into()?;
    let index_size: Option<IlocFieldSize> = match version {
        IlocVersion::One | IlocVersion::Two => Some(read_bits(more_sizes, 4, 4)?.try_into()?),
        IlocVersion::Zero => None,
    };

    let mut iloc = BitReader::new(src.get(2..).ok_or(Error::OutOfBounds)?);
    let item_count = match version {
        IlocVersion::Zero | IlocVersion::One => iloc.read_u32(16)?,
        IlocVersion::Two => iloc.read_u32(32)?,
    };

    let mut items = TryVec::new();
    let sizes = IlocSizes { offset_size, length_size, base_offset_size, index_size };
    let error = read_iloc_items(&mut iloc, version, sizes, item_count, config, &mut items).err();
    if error.is_none() && iloc.remaining() != 0 {
        warn!("{} trailing bits in iloc", iloc.remaining());
    }

    let iloc_box = ItemLocationBox {
        version: match version {
            IlocVersion::Zero => 0,
            IlocVersion::One => 1,
            IlocVersion::Two => 2,
        },
        offset_size: offset_size.to_bytes(),
        length_size: length_size.to_bytes(),
        base_offset_size: base_offset_size.to_bytes(),
        index_size: index_size.map(IlocFieldSize::to_bytes),
        item_count,
        items,
    };
    Ok((iloc_box, error))
}

#[derive(Clone, Copy)]
struct IlocSizes {
    offset_size: IlocFieldSize,
    length_size: IlocFieldSize,
    base_offset_size: IlocFieldSize,
    index_size: Option<IlocFieldSize>,
}

fn read_iloc_items(
    iloc: &mut BitReader<'_>,
    version: IlocVersion,
    sizes: IlocSizes,
    item_count: u32,
    config: &ParseConfig,
    items: &mut TryVec<ItemLocation>,
) -> Result<()> {
    config.check_item_entries(item_count.into())?;

    for _ in 0..item_count {
        let item_id = match version {
            IlocVersion::Zero | IlocVersion::One => iloc.read_u32(16)?,
            IlocVersion::Two => iloc.read_u32(32)?,
        };

        // Version 0 has no construction_method field; it means file offsets.
        let construction_method = match version {
            IlocVersion::Zero => ConstructionMethod::File,
            IlocVersion::One | IlocVersion::Two => {
                let _reserved = iloc.read_u16(12)?;
                match iloc.read_u16(4)? {
                    0 => ConstructionMethod::File,
                    1 => ConstructionMethod::Idat,
                    2 => ConstructionMethod::Item,
                    _ => return Err(Error::InvalidData("construction_method is taken from the set 0, 1 or 2")),
                }
            },
        };

        let data_reference_index = iloc.read_u16(16)?;
        let base_offset = iloc.read_u64(sizes.base_offset_size.to_bits())?;
        let extent_count = iloc.read_u16(16)?;

        let mut extents = TryVec::with_capacity(extent_count.to_usize())?;
        for _ in 0..extent_count {
            let index = match sizes.index_size {
                None | Some(IlocFieldSize::Zero) => None,
                Some(index_size) => Some(iloc.read_u64(index_size.to_bits())?),
            };

            // A zero-width offset field reads as 0, which is the implied default.
            let extent_offset = iloc.read_u64(sizes.offset_size.to_bits())?;
            let length = iloc.read_u64(sizes.length_size.to_bits())?;
            let offset = base_offset
                .checked_add(extent_offset)
                .ok_or(Error::InvalidData("offset calculation overflow"))?;

            extents.push(Extent { index, offset, length })?;
        }

        items.push(ItemLocation {
            item_id,
            construction_method,
            data_reference_index,
            base_offset,
            extents,
        })?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryItemBox {
    pub item_id: u32,
}

fn read_pitm(mut src: &[u8], config: &ParseConfig) -> Result<PrimaryItemBox> {
    let version = read_fullbox_version_no_flags(&mut src, config)?;

    let item_id = match version {
        0 => be_u16(&mut src)?.into(),
        1 => be_u32(&mut src)?,
        _ => return Err(Error::Unsupported("unsupported pitm version")),
    };

    Ok(PrimaryItemBox { item_id })
}

/// See ISO 14496-12:2015 § 8.11.12
#[derive(Debug, PartialEq)]
pub struct ItemReferenceBox {
    pub version: u8,
    pub references: TryVec<ItemReference>,
}

/// One SingleItemTypeReferenceBox.
#[derive(Debug, PartialEq)]
pub struct ItemReference {
    pub reference_type: FourCC,
    pub from_item_id: u32,
    pub to_item_ids: TryVec<u32>,
}

impl ItemReferenceBox {
    /// Items that `to_item_id` is referenced from with the given type.
    pub fn referencing(&self, reference_type: &[u8; 4], to_item_id: u32) -> impl Iterator<Item = u32> + '_ {
        let reference_type = *reference_type;
        self.references
            .iter()
            .filter(move |r| r.reference_type == &reference_type && r.to_item_ids.contains(&to_item_id))
            .map(|r| r.from_item_id)
    }

    pub fn to_fields(&self) -> Fields {
        Fields::new().with(
            "references",
            list(&self.references, |r| {
                Fields::new()
                    .with("type", r.reference_type)
                    .with("from_item_id", r.from_item_id)
                    .with("to_item_ids", list(&r.to_item_ids, |&id| id.into()))
                    .into()
            }),
        )
    }
}

fn read_iref(mut src: &[u8], config: &ParseConfig) -> Result<ItemReferenceBox> {
    let version = read_fullbox_version_no_flags(&mut src, config)?;
    if version > 1 {
        return Err(Error::Unsupported("iref version"));
    }

    let mut references = TryVec::new();
    let mut total: u64 = 0;
    while !src.is_empty() {
        let size = be_u32(&mut src)?.to_usize();
        let reference_type = FourCC::from(be_u32(&mut src)?);
        let body_len = size.checked_sub(8).ok_or(Error::InvalidData("malformed iref child size"))?;
        if body_len > src.len() {
            return Err(Error::InvalidData("iref child extends past its parent"));
        }
        let (mut body, rest) = src.split_at(body_len);
        src = rest;

        let from_item_id = if version == 0 {
            be_u16(&mut body)?.into()
        } else {
            be_u32(&mut body)?
        };
        let reference_count = be_u16(&mut body)?;
        total += u64::from(reference_count);
        config.check_item_entries(total)?;

        let mut to_item_ids = TryVec::with_capacity(reference_count.to_usize())?;
        for _ in 0..reference_count {
            let to_item_id = if version == 0 {
                be_u16(&mut body)?.into()
            } else {
                be_u32(&mut body)?
            };
            if from_item_id == to_item_id {
                return Err(Error::InvalidData("from_item_id and to_item_id must be different"));
            }
            to_item_ids.push(to_item_id)?;
        }
        references.push(ItemReference {
            reference_type,
            from_item_id,
            to_item_ids,
        })?;
    }
    Ok(ItemReferenceBox { version, references })
}

/// See ISO 23008-12:2017 § 9.3
#[derive(Debug, PartialEq)]
pub struct PropertyAssociationBox {
    pub entries: TryVec<PropertyAssociation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyAssociation {
    pub item_id: u32,
    pub essential: bool,
    /// 1-based index into `ipco`; 0 means no property.
    pub property_index: u16,
}

impl PropertyAssociationBox {
    pub fn for_item(&self, item_id: u32) -> impl Iterator<Item = &PropertyAssociation> + '_ {
        self.entries.iter().filter(move |a| a.item_id == item_id)
    }

    pub fn to_fields(&self) -> Fields {
        Fields::new().with(
            "associations",
            list(&self.entries, |a| {
                Fields::new()
                    .with("item_id", a.item_id)
                    .with("essential", a.essential)
                    .with("property_index", a.property_index)
                    .into()
            }),
        )
    }
}

fn read_ipma(mut src: &[u8], config: &ParseConfig) -> Result<PropertyAssociationBox> {
    let (version, flags) = read_fullbox_extra(&mut src)?;

    let mut entries = TryVec::new();
    let mut total: u64 = 0;

    let entry_count = be_u32(&mut src)?;
    config.check_item_entries(entry_count.into())?;
    for _ in 0..entry_count {
        let item_id = if version == 0 {
            be_u16(&mut src)?.into()
        } else {
            be_u32(&mut src)?
        };
        let association_count = src.read_u8()?;
        total += u64::from(association_count);
        config.check_item_entries(total)?;
        for _ in 0..association_count {
            let num_association_bytes = if flags & 1 == 1 { 2 } else { 1 };
            let association = src.get(..num_association_bytes).ok_or(Error::Truncated)?;
            src = &src[num_association_bytes..];
            let mut association = BitReader::new(association);
            let essential = association.read_bool()?;
            let property_index = association.read_u16(association.remaining().try_into()?)?;
            entries.push(PropertyAssociation {
                item_id,
                essential,
                property_index,
            })?;
        }
    }
    Ok(PropertyAssociationBox { entries })
}

/// See ISO 23008-12:2017 § 6.5.5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColourInformation {
    /// CICP code points per ITU-T H.273.
    Nclx {
        colour_primaries: u16,
        transfer_characteristics: u16,
        matrix_coefficients: u16,
        full_range: bool,
    },
    /// Embedded ICC profile; `offset` is absolute in the file.
    Icc { kind: FourCC, offset: u64, size: u64 },
    Other(FourCC),
}

impl ColourInformation {
    pub fn colour_type(&self) -> FourCC {
        match *self {
            Self::Nclx { .. } => FourCC::from(*b"nclx"),
            Self::Icc { kind, .. } => kind,
            Self::Other(t) => t,
        }
    }

    pub fn to_fields(&self) -> Fields {
        let fields = Fields::new().with("colour_type", self.colour_type());
        match *self {
            Self::Nclx {
                colour_primaries,
                transfer_characteristics,
                matrix_coefficients,
                full_range,
            } => fields
                .with("colour_primaries", colour_primaries)
                .with("colour_primaries_name", tables::colour_primaries_name(colour_primaries))
                .with("transfer_characteristics", transfer_characteristics)
                .with("transfer_characteristics_name", tables::transfer_characteristics_name(transfer_characteristics))
                .with("matrix_coefficients", matrix_coefficients)
                .with("matrix_coefficients_name", tables::matrix_coefficients_name(matrix_coefficients))
                .with("full_range", full_range)
                .with("hdr_format", tables::hdr_format(transfer_characteristics)),
            Self::Icc { offset, size, .. } => fields.with("icc_profile_offset", offset).with("icc_profile_size", size),
            Self::Other(_) => fields,
        }
    }
}

fn read_colr(payload: &[u8], payload_offset: u64) -> Result<ColourInformation> {
    let colour_type = FourCC::from(read_u32_be(payload, 0)?);
    Ok(match &colour_type.value {
        b"nclx" => ColourInformation::Nclx {
            colour_primaries: read_u16_be(payload, 4)?,
            transfer_characteristics: read_u16_be(payload, 6)?,
            matrix_coefficients: read_u16_be(payload, 8)?,
            full_range: read_flag(read_u8(payload, 10)?, 0)?,
        },
        b"prof" | b"rICC" => ColourInformation::Icc {
            kind: colour_type,
            offset: payload_offset + 4,
            size: (payload.len() - 4).to_u64(),
        },
        _ => ColourInformation::Other(colour_type),
    })
}

/// Image spatial extents (dimensions)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSpatialExtents {
    pub width: u32,
    pub height: u32,
}

impl ImageSpatialExtents {
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Rounded to two decimals.
    pub fn megapixels(&self) -> f64 {
        (self.pixel_count() as f64 / 10_000.0).round() / 100.0
    }

    pub fn to_fields(&self) -> Fields {
        Fields::new()
            .with("width", self.width)
            .with("height", self.height)
            .with("megapixels", self.megapixels())
    }
}

/// Parse an Image Spatial Extents property box
/// See ISO/IEC 23008-12:2017 § 6.5.3
fn read_ispe(payload: &[u8], config: &ParseConfig) -> Result<ImageSpatialExtents> {
    let mut src = payload;
    // Some writers omit the version/flags word.
    if payload.len() >= 12 {
        let _version = read_fullbox_version_no_flags(&mut src, config)?;
    }

    let width = be_u32(&mut src)?;
    let height = be_u32(&mut src)?;

    if width == 0 || height == 0 {
        return Err(Error::InvalidData("ispe dimensions cannot be zero"));
    }

    Ok(ImageSpatialExtents { width, height })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelInformation {
    pub bits_per_channel: ArrayVec<u8, 16>,
}

impl PixelInformation {
    pub fn to_fields(&self) -> Fields {
        Fields::new()
            .with("num_channels", self.bits_per_channel.len())
            .with("bits_per_channel", list(&self.bits_per_channel, |&b| b.into()))
            .with("bit_depth", self.bits_per_channel.iter().copied().max())
    }
}

fn read_pixi(mut src: &[u8], config: &ParseConfig) -> Result<PixelInformation> {
    let version = read_fullbox_version_no_flags(&mut src, config)?;
    if version != 0 {
        return Err(Error::Unsupported("pixi version"));
    }

    let num_channels = usize::from(src.read_u8()?);
    let channels = src.get(..num_channels).ok_or(Error::InvalidData("invalid num_channels"))?;
    let bits_per_channel = ArrayVec::try_from(channels).map_err(|_| Error::InvalidData("invalid num_channels"))?;

    // Some writers append extra bytes (extended pixi); only lenient mode skips them.
    if src.len() > num_channels && !config.lenient {
        return Err(Error::InvalidData("unread box content in pixi"));
    }
    Ok(PixelInformation { bits_per_channel })
}

/// A fraction as stored in `clap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub num: i64,
    pub den: u32,
}

impl Rational {
    /// `None` for a zero denominator.
    pub fn as_f64(self) -> Option<f64> {
        (self.den != 0).then(|| self.num as f64 / f64::from(self.den))
    }
}

/// Fixed-point denominator of the edge form of `clap`.
const FIXED_16_16: u32 = 1 << 16;

/// Clean aperture. Writers use one of two layouts, told apart by size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanAperture {
    /// ISO 14496-12:2015 § 12.1.4: clean size plus offsets of its center
    /// from the image center, as fractions. 32 bytes.
    Centered {
        width: Rational,
        height: Rational,
        horizontal_offset: Rational,
        vertical_offset: Rational,
    },
    /// Positions of the aperture edges in 16.16 fixed point, left/right as
    /// x and top/bottom as y. 16 bytes.
    Edges {
        left: Rational,
        right: Rational,
        top: Rational,
        bottom: Rational,
    },
}

impl CleanAperture {
    /// Size of the clean area in pixels.
    pub fn clean_size(&self) -> Option<(f64, f64)> {
        match self {
            Self::Centered { width, height, .. } => Some((width.as_f64()?, height.as_f64()?)),
            Self::Edges {
                left,
                right,
                top,
                bottom,
            } => Some((right.as_f64()? - left.as_f64()?, bottom.as_f64()? - top.as_f64()?)),
        }
    }

    pub fn to_fields(&self) -> Fields {
        let size = self.clean_size();
        let fields = Fields::new()
            .with("clean_aperture_width", size.map(|(w, _)| w))
            .with("clean_aperture_height", size.map(|(_, h)| h));
        match self {
            Self::Centered {
                horizontal_offset,
                vertical_offset,
                ..
            } => fields
                .with("horizontal_offset", horizontal_offset.as_f64())
                .with("vertical_offset", vertical_offset.as_f64()),
            Self::Edges {
                left,
                right,
                top,
                bottom,
            } => fields
                .with("left", left.as_f64())
                .with("right", right.as_f64())
                .with("top", top.as_f64())
                .with("bottom", bottom.as_f64()),
        }
    }
}

fn read_unsigned_rational(src: &mut &[u8]) -> Result<Rational> {
    let num = be_u32(src)?;
    Ok(Rational { num: num.into(), den: be_u32(src)? })
}

fn read_signed_rational(src: &mut &[u8]) -> Result<Rational> {
    let num = src.read_i32::<byteorder::BigEndian>()?;
    Ok(Rational { num: num.into(), den: be_u32(src)? })
}

fn read_fixed_16_16(src: &mut &[u8]) -> Result<Rational> {
    Ok(Rational {
        num: be_u32(src)?.into(),
        den: FIXED_16_16,
    })
}

fn read_clap(mut src: &[u8]) -> Result<CleanAperture> {
    if src.len() < 32 {
        return Ok(CleanAperture::Edges {
            left: read_fixed_16_16(&mut src)?,
            right: read_fixed_16_16(&mut src)?,
            top: read_fixed_16_16(&mut src)?,
            bottom: read_fixed_16_16(&mut src)?,
        });
    }
    Ok(CleanAperture::Centered {
        width: read_unsigned_rational(&mut src)?,
        height: read_unsigned_rational(&mut src)?,
        horizontal_offset: read_signed_rational(&mut src)?,
        vertical_offset: read_signed_rational(&mut src)?,
    })
}

/// See ISO 14496-12:2015 § 8.4.3
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerBox {
    pub handler_type: FourCC,
    pub name: String,
}

impl HandlerBox {
    /// Video handlers come as both `vide` and `vid `.
    pub fn is_video(&self) -> bool {
        self.handler_type == b"vide" || self.handler_type == b"vid "
    }

    pub fn to_fields(&self) -> Fields {
        Fields::new()
            .with("handler_type", self.handler_type)
            .with("handler_name", tables::handler_name(self.handler_type))
            .with("name", self.name.as_str())
    }
}

fn read_hdlr(mut src: &[u8], config: &ParseConfig) -> Result<HandlerBox> {
    let _version = read_fullbox_version_no_flags(&mut src, config)?;

    // Skip pre_defined field.
    let _pre_defined = be_u32(&mut src)?;
    let handler_type = FourCC::from(be_u32(&mut src)?);

    // Skip reserved fields.
    for _ in 0..3 {
        let _reserved = be_u32(&mut src)?;
    }
    let name = read_cstring(&mut src);

    Ok(HandlerBox { handler_type, name })
}

/// A byte range in the file holding an embedded video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidecarVideo {
    pub offset: u64,
    pub size: u64,
}

impl SidecarVideo {
    pub fn to_fields(&self) -> Fields {
        Fields::new().with("offset", self.offset).with("size", self.size)
    }
}

/// A `uuid` box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorExtension {
    pub uuid: [u8; 16],
    pub vendor: Option<&'static str>,
    pub sidecar_video: Option<SidecarVideo>,
}

impl VendorExtension {
    pub fn to_fields(&self) -> Fields {
        Fields::new()
            .with("uuid", tables::format_uuid(&self.uuid))
            .with("vendor", self.vendor)
            .with("sidecar_video", self.sidecar_video.as_ref().map(SidecarVideo::to_fields))
    }
}

fn read_uuid(payload: &[u8], payload_offset: u64) -> Result<VendorExtension> {
    let uuid: [u8; 16] = payload
        .get(..16)
        .and_then(|u| u.try_into().ok())
        .ok_or(Error::InvalidData("uuid box shorter than its extended type"))?;
    let sidecar_video = if uuid == tables::MOTION_PHOTO_UUID {
        find_embedded_video(&payload[16..], payload_offset + 16)
    } else {
        None
    };
    Ok(VendorExtension {
        vendor: tables::uuid_vendor(&uuid),
        uuid,
        sidecar_video,
    })
}

/// First `mp4v` record whose preceding size fits in `data`.
fn find_embedded_video(data: &[u8], data_offset: u64) -> Option<SidecarVideo> {
    let mut from = 4;
    while let Some(pos) = data.get(from..)?.windows(4).position(|w| w == b"mp4v") {
        let tag = from + pos;
        let start = tag - 4;
        if let Ok(size) = read_u32_be(data, start) {
            let size = size.to_usize();
            if size >= 8 && start.checked_add(size).is_some_and(|end| end <= data.len()) {
                return Some(SidecarVideo {
                    offset: data_offset + start.to_u64(),
                    size: size.to_u64(),
                });
            }
        }
        from = tag + 1;
    }
    None
}

/// HEVC decoder configuration record.
/// See ISO 14496-15:2017 § 8.3.3
#[derive(Debug, PartialEq)]
pub struct HevcConfigBox {
    pub configuration_version: u8,
    pub general_profile_space: u8,
    pub general_tier_flag: bool,
    pub general_profile_idc: u8,
    pub general_level_idc: u8,
    pub chroma_format_idc: u8,
    pub bit_depth_luma: u8,
    pub bit_depth_chroma: u8,
    pub nal_length_size: u8,
    /// `(nal_unit_type, number of NAL units)` per array.
    pub nal_arrays: TryVec<(u8, u16)>,
}

impl HevcConfigBox {
    pub fn to_fields(&self) -> Fields {
        Fields::new()
            .with("configuration_version", self.configuration_version)
            .with("general_profile_space", self.general_profile_space)
            .with("tier", if self.general_tier_flag { "High" } else { "Main" })
            .with("general_profile_idc", self.general_profile_idc)
            .with("profile", tables::hevc_profile_name(self.general_profile_idc))
            .with("general_level_idc", self.general_level_idc)
            .with("level", tables::hevc_level_name(self.general_level_idc))
            .with("chroma_format", tables::chroma_format_name(self.chroma_format_idc))
            .with("bit_depth_luma", self.bit_depth_luma)
            .with("bit_depth_chroma", self.bit_depth_chroma)
            .with("nal_length_size", self.nal_length_size)
            .with(
                "nal_arrays",
                list(&self.nal_arrays, |&(nal_unit_type, count)| {
                    Fields::new().with("nal_unit_type", nal_unit_type).with("count", count).into()
                }),
            )
    }
}

fn read_hvcc(payload: &[u8]) -> Result<HevcConfigBox> {
    let ptl = read_u8(payload, 1)?;
    let mut config = HevcConfigBox {
        configuration_version: read_u8(payload, 0)?,
        general_profile_space: read_bits(ptl, 0, 2)?,
        general_tier_flag: read_flag(ptl, 2)?,
        general_profile_idc: read_bits(ptl, 3, 5)?,
        general_level_idc: read_u8(payload, 12)?,
        chroma_format_idc: read_bits(read_u8(payload, 16)?, 6, 2)?,
        bit_depth_luma: read_bits(read_u8(payload, 17)?, 5, 3)? + 8,
        bit_depth_chroma: read_bits(read_u8(payload, 18)?, 5, 3)? + 8,
        nal_length_size: read_bits(read_u8(payload, 21)?, 6, 2)? + 1,
        nal_arrays: TryVec::new(),
    };

    let num_arrays = read_u8(payload, 22)?;
    let mut pos = 23;
    for _ in 0..num_arrays {
        let nal_unit_type = read_bits(read_u8(payload, pos)?, 2, 6)?;
        let num_nalus = read_u16_be(payload, pos + 1)?;
        pos += 3;
        for _ in 0..num_nalus {
            let len = read_u16_be(payload, pos)?.to_usize();
            pos += 2 + len;
        }
        if pos > payload.len() {
            return Err(Error::Truncated);
        }
        config.nal_arrays.push((nal_unit_type, num_nalus))?;
    }
    Ok(config)
}

#[cfg(test)]
fn full(version: u8, flags: u32, body: &[u8]) -> Vec<u8> {
    let mut v = Vec::from([version]);
    v.extend_from_slice(&flags.to_be_bytes()[1..]);
    v.extend_from_slice(body);
    v
}

#[test]
fn ftyp_brands_and_heif() {
    let payload = b"heic\0\0\0\0mif1heic";
    let (fields, err) = decode_box(BoxType::FileTypeBox, payload, 16, &ParseConfig::default());
    assert!(err.is_none());
    let BoxFields::FileType(ftyp) = fields else { panic!("expected ftyp fields") };
    assert!(ftyp.major_brand == b"heic");
    assert_eq!(ftyp.compatible_brands.len(), 2);
    assert!(ftyp.is_heif());

    let avif = read_ftyp(b"avif\0\0\0\0avifmiafXY").unwrap();
    assert!(!avif.is_heif());
    assert_eq!(avif.compatible_brands.len(), 2);
    assert!(matches!(read_ftyp(b"avif\0\0"), Err(Error::Truncated)));
}

#[test]
fn av1c_bit_layout() {
    // marker=1 version=1 | profile=0 level=8 | tier=0 hbd=1 12bit=0 mono=0 ssx=1 ssy=1 csp=0 | no delay
    let payload = [0x81, 0x08, 0x4c, 0x00];
    let c = read_av1c(&payload, &ParseConfig::default()).unwrap();
    assert_eq!(c.seq_profile, 0);
    assert_eq!(c.seq_level_idx_0, 8);
    assert_eq!(c.bit_depth(), 10);
    assert_eq!(c.chroma_subsampling(), "4:2:0");
    assert_eq!(c.initial_presentation_delay, None);
    let fields = c.to_fields();
    assert_eq!(fields.get("level").and_then(Value::as_str), Some("4.0"));
    assert_eq!(fields.get("profile").and_then(Value::as_str), Some("Main"));

    assert!(matches!(read_av1c(&[0x01, 0, 0, 0], &ParseConfig::default()), Err(Error::InvalidData(_))));
    assert!(read_av1c(&[0x01, 0, 0, 0], &ParseConfig::default().lenient(true)).is_ok());
    assert!(matches!(read_av1c(&[0x81, 0x08], &ParseConfig::default()), Err(Error::OutOfBounds)));
}

#[test]
fn infe_versions() {
    let v2 = full(2, 0, b"\x00\x01\x00\x00av01Color\0");
    let e = read_infe(&v2).unwrap();
    assert_eq!(e.item_id, 1);
    assert!(e.item_type.unwrap() == b"av01");
    assert_eq!(e.item_name, "Color");
    assert_eq!(e.content_type, None);

    let v3 = full(3, 1, b"\x00\x01\x00\x02\x00\x00mime\0image/jpeg\0");
    let e = read_infe(&v3).unwrap();
    assert_eq!(e.item_id, 0x10002);
    assert_eq!(e.item_name, "");
    assert_eq!(e.content_type.as_deref(), Some("image/jpeg"));

    let v0 = full(0, 0, b"\x00\x05\x00\x00name\0text/plain");
    let e = read_infe(&v0).unwrap();
    assert_eq!(e.item_type, None);
    assert_eq!(e.content_type.as_deref(), Some("text/plain"));
}

#[test]
fn iloc_items_and_partial_tables() {
    // v1, offset 4, length 4, base 0, index 0, two items
    let mut body = Vec::from([0x44, 0x00, 0x00, 0x02]);
    body.extend_from_slice(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);
    body.extend_from_slice(&[0, 0, 0, 100, 0, 0, 0, 50]);
    body.extend_from_slice(&[0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01]);
    body.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 20]);
    let payload = full(1, 0, &body);

    let (iloc, err) = read_iloc(&payload, &ParseConfig::default()).unwrap();
    assert!(err.is_none());
    assert_eq!((iloc.offset_size, iloc.length_size, iloc.base_offset_size), (4, 4, 0));
    assert_eq!(iloc.item_count, 2);
    assert_eq!(iloc.items[0].extents[0], Extent { index: None, offset: 100, length: 50 });
    assert_eq!(iloc.items[1].construction_method, ConstructionMethod::Idat);

    // Cut inside the second item: header and first item survive.
    let (iloc, err) = read_iloc(&payload[..payload.len() - 6], &ParseConfig::default()).unwrap();
    assert!(matches!(err, Some(Error::Truncated)));
    assert_eq!(iloc.item_count, 2);
    assert_eq!(iloc.items.len(), 1);

    let bad_size = full(0, 0, &[0x34, 0x00, 0x00, 0x00]);
    assert!(matches!(read_iloc(&bad_size, &ParseConfig::default()), Err(Error::InvalidData(_))));

    let limited = ParseConfig::default().with_max_item_entries(1);
    let (iloc, err) = read_iloc(&payload, &limited).unwrap();
    assert!(matches!(err, Some(Error::ResourceLimitExceeded(_))));
    assert!(iloc.items.is_empty());
}

#[test]
fn iref_and_ipma() {
    let mut body = Vec::new();
    body.extend_from_slice(&[0, 0, 0, 14]);
    body.extend_from_slice(b"thmb");
    body.extend_from_slice(&[0x00, 0x02, 0x00, 0x01, 0x00, 0x01]);
    let iref = read_iref(&full(0, 0, &body), &ParseConfig::default()).unwrap();
    assert_eq!(iref.references.len(), 1);
    assert_eq!(iref.referencing(b"thmb", 1).collect::<Vec<_>>(), [2]);
    assert_eq!(iref.referencing(b"cdsc", 1).count(), 0);

    // item 1 -> properties 1 (essential) and 2
    let ipma = read_ipma(&full(0, 0, &[0, 0, 0, 1, 0, 1, 2, 0x81, 0x02]), &ParseConfig::default()).unwrap();
    let props: Vec<_> = ipma.for_item(1).map(|a| (a.essential, a.property_index)).collect();
    assert_eq!(props, [(true, 1), (false, 2)]);
}

#[test]
fn colour_information() {
    let nclx = b"nclx\x00\x09\x00\x10\x00\x09\x80";
    let colr = read_colr(nclx, 0).unwrap();
    let fields = colr.to_fields();
    assert_eq!(fields.get("colour_primaries_name").and_then(Value::as_str), Some("BT.2020"));
    assert_eq!(fields.get("transfer_characteristics_name").and_then(Value::as_str), Some("PQ"));
    assert_eq!(fields.get("full_range").and_then(Value::as_bool), Some(true));
    assert_eq!(fields.get("hdr_format").and_then(Value::as_str), Some("HDR10 (PQ)"));

    let icc = read_colr(b"prof0123456789", 100).unwrap();
    assert_eq!(icc, ColourInformation::Icc { kind: FourCC::from(*b"prof"), offset: 104, size: 10 });
    assert!(matches!(read_colr(b"ncl", 0), Err(Error::OutOfBounds)));
}

#[test]
fn ispe_with_and_without_version() {
    let mut payload = Vec::from([0, 0, 0, 0]);
    payload.extend_from_slice(&800u32.to_be_bytes());
    payload.extend_from_slice(&600u32.to_be_bytes());
    let ispe = read_ispe(&payload, &ParseConfig::default()).unwrap();
    assert_eq!((ispe.width, ispe.height), (800, 600));
    assert_eq!(ispe.megapixels(), 0.48);

    let bare = read_ispe(&payload[4..], &ParseConfig::default()).unwrap();
    assert_eq!(bare, ispe);
    assert!(matches!(read_ispe(&[0; 8], &ParseConfig::default()), Err(Error::InvalidData(_))));
}

#[test]
fn clap_edges_in_fixed_point() {
    let mut edges = Vec::new();
    // left 8, right 792.5, top 10, bottom 590
    for v in [8u32 << 16, (792 << 16) | 0x8000, 10 << 16, 590 << 16] {
        edges.extend_from_slice(&v.to_be_bytes());
    }
    let clap = read_clap(&edges).unwrap();
    assert!(matches!(clap, CleanAperture::Edges { .. }));
    assert_eq!(clap.clean_size(), Some((784.5, 580.0)));
    let fields = clap.to_fields();
    assert_eq!(fields.get("right").and_then(Value::as_f64), Some(792.5));
    assert_eq!(fields.get("top").and_then(Value::as_f64), Some(10.0));
    assert_eq!(fields.get("clean_aperture_width").and_then(Value::as_f64), Some(784.5));
    assert!(matches!(read_clap(&edges[..12]), Err(Error::Truncated)));
}

#[test]
fn pixi_clap_hdlr() {
    let pixi = read_pixi(&full(0, 0, &[3, 8, 8, 8]), &ParseConfig::default()).unwrap();
    assert_eq!(pixi.bits_per_channel.as_slice(), [8, 8, 8]);
    assert!(matches!(read_pixi(&full(0, 0, &[3, 8]), &ParseConfig::default()), Err(Error::InvalidData(_))));
    let extended = full(0, 0, &[1, 8, 0, 0]);
    assert!(read_pixi(&extended, &ParseConfig::default()).is_err());
    assert!(read_pixi(&extended, &ParseConfig::default().lenient(true)).is_ok());

    let mut clap = Vec::new();
    for v in [780u32, 1, 580, 1] {
        clap.extend_from_slice(&v.to_be_bytes());
    }
    for v in [-4i32, 2, 0, 1] {
        clap.extend_from_slice(&v.to_be_bytes());
    }
    let clap = read_clap(&clap).unwrap();
    assert_eq!(clap.clean_size(), Some((780.0, 580.0)));
    assert_eq!(clap.to_fields().get("horizontal_offset").and_then(Value::as_f64), Some(-2.0));

    let hdlr = read_hdlr(&full(0, 0, b"\0\0\0\0vide\0\0\0\0\0\0\0\0\0\0\0\0Video\0"), &ParseConfig::default()).unwrap();
    assert!(hdlr.is_video());
    assert_eq!(hdlr.name, "Video");
    assert_eq!(hdlr.to_fields().get("handler_name").and_then(Value::as_str), Some("Video"));
}

#[test]
fn uuid_motion_photo_sidecar() {
    let mut payload = Vec::from(tables::MOTION_PHOTO_UUID);
    payload.extend_from_slice(b"junk");
    payload.extend_from_slice(&16u32.to_be_bytes());
    payload.extend_from_slice(b"mp4v");
    payload.extend_from_slice(&[0; 8]);
    let ext = read_uuid(&payload, 1000).unwrap();
    assert_eq!(ext.vendor, Some("Motion photo video"));
    assert_eq!(ext.sidecar_video, Some(SidecarVideo { offset: 1000 + 20, size: 16 }));

    // Size claiming more than is there is skipped.
    let mut short = Vec::from(tables::MOTION_PHOTO_UUID);
    short.extend_from_slice(&64u32.to_be_bytes());
    short.extend_from_slice(b"mp4v");
    assert_eq!(read_uuid(&short, 0).unwrap().sidecar_video, None);
    assert!(read_uuid(&[0; 8], 0).is_err());
}

#[test]
fn hvcc_record() {
    let mut payload = Vec::from([1u8, 0x01, 0x60, 0, 0, 0, 0x90, 0, 0, 0, 0, 0, 93]);
    payload.extend_from_slice(&[0xf0, 0x00, 0xfc, 0xfd, 0xfa, 0xfa, 0x00, 0x00, 0x0f, 1]);
    payload.extend_from_slice(&[0xa0, 0x00, 0x01, 0x00, 0x02, 0x40, 0x01]);
    let hvcc = read_hvcc(&payload).unwrap();
    assert_eq!(hvcc.general_profile_idc, 1);
    assert_eq!(hvcc.chroma_format_idc, 1);
    assert_eq!(hvcc.bit_depth_luma, 10);
    assert_eq!(hvcc.nal_length_size, 4);
    assert_eq!(hvcc.nal_arrays[..], [(32, 1)]);
    assert_eq!(hvcc.to_fields().get("level").and_then(Value::as_str), Some("3.1"));
}
