// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Container-level summary built from the parsed box tree.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use enough::{Stop, Unstoppable};
use log::debug;

use crate::boxes::{BoxType, FourCC};
use crate::decode::{
    Av1ConfigBox, BoxFields, CleanAperture, ColourInformation, FileTypeBox, HandlerBox, HevcConfigBox,
    ImageSpatialExtents, ItemInfoEntry, ItemLocation, PixelInformation, PropertyAssociationBox, SidecarVideo,
};
use crate::tree::{ParsedBox, TreeParser, walk};
use crate::value::{Fields, Value};
use crate::{Diagnostic, Error, ParseConfig, Result, TryVec};

/// Smallest input that can hold a box header plus a brand.
const MIN_CONTAINER_LEN: usize = 12;

/// An item referenced as a thumbnail (`thmb`) of another item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thumbnail {
    pub item_id: u32,
    /// The item it is a thumbnail of.
    pub for_item_id: u32,
    /// From the item's associated `ispe` property.
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Thumbnail {
    fn to_fields(self) -> Fields {
        Fields::new()
            .with("item_id", self.item_id)
            .with("for_item_id", self.for_item_id)
            .with("width", self.width)
            .with("height", self.height)
    }
}

/// Pixels the clean aperture removes from each edge of the full image.
/// Negative when the aperture reaches outside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropEdges {
    pub left: i64,
    pub right: i64,
    pub top: i64,
    pub bottom: i64,
}

impl CropEdges {
    /// See ISO 14496-12:2015 § 12.1.4.1
    fn new(clap: &CleanAperture, ispe: &ImageSpatialExtents) -> Option<Self> {
        let full_w = f64::from(ispe.width);
        let full_h = f64::from(ispe.height);
        let (left, right, top, bottom) = match clap {
            CleanAperture::Centered {
                width,
                height,
                horizontal_offset,
                vertical_offset,
            } => {
                let (clean_w, clean_h) = (width.as_f64()?, height.as_f64()?);
                let left = (full_w - clean_w) / 2.0 + horizontal_offset.as_f64()?;
                let top = (full_h - clean_h) / 2.0 + vertical_offset.as_f64()?;
                (left, full_w - clean_w - left, top, full_h - clean_h - top)
            },
            CleanAperture::Edges {
                left,
                right,
                top,
                bottom,
            } => (
                left.as_f64()?,
                full_w - right.as_f64()?,
                top.as_f64()?,
                full_h - bottom.as_f64()?,
            ),
        };
        if ![left, right, top, bottom].iter().all(|v| v.is_finite()) {
            return None;
        }
        Some(Self {
            left: left.round() as i64,
            right: right.round() as i64,
            top: top.round() as i64,
            bottom: bottom.round() as i64,
        })
    }

    fn to_fields(self) -> Fields {
        Fields::new()
            .with("left", Value::Int(self.left))
            .with("right", Value::Int(self.right))
            .with("top", Value::Int(self.top))
            .with("bottom", Value::Int(self.bottom))
    }
}

/// Everything known about one ISOBMFF file.
///
/// Scalar summaries are computed once at parse time; box records are looked
/// up in [`Document::boxes`] on demand, first match in depth-first order.
///
/// ```
/// let doc = zenmedia_probe::Document::from_bytes(b"not a media file");
/// assert!(!doc.is_valid_container);
/// assert_eq!(doc.total_boxes, 0);
/// ```
#[derive(Debug)]
pub struct Document {
    /// False only when the leading bytes are not an ISOBMFF box header.
    pub is_valid_container: bool,
    /// `ftyp` names a HEIF brand.
    pub is_heif: bool,
    /// From `pitm`, or the first item in `iinf` without one.
    pub primary_item: Option<u32>,
    pub thumbnails: TryVec<Thumbnail>,
    /// Count of every box type at any depth.
    pub box_type_histogram: BTreeMap<FourCC, u32>,
    pub total_boxes: u32,
    /// The top-level boxes.
    pub boxes: TryVec<ParsedBox>,
    /// Problems met during the walk. Parsing went on past each of them.
    pub errors: TryVec<Diagnostic>,
}

impl Document {
    /// Parse with [`ParseConfig::default`] limits.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::from_bytes_with_config(data, &ParseConfig::default(), &Unstoppable)
    }

    /// Parse with explicit limits and cancellation.
    pub fn from_bytes_with_config(data: &[u8], config: &ParseConfig, stop: &dyn Stop) -> Self {
        let mut doc = Self {
            is_valid_container: false,
            is_heif: false,
            primary_item: None,
            thumbnails: TryVec::new(),
            box_type_histogram: BTreeMap::new(),
            total_boxes: 0,
            boxes: TryVec::new(),
            errors: TryVec::new(),
        };

        if let Err(error) = check_signature(data) {
            debug!("not an ISOBMFF file: {error}");
            let box_type = data.get(4..8).and_then(|t| <[u8; 4]>::try_from(t).ok()).map(FourCC::from);
            // Only fails when out of memory, and then there is nothing to report into.
            let _ = doc.errors.push(Diagnostic { offset: 0, box_type, error });
            return doc;
        }
        doc.is_valid_container = true;

        let (boxes, errors) = TreeParser::new(data, config, stop).parse();
        doc.boxes = boxes;
        doc.errors = errors;

        for b in walk(&doc.boxes) {
            *doc.box_type_histogram.entry(b.box_type()).or_insert(0) += 1;
            doc.total_boxes += 1;
        }
        doc.is_heif = doc.file_type().is_some_and(FileTypeBox::is_heif);
        doc.primary_item = doc.resolve_primary_item();
        if let Err(error) = doc.resolve_thumbnails() {
            let _ = doc.errors.push(Diagnostic {
                offset: 0,
                box_type: None,
                error,
            });
        }
        doc
    }

    /// Read `reader` to its end, then parse.
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(Self::from_bytes(&buf))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let buf = std::fs::read(path)?;
        Ok(Self::from_bytes(&buf))
    }

    fn first<'a, T>(&'a self, pick: impl Fn(&'a BoxFields) -> Option<&'a T>) -> Option<&'a T> {
        walk(&self.boxes).find_map(|b| pick(&b.fields))
    }

    pub fn file_type(&self) -> Option<&FileTypeBox> {
        self.first(|f| match f {
            BoxFields::FileType(b) => Some(b),
            _ => None,
        })
    }

    pub fn av1_config(&self) -> Option<&Av1ConfigBox> {
        self.first(|f| match f {
            BoxFields::Av1Config(b) => Some(b),
            _ => None,
        })
    }

    pub fn hevc_config(&self) -> Option<&HevcConfigBox> {
        self.first(|f| match f {
            BoxFields::HevcConfig(b) => Some(b),
            _ => None,
        })
    }

    /// `infe` entries in file order.
    pub fn items(&self) -> impl Iterator<Item = &ItemInfoEntry> {
        walk(&self.boxes).filter_map(|b| match &b.fields {
            BoxFields::ItemInfoEntry(e) => Some(e),
            _ => None,
        })
    }

    /// Where `item_id`'s data lives, from `iloc`.
    pub fn item_location(&self, item_id: u32) -> Option<&ItemLocation> {
        walk(&self.boxes)
            .filter_map(|b| match &b.fields {
                BoxFields::ItemLocation(iloc) => Some(iloc),
                _ => None,
            })
            .find_map(|iloc| iloc.items.iter().find(|loc| loc.item_id == item_id))
    }

    pub fn color_information(&self) -> Option<&ColourInformation> {
        self.first(|f| match f {
            BoxFields::ColourInformation(b) => Some(b),
            _ => None,
        })
    }

    pub fn image_dimensions(&self) -> Option<&ImageSpatialExtents> {
        self.first(|f| match f {
            BoxFields::ImageSpatialExtents(b) => Some(b),
            _ => None,
        })
    }

    pub fn pixel_information(&self) -> Option<&PixelInformation> {
        self.first(|f| match f {
            BoxFields::PixelInformation(b) => Some(b),
            _ => None,
        })
    }

    pub fn clean_aperture(&self) -> Option<&CleanAperture> {
        self.first(|f| match f {
            BoxFields::CleanAperture(b) => Some(b),
            _ => None,
        })
    }

    /// Crop edges of [`Document::clean_aperture`] against [`Document::image_dimensions`].
    pub fn crop_edges(&self) -> Option<CropEdges> {
        CropEdges::new(self.clean_aperture()?, self.image_dimensions()?)
    }

    pub fn handler(&self) -> Option<&HandlerBox> {
        self.first(|f| match f {
            BoxFields::Handler(b) => Some(b),
            _ => None,
        })
    }

    /// Embedded video of a motion photo, from a vendor `uuid` box or `mpvd`.
    pub fn motion_photo(&self) -> Option<SidecarVideo> {
        walk(&self.boxes).find_map(|b| match &b.fields {
            BoxFields::VendorExtension(ext) => ext.sidecar_video,
            BoxFields::MotionPhotoVideo(video) => Some(*video),
            _ => None,
        })
    }

    /// `ispe` associated with `item_id` through `ipma`.
    pub fn item_dimensions(&self, item_id: u32) -> Option<&ImageSpatialExtents> {
        let (ipma, ipco) = self.item_properties()?;
        ipma.for_item(item_id).find_map(|a| spatial_extents(ipco, a.property_index))
    }

    /// The first `ipma` and `ipco` of the file.
    fn item_properties(&self) -> Option<(&PropertyAssociationBox, &ParsedBox)> {
        let ipma = self.first(|f| match f {
            BoxFields::PropertyAssociation(b) => Some(b),
            _ => None,
        })?;
        let ipco = walk(&self.boxes).find(|b| b.header.name == BoxType::ItemPropertyContainerBox)?;
        Some((ipma, ipco))
    }

    /// [`Document::item_dimensions`] of every item, in one pass over `ipma`.
    fn dimensions_by_item(&self) -> BTreeMap<u32, &ImageSpatialExtents> {
        let mut dims = BTreeMap::new();
        let Some((ipma, ipco)) = self.item_properties() else {
            return dims;
        };
        for association in ipma.entries.iter() {
            if let Some(ispe) = spatial_extents(ipco, association.property_index) {
                dims.entry(association.item_id).or_insert(ispe);
            }
        }
        dims
    }

    fn resolve_primary_item(&self) -> Option<u32> {
        let pitm = self.first(|f| match f {
            BoxFields::PrimaryItem(b) => Some(b),
            _ => None,
        });
        match pitm {
            Some(pitm) => Some(pitm.item_id),
            None => self.items().next().map(|item| item.item_id),
        }
    }

    fn resolve_thumbnails(&mut self) -> Result<()> {
        let dims = self.dimensions_by_item();
        let mut thumbnails = TryVec::new();
        for b in walk(&self.boxes) {
            let BoxFields::ItemReference(iref) = &b.fields else { continue };
            for reference in iref.references.iter().filter(|r| r.reference_type == b"thmb") {
                let item_dims = dims.get(&reference.from_item_id);
                for &for_item_id in reference.to_item_ids.iter() {
                    thumbnails.push(Thumbnail {
                        item_id: reference.from_item_id,
                        for_item_id,
                        width: item_dims.map(|d| d.width),
                        height: item_dims.map(|d| d.height),
                    })?;
                }
            }
        }
        self.thumbnails = thumbnails;
        Ok(())
    }

    /// The summary fields, without the box tree or errors.
    pub fn metadata_value(&self) -> Value {
        self.metadata_fields().into()
    }

    fn metadata_fields(&self) -> Fields {
        let mut histogram = Fields::new();
        for (box_type, count) in &self.box_type_histogram {
            histogram.push(box_type.to_string(), *count);
        }
        Fields::new()
            .with("is_valid_container", self.is_valid_container)
            .with("is_heif", self.is_heif)
            .with("file_type", self.file_type().map(FileTypeBox::to_fields))
            .with("av1_config", self.av1_config().map(Av1ConfigBox::to_fields))
            .with("hevc_config", self.hevc_config().map(HevcConfigBox::to_fields))
            .with("items", Value::List(self.items().map(|e| e.to_fields().into()).collect()))
            .with("primary_item", self.primary_item)
            .with("thumbnails", Value::List(self.thumbnails.iter().map(|t| t.to_fields().into()).collect()))
            .with("color_information", self.color_information().map(ColourInformation::to_fields))
            .with("image_dimensions", self.image_dimensions().map(ImageSpatialExtents::to_fields))
            .with("pixel_information", self.pixel_information().map(PixelInformation::to_fields))
            .with("clean_aperture", self.clean_aperture().map(CleanAperture::to_fields))
            .with("crop_edges", self.crop_edges().map(CropEdges::to_fields))
            .with("handler", self.handler().map(HandlerBox::to_fields))
            .with("motion_photo", self.motion_photo().as_ref().map(SidecarVideo::to_fields))
            .with("box_type_histogram", histogram)
            .with("total_boxes", self.total_boxes)
    }

    /// Non-null leaves of [`Document::metadata_value`].
    pub fn field_count(&self) -> usize {
        self.metadata_value().field_count()
    }

    /// Summary, box tree and errors. `errors` and `field_count` are
    /// bookkeeping and not part of the count.
    pub fn to_value(&self) -> Value {
        let mut fields = self.metadata_fields();
        let field_count = fields.field_count();
        fields.insert("boxes", Value::List(self.boxes.iter().map(ParsedBox::to_value).collect()));
        fields.insert("errors", Value::List(self.errors.iter().map(|e| e.to_string().into()).collect()));
        fields.insert("field_count", field_count);
        fields.into()
    }
}

/// The `ispe` at 1-based `property_index` of `ipco`; 0 means no property.
fn spatial_extents(ipco: &ParsedBox, property_index: u16) -> Option<&ImageSpatialExtents> {
    let property = ipco.children.get(usize::from(property_index).checked_sub(1)?)?;
    match &property.fields {
        BoxFields::ImageSpatialExtents(ispe) => Some(ispe),
        _ => None,
    }
}

fn check_signature(data: &[u8]) -> Result<()> {
    if data.len() < MIN_CONTAINER_LEN {
        return Err(Error::InvalidData("too short for an ISOBMFF file"));
    }
    let name = BoxType::from(crate::bits::read_u32_be(data, 4)?);
    if !name.is_top_level_signature() {
        return Err(Error::InvalidData("first box is not a top-level box"));
    }
    Ok(())
}

#[cfg(test)]
use crate::tree::make_box;

#[cfg(test)]
fn full_box(name: &[u8; 4], version: u8, body: &[u8]) -> Vec<u8> {
    let mut payload = Vec::from([version, 0, 0, 0]);
    payload.extend_from_slice(body);
    make_box(name, &payload)
}

#[cfg(test)]
fn ispe(width: u32, height: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&width.to_be_bytes());
    body.extend_from_slice(&height.to_be_bytes());
    full_box(b"ispe", 0, &body)
}

/// Primary item 1 (800x600) with thumbnail item 2 (160x120).
#[cfg(test)]
fn still_image_with_thumbnail() -> Vec<u8> {
    let infe = |id: u8, name: &[u8]| {
        let mut body = Vec::from([0, id, 0, 0]);
        body.extend_from_slice(b"av01");
        body.extend_from_slice(name);
        full_box(b"infe", 2, &body)
    };
    let mut iinf_body = Vec::from([0, 2]);
    iinf_body.extend(infe(1, b"Color\0"));
    iinf_body.extend(infe(2, b"Thumb\0"));

    // item 2 is a thumbnail of item 1
    let iref_body = make_box(b"thmb", &[0, 2, 0, 1, 0, 1]);

    let mut clap = Vec::new();
    for v in [780u32, 1, 580, 1] {
        clap.extend_from_slice(&v.to_be_bytes());
    }
    for v in [-4i32, 2, 0, 1] {
        clap.extend_from_slice(&v.to_be_bytes());
    }
    let mut ipco = ispe(800, 600);
    ipco.extend(ispe(160, 120));
    ipco.extend(make_box(b"colr", b"nclx\x00\x01\x00\x0d\x00\x06\x80"));
    ipco.extend(full_box(b"pixi", 0, &[3, 8, 8, 8]));
    ipco.extend(make_box(b"clap", &clap));
    // item 1 -> ispe 800x600, colr, pixi, clap; item 2 -> ispe 160x120
    let ipma = full_box(b"ipma", 0, &[0, 0, 0, 2, 0, 1, 4, 0x81, 3, 4, 5, 0, 2, 1, 2]);
    let mut iprp = make_box(b"ipco", &ipco);
    iprp.extend(ipma);

    let mut meta = full_box(b"hdlr", 0, b"\0\0\0\0pict\0\0\0\0\0\0\0\0\0\0\0\0\0");
    meta.extend(full_box(b"pitm", 0, &[0, 1]));
    meta.extend(full_box(b"iinf", 0, &iinf_body));
    meta.extend(full_box(b"iref", 0, &iref_body));
    meta.extend(make_box(b"iprp", &iprp));

    let mut file = make_box(b"ftyp", b"avif\0\0\0\0avifmif1miaf");
    file.extend(full_box(b"meta", 0, &meta));
    file.extend(make_box(b"mdat", &[0xaa; 16]));
    file
}

#[test]
fn aggregates_still_image() {
    let doc = Document::from_bytes(&still_image_with_thumbnail());
    assert!(doc.errors.is_empty(), "{:?}", doc.errors);
    assert!(doc.is_valid_container);
    assert!(doc.is_heif);
    assert!(doc.file_type().unwrap().major_brand == b"avif");
    assert_eq!(doc.primary_item, Some(1));
    assert_eq!(doc.items().map(|i| i.item_name.as_str()).collect::<Vec<_>>(), ["Color", "Thumb"]);
    assert_eq!(
        doc.thumbnails[..],
        [Thumbnail {
            item_id: 2,
            for_item_id: 1,
            width: Some(160),
            height: Some(120),
        }]
    );
    assert_eq!(doc.item_dimensions(1).map(|d| (d.width, d.height)), Some((800, 600)));
    assert_eq!(doc.image_dimensions().map(|d| d.width), Some(800));
    assert_eq!(doc.pixel_information().map(|p| p.bits_per_channel.len()), Some(3));
    assert_eq!(
        doc.crop_edges(),
        Some(CropEdges {
            left: 8,
            right: 12,
            top: 10,
            bottom: 10,
        })
    );
    assert!(doc.handler().unwrap().handler_type == b"pict");
    assert!(matches!(doc.color_information(), Some(ColourInformation::Nclx { .. })));
    assert_eq!(doc.motion_photo(), None);

    // ftyp meta hdlr pitm iinf infe infe iref iprp ipco ispe ispe colr pixi clap ipma mdat
    assert_eq!(doc.total_boxes, 17);
    assert_eq!(doc.box_type_histogram.get(&FourCC::from(*b"ispe")), Some(&2));
    assert_eq!(doc.box_type_histogram.values().sum::<u32>(), doc.total_boxes);
}

#[test]
fn field_count_matches_metadata_leaves() {
    let doc = Document::from_bytes(&still_image_with_thumbnail());
    let value = doc.to_value();
    assert_eq!(value.get("field_count").and_then(Value::as_u64), Some(doc.field_count() as u64));
    assert_eq!(doc.field_count(), doc.metadata_value().field_count());
    // the box tree is reported but not counted
    assert!(value.get("boxes").and_then(Value::as_list).is_some_and(|b| b.len() == 3));
    assert!(value.field_count() > doc.field_count());
}

#[test]
fn signature_failures() {
    for data in [&b""[..], b"\0\0\0\x08ftyp", b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"] {
        let doc = Document::from_bytes(data);
        assert!(!doc.is_valid_container);
        assert!(doc.boxes.is_empty());
        assert_eq!(doc.errors.len(), 1);
        // the two flags and the zero box total
        assert_eq!(doc.field_count(), 3);
    }
}

#[test]
fn primary_item_falls_back_to_first_item() {
    let mut body = Vec::from([0, 1]);
    body.extend(full_box(b"infe", 2, b"\0\x07\0\0av01\0"));
    let mut meta = full_box(b"hdlr", 0, b"\0\0\0\0pict\0\0\0\0\0\0\0\0\0\0\0\0\0");
    meta.extend(full_box(b"iinf", 0, &body));
    let mut file = make_box(b"ftyp", b"heic\0\0\0\0mif1");
    file.extend(full_box(b"meta", 0, &meta));

    let doc = Document::from_bytes(&file);
    assert_eq!(doc.primary_item, Some(7));
    assert!(doc.thumbnails.is_empty());
    assert_eq!(doc.crop_edges(), None);
}

#[test]
fn crop_edges_from_fixed_point_clap() {
    let mut edges = Vec::new();
    for v in [8u32, 788, 10, 590] {
        edges.extend_from_slice(&(v << 16).to_be_bytes());
    }
    let mut ipco = ispe(800, 600);
    ipco.extend(make_box(b"clap", &edges));
    let mut meta = full_box(b"hdlr", 0, b"\0\0\0\0pict\0\0\0\0\0\0\0\0\0\0\0\0\0");
    meta.extend(make_box(b"iprp", &make_box(b"ipco", &ipco)));
    let mut file = make_box(b"ftyp", b"avif\0\0\0\0avifmif1");
    file.extend(full_box(b"meta", 0, &meta));

    let doc = Document::from_bytes(&file);
    assert!(doc.errors.is_empty(), "{:?}", doc.errors);
    assert_eq!(doc.clean_aperture().and_then(CleanAperture::clean_size), Some((780.0, 580.0)));
    assert_eq!(
        doc.crop_edges(),
        Some(CropEdges {
            left: 8,
            right: 12,
            top: 10,
            bottom: 10,
        })
    );
}

#[test]
fn motion_photo_trailer() {
    let mut mpvd_file = make_box(b"ftyp", b"heic\0\0\0\0mif1heic");
    mpvd_file.extend(make_box(b"mpvd", &[0; 32]));
    let doc = Document::from_bytes(&mpvd_file);
    assert_eq!(doc.motion_photo(), Some(SidecarVideo { offset: 24 + 8, size: 32 }));
}

#[test]
fn histogram_of_many_distinct_types_is_linear() {
    const COUNT: u32 = 60_000;
    let mut file = make_box(b"ftyp", b"avif\0\0\0\0avifmif1");
    for i in 0..COUNT {
        file.extend(make_box(&(0x0100_0000 + i).to_be_bytes(), &[]));
    }
    let started = std::time::Instant::now();
    let doc = Document::from_bytes(&file);
    let histogram = doc.metadata_value();
    let histogram = histogram.get("box_type_histogram").unwrap();
    assert!(started.elapsed() < std::time::Duration::from_secs(10), "{:?}", started.elapsed());
    assert_eq!(doc.total_boxes, COUNT + 1);
    assert_eq!(histogram.field_count(), COUNT as usize + 1);
    assert_eq!(histogram.get("ftyp").and_then(Value::as_u64), Some(1));
    assert_eq!(histogram.get("\\x01\\x00\\x00\\x05").and_then(Value::as_u64), Some(1));
}

#[test]
fn thumbnails_resolve_in_one_pass() {
    const COUNT: u16 = 30_000;
    let mut iref_body = Vec::new();
    let mut ipma_body = Vec::from(u32::from(COUNT).to_be_bytes());
    for id in 1..=COUNT {
        let mut thmb = Vec::from(id.to_be_bytes());
        thmb.extend_from_slice(&[0, 1, 0xff, 0xff]);
        iref_body.extend(make_box(b"thmb", &thmb));
        // one association with the ispe at index 1
        ipma_body.extend_from_slice(&id.to_be_bytes());
        ipma_body.extend_from_slice(&[1, 0x01]);
    }
    let mut iprp = make_box(b"ipco", &ispe(64, 48));
    iprp.extend(full_box(b"ipma", 0, &ipma_body));
    let mut meta = full_box(b"hdlr", 0, b"\0\0\0\0pict\0\0\0\0\0\0\0\0\0\0\0\0\0");
    meta.extend(full_box(b"iref", 0, &iref_body));
    meta.extend(make_box(b"iprp", &iprp));
    let mut file = make_box(b"ftyp", b"avif\0\0\0\0avifmif1");
    file.extend(full_box(b"meta", 0, &meta));

    let started = std::time::Instant::now();
    let doc = Document::from_bytes(&file);
    assert!(started.elapsed() < std::time::Duration::from_secs(10), "{:?}", started.elapsed());
    assert!(doc.errors.is_empty(), "{:?}", &doc.errors[..doc.errors.len().min(3)]);
    assert_eq!(doc.thumbnails.len(), usize::from(COUNT));
    assert!(doc.thumbnails.iter().all(|t| t.for_item_id == 0xffff && t.width == Some(64) && t.height == Some(48)));
    assert_eq!(doc.item_dimensions(u32::from(COUNT)).map(|d| d.height), Some(48));
}
