// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static code → label tables.
//!
//! A code missing from a table is not an error; lookups fall back to
//! [`UNKNOWN`].

use crate::boxes::FourCC;

pub const UNKNOWN: &str = "Unknown";

fn lookup<K: PartialEq + Copy>(table: &[(K, &'static str)], key: K) -> &'static str {
    table.iter().find(|&&(k, _)| k == key).map_or(UNKNOWN, |&(_, name)| name)
}

static BRANDS: &[([u8; 4], &str)] = &[
    (*b"avif", "AVIF"),
    (*b"avis", "AVIF image sequence"),
    (*b"avio", "AVIF intra-only"),
    (*b"mif1", "HEIF"),
    (*b"msf1", "HEIF"),
    (*b"mif2", "HEIF"),
    (*b"miaf", "MIAF"),
    (*b"heic", "HEIF container"),
    (*b"heix", "HEIF container"),
    (*b"heim", "HEIF container"),
    (*b"heis", "HEIF container"),
    (*b"hevc", "HEIF image sequence"),
    (*b"hevx", "HEIF image sequence"),
    (*b"MA1B", "AV1 image baseline profile"),
    (*b"MA1A", "AV1 image advanced profile"),
    (*b"isom", "ISO base media"),
    (*b"mp41", "MP4 v1"),
    (*b"mp42", "MP4 v2"),
    (*b"qt  ", "QuickTime"),
];

/// Brands whose presence marks the file as HEIF.
static HEIF_BRANDS: [[u8; 4]; 4] = [*b"mif1", *b"msf1", *b"heic", *b"hev1"];

pub fn brand_name(brand: FourCC) -> &'static str {
    lookup(BRANDS, brand.value)
}

pub fn is_heif_brand(brand: FourCC) -> bool {
    HEIF_BRANDS.contains(&brand.value)
}

static HANDLERS: &[([u8; 4], &str)] = &[
    (*b"pict", "Picture"),
    (*b"vide", "Video"),
    (*b"vid ", "Video"),
    (*b"soun", "Sound"),
    (*b"meta", "Timed metadata"),
    (*b"auxv", "Auxiliary video"),
    (*b"text", "Text"),
    (*b"subt", "Subtitle"),
    (*b"hint", "Hint"),
];

pub fn handler_name(handler: FourCC) -> &'static str {
    lookup(HANDLERS, handler.value)
}

// ITU-T H.273 code points.

static COLOUR_PRIMARIES: &[(u16, &str)] = &[
    (1, "BT.709"),
    (2, "Unspecified"),
    (4, "BT.470 System M"),
    (5, "BT.470 System B/G"),
    (6, "BT.601"),
    (7, "SMPTE 240M"),
    (8, "Generic film"),
    (9, "BT.2020"),
    (10, "SMPTE ST 428-1 (XYZ)"),
    (11, "SMPTE RP 431-2 (DCI-P3)"),
    (12, "SMPTE EG 432-1 (Display P3)"),
    (22, "EBU Tech 3213-E"),
];

static TRANSFER_CHARACTERISTICS: &[(u16, &str)] = &[
    (1, "BT.709"),
    (2, "Unspecified"),
    (4, "Gamma 2.2"),
    (5, "Gamma 2.8"),
    (6, "BT.601"),
    (7, "SMPTE 240M"),
    (8, "Linear"),
    (9, "Logarithmic 100:1"),
    (10, "Logarithmic 316:1"),
    (11, "IEC 61966-2-4"),
    (12, "BT.1361"),
    (13, "sRGB"),
    (14, "BT.2020 10-bit"),
    (15, "BT.2020 12-bit"),
    (16, "PQ"),
    (17, "SMPTE ST 428-1"),
    (18, "HLG"),
];

static MATRIX_COEFFICIENTS: &[(u16, &str)] = &[
    (0, "Identity"),
    (1, "BT.709"),
    (2, "Unspecified"),
    (4, "FCC"),
    (5, "BT.470 System B/G"),
    (6, "BT.601"),
    (7, "SMPTE 240M"),
    (8, "YCgCo"),
    (9, "BT.2020 non-constant luminance"),
    (10, "BT.2020 constant luminance"),
    (11, "SMPTE ST 2085"),
    (12, "Chromaticity-derived non-constant luminance"),
    (13, "Chromaticity-derived constant luminance"),
    (14, "ICtCp"),
    (15, "IPT-C2"),
];

pub fn colour_primaries_name(code: u16) -> &'static str {
    lookup(COLOUR_PRIMARIES, code)
}

pub fn transfer_characteristics_name(code: u16) -> &'static str {
    lookup(TRANSFER_CHARACTERISTICS, code)
}

pub fn matrix_coefficients_name(code: u16) -> &'static str {
    lookup(MATRIX_COEFFICIENTS, code)
}

/// HDR transfer functions get a short label of their own.
pub fn hdr_format(transfer: u16) -> Option<&'static str> {
    match transfer {
        16 => Some("HDR10 (PQ)"),
        18 => Some("HLG"),
        _ => None,
    }
}

static AV1_PROFILES: &[(u8, &str)] = &[(0, "Main"), (1, "High"), (2, "Professional")];

pub fn av1_profile_name(seq_profile: u8) -> &'static str {
    lookup(AV1_PROFILES, seq_profile)
}

/// AV1 levels are `2 + idx / 4` `.` `idx % 4`; 31 means unconstrained.
pub fn av1_level_name(seq_level_idx: u8) -> String {
    match seq_level_idx {
        0..=23 => format!("{}.{}", 2 + seq_level_idx / 4, seq_level_idx % 4),
        31 => "Unconstrained".into(),
        _ => UNKNOWN.into(),
    }
}

static H264_PROFILES: &[(u8, &str)] = &[
    (44, "CAVLC 4:4:4 Intra"),
    (66, "Baseline"),
    (77, "Main"),
    (83, "Scalable Baseline"),
    (86, "Scalable High"),
    (88, "Extended"),
    (100, "High"),
    (110, "High 10"),
    (118, "Multiview High"),
    (122, "High 4:2:2"),
    (128, "Stereo High"),
    (244, "High 4:4:4 Predictive"),
];

static H264_LEVELS: &[(u8, &str)] = &[
    (9, "1b"),
    (10, "1.0"),
    (11, "1.1"),
    (12, "1.2"),
    (13, "1.3"),
    (20, "2.0"),
    (21, "2.1"),
    (22, "2.2"),
    (30, "3.0"),
    (31, "3.1"),
    (32, "3.2"),
    (40, "4.0"),
    (41, "4.1"),
    (42, "4.2"),
    (50, "5.0"),
    (51, "5.1"),
    (52, "5.2"),
    (60, "6.0"),
    (61, "6.1"),
    (62, "6.2"),
];

pub fn h264_profile_name(profile_idc: u8) -> &'static str {
    lookup(H264_PROFILES, profile_idc)
}

pub fn h264_level_name(level_idc: u8) -> &'static str {
    lookup(H264_LEVELS, level_idc)
}

pub fn chroma_format_name(chroma_format_idc: u8) -> &'static str {
    match chroma_format_idc {
        0 => "monochrome",
        1 => "4:2:0",
        2 => "4:2:2",
        3 => "4:4:4",
        _ => UNKNOWN,
    }
}

static HEVC_PROFILES: &[(u8, &str)] = &[
    (1, "Main"),
    (2, "Main 10"),
    (3, "Main Still Picture"),
    (4, "Format Range Extensions"),
    (9, "Screen Content Coding"),
];

pub fn hevc_profile_name(profile_idc: u8) -> &'static str {
    lookup(HEVC_PROFILES, profile_idc)
}

/// HEVC `general_level_idc` is 30 × the level number.
pub fn hevc_level_name(level_idc: u8) -> String {
    if level_idc == 0 || level_idc % 3 != 0 {
        return UNKNOWN.into();
    }
    let tenths = u32::from(level_idc) / 3;
    format!("{}.{}", tenths / 10, tenths % 10)
}

static OBU_TYPES: &[(u8, &str)] = &[
    (1, "OBU_SEQUENCE_HEADER"),
    (2, "OBU_TEMPORAL_DELIMITER"),
    (3, "OBU_FRAME_HEADER"),
    (4, "OBU_TILE_GROUP"),
    (5, "OBU_METADATA"),
    (6, "OBU_FRAME"),
    (7, "OBU_REDUNDANT_FRAME_HEADER"),
    (8, "OBU_TILE_LIST"),
    (15, "OBU_PADDING"),
];

pub fn obu_type_name(obu_type: u8) -> &'static str {
    lookup(OBU_TYPES, obu_type)
}

/// Extended type Samsung motion photos use for their trailing video.
pub const MOTION_PHOTO_UUID: [u8; 16] = *b"MotionPhoto_Data";

static VENDOR_UUIDS: &[([u8; 16], &str)] = &[
    (
        [0xbe, 0x7a, 0xcf, 0xcb, 0x97, 0xa9, 0x42, 0xe8, 0x9c, 0x71, 0x99, 0x94, 0x91, 0xe3, 0xaf, 0xac],
        "XMP metadata",
    ),
    (
        [0xa2, 0x39, 0x4f, 0x52, 0x5a, 0x9b, 0x4f, 0x14, 0xa2, 0x44, 0x6c, 0x42, 0x7c, 0x64, 0x8d, 0xf4],
        "PIFF sample encryption",
    ),
    (
        [0x89, 0x74, 0xdb, 0xce, 0x7b, 0xe7, 0x4c, 0x51, 0x84, 0xf9, 0x71, 0x48, 0xf9, 0x88, 0x25, 0x54],
        "PIFF track encryption",
    ),
    (
        [0xd0, 0x8a, 0x4f, 0x18, 0x10, 0xf3, 0x4a, 0x82, 0xb6, 0xc8, 0x32, 0xd8, 0xab, 0xa1, 0x83, 0xd3],
        "PIFF protection system header",
    ),
    (
        [0x85, 0xc0, 0xb6, 0x87, 0x82, 0x0f, 0x11, 0xe0, 0x81, 0x11, 0xf4, 0xce, 0x46, 0x2b, 0x6a, 0x48],
        "Canon CR3 metadata",
    ),
    (MOTION_PHOTO_UUID, "Motion photo video"),
];

/// Vendor behind a `uuid` box extended type, if known.
pub fn uuid_vendor(uuid: &[u8; 16]) -> Option<&'static str> {
    VENDOR_UUIDS.iter().find(|(u, _)| u == uuid).map(|&(_, name)| name)
}

/// Canonical 8-4-4-4-12 lowercase hex form.
pub fn format_uuid(uuid: &[u8; 16]) -> String {
    let mut out = String::with_capacity(36);
    for (i, b) in uuid.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[test]
fn table_lookups() {
    assert_eq!(brand_name(FourCC::from(*b"avif")), "AVIF");
    assert_eq!(brand_name(FourCC::from(*b"mif1")), "HEIF");
    assert_eq!(brand_name(FourCC::from(*b"heic")), "HEIF container");
    assert_eq!(brand_name(FourCC::from(*b"xxxx")), UNKNOWN);
    assert!(is_heif_brand(FourCC::from(*b"hev1")));
    assert!(!is_heif_brand(FourCC::from(*b"avif")));

    assert_eq!(h264_profile_name(100), "High");
    assert_eq!(h264_level_name(31), "3.1");
    assert_eq!(h264_level_name(255), UNKNOWN);
    assert_eq!(av1_level_name(0), "2.0");
    assert_eq!(av1_level_name(11), "4.3");
    assert_eq!(av1_level_name(31), "Unconstrained");
    assert_eq!(hevc_level_name(93), "3.1");
    assert_eq!(hevc_level_name(120), "4.0");
    assert_eq!(transfer_characteristics_name(16), "PQ");
    assert_eq!(transfer_characteristics_name(18), "HLG");
    assert_eq!(matrix_coefficients_name(3), UNKNOWN);

    let xmp = [0xbe, 0x7a, 0xcf, 0xcb, 0x97, 0xa9, 0x42, 0xe8, 0x9c, 0x71, 0x99, 0x94, 0x91, 0xe3, 0xaf, 0xac];
    assert_eq!(uuid_vendor(&xmp), Some("XMP metadata"));
    assert_eq!(uuid_vendor(&[0; 16]), None);
    assert_eq!(format_uuid(&xmp), "be7acfcb-97a9-42e8-9c71-999491e3afac");
}
