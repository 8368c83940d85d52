// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
use std::sync::atomic::{AtomicU32, Ordering};

use zenmedia_probe::sniff::{self, InputKind};
use zenmedia_probe::{
    CodecConfig, ColourInformation, ConstructionMethod, Document, Error, ParseConfig, StopReason, Unstoppable,
    Value,
};

/// Directory of real-world files for the corpus smoke test.
static CORPUS_VAR: &str = "ZENMEDIA_CORPUS";

fn init_logger() {
    let _ = env_logger::builder().is_test(true).filter_level(log::LevelFilter::max()).try_init();
}

// ============================================================================
// Synthetic file builders
// ============================================================================

fn boxed(name: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.extend_from_slice(&u32::try_from(payload.len() + 8).unwrap().to_be_bytes());
    out.extend_from_slice(name);
    out.extend_from_slice(payload);
    out
}

fn full(name: &[u8; 4], version: u8, body: &[u8]) -> Vec<u8> {
    let mut payload = vec![version, 0, 0, 0];
    payload.extend_from_slice(body);
    boxed(name, &payload)
}

fn be32(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

fn hdlr(handler: &[u8; 4], name: &str) -> Vec<u8> {
    let mut body = vec![0; 4];
    body.extend_from_slice(handler);
    body.extend_from_slice(&[0; 12]);
    body.extend_from_slice(name.as_bytes());
    body.push(0);
    full(b"hdlr", 0, &body)
}

/// Single-item AVIF: 10-bit 4:2:0, 1920x1080, BT.709, one extent in `mdat`.
fn avif_still() -> Vec<u8> {
    let mut infe = vec![0, 1, 0, 0];
    infe.extend_from_slice(b"av01Color\0");
    let mut iinf = vec![0, 1];
    iinf.extend(full(b"infe", 2, &infe));

    // offset_size 4, length_size 4, one item with one extent
    let mut iloc = vec![0x44, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01];
    iloc.extend(be32(&[1234, 100]));

    let mut ipco = boxed(b"av1C", &[0x81, 0x08, 0x4c, 0x00]);
    ipco.extend(full(b"ispe", 0, &be32(&[1920, 1080])));
    ipco.extend(boxed(b"colr", b"nclx\x00\x01\x00\x01\x00\x01\x00"));
    ipco.extend(full(b"pixi", 0, &[3, 10, 10, 10]));
    let mut iprp = boxed(b"ipco", &ipco);
    iprp.extend(full(b"ipma", 0, &[0, 0, 0, 1, 0, 1, 4, 0x81, 0x82, 3, 4]));

    let mut meta = hdlr(b"pict", "");
    meta.extend(full(b"pitm", 0, &[0, 1]));
    meta.extend(full(b"iloc", 0, &iloc));
    meta.extend(full(b"iinf", 0, &iinf));
    meta.extend(boxed(b"iprp", &iprp));

    let mut file = boxed(b"ftyp", b"avif\0\0\0\0avifmif1miafMA1B");
    file.extend(full(b"meta", 0, &meta));
    file.extend(boxed(b"mdat", &[0x12, 0x00, 0x0a, 0x0a, 0, 0, 0, 0]));
    file
}

// ============================================================================
// Container parsing
// ============================================================================

#[test]
fn avif_still_summary() {
    init_logger();
    let doc = Document::from_bytes(&avif_still());
    assert!(doc.errors.is_empty(), "{:?}", doc.errors);
    assert!(doc.is_valid_container);
    assert!(doc.is_heif);

    let av1c = doc.av1_config().expect("av1C");
    assert_eq!(av1c.bit_depth(), 10);
    assert_eq!(av1c.chroma_subsampling(), "4:2:0");

    let ispe = doc.image_dimensions().expect("ispe");
    assert_eq!((ispe.width, ispe.height), (1920, 1080));
    assert_eq!(ispe.megapixels(), 2.07);

    let Some(ColourInformation::Nclx { colour_primaries, full_range, .. }) = doc.color_information() else {
        panic!("expected nclx colour");
    };
    assert_eq!(*colour_primaries, 1);
    assert!(!full_range);

    assert_eq!(doc.primary_item, Some(1));
    let loc = doc.item_location(1).expect("iloc entry");
    assert_eq!(loc.construction_method, ConstructionMethod::File);
    assert_eq!((loc.extents[0].offset, loc.extents[0].length), (1234, 100));
    assert!(doc.item_location(2).is_none());
    assert_eq!(doc.item_dimensions(1).map(|d| d.height), Some(1080));
    assert!(doc.handler().is_some_and(|h| h.handler_type == b"pict"));
    assert!(doc.thumbnails.is_empty());
}

#[test]
fn summary_value_reads_like_the_file() {
    let doc = Document::from_bytes(&avif_still());
    let value = doc.to_value();
    let text = |path: &[&str]| {
        path.iter().try_fold(&value, |v, key| v.get(key)).and_then(Value::as_str).map(str::to_owned)
    };
    assert_eq!(text(&["file_type", "major_brand_name"]).as_deref(), Some("AVIF"));
    assert_eq!(text(&["av1_config", "profile"]).as_deref(), Some("Main"));
    assert_eq!(text(&["av1_config", "level"]).as_deref(), Some("4.0"));
    assert_eq!(text(&["color_information", "colour_primaries_name"]).as_deref(), Some("BT.709"));
    assert_eq!(value.get("total_boxes").and_then(Value::as_u64), Some(15));
    assert_eq!(value.get("field_count").and_then(Value::as_u64), Some(doc.field_count() as u64));
    assert!(value.get("errors").and_then(Value::as_list).is_some_and(<[Value]>::is_empty));
}

#[test]
fn every_prefix_parses_without_panicking() {
    init_logger();
    let file = avif_still();
    for len in 0..file.len() {
        let doc = Document::from_bytes(&file[..len]);
        assert_eq!(doc.is_valid_container, len >= 12, "prefix of {len} bytes");
        // ftyp is the first 32 bytes
        assert_eq!(doc.file_type().is_some(), len >= 32, "prefix of {len} bytes");
        let _ = doc.to_value();
    }
}

#[test]
fn oversized_box_keeps_earlier_siblings() {
    let mut file = boxed(b"ftyp", b"avif\0\0\0\0avif");
    file.extend(boxed(b"free", &[0; 4]));
    file.extend_from_slice(&1000u32.to_be_bytes());
    file.extend_from_slice(b"mdat");
    file.extend_from_slice(&[0; 16]);

    let doc = Document::from_bytes(&file);
    assert!(doc.is_valid_container);
    assert_eq!(doc.total_boxes, 2);
    assert_eq!(doc.errors.len(), 1);
    assert_eq!(doc.errors[0].offset, 32);
    assert!(matches!(doc.errors[0].error, Error::MalformedBox(_)));
}

#[test]
fn large_size_and_size_zero_boxes() {
    let mut file = boxed(b"ftyp", b"mif1\0\0\0\0mif1heic");
    file.extend_from_slice(&1u32.to_be_bytes());
    file.extend_from_slice(b"free");
    file.extend_from_slice(&20u64.to_be_bytes());
    file.extend_from_slice(&[0; 4]);
    file.extend_from_slice(&0u32.to_be_bytes());
    file.extend_from_slice(b"mdat");
    file.extend_from_slice(&[0xff; 40]);

    let doc = Document::from_bytes(&file);
    assert!(doc.errors.is_empty(), "{:?}", doc.errors);
    assert_eq!(doc.boxes.len(), 3);
    assert_eq!(doc.boxes[1].header.header_size, 16);
    assert_eq!(doc.boxes[1].header.size, 20);
    assert_eq!(doc.boxes[2].header.size, 48);
    assert_eq!(doc.boxes[2].header.end(), file.len());
    assert_eq!(doc.boxes[2].payload(&file), &[0xff; 40][..]);
}

#[test]
fn resource_limits() {
    let file = avif_still();
    let doc = Document::from_bytes_with_config(&file, &ParseConfig::default().with_max_boxes(3), &Unstoppable);
    assert_eq!(doc.total_boxes, 3);
    assert!(doc.errors.iter().any(|d| matches!(d.error, Error::ResourceLimitExceeded(_))));

    // meta at depth 0, its children at depth 1
    let shallow = Document::from_bytes_with_config(&file, &ParseConfig::default().with_max_depth(1), &Unstoppable);
    assert!(shallow.boxes.iter().all(|b| b.children.iter().all(|c| c.children.is_empty())));
    assert!(shallow.image_dimensions().is_none());
    assert!(shallow.file_type().is_some());

    let open = Document::from_bytes_with_config(&file, &ParseConfig::unlimited(), &Unstoppable);
    assert_eq!(open.total_boxes, 15);
}

#[test]
fn cancellation_is_reported() {
    struct CancelAfter(AtomicU32);
    impl zenmedia_probe::Stop for CancelAfter {
        fn check(&self) -> std::result::Result<(), StopReason> {
            if self.0.fetch_sub(1, Ordering::Relaxed) == 0 {
                Err(StopReason::Cancelled)
            } else {
                Ok(())
            }
        }
    }

    let file = avif_still();
    let doc = Document::from_bytes_with_config(&file, &ParseConfig::default(), &CancelAfter(AtomicU32::new(2)));
    assert!(doc.is_valid_container);
    assert_eq!(doc.total_boxes, 2);
    match &doc.errors.last().expect("stop recorded").error {
        Error::Stopped(reason) => assert_eq!(*reason, StopReason::Cancelled),
        other => panic!("Unexpected error: {other:?}"),
    }
}

#[test]
fn motion_photo_uuid() {
    let mut uuid = b"MotionPhoto_Data".to_vec();
    uuid.extend_from_slice(&[0xde, 0xad]);
    uuid.extend(boxed(b"mp4v", &[0; 24]));
    let mut file = boxed(b"ftyp", b"heic\0\0\0\0mif1heic");
    file.extend(boxed(b"uuid", &uuid));

    let doc = Document::from_bytes(&file);
    let video = doc.motion_photo().expect("sidecar video");
    assert_eq!(video.offset, 24 + 8 + 16 + 2);
    assert_eq!(video.size, 32);
    let mp4v_at = usize::try_from(video.offset).unwrap() + 4;
    assert_eq!(&file[mp4v_at..mp4v_at + 4], b"mp4v");
}

#[test]
fn hevc_heif_item() {
    let mut hvcc = vec![1u8, 0x01, 0x60, 0, 0, 0, 0x90, 0, 0, 0, 0, 0, 120];
    hvcc.extend_from_slice(&[0xf0, 0x00, 0xfc, 0xfd, 0xf8, 0xf8, 0x00, 0x00, 0x0f, 0]);
    let mut meta = hdlr(b"pict", "HEIF");
    meta.extend(boxed(b"iprp", &boxed(b"ipco", &boxed(b"hvcC", &hvcc))));
    let mut file = boxed(b"ftyp", b"heic\0\0\0\0mif1heic");
    file.extend(full(b"meta", 0, &meta));

    let doc = Document::from_bytes(&file);
    assert!(doc.is_heif);
    let hvcc = doc.hevc_config().expect("hvcC");
    assert_eq!(hvcc.general_level_idc, 120);
    assert_eq!(hvcc.bit_depth_luma, 8);
    assert_eq!(doc.handler().map(|h| h.name.as_str()), Some("HEIF"));
    assert_eq!(doc.primary_item, None);
}

#[test]
fn from_reader_and_path() {
    let file = avif_still();
    let doc = Document::from_reader(&mut file.as_slice()).unwrap();
    assert_eq!(doc.total_boxes, 15);

    let path = std::env::temp_dir().join(format!("zenmedia-probe-{}.avif", std::process::id()));
    std::fs::write(&path, &file).unwrap();
    let from_path = Document::from_path(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(from_path.field_count(), doc.field_count());

    assert!(matches!(Document::from_path("/nonexistent/zenmedia.avif"), Err(Error::Io(_))));
}

// ============================================================================
// Codec streams
// ============================================================================

#[test]
fn sniff_dispatch() {
    assert_eq!(sniff::detect(&avif_still()), InputKind::Isobmff);
    assert_eq!(sniff::detect(&[0, 0, 0, 1, 0x67]), InputKind::AnnexB);
    assert_eq!(sniff::detect(b"DKIF"), InputKind::Ivf);
    assert_eq!(sniff::detect(b"GIF89a"), InputKind::Unknown);
}

#[test]
fn h264_emulation_prevention() {
    // SPS: Baseline, level 3.0, monochrome 176x144; the run of zero bits
    // after the level carries an emulation prevention byte
    let stream = [0, 0, 0, 1, 0x67, 66, 0xe0, 0x1e, 0x00, 0x00, 0x03, 0x00, 0x50, 0x02, 0x10];
    let records = zenmedia_probe::h264_parameter_sets(&stream).unwrap();
    assert_eq!(records.len(), 1);
    let CodecConfig::H264Sps(sps) = &records[0] else { panic!("{:?}", records[0]) };
    assert_eq!(sps.profile_name(), Some("Baseline"));
    assert_eq!(sps.level_name(), Some("3.0"));
    assert_eq!((sps.width(), sps.height()), (Some(176), Some(144)));
    assert_eq!(records[0].parsing_error(), None);
}

#[test]
fn codec_records_tolerate_garbage() {
    init_logger();
    let garbage: Vec<u8> = (0u32..512).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8).collect();
    for start in 0..64 {
        let data = &garbage[start..];
        for record in zenmedia_probe::av1_obu_headers(data).unwrap().iter() {
            let _ = record.to_value();
        }
        let _ = zenmedia_probe::h264_parameter_sets(data).unwrap();
        let _ = zenmedia_probe::hevc_parameter_sets(data).unwrap();
    }
}

// ============================================================================
// Corpus and serialization
// ============================================================================

#[test]
fn corpus_smoke() {
    let Some(dir) = std::env::var_os(CORPUS_VAR) else {
        eprintln!("{CORPUS_VAR} not set, skipping");
        return;
    };
    init_logger();
    for entry in walkdir::WalkDir::new(dir) {
        let entry = entry.expect("corpus entry");
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        log::debug!("parsing {:?}", path.display());
        let data = std::fs::read(path).expect("bad file");
        match sniff::detect(&data) {
            InputKind::Isobmff => {
                let doc = Document::from_bytes(&data);
                assert!(doc.is_valid_container, "{}", path.display());
                assert_eq!(doc.to_value().get("field_count").and_then(Value::as_u64), Some(doc.field_count() as u64));
            },
            InputKind::AnnexB => {
                zenmedia_probe::h264_parameter_sets(&data).unwrap();
                zenmedia_probe::hevc_parameter_sets(&data).unwrap();
            },
            InputKind::Ivf => {
                zenmedia_probe::av1_obu_headers(&data).unwrap();
            },
            InputKind::Unknown => log::debug!("skipping {:?}", path.display()),
        }
    }
}

#[cfg(feature = "serde")]
#[test]
fn summary_serializes_to_json() {
    let doc = Document::from_bytes(&avif_still());
    let json = serde_json::to_value(doc.to_value()).unwrap();
    assert_eq!(json["file_type"]["major_brand"], "avif");
    assert_eq!(json["image_dimensions"]["width"], 1920);
    assert_eq!(json["is_heif"], true);
    assert_eq!(json["boxes"][0]["type"], "ftyp");
    assert!(json["primary_item"].is_u64());
    assert!(json["motion_photo"].is_null());
}
