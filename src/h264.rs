// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! H.264 sequence and picture parameter sets.
//!
//! Both records are read with a fixed-width layout: every field, including
//! the ones the full syntax codes as Exp-Golomb, has the width given next to
//! it below. Input is the RBSP after the one-byte NAL header, with emulation
//! prevention bytes already removed.

use bitreader::BitReader;
use log::warn;

use crate::Result;
use crate::tables;
use crate::value::Fields;

/// Cropping offsets in crop units, not pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCropping {
    pub left: u8,
    pub right: u8,
    pub top: u8,
    pub bottom: u8,
}

/// Sequence parameter set. Fields stay `None` past the point where the
/// data ran out, with `parsing_error` saying why.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct H264Sps {
    /// 8 bits
    pub profile_idc: Option<u8>,
    /// constraint_set0..5, MSB first (6 bits, then 2 reserved)
    pub constraint_set_flags: Option<u8>,
    /// 8 bits
    pub level_idc: Option<u8>,
    /// 4 bits
    pub seq_parameter_set_id: Option<u8>,
    /// 2 bits
    pub chroma_format_idc: Option<u8>,
    /// bit_depth_luma_minus8 (3 bits) + 8
    pub bit_depth_luma: Option<u8>,
    /// bit_depth_chroma_minus8 (3 bits) + 8
    pub bit_depth_chroma: Option<u8>,
    /// 2^(log2_max_frame_num_minus4 (4 bits) + 4)
    pub max_frame_num: Option<u32>,
    /// pic_width_in_mbs_minus1 (13 bits) + 1
    pub pic_width_in_mbs: Option<u16>,
    /// pic_height_in_map_units_minus1 (13 bits) + 1
    pub pic_height_in_map_units: Option<u16>,
    /// Present when frame_cropping_flag is set; four 6-bit offsets.
    pub frame_cropping: Option<FrameCropping>,
    pub parsing_error: Option<String>,
}

impl H264Sps {
    pub fn parse(rbsp: &[u8]) -> Self {
        let mut sps = Self::default();
        if let Err(e) = sps.read(&mut BitReader::new(rbsp)) {
            warn!("H.264 SPS: {e}");
            sps.parsing_error = Some(e.to_string());
        }
        sps
    }

    fn read(&mut self, r: &mut BitReader<'_>) -> Result<()> {
        self.profile_idc = Some(r.read_u8(8)?);
        self.constraint_set_flags = Some(r.read_u8(6)?);
        r.skip(2)?;
        self.level_idc = Some(r.read_u8(8)?);
        self.seq_parameter_set_id = Some(r.read_u8(4)?);
        self.chroma_format_idc = Some(r.read_u8(2)?);
        self.bit_depth_luma = Some(r.read_u8(3)? + 8);
        self.bit_depth_chroma = Some(r.read_u8(3)? + 8);
        self.max_frame_num = Some(1 << (r.read_u32(4)? + 4));
        self.pic_width_in_mbs = Some(r.read_u16(13)? + 1);
        self.pic_height_in_map_units = Some(r.read_u16(13)? + 1);
        if r.read_bool()? {
            self.frame_cropping = Some(FrameCropping {
                left: r.read_u8(6)?,
                right: r.read_u8(6)?,
                top: r.read_u8(6)?,
                bottom: r.read_u8(6)?,
            });
        }
        Ok(())
    }

    pub fn profile_name(&self) -> Option<&'static str> {
        self.profile_idc.map(tables::h264_profile_name)
    }

    pub fn level_name(&self) -> Option<&'static str> {
        self.level_idc.map(tables::h264_level_name)
    }

    /// (CropUnitX, CropUnitY) for progressive frames.
    fn crop_units(&self) -> (u32, u32) {
        match self.chroma_format_idc {
            Some(1) => (2, 2),
            Some(2) => (2, 1),
            _ => (1, 1),
        }
    }

    /// Luma width after cropping.
    pub fn width(&self) -> Option<u32> {
        let full = u32::from(self.pic_width_in_mbs?) * 16;
        let crop = self.frame_cropping.unwrap_or_default();
        Some(full.saturating_sub(self.crop_units().0 * (u32::from(crop.left) + u32::from(crop.right))))
    }

    /// Luma height after cropping.
    pub fn height(&self) -> Option<u32> {
        let full = u32::from(self.pic_height_in_map_units?) * 16;
        let crop = self.frame_cropping.unwrap_or_default();
        Some(full.saturating_sub(self.crop_units().1 * (u32::from(crop.top) + u32::from(crop.bottom))))
    }

    pub fn fields(&self) -> Fields {
        Fields::new()
            .with("profile_idc", self.profile_idc)
            .with("profile_name", self.profile_name())
            .with("constraint_set_flags", self.constraint_set_flags)
            .with("level_idc", self.level_idc)
            .with("level_name", self.level_name())
            .with("seq_parameter_set_id", self.seq_parameter_set_id)
            .with("chroma_format", self.chroma_format_idc.map(tables::chroma_format_name))
            .with("bit_depth_luma", self.bit_depth_luma)
            .with("bit_depth_chroma", self.bit_depth_chroma)
            .with("max_frame_num", self.max_frame_num)
            .with("width", self.width())
            .with("height", self.height())
            .with(
                "frame_cropping",
                self.frame_cropping.map(|c| {
                    Fields::new()
                        .with("left", c.left)
                        .with("right", c.right)
                        .with("top", c.top)
                        .with("bottom", c.bottom)
                }),
            )
    }
}

/// Picture parameter set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct H264Pps {
    /// 6 bits
    pub pic_parameter_set_id: Option<u8>,
    /// 4 bits
    pub seq_parameter_set_id: Option<u8>,
    /// num_ref_idx_l0_default_active_minus1 (3 bits) + 1
    pub num_ref_idx_l0_default_active: Option<u8>,
    /// num_ref_idx_l1_default_active_minus1 (3 bits) + 1
    pub num_ref_idx_l1_default_active: Option<u8>,
    pub entropy_coding_mode_flag: Option<bool>,
    pub bottom_field_pic_order_in_frame_present_flag: Option<bool>,
    /// 3 bits, present only with the flag above.
    pub pic_order_field: Option<u8>,
    /// num_slice_groups_minus1 (3 bits) + 1
    pub num_slice_groups: Option<u8>,
    /// 3 bits
    pub num_ref_idx_l0_active: Option<u8>,
    /// 3 bits
    pub num_ref_idx_l1_active: Option<u8>,
    pub weighted_pred_flag: Option<bool>,
    /// The next three are 2 bits each, present only with weighted_pred_flag.
    pub weighted_bipred_idc: Option<u8>,
    pub luma_log2_weight_denom: Option<u8>,
    pub chroma_log2_weight_denom: Option<u8>,
    pub parsing_error: Option<String>,
}

impl H264Pps {
    pub fn parse(rbsp: &[u8]) -> Self {
        let mut pps = Self::default();
        if let Err(e) = pps.read(&mut BitReader::new(rbsp)) {
            warn!("H.264 PPS: {e}");
            pps.parsing_error = Some(e.to_string());
        }
        pps
    }

    fn read(&mut self, r: &mut BitReader<'_>) -> Result<()> {
        self.pic_parameter_set_id = Some(r.read_u8(6)?);
        self.seq_parameter_set_id = Some(r.read_u8(4)?);
        self.num_ref_idx_l0_default_active = Some(r.read_u8(3)? + 1);
        self.num_ref_idx_l1_default_active = Some(r.read_u8(3)? + 1);
        self.entropy_coding_mode_flag = Some(r.read_bool()?);
        let pic_order_present = r.read_bool()?;
        self.bottom_field_pic_order_in_frame_present_flag = Some(pic_order_present);
        if pic_order_present {
            self.pic_order_field = Some(r.read_u8(3)?);
        }
        self.num_slice_groups = Some(r.read_u8(3)? + 1);
        self.num_ref_idx_l0_active = Some(r.read_u8(3)?);
        self.num_ref_idx_l1_active = Some(r.read_u8(3)?);
        let weighted = r.read_bool()?;
        self.weighted_pred_flag = Some(weighted);
        if weighted {
            self.weighted_bipred_idc = Some(r.read_u8(2)?);
            self.luma_log2_weight_denom = Some(r.read_u8(2)?);
            self.chroma_log2_weight_denom = Some(r.read_u8(2)?);
        }
        Ok(())
    }

    pub fn entropy_coder(&self) -> Option<&'static str> {
        self.entropy_coding_mode_flag.map(|cabac| if cabac { "CABAC" } else { "CAVLC" })
    }

    pub fn fields(&self) -> Fields {
        Fields::new()
            .with("pic_parameter_set_id", self.pic_parameter_set_id)
            .with("seq_parameter_set_id", self.seq_parameter_set_id)
            .with("num_ref_idx_l0_default_active", self.num_ref_idx_l0_default_active)
            .with("num_ref_idx_l1_default_active", self.num_ref_idx_l1_default_active)
            .with("entropy_coder", self.entropy_coder())
            .with(
                "bottom_field_pic_order_in_frame_present",
                self.bottom_field_pic_order_in_frame_present_flag,
            )
            .with("pic_order_field", self.pic_order_field)
            .with("num_slice_groups", self.num_slice_groups)
            .with("num_ref_idx_l0_active", self.num_ref_idx_l0_active)
            .with("num_ref_idx_l1_active", self.num_ref_idx_l1_active)
            .with("weighted_pred", self.weighted_pred_flag)
            .with("weighted_bipred_idc", self.weighted_bipred_idc)
            .with("luma_log2_weight_denom", self.luma_log2_weight_denom)
            .with("chroma_log2_weight_denom", self.chroma_log2_weight_denom)
    }
}

#[cfg(test)]
use crate::{bits::pack_bits, value::Value};

#[test]
fn sps_1080p_high_profile() {
    let rbsp = pack_bits(&[
        (100, 8),
        (0b000100, 6),
        (0, 2),
        (31, 8),
        (0, 4),
        (1, 2),
        (0, 3),
        (0, 3),
        (0, 4),
        (119, 13),
        (67, 13),
        (1, 1),
        (0, 6),
        (0, 6),
        (0, 6),
        (4, 6),
    ]);
    let sps = H264Sps::parse(&rbsp);
    assert_eq!(sps.parsing_error, None);
    assert_eq!(sps.profile_name(), Some("High"));
    assert_eq!(sps.level_name(), Some("3.1"));
    assert_eq!(sps.max_frame_num, Some(16));
    assert_eq!(sps.width(), Some(1920));
    assert_eq!(sps.height(), Some(1080));
    let fields = sps.fields();
    assert_eq!(fields.get("chroma_format").and_then(Value::as_str), Some("4:2:0"));
    assert_eq!(fields.get("bit_depth_luma").and_then(Value::as_u64), Some(8));
}

#[test]
fn sps_truncated_keeps_prefix() {
    let sps = H264Sps::parse(&[66, 0xc0, 30]);
    assert!(sps.parsing_error.is_some());
    assert_eq!(sps.profile_name(), Some("Baseline"));
    assert_eq!(sps.level_name(), Some("3.0"));
    assert_eq!(sps.seq_parameter_set_id, None);
    assert_eq!(sps.width(), None);
    // profile, profile name, flags, level, level name
    assert_eq!(Value::from(sps.fields()).field_count(), 5);
}

#[test]
fn pps_weighted_prediction() {
    let rbsp = pack_bits(&[
        (1, 6),
        (0, 4),
        (0, 3),
        (1, 3),
        (1, 1),
        (1, 1),
        (5, 3),
        (0, 3),
        (2, 3),
        (3, 3),
        (1, 1),
        (2, 2),
        (1, 2),
        (3, 2),
    ]);
    let pps = H264Pps::parse(&rbsp);
    assert_eq!(pps.parsing_error, None);
    assert_eq!(pps.entropy_coder(), Some("CABAC"));
    assert_eq!(pps.num_ref_idx_l1_default_active, Some(2));
    assert_eq!(pps.pic_order_field, Some(5));
    assert_eq!(pps.num_slice_groups, Some(1));
    assert_eq!(pps.weighted_bipred_idc, Some(2));
    assert_eq!(pps.chroma_log2_weight_denom, Some(3));

    let short = H264Pps::parse(&[0x04]);
    assert_eq!(short.pic_parameter_set_id, Some(1));
    assert_eq!(short.seq_parameter_set_id, None);
    assert!(short.parsing_error.is_some());
}
