// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HEVC video parameter set, fixed-width header fields only.

use bitreader::BitReader;
use log::warn;

use crate::Result;
use crate::value::Fields;

/// Input is the RBSP after the two-byte NAL header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HevcVps {
    /// vps_video_parameter_set_id, 4 bits
    pub vps_id: Option<u8>,
    /// max_layers_minus1 (3 bits) + 1
    pub max_layers: Option<u8>,
    /// max_sub_layers_minus1 (3 bits) + 1
    pub max_sub_layers: Option<u8>,
    pub temporal_id_nesting: Option<bool>,
    pub profile_tier_level_present: Option<bool>,
    pub profile_present: Option<bool>,
    pub parsing_error: Option<String>,
}

impl HevcVps {
    pub fn parse(rbsp: &[u8]) -> Self {
        let mut vps = Self::default();
        if let Err(e) = vps.read(&mut BitReader::new(rbsp)) {
            warn!("HEVC VPS: {e}");
            vps.parsing_error = Some(e.to_string());
        }
        vps
    }

    fn read(&mut self, r: &mut BitReader<'_>) -> Result<()> {
        self.vps_id = Some(r.read_u8(4)?);
        self.max_layers = Some(r.read_u8(3)? + 1);
        self.max_sub_layers = Some(r.read_u8(3)? + 1);
        self.temporal_id_nesting = Some(r.read_bool()?);
        self.profile_tier_level_present = Some(r.read_bool()?);
        self.profile_present = Some(r.read_bool()?);
        Ok(())
    }

    pub fn fields(&self) -> Fields {
        Fields::new()
            .with("vps_id", self.vps_id)
            .with("max_layers", self.max_layers)
            .with("max_sub_layers", self.max_sub_layers)
            .with("temporal_id_nesting", self.temporal_id_nesting)
            .with("profile_tier_level_present", self.profile_tier_level_present)
            .with("profile_present", self.profile_present)
    }
}

#[test]
fn vps_fields() {
    // 0011 010 001 1 1 0 (pad)
    let vps = HevcVps::parse(&[0b0011_0100, 0b0111_0000]);
    assert_eq!(vps.parsing_error, None);
    assert_eq!(vps.vps_id, Some(3));
    assert_eq!(vps.max_layers, Some(3));
    assert_eq!(vps.max_sub_layers, Some(2));
    assert_eq!(vps.temporal_id_nesting, Some(true));
    assert_eq!(vps.profile_tier_level_present, Some(true));
    assert_eq!(vps.profile_present, Some(false));

    let empty = HevcVps::parse(&[]);
    assert_eq!(empty.vps_id, None);
    assert!(empty.parsing_error.is_some());
    assert!(empty.fields().iter().all(|(_, v)| v.is_null()));
}
