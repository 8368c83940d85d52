// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
#![no_main]
use libfuzzer_sys::fuzz_target;
use zenmedia_probe::{H264Pps, H264Sps, HevcVps, av1_obu_headers, h264_parameter_sets, hevc_parameter_sets};

fuzz_target!(|data: &[u8]| {
    let _ = H264Sps::parse(data).fields();
    let _ = H264Pps::parse(data).fields();
    let _ = HevcVps::parse(data).fields();
    for records in [h264_parameter_sets(data), hevc_parameter_sets(data), av1_obu_headers(data)] {
        if let Ok(records) = records {
            for record in records.iter() {
                let _ = record.to_value();
            }
        }
    }
});
