// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
#![no_main]
use libfuzzer_sys::fuzz_target;
use zenmedia_probe::{Document, ParseConfig};

fuzz_target!(|data: &[u8]| {
    let config = ParseConfig::default()
        .with_max_depth(4)
        .with_max_boxes(64)
        .with_max_item_entries(16)
        .lenient(data.first().is_some_and(|b| b & 1 == 1));
    let doc = Document::from_bytes_with_config(data, &config, &enough::Unstoppable);
    assert!(doc.total_boxes <= 64);
    let _ = doc.to_value();
});
