// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
#![no_main]
use libfuzzer_sys::fuzz_target;
use zenmedia_probe::Document;

fuzz_target!(|data: &[u8]| {
    let doc = Document::from_bytes(data);
    let value = doc.to_value();
    assert_eq!(
        value.get("field_count").and_then(|v| v.as_u64()),
        Some(doc.field_count() as u64)
    );
    for b in doc.boxes.iter() {
        for nested in b.walk() {
            assert!(nested.header.payload.end <= data.len());
            let _ = nested.payload(data);
        }
    }
});
