// Copyright 2024 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![no_main]

use libfuzzer_sys::fuzz_target;

use std::io;

use slimtar::OpenOptions;
use tempfile::NamedTempFile;

fuzz_target!(|data: &[u8]| {
    let Ok(mut file) = NamedTempFile::new() else {
        return;
    };
    if io::Write::write_all(&mut file, data).is_err() {
        return;
    }

    // Both checksum modes, so corrupt checksums still reach the field decoders
    for verify in [true, false] {
        let Ok(archive) = OpenOptions::new()
            .verify_checksums(verify)
            .cache_handle(data.first().map_or(false, |b| b % 2 == 0))
            .open(file.path())
        else {
            continue;
        };
        for entry in archive.iter() {
            assert_eq!(entry.payload_offset() % 512, 0);
            assert!(entry.payload_offset() + entry.size() <= data.len() as u64);
            let _ = archive.copy_to(entry.name_bytes(), &mut io::sink());
        }
    }
});
