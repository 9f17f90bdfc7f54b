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

use std::io::Write;

use slimtar::{Builder, HeaderMode, OpenOptions, Terminator};
use tempfile::NamedTempFile;

fuzz_target!(|data: &[u8]| {
    let Some((&flags, rest)) = data.split_first() else {
        return;
    };
    let Ok(mut file) = NamedTempFile::new() else {
        return;
    };

    // Split the input into (name, payload) pairs on 0xff
    let mut chunks = rest.split(|&b| b == 0xff);
    let mut written = Vec::new();
    {
        let mut builder = Builder::new(file.as_file_mut());
        if flags & 1 == 1 {
            builder.mode(HeaderMode::Deterministic);
        }
        if flags & 2 == 2 {
            builder.terminator(Terminator::Single);
        }
        while let (Some(name), Some(payload)) = (chunks.next(), chunks.next()) {
            if builder.append_data(name, payload).is_ok() {
                written.push((name.to_vec(), payload.to_vec()));
            }
        }
        if builder.finish().is_err() {
            return;
        }
    }
    file.as_file_mut().flush().unwrap();

    let archive = OpenOptions::new().open(file.path()).unwrap();
    assert_eq!(archive.len(), written.len());
    for (entry, (name, payload)) in archive.iter().zip(&written) {
        assert_eq!(entry.name_bytes(), &name[..]);
        assert_eq!(entry.size(), payload.len() as u64);
    }
    // Duplicate names shadow each other, so only unique ones read back exactly
    for (name, payload) in &written {
        if written.iter().filter(|(n, _)| n == name).count() == 1 {
            assert_eq!(&archive.read(name).unwrap(), payload);
        }
    }
});
