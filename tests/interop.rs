//! Archives written here must be readable by the `tar` crate and the other
//! way around.

use std::fs;
use std::io::Read;

use slimtar::{Archive, Builder, HeaderMode};
use tempfile::TempDir;

macro_rules! t {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => panic!("{} returned {}", stringify!($e), e),
        }
    };
}

fn sample() -> Vec<(&'static str, Vec<u8>)> {
    vec![
        ("a.txt", b"hi".to_vec()),
        ("empty", Vec::new()),
        ("block", vec![b'b'; 512]),
        ("odd", (0..1337u32).map(|i| i as u8).collect()),
    ]
}

fn read_with_tar_crate(data: &[u8]) -> Vec<(String, u64, Vec<u8>)> {
    let mut ar = tar::Archive::new(data);
    let mut out = Vec::new();
    for entry in t!(ar.entries()) {
        let mut entry = t!(entry);
        let name = t!(entry.path()).to_string_lossy().into_owned();
        let mtime = t!(entry.header().mtime());
        let mut buf = Vec::new();
        t!(entry.read_to_end(&mut buf));
        out.push((name, mtime, buf));
    }
    out
}

#[test]
fn tar_crate_reads_our_archives() {
    let mut builder = Builder::new(Vec::new());
    builder.mode(HeaderMode::Deterministic);
    for (name, data) in sample() {
        t!(builder.append_data(name, &data));
    }
    let data = t!(builder.into_inner());

    let read = read_with_tar_crate(&data);
    assert_eq!(read.len(), 4);
    for ((name, mtime, content), (expected_name, expected)) in read.into_iter().zip(sample()) {
        assert_eq!(name, expected_name);
        assert_eq!(mtime, 1153704088);
        assert_eq!(content, expected);
    }

    let mut ar = tar::Archive::new(&data[..]);
    for entry in t!(ar.entries()) {
        let entry = t!(entry);
        assert_eq!(entry.header().entry_type(), tar::EntryType::Regular);
        assert_eq!(t!(entry.header().mode()), 0o644);
    }
}

#[test]
fn we_read_tar_crate_archives() {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in sample() {
        let mut header = tar::Header::new_ustar();
        header.set_size(data.len() as u64);
        header.set_mode(0o600);
        header.set_mtime(1_000_000);
        t!(builder.append_data(&mut header, name, &data[..]));
    }
    let mut header = tar::Header::new_gnu();
    header.set_size(3);
    header.set_mtime(42);
    t!(builder.append_data(&mut header, "gnu", &b"gnu"[..]));
    let data = t!(builder.into_inner());

    let td = t!(TempDir::new());
    let path = td.path().join("from-tar-crate.tar");
    t!(fs::write(&path, &data));

    let ar = t!(Archive::open(&path));
    assert_eq!(ar.len(), 5);
    for (entry, (name, expected)) in ar.iter().zip(sample()) {
        assert_eq!(entry.name(), name);
        assert_eq!(entry.mtime(), 1_000_000);
        assert_eq!(t!(ar.read(name)), expected);
    }
    assert_eq!(ar.entries()[4].mtime(), 42);
    assert_eq!(t!(ar.read("gnu")), b"gnu");
}

#[test]
fn exported_archive_reads_in_tar_crate() {
    let td = t!(TempDir::new());
    let src = td.path().join("src.tar");
    {
        let mut builder = t!(Builder::create(&src));
        for (name, data) in sample() {
            t!(builder.append_data(name, &data));
        }
        t!(builder.finish());
    }

    let mut ar = t!(Archive::open(&src));
    assert!(ar.rename("odd", "renamed"));
    let dst = td.path().join("dst.tar");
    t!(ar.export(&dst));

    let read = read_with_tar_crate(&t!(fs::read(&dst)));
    let names = read.iter().map(|(n, _, _)| n.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["a.txt", "empty", "block", "renamed"]);
    assert_eq!(read[3].2, sample()[3].1);
}
