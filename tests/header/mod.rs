use std::fs;

use slimtar::{Decoded, Header, HeaderError, MAX_ENTRY_SIZE, NAME_LEN};
use zerocopy::{FromBytes, IntoBytes};

#[test]
fn for_file_decodes_back() {
    let h = t!(Header::for_file("a.txt", 2, 1_600_000_000));
    assert_eq!(
        t!(h.decode()),
        Decoded {
            name: b"a.txt".to_vec(),
            size: 2,
            mtime: 1_600_000_000,
        }
    );
    assert_eq!(t!(h.mode()), 0o644);
    t!(h.verify_cksum());
}

#[test]
fn field_offsets() {
    let h = t!(Header::for_file("name", 0o17, 0o21));
    let bytes = h.as_bytes();
    assert_eq!(bytes.len(), 512);
    assert_eq!(&bytes[0..4], b"name");
    assert_eq!(&bytes[100..108], b"0000644\0");
    assert_eq!(&bytes[124..136], b"00000000017\0");
    assert_eq!(&bytes[136..148], b"00000000021\0");
    assert_eq!(&bytes[154..156], b"\0 ");
    assert_eq!(bytes[156], b'0');
    assert!(bytes[157..].iter().all(|b| *b == 0));
}

#[test]
fn checksum_is_stable() {
    let h = t!(Header::for_file("a.txt", 2, 0));
    let copy = t!(Header::read_from_bytes(h.as_bytes()).map_err(|_| "short block"));
    assert_eq!(t!(copy.cksum()), h.calculate_cksum());
    assert_eq!(t!(copy.cksum()), copy.calculate_cksum());
}

#[test]
fn checksum_matches_independent_writer() {
    let bytes = t!(fs::read(tar!("reading_files.tar")));
    let h = t!(Header::read_from_bytes(&bytes[..512]).map_err(|_| "short block"));
    t!(h.verify_cksum());
    assert_eq!(h.name(), "a");
    assert_eq!(t!(h.entry_size()), 22);
    assert_eq!(t!(h.mtime()), 1234567890);
}

#[test]
fn set_cksum_overwrites_stale_value() {
    let mut h = t!(Header::for_file("a.txt", 2, 0));
    t!(h.set_size(3));
    assert!(matches!(h.verify_cksum(), Err(HeaderError::Checksum { .. })));
    h.set_cksum();
    t!(h.verify_cksum());
}

#[test]
fn overflowing_fields() {
    assert_eq!(
        Header::for_file("big", MAX_ENTRY_SIZE + 1, 0).err(),
        Some(HeaderError::Overflow { field: "size" })
    );
    assert_eq!(
        Header::for_file("late", 0, 0o1_0000_0000_000).err(),
        Some(HeaderError::Overflow { field: "mtime" })
    );
    assert_eq!(
        Header::for_file(&"x".repeat(NAME_LEN + 1), 0, 0).err(),
        Some(HeaderError::Overflow { field: "name" })
    );
}

#[test]
fn malformed_octal_is_an_error() {
    let mut h = t!(Header::for_file("a.txt", 2, 0));
    h.mtime = *b"12345678\xff\0\0\0";
    assert_eq!(h.mtime(), Err(HeaderError::InvalidOctal { field: "mtime" }));
    assert_eq!(
        h.decode(),
        Err(HeaderError::InvalidOctal { field: "mtime" })
    );
}

#[test]
fn names_stop_at_nul() {
    let mut h = Header::new();
    t!(h.set_name(b"abc"));
    assert_eq!(h.name_bytes(), b"abc");
    t!(h.set_name(b"x"));
    // the rest of the old name is cleared
    assert_eq!(h.name_bytes(), b"x");
    assert!(h.name[1..].iter().all(|b| *b == 0));

    h.name = [b'n'; 100];
    assert_eq!(h.name().len(), 100);
}

#[test]
fn zero_header() {
    let h = Header::new();
    assert!(h.is_zero());
    assert_eq!(h.calculate_cksum(), 256);
    assert!(h.verify_cksum().is_err());
}
