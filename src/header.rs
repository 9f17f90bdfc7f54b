use std::borrow::Cow;
use std::fmt;
use std::str;

use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::error::HeaderError;
use crate::BLOCK_SIZE;

/// Width of the `name` field, and so the longest name an entry can carry.
pub const NAME_LEN: usize = 100;

/// Largest payload the 12-byte size field can describe (11 octal digits).
pub const MAX_ENTRY_SIZE: u64 = 0o77777777777;

/// Permission bits written into every header. Ownership and permissions are
/// not tracked, so this is a fixed placeholder.
pub const DEFAULT_MODE: u32 = 0o644;

/// Link indicator for a regular file.
pub const REGULAR_FILE: u8 = b'0';

// mtime used by `HeaderMode::Deterministic`
const DETERMINISTIC_TIMESTAMP: u64 = 1153704088;

/// Representation of the header of an entry in an archive.
///
/// The layout is exactly one 512-byte block, so a `Header` can be read from
/// and written to a stream through `as_bytes` / `as_mut_bytes`.
#[repr(C)]
#[derive(Clone, FromBytes, IntoBytes, KnownLayout, Immutable)]
#[allow(missing_docs)]
pub struct Header {
    pub name: [u8; 100],
    pub mode: [u8; 8],
    pub owner_id: [u8; 8],
    pub group_id: [u8; 8],
    pub size: [u8; 12],
    pub mtime: [u8; 12],
    pub cksum: [u8; 8],
    pub link: [u8; 1],
    pub linkname: [u8; 100],
    pub reserved: [u8; 255],
}

/// Controls how the modification time of written entries is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum HeaderMode {
    /// Stamp entries with the current wall-clock time.
    #[default]
    Complete,

    /// Stamp every entry with the same fixed time so that identical inputs
    /// produce byte-identical archives.
    Deterministic,
}

impl HeaderMode {
    pub(crate) fn mtime(self) -> u64 {
        match self {
            HeaderMode::Complete => std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            HeaderMode::Deterministic => DETERMINISTIC_TIMESTAMP,
        }
    }
}

/// The fields of a header that the index keeps.
///
/// `name` holds the raw bytes of the name field up to the first NUL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    pub name: Vec<u8>,
    pub size: u64,
    pub mtime: u64,
}

impl Header {
    /// Creates a new all-zero header.
    pub fn new() -> Header {
        Header::new_zeroed()
    }

    /// Builds the header for a regular file named `name` holding `size`
    /// bytes last modified at `mtime`, with its checksum filled in.
    ///
    /// The name is copied verbatim and must already be valid for the
    /// `name` field; see `set_name`.
    pub fn for_file<N: AsRef<[u8]>>(name: N, size: u64, mtime: u64) -> Result<Header, HeaderError> {
        let mut header = Header::new();
        header.set_name(name.as_ref())?;
        header.set_mode(DEFAULT_MODE)?;
        header.set_uid(0)?;
        header.set_gid(0)?;
        header.set_size(size)?;
        header.set_mtime(mtime)?;
        header.link = [REGULAR_FILE];
        header.set_cksum();
        Ok(header)
    }

    /// Decodes the name, size and mtime of this header.
    ///
    /// The checksum is not consulted here; see `verify_cksum`.
    pub fn decode(&self) -> Result<Decoded, HeaderError> {
        Ok(Decoded {
            name: self.name_bytes().to_vec(),
            size: self.entry_size()?,
            mtime: self.mtime()?,
        })
    }

    /// Returns whether every byte of this block is zero, which marks the end
    /// of an archive.
    pub fn is_zero(&self) -> bool {
        self.as_bytes().iter().all(|b| *b == 0)
    }

    /// Returns the name stored in this header, up to the first NUL.
    pub fn name_bytes(&self) -> &[u8] {
        truncate(&self.name)
    }

    /// Returns the name stored in this header for display, replacing invalid
    /// UTF-8.
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    /// Stores `name` left-justified and NUL-padded.
    ///
    /// Fails if the name is longer than the field.
    pub fn set_name(&mut self, name: &[u8]) -> Result<(), HeaderError> {
        copy_into(&mut self.name, name, "name")
    }

    /// Returns the size of the payload following this header.
    pub fn entry_size(&self) -> Result<u64, HeaderError> {
        octal_from(&self.size, "size")
    }

    /// Encodes the `size` argument into the size field of this header.
    pub fn set_size(&mut self, size: u64) -> Result<(), HeaderError> {
        octal_into(&mut self.size, size, "size")
    }

    /// Returns the last modification time in Unix time format.
    pub fn mtime(&self) -> Result<u64, HeaderError> {
        octal_from(&self.mtime, "mtime")
    }

    /// Encodes the `mtime` provided into this header.
    pub fn set_mtime(&mut self, mtime: u64) -> Result<(), HeaderError> {
        octal_into(&mut self.mtime, mtime, "mtime")
    }

    /// Returns the mode bits for this file.
    pub fn mode(&self) -> Result<u32, HeaderError> {
        octal_from(&self.mode, "mode").map(|m| m as u32)
    }

    /// Encodes the `mode` provided into this header.
    pub fn set_mode(&mut self, mode: u32) -> Result<(), HeaderError> {
        octal_into(&mut self.mode, mode & 0o7777, "mode")
    }

    /// Encodes the `uid` provided into this header.
    pub fn set_uid(&mut self, uid: u32) -> Result<(), HeaderError> {
        octal_into(&mut self.owner_id, uid, "uid")
    }

    /// Encodes the `gid` provided into this header.
    pub fn set_gid(&mut self, gid: u32) -> Result<(), HeaderError> {
        octal_into(&mut self.group_id, gid, "gid")
    }

    /// Returns the checksum stored in this header.
    pub fn cksum(&self) -> Result<u32, HeaderError> {
        octal_from(&self.cksum, "cksum").map(|c| c as u32)
    }

    /// Computes the checksum of this header as it currently stands.
    ///
    /// The sum runs over every byte of the block with the checksum field
    /// itself counted as eight ASCII spaces.
    pub fn calculate_cksum(&self) -> u32 {
        let bytes = self.as_bytes();
        bytes[..148]
            .iter()
            .chain(&bytes[156..])
            .fold(8 * b' ' as u32, |sum, b| sum + u32::from(*b))
    }

    /// Sets the checksum field of this header based on the current fields in
    /// this header: six octal digits, a NUL, then a space.
    pub fn set_cksum(&mut self) {
        let cksum = self.calculate_cksum();
        let digits = format!("{:06o}", cksum);
        self.cksum[..6].copy_from_slice(&digits.as_bytes()[digits.len() - 6..]);
        self.cksum[6] = 0;
        self.cksum[7] = b' ';
    }

    /// Re-derives the checksum and compares it to the stored one.
    pub fn verify_cksum(&self) -> Result<(), HeaderError> {
        let stored = self.cksum()?;
        let computed = self.calculate_cksum();
        if stored == computed {
            Ok(())
        } else {
            Err(HeaderError::Checksum { stored, computed })
        }
    }
}

impl Default for Header {
    fn default() -> Header {
        Header::new()
    }
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Header")
            .field("name", &self.name())
            .field("size", &self.entry_size())
            .field("mtime", &self.mtime())
            .field("cksum", &self.cksum())
            .finish()
    }
}

// Every header occupies exactly one block.
const _: () = assert!(std::mem::size_of::<Header>() == BLOCK_SIZE as usize);

fn octal_from(slice: &[u8], field: &'static str) -> Result<u64, HeaderError> {
    let num = str::from_utf8(truncate(slice))
        .map_err(|_| HeaderError::InvalidOctal { field })?
        .trim_matches(' ');
    if num.is_empty() {
        return Err(HeaderError::InvalidOctal { field });
    }
    u64::from_str_radix(num, 8).map_err(|_| HeaderError::InvalidOctal { field })
}

fn octal_into<T: fmt::Octal>(dst: &mut [u8], val: T, field: &'static str) -> Result<(), HeaderError> {
    let o = format!("{:o}", val);
    // the last byte of the field stays NUL
    let width = dst.len() - 1;
    if o.len() > width {
        return Err(HeaderError::Overflow { field });
    }
    let (digits, terminator) = dst.split_at_mut(width);
    digits.fill(b'0');
    digits[width - o.len()..].copy_from_slice(o.as_bytes());
    terminator[0] = 0;
    Ok(())
}

fn truncate(slice: &[u8]) -> &[u8] {
    match slice.iter().position(|i| *i == 0) {
        Some(i) => &slice[..i],
        None => slice,
    }
}

/// Copies `bytes` into the `slot` provided, returning an error if the `bytes`
/// array is too long. The remainder of the slot is NUL-filled.
fn copy_into(slot: &mut [u8], bytes: &[u8], field: &'static str) -> Result<(), HeaderError> {
    if bytes.len() > slot.len() {
        return Err(HeaderError::Overflow { field });
    }
    let (head, tail) = slot.split_at_mut(bytes.len());
    head.copy_from_slice(bytes);
    tail.fill(0);
    Ok(())
}
