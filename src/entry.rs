use std::borrow::Cow;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use filetime::{self, FileTime};
use tracing::debug;

use crate::error::{Error, HeaderError, Result};
use crate::header::Decoded;
use crate::{round_up, BLOCK_SIZE};

/// One indexed entry of an archive.
///
/// An entry records where its payload lives in the backing file; it does not
/// own the payload bytes. Entries are handed out by an [`Archive`] and stay
/// valid only as long as the backing file is left untouched.
///
/// [`Archive`]: crate::Archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub(crate) name: Vec<u8>,
    pub(crate) size: u64,
    pub(crate) mtime: u64,
    pub(crate) payload_offset: u64,
}

impl Entry {
    pub(crate) fn new(decoded: Decoded, payload_offset: u64) -> Entry {
        Entry {
            name: decoded.name,
            size: decoded.size,
            mtime: decoded.mtime,
            payload_offset,
        }
    }

    /// Returns the raw bytes of the name this entry is currently known by.
    ///
    /// After [`Archive::rename`](crate::Archive::rename) this is the new
    /// name, even though the backing file still holds the old one.
    pub fn name_bytes(&self) -> &[u8] {
        &self.name
    }

    /// Returns the name for display, with invalid UTF-8 replaced.
    ///
    /// Lookups and exports work on [`name_bytes`](Entry::name_bytes), so a
    /// name that is not UTF-8 survives an export unchanged.
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Returns the size of the payload in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the last modification time in seconds since January 1, 1970.
    pub fn mtime(&self) -> u64 {
        self.mtime
    }

    /// Returns the byte offset in the backing file at which the payload
    /// starts, immediately after this entry's header record.
    pub fn payload_offset(&self) -> u64 {
        self.payload_offset
    }

    /// Returns the offset of the block following this entry's payload and
    /// padding.
    pub fn next_header_offset(&self) -> u64 {
        self.payload_offset + round_up(self.size, BLOCK_SIZE)
    }

    /// Writes `data`, which must be this entry's payload, to `dst` and sets
    /// the modification time of the new file.
    pub(crate) fn unpack<R: Read>(&self, mut data: R, dst: &Path) -> Result<u64> {
        let mut file = fs::File::create(dst).map_err(|source| Error::Write {
            path: dst.to_path_buf(),
            source,
        })?;
        let written = io::copy(&mut data, &mut file)?;
        if written != self.size {
            return Err(Error::malformed(self.payload_offset, HeaderError::Truncated));
        }
        drop(file);

        let mtime = FileTime::from_unix_time(self.mtime as i64, 0);
        filetime::set_file_mtime(dst, mtime)?;
        debug!(name = %self.name(), dst = %dst.display(), bytes = written, "unpacked entry");
        Ok(written)
    }
}
