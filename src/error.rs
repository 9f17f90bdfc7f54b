use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while opening, reading or writing an archive.
#[derive(Debug, Error)] // can't derive PartialEq because of io::Error
pub enum Error {
    /// The backing file could not be opened for reading.
    #[error("failed to open archive `{}`", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A header record at `offset` could not be decoded, or the archive ends
    /// in the middle of an entry.
    #[error("malformed archive at byte {offset}")]
    Malformed {
        offset: u64,
        #[source]
        source: HeaderError,
    },

    /// No entry in the index carries this name.
    #[error("no entry named `{0}` in archive")]
    EntryNotFound(String),

    /// A destination file could not be created.
    #[error("failed to create `{}`", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An entry name that cannot be stored in a header.
    #[error("cannot store entry name `{name}`: {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// A payload larger than the size field can express.
    #[error("entry `{name}` is {size} bytes, more than a header can describe")]
    TooLarge { name: String, size: u64 },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Ways a single header record (or the data it describes) can be invalid.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    #[error("`{field}` field is not a valid octal number")]
    InvalidOctal { field: &'static str },

    #[error("value does not fit in the `{field}` field")]
    Overflow { field: &'static str },

    #[error("header checksum mismatch: stored {stored:o}, computed {computed:o}")]
    Checksum { stored: u32, computed: u32 },

    #[error("archive ends in the middle of an entry")]
    Truncated,
}

impl Error {
    pub(crate) fn malformed(offset: u64, source: HeaderError) -> Error {
        Error::Malformed { offset, source }
    }
}
