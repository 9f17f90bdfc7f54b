//! A small library for reading and writing USTAR archives
//!
//! An [`Archive`] is opened by walking the header records of a file once and
//! keeping an ordered index of the entries found: their names, sizes,
//! modification times and the offset at which each payload starts. Payloads
//! are never held by the index; they are read from the backing file when
//! asked for. Entries can be renamed or dropped in the index and the result
//! written out to a new file with [`Archive::export`].
//!
//! New archives are written with a [`Builder`], which appends a header, the
//! payload and zero padding up to the next 512-byte boundary for every
//! entry, then terminates the stream with zero blocks.
//!
//! Only the classic header fields are supported: there is no compression, no
//! long-name or sparse-file extensions, and permissions and ownership are
//! written as fixed placeholders.
//!
//! ```no_run
//! use slimtar::{Archive, Builder};
//!
//! # fn main() -> slimtar::Result<()> {
//! let mut builder = Builder::create("out.tar")?;
//! builder.append_data("a.txt", b"hi")?;
//! builder.append_data("b.txt", b"")?;
//! builder.finish()?;
//!
//! let archive = Archive::open("out.tar")?;
//! assert_eq!(archive.read("a.txt")?, b"hi");
//! # Ok(())
//! # }
//! ```

pub use crate::archive::{Archive, OpenOptions};
pub use crate::builder::{Builder, Terminator};
pub use crate::entry::Entry;
pub use crate::error::{Error, HeaderError, Result};
pub use crate::header::{Decoded, Header, HeaderMode, MAX_ENTRY_SIZE, NAME_LEN};

mod archive;
mod builder;
mod entry;
mod error;
mod header;
mod reader;

/// Size of a header record, and the granularity every payload is padded to.
pub const BLOCK_SIZE: u64 = 512;

/// Rounds `n` up to the next multiple of `multiple`.
///
/// Values that are already a multiple are returned unchanged, as is every
/// value when `multiple` is zero.
pub fn round_up(n: u64, multiple: u64) -> u64 {
    if multiple == 0 {
        return n;
    }
    match n % multiple {
        0 => n,
        rem => n + (multiple - rem),
    }
}

#[cfg(test)]
mod tests {
    use super::{round_up, BLOCK_SIZE};

    #[test]
    fn round_up_to_block() {
        assert_eq!(round_up(0, BLOCK_SIZE), 0);
        assert_eq!(round_up(1, BLOCK_SIZE), 512);
        assert_eq!(round_up(511, BLOCK_SIZE), 512);
        assert_eq!(round_up(512, BLOCK_SIZE), 512);
        assert_eq!(round_up(513, BLOCK_SIZE), 1024);
    }

    #[test]
    fn round_up_zero_multiple() {
        assert_eq!(round_up(0, 0), 0);
        assert_eq!(round_up(513, 0), 513);
    }

    #[test]
    fn round_up_invariants() {
        for n in (0..4096).chain([u64::from(u32::MAX), 0o77777777777]) {
            let r = round_up(n, BLOCK_SIZE);
            assert_eq!(r % BLOCK_SIZE, 0, "{}", n);
            assert!(r >= n, "{}", n);
            assert!(r - n < BLOCK_SIZE, "{}", n);
        }
    }
}
