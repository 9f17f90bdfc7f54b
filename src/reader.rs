use std::cell::RefMut;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

/// A read handle positioned on an entry's payload.
///
/// Archives either reopen their backing file for every payload read or keep
/// one handle around for their whole lifetime; this covers both cases.
pub enum Source<'a> {
    Owned(File),
    Shared(RefMut<'a, File>),
}

impl<'a> Source<'a> {
    /// Seeks to `offset` and limits reads to the `len` bytes that follow.
    pub fn payload(mut self, offset: u64, len: u64) -> io::Result<io::Take<Source<'a>>> {
        self.seek(SeekFrom::Start(offset))?;
        Ok(self.take(len))
    }

    fn file(&mut self) -> &mut File {
        match self {
            Source::Owned(file) => file,
            Source::Shared(file) => &mut **file,
        }
    }
}

impl Read for Source<'_> {
    fn read(&mut self, into: &mut [u8]) -> io::Result<usize> {
        self.file().read(into)
    }
}

impl Seek for Source<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file().seek(pos)
    }
}
