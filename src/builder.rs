use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use tracing::{debug, trace};
use zerocopy::IntoBytes;

use crate::error::{Error, HeaderError, Result};
use crate::header::{Header, HeaderMode, MAX_ENTRY_SIZE};
use crate::{round_up, BLOCK_SIZE};

/// How many all-zero blocks end an archive written by a [`Builder`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Terminator {
    /// One zero block. Readers that insist on the POSIX two-block ending may
    /// reject such archives.
    Single,
    /// Two zero blocks, as POSIX specifies and other tar tools write.
    #[default]
    Double,
}

impl Terminator {
    fn blocks(self) -> usize {
        match self {
            Terminator::Single => 1,
            Terminator::Double => 2,
        }
    }
}

/// A structure for building archives
///
/// This structure has methods for building up an archive from scratch into any
/// arbitrary writer.
pub struct Builder<W: Write> {
    mode: HeaderMode,
    terminator: Terminator,
    finished: bool,
    obj: Option<W>,
}

impl Builder<BufWriter<File>> {
    /// Creates (or truncates) the file at `path` and starts an archive in it.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Builder<BufWriter<File>>> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "creating archive");
        Ok(Builder::new(BufWriter::new(file)))
    }
}

impl<W: Write> Builder<W> {
    /// Create a new archive builder with the underlying object as the
    /// destination of all data written. The builder will use
    /// `HeaderMode::Complete` and `Terminator::Double` by default.
    pub fn new(obj: W) -> Builder<W> {
        Builder {
            mode: HeaderMode::Complete,
            terminator: Terminator::Double,
            finished: false,
            obj: Some(obj),
        }
    }

    fn inner(&mut self) -> &mut W {
        self.obj.as_mut().expect("builder used after into_inner")
    }

    /// Changes how the modification time of entries appended with
    /// `append_data` is chosen.
    pub fn mode(&mut self, mode: HeaderMode) {
        self.mode = mode;
    }

    /// Changes how many zero blocks `finish` writes.
    pub fn terminator(&mut self, terminator: Terminator) {
        self.terminator = terminator;
    }

    /// Adds an entry named `name` holding `data`.
    ///
    /// The modification time is taken from the builder's `HeaderMode`.
    ///
    /// # Examples
    ///
    /// ```
    /// use slimtar::Builder;
    ///
    /// let mut ar = Builder::new(Vec::new());
    /// ar.append_data("foo", &[1, 2, 3, 4]).unwrap();
    /// let data = ar.into_inner().unwrap();
    /// assert_eq!(data.len(), 512 + 512 + 1024);
    /// ```
    pub fn append_data<N: AsRef<[u8]>>(&mut self, name: N, data: &[u8]) -> Result<()> {
        let mtime = self.mode.mtime();
        self.append_with_mtime(name, mtime, data)
    }

    /// Adds an entry named `name` holding `data`, last modified at `mtime`.
    pub fn append_with_mtime<N: AsRef<[u8]>>(&mut self, name: N, mtime: u64, data: &[u8]) -> Result<()> {
        self.append_reader(name, data.len() as u64, mtime, data)
    }

    /// Adds an entry named `name` whose `size` bytes of payload are read
    /// from `data`.
    ///
    /// The name is stored byte for byte and need not be UTF-8. Exactly
    /// `size` bytes are consumed. A reader that runs dry early fails with an
    /// `UnexpectedEof` error, leaving a partial entry behind.
    pub fn append_reader<N, R>(&mut self, name: N, size: u64, mtime: u64, data: R) -> Result<()>
    where
        N: AsRef<[u8]>,
        R: Read,
    {
        let name = name.as_ref();
        let header = prepare_header(name, size, mtime)?;
        append(self.inner(), &header, size, data)?;
        debug!(name = %header.name(), size, mtime, "appended entry");
        Ok(())
    }

    /// Finish writing this archive, emitting the termination blocks.
    ///
    /// This function should only be called when the archive has been written
    /// entirely and if an I/O error happens the underlying object still needs
    /// to be acquired.
    ///
    /// In most situations the `into_inner` method should be preferred.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let blocks = self.terminator.blocks();
        let obj = self.inner();
        for _ in 0..blocks {
            obj.write_all(Header::new().as_bytes())?;
        }
        obj.flush()?;
        trace!(blocks, "wrote terminator");
        Ok(())
    }

    /// Unwrap this archive, returning the underlying object.
    ///
    /// This function will finish writing the archive if the `finish` function
    /// hasn't yet been called, returning any I/O error which happens during
    /// that operation.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        Ok(self.obj.take().expect("builder used after into_inner"))
    }
}

fn prepare_header(name: &[u8], size: u64, mtime: u64) -> Result<Header> {
    if name.is_empty() {
        return Err(invalid_name(name, "name is empty"));
    }
    if name.contains(&0) {
        return Err(invalid_name(name, "name contains a nul byte"));
    }
    if size > MAX_ENTRY_SIZE {
        return Err(Error::TooLarge {
            name: String::from_utf8_lossy(name).into_owned(),
            size,
        });
    }
    Header::for_file(name, size, mtime).map_err(|e| match e {
        HeaderError::Overflow { field: "name" } => invalid_name(name, "name is longer than 100 bytes"),
        e => Error::Io(io::Error::new(io::ErrorKind::InvalidInput, e)),
    })
}

fn invalid_name(name: &[u8], reason: &'static str) -> Error {
    Error::InvalidName {
        name: String::from_utf8_lossy(name).into_owned(),
        reason,
    }
}

fn append<W: Write, R: Read>(dst: &mut W, header: &Header, size: u64, data: R) -> io::Result<()> {
    dst.write_all(header.as_bytes())?;
    let len = io::copy(&mut data.take(size), dst)?;
    if len != size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("entry data ended after {} of {} bytes", len, size),
        ));
    }

    // Pad with zeros if necessary.
    let buf = [0; BLOCK_SIZE as usize];
    let remaining = round_up(len, BLOCK_SIZE) - len;
    dst.write_all(&buf[..remaining as usize])?;
    Ok(())
}

impl<W: Write> Drop for Builder<W> {
    fn drop(&mut self) {
        if self.obj.is_some() {
            let _ = self.finish();
        }
    }
}
