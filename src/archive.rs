use std::cell::RefCell;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str;

use tracing::{debug, trace};
use zerocopy::IntoBytes;

use crate::builder::Builder;
use crate::entry::Entry;
use crate::error::{Error, HeaderError, Result};
use crate::header::{Header, NAME_LEN};
use crate::reader::Source;
use crate::BLOCK_SIZE;

/// Options which configure how an archive is opened and read.
///
/// # Examples
///
/// ```no_run
/// use slimtar::OpenOptions;
///
/// let archive = OpenOptions::new()
///     .verify_checksums(false)
///     .cache_handle(true)
///     .open("foo.tar")
///     .unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct OpenOptions {
    verify_checksums: bool,
    cache_handle: bool,
}

impl OpenOptions {
    /// Returns the default options: checksums verified, one file handle per
    /// payload read.
    pub fn new() -> OpenOptions {
        OpenOptions {
            verify_checksums: true,
            cache_handle: false,
        }
    }

    /// Whether a header whose checksum does not match its contents fails the
    /// open.
    pub fn verify_checksums(&mut self, verify: bool) -> &mut OpenOptions {
        self.verify_checksums = verify;
        self
    }

    /// Whether to keep the backing file open for the archive's lifetime
    /// rather than reopening it for every payload read.
    pub fn cache_handle(&mut self, cache: bool) -> &mut OpenOptions {
        self.cache_handle = cache;
        self
    }

    /// Opens and indexes the archive at `path`.
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<Archive> {
        Archive::parse(path.as_ref(), self)
    }
}

impl Default for OpenOptions {
    fn default() -> OpenOptions {
        OpenOptions::new()
    }
}

/// An index over the entries of an archive file.
///
/// The index is built by one sequential pass over the header records when
/// the archive is opened. It is a snapshot: changing the backing file
/// afterwards makes every recorded payload offset meaningless.
#[derive(Debug)]
pub struct Archive {
    path: PathBuf,
    entries: Vec<Entry>,
    handle: Option<RefCell<File>>,
}

impl Archive {
    /// Opens and indexes the archive at `path` with the default
    /// [`OpenOptions`].
    ///
    /// An archive that starts with an all-zero block, or an empty file, is a
    /// valid archive with no entries.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use slimtar::Archive;
    ///
    /// let archive = Archive::open("foo.tar").unwrap();
    /// for entry in archive.iter() {
    ///     println!("{} ({} bytes)", entry.name(), entry.size());
    /// }
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Archive> {
        OpenOptions::new().open(path)
    }

    fn parse(path: &Path, options: &OpenOptions) -> Result<Archive> {
        let mut file = open(path)?;
        let len = file.metadata()?.len();
        let mut entries = Vec::new();
        let mut offset = 0;
        let mut header = Header::new();

        loop {
            if !read_block(&mut file, header.as_mut_bytes()).map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => Error::malformed(offset, HeaderError::Truncated),
                _ => Error::Io(e),
            })? {
                break;
            }
            if header.is_zero() {
                break;
            }
            if options.verify_checksums {
                header
                    .verify_cksum()
                    .map_err(|e| Error::malformed(offset, e))?;
            }
            let decoded = header.decode().map_err(|e| Error::malformed(offset, e))?;

            let payload_offset = offset + BLOCK_SIZE;
            if !payload_fits(len, payload_offset, decoded.size) {
                return Err(Error::malformed(offset, HeaderError::Truncated));
            }
            let entry = Entry::new(decoded, payload_offset);
            debug!(
                name = %entry.name(),
                size = entry.size(),
                offset = payload_offset,
                "indexed entry"
            );

            // Skip the payload and its padding
            offset = entry.next_header_offset();
            trace!(offset, "seeking to next header");
            file.seek(SeekFrom::Start(offset))?;
            entries.push(entry);
        }

        debug!(path = %path.display(), entries = entries.len(), "opened archive");
        let handle = if options.cache_handle {
            Some(RefCell::new(file))
        } else {
            None
        };
        Ok(Archive {
            path: path.to_path_buf(),
            entries,
            handle,
        })
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns every entry, in the order they appear in the archive.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Returns an iterator over the entries, in archive order.
    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    /// Returns the number of entries in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds the first entry whose name is exactly `name`, compared byte for
    /// byte.
    ///
    /// Archives may contain several entries with the same name; the earliest
    /// one shadows the rest.
    pub fn find<N: AsRef<[u8]>>(&self, name: N) -> Option<&Entry> {
        let name = name.as_ref();
        self.entries.iter().find(|e| e.name == name)
    }

    fn get(&self, name: &[u8]) -> Result<&Entry> {
        self.find(name)
            .ok_or_else(|| Error::EntryNotFound(String::from_utf8_lossy(name).into_owned()))
    }

    /// Reads the whole payload of the entry named `name`.
    pub fn read<N: AsRef<[u8]>>(&self, name: N) -> Result<Vec<u8>> {
        self.read_entry(self.get(name.as_ref())?, false)
    }

    /// Reads the whole payload of the entry named `name` followed by one
    /// extra NUL byte, for consumers that expect C-style strings.
    pub fn read_nul_terminated<N: AsRef<[u8]>>(&self, name: N) -> Result<Vec<u8>> {
        self.read_entry(self.get(name.as_ref())?, true)
    }

    /// Copies the payload of the entry named `name` into `dst`, returning the
    /// number of bytes copied.
    pub fn copy_to<N, W>(&self, name: N, dst: &mut W) -> Result<u64>
    where
        N: AsRef<[u8]>,
        W: Write + ?Sized,
    {
        let entry = self.get(name.as_ref())?;
        let copied = io::copy(&mut self.payload(entry)?, dst)?;
        check_len(entry, copied)?;
        Ok(copied)
    }

    fn read_entry(&self, entry: &Entry, nul_terminated: bool) -> Result<Vec<u8>> {
        let extra = usize::from(nul_terminated);
        let mut buf = Vec::with_capacity(entry.size as usize + extra);
        let read = self.payload(entry)?.read_to_end(&mut buf)?;
        check_len(entry, read as u64)?;
        if nul_terminated {
            buf.push(0);
        }
        Ok(buf)
    }

    fn payload(&self, entry: &Entry) -> Result<io::Take<Source<'_>>> {
        let source = match self.handle {
            Some(ref handle) => Source::Shared(handle.borrow_mut()),
            None => Source::Owned(open(&self.path)?),
        };
        trace!(name = %entry.name(), offset = entry.payload_offset, "reading payload");
        Ok(source.payload(entry.payload_offset, entry.size)?)
    }

    /// Renames the first entry called `old` to `new`.
    ///
    /// Only the index changes; the backing file keeps the old name until the
    /// archive is exported. `new` is cut at its first NUL and to at most
    /// [`NAME_LEN`] bytes, never splitting a character of a UTF-8 name. Returns
    /// `false`, changing nothing, if no entry is called `old` or if nothing
    /// of `new` is left after cutting.
    pub fn rename<O, N>(&mut self, old: O, new: N) -> bool
    where
        O: AsRef<[u8]>,
        N: AsRef<[u8]>,
    {
        let (old, new) = (old.as_ref(), fit_name(new.as_ref()));
        if new.is_empty() {
            return false;
        }
        match self.entries.iter_mut().find(|e| e.name == old) {
            Some(entry) => {
                debug!(
                    old = %String::from_utf8_lossy(old),
                    new = %String::from_utf8_lossy(new),
                    "renamed entry"
                );
                entry.name = new.to_vec();
                true
            }
            None => false,
        }
    }

    /// Drops every entry called `name` from the index, returning how many
    /// were dropped. As with `rename`, the change shows only once the
    /// archive is exported.
    pub fn remove<N: AsRef<[u8]>>(&mut self, name: N) -> usize {
        let name = name.as_ref();
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        let removed = before - self.entries.len();
        debug!(name = %String::from_utf8_lossy(name), removed, "removed entries");
        removed
    }

    /// Writes every entry, under its current name, to a new archive at
    /// `dst`.
    ///
    /// Payloads are read lazily from the backing file while the new archive
    /// is being written, so `dst` must not be the file this archive was
    /// opened from.
    pub fn export<P: AsRef<Path>>(&self, dst: P) -> Result<()> {
        let mut builder = Builder::create(dst.as_ref())?;
        self.export_into(&mut builder)?;
        builder.finish()
    }

    /// Appends every entry, under its current name (byte for byte) and with
    /// its recorded modification time, to `builder`. The builder is not finished, so more
    /// entries may follow.
    pub fn export_into<W: Write>(&self, builder: &mut Builder<W>) -> Result<()> {
        for entry in &self.entries {
            builder.append_reader(&entry.name, entry.size, entry.mtime, self.payload(entry)?)?;
        }
        debug!(path = %self.path.display(), entries = self.entries.len(), "exported archive");
        Ok(())
    }

    /// Writes the payload of the entry named `name` to the file `dst`,
    /// returning the number of bytes written. The file's modification time
    /// is set to the entry's.
    pub fn extract<N, P>(&self, name: N, dst: P) -> Result<u64>
    where
        N: AsRef<[u8]>,
        P: AsRef<Path>,
    {
        let entry = self.get(name.as_ref())?;
        entry.unpack(self.payload(entry)?, dst.as_ref())
    }
}

impl<'a> IntoIterator for &'a Archive {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> std::slice::Iter<'a, Entry> {
        self.entries.iter()
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| Error::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn check_len(entry: &Entry, read: u64) -> Result<()> {
    if read == entry.size {
        Ok(())
    } else {
        Err(Error::malformed(entry.payload_offset, HeaderError::Truncated))
    }
}

// Whether `size` payload bytes starting at `payload_offset` lie within a
// file of `len` bytes. Pipes report a length of zero.
fn payload_fits(len: u64, payload_offset: u64, size: u64) -> bool {
    len.checked_sub(payload_offset)
        .map_or(false, |rest| rest >= size)
}

fn fit_name(name: &[u8]) -> &[u8] {
    let name = match name.iter().position(|b| *b == 0) {
        Some(i) => &name[..i],
        None => name,
    };
    if name.len() <= NAME_LEN {
        return name;
    }
    match str::from_utf8(name) {
        Ok(text) => {
            let mut end = NAME_LEN;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            &name[..end]
        }
        Err(_) => &name[..NAME_LEN],
    }
}

/// Fills `buf` from `r`. Returns `Ok(false)` if the stream was already at its
/// end, and an `UnexpectedEof` error if it ends part way through the block.
fn read_block<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut read = 0;
    while read < buf.len() {
        match r.read(&mut buf[read..]) {
            Ok(0) if read == 0 => return Ok(false),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to read entire block",
                ))
            }
            Ok(n) => read += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
