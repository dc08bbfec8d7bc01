//! Archive-level operations over the block stream.
//!
//! An archive is a flat sequence of entries, each a header block plus
//! `ceil(size/512)` zero-padded payload blocks, closed by two all-zero
//! blocks. The write path (create/append/update) needs identity
//! resolution for header encoding and lives on [`Archiver`]; the read
//! path (list/extract) does not and is plain functions.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::file_list::FileList;
use crate::header::{Block, HeaderBlock, BLOCK_SIZE};
use crate::identity::{IdentityResolver, SystemIdentities};

/// End-of-archive marker: two all-zero blocks.
const TRAILER_LEN: u64 = 2 * BLOCK_SIZE as u64;

/// Per-file outcomes of a create/append run.
///
/// A file that fails before its header is written (stat, identity
/// resolution, name/size limits, a header field overflow) is skipped
/// and recorded here; the
/// operation itself still succeeds and the archive simply omits it.
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Names written to the archive, in archive order.
    pub archived: Vec<String>,
    /// Files left out, with the reason each was skipped.
    pub skipped: Vec<SkippedFile>,
}

impl WriteReport {
    pub fn all_archived(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[derive(Debug)]
pub struct SkippedFile {
    pub name: String,
    pub reason: Error,
}

/// Result of [`Archiver::update`].
#[derive(Debug)]
pub enum UpdateOutcome {
    /// Every requested file was already a member; the append ran.
    Appended(WriteReport),
    /// These requested names are not archive members; nothing was
    /// appended.
    MissingMembers(Vec<String>),
}

/// Write-path entry point, parameterized over identity resolution so
/// tests can run against a fixed id table.
pub struct Archiver<R: IdentityResolver = SystemIdentities> {
    ids: R,
}

impl Archiver<SystemIdentities> {
    /// Archiver using the system passwd/group databases.
    pub fn new() -> Self {
        Archiver {
            ids: SystemIdentities,
        }
    }
}

impl Default for Archiver<SystemIdentities> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: IdentityResolver> Archiver<R> {
    pub fn with_resolver(ids: R) -> Self {
        Archiver { ids }
    }

    /// Create (or truncate) `archive` and write every file in `files`,
    /// in list order, followed by the trailer.
    pub fn create(&self, archive: impl AsRef<Path>, files: &FileList) -> Result<WriteReport> {
        let archive = archive.as_ref();
        debug!(archive = %archive.display(), files = files.len(), "creating archive");

        let mut out = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(archive)?;
        let report = self.write_entries(&mut out, files)?;
        write_trailer(&mut out)?;
        Ok(report)
    }

    /// Append `files` to an existing archive by overwriting its trailer
    /// and writing a fresh one at the new end.
    ///
    /// The existing trailer is verified before it is discarded; a file
    /// that does not end in 1024 zero bytes on a block boundary is
    /// rejected as malformed rather than silently corrupted further.
    pub fn append(&self, archive: impl AsRef<Path>, files: &FileList) -> Result<WriteReport> {
        let archive = archive.as_ref();
        debug!(archive = %archive.display(), files = files.len(), "appending to archive");

        let mut out = OpenOptions::new().read(true).write(true).open(archive)?;
        let data_end = verify_trailer(&mut out)?;
        out.seek(SeekFrom::Start(data_end))?;
        let report = self.write_entries(&mut out, files)?;
        write_trailer(&mut out)?;
        Ok(report)
    }

    /// Append `files` only if every one of them is already an archive
    /// member. All-or-nothing: a single non-member rejects the whole
    /// update and the archive is left untouched.
    pub fn update(&self, archive: impl AsRef<Path>, files: &FileList) -> Result<UpdateOutcome> {
        let members = list(archive.as_ref())?;
        let missing: Vec<String> = files
            .iter()
            .filter(|&name| !members.contains(name))
            .map(str::to_owned)
            .collect();
        if !missing.is_empty() {
            warn!(?missing, "update rejected: not all files are archive members");
            return Ok(UpdateOutcome::MissingMembers(missing));
        }
        Ok(UpdateOutcome::Appended(self.append(archive, files)?))
    }

    fn write_entries(&self, out: &mut File, files: &FileList) -> Result<WriteReport> {
        let mut report = WriteReport::default();
        for name in files {
            match self.write_entry(out, name) {
                Ok(()) => report.archived.push(name.to_owned()),
                Err(
                    reason @ (Error::Metadata { .. }
                    | Error::UnknownUser(_)
                    | Error::UnknownGroup(_)
                    | Error::NameTooLong(_)
                    | Error::FileTooLarge { .. }
                    | Error::FieldOverflow { .. }),
                ) => {
                    warn!(file = name, %reason, "skipping file");
                    report.skipped.push(SkippedFile {
                        name: name.to_owned(),
                        reason,
                    });
                }
                // Archive I/O failures abort the whole operation.
                Err(err) => return Err(err),
            }
        }
        Ok(report)
    }

    fn write_entry(&self, out: &mut File, name: &str) -> Result<()> {
        let header = HeaderBlock::from_file(name, &self.ids)?;
        let block = header.to_bytes()?;
        let mut src = File::open(name).map_err(|source| Error::Metadata {
            path: PathBuf::from(name),
            source,
        })?;

        out.write_all(&block)?;
        copy_payload(&mut src, out, header.size)?;
        Ok(())
    }
}

/// List the archive's member names in archive order, duplicates
/// included.
pub fn list(archive: impl AsRef<Path>) -> Result<FileList> {
    let mut file = File::open(archive.as_ref())?;
    let mut names = FileList::new();
    let mut block: Block = [0; BLOCK_SIZE];
    while read_header(&mut file, &mut block)? {
        let meta = HeaderBlock::entry_meta(&block)?;
        let skip = payload_blocks(meta.size) * BLOCK_SIZE as u64;
        file.seek(SeekFrom::Current(skip as i64))?;
        names.push(meta.name);
    }
    Ok(names)
}

/// Extract every member into the current directory.
pub fn extract(archive: impl AsRef<Path>) -> Result<()> {
    extract_to(archive, ".")
}

/// Extract every member into `dest`, overwriting existing files.
///
/// Entry names are taken from the archive, so they are validated first:
/// absolute names and names with `..` components are rejected.
pub fn extract_to(archive: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let mut file = File::open(archive.as_ref())?;
    let dest = dest.as_ref();
    let mut block: Block = [0; BLOCK_SIZE];
    while read_header(&mut file, &mut block)? {
        let meta = HeaderBlock::entry_meta(&block)?;
        let path = sanitized_path(dest, &meta.name)?;
        debug!(name = %meta.name, size = meta.size, "extracting entry");

        let mut out = File::create(&path)?;
        let mut remaining = meta.size;
        while remaining > 0 {
            read_block(&mut file, &mut block)?;
            // The final block's zero padding is not part of the file.
            let take = remaining.min(BLOCK_SIZE as u64) as usize;
            out.write_all(&block[..take])?;
            remaining -= take as u64;
        }
    }
    Ok(())
}

/// Read the next header block. Returns `false` once the trailer is
/// reached (first header byte zero).
fn read_header(file: &mut File, block: &mut Block) -> Result<bool> {
    read_block(file, block)?;
    Ok(block[0] != 0)
}

// A short read mid-entry means the archive was cut off.
fn read_block(file: &mut File, block: &mut Block) -> Result<()> {
    file.read_exact(block).map_err(|err| {
        if err.kind() == ErrorKind::UnexpectedEof {
            Error::Truncated
        } else {
            Error::Io(err)
        }
    })
}

fn payload_blocks(size: u64) -> u64 {
    size.div_ceil(BLOCK_SIZE as u64)
}

/// Copy exactly `size` payload bytes from `src` in zero-padded 512-byte
/// blocks. A source that shrank since it was stat'd is padded with
/// zeros; one that grew is cut off at `size`, since the header's size
/// field drives the reader's block count.
fn copy_payload(src: &mut File, out: &mut File, size: u64) -> Result<()> {
    let mut block: Block = [0; BLOCK_SIZE];
    let mut remaining = size;
    while remaining > 0 {
        let want = remaining.min(BLOCK_SIZE as u64) as usize;
        block.fill(0);
        read_available(src, &mut block[..want])?;
        out.write_all(&block)?;
        remaining -= want as u64;
    }
    Ok(())
}

// read_exact, except EOF leaves the rest of the buffer zeroed.
fn read_available(src: &mut File, mut buf: &mut [u8]) -> Result<()> {
    while !buf.is_empty() {
        match src.read(buf) {
            Ok(0) => break,
            Ok(n) => buf = &mut buf[n..],
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(Error::Io(err)),
        }
    }
    Ok(())
}

fn write_trailer(out: &mut File) -> Result<()> {
    let zero: Block = [0; BLOCK_SIZE];
    out.write_all(&zero)?;
    out.write_all(&zero)?;
    out.flush()?;
    Ok(())
}

/// Check that the archive ends with the two-block zero trailer and
/// return the offset where it starts.
fn verify_trailer(file: &mut File) -> Result<u64> {
    let len = file.metadata()?.len();
    if len < TRAILER_LEN || len % BLOCK_SIZE as u64 != 0 {
        return Err(Error::MissingTrailer);
    }
    file.seek(SeekFrom::End(-(TRAILER_LEN as i64)))?;
    let mut trailer = [0u8; TRAILER_LEN as usize];
    file.read_exact(&mut trailer)?;
    if trailer.iter().any(|&b| b != 0) {
        return Err(Error::MissingTrailer);
    }
    Ok(len - TRAILER_LEN)
}

fn sanitized_path(dest: &Path, name: &str) -> Result<PathBuf> {
    let rel = Path::new(name);
    let safe = !rel.is_absolute()
        && rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if !safe || name.is_empty() {
        return Err(Error::UnsafeEntryName(name.to_owned()));
    }
    Ok(dest.join(rel))
}
