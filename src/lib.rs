//! Minimal POSIX ustar archives
//!
//! A small reader/writer for the fixed ustar subset: regular files
//! only, no directories, links, PAX/GNU extensions, sparse files or
//! compression.
//!
//! - [`header`] - the 512-byte header codec (octal fields, checksum)
//! - [`archive`] - create/append/update, list and extract
//! - [`file_list`] - the ordered name list staged for an operation
//! - [`identity`] - uid/gid to name resolution, injectable for tests
//! - [`error`] - error types
//!
//! ## Archive layout
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │ Entry 0: header block (512 bytes)          │
//! │          ceil(size/512) data blocks,       │
//! │          final block zero-padded           │
//! ├────────────────────────────────────────────┤
//! │ Entry 1: …                                 │
//! ├────────────────────────────────────────────┤
//! │ Trailer: two all-zero 512-byte blocks      │
//! └────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use ustar::{Archiver, FileList};
//!
//! # fn main() -> ustar::Result<()> {
//! let files: FileList = ["notes.txt", "data.bin"].into_iter().collect();
//!
//! let report = Archiver::new().create("backup.tar", &files)?;
//! for skip in &report.skipped {
//!     eprintln!("left out {}: {}", skip.name, skip.reason);
//! }
//!
//! for name in &ustar::list("backup.tar")? {
//!     println!("{name}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod error;
pub mod file_list;
pub mod header;
pub mod identity;

pub use archive::{extract, extract_to, list, Archiver, SkippedFile, UpdateOutcome, WriteReport};
pub use error::{Error, Result};
pub use file_list::FileList;
pub use header::{Block, EntryMeta, HeaderBlock, BLOCK_SIZE};
pub use identity::{IdentityResolver, SystemIdentities};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
