use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to stat {path}: {source}")]
    Metadata {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no user name for uid {0}")]
    UnknownUser(u32),

    #[error("no group name for gid {0}")]
    UnknownGroup(u32),

    #[error("file name too long for ustar header (max 99 bytes): {0}")]
    NameTooLong(String),

    #[error("file too large for ustar size field: {name} ({size} bytes)")]
    FileTooLarge { name: String, size: u64 },

    #[error("value {value} does not fit the {field} header field")]
    FieldOverflow { field: &'static str, value: u64 },

    #[error("invalid octal digits in header field")]
    InvalidOctal,

    #[error("archive truncated mid-entry")]
    Truncated,

    #[error("archive does not end with the two-block zero trailer")]
    MissingTrailer,

    #[error("refusing to extract unsafe entry name: {0}")]
    UnsafeEntryName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
