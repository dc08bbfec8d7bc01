//! The ustar header codec.
//!
//! Every archive entry starts with a fixed 512-byte header block whose
//! numeric fields are ASCII octal text. The [`field`] module is the
//! single source of truth for field offsets; nothing else in the crate
//! does offset arithmetic into a header.
//!
//! Numeric fields are written zero-padded and NUL-terminated (the
//! common tar convention): 7 digits + NUL in 8-byte fields, 11 digits +
//! NUL in 12-byte fields, and 6 digits + NUL + space in the checksum
//! slot.

use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::error::{Error, Result};
use crate::identity::IdentityResolver;

/// Size of a single archive block; headers, payload chunks and the
/// trailer are all aligned to this.
pub const BLOCK_SIZE: usize = 512;

/// A raw 512-byte block.
pub type Block = [u8; BLOCK_SIZE];

/// ustar magic, including its terminating NUL.
pub const MAGIC: &[u8; 6] = b"ustar\0";
/// ustar version field ("00", deliberately not NUL-terminated).
pub const VERSION: &[u8; 2] = b"00";
/// Type flag for a regular file, the only entry type supported.
pub const TYPEFLAG_REGULAR: u8 = b'0';

/// Byte ranges of the ustar header fields within a block.
pub mod field {
    use std::ops::Range;

    pub const NAME: Range<usize> = 0..100;
    pub const MODE: Range<usize> = 100..108;
    pub const UID: Range<usize> = 108..116;
    pub const GID: Range<usize> = 116..124;
    pub const SIZE: Range<usize> = 124..136;
    pub const MTIME: Range<usize> = 136..148;
    pub const CHKSUM: Range<usize> = 148..156;
    pub const TYPEFLAG: usize = 156;
    pub const LINKNAME: Range<usize> = 157..257;
    pub const MAGIC: Range<usize> = 257..263;
    pub const VERSION: Range<usize> = 263..265;
    pub const UNAME: Range<usize> = 265..297;
    pub const GNAME: Range<usize> = 297..329;
    pub const DEVMAJOR: Range<usize> = 329..337;
    pub const DEVMINOR: Range<usize> = 337..345;
}

// Longest name that still leaves room for the terminating NUL.
const MAX_NAME: usize = field::NAME.end - field::NAME.start - 1;
// 8^11, the first value that no longer fits 11 octal digits.
const SIZE_LIMIT: u64 = 1 << 33;

/// Decoded view of a header entry.
///
/// The read path only needs the entry name and payload size; all other
/// header fields are ignored when scanning an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMeta {
    pub name: String,
    pub size: u64,
}

/// Metadata for one archive entry, in native types.
///
/// Constructed from filesystem metadata on the write path and encoded
/// with [`HeaderBlock::to_bytes`]. It is never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    pub name: String,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub mtime: u64,
    pub uname: String,
    pub gname: String,
    pub devmajor: u32,
    pub devminor: u32,
}

impl HeaderBlock {
    /// Build a header from a file's metadata.
    ///
    /// Owner and group names come from the injected resolver; an
    /// unresolvable id is a hard failure for this file, there is no
    /// numeric-only fallback. The device fields describe the filesystem
    /// the file lives on.
    pub fn from_file(name: &str, ids: &impl IdentityResolver) -> Result<Self> {
        let meta = std::fs::metadata(name).map_err(|source| Error::Metadata {
            path: Path::new(name).to_path_buf(),
            source,
        })?;

        if name.len() > MAX_NAME {
            return Err(Error::NameTooLong(name.to_owned()));
        }
        let size = meta.len();
        if size >= SIZE_LIMIT {
            return Err(Error::FileTooLarge {
                name: name.to_owned(),
                size,
            });
        }

        Ok(HeaderBlock {
            name: name.to_owned(),
            mode: meta.mode() & 0o7777,
            uid: meta.uid(),
            gid: meta.gid(),
            size,
            // The size field is unsigned; pre-epoch mtimes clamp to 0.
            mtime: u64::try_from(meta.mtime()).unwrap_or(0),
            uname: ids.user_name(meta.uid())?,
            gname: ids.group_name(meta.gid())?,
            devmajor: libc::major(meta.dev() as libc::dev_t),
            devminor: libc::minor(meta.dev() as libc::dev_t),
        })
    }

    /// Encode into a 512-byte header block.
    ///
    /// The checksum is computed last, over the finished block with its
    /// checksum slot filled with ASCII spaces. A numeric value too wide
    /// for its field (a uid above 7 octal digits, say) is an error, not
    /// a silent truncation.
    pub fn to_bytes(&self) -> Result<Block> {
        let mut block: Block = [0; BLOCK_SIZE];

        copy_str(&mut block[field::NAME], &self.name);
        format_octal(&mut block[field::MODE], "mode", self.mode as u64)?;
        format_octal(&mut block[field::UID], "uid", self.uid as u64)?;
        format_octal(&mut block[field::GID], "gid", self.gid as u64)?;
        format_octal(&mut block[field::SIZE], "size", self.size)?;
        format_octal(&mut block[field::MTIME], "mtime", self.mtime)?;
        block[field::TYPEFLAG] = TYPEFLAG_REGULAR;
        // linkname stays zero-filled; links are unsupported.
        block[field::MAGIC].copy_from_slice(MAGIC);
        block[field::VERSION].copy_from_slice(VERSION);
        copy_str(&mut block[field::UNAME], &self.uname);
        copy_str(&mut block[field::GNAME], &self.gname);
        format_octal(&mut block[field::DEVMAJOR], "devmajor", self.devmajor as u64)?;
        format_octal(&mut block[field::DEVMINOR], "devminor", self.devminor as u64)?;

        write_checksum(&mut block);
        Ok(block)
    }

    /// Partial decode of a header block: entry name and payload size.
    pub fn entry_meta(block: &Block) -> Result<EntryMeta> {
        let name_field = &block[field::NAME];
        let end = name_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(name_field.len());
        let name = String::from_utf8_lossy(&name_field[..end]).into_owned();
        let size = parse_octal(&block[field::SIZE])?;
        Ok(EntryMeta { name, size })
    }
}

/// Sum all 512 bytes with the checksum slot treated as spaces.
fn checksum_of(block: &Block) -> u32 {
    let mut sum: u32 = 0;
    for (i, &b) in block.iter().enumerate() {
        if field::CHKSUM.contains(&i) {
            sum += b' ' as u32;
        } else {
            sum += b as u32;
        }
    }
    sum
}

fn write_checksum(block: &mut Block) {
    let sum = checksum_of(block);
    let slot = &mut block[field::CHKSUM];
    // 6 octal digits, NUL, space.
    for i in 0..6 {
        slot[i] = b'0' + ((sum >> (3 * (5 - i))) & 0o7) as u8;
    }
    slot[6] = 0;
    slot[7] = b' ';
}

/// Check a header's stored checksum against a recomputed one.
pub fn verify_checksum(block: &Block) -> bool {
    match parse_octal(&block[field::CHKSUM]) {
        Ok(stored) => stored == checksum_of(block) as u64,
        Err(_) => false,
    }
}

// Copies as much of `s` as fits while keeping a terminating NUL.
fn copy_str(dst: &mut [u8], s: &str) {
    let n = s.len().min(dst.len() - 1);
    dst[..n].copy_from_slice(&s.as_bytes()[..n]);
}

/// Write `value` as zero-padded octal filling all but the last byte of
/// `dst`, which becomes the terminating NUL. A value that needs more
/// octal digits than the field holds is rejected.
fn format_octal(dst: &mut [u8], name: &'static str, value: u64) -> Result<()> {
    let digits = dst.len() - 1;
    if value >> (3 * digits as u32) != 0 {
        return Err(Error::FieldOverflow { field: name, value });
    }
    for (i, slot) in dst[..digits].iter_mut().enumerate() {
        let shift = 3 * (digits - 1 - i);
        *slot = b'0' + ((value >> shift) & 0o7) as u8;
    }
    dst[digits] = 0;
    Ok(())
}

/// Parse an octal header field.
///
/// Leading spaces are padding; digits must be `0`..=`7`; a NUL or space
/// terminates the number and only padding may follow it. Anything else
/// is a malformed field. An all-padding field parses as zero.
pub fn parse_octal(bytes: &[u8]) -> Result<u64> {
    let mut value: u64 = 0;
    let mut seen_digit = false;
    let mut rest = bytes.iter();
    for &b in rest.by_ref() {
        match b {
            b' ' if !seen_digit => continue,
            b'0'..=b'7' => {
                seen_digit = true;
                value = value * 8 + u64::from(b - b'0');
            }
            b' ' | 0 => break,
            _ => return Err(Error::InvalidOctal),
        }
    }
    if rest.any(|&b| b != 0 && b != b' ') {
        return Err(Error::InvalidOctal);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct StaticIds;

    impl IdentityResolver for StaticIds {
        fn user_name(&self, _uid: u32) -> Result<String> {
            Ok("alice".to_owned())
        }
        fn group_name(&self, _gid: u32) -> Result<String> {
            Ok("staff".to_owned())
        }
    }

    struct NoIds;

    impl IdentityResolver for NoIds {
        fn user_name(&self, uid: u32) -> Result<String> {
            Err(Error::UnknownUser(uid))
        }
        fn group_name(&self, gid: u32) -> Result<String> {
            Err(Error::UnknownGroup(gid))
        }
    }

    fn sample_header() -> HeaderBlock {
        HeaderBlock {
            name: "notes.txt".to_owned(),
            mode: 0o644,
            uid: 1000,
            gid: 1000,
            size: 600,
            mtime: 1_700_000_000,
            uname: "alice".to_owned(),
            gname: "staff".to_owned(),
            devmajor: 8,
            devminor: 1,
        }
    }

    #[test]
    fn test_octal_format_parse_roundtrip() {
        let mut buf = [0u8; 12];
        for value in [0u64, 1, 7, 8, 600, 0o7777, SIZE_LIMIT - 1] {
            format_octal(&mut buf, "size", value).unwrap();
            assert_eq!(parse_octal(&buf).unwrap(), value, "value {}", value);
        }
    }

    #[test]
    fn test_octal_format_is_zero_padded_nul_terminated() {
        let mut buf = [0u8; 12];
        format_octal(&mut buf, "size", 600).unwrap();
        assert_eq!(&buf, b"00000001130\0");
    }

    #[test]
    fn test_octal_format_rejects_overflow() {
        // 8-byte fields hold 7 octal digits: 0o7777777 is the last
        // value that fits.
        let mut buf = [0u8; 8];
        format_octal(&mut buf, "uid", 0o7777777).unwrap();
        assert_eq!(&buf, b"7777777\0");

        let err = format_octal(&mut buf, "uid", 0o7777777 + 1).unwrap_err();
        assert!(matches!(
            err,
            Error::FieldOverflow { field: "uid", value } if value == 0o7777777 + 1
        ));

        let mut wide = [0u8; 12];
        assert!(format_octal(&mut wide, "size", SIZE_LIMIT).is_err());
    }

    #[test]
    fn test_parse_octal_accepts_leading_spaces() {
        assert_eq!(parse_octal(b"     644\0   ").unwrap(), 0o644);
        assert_eq!(parse_octal(b"644 \0\0\0\0\0\0\0\0").unwrap(), 0o644);
    }

    #[test]
    fn test_parse_octal_rejects_non_octal_bytes() {
        assert!(parse_octal(b"0000000089\0\0").is_err());
        assert!(parse_octal(b"00000x1130\0\0").is_err());
        assert!(parse_octal(b"0011 junk\0\0\0").is_err());
    }

    #[test]
    fn test_parse_octal_all_padding_is_zero() {
        assert_eq!(parse_octal(&[0u8; 12]).unwrap(), 0);
        assert_eq!(parse_octal(b"            ").unwrap(), 0);
    }

    #[test]
    fn test_encode_rejects_oversized_ids() {
        // An id wider than the 7-digit field must fail encoding, not
        // land truncated in an otherwise checksum-valid header.
        let mut header = sample_header();
        header.uid = 3_000_000_000;
        assert!(matches!(
            header.to_bytes().unwrap_err(),
            Error::FieldOverflow { field: "uid", .. }
        ));

        let mut header = sample_header();
        header.gid = 3_000_000_000;
        assert!(matches!(
            header.to_bytes().unwrap_err(),
            Error::FieldOverflow { field: "gid", .. }
        ));

        let mut header = sample_header();
        header.devmajor = u32::MAX;
        assert!(matches!(
            header.to_bytes().unwrap_err(),
            Error::FieldOverflow { field: "devmajor", .. }
        ));
    }

    #[test]
    fn test_encode_has_valid_checksum() {
        let block = sample_header().to_bytes().unwrap();
        assert!(verify_checksum(&block));

        // Flipping any payload byte must break it.
        let mut tampered = block;
        tampered[field::NAME.start] ^= 0x01;
        assert!(!verify_checksum(&tampered));
    }

    #[test]
    fn test_encode_layout() {
        let block = sample_header().to_bytes().unwrap();
        assert_eq!(&block[..9], b"notes.txt");
        assert_eq!(block[9], 0);
        assert_eq!(&block[field::SIZE], b"00000001130\0");
        assert_eq!(block[field::TYPEFLAG], b'0');
        assert_eq!(&block[field::MAGIC], b"ustar\0");
        assert_eq!(&block[field::VERSION], b"00");
        assert_eq!(&block[field::LINKNAME], &[0u8; 100][..]);
        assert_eq!(&block[265..270], b"alice");
    }

    #[test]
    fn test_entry_meta_roundtrip() {
        let block = sample_header().to_bytes().unwrap();
        let meta = HeaderBlock::entry_meta(&block).unwrap();
        assert_eq!(meta.name, "notes.txt");
        assert_eq!(meta.size, 600);
    }

    #[test]
    fn test_from_file_reads_metadata() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"0123456789").unwrap();
        let path = tmp.path().to_str().unwrap().to_owned();

        let header = HeaderBlock::from_file(&path, &StaticIds).unwrap();
        assert_eq!(header.name, path);
        assert_eq!(header.size, 10);
        assert_eq!(header.uname, "alice");
        assert_eq!(header.gname, "staff");
    }

    #[test]
    fn test_from_file_missing_file_is_metadata_error() {
        let err = HeaderBlock::from_file("no/such/file", &StaticIds).unwrap_err();
        assert!(matches!(err, Error::Metadata { .. }));
    }

    #[test]
    fn test_from_file_unresolved_identity_is_hard_stop() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().to_str().unwrap();

        let err = HeaderBlock::from_file(path, &NoIds).unwrap_err();
        assert!(matches!(err, Error::UnknownUser(_)));
    }

    #[test]
    fn test_from_file_rejects_long_names() {
        let tmp = tempfile::TempDir::new().unwrap();
        let long = "a".repeat(120);
        let path = tmp.path().join(&long);
        std::fs::write(&path, b"x").unwrap();

        let err =
            HeaderBlock::from_file(path.to_str().unwrap(), &StaticIds).unwrap_err();
        assert!(matches!(err, Error::NameTooLong(_)));
    }
}
