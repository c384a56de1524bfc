//! Read-only staging-area (index) listing.
//!
//! Parses index format v2: a 12-byte header (`DIRC`, version, entry
//! count) followed by entries of fixed stat fields, OID, flags, and a
//! NUL-terminated path padded so each entry is a multiple of 8 bytes.
//! Extensions and the trailing checksum are not interpreted.

use std::path::Path;

use bstr::BString;
use grit_hash::{HashAlgorithm, ObjectId};
use grit_object::FileMode;
use memmap2::Mmap;

use crate::RepoError;

const INDEX_SIGNATURE: &[u8; 4] = b"DIRC";
/// Fixed bytes before the path: stat data (40) + OID (20) + flags (2).
const ENTRY_FIXED_LEN: usize = 62;

/// One staged file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedEntry {
    pub path: BString,
    pub oid: ObjectId,
    pub mode: FileMode,
    /// Merge stage (0 normal, 1–3 during conflicts).
    pub stage: u8,
}

/// List the staged entries of an index file. A missing file is an empty
/// staging area.
pub fn read_index(path: &Path) -> Result<Vec<StagedEntry>, RepoError> {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let data = unsafe { Mmap::map(&file)? };

    if data.len() < 12 {
        return Err(RepoError::InvalidIndex("file too small".into()));
    }
    if &data[0..4] != INDEX_SIGNATURE {
        return Err(RepoError::InvalidIndex("bad signature".into()));
    }
    let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    if version != 2 {
        return Err(RepoError::InvalidIndex(format!(
            "unsupported version {version}"
        )));
    }
    let entry_count = u32::from_be_bytes([data[8], data[9], data[10], data[11]]) as usize;

    let mut entries = Vec::with_capacity(entry_count);
    let mut pos = 12;
    for i in 0..entry_count {
        if pos + ENTRY_FIXED_LEN > data.len() {
            return Err(RepoError::InvalidIndex(format!(
                "truncated at entry {i} of {entry_count}"
            )));
        }
        let entry_start = pos;

        let mode_raw = u32::from_be_bytes([
            data[pos + 24],
            data[pos + 25],
            data[pos + 26],
            data[pos + 27],
        ]);

        let hash_len = HashAlgorithm::Sha1.digest_len();
        let oid = ObjectId::from_bytes(&data[pos + 40..pos + 40 + hash_len], HashAlgorithm::Sha1)?;

        let flags = u16::from_be_bytes([data[pos + 60], data[pos + 61]]);
        let stage = ((flags >> 12) & 0x3) as u8;
        let name_len = (flags & 0x0fff) as usize;

        pos += ENTRY_FIXED_LEN;
        let path = if name_len < 0x0fff {
            if pos + name_len > data.len() {
                return Err(RepoError::InvalidIndex(format!("truncated path at entry {i}")));
            }
            BString::from(&data[pos..pos + name_len])
        } else {
            // Long path: scan to the NUL terminator.
            let end = data[pos..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| RepoError::InvalidIndex(format!("unterminated path at entry {i}")))?;
            BString::from(&data[pos..pos + end])
        };
        pos += path.len();

        // Entries are NUL-padded to an 8-byte boundary (at least one NUL).
        let entry_len = pos - entry_start;
        let padded = (entry_len / 8 + 1) * 8;
        pos = entry_start + padded;

        entries.push(StagedEntry {
            path,
            oid,
            mode: FileMode::from_raw(mode_raw),
            stage,
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a v2 index with the given `(path, oid, mode, stage)` rows.
    fn build_index(entries: &[(&str, ObjectId, u32, u8)]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(INDEX_SIGNATURE);
        buf.extend_from_slice(&2u32.to_be_bytes());
        buf.extend_from_slice(&(entries.len() as u32).to_be_bytes());

        for (path, oid, mode, stage) in entries {
            let entry_start = buf.len();
            buf.extend_from_slice(&[0u8; 24]); // ctime/mtime/dev/ino
            buf.extend_from_slice(&mode.to_be_bytes());
            buf.extend_from_slice(&[0u8; 12]); // uid/gid/size
            buf.extend_from_slice(oid.as_bytes());
            let flags = ((*stage as u16) << 12) | (path.len() as u16 & 0x0fff);
            buf.extend_from_slice(&flags.to_be_bytes());
            buf.extend_from_slice(path.as_bytes());

            let entry_len = buf.len() - entry_start;
            let padded = (entry_len / 8 + 1) * 8;
            buf.resize(entry_start + padded, 0);
        }

        // Trailing checksum (not validated by the reader).
        let checksum = grit_hash::hasher::Hasher::digest(HashAlgorithm::Sha1, &buf);
        buf.extend_from_slice(checksum.as_bytes());
        buf
    }

    fn oid(n: u8) -> ObjectId {
        let mut bytes = [0u8; 20];
        bytes[0] = n;
        ObjectId::from_bytes(&bytes, HashAlgorithm::Sha1).unwrap()
    }

    #[test]
    fn lists_entries_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index");
        std::fs::write(
            &path,
            build_index(&[
                ("a.txt", oid(1), 0o100644, 0),
                ("dir/b.txt", oid(2), 0o100755, 0),
            ]),
        )
        .unwrap();

        let entries = read_index(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "a.txt");
        assert_eq!(entries[0].oid, oid(1));
        assert_eq!(entries[0].mode, FileMode::Regular);
        assert_eq!(entries[1].path, "dir/b.txt");
        assert_eq!(entries[1].mode, FileMode::Executable);
    }

    #[test]
    fn conflict_stages_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index");
        std::fs::write(
            &path,
            build_index(&[
                ("conflicted.txt", oid(1), 0o100644, 1),
                ("conflicted.txt", oid(2), 0o100644, 2),
                ("conflicted.txt", oid(3), 0o100644, 3),
            ]),
        )
        .unwrap();

        let entries = read_index(&path).unwrap();
        let stages: Vec<u8> = entries.iter().map(|e| e.stage).collect();
        assert_eq!(stages, vec![1, 2, 3]);
    }

    #[test]
    fn missing_index_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_index(&dir.path().join("index")).unwrap().is_empty());
    }

    #[test]
    fn bad_signature_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index");
        std::fs::write(&path, b"XXXX\x00\x00\x00\x02\x00\x00\x00\x00").unwrap();
        assert!(matches!(
            read_index(&path).unwrap_err(),
            RepoError::InvalidIndex(_)
        ));
    }

    #[test]
    fn unsupported_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index");
        std::fs::write(&path, b"DIRC\x00\x00\x00\x04\x00\x00\x00\x00").unwrap();
        assert!(matches!(
            read_index(&path).unwrap_err(),
            RepoError::InvalidIndex(_)
        ));
    }
}
