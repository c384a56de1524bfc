use std::fs;
use std::io::Read;

use flate2::read::ZlibDecoder;
use grit_hash::hasher::Hasher;
use grit_hash::{HashPrefix, ObjectId};
use grit_object::{header, ObjectType, RawObject};

use crate::{LooseError, LooseStore};

impl LooseStore {
    /// Check whether a loose object exists.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.object_path(oid).is_file()
    }

    /// Read a loose object by OID.
    ///
    /// Returns `Ok(None)` if the object does not exist, `Err` if it exists
    /// but is corrupt.
    pub fn read(&self, oid: &ObjectId) -> Result<Option<RawObject>, LooseError> {
        let path = self.object_path(oid);
        let compressed = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        let decompressed = decompress_all(&compressed, oid)?;
        let (kind, content_size, header_len) = header::parse_header(&decompressed)?;
        let content = &decompressed[header_len..];
        if content.len() != content_size {
            return Err(LooseError::Corrupt {
                oid: oid.to_hex(),
                reason: format!(
                    "size mismatch: header says {content_size}, payload is {}",
                    content.len()
                ),
            });
        }

        Ok(Some(RawObject {
            kind,
            id: *oid,
            data: content.to_vec(),
        }))
    }

    /// Read just the header (type + size) without inflating the payload.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    pub fn read_header(&self, oid: &ObjectId) -> Result<Option<(ObjectType, usize)>, LooseError> {
        let path = self.object_path(oid);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        let header = inflate_header(file, oid)?;
        let (kind, content_size, _) = header::parse_header(&header)?;
        Ok(Some((kind, content_size)))
    }

    /// Read a loose object and verify its content hash matches the OID.
    pub fn read_verified(&self, oid: &ObjectId) -> Result<Option<RawObject>, LooseError> {
        let path = self.object_path(oid);
        let compressed = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LooseError::Io(e)),
        };

        let decompressed = decompress_all(&compressed, oid)?;
        let actual = Hasher::digest(self.hash_algo(), &decompressed);
        if actual != *oid {
            return Err(LooseError::HashMismatch {
                path,
                expected: oid.to_hex(),
                actual: actual.to_hex(),
            });
        }

        let (kind, content_size, header_len) = header::parse_header(&decompressed)?;
        Ok(Some(RawObject {
            kind,
            id: *oid,
            data: decompressed[header_len..header_len + content_size].to_vec(),
        }))
    }

    /// All loose OIDs matching an abbreviated prefix.
    ///
    /// Only the one fan-out directory named by the first byte is scanned;
    /// a prefix is always at least four hex digits so that byte is exact.
    pub fn find_prefix(&self, prefix: &HashPrefix) -> Result<Vec<ObjectId>, LooseError> {
        let shard = format!("{:02x}", prefix.first_byte());
        let dir = self.objects_dir().join(&shard);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(rest) = name.to_str() else { continue };
            let hex = format!("{shard}{rest}");
            let Ok(oid) = ObjectId::from_hex(&hex) else {
                continue;
            };
            if prefix.matches(&oid) {
                matches.push(oid);
            }
        }
        matches.sort();
        Ok(matches)
    }

    /// Resolve an abbreviated prefix to the unique loose object it names.
    ///
    /// Returns `Ok(None)` when nothing matches and `Ambiguous` when two or
    /// more objects share the prefix.
    pub fn read_prefix(&self, prefix: &HashPrefix) -> Result<Option<RawObject>, LooseError> {
        let matches = self.find_prefix(prefix)?;
        match matches.len() {
            0 => Ok(None),
            1 => self.read(&matches[0]),
            count => Err(LooseError::Ambiguous {
                prefix: prefix.to_hex(),
                count,
            }),
        }
    }
}

/// Zlib-decompress the full contents of a loose object file.
fn decompress_all(compressed: &[u8], oid: &ObjectId) -> Result<Vec<u8>, LooseError> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| LooseError::Decompress {
            oid: oid.to_hex(),
            source: e,
        })?;
    Ok(decompressed)
}

/// Inflate just enough of a loose object to cover its header.
///
/// Headers are well under 32 bytes; 64 leaves room for absurd sizes.
pub(crate) fn inflate_header(file: fs::File, oid: &ObjectId) -> Result<Vec<u8>, LooseError> {
    let mut decoder = ZlibDecoder::new(file);
    let mut buf = [0u8; 64];
    let mut filled = 0;

    loop {
        if filled >= buf.len() {
            return Err(LooseError::Corrupt {
                oid: oid.to_hex(),
                reason: "header exceeds 64 bytes".into(),
            });
        }
        let n = decoder
            .read(&mut buf[filled..])
            .map_err(|e| LooseError::Decompress {
                oid: oid.to_hex(),
                source: e,
            })?;
        if n == 0 {
            return Err(LooseError::Corrupt {
                oid: oid.to_hex(),
                reason: "unexpected EOF before header null terminator".into(),
            });
        }
        filled += n;
        if buf[..filled].contains(&0) {
            return Ok(buf[..filled].to_vec());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use grit_hash::HashAlgorithm;
    use std::io::Write;
    use std::path::Path;

    /// Write a loose object file for the given payload; returns its OID.
    fn put_loose(objects_dir: &Path, kind: ObjectType, content: &[u8]) -> ObjectId {
        let oid = Hasher::hash_object(HashAlgorithm::Sha1, kind.as_str(), content);
        let hex = oid.to_hex();
        let dir = objects_dir.join(&hex[..2]);
        fs::create_dir_all(&dir).unwrap();

        let mut raw = Vec::new();
        raw.extend_from_slice(header::write_header(kind, content.len()).as_slice());
        raw.extend_from_slice(content);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        fs::write(dir.join(&hex[2..]), encoder.finish().unwrap()).unwrap();
        oid
    }

    #[test]
    fn read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let oid = put_loose(dir.path(), ObjectType::Blob, b"hello loose world");

        let store = LooseStore::open(dir.path(), HashAlgorithm::Sha1);
        let raw = store.read(&oid).unwrap().unwrap();
        assert_eq!(raw.kind, ObjectType::Blob);
        assert_eq!(raw.id, oid);
        assert_eq!(raw.data, b"hello loose world");
    }

    #[test]
    fn read_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LooseStore::open(dir.path(), HashAlgorithm::Sha1);
        let missing = ObjectId::from_hex("0000000000000000000000000000000000000001").unwrap();
        assert!(store.read(&missing).unwrap().is_none());
        assert!(!store.contains(&missing));
    }

    #[test]
    fn read_header_without_payload() {
        let dir = tempfile::tempdir().unwrap();
        let oid = put_loose(dir.path(), ObjectType::Commit, b"tree x\n");

        let store = LooseStore::open(dir.path(), HashAlgorithm::Sha1);
        let (kind, size) = store.read_header(&oid).unwrap().unwrap();
        assert_eq!(kind, ObjectType::Commit);
        assert_eq!(size, 7);
    }

    #[test]
    fn read_verified_accepts_good_object() {
        let dir = tempfile::tempdir().unwrap();
        let oid = put_loose(dir.path(), ObjectType::Blob, b"verified");

        let store = LooseStore::open(dir.path(), HashAlgorithm::Sha1);
        assert!(store.read_verified(&oid).unwrap().is_some());
    }

    #[test]
    fn read_verified_rejects_renamed_object() {
        let dir = tempfile::tempdir().unwrap();
        let oid = put_loose(dir.path(), ObjectType::Blob, b"content");

        // Copy the file to a wrong OID path.
        let store = LooseStore::open(dir.path(), HashAlgorithm::Sha1);
        let wrong = ObjectId::from_hex("00112233445566778899aabbccddeeff00112233").unwrap();
        let wrong_path = store.object_path(&wrong);
        fs::create_dir_all(wrong_path.parent().unwrap()).unwrap();
        fs::copy(store.object_path(&oid), &wrong_path).unwrap();

        assert!(matches!(
            store.read_verified(&wrong).unwrap_err(),
            LooseError::HashMismatch { .. }
        ));
    }

    #[test]
    fn prefix_lookup_unique_and_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        let a = put_loose(dir.path(), ObjectType::Blob, b"first");
        let _b = put_loose(dir.path(), ObjectType::Blob, b"second");

        let store = LooseStore::open(dir.path(), HashAlgorithm::Sha1);

        // Unique: the first 8 digits of a real OID.
        let unique = HashPrefix::from_hex(&a.to_hex()[..8]).unwrap();
        let raw = store.read_prefix(&unique).unwrap().unwrap();
        assert_eq!(raw.id, a);

        // No match.
        let none = HashPrefix::from_hex("ffffffff").unwrap();
        assert!(store.read_prefix(&none).unwrap().is_none());
    }

    #[test]
    fn prefix_lookup_detects_ambiguity() {
        let dir = tempfile::tempdir().unwrap();

        // Two hand-placed objects sharing a 4-digit prefix.
        let store = LooseStore::open(dir.path(), HashAlgorithm::Sha1);
        for suffix in ["aa", "bb"] {
            let hex = format!("abcd{}{}", suffix, "0".repeat(34));
            let oid = ObjectId::from_hex(&hex).unwrap();
            let path = store.object_path(&oid);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(b"blob 1\0x").unwrap();
            fs::write(&path, encoder.finish().unwrap()).unwrap();
        }

        let prefix = HashPrefix::from_hex("abcd").unwrap();
        assert_eq!(store.find_prefix(&prefix).unwrap().len(), 2);
        assert!(matches!(
            store.read_prefix(&prefix).unwrap_err(),
            LooseError::Ambiguous { count: 2, .. }
        ));
    }
}
