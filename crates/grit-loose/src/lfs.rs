use std::fs;
use std::path::{Path, PathBuf};

use grit_hash::{HashAlgorithm, HashError, ObjectId};

use crate::LooseError;

/// Read-only access to locally cached git-lfs media files.
///
/// LFS content is addressed by the SHA-256 of the raw file, sharded two
/// levels deep (`lfs/objects/aa/bb/<64-hex>`), and stored without any
/// object header: the file content is the payload.
pub struct LfsStore {
    lfs_objects_dir: PathBuf,
}

impl LfsStore {
    /// Open the LFS media store rooted at `<git-dir>/lfs/objects`.
    pub fn open(lfs_objects_dir: impl AsRef<Path>) -> Self {
        Self {
            lfs_objects_dir: lfs_objects_dir.as_ref().to_path_buf(),
        }
    }

    /// The media file path for a given content hash:
    /// `<aa>/<bb>/<full-hex>`.
    pub fn media_path(&self, oid: &ObjectId) -> PathBuf {
        let hex = oid.to_hex();
        self.lfs_objects_dir.join(&hex[..2]).join(&hex[2..4]).join(&hex)
    }

    /// Whether the media file for `oid` is present locally.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.media_path(oid).is_file()
    }

    /// Read a media file by its 64-hex content hash.
    ///
    /// Returns `Ok(None)` if the content has not been fetched locally.
    pub fn read(&self, oid: &ObjectId) -> Result<Option<Vec<u8>>, LooseError> {
        if oid.algorithm() != HashAlgorithm::Sha256 {
            return Err(LooseError::Hash(HashError::InvalidHashLength {
                expected: HashAlgorithm::Sha256.digest_len(),
                actual: oid.as_bytes().len(),
            }));
        }
        match fs::read(self.media_path(oid)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LooseError::Io(e)),
        }
    }

    /// Open a media file for streaming.
    pub fn stream(&self, oid: &ObjectId) -> Result<Option<fs::File>, LooseError> {
        match fs::File::open(self.media_path(oid)) {
            Ok(f) => Ok(Some(f)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LooseError::Io(e)),
        }
    }
}
