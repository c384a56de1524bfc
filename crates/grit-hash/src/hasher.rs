//! Streaming object-id computation.

use digest::Digest;

use crate::{HashAlgorithm, ObjectId};

enum HasherInner {
    Sha1(sha1::Sha1),
    Sha256(sha2::Sha256),
}

/// Streaming hash computation over SHA-1 or SHA-256.
///
/// Data is fed incrementally with [`update`](Hasher::update) or through the
/// [`std::io::Write`] implementation, then finalised into an [`ObjectId`].
pub struct Hasher {
    inner: HasherInner,
}

impl Hasher {
    /// Create a new hasher for the given algorithm.
    pub fn new(algo: HashAlgorithm) -> Self {
        let inner = match algo {
            HashAlgorithm::Sha1 => HasherInner::Sha1(sha1::Sha1::new()),
            HashAlgorithm::Sha256 => HasherInner::Sha256(sha2::Sha256::new()),
        };
        Self { inner }
    }

    /// Feed data into the hasher.
    pub fn update(&mut self, data: &[u8]) {
        match &mut self.inner {
            HasherInner::Sha1(h) => h.update(data),
            HasherInner::Sha256(h) => h.update(data),
        }
    }

    /// Finalize and return the ObjectId.
    pub fn finalize(self) -> ObjectId {
        match self.inner {
            HasherInner::Sha1(h) => {
                let mut digest = [0u8; 20];
                digest.copy_from_slice(&h.finalize());
                ObjectId::sha1(digest)
            }
            HasherInner::Sha256(h) => {
                let mut digest = [0u8; 32];
                digest.copy_from_slice(&h.finalize());
                ObjectId::sha256(digest)
            }
        }
    }

    /// Hash data in one call.
    pub fn digest(algo: HashAlgorithm, data: &[u8]) -> ObjectId {
        let mut h = Self::new(algo);
        h.update(data);
        h.finalize()
    }

    /// Hash a git object: `"{type} {len}\0{content}"`.
    pub fn hash_object(algo: HashAlgorithm, obj_type: &str, data: &[u8]) -> ObjectId {
        let mut h = Self::new(algo);
        h.update(obj_type.as_bytes());
        h.update(format!(" {}\0", data.len()).as_bytes());
        h.update(data);
        h.finalize()
    }
}

impl std::io::Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
