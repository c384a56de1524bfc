use std::fmt;
use std::str::FromStr;

use crate::hex::hex_decode;
use crate::{HashAlgorithm, HashError};

/// Size of the largest supported digest (SHA-256).
const MAX_DIGEST_LEN: usize = 32;

/// A content address: the digest of an object's canonical byte form.
///
/// The digest is stored in a buffer sized for the largest algorithm, with
/// the bytes past the digest length held at zero. That invariant makes the
/// derived comparisons correct over the whole struct: ids of different
/// algorithms are never equal, ordering groups by algorithm and is then
/// lexicographic over the digest. Every on-disk OID table is
/// single-algorithm, so within one table this is exactly its sort order.
///
/// Identity-adjacent behavior lives elsewhere by design: abbreviated
/// comparison is [`HashPrefix`](crate::HashPrefix), digest computation is
/// [`hasher`](crate::hasher), and storage path shapes belong to the stores
/// that define them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    algo: HashAlgorithm,
    raw: [u8; MAX_DIGEST_LEN],
}

impl ObjectId {
    /// The all-zeros SHA-1 id.
    pub const NULL_SHA1: Self = Self {
        algo: HashAlgorithm::Sha1,
        raw: [0; MAX_DIGEST_LEN],
    };
    /// The all-zeros SHA-256 id.
    pub const NULL_SHA256: Self = Self {
        algo: HashAlgorithm::Sha256,
        raw: [0; MAX_DIGEST_LEN],
    };

    /// Wrap a SHA-1 digest.
    pub fn sha1(digest: [u8; 20]) -> Self {
        let mut raw = [0u8; MAX_DIGEST_LEN];
        raw[..digest.len()].copy_from_slice(&digest);
        Self {
            algo: HashAlgorithm::Sha1,
            raw,
        }
    }

    /// Wrap a SHA-256 digest.
    pub fn sha256(digest: [u8; 32]) -> Self {
        Self {
            algo: HashAlgorithm::Sha256,
            raw: digest,
        }
    }

    /// Adopt a digest slice read from an OID table or a wire header.
    ///
    /// The slice length must match the algorithm exactly.
    pub fn from_bytes(bytes: &[u8], algo: HashAlgorithm) -> Result<Self, HashError> {
        if bytes.len() != algo.digest_len() {
            return Err(HashError::InvalidHashLength {
                expected: algo.digest_len(),
                actual: bytes.len(),
            });
        }
        let mut raw = [0u8; MAX_DIGEST_LEN];
        raw[..bytes.len()].copy_from_slice(bytes);
        Ok(Self { algo, raw })
    }

    /// Decode a full hex id; 40 digits select SHA-1, 64 select SHA-256.
    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        let algo = HashAlgorithm::from_hex_len(hex.len()).ok_or(HashError::InvalidHexLength {
            expected: HashAlgorithm::Sha1.hex_len(),
            actual: hex.len(),
        })?;
        let mut raw = [0u8; MAX_DIGEST_LEN];
        hex_decode(hex, &mut raw[..algo.digest_len()])?;
        Ok(Self { algo, raw })
    }

    /// The digest bytes (20 or 32 of them, per the algorithm).
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw[..self.algo.digest_len()]
    }

    /// The algorithm that produced this id.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    /// The fan-out bucket: the digest's leading byte.
    pub fn first_byte(&self) -> u8 {
        self.raw[0]
    }

    /// The lowercase hex form.
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.as_bytes() {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.algo)?;
        for b in &self.raw[..4] {
            write!(f, "{b:02x}")?;
        }
        f.write_str(")")
    }
}

impl FromStr for ObjectId {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
