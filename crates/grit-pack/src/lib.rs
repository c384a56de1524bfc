//! Packfile access: entry decoding, delta reconstruction, index lookup,
//! multi-pack index routing, and pack-set management.
//!
//! Packfiles store objects zlib-compressed and possibly deltified against
//! another object, identified either by a back-offset into the same pack
//! (`OFS_DELTA`) or by OID (`REF_DELTA`). An index maps OIDs to offsets; a
//! multi-pack index does the same across several packs at once.

pub mod delta;
pub mod entry;
pub mod index;
pub mod manager;
pub mod midx;
pub mod pack;

use grit_hash::ObjectId;
use grit_object::ObjectType;

/// Errors that can occur during pack operations.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("invalid pack header: {0}")]
    InvalidHeader(String),

    #[error("invalid pack index: {0}")]
    InvalidIndex(String),

    #[error("invalid multi-pack index: {0}")]
    InvalidMidx(String),

    #[error("multi-pack index references missing pack {0}")]
    MidxMissingPack(String),

    #[error("invalid delta at offset {offset}: {reason}")]
    InvalidDelta { offset: u64, reason: String },

    #[error("delta base not found: {0}")]
    MissingBase(ObjectId),

    #[error("delta chain too deep (>{max_depth} levels) at offset {offset}")]
    DeltaChainTooDeep { offset: u64, max_depth: usize },

    #[error("corrupt pack entry at offset {0}")]
    CorruptEntry(u64),

    #[error("unsupported pack version: {0}")]
    UnsupportedVersion(u32),

    #[error("ambiguous object prefix {prefix}: matches {count} packed objects")]
    Ambiguous { prefix: String, count: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hash(#[from] grit_hash::HashError),
}

/// Kind tag of a packed entry before delta resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackEntryKind {
    Commit,
    Tree,
    Blob,
    Tag,
    /// Delta whose base lives earlier in the same pack.
    OfsDelta { base_offset: u64 },
    /// Delta whose base is identified by OID.
    RefDelta { base_oid: ObjectId },
}

impl PackEntryKind {
    /// Convert a non-delta entry kind to an `ObjectType`.
    pub fn to_object_type(self) -> Option<ObjectType> {
        match self {
            Self::Commit => Some(ObjectType::Commit),
            Self::Tree => Some(ObjectType::Tree),
            Self::Blob => Some(ObjectType::Blob),
            Self::Tag => Some(ObjectType::Tag),
            Self::OfsDelta { .. } | Self::RefDelta { .. } => None,
        }
    }

    /// The 3-bit type number used in pack entry headers.
    pub fn type_number(&self) -> u8 {
        match self {
            Self::Commit => 1,
            Self::Tree => 2,
            Self::Blob => 3,
            Self::Tag => 4,
            Self::OfsDelta { .. } => 6,
            Self::RefDelta { .. } => 7,
        }
    }
}

/// A fully reconstructed object read from a packfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedObject {
    pub kind: ObjectType,
    pub data: Vec<u8>,
}

/// Callback used to resolve `REF_DELTA` bases that may live outside the
/// pack being read (another pack, or a loose object).
pub type BaseResolver<'a> = &'a dyn Fn(&ObjectId) -> Option<(ObjectType, Vec<u8>)>;

/// Pack format constants.
pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_VERSION: u32 = 2;
pub const PACK_HEADER_SIZE: usize = 12;

/// Pack index v2 constants.
pub const IDX_SIGNATURE: [u8; 4] = [0xff, 0x74, 0x4f, 0x63]; // "\377tOc"
pub const IDX_VERSION: u32 = 2;

/// Maximum delta chain depth before we bail out (also the cycle guard for
/// REF_DELTA chains, which unlike OFS chains are not forced to point
/// backwards).
pub const MAX_DELTA_CHAIN_DEPTH: usize = 512;

/// Entries kept in each pack's reconstructed-base cache.
pub const DELTA_CACHE_CAPACITY: usize = 256;
