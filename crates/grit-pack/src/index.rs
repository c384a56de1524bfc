//! Pack index (v2) reading and lookup.
//!
//! Layout after the 8-byte header (`\377tOc` + u32 version):
//!
//! ```text
//! Fanout:  256 × u32 big-endian cumulative counts
//! OIDs:    N × 20-byte sorted OIDs
//! CRC32:   N × u32
//! Offsets: N × u32 (bit 31 set → ordinal into the long-offset table)
//! Long:    M × u64 offsets (packs > 2 GiB)
//! Trailer: 20-byte pack checksum | 20-byte index checksum
//! ```

use std::path::{Path, PathBuf};

use grit_hash::fanout::FanoutTable;
use grit_hash::{HashAlgorithm, HashPrefix, ObjectId};
use memmap2::Mmap;

use crate::{PackError, IDX_SIGNATURE, IDX_VERSION};

/// Pack index (v2) providing OID → offset mapping for one pack.
#[derive(Debug)]
pub struct PackIndex {
    data: Mmap,
    fanout: FanoutTable,
    num_objects: u32,
    oid_offset: usize,
    crc_offset: usize,
    offset32_offset: usize,
    offset64_offset: usize,
    idx_path: PathBuf,
    hash_algo: HashAlgorithm,
}

impl PackIndex {
    /// Open and validate a pack index file.
    pub fn open(idx_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let idx_path = idx_path.as_ref().to_path_buf();
        let file = std::fs::File::open(&idx_path)?;
        let data = unsafe { Mmap::map(&file)? };

        let hash_algo = HashAlgorithm::Sha1;
        let hash_len = hash_algo.digest_len();

        if data.len() < 8 + 1024 + 2 * hash_len {
            return Err(PackError::InvalidIndex("file too small".into()));
        }
        if data[0..4] != IDX_SIGNATURE {
            return Err(PackError::InvalidIndex("bad signature".into()));
        }
        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if version != IDX_VERSION {
            return Err(PackError::InvalidIndex(format!(
                "unsupported version {version}, expected {IDX_VERSION}"
            )));
        }

        let fanout = FanoutTable::from_bytes(&data[8..8 + 1024])
            .map_err(|e| PackError::InvalidIndex(e.to_string()))?;
        let num_objects = fanout.total();

        let n = num_objects as usize;
        let oid_offset = 8 + 1024;
        let crc_offset = oid_offset + n * hash_len;
        let offset32_offset = crc_offset + n * 4;
        let offset64_offset = offset32_offset + n * 4;

        let min_size = offset64_offset + 2 * hash_len;
        if data.len() < min_size {
            return Err(PackError::InvalidIndex(format!(
                "file too small: {} < {min_size}",
                data.len()
            )));
        }

        Ok(Self {
            data,
            fanout,
            num_objects,
            oid_offset,
            crc_offset,
            offset32_offset,
            offset64_offset,
            idx_path,
            hash_algo,
        })
    }

    /// Look up a full OID, returning its pack offset.
    pub fn lookup(&self, oid: &ObjectId) -> Option<u64> {
        self.index_of(oid).map(|i| self.offset_at(i))
    }

    /// Binary-search a full OID, returning its ordinal.
    pub fn index_of(&self, oid: &ObjectId) -> Option<u32> {
        let range = self.fanout.range(oid.first_byte());
        let target = oid.as_bytes();

        let mut low = range.start;
        let mut high = range.end;
        while low < high {
            let mid = low + (high - low) / 2;
            match self.oid_bytes_at(mid).cmp(target) {
                std::cmp::Ordering::Less => low = mid + 1,
                std::cmp::Ordering::Greater => high = mid,
                std::cmp::Ordering::Equal => return Some(mid as u32),
            }
        }
        None
    }

    /// Resolve an abbreviated prefix to an ordinal.
    ///
    /// Returns `Ok(None)` when nothing matches; `Ambiguous` when a second
    /// neighboring entry shares the prefix.
    pub fn index_of_prefix(&self, prefix: &HashPrefix) -> Result<Option<u32>, PackError> {
        let mut matches = self.prefix_ordinals(prefix);
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches.remove(0))),
            count => Err(PackError::Ambiguous {
                prefix: prefix.to_hex(),
                count,
            }),
        }
    }

    /// All OIDs in this index matching an abbreviated prefix.
    pub fn find_prefix(&self, prefix: &HashPrefix) -> Vec<ObjectId> {
        self.prefix_ordinals(prefix)
            .into_iter()
            .map(|i| self.oid_at(i))
            .collect()
    }

    fn prefix_ordinals(&self, prefix: &HashPrefix) -> Vec<u32> {
        let range = self.fanout.range(prefix.first_byte());
        range
            .filter(|&i| prefix.matches_bytes(self.oid_bytes_at(i)))
            .map(|i| i as u32)
            .collect()
    }

    /// The OID at a sorted ordinal.
    pub fn oid_at(&self, index: u32) -> ObjectId {
        ObjectId::from_bytes(self.oid_bytes_at(index as usize), self.hash_algo)
            .expect("index bounds checked at open")
    }

    /// The pack offset at a sorted ordinal, following the long-offset
    /// table when bit 31 of the short offset is set.
    pub fn offset_at(&self, index: u32) -> u64 {
        let pos = self.offset32_offset + index as usize * 4;
        let val = u32::from_be_bytes([
            self.data[pos],
            self.data[pos + 1],
            self.data[pos + 2],
            self.data[pos + 3],
        ]);

        if val & 0x8000_0000 != 0 {
            let pos64 = self.offset64_offset + (val & 0x7fff_ffff) as usize * 8;
            u64::from_be_bytes([
                self.data[pos64],
                self.data[pos64 + 1],
                self.data[pos64 + 2],
                self.data[pos64 + 3],
                self.data[pos64 + 4],
                self.data[pos64 + 5],
                self.data[pos64 + 6],
                self.data[pos64 + 7],
            ])
        } else {
            val as u64
        }
    }

    /// The CRC32 of the raw entry bytes at a sorted ordinal.
    pub fn crc32_at(&self, index: u32) -> u32 {
        let pos = self.crc_offset + index as usize * 4;
        u32::from_be_bytes([
            self.data[pos],
            self.data[pos + 1],
            self.data[pos + 2],
            self.data[pos + 3],
        ])
    }

    /// Total number of objects in this index.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// Path to the `.idx` file.
    pub fn path(&self) -> &Path {
        &self.idx_path
    }

    /// The pack checksum stored in the trailer.
    pub fn pack_checksum(&self) -> ObjectId {
        let hash_len = self.hash_algo.digest_len();
        let start = self.data.len() - 2 * hash_len;
        ObjectId::from_bytes(&self.data[start..start + hash_len], self.hash_algo)
            .expect("trailer bounds checked at open")
    }

    /// Iterate `(oid, offset)` pairs in sorted OID order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, u64)> + '_ {
        (0..self.num_objects).map(|i| (self.oid_at(i), self.offset_at(i)))
    }

    fn oid_bytes_at(&self, index: usize) -> &[u8] {
        let hash_len = self.hash_algo.digest_len();
        let start = self.oid_offset + index * hash_len;
        &self.data[start..start + hash_len]
    }
}
