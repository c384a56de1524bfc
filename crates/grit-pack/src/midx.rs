//! Multi-pack index (MIDX) reading.
//!
//! A midx indexes the objects of several packs in one chunk-based file:
//!
//! ```text
//! Header: MIDX (4) | version (1) | hash version (1) | chunk count (1)
//!         | base count (1) | pack count (4)
//! Chunk table: [chunk id (4) | offset (8)] × chunk count + terminator
//! Chunks: PNAM (NUL-separated pack names), OIDF (fanout),
//!         OIDL (sorted OIDs), OOFF (pack ordinal + offset per OID),
//!         LOFF (optional long offsets)
//! ```
//!
//! A midx supersedes the standalone `.idx` files of every pack it lists;
//! the pack manager enforces that.

use std::path::{Path, PathBuf};

use grit_hash::fanout::FanoutTable;
use grit_hash::{HashAlgorithm, HashPrefix, ObjectId};
use memmap2::Mmap;

use crate::PackError;

const MIDX_SIGNATURE: &[u8; 4] = b"MIDX";
const MIDX_VERSION: u8 = 1;

const CHUNK_PACK_NAMES: u32 = 0x504e_414d; // "PNAM"
const CHUNK_OID_FANOUT: u32 = 0x4f49_4446; // "OIDF"
const CHUNK_OID_LOOKUP: u32 = 0x4f49_444c; // "OIDL"
const CHUNK_OBJECT_OFFSETS: u32 = 0x4f4f_4646; // "OOFF"
const CHUNK_LARGE_OFFSETS: u32 = 0x4c4f_4646; // "LOFF"

/// A located object: which pack (by midx ordinal) and where in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidxEntry {
    pub pack_index: u32,
    pub offset: u64,
}

/// Multi-pack index spanning multiple packfiles.
#[derive(Debug)]
pub struct MultiPackIndex {
    data: Mmap,
    fanout: FanoutTable,
    num_objects: u32,
    num_packs: u32,
    /// Pack name stems (file names minus extension), in PNAM order.
    pack_stems: Vec<String>,
    hash_algo: HashAlgorithm,
    oid_offset: usize,
    offsets_offset: usize,
    large_offsets_offset: Option<usize>,
    midx_path: PathBuf,
}

impl MultiPackIndex {
    /// Open a multi-pack index and verify every referenced pack exists.
    ///
    /// `pack_dir` is the directory holding the midx and its packs. A pack
    /// named by PNAM but missing on disk fails the open; the caller
    /// (pack manager) treats that as a stale midx.
    pub fn open(midx_path: impl AsRef<Path>, pack_dir: &Path) -> Result<Self, PackError> {
        let midx_path = midx_path.as_ref().to_path_buf();
        let file = std::fs::File::open(&midx_path)?;
        let data = unsafe { Mmap::map(&file)? };

        if data.len() < 12 {
            return Err(PackError::InvalidMidx("file too small".into()));
        }
        if &data[0..4] != MIDX_SIGNATURE {
            return Err(PackError::InvalidMidx("bad MIDX signature".into()));
        }
        if data[4] != MIDX_VERSION {
            return Err(PackError::InvalidMidx(format!(
                "unsupported version {}",
                data[4]
            )));
        }
        let hash_algo = HashAlgorithm::from_version_byte(data[5])
            .ok_or_else(|| PackError::InvalidMidx(format!("unsupported hash version {}", data[5])))?;

        let num_chunks = data[6] as usize;
        let num_packs = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        let mut pack_names_offset: Option<usize> = None;
        let mut fanout_offset: Option<usize> = None;
        let mut oid_offset: Option<usize> = None;
        let mut offsets_offset: Option<usize> = None;
        let mut large_offsets_offset: Option<usize> = None;

        let mut pos = 12;
        let mut chunk_bounds: Vec<(u32, usize)> = Vec::with_capacity(num_chunks + 1);
        for _ in 0..=num_chunks {
            if pos + 12 > data.len() {
                return Err(PackError::InvalidMidx("truncated chunk table".into()));
            }
            let chunk_id =
                u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
            let chunk_offset = u64::from_be_bytes([
                data[pos + 4],
                data[pos + 5],
                data[pos + 6],
                data[pos + 7],
                data[pos + 8],
                data[pos + 9],
                data[pos + 10],
                data[pos + 11],
            ]) as usize;
            pos += 12;
            chunk_bounds.push((chunk_id, chunk_offset));

            match chunk_id {
                CHUNK_PACK_NAMES => pack_names_offset = Some(chunk_offset),
                CHUNK_OID_FANOUT => fanout_offset = Some(chunk_offset),
                CHUNK_OID_LOOKUP => oid_offset = Some(chunk_offset),
                CHUNK_OBJECT_OFFSETS => offsets_offset = Some(chunk_offset),
                CHUNK_LARGE_OFFSETS => large_offsets_offset = Some(chunk_offset),
                0 => break, // terminator
                _ => {}     // unknown chunks are ignored
            }
        }

        let pack_names_offset = pack_names_offset
            .ok_or_else(|| PackError::InvalidMidx("missing pack names chunk".into()))?;
        let fanout_offset =
            fanout_offset.ok_or_else(|| PackError::InvalidMidx("missing OID fanout chunk".into()))?;
        let oid_offset =
            oid_offset.ok_or_else(|| PackError::InvalidMidx("missing OID lookup chunk".into()))?;
        let offsets_offset = offsets_offset
            .ok_or_else(|| PackError::InvalidMidx("missing object offsets chunk".into()))?;

        if fanout_offset + 1024 > data.len() {
            return Err(PackError::InvalidMidx("truncated fanout table".into()));
        }
        let fanout = FanoutTable::from_bytes(&data[fanout_offset..fanout_offset + 1024])
            .map_err(|e| PackError::InvalidMidx(e.to_string()))?;
        let num_objects = fanout.total();

        // The PNAM chunk ends where the next chunk begins.
        let pnam_end = chunk_bounds
            .iter()
            .map(|&(_, off)| off)
            .filter(|&off| off > pack_names_offset)
            .min()
            .unwrap_or(data.len());
        let pack_stems = parse_pack_names(&data[pack_names_offset..pnam_end]);

        if pack_stems.len() != num_packs as usize {
            return Err(PackError::InvalidMidx(format!(
                "header says {num_packs} packs, PNAM lists {}",
                pack_stems.len()
            )));
        }

        for stem in &pack_stems {
            let pack_path = pack_dir.join(format!("{stem}.pack"));
            if !pack_path.is_file() {
                return Err(PackError::MidxMissingPack(stem.clone()));
            }
        }

        Ok(Self {
            data,
            fanout,
            num_objects,
            num_packs,
            pack_stems,
            hash_algo,
            oid_offset,
            offsets_offset,
            large_offsets_offset,
            midx_path,
        })
    }

    /// Look up a full OID across all covered packs.
    pub fn lookup(&self, oid: &ObjectId) -> Option<MidxEntry> {
        self.index_of(oid).map(|i| self.entry_at(i))
    }

    /// Binary-search a full OID, returning its midx ordinal.
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

    /// Resolve an abbreviated prefix to a unique midx ordinal.
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

    /// All OIDs matching an abbreviated prefix.
    pub fn find_prefix(&self, prefix: &HashPrefix) -> Vec<ObjectId> {
        self.prefix_ordinals(prefix)
            .into_iter()
            .map(|i| self.oid_at(i))
            .collect()
    }

    fn prefix_ordinals(&self, prefix: &HashPrefix) -> Vec<u32> {
        self.fanout
            .range(prefix.first_byte())
            .filter(|&i| prefix.matches_bytes(self.oid_bytes_at(i)))
            .map(|i| i as u32)
            .collect()
    }

    /// The OID at a midx ordinal.
    pub fn oid_at(&self, index: u32) -> ObjectId {
        ObjectId::from_bytes(self.oid_bytes_at(index as usize), self.hash_algo)
            .expect("midx bounds checked at open")
    }

    /// The `(pack, offset)` pair at a midx ordinal.
    pub fn entry_at(&self, index: u32) -> MidxEntry {
        let pos = self.offsets_offset + index as usize * 8;
        let pack_index =
            u32::from_be_bytes([self.data[pos], self.data[pos + 1], self.data[pos + 2], self.data[pos + 3]]);
        let offset_val = u32::from_be_bytes([
            self.data[pos + 4],
            self.data[pos + 5],
            self.data[pos + 6],
            self.data[pos + 7],
        ]);

        let offset = if offset_val & 0x8000_0000 != 0 {
            match self.large_offsets_offset {
                Some(lo) => {
                    let p = lo + (offset_val & 0x7fff_ffff) as usize * 8;
                    u64::from_be_bytes([
                        self.data[p],
                        self.data[p + 1],
                        self.data[p + 2],
                        self.data[p + 3],
                        self.data[p + 4],
                        self.data[p + 5],
                        self.data[p + 6],
                        self.data[p + 7],
                    ])
                }
                // A set high bit without a LOFF chunk is malformed; the
                // short value is the best available answer.
                None => offset_val as u64,
            }
        } else {
            offset_val as u64
        };

        MidxEntry { pack_index, offset }
    }

    /// Number of objects across all covered packs.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// Number of packs this midx covers.
    pub fn num_packs(&self) -> u32 {
        self.num_packs
    }

    /// Pack name stems (no extension), in pack-ordinal order.
    pub fn pack_stems(&self) -> &[String] {
        &self.pack_stems
    }

    /// Whether the pack with the given name stem is covered by this midx.
    pub fn covers(&self, stem: &str) -> bool {
        self.pack_stems.iter().any(|s| s == stem)
    }

    /// Path to the multi-pack-index file.
    pub fn path(&self) -> &Path {
        &self.midx_path
    }

    fn oid_bytes_at(&self, index: usize) -> &[u8] {
        let hash_len = self.hash_algo.digest_len();
        let start = self.oid_offset + index * hash_len;
        &self.data[start..start + hash_len]
    }
}

/// Parse NUL-separated pack names, normalizing to the name stem.
///
/// Writers disagree on whether PNAM stores `pack-….idx` or `pack-….pack`
/// names; stripping the extension makes the stem the identity either way.
fn parse_pack_names(data: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    for chunk in data.split(|&b| b == 0) {
        if chunk.is_empty() {
            continue;
        }
        if let Ok(name) = std::str::from_utf8(chunk) {
            let stem = name
                .strip_suffix(".idx")
                .or_else(|| name.strip_suffix(".pack"))
                .unwrap_or(name);
            names.push(stem.to_string());
        }
    }
    names
}
