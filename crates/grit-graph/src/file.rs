//! Single commit-graph file parsing.
//!
//! Layout:
//!
//! ```text
//! Header: CGPH (4) | version (1) | hash version (1) | chunk count (1)
//!         | base graph count (1)
//! Chunk table: [chunk id (4) | offset (8)] × chunk count + terminator
//! Chunks: OIDF (fanout), OIDL (sorted OIDs), CDAT (commit rows),
//!         EDGE (optional overflow parent lists for octopus merges)
//! ```
//!
//! A CDAT row is `tree OID | parent1 (4) | parent2 (4) | generation and
//! high time bits (4) | low time bits (4)`. Commit time is 34 bits wide.

use std::path::Path;

use grit_hash::fanout::FanoutTable;
use grit_hash::{HashAlgorithm, ObjectId};
use memmap2::Mmap;

use crate::GraphError;

const GRAPH_SIGNATURE: &[u8; 4] = b"CGPH";
const GRAPH_VERSION: u8 = 1;

const CHUNK_OID_FANOUT: u32 = 0x4f49_4446; // "OIDF"
const CHUNK_OID_LOOKUP: u32 = 0x4f49_444c; // "OIDL"
const CHUNK_COMMIT_DATA: u32 = 0x4344_4154; // "CDAT"
const CHUNK_EXTRA_EDGES: u32 = 0x4544_4745; // "EDGE"

/// Sentinel parent value: no parent in this slot.
pub(crate) const PARENT_NONE: u32 = 0x7000_0000;
/// High bit of parent2: the value is an EDGE-chunk index, not a position.
pub(crate) const PARENT_EXTRA_EDGE: u32 = 0x8000_0000;
/// High bit of an EDGE entry: last parent in the overflow list.
const EDGE_LAST: u32 = 0x8000_0000;

/// A decoded CDAT row.
#[derive(Debug, Clone)]
pub struct CommitRow {
    pub tree_id: ObjectId,
    pub(crate) parent1: u32,
    pub(crate) parent2: u32,
    pub generation: u32,
    pub commit_time: i64,
}

/// One memory-mapped commit-graph file (a single graph or a chain layer).
#[derive(Debug)]
pub struct GraphFile {
    data: Mmap,
    fanout: FanoutTable,
    num_commits: u32,
    oid_lookup_offset: usize,
    commit_data_offset: usize,
    extra_edges_offset: Option<usize>,
    hash_algo: HashAlgorithm,
}

impl GraphFile {
    /// Open and validate a commit-graph file.
    pub fn open(path: &Path) -> Result<Self, GraphError> {
        let file = std::fs::File::open(path)?;
        let data = unsafe { Mmap::map(&file)? };

        if data.len() < 8 {
            return Err(GraphError::InvalidGraph("file too small".into()));
        }
        if &data[0..4] != GRAPH_SIGNATURE {
            return Err(GraphError::InvalidGraph("bad signature".into()));
        }
        if data[4] != GRAPH_VERSION {
            return Err(GraphError::InvalidGraph(format!(
                "unsupported version {}",
                data[4]
            )));
        }
        let hash_algo = HashAlgorithm::from_version_byte(data[5]).ok_or_else(|| {
            GraphError::InvalidGraph(format!("unsupported hash version {}", data[5]))
        })?;
        let num_chunks = data[6] as usize;

        let toc_start = 8;
        let toc_entry = 12;
        if data.len() < toc_start + (num_chunks + 1) * toc_entry {
            return Err(GraphError::InvalidGraph("truncated chunk table".into()));
        }

        let mut fanout_offset: Option<usize> = None;
        let mut oid_lookup_offset: Option<usize> = None;
        let mut commit_data_offset: Option<usize> = None;
        let mut extra_edges_offset: Option<usize> = None;

        for i in 0..num_chunks {
            let at = toc_start + i * toc_entry;
            let chunk_id =
                u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
            let offset = u64::from_be_bytes([
                data[at + 4],
                data[at + 5],
                data[at + 6],
                data[at + 7],
                data[at + 8],
                data[at + 9],
                data[at + 10],
                data[at + 11],
            ]) as usize;

            match chunk_id {
                CHUNK_OID_FANOUT => fanout_offset = Some(offset),
                CHUNK_OID_LOOKUP => oid_lookup_offset = Some(offset),
                CHUNK_COMMIT_DATA => commit_data_offset = Some(offset),
                CHUNK_EXTRA_EDGES => extra_edges_offset = Some(offset),
                _ => {} // unknown chunks are ignored
            }
        }

        let fanout_offset = fanout_offset
            .ok_or_else(|| GraphError::InvalidGraph("missing OID fanout chunk".into()))?;
        let oid_lookup_offset = oid_lookup_offset
            .ok_or_else(|| GraphError::InvalidGraph("missing OID lookup chunk".into()))?;
        let commit_data_offset = commit_data_offset
            .ok_or_else(|| GraphError::InvalidGraph("missing commit data chunk".into()))?;

        if fanout_offset + 1024 > data.len() {
            return Err(GraphError::InvalidGraph("truncated fanout table".into()));
        }
        let fanout = FanoutTable::from_bytes(&data[fanout_offset..fanout_offset + 1024])
            .map_err(|e| GraphError::InvalidGraph(e.to_string()))?;
        let num_commits = fanout.total();

        let hash_len = hash_algo.digest_len();
        let needed = commit_data_offset + num_commits as usize * (hash_len + 16);
        if data.len() < needed {
            return Err(GraphError::InvalidGraph("truncated commit data".into()));
        }

        Ok(Self {
            data,
            fanout,
            num_commits,
            oid_lookup_offset,
            commit_data_offset,
            extra_edges_offset,
            hash_algo,
        })
    }

    /// Number of commits in this file.
    pub fn num_commits(&self) -> u32 {
        self.num_commits
    }

    /// The hash algorithm declared by the header.
    pub fn hash_algo(&self) -> HashAlgorithm {
        self.hash_algo
    }

    /// Binary-search the OID table for a commit's local position.
    pub fn local_position_of(&self, id: &ObjectId) -> Option<u32> {
        let range = self.fanout.range(id.first_byte());
        let target = id.as_bytes();

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

    /// The OID at a local position.
    pub fn oid_at(&self, position: u32) -> Option<ObjectId> {
        if position >= self.num_commits {
            return None;
        }
        ObjectId::from_bytes(self.oid_bytes_at(position as usize), self.hash_algo).ok()
    }

    /// Decode the CDAT row at a local position.
    pub fn commit_row(&self, position: u32) -> Result<CommitRow, GraphError> {
        if position >= self.num_commits {
            return Err(GraphError::InvalidGraph(format!(
                "commit position {position} out of range ({})",
                self.num_commits
            )));
        }
        let hash_len = self.hash_algo.digest_len();
        let row_size = hash_len + 16;
        let at = self.commit_data_offset + position as usize * row_size;

        let tree_id = ObjectId::from_bytes(&self.data[at..at + hash_len], self.hash_algo)?;

        let parent1 = self.read_u32(at + hash_len);
        let parent2 = self.read_u32(at + hash_len + 4);
        let gen_word = self.read_u32(at + hash_len + 8);
        let time_low = self.read_u32(at + hash_len + 12);

        // 34-bit commit time: low 2 bits of the generation word are the
        // high bits.
        let commit_time = (((gen_word & 0x3) as i64) << 32) | time_low as i64;
        let generation = gen_word >> 2;

        Ok(CommitRow {
            tree_id,
            parent1,
            parent2,
            generation,
            commit_time,
        })
    }

    /// The (global) parent positions of a commit row, following the EDGE
    /// overflow list for octopus merges.
    pub fn parent_positions(&self, row: &CommitRow) -> Result<Vec<u32>, GraphError> {
        let mut positions = Vec::with_capacity(2);

        if row.parent1 != PARENT_NONE {
            positions.push(row.parent1);
        }

        if row.parent2 == PARENT_NONE {
            return Ok(positions);
        }

        if row.parent2 & PARENT_EXTRA_EDGE == 0 {
            positions.push(row.parent2);
            return Ok(positions);
        }

        // Overflow: parent2's low bits index the EDGE chunk; entries run
        // until one carries the last-entry bit.
        let edges_offset = self.extra_edges_offset.ok_or_else(|| {
            GraphError::InvalidGraph("octopus parents without EDGE chunk".into())
        })?;
        let mut index = (row.parent2 & !PARENT_EXTRA_EDGE) as usize;
        loop {
            let at = edges_offset + index * 4;
            if at + 4 > self.data.len() {
                return Err(GraphError::InvalidGraph(
                    "EDGE list runs past end of file".into(),
                ));
            }
            let value = self.read_u32(at);
            positions.push(value & !EDGE_LAST);
            if value & EDGE_LAST != 0 {
                return Ok(positions);
            }
            index += 1;
        }
    }

    fn read_u32(&self, at: usize) -> u32 {
        u32::from_be_bytes([
            self.data[at],
            self.data[at + 1],
            self.data[at + 2],
            self.data[at + 3],
        ])
    }

    fn oid_bytes_at(&self, index: usize) -> &[u8] {
        let hash_len = self.hash_algo.digest_len();
        let start = self.oid_lookup_offset + index * hash_len;
        &self.data[start..start + hash_len]
    }
}
