//! Pack-set management: discovery, refresh, and lookup ordering.
//!
//! The manager owns every open index/pack reader under `objects/pack/`.
//! Its source list is replaced copy-on-write on refresh: readers for files
//! that vanished are dropped when the last in-flight lookup releases its
//! `Arc`, and surviving readers are reused rather than re-mapped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use grit_hash::{HashPrefix, ObjectId};

use crate::index::PackIndex;
use crate::midx::MultiPackIndex;
use crate::pack::PackFile;
use crate::{BaseResolver, PackError, PackedObject};

/// A standalone `.idx` + `.pack` pair.
pub struct IdxSource {
    pub index: PackIndex,
    pub pack: PackFile,
    stem: String,
}

impl IdxSource {
    /// The pack name stem (file name without extension).
    pub fn stem(&self) -> &str {
        &self.stem
    }
}

/// A multi-pack index together with the packs it routes to.
pub struct MidxSource {
    pub midx: MultiPackIndex,
    /// Packs in midx pack-ordinal order.
    pub packs: Vec<PackFile>,
}

/// One place an object lookup can be answered from.
///
/// The manager yields the midx first (when present), then each live
/// standalone index; that order fixes tie-breaking for abbreviated-hash
/// ambiguity checks.
#[derive(Clone)]
pub enum PackSource {
    Midx(Arc<MidxSource>),
    Idx(Arc<IdxSource>),
}

impl PackSource {
    /// Whether this source knows the OID.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        match self {
            Self::Midx(s) => s.midx.lookup(oid).is_some(),
            Self::Idx(s) => s.index.lookup(oid).is_some(),
        }
    }

    /// Read and reconstruct an object, if this source has it.
    pub fn read(
        &self,
        oid: &ObjectId,
        resolver: BaseResolver<'_>,
    ) -> Result<Option<PackedObject>, PackError> {
        match self {
            Self::Midx(s) => match s.midx.lookup(oid) {
                Some(entry) => {
                    let pack = s
                        .packs
                        .get(entry.pack_index as usize)
                        .ok_or_else(|| {
                            PackError::InvalidMidx(format!(
                                "entry routes to pack {} of {}",
                                entry.pack_index,
                                s.packs.len()
                            ))
                        })?;
                    pack.read_at_offset(entry.offset, resolver).map(Some)
                }
                None => Ok(None),
            },
            Self::Idx(s) => match s.index.lookup(oid) {
                Some(offset) => s.pack.read_at_offset(offset, resolver).map(Some),
                None => Ok(None),
            },
        }
    }

    /// All OIDs in this source matching an abbreviated prefix.
    pub fn find_prefix(&self, prefix: &HashPrefix) -> Vec<ObjectId> {
        match self {
            Self::Midx(s) => s.midx.find_prefix(prefix),
            Self::Idx(s) => s.index.find_prefix(prefix),
        }
    }
}

#[derive(Default)]
struct ManagerState {
    refreshed: bool,
    midx: Option<Arc<MidxSource>>,
    standalone: Vec<Arc<IdxSource>>,
}

/// Discovers and owns the index readers under one `objects/pack/` directory.
pub struct PackManager {
    pack_dir: PathBuf,
    state: RwLock<ManagerState>,
}

impl PackManager {
    /// Create a manager for `objects/pack/`. No files are opened until the
    /// first refresh or access.
    pub fn new(pack_dir: impl AsRef<Path>) -> Self {
        Self {
            pack_dir: pack_dir.as_ref().to_path_buf(),
            state: RwLock::new(ManagerState::default()),
        }
    }

    /// The directory this manager scans.
    pub fn pack_dir(&self) -> &Path {
        &self.pack_dir
    }

    /// Re-scan the pack directory.
    ///
    /// A no-op unless `force` is set or no scan has happened yet. Readers
    /// whose files survived are reused; the rest are dropped with the old
    /// state. A midx that fails to load (typically because a pack it lists
    /// was deleted by a repack) is discarded and the standalone indices
    /// take over.
    pub fn refresh(&self, force: bool) -> Result<(), PackError> {
        {
            let state = self.state.read().unwrap();
            if state.refreshed && !force {
                return Ok(());
            }
        }

        let mut new_state = ManagerState {
            refreshed: true,
            midx: None,
            standalone: Vec::new(),
        };

        let midx_path = self.pack_dir.join("multi-pack-index");
        if midx_path.is_file() {
            if let Ok(midx) = MultiPackIndex::open(&midx_path, &self.pack_dir) {
                let mut packs = Vec::with_capacity(midx.pack_stems().len());
                let mut all_open = true;
                for stem in midx.pack_stems() {
                    match PackFile::open(self.pack_dir.join(format!("{stem}.pack"))) {
                        Ok(pack) => packs.push(pack),
                        Err(_) => {
                            all_open = false;
                            break;
                        }
                    }
                }
                if all_open {
                    new_state.midx = Some(Arc::new(MidxSource { midx, packs }));
                }
            }
        }

        // Reuse surviving standalone readers by stem.
        let previous: HashMap<String, Arc<IdxSource>> = {
            let state = self.state.read().unwrap();
            state
                .standalone
                .iter()
                .map(|s| (s.stem.clone(), s.clone()))
                .collect()
        };

        let mut stems = self.idx_stems()?;
        stems.sort();
        for stem in stems {
            if let Some(ref midx) = new_state.midx {
                if midx.midx.covers(&stem) {
                    continue;
                }
            }
            if let Some(existing) = previous.get(&stem) {
                new_state.standalone.push(existing.clone());
                continue;
            }
            let idx_path = self.pack_dir.join(format!("{stem}.idx"));
            let pack_path = self.pack_dir.join(format!("{stem}.pack"));
            if !pack_path.is_file() {
                continue;
            }
            match (PackIndex::open(&idx_path), PackFile::open(&pack_path)) {
                (Ok(index), Ok(pack)) => {
                    new_state.standalone.push(Arc::new(IdxSource {
                        index,
                        pack,
                        stem,
                    }));
                }
                // A corrupt pair is skipped; other sources may still
                // serve the object.
                _ => continue,
            }
        }

        *self.state.write().unwrap() = new_state;
        Ok(())
    }

    /// The lookup sources in search order: midx first, then standalone
    /// indices sorted by name.
    ///
    /// Performs the initial scan lazily on first call.
    pub fn sources(&self) -> Result<Vec<PackSource>, PackError> {
        self.refresh(false)?;
        let state = self.state.read().unwrap();
        let mut out = Vec::with_capacity(1 + state.standalone.len());
        if let Some(ref midx) = state.midx {
            out.push(PackSource::Midx(midx.clone()));
        }
        for idx in &state.standalone {
            out.push(PackSource::Idx(idx.clone()));
        }
        Ok(out)
    }

    /// Drop every active reader. The next access re-scans the directory.
    pub fn clear(&self) {
        *self.state.write().unwrap() = ManagerState::default();
    }

    fn idx_stems(&self) -> Result<Vec<String>, PackError> {
        if !self.pack_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut stems = Vec::new();
        for entry in std::fs::read_dir(&self.pack_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "idx") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    stems.push(stem.to_string());
                }
            }
        }
        Ok(stems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::encode_entry_header;
    use crate::midx::tests::build_midx_bytes;
    use crate::{PACK_SIGNATURE, PACK_VERSION};
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use grit_hash::fanout::FanoutTable;
    use grit_hash::hasher::Hasher;
    use grit_hash::HashAlgorithm;
    use grit_object::ObjectType;
    use std::io::Write;

    fn no_external(_oid: &ObjectId) -> Option<(ObjectType, Vec<u8>)> {
        None
    }

    /// Write `<stem>.pack` + `<stem>.idx` holding the given blobs.
    /// Returns the OIDs with their in-pack offsets.
    fn write_pack_pair(dir: &Path, stem: &str, blobs: &[&[u8]]) -> Vec<(ObjectId, u64)> {
        let mut pack = Vec::new();
        pack.extend_from_slice(PACK_SIGNATURE);
        pack.extend_from_slice(&PACK_VERSION.to_be_bytes());
        pack.extend_from_slice(&(blobs.len() as u32).to_be_bytes());

        let mut located = Vec::new();
        let mut crcs = Vec::new();
        for content in blobs {
            let offset = pack.len() as u64;
            let oid = Hasher::hash_object(HashAlgorithm::Sha1, "blob", content);

            pack.extend_from_slice(&encode_entry_header(3, content.len() as u64));
            let mut enc = ZlibEncoder::new(&mut pack, Compression::default());
            enc.write_all(content).unwrap();
            enc.finish().unwrap();

            // CRC over the raw entry bytes (header + compressed data).
            let mut crc = crc32fast::Hasher::new();
            crc.update(&pack[offset as usize..]);
            crcs.push(crc.finalize());
            located.push((oid, offset));
        }
        let checksum = Hasher::digest(HashAlgorithm::Sha1, &pack);
        pack.extend_from_slice(checksum.as_bytes());
        std::fs::write(dir.join(format!("{stem}.pack")), &pack).unwrap();

        // Index.
        let mut sorted: Vec<(ObjectId, u64, u32)> = located
            .iter()
            .zip(crcs)
            .map(|(&(oid, offset), crc)| (oid, offset, crc))
            .collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut idx = Vec::new();
        idx.extend_from_slice(&crate::IDX_SIGNATURE);
        idx.extend_from_slice(&crate::IDX_VERSION.to_be_bytes());
        let oids: Vec<ObjectId> = sorted.iter().map(|e| e.0).collect();
        let fanout = FanoutTable::build(&oids);
        for b in 0..=255u8 {
            idx.extend_from_slice(&(fanout.range(b).end as u32).to_be_bytes());
        }
        for (oid, _, _) in &sorted {
            idx.extend_from_slice(oid.as_bytes());
        }
        for (_, _, crc) in &sorted {
            idx.extend_from_slice(&crc.to_be_bytes());
        }
        for (_, offset, _) in &sorted {
            idx.extend_from_slice(&(*offset as u32).to_be_bytes());
        }
        idx.extend_from_slice(checksum.as_bytes());
        let idx_checksum = Hasher::digest(HashAlgorithm::Sha1, &idx);
        idx.extend_from_slice(idx_checksum.as_bytes());
        std::fs::write(dir.join(format!("{stem}.idx")), &idx).unwrap();

        located
    }

    #[test]
    fn index_crc_column_matches_entry_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let located = write_pack_pair(dir.path(), "pack-crc", &[b"crc checked content"]);

        let idx = crate::index::PackIndex::open(dir.path().join("pack-crc.idx")).unwrap();
        let pack = std::fs::read(dir.path().join("pack-crc.pack")).unwrap();

        let ordinal = idx.index_of(&located[0].0).unwrap();
        let entry_start = located[0].1 as usize;
        // The sole entry runs to the trailing checksum.
        let entry_bytes = &pack[entry_start..pack.len() - 20];

        let mut crc = crc32fast::Hasher::new();
        crc.update(entry_bytes);
        assert_eq!(idx.crc32_at(ordinal), crc.finalize());
    }

    #[test]
    fn discovers_standalone_indices() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_pack_pair(dir.path(), "pack-aaa", &[b"object one"]);
        let b = write_pack_pair(dir.path(), "pack-bbb", &[b"object two"]);

        let manager = PackManager::new(dir.path());
        let sources = manager.sources().unwrap();
        assert_eq!(sources.len(), 2);

        for (oid, _) in a.iter().chain(b.iter()) {
            assert!(sources.iter().any(|s| s.contains(oid)));
        }
    }

    #[test]
    fn midx_supersedes_covered_idx() {
        let dir = tempfile::tempdir().unwrap();
        let covered = write_pack_pair(dir.path(), "pack-covered", &[b"covered object"]);
        let free = write_pack_pair(dir.path(), "pack-free", &[b"free object"]);

        let midx_entries: Vec<(ObjectId, u32, u64)> =
            covered.iter().map(|(oid, off)| (*oid, 0, *off)).collect();
        let midx = build_midx_bytes(&midx_entries, &["pack-covered.idx"]);
        std::fs::write(dir.path().join("multi-pack-index"), &midx).unwrap();

        let manager = PackManager::new(dir.path());
        let sources = manager.sources().unwrap();

        // Midx first, then only the uncovered idx.
        assert_eq!(sources.len(), 2);
        assert!(matches!(sources[0], PackSource::Midx(_)));
        match &sources[1] {
            PackSource::Idx(idx) => assert_eq!(idx.stem(), "pack-free"),
            _ => panic!("expected standalone idx"),
        }

        let obj = sources[0].read(&covered[0].0, &no_external).unwrap().unwrap();
        assert_eq!(obj.data, b"covered object");
        let obj = sources[1].read(&free[0].0, &no_external).unwrap().unwrap();
        assert_eq!(obj.data, b"free object");
    }

    #[test]
    fn duplicate_object_served_by_midx_then_surviving_pack() {
        let dir = tempfile::tempdir().unwrap();
        // The same blob packed twice.
        let p1 = write_pack_pair(dir.path(), "pack-p1", &[b"duplicated payload"]);
        let p2 = write_pack_pair(dir.path(), "pack-p2", &[b"duplicated payload"]);
        assert_eq!(p1[0].0, p2[0].0);
        let oid = p1[0].0;

        // Midx covers both packs, routing the object to P1 (pack ordinal 0).
        let midx = build_midx_bytes(
            &[(oid, 0, p1[0].1)],
            &["pack-p1.idx", "pack-p2.idx"],
        );
        std::fs::write(dir.path().join("multi-pack-index"), &midx).unwrap();

        let manager = PackManager::new(dir.path());
        let sources = manager.sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert!(matches!(sources[0], PackSource::Midx(_)));
        let obj = sources[0].read(&oid, &no_external).unwrap().unwrap();
        assert_eq!(obj.data, b"duplicated payload");

        // Delete P1: the midx goes stale and is discarded on refresh, and
        // the object is served from P2's standalone index.
        std::fs::remove_file(dir.path().join("pack-p1.pack")).unwrap();
        std::fs::remove_file(dir.path().join("pack-p1.idx")).unwrap();
        manager.refresh(true).unwrap();

        let sources = manager.sources().unwrap();
        assert_eq!(sources.len(), 1);
        match &sources[0] {
            PackSource::Idx(idx) => assert_eq!(idx.stem(), "pack-p2"),
            _ => panic!("stale midx should have been discarded"),
        }
        let obj = sources[0].read(&oid, &no_external).unwrap().unwrap();
        assert_eq!(obj.data, b"duplicated payload");
    }

    #[test]
    fn refresh_is_lazy_and_forceable() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PackManager::new(dir.path());
        assert_eq!(manager.sources().unwrap().len(), 0);

        // A pack added after the first scan is invisible until forced.
        write_pack_pair(dir.path(), "pack-new", &[b"late arrival"]);
        assert_eq!(manager.sources().unwrap().len(), 0);

        manager.refresh(true).unwrap();
        assert_eq!(manager.sources().unwrap().len(), 1);
    }

    #[test]
    fn readers_are_reused_across_refreshes() {
        let dir = tempfile::tempdir().unwrap();
        write_pack_pair(dir.path(), "pack-stable", &[b"stable"]);

        let manager = PackManager::new(dir.path());
        let before = manager.sources().unwrap();
        manager.refresh(true).unwrap();
        let after = manager.sources().unwrap();

        let (PackSource::Idx(a), PackSource::Idx(b)) = (&before[0], &after[0]) else {
            panic!("expected idx sources");
        };
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn clear_drops_all_readers() {
        let dir = tempfile::tempdir().unwrap();
        write_pack_pair(dir.path(), "pack-x", &[b"x"]);

        let manager = PackManager::new(dir.path());
        assert_eq!(manager.sources().unwrap().len(), 1);
        manager.clear();
        // clear() resets the scanned flag, so the next access re-scans.
        assert_eq!(manager.sources().unwrap().len(), 1);
    }

    #[test]
    fn missing_pack_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PackManager::new(dir.path().join("no-such-dir"));
        assert!(manager.sources().unwrap().is_empty());
    }
}
