//! The unified object resolver.
//!
//! One lookup surface over every on-disk object source: loose files, pack
//! files reached through their indices or a multi-pack index, and the
//! commit-graph as a metadata fast path. Search order is loose first, then
//! pack sources in manager order (midx before standalone indices).
//!
//! Strict reads that miss force one pack re-scan before reporting
//! `NotFound`, which covers the window where a concurrent repack moves an
//! object from a deleted pack into a new one.

pub mod cache;
mod prefix;

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use grit_graph::{CommitGraph, LogEntry};
use grit_hash::{HashAlgorithm, HashPrefix, ObjectId};
use grit_loose::LooseStore;
use grit_object::{Blob, Commit, Object, ObjectType, RawObject, Tag, Tree};
use grit_pack::manager::PackManager;
use grit_pack::{PackError, PackedObject, MAX_DELTA_CHAIN_DEPTH};

use cache::{CacheFamily, CacheValue, TtlCache};

/// Default sliding TTL for cached entries.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(120);
/// Default cache slot capacity.
pub const DEFAULT_CACHE_CAPACITY: usize = 2048;

/// Errors from resolver lookups.
#[derive(Debug, thiserror::Error)]
pub enum OdbError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("no object matches prefix {0}")]
    PrefixNotFound(String),

    #[error("ambiguous object prefix {prefix}: matches {count} objects")]
    Ambiguous { prefix: String, count: usize },

    #[error("corrupt object {oid}: {reason}")]
    Corrupt { oid: ObjectId, reason: String },

    #[error("object {oid} is a {actual}, expected {expected}")]
    UnexpectedKind {
        oid: ObjectId,
        expected: ObjectType,
        actual: ObjectType,
    },

    #[error(transparent)]
    Loose(#[from] grit_loose::LooseError),

    #[error(transparent)]
    Pack(#[from] PackError),

    #[error(transparent)]
    Graph(#[from] grit_graph::GraphError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The unified object resolver for one repository.
///
/// Cheap to share behind an `Arc`; every method takes `&self` and is safe
/// under concurrent callers.
pub struct ObjectStore {
    loose: LooseStore,
    packs: PackManager,
    graph: Option<CommitGraph>,
    cache: Mutex<TtlCache>,
    hash_algo: HashAlgorithm,
}

impl ObjectStore {
    /// Open the resolver over an `objects/` directory.
    pub fn open(objects_dir: impl AsRef<Path>) -> Result<Self, OdbError> {
        Self::open_with_algo(objects_dir, HashAlgorithm::Sha1)
    }

    /// Open with an explicit hash algorithm.
    pub fn open_with_algo(
        objects_dir: impl AsRef<Path>,
        hash_algo: HashAlgorithm,
    ) -> Result<Self, OdbError> {
        let objects_dir = objects_dir.as_ref();
        // A malformed commit-graph is advisory data: ignore it and fall
        // back to parsing commits.
        let graph = CommitGraph::open_in_objects_dir(objects_dir).unwrap_or(None);

        Ok(Self {
            loose: LooseStore::open(objects_dir, hash_algo),
            packs: PackManager::new(objects_dir.join("pack")),
            graph,
            cache: Mutex::new(TtlCache::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)),
            hash_algo,
        })
    }

    /// The hash algorithm in use.
    pub fn hash_algo(&self) -> HashAlgorithm {
        self.hash_algo
    }

    /// The loose store (header-only and streaming reads go through here).
    pub fn loose(&self) -> &LooseStore {
        &self.loose
    }

    /// The pack manager.
    pub fn packs(&self) -> &PackManager {
        &self.packs
    }

    /// The commit-graph, if the repository has a usable one.
    pub fn commit_graph(&self) -> Option<&CommitGraph> {
        self.graph.as_ref()
    }

    /// Force a pack re-scan. Call after an external tool mutated the
    /// repository (commit, fetch, gc).
    pub fn refresh(&self) -> Result<(), OdbError> {
        self.packs.refresh(true)?;
        Ok(())
    }

    /// Whether the object exists in any source (no payload inflation for
    /// packed objects).
    pub fn contains(&self, id: &ObjectId) -> bool {
        if self.loose.contains(id) {
            return true;
        }
        match self.packs.sources() {
            Ok(sources) => sources.iter().any(|s| s.contains(id)),
            Err(_) => false,
        }
    }

    /// Read raw bytes, strict: a miss forces one pack refresh and retry
    /// before `NotFound` surfaces.
    pub fn read_raw(&self, id: &ObjectId) -> Result<RawObject, OdbError> {
        match self.try_read_raw(id)? {
            Some(raw) => Ok(raw),
            None => {
                self.packs.refresh(true)?;
                self.try_read_raw(id)?.ok_or(OdbError::NotFound(*id))
            }
        }
    }

    /// Read raw bytes, returning `None` on a miss (no forced refresh).
    pub fn try_read_raw(&self, id: &ObjectId) -> Result<Option<RawObject>, OdbError> {
        if let Some(CacheValue::Raw(raw)) = self.cache_get(id, CacheFamily::Raw) {
            return Ok(Some(raw));
        }

        let raw = self.load_raw(id)?;
        if let Some(ref raw) = raw {
            self.cache_put(*id, CacheFamily::Raw, CacheValue::Raw(raw.clone()));
        }
        Ok(raw)
    }

    /// Read and parse an object, strict.
    pub fn read(&self, id: &ObjectId) -> Result<Object, OdbError> {
        match self.try_read(id)? {
            Some(obj) => Ok(obj),
            None => {
                self.packs.refresh(true)?;
                self.try_read(id)?.ok_or(OdbError::NotFound(*id))
            }
        }
    }

    /// Read and parse an object, returning `None` on a miss.
    pub fn try_read(&self, id: &ObjectId) -> Result<Option<Object>, OdbError> {
        if let Some(CacheValue::Parsed(obj)) = self.cache_get(id, CacheFamily::Parsed) {
            return Ok(Some(obj));
        }

        let Some(raw) = self.try_read_raw(id)? else {
            return Ok(None);
        };
        let obj = raw.parse().map_err(|e| OdbError::Corrupt {
            oid: *id,
            reason: e.to_string(),
        })?;
        self.cache_put(*id, CacheFamily::Parsed, CacheValue::Parsed(obj.clone()));
        Ok(Some(obj))
    }

    /// Read just kind and size, without payload materialization for loose
    /// objects.
    pub fn read_header(&self, id: &ObjectId) -> Result<Option<(ObjectType, usize)>, OdbError> {
        if let Some(header) = self.loose.read_header(id)? {
            return Ok(Some(header));
        }
        Ok(self.try_read_raw(id)?.map(|raw| (raw.kind, raw.data.len())))
    }

    /// Typed read: commit.
    pub fn read_commit(&self, id: &ObjectId) -> Result<Commit, OdbError> {
        match self.read(id)? {
            Object::Commit(c) => Ok(c),
            other => Err(self.unexpected(id, ObjectType::Commit, &other)),
        }
    }

    /// Typed read: tree.
    pub fn read_tree(&self, id: &ObjectId) -> Result<Tree, OdbError> {
        match self.read(id)? {
            Object::Tree(t) => Ok(t),
            other => Err(self.unexpected(id, ObjectType::Tree, &other)),
        }
    }

    /// Typed read: blob.
    pub fn read_blob(&self, id: &ObjectId) -> Result<Blob, OdbError> {
        match self.read(id)? {
            Object::Blob(b) => Ok(b),
            other => Err(self.unexpected(id, ObjectType::Blob, &other)),
        }
    }

    /// Typed read: annotated tag.
    pub fn read_tag(&self, id: &ObjectId) -> Result<Tag, OdbError> {
        match self.read(id)? {
            Object::Tag(t) => Ok(t),
            other => Err(self.unexpected(id, ObjectType::Tag, &other)),
        }
    }

    /// Commit metadata, served from the commit-graph when possible and
    /// projected from a full commit parse otherwise.
    pub fn read_log_entry(&self, id: &ObjectId) -> Result<LogEntry, OdbError> {
        match self.try_read_log_entry(id)? {
            Some(entry) => Ok(entry),
            None => {
                self.packs.refresh(true)?;
                self.try_read_log_entry(id)?
                    .ok_or(OdbError::NotFound(*id))
            }
        }
    }

    /// Commit metadata, `None` on a miss.
    pub fn try_read_log_entry(&self, id: &ObjectId) -> Result<Option<LogEntry>, OdbError> {
        if let Some(CacheValue::Log(entry)) = self.cache_get(id, CacheFamily::Log) {
            return Ok(Some(entry));
        }

        let entry = match &self.graph {
            Some(graph) => graph.get(id)?,
            None => None,
        };
        let entry = match entry {
            Some(entry) => Some(entry),
            None => match self.try_read(id)? {
                Some(Object::Commit(commit)) => Some(LogEntry {
                    id: *id,
                    tree_id: commit.tree,
                    parents: commit.parents.clone(),
                    commit_time: commit.commit_time(),
                    generation: 0,
                }),
                Some(other) => {
                    return Err(self.unexpected(id, ObjectType::Commit, &other));
                }
                None => None,
            },
        };

        if let Some(ref entry) = entry {
            self.cache_put(*id, CacheFamily::Log, CacheValue::Log(entry.clone()));
        }
        Ok(entry)
    }

    // --- internals ---

    fn load_raw(&self, id: &ObjectId) -> Result<Option<RawObject>, OdbError> {
        if let Some(raw) = self.loose.read(id)? {
            return Ok(Some(raw));
        }

        match self.read_packed(id, 0)? {
            Some(packed) => Ok(Some(RawObject {
                kind: packed.kind,
                // Packed entries do not carry their own hash; the
                // requested id is stamped here.
                id: *id,
                data: packed.data,
            })),
            None => Ok(None),
        }
    }

    fn read_packed(&self, id: &ObjectId, depth: usize) -> Result<Option<PackedObject>, OdbError> {
        if depth >= MAX_DELTA_CHAIN_DEPTH {
            return Ok(None);
        }

        for source in self.packs.sources()? {
            let resolver = |base: &ObjectId| -> Option<(ObjectType, Vec<u8>)> {
                if let Ok(Some(raw)) = self.loose.read(base) {
                    return Some((raw.kind, raw.data));
                }
                match self.read_packed(base, depth + 1) {
                    Ok(Some(obj)) => Some((obj.kind, obj.data)),
                    _ => None,
                }
            };

            match source.read(id, &resolver) {
                Ok(Some(obj)) => return Ok(Some(obj)),
                Ok(None) => continue,
                // A delta base the whole repository cannot produce means
                // the pack is damaged, not that the object is absent.
                Err(PackError::MissingBase(base)) => {
                    return Err(OdbError::Corrupt {
                        oid: *id,
                        reason: format!("delta base {base} missing from repository"),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    fn unexpected(&self, id: &ObjectId, expected: ObjectType, actual: &Object) -> OdbError {
        OdbError::UnexpectedKind {
            oid: *id,
            expected,
            actual: actual.object_type(),
        }
    }

    fn cache_get(&self, id: &ObjectId, family: CacheFamily) -> Option<CacheValue> {
        self.cache.lock().unwrap().get(id, family)
    }

    fn cache_put(&self, id: ObjectId, family: CacheFamily, value: CacheValue) {
        self.cache.lock().unwrap().put(id, family, value);
    }
}
