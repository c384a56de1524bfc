//! Tree-to-tree comparison with rename detection.
//!
//! The differencer enumerates the blob entries present in exactly one of
//! two trees (skipping identical subtrees wholesale), classifies them by
//! path, then reclassifies add/remove pairs as renames: first by exact
//! content id, then by chunk-hash similarity scoring.

pub mod rename;
pub mod tree;

use bstr::BString;
use grit_hash::ObjectId;
use grit_object::TreeEntry;
use grit_odb::ObjectStore;
use grit_utils::CancelToken;

/// Errors from tree comparison.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Odb(#[from] grit_odb::OdbError),
}

/// The classification of one changed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    Renamed,
}

/// One entry in a change list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub old_path: Option<BString>,
    pub new_path: Option<BString>,
    pub old_entry: Option<TreeEntry>,
    pub new_entry: Option<TreeEntry>,
}

impl Change {
    /// The path this change sorts and displays under.
    pub fn path(&self) -> &BString {
        self.new_path
            .as_ref()
            .or(self.old_path.as_ref())
            .expect("a change always has at least one path")
    }
}

/// Options for tree comparison.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Similarity ratio in `[0, 1]` at or above which an add/remove pair
    /// becomes a rename. `None` disables similarity detection (exact-id
    /// renames are always detected).
    pub rename_threshold: Option<f64>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            rename_threshold: Some(0.5),
        }
    }
}

/// Compare two trees (either side may be absent, meaning empty).
///
/// The result is sorted by `new_path`, falling back to `old_path` for
/// removals. Comparing a tree to itself yields an empty list; swapping
/// the arguments inverts every change.
pub fn diff_trees(
    odb: &ObjectStore,
    old_tree: Option<&ObjectId>,
    new_tree: Option<&ObjectId>,
    options: &DiffOptions,
    cancel: &CancelToken,
) -> Result<Vec<Change>, DiffError> {
    let (old_side, new_side) = tree::divergent_blobs(odb, old_tree, new_tree, cancel)?;

    // Classify by path.
    let mut changes: Vec<Change> = Vec::new();
    let mut old_side = old_side;
    let mut new_side = new_side;

    let old_paths: Vec<BString> = old_side.keys().cloned().collect();
    for path in old_paths {
        let old_entry = old_side.remove(&path).expect("key just listed");
        match new_side.remove(&path) {
            Some(new_entry) => changes.push(Change {
                kind: ChangeKind::Modified,
                old_path: Some(path.clone()),
                new_path: Some(path),
                old_entry: Some(old_entry),
                new_entry: Some(new_entry),
            }),
            None => changes.push(Change {
                kind: ChangeKind::Removed,
                old_path: Some(path),
                new_path: None,
                old_entry: Some(old_entry),
                new_entry: None,
            }),
        }
    }
    for (path, new_entry) in new_side {
        changes.push(Change {
            kind: ChangeKind::Added,
            old_path: None,
            new_path: Some(path),
            old_entry: None,
            new_entry: Some(new_entry),
        });
    }

    rename::detect_same_id_renames(&mut changes);
    if let Some(threshold) = options.rename_threshold {
        rename::detect_similarity_renames(odb, &mut changes, threshold, cancel)?;
    }

    changes.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(changes)
}
