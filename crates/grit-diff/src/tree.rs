//! Tree walking: divergence sets, full-blob enumeration, path lookup.

use std::collections::BTreeMap;

use bstr::{BStr, BString, ByteSlice};
use grit_hash::ObjectId;
use grit_object::{Tree, TreeEntry};
use grit_odb::ObjectStore;
use grit_utils::CancelToken;

use crate::DiffError;

/// The regular-file blob entries present in exactly one of the two trees,
/// keyed by slash-joined path.
///
/// A subtree with the same id on both sides is skipped without descending.
pub fn divergent_blobs(
    odb: &ObjectStore,
    old_tree: Option<&ObjectId>,
    new_tree: Option<&ObjectId>,
    cancel: &CancelToken,
) -> Result<(BTreeMap<BString, TreeEntry>, BTreeMap<BString, TreeEntry>), DiffError> {
    let mut old_out = BTreeMap::new();
    let mut new_out = BTreeMap::new();

    let old = read_opt_tree(odb, old_tree, cancel)?;
    let new = read_opt_tree(odb, new_tree, cancel)?;
    diff_entries(
        odb,
        old.as_ref().map_or(&[][..], |t| &t.entries),
        new.as_ref().map_or(&[][..], |t| &t.entries),
        &BString::from(""),
        cancel,
        &mut old_out,
        &mut new_out,
    )?;

    Ok((old_out, new_out))
}

/// Every regular-file blob entry under a tree, keyed by path.
pub fn all_blob_entries(
    odb: &ObjectStore,
    tree: &ObjectId,
    cancel: &CancelToken,
) -> Result<BTreeMap<BString, TreeEntry>, DiffError> {
    let mut out = BTreeMap::new();
    collect_subtree(odb, tree, &BString::from(""), cancel, &mut out)?;
    Ok(out)
}

/// The entry at a slash-separated path under a tree, descending through
/// subtrees. `None` when any component is absent.
pub fn entry_at_path(
    odb: &ObjectStore,
    tree: &ObjectId,
    path: &BStr,
) -> Result<Option<TreeEntry>, DiffError> {
    let mut current = odb.read_tree(tree)?;
    let mut components = path.split_str("/").peekable();

    while let Some(component) = components.next() {
        let Some(entry) = current.find(BStr::new(component)) else {
            return Ok(None);
        };
        if components.peek().is_none() {
            return Ok(Some(entry.clone()));
        }
        if !entry.mode.is_tree() {
            return Ok(None);
        }
        let next = odb.read_tree(&entry.oid)?;
        current = next;
    }
    Ok(None)
}

fn read_opt_tree(
    odb: &ObjectStore,
    tree: Option<&ObjectId>,
    cancel: &CancelToken,
) -> Result<Option<Tree>, DiffError> {
    check_cancel(cancel)?;
    match tree {
        Some(oid) => Ok(Some(odb.read_tree(oid)?)),
        None => Ok(None),
    }
}

fn check_cancel(cancel: &CancelToken) -> Result<(), DiffError> {
    if cancel.is_cancelled() {
        return Err(DiffError::Cancelled);
    }
    Ok(())
}

/// Pairwise walk over two sorted entry lists.
fn diff_entries(
    odb: &ObjectStore,
    old_entries: &[TreeEntry],
    new_entries: &[TreeEntry],
    prefix: &BString,
    cancel: &CancelToken,
    old_out: &mut BTreeMap<BString, TreeEntry>,
    new_out: &mut BTreeMap<BString, TreeEntry>,
) -> Result<(), DiffError> {
    check_cancel(cancel)?;

    let mut oi = 0;
    let mut ni = 0;
    while oi < old_entries.len() || ni < new_entries.len() {
        match (old_entries.get(oi), new_entries.get(ni)) {
            (Some(old_entry), Some(new_entry)) => {
                match TreeEntry::cmp_entries(old_entry, new_entry) {
                    std::cmp::Ordering::Less => {
                        collect_side(odb, old_entry, prefix, cancel, old_out)?;
                        oi += 1;
                    }
                    std::cmp::Ordering::Greater => {
                        collect_side(odb, new_entry, prefix, cancel, new_out)?;
                        ni += 1;
                    }
                    std::cmp::Ordering::Equal => {
                        descend_matched(odb, old_entry, new_entry, prefix, cancel, old_out, new_out)?;
                        oi += 1;
                        ni += 1;
                    }
                }
            }
            (Some(old_entry), None) => {
                collect_side(odb, old_entry, prefix, cancel, old_out)?;
                oi += 1;
            }
            (None, Some(new_entry)) => {
                collect_side(odb, new_entry, prefix, cancel, new_out)?;
                ni += 1;
            }
            (None, None) => break,
        }
    }
    Ok(())
}

/// Handle a name present on both sides.
fn descend_matched(
    odb: &ObjectStore,
    old_entry: &TreeEntry,
    new_entry: &TreeEntry,
    prefix: &BString,
    cancel: &CancelToken,
    old_out: &mut BTreeMap<BString, TreeEntry>,
    new_out: &mut BTreeMap<BString, TreeEntry>,
) -> Result<(), DiffError> {
    // Identical id and mode: nothing below can differ.
    if old_entry.oid == new_entry.oid && old_entry.mode == new_entry.mode {
        return Ok(());
    }

    let path = join_path(prefix, &old_entry.name);
    match (old_entry.mode.is_tree(), new_entry.mode.is_tree()) {
        (true, true) => {
            let old_tree = odb.read_tree(&old_entry.oid)?;
            let new_tree = odb.read_tree(&new_entry.oid)?;
            diff_entries(
                odb,
                &old_tree.entries,
                &new_tree.entries,
                &path,
                cancel,
                old_out,
                new_out,
            )
        }
        (true, false) => {
            collect_subtree(odb, &old_entry.oid, &path, cancel, old_out)?;
            record_blob(new_entry, &path, new_out);
            Ok(())
        }
        (false, true) => {
            record_blob(old_entry, &path, old_out);
            collect_subtree(odb, &new_entry.oid, &path, cancel, new_out)
        }
        (false, false) => {
            record_blob(old_entry, &path, old_out);
            record_blob(new_entry, &path, new_out);
            Ok(())
        }
    }
}

/// Record one side-only entry, recursing into subtrees.
fn collect_side(
    odb: &ObjectStore,
    entry: &TreeEntry,
    prefix: &BString,
    cancel: &CancelToken,
    out: &mut BTreeMap<BString, TreeEntry>,
) -> Result<(), DiffError> {
    let path = join_path(prefix, &entry.name);
    if entry.mode.is_tree() {
        collect_subtree(odb, &entry.oid, &path, cancel, out)
    } else {
        record_blob(entry, &path, out);
        Ok(())
    }
}

fn collect_subtree(
    odb: &ObjectStore,
    tree: &ObjectId,
    prefix: &BString,
    cancel: &CancelToken,
    out: &mut BTreeMap<BString, TreeEntry>,
) -> Result<(), DiffError> {
    check_cancel(cancel)?;
    let tree = odb.read_tree(tree)?;
    for entry in &tree.entries {
        collect_side(odb, entry, prefix, cancel, out)?;
    }
    Ok(())
}

fn record_blob(entry: &TreeEntry, path: &BString, out: &mut BTreeMap<BString, TreeEntry>) {
    if entry.mode.is_regular() {
        out.insert(path.clone(), entry.clone());
    }
}

fn join_path(prefix: &BString, name: &BString) -> BString {
    if prefix.is_empty() {
        name.clone()
    } else {
        let mut path = prefix.clone();
        path.push(b'/');
        path.extend_from_slice(name);
        path
    }
}
