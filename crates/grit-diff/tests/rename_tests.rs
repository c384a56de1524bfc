//! Tree comparison and rename detection over loose-object fixtures.

use std::path::Path;

use bstr::{BStr, BString};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use grit_diff::{diff_trees, tree, Change, ChangeKind, DiffError, DiffOptions};
use grit_hash::{HashAlgorithm, ObjectId};
use grit_object::{header, FileMode, ObjectType, Tree, TreeEntry};
use grit_odb::ObjectStore;
use grit_utils::CancelToken;
use std::io::Write;

fn put_loose_bytes(objects_dir: &Path, kind: ObjectType, content: &[u8]) -> ObjectId {
    let oid = grit_hash::hasher::Hasher::hash_object(HashAlgorithm::Sha1, kind.as_str(), content);
    let hex = oid.to_hex();
    let dir = objects_dir.join(&hex[..2]);
    std::fs::create_dir_all(&dir).unwrap();

    let mut raw = header::write_header(kind, content.len());
    raw.extend_from_slice(content);
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(&raw).unwrap();
    std::fs::write(dir.join(&hex[2..]), enc.finish().unwrap()).unwrap();
    oid
}

fn put_blob(objects_dir: &Path, content: &[u8]) -> ObjectId {
    put_loose_bytes(objects_dir, ObjectType::Blob, content)
}

/// Store a tree of `(mode, name, oid)` entries; returns its OID.
fn put_tree(objects_dir: &Path, entries: Vec<(FileMode, &str, ObjectId)>) -> ObjectId {
    let tree = Tree {
        entries: entries
            .into_iter()
            .map(|(mode, name, oid)| TreeEntry {
                mode,
                name: BString::from(name),
                oid,
            })
            .collect(),
    };
    let content = tree.serialize_content();
    put_loose_bytes(objects_dir, ObjectType::Tree, &content)
}

fn compare(
    odb: &ObjectStore,
    old: &ObjectId,
    new: &ObjectId,
    threshold: Option<f64>,
) -> Vec<Change> {
    diff_trees(
        odb,
        Some(old),
        Some(new),
        &DiffOptions {
            rename_threshold: threshold,
        },
        &CancelToken::new(),
    )
    .unwrap()
}

#[test]
fn identical_trees_diff_empty() {
    let dir = tempfile::tempdir().unwrap();
    let blob = put_blob(dir.path(), b"content\n");
    let tree = put_tree(dir.path(), vec![(FileMode::Regular, "file.txt", blob)]);

    let odb = ObjectStore::open(dir.path()).unwrap();
    assert!(compare(&odb, &tree, &tree, Some(0.5)).is_empty());
}

#[test]
fn add_remove_modify_classification() {
    let dir = tempfile::tempdir().unwrap();
    let kept = put_blob(dir.path(), b"kept\n");
    let before = put_blob(dir.path(), b"before\n");
    let after = put_blob(dir.path(), b"after\n");
    let gone = put_blob(dir.path(), b"goodbye, this content simply disappears\n");
    let born = put_blob(dir.path(), b"hello, totally unrelated new content here\n");

    let old = put_tree(
        dir.path(),
        vec![
            (FileMode::Regular, "changed.txt", before),
            (FileMode::Regular, "gone.txt", gone),
            (FileMode::Regular, "kept.txt", kept),
        ],
    );
    let new = put_tree(
        dir.path(),
        vec![
            (FileMode::Regular, "born.txt", born),
            (FileMode::Regular, "changed.txt", after),
            (FileMode::Regular, "kept.txt", kept),
        ],
    );

    let odb = ObjectStore::open(dir.path()).unwrap();
    let changes = compare(&odb, &old, &new, Some(0.5));

    assert_eq!(changes.len(), 3);
    let by_path: Vec<(String, ChangeKind)> = changes
        .iter()
        .map(|c| (c.path().to_string(), c.kind))
        .collect();
    assert_eq!(
        by_path,
        vec![
            ("born.txt".to_string(), ChangeKind::Added),
            ("changed.txt".to_string(), ChangeKind::Modified),
            ("gone.txt".to_string(), ChangeKind::Removed),
        ]
    );
}

#[test]
fn same_id_rename_across_directories() {
    let dir = tempfile::tempdir().unwrap();
    let blob = put_blob(dir.path(), b"moved content\n");

    let sub_a = put_tree(dir.path(), vec![(FileMode::Regular, "x.txt", blob)]);
    let sub_b = put_tree(dir.path(), vec![(FileMode::Regular, "x.txt", blob)]);
    let old = put_tree(dir.path(), vec![(FileMode::Tree, "a", sub_a)]);
    let new = put_tree(dir.path(), vec![(FileMode::Tree, "b", sub_b)]);

    let odb = ObjectStore::open(dir.path()).unwrap();
    let changes = compare(&odb, &old, &new, Some(0.5));

    assert_eq!(changes.len(), 1);
    let change = &changes[0];
    assert_eq!(change.kind, ChangeKind::Renamed);
    assert_eq!(change.old_path.as_ref().unwrap(), "a/x.txt");
    assert_eq!(change.new_path.as_ref().unwrap(), "b/x.txt");
}

#[test]
fn similarity_rename_above_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let old_content = b"line one\nline two\nline three\nline four\nline five\n";
    let new_content = b"line one\nline two\nline three\nline four\nline 5 changed\n";
    let old_blob = put_blob(dir.path(), old_content);
    let new_blob = put_blob(dir.path(), new_content);

    let old = put_tree(dir.path(), vec![(FileMode::Regular, "old-name.txt", old_blob)]);
    let new = put_tree(dir.path(), vec![(FileMode::Regular, "new-name.txt", new_blob)]);

    let odb = ObjectStore::open(dir.path()).unwrap();
    let changes = compare(&odb, &old, &new, Some(0.5));

    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::Renamed);
    assert_eq!(changes[0].old_path.as_ref().unwrap(), "old-name.txt");
    assert_eq!(changes[0].new_path.as_ref().unwrap(), "new-name.txt");
}

#[test]
fn dissimilar_content_stays_add_plus_remove() {
    let dir = tempfile::tempdir().unwrap();
    let old_blob = put_blob(dir.path(), b"alpha\nbravo\ncharlie\ndelta\necho\n");
    let new_blob = put_blob(dir.path(), b"one\ntwo\nthree\nfour\nfive\n");

    let old = put_tree(dir.path(), vec![(FileMode::Regular, "old-name.txt", old_blob)]);
    let new = put_tree(dir.path(), vec![(FileMode::Regular, "new-name.txt", new_blob)]);

    let odb = ObjectStore::open(dir.path()).unwrap();
    let changes = compare(&odb, &old, &new, Some(0.5));

    assert_eq!(changes.len(), 2);
    let kinds: Vec<ChangeKind> = changes.iter().map(|c| c.kind).collect();
    assert!(kinds.contains(&ChangeKind::Added));
    assert!(kinds.contains(&ChangeKind::Removed));
}

#[test]
fn disabled_similarity_still_finds_exact_renames() {
    let dir = tempfile::tempdir().unwrap();
    let blob = put_blob(dir.path(), b"exact content\n");
    let old = put_tree(dir.path(), vec![(FileMode::Regular, "was.txt", blob)]);
    let new = put_tree(dir.path(), vec![(FileMode::Regular, "is.txt", blob)]);

    let odb = ObjectStore::open(dir.path()).unwrap();
    let changes = compare(&odb, &old, &new, None);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::Renamed);
}

#[test]
fn swapped_arguments_invert_the_change_list() {
    let dir = tempfile::tempdir().unwrap();
    let before = put_blob(dir.path(), b"before\n");
    let after = put_blob(dir.path(), b"after\n");
    let extra = put_blob(dir.path(), b"totally distinct extra content here\n");

    let old = put_tree(
        dir.path(),
        vec![
            (FileMode::Regular, "changed.txt", before),
            (FileMode::Regular, "extra.txt", extra),
        ],
    );
    let new = put_tree(dir.path(), vec![(FileMode::Regular, "changed.txt", after)]);

    let odb = ObjectStore::open(dir.path()).unwrap();
    let forward = compare(&odb, &old, &new, Some(0.9));
    let backward = compare(&odb, &new, &old, Some(0.9));

    assert_eq!(forward.len(), backward.len());
    for f in &forward {
        let b = backward
            .iter()
            .find(|b| b.old_path == f.new_path && b.new_path == f.old_path || b.path() == f.path())
            .unwrap();
        match f.kind {
            ChangeKind::Added => assert_eq!(b.kind, ChangeKind::Removed),
            ChangeKind::Removed => assert_eq!(b.kind, ChangeKind::Added),
            ChangeKind::Modified => assert_eq!(b.kind, ChangeKind::Modified),
            ChangeKind::Renamed => assert_eq!(b.kind, ChangeKind::Renamed),
        }
    }
}

#[test]
fn executables_are_outside_the_divergence_set() {
    let dir = tempfile::tempdir().unwrap();
    let before = put_blob(dir.path(), b"#!/bin/sh\necho old\n");
    let after = put_blob(dir.path(), b"#!/bin/sh\necho new\n");

    let old = put_tree(dir.path(), vec![(FileMode::Executable, "run.sh", before)]);
    let new = put_tree(dir.path(), vec![(FileMode::Executable, "run.sh", after)]);

    let odb = ObjectStore::open(dir.path()).unwrap();
    assert!(compare(&odb, &old, &new, Some(0.5)).is_empty());
}

#[test]
fn cancellation_aborts_comparison() {
    let dir = tempfile::tempdir().unwrap();
    let blob = put_blob(dir.path(), b"x\n");
    let tree = put_tree(dir.path(), vec![(FileMode::Regular, "f", blob)]);

    let odb = ObjectStore::open(dir.path()).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = diff_trees(
        &odb,
        Some(&tree),
        Some(&tree),
        &DiffOptions::default(),
        &cancel,
    );
    assert!(matches!(result.unwrap_err(), DiffError::Cancelled));
}

#[test]
fn entry_at_path_descends_subtrees() {
    let dir = tempfile::tempdir().unwrap();
    let blob = put_blob(dir.path(), b"deep\n");
    let inner = put_tree(dir.path(), vec![(FileMode::Regular, "file.txt", blob)]);
    let outer = put_tree(dir.path(), vec![(FileMode::Tree, "src", inner)]);

    let odb = ObjectStore::open(dir.path()).unwrap();
    let entry = tree::entry_at_path(&odb, &outer, BStr::new("src/file.txt"))
        .unwrap()
        .unwrap();
    assert_eq!(entry.oid, blob);

    assert!(tree::entry_at_path(&odb, &outer, BStr::new("src/missing"))
        .unwrap()
        .is_none());
    assert!(tree::entry_at_path(&odb, &outer, BStr::new("other"))
        .unwrap()
        .is_none());
}

#[test]
fn all_blob_entries_enumerates_recursively() {
    let dir = tempfile::tempdir().unwrap();
    let a = put_blob(dir.path(), b"a\n");
    let b = put_blob(dir.path(), b"b\n");
    let inner = put_tree(dir.path(), vec![(FileMode::Regular, "b.txt", b)]);
    let outer = put_tree(
        dir.path(),
        vec![
            (FileMode::Regular, "a.txt", a),
            (FileMode::Tree, "dir", inner),
        ],
    );

    let odb = ObjectStore::open(dir.path()).unwrap();
    let blobs = tree::all_blob_entries(&odb, &outer, &CancelToken::new()).unwrap();
    let paths: Vec<String> = blobs.keys().map(|p| p.to_string()).collect();
    assert_eq!(paths, vec!["a.txt", "dir/b.txt"]);
}
