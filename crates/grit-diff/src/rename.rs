//! Rename detection over a classified change list.
//!
//! Two passes: exact (same content id on a removed and an added path),
//! then similarity scoring between remaining remove/add pairs of text
//! blobs. Similarity hashes each newline-delimited chunk (CR ignored)
//! with FNV-1a and scores `2·|A∩B| / (|A| + |B|)`.

use std::collections::{HashMap, HashSet};

use grit_hash::ObjectId;
use grit_odb::ObjectStore;
use grit_utils::CancelToken;

use crate::{Change, ChangeKind, DiffError};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Pair removed and added entries that share a content id.
///
/// Entries are grouped by id; a group with paths on both sides pairs them
/// off in path order, and any leftovers stay adds/removes.
pub fn detect_same_id_renames(changes: &mut Vec<Change>) {
    let mut removed_by_id: HashMap<ObjectId, Vec<usize>> = HashMap::new();
    let mut added_by_id: HashMap<ObjectId, Vec<usize>> = HashMap::new();

    for (i, change) in changes.iter().enumerate() {
        match change.kind {
            ChangeKind::Removed => {
                if let Some(ref entry) = change.old_entry {
                    removed_by_id.entry(entry.oid).or_default().push(i);
                }
            }
            ChangeKind::Added => {
                if let Some(ref entry) = change.new_entry {
                    added_by_id.entry(entry.oid).or_default().push(i);
                }
            }
            _ => {}
        }
    }

    let mut consumed: Vec<usize> = Vec::new();
    for (oid, removed) in &removed_by_id {
        let Some(added) = added_by_id.get(oid) else {
            continue;
        };
        for (&removed_at, &added_at) in removed.iter().zip(added.iter()) {
            let old_path = changes[removed_at].old_path.clone();
            let old_entry = changes[removed_at].old_entry.clone();

            let target = &mut changes[added_at];
            target.kind = ChangeKind::Renamed;
            target.old_path = old_path;
            target.old_entry = old_entry;
            consumed.push(removed_at);
        }
    }

    consumed.sort_unstable();
    for &at in consumed.iter().rev() {
        changes.remove(at);
    }
}

/// Reclassify remaining remove/add pairs whose content similarity meets
/// the threshold. Each added entry is consumed at most once.
pub fn detect_similarity_renames(
    odb: &ObjectStore,
    changes: &mut Vec<Change>,
    threshold: f64,
    cancel: &CancelToken,
) -> Result<(), DiffError> {
    let removed: Vec<usize> = indices_of(changes, ChangeKind::Removed);
    let added: Vec<usize> = indices_of(changes, ChangeKind::Added);
    if removed.is_empty() || added.is_empty() {
        return Ok(());
    }

    let mut added_taken: HashSet<usize> = HashSet::new();
    let mut pairs: Vec<(usize, usize)> = Vec::new();

    for &removed_at in &removed {
        if cancel.is_cancelled() {
            return Err(DiffError::Cancelled);
        }

        let Some(old_oid) = changes[removed_at].old_entry.as_ref().map(|e| e.oid) else {
            continue;
        };
        let old_blob = odb.read_blob(&old_oid)?;
        if !old_blob.is_text() {
            continue;
        }
        let old_chunks = chunk_hashes(&old_blob.data);

        let mut best: Option<(usize, f64)> = None;
        for &added_at in &added {
            if added_taken.contains(&added_at) {
                continue;
            }
            let Some(new_oid) = changes[added_at].new_entry.as_ref().map(|e| e.oid) else {
                continue;
            };
            let new_blob = odb.read_blob(&new_oid)?;
            if !new_blob.is_text() {
                continue;
            }
            if !size_ratio_acceptable(old_blob.len(), new_blob.len(), threshold) {
                continue;
            }

            let new_chunks = chunk_hashes(&new_blob.data);
            let score = similarity(&old_chunks, &new_chunks);
            if score >= threshold && best.map_or(true, |(_, s)| score > s) {
                best = Some((added_at, score));
            }
        }

        if let Some((added_at, _)) = best {
            added_taken.insert(added_at);
            pairs.push((removed_at, added_at));
        }
    }

    let mut consumed: Vec<usize> = Vec::new();
    for (removed_at, added_at) in pairs {
        let old_path = changes[removed_at].old_path.clone();
        let old_entry = changes[removed_at].old_entry.clone();

        let target = &mut changes[added_at];
        target.kind = ChangeKind::Renamed;
        target.old_path = old_path;
        target.old_entry = old_entry;
        consumed.push(removed_at);
    }
    consumed.sort_unstable();
    for &at in consumed.iter().rev() {
        changes.remove(at);
    }
    Ok(())
}

fn indices_of(changes: &[Change], kind: ChangeKind) -> Vec<usize> {
    changes
        .iter()
        .enumerate()
        .filter(|(_, c)| c.kind == kind)
        .map(|(i, _)| i)
        .collect()
}

/// Quick reject: wildly different sizes cannot reach the threshold.
fn size_ratio_acceptable(old_len: usize, new_len: usize, threshold: f64) -> bool {
    let (small, large) = if old_len <= new_len {
        (old_len, new_len)
    } else {
        (new_len, old_len)
    };
    if large == 0 {
        return true;
    }
    (small as f64) / (large as f64) >= threshold
}

/// FNV-1a hashes of each newline-delimited chunk, CR stripped. Empty
/// chunks (blank lines, the tail after a final newline) carry no signal
/// and are left out of the set.
fn chunk_hashes(data: &[u8]) -> HashSet<u64> {
    data.split(|&b| b == b'\n')
        .filter_map(|line| {
            let mut hash = FNV_OFFSET;
            let mut seen = false;
            for &b in line {
                if b == b'\r' {
                    continue;
                }
                seen = true;
                hash ^= b as u64;
                hash = hash.wrapping_mul(FNV_PRIME);
            }
            seen.then_some(hash)
        })
        .collect()
}

/// Dice coefficient over the two chunk-hash sets.
fn similarity(a: &HashSet<u64>, b: &HashSet<u64>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(b).count();
    (2.0 * shared as f64) / ((a.len() + b.len()) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_scores_one() {
        let a = chunk_hashes(b"line1\nline2\nline3\n");
        let b = chunk_hashes(b"line1\nline2\nline3\n");
        assert_eq!(similarity(&a, &b), 1.0);
    }

    #[test]
    fn disjoint_content_scores_zero() {
        let a = chunk_hashes(b"aaa\nbbb\n");
        let b = chunk_hashes(b"xxx\nyyy\n");
        assert_eq!(similarity(&a, &b), 0.0);
    }

    #[test]
    fn carriage_returns_are_ignored() {
        let unix = chunk_hashes(b"one\ntwo\nthree\n");
        let dos = chunk_hashes(b"one\r\ntwo\r\nthree\r\n");
        assert_eq!(similarity(&unix, &dos), 1.0);
    }

    #[test]
    fn partial_overlap_scores_between() {
        let a = chunk_hashes(b"shared1\nshared2\nshared3\nonly-old\n");
        let b = chunk_hashes(b"shared1\nshared2\nshared3\nonly-new\n");
        let score = similarity(&a, &b);
        assert!(score > 0.5 && score < 1.0, "score was {score}");
    }

    #[test]
    fn size_ratio_rejection() {
        assert!(size_ratio_acceptable(100, 110, 0.5));
        assert!(!size_ratio_acceptable(100, 500, 0.5));
        assert!(size_ratio_acceptable(0, 0, 0.5));
    }
}
