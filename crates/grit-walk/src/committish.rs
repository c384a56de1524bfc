//! Committish resolution.
//!
//! Accepted forms: `HEAD`, a hex prefix of at least four digits, a short
//! or canonical ref name, each optionally followed by a chain of `~N`
//! and `^N` steps, parsed in one left-to-right pass. Annotated tags peel
//! to the commit they ultimately tag.

use grit_hash::ObjectId;
use grit_object::Object;
use grit_odb::{ObjectStore, OdbError};
use grit_ref::RefStore;

use crate::WalkError;

/// Resolve a committish to a commit OID.
pub fn resolve_committish(
    odb: &ObjectStore,
    refs: &RefStore,
    spec: &str,
) -> Result<ObjectId, WalkError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(WalkError::InvalidCommittish(spec.to_string()));
    }

    let (base, ops) = split_nav_suffix(spec);
    let mut oid = peel_to_commit(odb, resolve_base(odb, refs, base)?)?;

    for op in parse_nav_ops(ops).ok_or_else(|| WalkError::InvalidCommittish(spec.to_string()))? {
        oid = apply_nav_op(odb, oid, op)?;
    }
    Ok(oid)
}

/// One `~N` or `^N` step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NavOp {
    /// `~N`: N hops along first parents.
    FirstParents(usize),
    /// `^N`: the N-th parent (1-based); `^0` is the commit itself.
    NthParent(usize),
}

/// Split `main~2^2~1` into `("main", "~2^2~1")`.
fn split_nav_suffix(spec: &str) -> (&str, &str) {
    match spec.find(['~', '^']) {
        // A leading operator leaves no base to resolve.
        Some(0) | None => (spec, ""),
        Some(at) => (&spec[..at], &spec[at..]),
    }
}

/// Parse the whole `^`/`~` chain left to right.
fn parse_nav_ops(suffix: &str) -> Option<Vec<NavOp>> {
    let mut ops = Vec::new();
    let bytes = suffix.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let op = bytes[i];
        i += 1;

        let digits_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let count = if digits_start == i {
            1
        } else {
            suffix[digits_start..i].parse().ok()?
        };

        match op {
            b'~' => ops.push(NavOp::FirstParents(count)),
            b'^' => ops.push(NavOp::NthParent(count)),
            _ => return None,
        }
    }
    Some(ops)
}

fn apply_nav_op(odb: &ObjectStore, oid: ObjectId, op: NavOp) -> Result<ObjectId, WalkError> {
    match op {
        NavOp::FirstParents(n) => {
            let mut current = oid;
            for _ in 0..n {
                let entry = odb.read_log_entry(&current)?;
                current = *entry
                    .parents
                    .first()
                    .ok_or(WalkError::NoParent { oid: current, n: 1 })?;
            }
            Ok(current)
        }
        NavOp::NthParent(0) => Ok(oid),
        NavOp::NthParent(n) => {
            let entry = odb.read_log_entry(&oid)?;
            entry
                .parents
                .get(n - 1)
                .copied()
                .ok_or(WalkError::NoParent { oid, n })
        }
    }
}

/// Resolve the base token: `HEAD`, a full hash, a ref name, or a hex
/// abbreviation (in that order).
fn resolve_base(odb: &ObjectStore, refs: &RefStore, base: &str) -> Result<ObjectId, WalkError> {
    if base == "HEAD" {
        return refs
            .head_oid()?
            .ok_or_else(|| WalkError::InvalidCommittish(base.to_string()));
    }

    // A full-length hash is unambiguous by construction.
    if let Ok(oid) = ObjectId::from_hex(base) {
        return Ok(oid);
    }

    // Refs win over abbreviations: a branch named "beef" shadows the
    // hex prefix beef.
    if let Some((_, oid)) = refs.resolve_short(base)? {
        return Ok(oid);
    }

    if base.len() >= 4 && base.bytes().all(|b| b.is_ascii_hexdigit()) {
        match odb.resolve_hex(base) {
            Ok(oid) => return Ok(oid),
            Err(err @ OdbError::Ambiguous { .. }) => return Err(err.into()),
            Err(_) => {}
        }
    }

    Err(WalkError::InvalidCommittish(base.to_string()))
}

/// Follow tag objects until a commit appears.
fn peel_to_commit(odb: &ObjectStore, mut oid: ObjectId) -> Result<ObjectId, WalkError> {
    // Nested tags are legal; runaway chains are not.
    for _ in 0..16 {
        match odb.read(&oid)? {
            Object::Commit(_) => return Ok(oid),
            Object::Tag(tag) => oid = tag.target,
            _ => return Err(WalkError::NotACommit(oid)),
        }
    }
    Err(WalkError::NotACommit(oid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_split() {
        assert_eq!(split_nav_suffix("main~2^2"), ("main", "~2^2"));
        assert_eq!(split_nav_suffix("HEAD"), ("HEAD", ""));
        assert_eq!(split_nav_suffix("abc123"), ("abc123", ""));
        assert_eq!(split_nav_suffix("^1"), ("^1", ""));
    }

    #[test]
    fn nav_op_parsing() {
        assert_eq!(
            parse_nav_ops("~2^3~1").unwrap(),
            vec![
                NavOp::FirstParents(2),
                NavOp::NthParent(3),
                NavOp::FirstParents(1)
            ]
        );
        assert_eq!(parse_nav_ops("~").unwrap(), vec![NavOp::FirstParents(1)]);
        assert_eq!(parse_nav_ops("^").unwrap(), vec![NavOp::NthParent(1)]);
        assert_eq!(parse_nav_ops("^0").unwrap(), vec![NavOp::NthParent(0)]);
        assert!(parse_nav_ops("").unwrap().is_empty());
    }
}
