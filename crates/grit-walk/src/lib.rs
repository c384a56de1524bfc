//! History walking: committish resolution and filtered commit traversal.
//!
//! The walker consumes `LogEntry` metadata (commit-graph fast path when
//! available) and yields commits breadth-first from a starting point,
//! honoring time bounds, exclusion sets, first-parent mode, and path
//! filtering with rename following.

mod committish;
mod walk;

pub use committish::resolve_committish;
pub use walk::{log, LogOptions, LogWalk, WalkOrder};

use grit_hash::ObjectId;

/// Errors from committish resolution and walking.
#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("cannot resolve '{0}' to a commit")]
    InvalidCommittish(String),

    #[error("commit {oid} has no parent #{n}")]
    NoParent { oid: ObjectId, n: usize },

    #[error("object {0} is not a commit")]
    NotACommit(ObjectId),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Odb(#[from] grit_odb::OdbError),

    #[error(transparent)]
    Ref(#[from] grit_ref::RefError),

    #[error(transparent)]
    Diff(#[from] grit_diff::DiffError),
}
