//! Read-only reference access: HEAD, loose ref files, and packed-refs.
//!
//! Reference mutation is out of scope for this library; repository writes
//! go through an external git binary and are followed by a pack refresh.

mod error;
mod name;
mod store;

pub use error::RefError;
pub use name::RefName;
pub use store::{PackedRef, RefStore};

use grit_hash::ObjectId;

/// A git reference: direct (points at an object) or symbolic (points at
/// another ref).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Direct { name: RefName, target: ObjectId },
    Symbolic { name: RefName, target: RefName },
}

impl Reference {
    /// The ref's own name.
    pub fn name(&self) -> &RefName {
        match self {
            Reference::Direct { name, .. } => name,
            Reference::Symbolic { name, .. } => name,
        }
    }

    /// The target OID, if direct.
    pub fn target_oid(&self) -> Option<ObjectId> {
        match self {
            Reference::Direct { target, .. } => Some(*target),
            Reference::Symbolic { .. } => None,
        }
    }

    /// The symbolic target, if symbolic.
    pub fn symbolic_target(&self) -> Option<&RefName> {
        match self {
            Reference::Symbolic { target, .. } => Some(target),
            Reference::Direct { .. } => None,
        }
    }
}

/// The state of HEAD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// HEAD points at a branch (which may be unborn).
    Attached(RefName),
    /// HEAD holds a bare OID.
    Detached(ObjectId),
}
