//! Abbreviated-hash resolution across every source.
//!
//! A prefix query must see loose objects and every pack index (the midx
//! first) so that two objects sharing the prefix are reported ambiguous no
//! matter where each lives. The same object reachable through several
//! sources counts once.

use grit_hash::{HashPrefix, ObjectId};

use crate::{ObjectStore, OdbError};

impl ObjectStore {
    /// Resolve an abbreviated prefix to the unique object it names.
    ///
    /// A full-length prefix short-circuits to an existence check.
    pub fn resolve_prefix(&self, prefix: &HashPrefix) -> Result<ObjectId, OdbError> {
        if let Some(oid) = prefix.to_oid() {
            if self.contains(&oid) {
                return Ok(oid);
            }
            return Err(OdbError::NotFound(oid));
        }

        let mut matches = self.loose.find_prefix(prefix)?;
        for source in self.packs.sources()? {
            matches.extend(source.find_prefix(prefix));
        }

        matches.sort();
        matches.dedup();

        match matches.len() {
            0 => Err(OdbError::PrefixNotFound(prefix.to_hex())),
            1 => Ok(matches[0]),
            count => Err(OdbError::Ambiguous {
                prefix: prefix.to_hex(),
                count,
            }),
        }
    }

    /// Resolve a hex committish fragment (full hash or abbreviation).
    pub fn resolve_hex(&self, hex: &str) -> Result<ObjectId, OdbError> {
        let prefix = HashPrefix::from_hex(hex)
            .map_err(|_| OdbError::PrefixNotFound(hex.to_string()))?;
        self.resolve_prefix(&prefix)
    }
}
