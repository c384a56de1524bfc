//! Commit-graph chain file parsing.
//!
//! The chain file names the member graph files of a split commit-graph:
//!
//! ```text
//! Signature: "CGC\x01\x00\x00\x00" (7 bytes)
//! Count:     u32 big-endian graph count
//! Names:     count × 256-byte NUL-padded file names, base layer first
//! ```

use std::path::Path;

use crate::GraphError;

const CHAIN_SIGNATURE: &[u8; 7] = b"CGC\x01\x00\x00\x00";
const CHAIN_NAME_LEN: usize = 256;

/// Read the member graph file names, base layer first.
pub fn read_chain_file(path: &Path) -> Result<Vec<String>, GraphError> {
    let data = std::fs::read(path)?;

    if data.len() < CHAIN_SIGNATURE.len() + 4 {
        return Err(GraphError::InvalidChain("file too small".into()));
    }
    if &data[..CHAIN_SIGNATURE.len()] != CHAIN_SIGNATURE {
        return Err(GraphError::InvalidChain("bad signature".into()));
    }

    let at = CHAIN_SIGNATURE.len();
    let count = u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]) as usize;

    let names_start = at + 4;
    if data.len() < names_start + count * CHAIN_NAME_LEN {
        return Err(GraphError::InvalidChain(format!(
            "truncated: {count} names declared, file holds {}",
            (data.len() - names_start) / CHAIN_NAME_LEN
        )));
    }

    let mut names = Vec::with_capacity(count);
    for i in 0..count {
        let start = names_start + i * CHAIN_NAME_LEN;
        let record = &data[start..start + CHAIN_NAME_LEN];
        let end = record.iter().position(|&b| b == 0).unwrap_or(record.len());
        let name = std::str::from_utf8(&record[..end])
            .map_err(|_| GraphError::InvalidChain(format!("non-UTF8 name at entry {i}")))?;
        if name.is_empty() {
            return Err(GraphError::InvalidChain(format!("empty name at entry {i}")));
        }
        names.push(name.to_string());
    }

    Ok(names)
}

/// Serialize a chain file (fixture builder).
#[cfg(test)]
pub(crate) fn write_chain_bytes(names: &[&str]) -> Vec<u8> {
    let mut out = Vec::with_capacity(CHAIN_SIGNATURE.len() + 4 + names.len() * CHAIN_NAME_LEN);
    out.extend_from_slice(CHAIN_SIGNATURE);
    out.extend_from_slice(&(names.len() as u32).to_be_bytes());
    for name in names {
        let mut record = [0u8; CHAIN_NAME_LEN];
        record[..name.len()].copy_from_slice(name.as_bytes());
        out.extend_from_slice(&record);
    }
    out
}
