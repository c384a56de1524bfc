use crate::{HashError, ObjectId};

/// Fan-out table mapping a first hash byte to a cumulative object count.
///
/// Pack indices, multi-pack indices, and commit-graph files all begin their
/// OID tables with the same 256-entry structure: entry `i` holds the number
/// of objects whose first byte is ≤ `i`. The table bounds the binary search
/// for an OID to a 256th of the sorted table.
#[derive(Debug, Clone)]
pub struct FanoutTable {
    table: [u32; 256],
}

impl FanoutTable {
    /// Build a fan-out table from a sorted slice of OIDs.
    ///
    /// The OIDs **must** be sorted; this function does not verify order.
    pub fn build(oids: &[ObjectId]) -> Self {
        let mut table = [0u32; 256];
        for oid in oids {
            table[oid.first_byte() as usize] += 1;
        }
        for i in 1..256 {
            table[i] += table[i - 1];
        }
        Self { table }
    }

    /// Parse the on-disk form: 256 big-endian u32 values (1024 bytes).
    pub fn from_bytes(data: &[u8]) -> Result<Self, HashError> {
        if data.len() < 1024 {
            return Err(HashError::TruncatedFanout { actual: data.len() });
        }
        let mut table = [0u32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let at = i * 4;
            *entry = u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]);
        }
        for i in 1..256 {
            if table[i] < table[i - 1] {
                return Err(HashError::NonMonotonicFanout { bucket: i });
            }
        }
        Ok(Self { table })
    }

    /// The ordinal range of OIDs whose first byte equals `first_byte`.
    pub fn range(&self, first_byte: u8) -> std::ops::Range<usize> {
        let end = self.table[first_byte as usize] as usize;
        let start = if first_byte == 0 {
            0
        } else {
            self.table[(first_byte - 1) as usize] as usize
        };
        start..end
    }

    /// Total number of objects covered by this table.
    pub fn total(&self) -> u32 {
        self.table[255]
    }
}
