use bstr::BString;

/// Number of leading bytes inspected by the text heuristic.
const TEXT_PROBE_LEN: usize = 8 * 1024;

/// The first line of a git-lfs pointer file.
const LFS_SIGNATURE: &[u8] = b"version https://git-lfs.github.com/spec/v1";

/// A git blob: opaque file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: BString,
}

impl Blob {
    /// Wrap raw content bytes.
    pub fn new(data: impl Into<BString>) -> Self {
        Self { data: data.into() }
    }

    /// Content length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the blob is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Heuristic text check: no NUL byte within the first 8 KiB.
    ///
    /// This is the same probe git uses to decide binary-ness for diffs.
    pub fn is_text(&self) -> bool {
        let probe = &self.data[..self.data.len().min(TEXT_PROBE_LEN)];
        !probe.contains(&0)
    }

    /// Whether the content is a git-lfs pointer file.
    pub fn is_lfs_pointer(&self) -> bool {
        self.data.starts_with(LFS_SIGNATURE)
    }
}
