use bstr::{BStr, BString, ByteSlice};
use grit_hash::ObjectId;
use grit_utils::Signature;

use crate::ObjectError;

/// A git commit object.
///
/// Parents are held as ids, not objects; materializing them is the
/// resolver's job. Headers the reader does not interpret (`mergetag`, …)
/// are preserved verbatim so serialization round-trips byte-exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// OID of the root tree.
    pub tree: ObjectId,
    /// Parent commit OIDs, in object order (empty for a root commit).
    pub parents: Vec<ObjectId>,
    /// Author identity and timestamp.
    pub author: Signature,
    /// Committer identity and timestamp.
    pub committer: Signature,
    /// Optional encoding header.
    pub encoding: Option<BString>,
    /// Optional GPG signature (multi-line).
    pub gpgsig: Option<BString>,
    /// Unrecognized headers preserved for round-trip.
    pub extra_headers: Vec<(BString, BString)>,
    /// Commit message: everything after the blank separator line.
    pub message: BString,
}

impl Commit {
    /// Parse commit content from raw bytes (no object header).
    pub fn parse(content: &[u8]) -> Result<Self, ObjectError> {
        let mut tree: Option<ObjectId> = None;
        let mut parents = Vec::new();
        let mut author: Option<Signature> = None;
        let mut committer: Option<Signature> = None;
        let mut encoding: Option<BString> = None;
        let mut gpgsig: Option<BString> = None;
        let mut extra_headers: Vec<(BString, BString)> = Vec::new();

        let mut pos = 0;
        while pos < content.len() {
            if content[pos] == b'\n' {
                // Blank line: headers end, message begins.
                pos += 1;
                break;
            }

            let (line, mut next) = read_line(content, pos);
            let space = line
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| ObjectError::InvalidHeader("header line without space".into()))?;
            let key = &line[..space];
            let value = &line[space + 1..];

            match key {
                b"tree" => tree = Some(parse_oid_value(value, "tree")?),
                b"parent" => parents.push(parse_oid_value(value, "parent")?),
                b"author" => author = Some(parse_signature(value)?),
                b"committer" => committer = Some(parse_signature(value)?),
                b"encoding" => encoding = Some(BString::from(value)),
                b"gpgsig" | b"gpgsig-sha256" => {
                    let (sig, after) = read_continuation(content, value, next);
                    gpgsig = Some(sig);
                    next = after;
                }
                _ => {
                    let (val, after) = read_continuation(content, value, next);
                    extra_headers.push((BString::from(key), val));
                    next = after;
                }
            }
            pos = next;
        }

        let tree = tree.ok_or(ObjectError::MissingCommitField { field: "tree" })?;
        let author = author.ok_or(ObjectError::MissingCommitField { field: "author" })?;
        let committer = committer.ok_or(ObjectError::MissingCommitField { field: "committer" })?;

        Ok(Self {
            tree,
            parents,
            author,
            committer,
            encoding,
            gpgsig,
            extra_headers,
            message: BString::from(&content[pos.min(content.len())..]),
        })
    }

    /// Serialize commit content to bytes (no object header).
    pub fn serialize_content(&self) -> Vec<u8> {
        let mut out = Vec::new();

        out.extend_from_slice(b"tree ");
        out.extend_from_slice(self.tree.to_hex().as_bytes());
        out.push(b'\n');

        for parent in &self.parents {
            out.extend_from_slice(b"parent ");
            out.extend_from_slice(parent.to_hex().as_bytes());
            out.push(b'\n');
        }

        out.extend_from_slice(b"author ");
        out.extend_from_slice(&self.author.to_bytes());
        out.push(b'\n');

        out.extend_from_slice(b"committer ");
        out.extend_from_slice(&self.committer.to_bytes());
        out.push(b'\n');

        if let Some(ref enc) = self.encoding {
            out.extend_from_slice(b"encoding ");
            out.extend_from_slice(enc);
            out.push(b'\n');
        }

        if let Some(ref sig) = self.gpgsig {
            write_multiline(&mut out, b"gpgsig", sig);
        }

        for (key, val) in &self.extra_headers {
            write_multiline(&mut out, key, val);
        }

        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }

    /// Committer timestamp in Unix seconds.
    pub fn commit_time(&self) -> i64 {
        self.committer.date.timestamp
    }

    /// The first parent, if any.
    pub fn first_parent(&self) -> Option<&ObjectId> {
        self.parents.first()
    }

    /// Whether this commit has more than one parent.
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    /// Whether this commit has no parents.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// The first line of the message.
    pub fn summary(&self) -> &BStr {
        let msg: &[u8] = self.message.as_ref();
        match msg.find_byte(b'\n') {
            Some(pos) => BStr::new(&msg[..pos]),
            None => BStr::new(msg),
        }
    }

    /// The message body after the first blank line, if present.
    pub fn body(&self) -> Option<&BStr> {
        let msg: &[u8] = self.message.as_ref();
        msg.find(b"\n\n").map(|pos| BStr::new(&msg[pos + 2..]))
    }
}

/// Read one line; returns the line (without '\n') and the position after it.
fn read_line(content: &[u8], pos: usize) -> (&[u8], usize) {
    match content[pos..].iter().position(|&b| b == b'\n') {
        Some(rel) => (&content[pos..pos + rel], pos + rel + 1),
        None => (&content[pos..], content.len()),
    }
}

/// Collect continuation lines (leading space) into a multi-line value.
fn read_continuation(content: &[u8], first: &[u8], mut next: usize) -> (BString, usize) {
    let mut value = Vec::from(first);
    while next < content.len() && content[next] == b' ' {
        let (line, after) = read_line(content, next + 1);
        value.push(b'\n');
        value.extend_from_slice(line);
        next = after;
    }
    (BString::from(value), next)
}

/// Write a header with continuation-line folding for embedded newlines.
fn write_multiline(out: &mut Vec<u8>, key: &[u8], value: &[u8]) {
    out.extend_from_slice(key);
    out.push(b' ');
    for (i, line) in value.split(|&b| b == b'\n').enumerate() {
        if i > 0 {
            out.push(b'\n');
            out.push(b' ');
        }
        out.extend_from_slice(line);
    }
    out.push(b'\n');
}

fn parse_oid_value(value: &[u8], field: &'static str) -> Result<ObjectId, ObjectError> {
    let hex = std::str::from_utf8(value)
        .map_err(|_| ObjectError::InvalidHeader(format!("non-UTF8 {field} OID")))?;
    Ok(ObjectId::from_hex(hex)?)
}

fn parse_signature(value: &[u8]) -> Result<Signature, ObjectError> {
    Signature::parse(BStr::new(value)).map_err(|e| ObjectError::InvalidSignature(e.to_string()))
}
