use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use grit_hash::ObjectId;

use crate::{Head, RefError, RefName, Reference};

/// How many symbolic hops to follow before giving up.
const MAX_SYMREF_DEPTH: usize = 10;

/// A single entry parsed from the packed-refs file.
#[derive(Debug, Clone)]
pub struct PackedRef {
    pub name: RefName,
    pub oid: ObjectId,
    /// Peeled target for annotated tags (the `^…` continuation line).
    pub peeled: Option<ObjectId>,
}

/// Read-only files-backend reference store: loose refs under `refs/`
/// shadow entries in `packed-refs`.
pub struct RefStore {
    git_dir: PathBuf,
}

impl RefStore {
    /// Open the store over a git directory.
    pub fn open(git_dir: impl AsRef<Path>) -> Self {
        Self {
            git_dir: git_dir.as_ref().to_path_buf(),
        }
    }

    /// The git directory this store reads from.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Read HEAD.
    pub fn head(&self) -> Result<Head, RefError> {
        let path = self.git_dir.join("HEAD");
        let contents = fs::read(&path).map_err(|e| RefError::IoPath {
            path: path.clone(),
            source: e,
        })?;
        let trimmed = contents.trim();

        if let Some(target) = trimmed.strip_prefix(b"ref: ") {
            let target = std::str::from_utf8(target.trim())
                .map_err(|_| RefError::Parse("non-UTF8 HEAD target".into()))?;
            return Ok(Head::Attached(RefName::new(target)?));
        }

        let hex = std::str::from_utf8(trimmed)
            .map_err(|_| RefError::Parse("non-UTF8 HEAD".into()))?;
        Ok(Head::Detached(ObjectId::from_hex(hex)?))
    }

    /// The OID HEAD ultimately points at. `None` for an unborn branch.
    pub fn head_oid(&self) -> Result<Option<ObjectId>, RefError> {
        match self.head()? {
            Head::Detached(oid) => Ok(Some(oid)),
            Head::Attached(name) => self.resolve_to_oid(&name),
        }
    }

    /// Resolve one ref name (loose wins over packed). `None` if absent.
    pub fn resolve(&self, name: &RefName) -> Result<Option<Reference>, RefError> {
        if let Some(r) = self.read_loose(name)? {
            return Ok(Some(r));
        }
        let packed = self.packed_refs()?;
        Ok(packed.get(name).map(|p| Reference::Direct {
            name: name.clone(),
            target: p.oid,
        }))
    }

    /// Resolve a ref to its final OID, following symbolic chains.
    pub fn resolve_to_oid(&self, name: &RefName) -> Result<Option<ObjectId>, RefError> {
        let mut current = name.clone();
        for _ in 0..MAX_SYMREF_DEPTH {
            match self.resolve(&current)? {
                None => return Ok(None),
                Some(Reference::Direct { target, .. }) => return Ok(Some(target)),
                Some(Reference::Symbolic { target, .. }) => current = target,
            }
        }
        Err(RefError::ChainTooDeep(name.to_string()))
    }

    /// Resolve a possibly short name the way revision syntax does:
    /// exact, then `refs/<name>`, `refs/heads/`, `refs/tags/`,
    /// `refs/remotes/`.
    pub fn resolve_short(&self, name: &str) -> Result<Option<(RefName, ObjectId)>, RefError> {
        let candidates = [
            name.to_string(),
            format!("refs/{name}"),
            format!("refs/heads/{name}"),
            format!("refs/tags/{name}"),
            format!("refs/remotes/{name}"),
        ];
        for candidate in candidates {
            let Ok(ref_name) = RefName::new(candidate) else {
                continue;
            };
            if let Some(oid) = self.resolve_to_oid(&ref_name)? {
                return Ok(Some((ref_name, oid)));
            }
        }
        Ok(None)
    }

    /// The peeled (annotated-tag target) OID recorded for a packed ref.
    pub fn peeled_oid(&self, name: &RefName) -> Result<Option<ObjectId>, RefError> {
        Ok(self.packed_refs()?.get(name).and_then(|p| p.peeled))
    }

    /// All refs under an optional prefix, sorted by name. Loose refs
    /// shadow packed entries of the same name.
    pub fn iter(&self, prefix: Option<&str>) -> Result<Vec<Reference>, RefError> {
        let mut merged: BTreeMap<RefName, Reference> = BTreeMap::new();

        for packed in self.packed_refs()?.into_values() {
            merged.insert(
                packed.name.clone(),
                Reference::Direct {
                    name: packed.name,
                    target: packed.oid,
                },
            );
        }

        let refs_dir = self.git_dir.join("refs");
        if refs_dir.is_dir() {
            self.collect_loose(&refs_dir, "refs", &mut merged)?;
        }

        Ok(merged
            .into_values()
            .filter(|r| match prefix {
                Some(p) => r.name().as_str().starts_with(p),
                None => true,
            })
            .collect())
    }

    /// Branch names (short form), sorted.
    pub fn branches(&self) -> Result<Vec<String>, RefError> {
        Ok(self
            .iter(Some("refs/heads/"))?
            .into_iter()
            .map(|r| r.name().short().to_string())
            .collect())
    }

    /// Tag names (short form), sorted.
    pub fn tags(&self) -> Result<Vec<String>, RefError> {
        Ok(self
            .iter(Some("refs/tags/"))?
            .into_iter()
            .map(|r| r.name().short().to_string())
            .collect())
    }

    // --- internals ---

    fn read_loose(&self, name: &RefName) -> Result<Option<Reference>, RefError> {
        let path = self.git_dir.join(name.as_str());
        // A directory of the same name (refs/heads/foo/) is not a ref.
        if path.is_dir() {
            return Ok(None);
        }
        let contents = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RefError::IoPath {
                    path: path.clone(),
                    source: e,
                })
            }
        };

        let trimmed = contents.trim();
        if let Some(target) = trimmed.strip_prefix(b"ref: ") {
            let target = std::str::from_utf8(target.trim())
                .map_err(|_| RefError::Parse("non-UTF8 symbolic target".into()))?;
            return Ok(Some(Reference::Symbolic {
                name: name.clone(),
                target: RefName::new(target)?,
            }));
        }

        let hex = std::str::from_utf8(trimmed)
            .map_err(|_| RefError::Parse("non-UTF8 ref OID".into()))?;
        Ok(Some(Reference::Direct {
            name: name.clone(),
            target: ObjectId::from_hex(hex)?,
        }))
    }

    fn collect_loose(
        &self,
        dir: &Path,
        prefix: &str,
        out: &mut BTreeMap<RefName, Reference>,
    ) -> Result<(), RefError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(component) = file_name.to_str() else {
                continue;
            };
            let full = format!("{prefix}/{component}");
            if entry.file_type()?.is_dir() {
                self.collect_loose(&entry.path(), &full, out)?;
            } else {
                let Ok(name) = RefName::new(full) else {
                    continue;
                };
                if let Some(r) = self.read_loose(&name)? {
                    out.insert(name, r);
                }
            }
        }
        Ok(())
    }

    fn packed_refs(&self) -> Result<BTreeMap<RefName, PackedRef>, RefError> {
        let path = self.git_dir.join("packed-refs");
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(RefError::IoPath {
                    path: path.clone(),
                    source: e,
                })
            }
        };
        parse_packed_refs(&data)
    }
}

/// Parse the packed-refs file:
///
/// ```text
/// # pack-refs with: peeled fully-peeled sorted
/// <hex-oid> <refname>
/// ^<hex-oid>          (peeled target of the annotated tag above)
/// ```
fn parse_packed_refs(data: &[u8]) -> Result<BTreeMap<RefName, PackedRef>, RefError> {
    let mut refs: BTreeMap<RefName, PackedRef> = BTreeMap::new();
    let mut last: Option<RefName> = None;

    for line in data.lines() {
        if line.is_empty() || line.starts_with(b"#") {
            continue;
        }

        if let Some(rest) = line.strip_prefix(b"^") {
            let hex = std::str::from_utf8(rest.trim())
                .map_err(|_| RefError::Parse("non-UTF8 peeled OID".into()))?;
            let peeled = ObjectId::from_hex(hex)?;
            if let Some(ref name) = last {
                if let Some(entry) = refs.get_mut(name) {
                    entry.peeled = Some(peeled);
                }
            }
            continue;
        }

        let space = line
            .find_byte(b' ')
            .ok_or_else(|| RefError::Parse("malformed packed-refs line".into()))?;
        let hex = std::str::from_utf8(&line[..space])
            .map_err(|_| RefError::Parse("non-UTF8 packed OID".into()))?;
        let oid = ObjectId::from_hex(hex)?;
        let name_str = std::str::from_utf8(line[space + 1..].trim())
            .map_err(|_| RefError::Parse("non-UTF8 packed ref name".into()))?;
        let name = RefName::new(name_str)?;

        refs.insert(
            name.clone(),
            PackedRef {
                name: name.clone(),
                oid,
                peeled: None,
            },
        );
        last = Some(name);
    }

    Ok(refs)
}
