//! The repository facade: one handle tying together the object resolver,
//! reference store, configuration, history walking, and tree comparison.
//!
//! This library reads repository state; it never writes it. After an
//! external tool mutates the repository (commit, fetch, gc), call
//! [`Repository::refresh`] so the pack set is re-scanned.

mod error;
mod staging;
mod verify;

pub use error::RepoError;
pub use staging::StagedEntry;

use std::path::{Path, PathBuf};

use bstr::BString;
use grit_config::ConfigFile;
use grit_diff::{diff_trees, Change, DiffOptions};
use grit_graph::LogEntry;
use grit_hash::{HashAlgorithm, ObjectId};
use grit_object::{Blob, Commit, Object, Tag, Tree};
use grit_odb::ObjectStore;
use grit_ref::{Head, RefStore};
use grit_utils::CancelToken;
use grit_walk::{log, resolve_committish, LogOptions, LogWalk};

/// A read-only handle to an on-disk git repository.
pub struct Repository {
    git_dir: PathBuf,
    work_tree: Option<PathBuf>,
    odb: ObjectStore,
    refs: RefStore,
    config: ConfigFile,
    hash_algo: HashAlgorithm,
}

impl Repository {
    /// Open a repository.
    ///
    /// `path` may point at a working-tree root (containing `.git`), at a
    /// `.git` directory, or at a bare repository. Unsupported repository
    /// features fail the open with a descriptive error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let path = path.as_ref();

        let (git_dir, work_tree) = if path.join("HEAD").is_file() && path.join("objects").is_dir()
        {
            (path.to_path_buf(), None)
        } else if path.join(".git").is_dir() {
            (path.join(".git"), Some(path.to_path_buf()))
        } else if path.join(".git").is_file() {
            // A linked worktree's `.git` file: `gitdir: <path>`.
            let contents = std::fs::read_to_string(path.join(".git"))?;
            let target = contents
                .strip_prefix("gitdir:")
                .map(str::trim)
                .ok_or_else(|| RepoError::NotARepository(path.to_path_buf()))?;
            let git_dir = path.join(target);
            (git_dir, Some(path.to_path_buf()))
        } else {
            return Err(RepoError::NotARepository(path.to_path_buf()));
        };

        let config = ConfigFile::load(git_dir.join("config"))?;
        verify::reject_unsupported(&git_dir, &config)?;

        let odb = ObjectStore::open(git_dir.join("objects"))?;
        let refs = RefStore::open(&git_dir);

        Ok(Self {
            git_dir,
            work_tree,
            odb,
            refs,
            config,
            hash_algo: HashAlgorithm::Sha1,
        })
    }

    /// The `.git` directory.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// The working tree root, if this is not a bare repository.
    pub fn work_tree(&self) -> Option<&Path> {
        self.work_tree.as_deref()
    }

    /// The object resolver.
    pub fn odb(&self) -> &ObjectStore {
        &self.odb
    }

    /// The reference store.
    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    /// The parsed repository configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// The hash algorithm in use.
    pub fn hash_algo(&self) -> HashAlgorithm {
        self.hash_algo
    }

    /// Re-scan the pack directory. Call after external repository writes.
    pub fn refresh(&self) -> Result<(), RepoError> {
        self.odb.refresh()?;
        Ok(())
    }

    /// The state of HEAD.
    pub fn head(&self) -> Result<Head, RepoError> {
        Ok(self.refs.head()?)
    }

    /// Resolve any committish to a commit id.
    pub fn resolve_id(&self, committish: &str) -> Result<ObjectId, RepoError> {
        Ok(resolve_committish(&self.odb, &self.refs, committish)?)
    }

    /// Resolve any committish to its commit.
    pub fn resolve(&self, committish: &str) -> Result<Commit, RepoError> {
        let id = self.resolve_id(committish)?;
        Ok(self.odb.read_commit(&id)?)
    }

    /// Walk history from a committish.
    pub fn log(&self, committish: &str, options: LogOptions) -> Result<LogWalk<'_>, RepoError> {
        let start = self.resolve_id(committish)?;
        Ok(log(&self.odb, start, options)?)
    }

    /// Compare the trees of two committishes.
    ///
    /// `rename_threshold` is the similarity ratio in `[0, 1]` above which
    /// an add/remove pair is reported as a rename; `None` keeps only
    /// exact-id rename detection.
    pub fn compare(
        &self,
        old: &str,
        new: &str,
        rename_threshold: Option<f64>,
    ) -> Result<Vec<Change>, RepoError> {
        self.compare_with_cancel(old, new, rename_threshold, &CancelToken::new())
    }

    /// [`compare`](Self::compare) with an external cancellation signal.
    pub fn compare_with_cancel(
        &self,
        old: &str,
        new: &str,
        rename_threshold: Option<f64>,
        cancel: &CancelToken,
    ) -> Result<Vec<Change>, RepoError> {
        let old_tree = self.resolve(old)?.tree;
        let new_tree = self.resolve(new)?.tree;
        let options = DiffOptions { rename_threshold };
        Ok(diff_trees(
            &self.odb,
            Some(&old_tree),
            Some(&new_tree),
            &options,
            cancel,
        )?)
    }

    /// Read any object by id.
    pub fn get_object(&self, id: &ObjectId) -> Result<Object, RepoError> {
        Ok(self.odb.read(id)?)
    }

    /// Typed read: commit.
    pub fn get_commit(&self, id: &ObjectId) -> Result<Commit, RepoError> {
        Ok(self.odb.read_commit(id)?)
    }

    /// Typed read: tree.
    pub fn get_tree(&self, id: &ObjectId) -> Result<Tree, RepoError> {
        Ok(self.odb.read_tree(id)?)
    }

    /// Typed read: blob.
    pub fn get_blob(&self, id: &ObjectId) -> Result<Blob, RepoError> {
        Ok(self.odb.read_blob(id)?)
    }

    /// Typed read: annotated tag.
    pub fn get_tag(&self, id: &ObjectId) -> Result<Tag, RepoError> {
        Ok(self.odb.read_tag(id)?)
    }

    /// Commit metadata via the commit-graph fast path when available.
    pub fn get_log_entry(&self, id: &ObjectId) -> Result<LogEntry, RepoError> {
        Ok(self.odb.read_log_entry(id)?)
    }

    /// Local branch names, sorted.
    pub fn branches(&self) -> Result<Vec<String>, RepoError> {
        Ok(self.refs.branches()?)
    }

    /// Tag names, sorted.
    pub fn tags(&self) -> Result<Vec<String>, RepoError> {
        Ok(self.refs.tags()?)
    }

    /// The entry at a path within a committish's tree.
    pub fn entry_at_path(
        &self,
        committish: &str,
        path: &BString,
    ) -> Result<Option<grit_object::TreeEntry>, RepoError> {
        let tree = self.resolve(committish)?.tree;
        Ok(grit_diff::tree::entry_at_path(
            &self.odb,
            &tree,
            path.as_ref(),
        )?)
    }

    /// The staged entries recorded in the index file. An absent index is
    /// an empty staging area.
    pub fn staged_entries(&self) -> Result<Vec<StagedEntry>, RepoError> {
        staging::read_index(&self.git_dir.join("index"))
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("git_dir", &self.git_dir)
            .field("work_tree", &self.work_tree)
            .finish_non_exhaustive()
    }
}
