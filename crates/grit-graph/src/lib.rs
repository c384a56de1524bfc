//! Commit-graph reading: the fast path for commit metadata.
//!
//! A commit-graph file caches, per commit: root tree OID, parent links,
//! generation number, and commit time. Reading it avoids inflating and
//! parsing commit objects during history walks. Graphs come either as a
//! single `objects/info/commit-graph` file or as a chain of layered files
//! under `objects/info/commit-graphs/`; a chain is preferred when both
//! exist.

mod chain;
mod file;

pub use chain::read_chain_file;
pub use file::GraphFile;

use std::path::Path;

use grit_hash::ObjectId;

/// Errors from commit-graph reading.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("invalid commit-graph: {0}")]
    InvalidGraph(String),

    #[error("invalid commit-graph chain: {0}")]
    InvalidChain(String),

    #[error("commit-graph chain references missing file {0}")]
    ChainMissingGraph(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hash(#[from] grit_hash::HashError),
}

/// Commit metadata served by the graph (or projected from a parsed commit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// The commit's own OID.
    pub id: ObjectId,
    /// OID of the root tree.
    pub tree_id: ObjectId,
    /// Parent commit OIDs, in commit order.
    pub parents: Vec<ObjectId>,
    /// Committer timestamp, Unix seconds.
    pub commit_time: i64,
    /// Generation number (0 when the source cannot provide one).
    pub generation: u32,
}

/// A commit-graph: one file, or a chain of layered files.
///
/// Chain layers are held base-first. Commit positions are global across
/// the chain: a commit's position is the cumulative commit count of every
/// earlier layer plus its index in its own layer, and parent pointers in
/// any layer may reach into earlier layers.
#[derive(Debug)]
pub struct CommitGraph {
    graphs: Vec<GraphFile>,
    /// `cumulative[i]` is the number of commits in layers before `i`.
    cumulative: Vec<u32>,
}

impl CommitGraph {
    /// Open a single commit-graph file.
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let graph = GraphFile::open(path.as_ref())?;
        Ok(Self {
            cumulative: vec![0],
            graphs: vec![graph],
        })
    }

    /// Open a commit-graph chain: the chain file lists the member graph
    /// files, base layer first.
    pub fn open_chain(chain_path: &Path, graphs_dir: &Path) -> Result<Self, GraphError> {
        let names = chain::read_chain_file(chain_path)?;
        if names.is_empty() {
            return Err(GraphError::InvalidChain("chain lists no graphs".into()));
        }

        let mut graphs = Vec::with_capacity(names.len());
        let mut cumulative = Vec::with_capacity(names.len());
        let mut total = 0u32;
        for name in &names {
            let path = graphs_dir.join(name);
            if !path.is_file() {
                return Err(GraphError::ChainMissingGraph(name.clone()));
            }
            let graph = GraphFile::open(&path)?;
            cumulative.push(total);
            total += graph.num_commits();
            graphs.push(graph);
        }

        Ok(Self { graphs, cumulative })
    }

    /// Open whatever graph the objects directory provides.
    ///
    /// A chain under `info/commit-graphs/` takes precedence over a single
    /// `info/commit-graph` file. Returns `Ok(None)` when neither exists.
    pub fn open_in_objects_dir(objects_dir: &Path) -> Result<Option<Self>, GraphError> {
        let chain_path = objects_dir
            .join("info")
            .join("commit-graphs")
            .join("commit-graph-chain");
        if chain_path.is_file() {
            let graphs_dir = objects_dir.join("info").join("commit-graphs");
            return Self::open_chain(&chain_path, &graphs_dir).map(Some);
        }

        let single = objects_dir.join("info").join("commit-graph");
        if single.is_file() {
            return Self::open_file(&single).map(Some);
        }

        Ok(None)
    }

    /// Total number of commits across all layers.
    pub fn num_commits(&self) -> u32 {
        self.cumulative.last().map_or(0, |&base| base)
            + self.graphs.last().map_or(0, |g| g.num_commits())
    }

    /// Number of chain layers (1 for a single file).
    pub fn num_layers(&self) -> usize {
        self.graphs.len()
    }

    /// Whether the graph knows this commit.
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.position_of(id).is_some()
    }

    /// The global position of a commit, searching every layer.
    pub fn position_of(&self, id: &ObjectId) -> Option<u32> {
        for (i, graph) in self.graphs.iter().enumerate() {
            if let Some(local) = graph.local_position_of(id) {
                return Some(self.cumulative[i] + local);
            }
        }
        None
    }

    /// The OID at a global position.
    pub fn oid_at(&self, position: u32) -> Option<ObjectId> {
        let layer = self.layer_of(position)?;
        self.graphs[layer].oid_at(position - self.cumulative[layer])
    }

    /// Look up a commit's metadata.
    pub fn get(&self, id: &ObjectId) -> Result<Option<LogEntry>, GraphError> {
        for (i, graph) in self.graphs.iter().enumerate() {
            if let Some(local) = graph.local_position_of(id) {
                return self.entry_at_layer(i, local, id).map(Some);
            }
        }
        Ok(None)
    }

    fn entry_at_layer(
        &self,
        layer: usize,
        local: u32,
        id: &ObjectId,
    ) -> Result<LogEntry, GraphError> {
        let row = self.graphs[layer].commit_row(local)?;

        let mut parents = Vec::new();
        for position in self.graphs[layer].parent_positions(&row)? {
            let oid = self.oid_at(position).ok_or_else(|| {
                GraphError::InvalidGraph(format!(
                    "parent position {position} outside chain of {} commits",
                    self.num_commits()
                ))
            })?;
            parents.push(oid);
        }

        Ok(LogEntry {
            id: *id,
            tree_id: row.tree_id,
            parents,
            commit_time: row.commit_time,
            generation: row.generation,
        })
    }

    fn layer_of(&self, position: u32) -> Option<usize> {
        for i in (0..self.graphs.len()).rev() {
            if position >= self.cumulative[i] {
                let local = position - self.cumulative[i];
                if local < self.graphs[i].num_commits() {
                    return Some(i);
                }
                return None;
            }
        }
        None
    }
}
