//! The commit walk iterator.

use std::collections::{HashSet, VecDeque};

use bstr::BString;
use grit_diff::{diff_trees, tree::entry_at_path, ChangeKind, DiffOptions};
use grit_graph::LogEntry;
use grit_hash::ObjectId;
use grit_odb::ObjectStore;
use grit_utils::CancelToken;

use crate::WalkError;

/// Emission order for a walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WalkOrder {
    /// Breadth-first discovery order.
    #[default]
    Discovery,
    /// Parents queued newest-first by commit time.
    Time,
    /// The whole walk buffered and emitted in reverse (parents before
    /// children).
    Topological,
}

/// Options for a history walk.
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub order: WalkOrder,
    /// Follow only the first parent of each commit.
    pub first_parent_only: bool,
    /// Skip commits older than this (Unix seconds).
    pub start_time: Option<i64>,
    /// Skip commits newer than this (Unix seconds).
    pub end_time: Option<i64>,
    /// Hide these commits and all their ancestors.
    pub exclude_reachable_from: Vec<ObjectId>,
    /// Only yield commits that touch this slash-separated path, following
    /// renames back through history.
    pub path: Option<BString>,
    /// Checked between queue pops and object reads.
    pub cancel: CancelToken,
}

/// Start a walk from a commit.
pub fn log(
    odb: &ObjectStore,
    start: ObjectId,
    options: LogOptions,
) -> Result<LogWalk<'_>, WalkError> {
    let mut hidden = HashSet::new();
    for exclude in &options.exclude_reachable_from {
        mark_hidden(odb, *exclude, &mut hidden, &options.cancel)?;
    }

    let path_state = options.path.clone().map(|path| PathFilter {
        current_path: path,
        prev_tree: None,
        last_emitted_blob: None,
    });

    let mut visited = HashSet::new();
    visited.insert(start);

    Ok(LogWalk {
        odb,
        queue: VecDeque::from([start]),
        visited,
        hidden,
        options,
        path_state,
        topo_buffer: None,
        finished: false,
    })
}

/// Collect a commit and all its ancestors into the hidden set.
fn mark_hidden(
    odb: &ObjectStore,
    start: ObjectId,
    hidden: &mut HashSet<ObjectId>,
    cancel: &CancelToken,
) -> Result<(), WalkError> {
    let mut stack = vec![start];
    while let Some(oid) = stack.pop() {
        if cancel.is_cancelled() {
            return Err(WalkError::Cancelled);
        }
        if !hidden.insert(oid) {
            continue;
        }
        if let Some(entry) = odb.try_read_log_entry(&oid)? {
            for parent in entry.parents {
                if !hidden.contains(&parent) {
                    stack.push(parent);
                }
            }
        }
    }
    Ok(())
}

/// Per-walk state for path filtering with rename following.
struct PathFilter {
    /// The path the file has at the current point in history.
    current_path: BString,
    /// Tree of the newest already-processed commit that contained the
    /// path (the diff baseline for rename detection).
    prev_tree: Option<ObjectId>,
    /// Blob id at the path in the last emitted commit.
    last_emitted_blob: Option<ObjectId>,
}

enum PathDecision {
    Emit,
    Skip,
    Stop,
}

/// Iterator over commits reachable from the starting point.
pub struct LogWalk<'a> {
    odb: &'a ObjectStore,
    queue: VecDeque<ObjectId>,
    visited: HashSet<ObjectId>,
    hidden: HashSet<ObjectId>,
    options: LogOptions,
    path_state: Option<PathFilter>,
    /// Filled on first use in topological mode; drained back to front.
    topo_buffer: Option<Vec<LogEntry>>,
    finished: bool,
}

impl LogWalk<'_> {
    fn step(&mut self) -> Result<Option<LogEntry>, WalkError> {
        loop {
            if self.options.cancel.is_cancelled() {
                return Err(WalkError::Cancelled);
            }
            let Some(oid) = self.queue.pop_front() else {
                return Ok(None);
            };
            if self.hidden.contains(&oid) {
                continue;
            }

            let entry = self.odb.read_log_entry(&oid)?;
            self.enqueue_parents(&entry)?;

            if !self.within_time_bounds(&entry) {
                continue;
            }

            match self.apply_path_filter(&entry)? {
                PathDecision::Emit => return Ok(Some(entry)),
                PathDecision::Skip => continue,
                PathDecision::Stop => {
                    self.queue.clear();
                    return Ok(None);
                }
            }
        }
    }

    fn enqueue_parents(&mut self, entry: &LogEntry) -> Result<(), WalkError> {
        if self.options.first_parent_only {
            if let Some(&parent) = entry.parents.first() {
                if self.visited.insert(parent) {
                    self.queue.push_back(parent);
                }
            }
            return Ok(());
        }

        let mut parents: Vec<ObjectId> = entry
            .parents
            .iter()
            .copied()
            .filter(|p| !self.visited.contains(p))
            .collect();

        if self.options.order == WalkOrder::Time && parents.len() > 1 {
            let mut dated: Vec<(i64, ObjectId)> = Vec::with_capacity(parents.len());
            for parent in parents {
                let time = self
                    .odb
                    .try_read_log_entry(&parent)?
                    .map_or(0, |e| e.commit_time);
                dated.push((time, parent));
            }
            dated.sort_by(|a, b| b.0.cmp(&a.0));
            parents = dated.into_iter().map(|(_, p)| p).collect();
        }

        for parent in parents {
            if self.visited.insert(parent) {
                self.queue.push_back(parent);
            }
        }
        Ok(())
    }

    fn within_time_bounds(&self, entry: &LogEntry) -> bool {
        if let Some(start) = self.options.start_time {
            if entry.commit_time < start {
                return false;
            }
        }
        if let Some(end) = self.options.end_time {
            if entry.commit_time > end {
                return false;
            }
        }
        true
    }

    /// Path filtering with rename following.
    ///
    /// The walk moves newest to oldest. While the path resolves, a commit
    /// is emitted only when the blob differs from the last emitted one.
    /// When the path vanishes, a rename detected against the previous
    /// (newer) tree redirects the filter to the file's earlier name;
    /// without one the file has just been introduced and the walk ends.
    fn apply_path_filter(&mut self, entry: &LogEntry) -> Result<PathDecision, WalkError> {
        let Some(state) = self.path_state.as_mut() else {
            return Ok(PathDecision::Emit);
        };

        let found = entry_at_path(self.odb, &entry.tree_id, state.current_path.as_ref())?;
        if let Some(found) = found {
            state.prev_tree = Some(entry.tree_id);
            if state.last_emitted_blob == Some(found.oid) {
                return Ok(PathDecision::Skip);
            }
            state.last_emitted_blob = Some(found.oid);
            return Ok(PathDecision::Emit);
        }

        let Some(prev_tree) = state.prev_tree else {
            // The path never existed on this line of history.
            return Ok(PathDecision::Stop);
        };

        let changes = diff_trees(
            self.odb,
            Some(&prev_tree),
            Some(&entry.tree_id),
            &DiffOptions::default(),
            &self.options.cancel,
        )?;

        let renamed = changes.into_iter().find(|c| {
            c.kind == ChangeKind::Renamed && c.old_path.as_ref() == Some(&state.current_path)
        });
        match renamed {
            Some(change) => {
                let new_path = change
                    .new_path
                    .expect("renamed changes carry both paths");
                let new_blob = change.new_entry.map(|e| e.oid);
                state.current_path = new_path;
                state.prev_tree = Some(entry.tree_id);
                // The redirect itself is not an emission; the unchanged
                // rule still applies at the file's earlier name.
                if new_blob.is_some() && new_blob == state.last_emitted_blob {
                    return Ok(PathDecision::Skip);
                }
                state.last_emitted_blob = new_blob;
                Ok(PathDecision::Emit)
            }
            // The commit after this one introduced the file.
            None => Ok(PathDecision::Stop),
        }
    }

    fn fill_topo_buffer(&mut self) -> Result<(), WalkError> {
        let mut buffer = Vec::new();
        while let Some(entry) = self.step()? {
            buffer.push(entry);
        }
        // Drained from the back: children were discovered first, so the
        // reverse emits parents first.
        self.topo_buffer = Some(buffer);
        Ok(())
    }
}

impl Iterator for LogWalk<'_> {
    type Item = Result<LogEntry, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if self.options.order == WalkOrder::Topological {
            if self.topo_buffer.is_none() {
                if let Err(e) = self.fill_topo_buffer() {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
            let next = self.topo_buffer.as_mut().and_then(|b| b.pop());
            if next.is_none() {
                self.finished = true;
            }
            return next.map(Ok);
        }

        match self.step() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
