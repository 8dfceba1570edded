use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use bstr::{BString, ByteSlice};
use tracing::trace;

use super::StoreClient;
use crate::error::CodecError;
use crate::record::{IndexRecord, Stage};

/// Width of the fake hashes handed out by [`MemoryStore`].
const HASH_LEN: usize = 40;

/// Mode given to files staged from the working tree without prior record.
const DEFAULT_MODE: &str = "100644";

type Tree = BTreeMap<BString, (String, String)>;

#[derive(Debug, Clone)]
struct Commit {
    message: String,
    tree: Tree,
}

#[derive(Debug, Default)]
struct State {
    index: BTreeMap<(BString, Stage), (String, String)>,
    worktree: BTreeMap<BString, Vec<u8>>,
    blobs: HashMap<String, Vec<u8>>,
    blob_ids: HashMap<Vec<u8>, String>,
    commits: Vec<Commit>,
    fail_on: Option<String>,
}

impl State {
    fn write_blob(&mut self, content: &[u8]) -> String {
        if let Some(hash) = self.blob_ids.get(content) {
            return hash.clone();
        }
        let hash = format!("{:0width$x}", self.blobs.len() + 1, width = HASH_LEN);
        self.blobs.insert(hash.clone(), content.to_vec());
        self.blob_ids.insert(content.to_vec(), hash.clone());
        hash
    }

    fn drop_path(&mut self, path: &[u8]) {
        self.index.retain(|(p, _), _| p.as_slice() != path);
    }

    fn has_path(&self, path: &[u8]) -> bool {
        self.index.keys().any(|(p, _)| p.as_slice() == path)
    }

    fn resolved(&self, path: &[u8]) -> Option<&(String, String)> {
        self.index.get(&(BString::from(path), Stage::Resolved))
    }

    fn records(&self) -> Vec<IndexRecord> {
        self.index
            .iter()
            .map(|((path, stage), (mode, hash))| {
                IndexRecord::new(mode, hash, *stage, path.clone())
            })
            .collect()
    }

    fn check_failure(&self, operation: &str) -> Result<(), CodecError> {
        if self.fail_on.as_deref() == Some(operation) {
            return Err(CodecError::store_failure(
                operation,
                1,
                "injected failure",
            ));
        }
        Ok(())
    }
}

fn missing(operation: &str, path: &[u8]) -> CodecError {
    CodecError::store_failure(
        operation,
        128,
        format!("pathspec '{}' did not match any files", path.as_bstr()),
    )
}

/// In-memory [`StoreClient`] with git's index semantics.
///
/// Index, working tree, blobs and a linear commit history live behind a
/// `RefCell`. Tests seed it with [`MemoryStore::add_conflict`] and friends
/// and can make one operation fail with [`MemoryStore::fail_on`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RefCell<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `content` as a blob and returns its hash.
    pub fn write_blob(&self, content: &[u8]) -> String {
        self.state.borrow_mut().write_blob(content)
    }

    /// Reads a blob by hash.
    pub fn blob(&self, hash: &str) -> Option<Vec<u8>> {
        self.state.borrow().blobs.get(hash).cloned()
    }

    /// Writes a working-tree file.
    pub fn write_file(&self, path: impl AsRef<[u8]>, content: &[u8]) {
        self.state
            .borrow_mut()
            .worktree
            .insert(BString::from(path.as_ref()), content.to_vec());
    }

    /// Reads a working-tree file.
    pub fn read_file(&self, path: impl AsRef<[u8]>) -> Option<Vec<u8>> {
        self.state.borrow().worktree.get(path.as_ref().as_bstr()).cloned()
    }

    /// Paths currently present in the working tree.
    pub fn worktree_paths(&self) -> Vec<BString> {
        self.state.borrow().worktree.keys().cloned().collect()
    }

    /// Stages `content` at `path` (stage 0) and writes it to the working tree.
    pub fn add_file(&self, path: impl AsRef<[u8]>, content: &[u8]) -> String {
        let path = BString::from(path.as_ref());
        let mut state = self.state.borrow_mut();
        let hash = state.write_blob(content);
        state.drop_path(&path);
        state.index.insert(
            (path.clone(), Stage::Resolved),
            (DEFAULT_MODE.to_string(), hash.clone()),
        );
        state.worktree.insert(path, content.to_vec());
        hash
    }

    /// Seeds an unmerged path with one record per `(stage, content)` and
    /// writes `worktree` (if any) at the path.
    pub fn add_conflict(
        &self,
        path: impl AsRef<[u8]>,
        versions: &[(Stage, &[u8])],
        worktree: Option<&[u8]>,
    ) -> Vec<IndexRecord> {
        let path = BString::from(path.as_ref());
        let mut state = self.state.borrow_mut();
        state.drop_path(&path);
        let mut records = Vec::new();
        for (stage, content) in versions {
            let hash = state.write_blob(content);
            state.index.insert(
                (path.clone(), *stage),
                (DEFAULT_MODE.to_string(), hash.clone()),
            );
            records.push(IndexRecord::new(DEFAULT_MODE, hash, *stage, path.clone()));
        }
        match worktree {
            Some(content) => {
                state.worktree.insert(path, content.to_vec());
            }
            None => {
                state.worktree.remove(&path);
            }
        }
        records
    }

    /// Commits the whole stage-0 index with `message`.
    pub fn commit_all(&self, message: &str) {
        let mut state = self.state.borrow_mut();
        let tree = state
            .index
            .iter()
            .filter(|((_, stage), _)| *stage == Stage::Resolved)
            .map(|((path, _), entry)| (path.clone(), entry.clone()))
            .collect();
        state.commits.push(Commit {
            message: message.to_string(),
            tree,
        });
    }

    /// Snapshot of every index record.
    pub fn index(&self) -> Vec<IndexRecord> {
        self.state.borrow().records()
    }

    /// Number of commits in the linear history.
    pub fn commit_count(&self) -> usize {
        self.state.borrow().commits.len()
    }

    /// Tree of the current commit as `(mode, hash, path)` stage-0 records.
    pub fn head_tree(&self) -> Vec<IndexRecord> {
        self.state
            .borrow()
            .commits
            .last()
            .map(|commit| {
                commit
                    .tree
                    .iter()
                    .map(|(path, (mode, hash))| {
                        IndexRecord::new(mode, hash, Stage::Resolved, path.clone())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Makes every later call of `operation` fail with status 1.
    pub fn fail_on(&self, operation: &str) {
        self.state.borrow_mut().fail_on = Some(operation.to_string());
    }

    /// Clears an injected failure.
    pub fn clear_failure(&self) {
        self.state.borrow_mut().fail_on = None;
    }
}

impl StoreClient for MemoryStore {
    fn list_unmerged(&self) -> Result<Vec<IndexRecord>, CodecError> {
        let state = self.state.borrow();
        state.check_failure("ls-files")?;
        Ok(state
            .records()
            .into_iter()
            .filter(|r| r.stage.is_unmerged())
            .collect())
    }

    fn list_staged(&self) -> Result<Vec<IndexRecord>, CodecError> {
        let state = self.state.borrow();
        state.check_failure("ls-files")?;
        Ok(state.records())
    }

    fn update_index(&self, records: &[IndexRecord]) -> Result<(), CodecError> {
        let mut state = self.state.borrow_mut();
        state.check_failure("update-index")?;
        for record in records {
            trace!(record = %record, "memory update-index");
            if record.is_removal() {
                state.drop_path(&record.path);
                continue;
            }
            if record.stage == Stage::Resolved {
                state.drop_path(&record.path);
            } else if state
                .index
                .contains_key(&(record.path.clone(), Stage::Resolved))
            {
                // git requires a removal line before higher stages.
                return Err(CodecError::store_failure(
                    "update-index",
                    128,
                    format!("{}: stage 0 entry present", record.path),
                ));
            }
            state.index.insert(
                (record.path.clone(), record.stage),
                (record.mode.clone(), record.hash.clone()),
            );
        }
        Ok(())
    }

    fn stage_paths(&self, paths: &[BString]) -> Result<(), CodecError> {
        let mut state = self.state.borrow_mut();
        state.check_failure("add")?;
        for path in paths {
            let known = state.has_path(path);
            match state.worktree.get(path).cloned() {
                Some(content) => {
                    let mode = [Stage::Ours, Stage::Resolved, Stage::Theirs, Stage::Base]
                        .iter()
                        .find_map(|s| state.index.get(&(path.clone(), *s)))
                        .map(|(mode, _)| mode.clone())
                        .unwrap_or_else(|| DEFAULT_MODE.to_string());
                    let hash = state.write_blob(&content);
                    state.drop_path(path);
                    state
                        .index
                        .insert((path.clone(), Stage::Resolved), (mode, hash));
                }
                None if known => state.drop_path(path),
                None => return Err(missing("add", path)),
            }
        }
        Ok(())
    }

    fn remove_paths(&self, paths: &[BString]) -> Result<(), CodecError> {
        let mut state = self.state.borrow_mut();
        state.check_failure("rm")?;
        if let Some(path) = paths.iter().find(|p| !state.has_path(p)) {
            return Err(missing("rm", path));
        }
        for path in paths {
            state.drop_path(path);
            state.worktree.remove(path);
        }
        Ok(())
    }

    fn checkout_paths(&self, paths: &[BString]) -> Result<(), CodecError> {
        let mut state = self.state.borrow_mut();
        state.check_failure("checkout")?;
        for path in paths {
            let (_, hash) = state
                .resolved(path)
                .cloned()
                .ok_or_else(|| missing("checkout", path))?;
            let content = state.blobs.get(&hash).cloned().unwrap_or_default();
            state.worktree.insert(path.clone(), content);
        }
        Ok(())
    }

    fn commit_paths(&self, message: &str, paths: &[BString]) -> Result<(), CodecError> {
        let mut state = self.state.borrow_mut();
        state.check_failure("commit")?;
        let mut tree = state
            .commits
            .last()
            .map(|c| c.tree.clone())
            .unwrap_or_default();
        for path in paths {
            match state.resolved(path) {
                Some(entry) => {
                    tree.insert(path.clone(), entry.clone());
                }
                None => {
                    if tree.remove(path).is_none() {
                        return Err(missing("commit", path));
                    }
                }
            }
        }
        state.commits.push(Commit {
            message: message.to_string(),
            tree,
        });
        Ok(())
    }

    fn committed_paths(&self, paths: &[BString]) -> Result<Vec<BString>, CodecError> {
        let state = self.state.borrow();
        state.check_failure("ls-tree")?;
        let Some(head) = state.commits.last() else {
            return Ok(Vec::new());
        };
        Ok(paths
            .iter()
            .filter(|p| head.tree.contains_key(*p))
            .cloned()
            .collect())
    }

    fn head_message(&self) -> Result<Option<String>, CodecError> {
        let state = self.state.borrow();
        state.check_failure("log")?;
        Ok(state.commits.last().map(|c| c.message.clone()))
    }

    fn reset_soft_parent(&self) -> Result<(), CodecError> {
        let mut state = self.state.borrow_mut();
        state.check_failure("reset")?;
        if state.commits.len() < 2 {
            return Err(CodecError::store_failure(
                "reset",
                128,
                "ambiguous argument 'HEAD^': unknown revision",
            ));
        }
        state.commits.pop();
        Ok(())
    }

    fn path_exists(&self, path: &[u8]) -> bool {
        self.state.borrow().worktree.contains_key(path.as_bstr())
    }

    fn rename_path(&self, from: &[u8], to: &[u8]) -> Result<(), CodecError> {
        let mut state = self.state.borrow_mut();
        let content = state
            .worktree
            .remove(from.as_bstr())
            .ok_or_else(|| CodecError::Io {
                path: from.to_path_lossy().into_owned(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })?;
        state.worktree.insert(BString::from(to), content);
        Ok(())
    }

    fn discard_file(&self, path: &[u8]) -> Result<(), CodecError> {
        self.state.borrow_mut().worktree.remove(path.as_bstr());
        Ok(())
    }
}
