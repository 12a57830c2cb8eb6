use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::grid::backend::{GridBackend, MoveRequest};
use crate::grid::session::SaveRequest;
use crate::model::node::{DraftItem, Tree, TreeNode};
use crate::model::record::{Record, RecordChanges};
use crate::ops::tree_codec::{TreeError, apply_move, find_by_id, flatten, insert_node, update_node};

/// Error type for tree file operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not serialize tree: {0}")]
    SerializeError(#[from] serde_json::Error),
    #[error("{0}")]
    Tree(#[from] TreeError),
}

/// On-disk layout of the tree file
#[derive(Debug, Default, Serialize, Deserialize)]
struct TreeFile {
    #[serde(default)]
    nodes: Tree<Record>,
}

/// Write `content` to `path` through a temp file in the same directory, so
/// readers never observe a partial file.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// The JSON tree file of a workspace. Every change is written through
/// immediately.
#[derive(Debug, Clone)]
pub struct TreeStore {
    path: PathBuf,
    id_prefix: String,
    tree: Tree<Record>,
    last_created: Option<String>,
}

impl TreeStore {
    /// Load an existing tree file.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut store = TreeStore::with_tree(path, Vec::new());
        store.reload()?;
        Ok(store)
    }

    /// Write an empty tree file, replacing any existing one.
    pub fn create(path: &Path) -> Result<Self, StoreError> {
        let store = TreeStore::with_tree(path, Vec::new());
        store.save()?;
        Ok(store)
    }

    /// A store over an in-memory tree. Nothing is written until a change.
    pub fn with_tree(path: &Path, tree: Tree<Record>) -> Self {
        TreeStore {
            path: path.to_path_buf(),
            id_prefix: "N".into(),
            tree,
            last_created: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tree(&self) -> &Tree<Record> {
        &self.tree
    }

    /// Id assigned by the most recent `add`
    pub fn last_created(&self) -> Option<&str> {
        self.last_created.as_deref()
    }

    /// Re-read the file after an external change.
    pub fn reload(&mut self) -> Result<(), StoreError> {
        let text = fs::read_to_string(&self.path).map_err(|e| StoreError::ReadError {
            path: self.path.clone(),
            source: e,
        })?;
        let file: TreeFile = serde_json::from_str(&text).map_err(|e| StoreError::ParseError {
            path: self.path.clone(),
            source: e,
        })?;
        self.tree = file.nodes;
        Ok(())
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let file = TreeFile {
            nodes: self.tree.clone(),
        };
        let mut content = serde_json::to_string_pretty(&file)?;
        content.push('\n');
        atomic_write(&self.path, content.as_bytes()).map_err(|e| StoreError::WriteError {
            path: self.path.clone(),
            source: e,
        })?;
        tracing::debug!(path = %self.path.display(), "tree written");
        Ok(())
    }

    /// Next free id of the form `N-001`
    pub fn next_id(&self) -> String {
        let max = flatten(&self.tree)
            .iter()
            .filter_map(|row| {
                row.id()
                    .strip_prefix(&self.id_prefix)?
                    .strip_prefix('-')?
                    .parse::<usize>()
                    .ok()
            })
            .max()
            .unwrap_or(0);
        format!("{}-{:03}", self.id_prefix, max + 1)
    }

    /// Add a record under `parent_id` at the 1-based `order` (clamped).
    pub fn add(
        &mut self,
        parent_id: Option<&str>,
        order: usize,
        record: Record,
    ) -> Result<String, StoreError> {
        let id = self.next_id();
        let tree = insert_node(&self.tree, parent_id, order, TreeNode::new(id.clone(), record))?;
        self.commit(tree)?;
        tracing::info!(id = %id, parent = ?parent_id, "record added");
        self.last_created = Some(id.clone());
        Ok(id)
    }

    pub fn edit(&mut self, id: &str, changes: &RecordChanges) -> Result<(), StoreError> {
        let tree = update_node(&self.tree, id, |node| changes.apply(&mut node.data))
            .ok_or_else(|| TreeError::NotFound(id.to_string()))?;
        self.commit(tree)?;
        tracing::info!(id, "record updated");
        Ok(())
    }

    pub fn move_node(&mut self, request: &MoveRequest) -> Result<(), StoreError> {
        let tree = apply_move(
            &self.tree,
            &request.node_id,
            request.new_parent_id.as_deref(),
            request.new_order,
        )?;
        self.commit(tree)?;
        tracing::info!(
            id = %request.node_id,
            parent = ?request.new_parent_id,
            order = request.new_order,
            "record moved"
        );
        Ok(())
    }

    /// Write `tree` and keep it only if the write succeeded.
    fn commit(&mut self, tree: Tree<Record>) -> Result<(), StoreError> {
        let previous = std::mem::replace(&mut self.tree, tree);
        if let Err(e) = self.save() {
            self.tree = previous;
            return Err(e);
        }
        Ok(())
    }
}

impl GridBackend<RecordChanges> for TreeStore {
    type Error = StoreError;

    fn persist_move(&mut self, request: &MoveRequest) -> Result<bool, StoreError> {
        self.move_node(request)?;
        Ok(true)
    }

    fn persist_edit(
        &mut self,
        request: &SaveRequest<RecordChanges>,
        draft: Option<&DraftItem>,
    ) -> Result<bool, StoreError> {
        match draft {
            Some(draft) => {
                let mut record = Record::default();
                request.changes.apply(&mut record);
                // A draft whose parent vanished lands at root level
                let parent = draft
                    .parent_id
                    .as_deref()
                    .filter(|pid| find_by_id(&self.tree, pid).is_some());
                self.add(parent, draft.order, record)?;
            }
            None => self.edit(&request.row_id, &request.changes)?,
        }
        Ok(true)
    }
}
