use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::model::node::{DraftItem, Tree, TreeNode};

/// Owns the list of unsaved rows and allocates their ids.
#[derive(Debug, Clone)]
pub struct DraftManager {
    prefix: String,
    next: u64,
    drafts: Vec<DraftItem>,
}

impl DraftManager {
    pub fn new(prefix: impl Into<String>) -> Self {
        DraftManager {
            prefix: prefix.into(),
            next: 1,
            drafts: Vec::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn drafts(&self) -> &[DraftItem] {
        &self.drafts
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    /// True if `id` carries the reserved draft prefix
    pub fn is_draft_id(&self, id: &str) -> bool {
        id.starts_with(&self.prefix)
    }

    /// One draft at a time.
    pub fn can_create(&self) -> bool {
        self.drafts.is_empty()
    }

    /// Allocate a new draft under `parent_id` (root when `None`).
    /// Returns `None` when a draft already exists.
    pub fn create(&mut self, parent_id: Option<String>, order: usize) -> Option<String> {
        if !self.can_create() {
            return None;
        }
        let id = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        tracing::debug!(draft = %id, parent = ?parent_id, "draft created");
        self.drafts.push(DraftItem {
            id: id.clone(),
            parent_id,
            order,
        });
        Some(id)
    }

    pub fn get(&self, id: &str) -> Option<&DraftItem> {
        self.drafts.iter().find(|d| d.id == id)
    }

    /// Drop a draft (saved or cancelled). Returns the removed item.
    pub fn remove(&mut self, id: &str) -> Option<DraftItem> {
        let idx = self.drafts.iter().position(|d| d.id == id)?;
        Some(self.drafts.remove(idx))
    }
}

/// Insert each draft as a synthetic leaf, appended under its parent (or at
/// root level when the parent is absent or not in the tree).
///
/// Only nodes on a path to an inserted draft are rebuilt; every other branch
/// keeps its `Arc` identity.
pub fn merge_drafts_into_tree<T: Clone + Default>(
    tree: &[Arc<TreeNode<T>>],
    drafts: &[DraftItem],
) -> Tree<T> {
    if drafts.is_empty() {
        return tree.to_vec();
    }

    let mut known = HashSet::new();
    collect_ids(tree, &mut known);

    let mut by_parent: HashMap<&str, Vec<&DraftItem>> = HashMap::new();
    let mut roots = Vec::new();
    for draft in drafts {
        match draft.parent_id.as_deref() {
            Some(pid) if known.contains(pid) => by_parent.entry(pid).or_default().push(draft),
            _ => roots.push(draft),
        }
    }

    let mut merged = merge_level(tree, &by_parent).unwrap_or_else(|| tree.to_vec());
    merged.extend(roots.into_iter().map(synthetic_node));
    merged
}

/// Returns `None` when nothing at or below this level changed.
fn merge_level<T: Clone + Default>(
    nodes: &[Arc<TreeNode<T>>],
    by_parent: &HashMap<&str, Vec<&DraftItem>>,
) -> Option<Tree<T>> {
    let mut out: Option<Tree<T>> = None;

    for (i, node) in nodes.iter().enumerate() {
        let own = by_parent.get(node.id.as_str());
        let below = merge_level(&node.children, by_parent);
        if own.is_none() && below.is_none() {
            continue;
        }

        let mut children = below.unwrap_or_else(|| node.children.clone());
        if let Some(drafts) = own {
            children.extend(drafts.iter().copied().map(synthetic_node));
        }
        let replaced = Arc::new(TreeNode {
            id: node.id.clone(),
            data: node.data.clone(),
            children,
        });
        out.get_or_insert_with(|| nodes.to_vec())[i] = replaced;
    }
    out
}

fn synthetic_node<T: Default>(draft: &DraftItem) -> Arc<TreeNode<T>> {
    Arc::new(TreeNode::new(draft.id.clone(), T::default()))
}

fn collect_ids<'a, T>(nodes: &'a [Arc<TreeNode<T>>], ids: &mut HashSet<&'a str>) {
    for node in nodes {
        ids.insert(node.id.as_str());
        collect_ids(&node.children, ids);
    }
}
