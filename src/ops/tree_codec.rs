use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::model::node::{FlattenedNode, Tree, TreeNode};

/// Error type for structural tree edits
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("node not found: {0}")]
    NotFound(String),
    #[error("parent not found: {0}")]
    ParentNotFound(String),
    #[error("cannot move {0} under itself")]
    SelfParent(String),
    #[error("cannot move {node} under its own descendant {parent}")]
    Descendant { node: String, parent: String },
}

/// A structural problem reported by `check_ids`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeIssue {
    #[error("duplicate id {id} ({count} occurrences)")]
    DuplicateId { id: String, count: usize },
    #[error("node with empty id at depth {depth}")]
    EmptyId { depth: usize },
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Total node count including all descendants. Always equals `flatten(tree).len()`.
pub fn count_nodes<T>(tree: &[Arc<TreeNode<T>>]) -> usize {
    tree.iter().map(|n| 1 + count_nodes(&n.children)).sum()
}

/// Depth-first search for a node by id.
pub fn find_by_id<'a, T>(tree: &'a [Arc<TreeNode<T>>], id: &str) -> Option<&'a Arc<TreeNode<T>>> {
    for node in tree {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find_by_id(&node.children, id) {
            return Some(found);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Flatten / rebuild
// ---------------------------------------------------------------------------

/// Pre-order flatten, annotating depth, parent, ancestor chain and flat index.
pub fn flatten<T>(tree: &[Arc<TreeNode<T>>]) -> Vec<FlattenedNode<T>> {
    let mut items = Vec::with_capacity(count_nodes(tree));
    flatten_into(tree, None, &[], 0, &mut items);
    items
}

fn flatten_into<T>(
    nodes: &[Arc<TreeNode<T>>],
    parent_id: Option<&str>,
    ancestors: &[String],
    depth: usize,
    items: &mut Vec<FlattenedNode<T>>,
) {
    for node in nodes {
        items.push(FlattenedNode {
            node: Arc::clone(node),
            depth,
            parent_id: parent_id.map(str::to_string),
            ancestor_ids: ancestors.to_vec(),
            flat_index: items.len(),
        });

        if node.has_children() {
            let mut chain = ancestors.to_vec();
            chain.push(node.id.clone());
            flatten_into(&node.children, Some(&node.id), &chain, depth + 1, items);
        }
    }
}

/// Inverse of `flatten`. Each entry is cloned without children and attached
/// to its `parent_id`; entries whose parent cannot be resolved become roots.
///
/// Duplicate ids resolve to their first occurrence. Child order follows the
/// order of the flat list.
pub fn rebuild<T: Clone>(flat: &[FlattenedNode<T>]) -> Tree<T> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(flat.len());
    for (i, item) in flat.iter().enumerate() {
        index.entry(item.id()).or_insert(i);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); flat.len()];
    let mut roots = Vec::new();
    for (i, item) in flat.iter().enumerate() {
        match item.parent_id.as_deref().and_then(|p| index.get(p)) {
            Some(&parent) if parent != i => children[parent].push(i),
            _ => roots.push(i),
        }
    }

    roots
        .into_iter()
        .map(|i| assemble(i, flat, &children))
        .collect()
}

fn assemble<T: Clone>(
    i: usize,
    flat: &[FlattenedNode<T>],
    children: &[Vec<usize>],
) -> Arc<TreeNode<T>> {
    let mut node = flat[i].node.detached();
    node.children = children[i]
        .iter()
        .map(|&c| assemble(c, flat, children))
        .collect();
    Arc::new(node)
}

/// Rows actually shown: descendants of collapsed rows are dropped and
/// `flat_index` is renumbered to the visible position.
pub fn visible_rows<T>(
    flat: &[FlattenedNode<T>],
    expanded: &HashSet<String>,
) -> Vec<FlattenedNode<T>> {
    let mut rows = Vec::with_capacity(flat.len());
    let mut hidden_below: Option<usize> = None;

    for item in flat {
        if let Some(depth) = hidden_below {
            if item.depth > depth {
                continue;
            }
            hidden_below = None;
        }
        if item.node.has_children() && !expanded.contains(item.id()) {
            hidden_below = Some(item.depth);
        }
        let mut row = item.clone();
        row.flat_index = rows.len();
        rows.push(row);
    }
    rows
}

// ---------------------------------------------------------------------------
// Structural edits
// ---------------------------------------------------------------------------

/// Replace one node via `f`, copying only the path from the root to it.
/// Returns `None` if the id is not in the tree.
pub fn update_node<T: Clone>(
    tree: &[Arc<TreeNode<T>>],
    id: &str,
    f: impl FnOnce(&mut TreeNode<T>),
) -> Option<Tree<T>> {
    let mut f = Some(f);
    update_inner(tree, id, &mut f)
}

fn update_inner<T: Clone, F: FnOnce(&mut TreeNode<T>)>(
    nodes: &[Arc<TreeNode<T>>],
    id: &str,
    f: &mut Option<F>,
) -> Option<Tree<T>> {
    for (i, node) in nodes.iter().enumerate() {
        let replacement = if node.id == id {
            let mut owned = (**node).clone();
            if let Some(f) = f.take() {
                f(&mut owned);
            }
            Some(owned)
        } else {
            update_inner(&node.children, id, f).map(|children| TreeNode {
                id: node.id.clone(),
                data: node.data.clone(),
                children,
            })
        };

        if let Some(replacement) = replacement {
            let mut out = nodes.to_vec();
            out[i] = Arc::new(replacement);
            return Some(out);
        }
    }
    None
}

/// Move a subtree under `parent_id` (root when `None`) at the 1-based
/// sibling position `order`. Out-of-range orders are clamped.
pub fn apply_move<T: Clone>(
    tree: &[Arc<TreeNode<T>>],
    node_id: &str,
    parent_id: Option<&str>,
    order: usize,
) -> Result<Tree<T>, TreeError> {
    let node = find_by_id(tree, node_id).ok_or_else(|| TreeError::NotFound(node_id.to_string()))?;

    if let Some(pid) = parent_id {
        if pid == node_id {
            return Err(TreeError::SelfParent(node_id.to_string()));
        }
        if find_by_id(&node.children, pid).is_some() {
            return Err(TreeError::Descendant {
                node: node_id.to_string(),
                parent: pid.to_string(),
            });
        }
        if find_by_id(tree, pid).is_none() {
            return Err(TreeError::ParentNotFound(pid.to_string()));
        }
    }

    let (remaining, moved) =
        detach(tree, node_id).ok_or_else(|| TreeError::NotFound(node_id.to_string()))?;

    match parent_id {
        None => {
            let mut roots = remaining;
            insert_at(&mut roots, order, moved);
            Ok(roots)
        }
        Some(pid) => update_node(&remaining, pid, |parent| {
            insert_at(&mut parent.children, order, moved)
        })
        .ok_or_else(|| TreeError::ParentNotFound(pid.to_string())),
    }
}

/// Insert a new node under `parent_id` (root when `None`) at the 1-based
/// position `order`, clamped like `apply_move`.
pub fn insert_node<T: Clone>(
    tree: &[Arc<TreeNode<T>>],
    parent_id: Option<&str>,
    order: usize,
    node: TreeNode<T>,
) -> Result<Tree<T>, TreeError> {
    let node = Arc::new(node);
    match parent_id {
        None => {
            let mut roots = tree.to_vec();
            insert_at(&mut roots, order, node);
            Ok(roots)
        }
        Some(pid) => update_node(tree, pid, |parent| insert_at(&mut parent.children, order, node))
            .ok_or_else(|| TreeError::ParentNotFound(pid.to_string())),
    }
}

/// Remove a subtree, returning the remaining tree and the detached node.
fn detach<T: Clone>(
    nodes: &[Arc<TreeNode<T>>],
    id: &str,
) -> Option<(Tree<T>, Arc<TreeNode<T>>)> {
    if let Some(pos) = nodes.iter().position(|n| n.id == id) {
        let mut out = nodes.to_vec();
        let removed = out.remove(pos);
        return Some((out, removed));
    }
    for (i, node) in nodes.iter().enumerate() {
        if let Some((children, removed)) = detach(&node.children, id) {
            let mut out = nodes.to_vec();
            out[i] = Arc::new(TreeNode {
                id: node.id.clone(),
                data: node.data.clone(),
                children,
            });
            return Some((out, removed));
        }
    }
    None
}

fn insert_at<T>(list: &mut Vec<Arc<TreeNode<T>>>, order: usize, node: Arc<TreeNode<T>>) {
    let idx = order.saturating_sub(1).min(list.len());
    list.insert(idx, node);
}

/// Report duplicate and empty ids. `flatten`/`rebuild` do not validate these.
pub fn check_ids<T>(tree: &[Arc<TreeNode<T>>]) -> Vec<TreeIssue> {
    let mut issues = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();

    let flat = flatten(tree);
    for item in &flat {
        if item.id().is_empty() {
            issues.push(TreeIssue::EmptyId { depth: item.depth });
            continue;
        }
        let count = counts.entry(item.id()).or_insert(0);
        if *count == 0 {
            first_seen.push(item.id());
        }
        *count += 1;
    }
    for id in first_seen {
        let count = counts[id];
        if count > 1 {
            issues.push(TreeIssue::DuplicateId {
                id: id.to_string(),
                count,
            });
        }
    }
    issues
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
