use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A node in the source tree. Children are shared immutably so that edits
/// only allocate along the changed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode<T> {
    /// Unique within the tree
    pub id: String,
    /// Domain payload (opaque to the engine)
    pub data: T,
    /// Ordered children
    #[serde(default)]
    pub children: Vec<Arc<TreeNode<T>>>,
}

/// A forest: the ordered root-level nodes.
pub type Tree<T> = Vec<Arc<TreeNode<T>>>;

impl<T> TreeNode<T> {
    /// Create a leaf node
    pub fn new(id: impl Into<String>, data: T) -> Self {
        TreeNode {
            id: id.into(),
            data,
            children: Vec::new(),
        }
    }

    /// Builder-style: attach children
    pub fn with_children(mut self, children: Vec<TreeNode<T>>) -> Self {
        self.children = children.into_iter().map(Arc::new).collect();
        self
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

impl<T: Clone> TreeNode<T> {
    /// Clone this node's id and data with an empty child list.
    pub fn detached(&self) -> Self {
        TreeNode {
            id: self.id.clone(),
            data: self.data.clone(),
            children: Vec::new(),
        }
    }
}

/// A tree node annotated with its position in the pre-order flat list.
#[derive(Debug)]
pub struct FlattenedNode<T> {
    pub node: Arc<TreeNode<T>>,
    /// Nesting depth (0 = root level)
    pub depth: usize,
    /// Immediate container, `None` at root level
    pub parent_id: Option<String>,
    /// Root → parent chain
    pub ancestor_ids: Vec<String>,
    /// Pre-order position
    pub flat_index: usize,
}

// Manual impl: cloning shares the node, so `T` need not be `Clone`.
impl<T> Clone for FlattenedNode<T> {
    fn clone(&self) -> Self {
        FlattenedNode {
            node: Arc::clone(&self.node),
            depth: self.depth,
            parent_id: self.parent_id.clone(),
            ancestor_ids: self.ancestor_ids.clone(),
            flat_index: self.flat_index,
        }
    }
}

impl<T> FlattenedNode<T> {
    pub fn id(&self) -> &str {
        &self.node.id
    }

    pub fn data(&self) -> &T {
        &self.node.data
    }

    /// True if `id` is this node's parent or any further ancestor
    pub fn has_ancestor(&self, id: &str) -> bool {
        self.ancestor_ids.iter().any(|a| a == id)
    }
}

/// Where a dragged node would land if dropped now.
#[derive(Debug, Clone)]
pub struct DragProjection<T> {
    /// Projected depth, always within `[min_depth, max_depth]`
    pub depth: usize,
    pub max_depth: usize,
    pub min_depth: usize,
    pub parent_id: Option<String>,
    pub parent_node: Option<FlattenedNode<T>>,
    pub can_drop: bool,
    pub reason: Option<crate::ops::validator::MoveRejection>,
}

impl<T> DragProjection<T> {
    /// A projection that cannot be dropped, at root level.
    pub fn rejected(reason: crate::ops::validator::MoveRejection) -> Self {
        DragProjection {
            depth: 0,
            max_depth: 0,
            min_depth: 0,
            parent_id: None,
            parent_node: None,
            can_drop: false,
            reason: Some(reason),
        }
    }
}

/// An unsaved, client-only placeholder row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftItem {
    /// Carries the reserved draft prefix
    pub id: String,
    pub parent_id: Option<String>,
    /// Placeholder position; the store recalculates it on save
    pub order: usize,
}
