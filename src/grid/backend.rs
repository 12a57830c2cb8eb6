use crate::grid::session::SaveRequest;
use crate::model::node::DraftItem;

/// An accepted drop, to be persisted before the tree changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub node_id: String,
    pub new_parent_id: Option<String>,
    /// 1-based position among the new siblings
    pub new_order: usize,
}

/// Persistence collaborators of the grid.
///
/// `Ok(false)` and `Err` both mean "not persisted"; the grid stays as it was.
pub trait GridBackend<C> {
    type Error: std::fmt::Display;

    fn persist_move(&mut self, request: &MoveRequest) -> Result<bool, Self::Error>;

    /// Called once per committed edit. `draft` carries the intended placement
    /// when an unsaved row is being promoted.
    fn persist_edit(
        &mut self,
        request: &SaveRequest<C>,
        draft: Option<&DraftItem>,
    ) -> Result<bool, Self::Error>;
}
