use std::collections::HashSet;

use crate::grid::backend::{GridBackend, MoveRequest};
use crate::grid::session::{
    ClickTarget, EditHooks, EditSession, GridKey, Resolved, SaveRequest, Step,
};
use crate::model::node::{DragProjection, FlattenedNode, Tree};
use crate::ops::drafts::{DraftManager, merge_drafts_into_tree};
use crate::ops::projection::{compute_order, project};
use crate::ops::tree_codec::{apply_move, find_by_id, flatten, visible_rows};
use crate::ops::validator::{MoveRejection, MoveValidator};

/// An in-progress drag
#[derive(Debug, Clone, PartialEq)]
pub struct DragGesture {
    pub active_id: String,
    pub over_id: String,
    /// Cumulative horizontal travel since the drag started
    pub offset_x: f64,
}

/// Result of releasing a drag
#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    /// No drag was active
    NoDrag,
    /// The projection was not droppable; nothing changes
    Rejected(MoveRejection),
    /// Dropped where it already was
    Unmoved,
    /// Persist this, then call `finish_move`
    Persist(MoveRequest),
}

/// One grid instance: source tree, drafts, expansion, edit session and drag.
///
/// Drafts are merged into the rows before flattening, so drags and edits see
/// them as ordinary rows with a reserved id prefix.
pub struct Grid<T, H: EditHooks<T>> {
    tree: Tree<T>,
    drafts: DraftManager,
    expanded: HashSet<String>,
    session: EditSession<T, H>,
    validator: Option<Box<dyn MoveValidator<T>>>,
    indentation_width: f64,
    drag: Option<DragGesture>,
    pending_move: Option<MoveRequest>,
}

impl<T: Clone + Default, H: EditHooks<T>> Grid<T, H> {
    pub fn new(tree: Tree<T>, hooks: H, draft_prefix: &str, indentation_width: f64) -> Self {
        Grid {
            tree,
            drafts: DraftManager::new(draft_prefix),
            expanded: HashSet::new(),
            session: EditSession::new(hooks, draft_prefix),
            validator: None,
            indentation_width,
            drag: None,
            pending_move: None,
        }
    }

    /// Replace the structural checks with a domain validator.
    pub fn set_validator(&mut self, validator: Box<dyn MoveValidator<T>>) {
        self.validator = Some(validator);
    }

    /// Distance of one depth level, in the unit of drag offsets.
    pub fn set_indentation_width(&mut self, width: f64) {
        self.indentation_width = width;
    }

    pub fn indentation_width(&self) -> f64 {
        self.indentation_width
    }

    /// Change the reserved draft prefix. Refused while a draft exists.
    pub fn set_draft_prefix(&mut self, prefix: &str) -> bool {
        if !self.drafts.is_empty() {
            return false;
        }
        self.drafts = DraftManager::new(prefix);
        self.session.set_draft_prefix(prefix);
        true
    }

    pub fn tree(&self) -> &Tree<T> {
        &self.tree
    }

    /// Replace the source tree after a data refresh.
    pub fn set_tree(&mut self, tree: Tree<T>) {
        self.tree = tree;
    }

    pub fn drafts(&self) -> &DraftManager {
        &self.drafts
    }

    pub fn session(&self) -> &EditSession<T, H> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut EditSession<T, H> {
        &mut self.session
    }

    pub fn expanded(&self) -> &HashSet<String> {
        &self.expanded
    }

    pub fn set_expanded(&mut self, expanded: HashSet<String>) {
        self.expanded = expanded;
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    pub fn toggle_expanded(&mut self, id: &str) {
        if !self.expanded.remove(id) {
            self.expanded.insert(id.to_string());
        }
    }

    /// All rows (drafts included), ignoring expansion
    pub fn all_rows(&self) -> Vec<FlattenedNode<T>> {
        flatten(&merge_drafts_into_tree(&self.tree, self.drafts.drafts()))
    }

    /// The rows currently shown
    pub fn rows(&self) -> Vec<FlattenedNode<T>> {
        visible_rows(&self.all_rows(), &self.expanded)
    }

    // -----------------------------------------------------------------------
    // Drafts
    // -----------------------------------------------------------------------

    pub fn can_create_draft(&self) -> bool {
        self.drafts.can_create() && !self.session.is_editing() && !self.session.is_saving()
    }

    /// Add an unsaved row under `parent_id` (root when `None`) and start
    /// editing it. A collapsed parent is expanded so the row is visible.
    pub fn create_draft(&mut self, parent_id: Option<&str>) -> Option<String> {
        if !self.can_create_draft() {
            return None;
        }
        let order = match parent_id {
            Some(pid) => find_by_id(&self.tree, pid)?.children.len() + 1,
            None => self.tree.len() + 1,
        };
        let id = self.drafts.create(parent_id.map(str::to_string), order)?;
        if let Some(pid) = parent_id {
            self.expanded.insert(pid.to_string());
        }
        self.session.enter(&id, None);
        Some(id)
    }

    /// External cancellation of a draft.
    pub fn cancel_draft(&mut self, id: &str) {
        if self.session.selected_row_id() == Some(id) {
            self.session.clear();
        }
        if self.drafts.remove(id).is_some() {
            tracing::debug!(draft = id, "draft cancelled");
        }
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    pub fn handle_key(&mut self, key: GridKey) -> Step<H::Changes> {
        let rows = self.rows();
        let step = self.session.handle_key(key, &rows);
        self.after_step(step)
    }

    pub fn handle_row_click(
        &mut self,
        row_id: &str,
        column: Option<&str>,
        target: ClickTarget,
    ) -> Step<H::Changes> {
        if self.drag.is_some() {
            return Step::Ignored;
        }
        let rows = self.rows();
        let step = self.session.handle_row_click(row_id, column, target, &rows);
        self.after_step(step)
    }

    pub fn handle_click_outside(&mut self, inside_popover: bool) -> Step<H::Changes> {
        let rows = self.rows();
        let step = self.session.handle_click_outside(inside_popover, &rows);
        self.after_step(step)
    }

    pub fn handle_filter_interaction(&mut self) -> Step<H::Changes> {
        let rows = self.rows();
        let step = self.session.handle_filter_interaction(&rows);
        self.after_step(step)
    }

    /// Settle the in-flight save; a saved draft leaves the draft list.
    pub fn finish_save(&mut self, result: Result<bool, String>) -> Option<Resolved<H::Changes>> {
        let resolved = self.session.finish_save(result)?;
        if resolved.saved && resolved.was_draft {
            self.drafts.remove(&resolved.row_id);
        }
        Some(resolved)
    }

    /// Persist a save request through `backend` and settle it.
    pub fn resolve_save<B: GridBackend<H::Changes>>(
        &mut self,
        backend: &mut B,
        request: &SaveRequest<H::Changes>,
    ) -> Option<Resolved<H::Changes>> {
        let draft = self.drafts.get(&request.row_id).cloned();
        let result = backend
            .persist_edit(request, draft.as_ref())
            .map_err(|e| e.to_string());
        self.finish_save(result)
    }

    fn after_step(&mut self, step: Step<H::Changes>) -> Step<H::Changes> {
        if let Step::DraftCancelled(id) = &step {
            self.drafts.remove(id);
        }
        step
    }

    // -----------------------------------------------------------------------
    // Drag
    // -----------------------------------------------------------------------

    pub fn drag(&self) -> Option<&DragGesture> {
        self.drag.as_ref()
    }

    pub fn is_moving(&self) -> bool {
        self.pending_move.is_some()
    }

    /// Begin dragging `active_id`. Clears any edit selection. Refused while a
    /// save or move is in flight.
    pub fn start_drag(&mut self, active_id: &str) -> bool {
        if self.session.is_saving() || self.pending_move.is_some() {
            return false;
        }
        if !self.rows().iter().any(|r| r.id() == active_id) {
            return false;
        }
        // A draft being edited is abandoned; it cannot itself be dragged
        let editing_draft = self
            .session
            .selected_row_id()
            .filter(|id| self.drafts.is_draft_id(id))
            .map(str::to_string);
        match editing_draft {
            Some(draft) if draft == active_id => return false,
            Some(draft) => self.cancel_draft(&draft),
            None => self.session.clear(),
        }
        tracing::debug!(active = active_id, "drag started");
        self.drag = Some(DragGesture {
            active_id: active_id.to_string(),
            over_id: active_id.to_string(),
            offset_x: 0.0,
        });
        true
    }

    /// Pointer moved: update the gesture and return the fresh projection.
    pub fn drag_over(&mut self, over_id: &str, offset_x: f64) -> Option<DragProjection<T>> {
        let drag = self.drag.as_mut()?;
        drag.over_id = over_id.to_string();
        drag.offset_x = offset_x;
        self.projection()
    }

    /// Projection for the current gesture
    pub fn projection(&self) -> Option<DragProjection<T>> {
        let drag = self.drag.as_ref()?;
        let rows = self.rows();
        Some(self.project_rows(&rows, drag))
    }

    fn project_rows(&self, rows: &[FlattenedNode<T>], drag: &DragGesture) -> DragProjection<T> {
        let mut projection = project(
            rows,
            &drag.active_id,
            &drag.over_id,
            drag.offset_x,
            self.indentation_width,
            self.validator.as_deref(),
        );
        if projection.can_drop {
            let unsaved = if self.drafts.is_draft_id(&drag.active_id) {
                Some("unsaved rows cannot be moved")
            } else if projection
                .parent_id
                .as_deref()
                .is_some_and(|p| self.drafts.is_draft_id(p))
            {
                Some("cannot move under an unsaved row")
            } else {
                None
            };
            if let Some(reason) = unsaved {
                projection.can_drop = false;
                projection.reason = Some(MoveRejection::Rule(reason.into()));
            }
        }
        projection
    }

    pub fn cancel_drag(&mut self) {
        if self.drag.take().is_some() {
            tracing::debug!("drag cancelled");
        }
    }

    /// Release the drag at its current position.
    pub fn drop_drag(&mut self) -> DropOutcome {
        let Some(drag) = self.drag.take() else {
            return DropOutcome::NoDrag;
        };
        let rows = self.rows();
        let projection = self.project_rows(&rows, &drag);
        if !projection.can_drop {
            let reason = projection.reason.unwrap_or(MoveRejection::NodeNotFound);
            tracing::debug!(active = %drag.active_id, %reason, "drop rejected");
            return DropOutcome::Rejected(reason);
        }

        let order = compute_order(
            &rows,
            &drag.active_id,
            &drag.over_id,
            projection.parent_id.as_deref(),
        );
        if let Some(active) = rows.iter().find(|r| r.id() == drag.active_id)
            && active.parent_id == projection.parent_id
            && sibling_position(&rows, active) == order
        {
            return DropOutcome::Unmoved;
        }

        let request = MoveRequest {
            node_id: drag.active_id,
            new_parent_id: projection.parent_id,
            new_order: order,
        };
        tracing::info!(
            node = %request.node_id,
            parent = ?request.new_parent_id,
            order = request.new_order,
            "drop accepted"
        );
        self.pending_move = Some(request.clone());
        DropOutcome::Persist(request)
    }

    /// Settle the in-flight move. The tree changes only when the move was
    /// persisted; otherwise the rejection reason is returned.
    pub fn finish_move(
        &mut self,
        result: Result<bool, String>,
    ) -> Option<Result<(), MoveRejection>> {
        let request = self.pending_move.take()?;
        let outcome = match result {
            Ok(true) => match apply_move(
                &self.tree,
                &request.node_id,
                request.new_parent_id.as_deref(),
                request.new_order,
            ) {
                Ok(tree) => {
                    self.tree = tree;
                    if let Some(pid) = &request.new_parent_id {
                        self.expanded.insert(pid.clone());
                    }
                    Ok(())
                }
                Err(e) => Err(MoveRejection::Rule(e.to_string())),
            },
            Ok(false) => Err(MoveRejection::Persistence("not accepted".into())),
            Err(msg) => Err(MoveRejection::Persistence(msg)),
        };
        if let Err(reason) = &outcome {
            tracing::warn!(node = %request.node_id, %reason, "move rejected");
        }
        Some(outcome)
    }

    /// Persist a move request through `backend` and settle it.
    pub fn resolve_move<B: GridBackend<H::Changes>>(
        &mut self,
        backend: &mut B,
        request: &MoveRequest,
    ) -> Option<Result<(), MoveRejection>> {
        let result = backend.persist_move(request).map_err(|e| e.to_string());
        self.finish_move(result)
    }
}

/// 1-based position of `row` among its current siblings
fn sibling_position<T>(rows: &[FlattenedNode<T>], row: &FlattenedNode<T>) -> usize {
    rows.iter()
        .filter(|r| r.parent_id == row.parent_id && r.flat_index < row.flat_index)
        .count()
        + 1
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::grid::session::CellId;
    use crate::model::node::{DraftItem, TreeNode};
    use crate::ops::validator::MoveCheck;

    #[derive(Default)]
    struct Form {
        edits: HashMap<String, String>,
    }

    impl EditHooks<String> for Form {
        type Values = String;
        type Changes = String;

        fn form_values(&self, row_id: &str, rows: &[FlattenedNode<String>]) -> String {
            self.edits.get(row_id).cloned().unwrap_or_else(|| {
                rows.iter()
                    .find(|r| r.id() == row_id)
                    .map(|r| r.data().clone())
                    .unwrap_or_default()
            })
        }

        fn compute_changes(
            &self,
            row_id: &str,
            values: &String,
            rows: &[FlattenedNode<String>],
        ) -> Option<String> {
            let current = rows.iter().find(|r| r.id() == row_id).map(|r| r.data());
            (current != Some(values)).then(|| values.clone())
        }

        fn editable_columns(&self, _row_id: &str, _is_draft: bool) -> Vec<String> {
            vec!["title".into()]
        }

        fn reset_row(&mut self, row_id: &str) {
            self.edits.remove(row_id);
        }
    }

    #[derive(Default)]
    struct Backend {
        moves: Vec<MoveRequest>,
        edits: Vec<SaveRequest<String>>,
        fail: bool,
    }

    impl GridBackend<String> for Backend {
        type Error = String;

        fn persist_move(&mut self, request: &MoveRequest) -> Result<bool, String> {
            if self.fail {
                return Err("server said no".into());
            }
            self.moves.push(request.clone());
            Ok(true)
        }

        fn persist_edit(
            &mut self,
            request: &SaveRequest<String>,
            draft: Option<&DraftItem>,
        ) -> Result<bool, String> {
            if self.fail {
                return Err("server said no".into());
            }
            assert_eq!(request.is_draft, draft.is_some());
            self.edits.push(request.clone());
            Ok(true)
        }
    }

    /// A[B, C[D]], E, everything expanded
    fn grid() -> Grid<String, Form> {
        let n = |id: &str| TreeNode::new(id, format!("{} title", id));
        let tree = vec![
            Arc::new(n("A").with_children(vec![n("B"), n("C").with_children(vec![n("D")])])),
            Arc::new(n("E")),
        ];
        let mut grid = Grid::new(tree, Form::default(), "draft-", 10.0);
        grid.set_expanded(["A".to_string(), "C".to_string()].into());
        grid
    }

    fn row_ids(grid: &Grid<String, Form>) -> Vec<String> {
        grid.rows().iter().map(|r| r.id().to_string()).collect()
    }

    #[test]
    fn test_rows_respect_expansion() {
        let mut g = grid();
        assert_eq!(row_ids(&g), vec!["A", "B", "C", "D", "E"]);
        g.toggle_expanded("C");
        assert_eq!(row_ids(&g), vec!["A", "B", "C", "E"]);
        assert_eq!(g.all_rows().len(), 5);
    }

    #[test]
    fn test_drag_reparents_after_persist() {
        let mut g = grid();
        let mut backend = Backend::default();

        assert!(g.start_drag("B"));
        let projection = g.drag_over("C", 10.0).unwrap();
        assert_eq!(projection.parent_id.as_deref(), Some("C"));
        assert!(projection.can_drop);

        let DropOutcome::Persist(request) = g.drop_drag() else {
            panic!("expected persist");
        };
        assert_eq!(request.new_parent_id.as_deref(), Some("C"));
        assert_eq!(request.new_order, 1);
        assert!(g.is_moving());
        // Tree untouched until the move settles
        assert_eq!(find_by_id(g.tree(), "C").unwrap().children.len(), 1);

        assert_eq!(g.resolve_move(&mut backend, &request), Some(Ok(())));
        let c = find_by_id(g.tree(), "C").unwrap();
        let ids: Vec<&str> = c.children.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "D"]);
        assert_eq!(backend.moves.len(), 1);
        assert!(!g.is_moving());
    }

    #[test]
    fn test_rejected_persistence_leaves_tree() {
        let mut g = grid();
        let mut backend = Backend {
            fail: true,
            ..Default::default()
        };
        g.start_drag("B");
        g.drag_over("C", 10.0);
        let DropOutcome::Persist(request) = g.drop_drag() else {
            panic!("expected persist");
        };
        let before = g.tree().clone();
        let outcome = g.resolve_move(&mut backend, &request).unwrap();
        assert_eq!(
            outcome,
            Err(MoveRejection::Persistence("server said no".into()))
        );
        assert_eq!(g.tree(), &before);
    }

    #[test]
    fn test_drop_into_descendant_rejected() {
        let mut g = grid();
        g.start_drag("C");
        let projection = g.drag_over("D", 20.0).unwrap();
        assert!(!projection.can_drop);
        assert_eq!(g.drop_drag(), DropOutcome::Rejected(MoveRejection::Descendant));
        assert!(g.drag().is_none());
        assert!(!g.is_moving());
    }

    #[test]
    fn test_drop_in_place_is_unmoved() {
        let mut g = grid();
        g.start_drag("C");
        g.drag_over("C", 0.0);
        assert_eq!(g.drop_drag(), DropOutcome::Unmoved);
        assert_eq!(g.drop_drag(), DropOutcome::NoDrag);
    }

    #[test]
    fn test_start_drag_clears_edit_selection() {
        let mut g = grid();
        g.handle_row_click("A", None, ClickTarget::Cell);
        assert!(g.session().is_editing());
        assert!(g.start_drag("E"));
        assert!(!g.session().is_editing());
        g.cancel_drag();
        assert!(g.drag().is_none());
    }

    #[test]
    fn test_drag_refused_while_saving() {
        let mut g = grid();
        g.handle_row_click("A", None, ClickTarget::Cell);
        g.session_mut().hooks_mut().edits.insert("A".into(), "renamed".into());
        assert!(matches!(g.handle_key(GridKey::Enter), Step::Save(_)));
        assert!(!g.start_drag("E"));
    }

    #[test]
    fn test_injected_validator() {
        let mut g = grid();
        g.set_validator(Box::new(
            |_: &FlattenedNode<String>, parent: Option<&FlattenedNode<String>>, _: Option<&str>| {
                if parent.is_some_and(|p| p.id() == "E") {
                    MoveCheck::deny(MoveRejection::Rule("E is a milestone".into()))
                } else {
                    MoveCheck::allow()
                }
            },
        ));
        g.start_drag("B");
        let projection = g.drag_over("E", 10.0).unwrap();
        assert_eq!(projection.parent_id.as_deref(), Some("E"));
        assert_eq!(
            g.drop_drag(),
            DropOutcome::Rejected(MoveRejection::Rule("E is a milestone".into()))
        );
    }

    #[test]
    fn test_create_draft_and_save() {
        let mut g = grid();
        let mut backend = Backend::default();
        g.toggle_expanded("C");
        assert!(!g.is_expanded("C"));

        let id = g.create_draft(Some("C")).unwrap();
        assert!(g.is_expanded("C"));
        assert!(row_ids(&g).contains(&id));
        assert_eq!(g.drafts().get(&id).unwrap().order, 2);
        assert_eq!(g.session().selected_cell(), Some(&CellId::new(&id, "title")));

        // Single draft while one exists (and while editing)
        assert!(!g.can_create_draft());
        assert_eq!(g.create_draft(None), None);

        g.session_mut().hooks_mut().edits.insert(id.clone(), "New".into());
        let Step::Save(request) = g.handle_key(GridKey::Enter) else {
            panic!("expected save");
        };
        assert!(request.is_draft);
        let resolved = g.resolve_save(&mut backend, &request).unwrap();
        assert!(resolved.saved);
        assert!(g.drafts().is_empty());
        assert_eq!(backend.edits.len(), 1);
        assert!(g.drafts().can_create());
    }

    #[test]
    fn test_escape_cancels_draft_without_save() {
        let mut g = grid();
        let id = g.create_draft(None).unwrap();
        g.session_mut().hooks_mut().edits.insert(id.clone(), "typed".into());
        assert_eq!(g.handle_key(GridKey::Escape), Step::DraftCancelled(id.clone()));
        assert!(g.drafts().is_empty());
        assert!(!g.session().is_editing());
        assert!(!row_ids(&g).contains(&id));
    }

    #[test]
    fn test_external_draft_cancel() {
        let mut g = grid();
        let id = g.create_draft(None).unwrap();
        g.cancel_draft(&id);
        assert!(g.drafts().is_empty());
        assert!(!g.session().is_editing());
    }

    #[test]
    fn test_drafts_cannot_be_dragged_or_receive_children() {
        let mut g = grid();
        let id = g.create_draft(None).unwrap();
        g.session_mut().clear();

        assert!(g.start_drag(&id));
        let projection = g.drag_over(&id, 0.0).unwrap();
        assert!(!projection.can_drop);
        g.cancel_drag();

        g.start_drag("E");
        let projection = g.drag_over(&id, 10.0).unwrap();
        assert_eq!(projection.parent_id.as_deref(), Some(id.as_str()));
        assert!(!projection.can_drop);
    }

    #[test]
    fn test_drag_abandons_draft_being_edited() {
        let mut g = grid();
        let id = g.create_draft(None).unwrap();
        g.session_mut().hooks_mut().edits.insert(id.clone(), "half".into());

        assert!(g.start_drag("E"));
        assert!(g.drafts().is_empty());
        assert!(!g.session().is_editing());
        assert!(!g.session().hooks().edits.contains_key(&id));
        assert!(!row_ids(&g).contains(&id));
        g.cancel_drag();
        assert!(g.can_create_draft());
    }

    #[test]
    fn test_draft_being_edited_cannot_be_dragged() {
        let mut g = grid();
        let id = g.create_draft(None).unwrap();
        assert!(!g.start_drag(&id));
        assert!(g.drag().is_none());
        assert_eq!(g.session().selected_row_id(), Some(id.as_str()));
    }

    #[test]
    fn test_draft_prefix_change_waits_for_drafts() {
        let mut g = grid();
        let id = g.create_draft(None).unwrap();
        assert!(!g.set_draft_prefix("new-"));
        g.cancel_draft(&id);

        assert!(g.set_draft_prefix("new-"));
        let id = g.create_draft(None).unwrap();
        assert!(id.starts_with("new-"));
        assert!(g.session().is_draft(&id));
    }

    #[test]
    fn test_indentation_width_drives_projection() {
        let mut g = grid();
        g.start_drag("B");
        assert_eq!(g.drag_over("B", -10.0).unwrap().depth, 0);
        g.set_indentation_width(40.0);
        assert_eq!(g.drag_over("B", -10.0).unwrap().depth, 1);
    }

    #[test]
    fn test_create_draft_unknown_parent() {
        let mut g = grid();
        assert_eq!(g.create_draft(Some("nope")), None);
        assert!(g.drafts().is_empty());
    }
}
