use std::fmt;
use std::marker::PhantomData;

use indexmap::IndexMap;

use crate::model::node::FlattenedNode;

/// Field name → message, in the order the validator reported them
pub type FieldErrors = IndexMap<String, String>;

/// Identifies one editable cell. Displays as `rowId-columnId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellId {
    pub row_id: String,
    pub column_id: String,
}

impl CellId {
    pub fn new(row_id: impl Into<String>, column_id: impl Into<String>) -> Self {
        CellId {
            row_id: row_id.into(),
            column_id: column_id.into(),
        }
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.row_id, self.column_id)
    }
}

/// Keys the session reacts to while a cell is being edited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridKey {
    Enter,
    ArrowDown,
    ArrowUp,
    Tab,
    /// Shift+Tab
    BackTab,
    Escape,
}

/// What a click landed on inside a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    /// Plain cell content
    Cell,
    /// An interactive sub-control (dropdown, picker, button) that keeps its own focus
    Control,
}

/// Domain collaborators of the editing session.
pub trait EditHooks<T> {
    /// Current form contents for a row
    type Values;
    /// Changed-fields payload handed to persistence
    type Changes;

    fn form_values(&self, row_id: &str, rows: &[FlattenedNode<T>]) -> Self::Values;

    /// `None` means nothing changed; saving then succeeds without a write.
    fn compute_changes(
        &self,
        row_id: &str,
        values: &Self::Values,
        rows: &[FlattenedNode<T>],
    ) -> Option<Self::Changes>;

    /// Client-side cross-field validation. Any error aborts the save.
    fn validate_fields(&self, _row_id: &str, _values: &Self::Values) -> FieldErrors {
        FieldErrors::new()
    }

    /// Editable columns of a row, in tab order
    fn editable_columns(&self, row_id: &str, is_draft: bool) -> Vec<String>;

    fn can_edit(&self, _row_id: &str) -> bool {
        true
    }

    /// Forget any in-progress form input for a row (discard or saved).
    fn reset_row(&mut self, _row_id: &str) {}
}

/// A changed row that the host must persist before calling `finish_save`.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest<C> {
    pub row_id: String,
    pub changes: C,
    pub is_draft: bool,
}

/// Result of starting a save
#[derive(Debug, Clone, PartialEq)]
pub enum SaveStart<C> {
    /// Another save is in flight; nothing was done
    Busy,
    /// Field validation failed; see `field_errors()`
    Invalid,
    /// No changes: counts as a successful save
    Unchanged,
    /// Persistence required
    Pending(SaveRequest<C>),
}

impl<C> SaveStart<C> {
    /// Whether the caller may advance selection right away
    pub fn succeeded(&self) -> bool {
        matches!(self, SaveStart::Unchanged)
    }
}

/// Outcome of a session operation
#[derive(Debug, Clone, PartialEq)]
pub enum Step<C> {
    /// Nothing happened (busy, not editing, no permission, sub-control click)
    Ignored,
    /// Editing continues; move input focus to this cell
    Focus(CellId),
    /// Back to idle
    Exited,
    /// Validation failed; the current row stays selected
    Invalid,
    /// Persist this, then call `finish_save`
    Save(SaveRequest<C>),
    /// Escape on a draft row: the host drops the draft
    DraftCancelled(String),
    /// Persistence failed; the current row stays selected
    SaveFailed(String),
}

/// The resolution of an in-flight save
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<C> {
    pub row_id: String,
    pub was_draft: bool,
    pub saved: bool,
    pub step: Step<C>,
}

/// Editing state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Editing(CellId),
}

/// What to do once the row being left has been saved
#[derive(Debug, Clone, PartialEq, Eq)]
enum AfterSave {
    Stay,
    Exit,
    Select(CellId),
}

#[derive(Debug)]
struct PendingSave {
    row_id: String,
    then: AfterSave,
}

/// Single-row inline editing with keyboard navigation and save gating.
///
/// At most one row is selected at a time. Leaving a row always saves it first
/// and only moves on success. While a save is in flight every input is ignored.
pub struct EditSession<T, H: EditHooks<T>> {
    hooks: H,
    draft_prefix: String,
    state: SessionState,
    field_errors: FieldErrors,
    pending: Option<PendingSave>,
    _rows: PhantomData<fn(&[FlattenedNode<T>])>,
}

impl<T, H: EditHooks<T>> EditSession<T, H> {
    pub fn new(hooks: H, draft_prefix: impl Into<String>) -> Self {
        EditSession {
            hooks,
            draft_prefix: draft_prefix.into(),
            state: SessionState::Idle,
            field_errors: FieldErrors::new(),
            pending: None,
            _rows: PhantomData,
        }
    }

    pub fn set_draft_prefix(&mut self, prefix: impl Into<String>) {
        self.draft_prefix = prefix.into();
    }

    /// Swap the collaborators.
    pub fn configure(&mut self, hooks: H) {
        self.hooks = hooks;
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn selected_row_id(&self) -> Option<&str> {
        match &self.state {
            SessionState::Editing(cell) => Some(&cell.row_id),
            SessionState::Idle => None,
        }
    }

    pub fn selected_cell(&self) -> Option<&CellId> {
        match &self.state {
            SessionState::Editing(cell) => Some(cell),
            SessionState::Idle => None,
        }
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.state, SessionState::Editing(_))
    }

    pub fn is_saving(&self) -> bool {
        self.pending.is_some()
    }

    pub fn field_errors(&self) -> &FieldErrors {
        &self.field_errors
    }

    pub fn is_draft(&self, row_id: &str) -> bool {
        row_id.starts_with(&self.draft_prefix)
    }

    // -----------------------------------------------------------------------
    // Entering and leaving
    // -----------------------------------------------------------------------

    /// Start editing `row_id` at `column` (or its first editable cell).
    /// Only valid while idle; use `handle_row_click` to switch rows.
    pub fn enter(&mut self, row_id: &str, column: Option<&str>) -> Step<H::Changes> {
        if self.is_saving() || self.is_editing() || !self.hooks.can_edit(row_id) {
            return Step::Ignored;
        }
        match self.cell_for(row_id, column) {
            Some(cell) => self.select(cell),
            None => Step::Ignored,
        }
    }

    /// Drop the selection without saving (a drag started).
    pub fn clear(&mut self) {
        if let SessionState::Editing(cell) = std::mem::replace(&mut self.state, SessionState::Idle)
        {
            self.hooks.reset_row(&cell.row_id);
        }
        self.field_errors.clear();
    }

    /// Discard the in-progress edit and exit.
    pub fn cancel(&mut self) -> Step<H::Changes> {
        if self.is_saving() {
            return Step::Ignored;
        }
        let SessionState::Editing(cell) = std::mem::replace(&mut self.state, SessionState::Idle)
        else {
            return Step::Ignored;
        };
        self.hooks.reset_row(&cell.row_id);
        self.field_errors.clear();
        if self.is_draft(&cell.row_id) {
            tracing::debug!(row = %cell.row_id, "draft edit cancelled");
            Step::DraftCancelled(cell.row_id)
        } else {
            Step::Exited
        }
    }

    // -----------------------------------------------------------------------
    // Pointer input
    // -----------------------------------------------------------------------

    /// A click on a row. Sub-control clicks are ignored so they keep focus.
    pub fn handle_row_click(
        &mut self,
        row_id: &str,
        column: Option<&str>,
        target: ClickTarget,
        rows: &[FlattenedNode<T>],
    ) -> Step<H::Changes> {
        if self.is_saving() || target == ClickTarget::Control || !self.hooks.can_edit(row_id) {
            return Step::Ignored;
        }
        let Some(cell) = self.cell_for(row_id, column) else {
            return Step::Ignored;
        };

        match self.selected_row_id() {
            Some(current) if current == row_id => self.select(cell),
            Some(current) => {
                let current = current.to_string();
                self.save_then(&current, AfterSave::Select(cell), rows)
            }
            None => self.select(cell),
        }
    }

    /// A click outside the grid commits and exits. Clicks inside an open
    /// popover belong to the edit session and are ignored.
    pub fn handle_click_outside(
        &mut self,
        inside_popover: bool,
        rows: &[FlattenedNode<T>],
    ) -> Step<H::Changes> {
        if inside_popover {
            return Step::Ignored;
        }
        self.commit_and_exit(rows)
    }

    /// Interacting with the filter row behaves like clicking outside.
    pub fn handle_filter_interaction(&mut self, rows: &[FlattenedNode<T>]) -> Step<H::Changes> {
        self.commit_and_exit(rows)
    }

    fn commit_and_exit(&mut self, rows: &[FlattenedNode<T>]) -> Step<H::Changes> {
        if self.is_saving() {
            return Step::Ignored;
        }
        match self.selected_row_id() {
            Some(row_id) => {
                let row_id = row_id.to_string();
                self.save_then(&row_id, AfterSave::Exit, rows)
            }
            None => Step::Ignored,
        }
    }

    // -----------------------------------------------------------------------
    // Keyboard input
    // -----------------------------------------------------------------------

    pub fn handle_key(&mut self, key: GridKey, rows: &[FlattenedNode<T>]) -> Step<H::Changes> {
        if self.is_saving() {
            return Step::Ignored;
        }
        let SessionState::Editing(cell) = &self.state else {
            return Step::Ignored;
        };
        let cell = cell.clone();
        let row_idx = rows.iter().position(|r| r.id() == cell.row_id);

        match key {
            GridKey::Escape => self.cancel(),
            GridKey::Enter | GridKey::ArrowDown => {
                let then = self.row_target(rows, row_idx.map(|i| i + 1), false);
                self.save_then(&cell.row_id, then, rows)
            }
            GridKey::ArrowUp => {
                let then = self.row_target(rows, row_idx.and_then(|i| i.checked_sub(1)), false);
                self.save_then(&cell.row_id, then, rows)
            }
            GridKey::Tab => {
                let columns = self.columns(&cell.row_id);
                let pos = columns.iter().position(|c| *c == cell.column_id);
                match pos {
                    Some(p) if p + 1 < columns.len() => {
                        self.select(CellId::new(&cell.row_id, &columns[p + 1]))
                    }
                    _ => {
                        let then = self.row_target(rows, row_idx.map(|i| i + 1), false);
                        self.save_then(&cell.row_id, then, rows)
                    }
                }
            }
            GridKey::BackTab => {
                let columns = self.columns(&cell.row_id);
                let pos = columns.iter().position(|c| *c == cell.column_id);
                match pos {
                    Some(p) if p > 0 => self.select(CellId::new(&cell.row_id, &columns[p - 1])),
                    _ => {
                        let then =
                            self.row_target(rows, row_idx.and_then(|i| i.checked_sub(1)), true);
                        self.save_then(&cell.row_id, then, rows)
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Saving
    // -----------------------------------------------------------------------

    /// Validate and diff `row_id`. On `Pending` the session is saving until
    /// `finish_save` is called; selection stays where it is.
    pub fn save_form_changes(
        &mut self,
        row_id: &str,
        rows: &[FlattenedNode<T>],
    ) -> SaveStart<H::Changes> {
        self.start_save(row_id, AfterSave::Stay, rows)
    }

    /// Settle the in-flight save. `Ok(true)` means persisted; `Ok(false)` and
    /// `Err` keep the row selected. Returns `None` when nothing was in flight.
    pub fn finish_save(&mut self, result: Result<bool, String>) -> Option<Resolved<H::Changes>> {
        let pending = self.pending.take()?;
        let was_draft = self.is_draft(&pending.row_id);

        let (saved, step) = match result {
            Ok(true) => {
                self.hooks.reset_row(&pending.row_id);
                let then = match pending.then {
                    // A saved draft is replaced by its persisted row
                    AfterSave::Stay if was_draft => AfterSave::Exit,
                    then => then,
                };
                (true, self.apply(then))
            }
            Ok(false) => {
                tracing::warn!(row = %pending.row_id, "save not accepted");
                (false, Step::SaveFailed("save was not accepted".into()))
            }
            Err(msg) => {
                tracing::warn!(row = %pending.row_id, error = %msg, "save failed");
                (false, Step::SaveFailed(msg))
            }
        };

        Some(Resolved {
            row_id: pending.row_id,
            was_draft,
            saved,
            step,
        })
    }

    fn start_save(
        &mut self,
        row_id: &str,
        then: AfterSave,
        rows: &[FlattenedNode<T>],
    ) -> SaveStart<H::Changes> {
        if self.is_saving() {
            return SaveStart::Busy;
        }
        let values = self.hooks.form_values(row_id, rows);
        let errors = self.hooks.validate_fields(row_id, &values);
        if !errors.is_empty() {
            tracing::debug!(row = row_id, fields = errors.len(), "validation failed");
            self.field_errors = errors;
            return SaveStart::Invalid;
        }
        self.field_errors.clear();

        match self.hooks.compute_changes(row_id, &values, rows) {
            None => SaveStart::Unchanged,
            Some(changes) => {
                tracing::debug!(row = row_id, "save dispatched");
                self.pending = Some(PendingSave {
                    row_id: row_id.to_string(),
                    then,
                });
                SaveStart::Pending(SaveRequest {
                    row_id: row_id.to_string(),
                    changes,
                    is_draft: self.is_draft(row_id),
                })
            }
        }
    }

    fn save_then(
        &mut self,
        row_id: &str,
        then: AfterSave,
        rows: &[FlattenedNode<T>],
    ) -> Step<H::Changes> {
        match self.start_save(row_id, then.clone(), rows) {
            SaveStart::Busy => Step::Ignored,
            SaveStart::Invalid => Step::Invalid,
            SaveStart::Unchanged => self.apply(then),
            SaveStart::Pending(request) => Step::Save(request),
        }
    }

    fn apply(&mut self, then: AfterSave) -> Step<H::Changes> {
        match then {
            AfterSave::Stay => match &self.state {
                SessionState::Editing(cell) => Step::Focus(cell.clone()),
                SessionState::Idle => Step::Exited,
            },
            AfterSave::Exit => {
                self.state = SessionState::Idle;
                self.field_errors.clear();
                Step::Exited
            }
            AfterSave::Select(cell) => self.select(cell),
        }
    }

    fn select(&mut self, cell: CellId) -> Step<H::Changes> {
        if self.selected_row_id() != Some(cell.row_id.as_str()) {
            self.field_errors.clear();
        }
        self.state = SessionState::Editing(cell.clone());
        Step::Focus(cell)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn columns(&self, row_id: &str) -> Vec<String> {
        self.hooks.editable_columns(row_id, self.is_draft(row_id))
    }

    /// `column` if it is editable in this row, else the first editable column.
    fn cell_for(&self, row_id: &str, column: Option<&str>) -> Option<CellId> {
        let columns = self.columns(row_id);
        let column = column
            .filter(|c| columns.iter().any(|e| e == c))
            .map(str::to_string)
            .or_else(|| columns.first().cloned())?;
        Some(CellId::new(row_id, column))
    }

    /// Where to go after leaving the current row for `rows[idx]`.
    fn row_target(
        &self,
        rows: &[FlattenedNode<T>],
        idx: Option<usize>,
        last_cell: bool,
    ) -> AfterSave {
        let Some(row) = idx.and_then(|i| rows.get(i)) else {
            return AfterSave::Exit;
        };
        if !self.hooks.can_edit(row.id()) {
            return AfterSave::Exit;
        }
        let columns = self.columns(row.id());
        let column = if last_cell {
            columns.last()
        } else {
            columns.first()
        };
        match column {
            Some(c) => AfterSave::Select(CellId::new(row.id(), c)),
            None => AfterSave::Exit,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::model::node::TreeNode;
    use crate::ops::tree_codec::flatten;

    /// Rows carry a title; the form edits titles and a note column.
    #[derive(Default)]
    struct TitleForm {
        edits: HashMap<String, String>,
        read_only: bool,
        resets: Vec<String>,
    }

    impl EditHooks<String> for TitleForm {
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

        fn validate_fields(&self, _row_id: &str, values: &String) -> FieldErrors {
            let mut errors = FieldErrors::new();
            if values.trim().is_empty() {
                errors.insert("title".into(), "title is required".into());
            }
            errors
        }

        fn editable_columns(&self, _row_id: &str, is_draft: bool) -> Vec<String> {
            if is_draft {
                vec!["title".into()]
            } else {
                vec!["title".into(), "note".into()]
            }
        }

        fn can_edit(&self, _row_id: &str) -> bool {
            !self.read_only
        }

        fn reset_row(&mut self, row_id: &str) {
            self.edits.remove(row_id);
            self.resets.push(row_id.to_string());
        }
    }

    fn rows() -> Vec<FlattenedNode<String>> {
        let n = |id: &str| TreeNode::new(id, format!("{} title", id));
        let tree = vec![
            Arc::new(n("A").with_children(vec![n("B")])),
            Arc::new(n("C")),
            Arc::new(TreeNode::new("draft-1", String::new())),
        ];
        flatten(&tree)
    }

    fn session() -> EditSession<String, TitleForm> {
        EditSession::new(TitleForm::default(), "draft-")
    }

    fn cell(row: &str, col: &str) -> CellId {
        CellId::new(row, col)
    }

    #[test]
    fn test_cell_id_display() {
        assert_eq!(cell("A", "title").to_string(), "A-title");
    }

    #[test]
    fn test_enter_focuses_first_editable_cell() {
        let mut s = session();
        assert_eq!(s.enter("A", None), Step::Focus(cell("A", "title")));
        assert_eq!(s.selected_row_id(), Some("A"));
        assert!(s.is_editing());
    }

    #[test]
    fn test_enter_unknown_column_falls_back() {
        let mut s = session();
        assert_eq!(s.enter("A", Some("bogus")), Step::Focus(cell("A", "title")));
    }

    #[test]
    fn test_read_only_ignores_clicks() {
        let mut s = session();
        s.hooks_mut().read_only = true;
        assert_eq!(
            s.handle_row_click("A", None, ClickTarget::Cell, &rows()),
            Step::Ignored
        );
        assert!(!s.is_editing());
    }

    #[test]
    fn test_click_on_control_is_ignored() {
        let mut s = session();
        assert_eq!(
            s.handle_row_click("A", Some("note"), ClickTarget::Control, &rows()),
            Step::Ignored
        );
    }

    #[test]
    fn test_click_same_row_retargets_without_save() {
        let mut s = session();
        let rows = rows();
        s.enter("A", None);
        s.hooks_mut().edits.insert("A".into(), "changed".into());
        let step = s.handle_row_click("A", Some("note"), ClickTarget::Cell, &rows);
        assert_eq!(step, Step::Focus(cell("A", "note")));
        assert!(!s.is_saving());
    }

    #[test]
    fn test_click_other_row_unchanged_switches() {
        let mut s = session();
        let rows = rows();
        s.enter("A", None);
        let step = s.handle_row_click("C", Some("note"), ClickTarget::Cell, &rows);
        assert_eq!(step, Step::Focus(cell("C", "note")));
        assert_eq!(s.selected_row_id(), Some("C"));
    }

    #[test]
    fn test_click_other_row_saves_then_switches() {
        let mut s = session();
        let rows = rows();
        s.enter("A", None);
        s.hooks_mut().edits.insert("A".into(), "renamed".into());

        let Step::Save(request) = s.handle_row_click("C", None, ClickTarget::Cell, &rows) else {
            panic!("expected save");
        };
        assert_eq!(request.row_id, "A");
        assert_eq!(request.changes, "renamed");
        assert!(!request.is_draft);
        assert!(s.is_saving());
        // Still on A until the save settles
        assert_eq!(s.selected_row_id(), Some("A"));

        let resolved = s.finish_save(Ok(true)).unwrap();
        assert!(resolved.saved);
        assert_eq!(resolved.step, Step::Focus(cell("C", "title")));
        assert_eq!(s.selected_row_id(), Some("C"));
        assert!(s.hooks().resets.contains(&"A".to_string()));
    }

    #[test]
    fn test_failed_save_keeps_row_selected() {
        let mut s = session();
        let rows = rows();
        s.enter("A", None);
        s.hooks_mut().edits.insert("A".into(), "renamed".into());
        s.handle_row_click("C", None, ClickTarget::Cell, &rows);

        let resolved = s.finish_save(Err("backend down".into())).unwrap();
        assert!(!resolved.saved);
        assert_eq!(resolved.step, Step::SaveFailed("backend down".into()));
        assert_eq!(s.selected_row_id(), Some("A"));
        assert!(!s.is_saving());

        s.handle_row_click("C", None, ClickTarget::Cell, &rows);
        let resolved = s.finish_save(Ok(false)).unwrap();
        assert!(!resolved.saved);
        assert_eq!(s.selected_row_id(), Some("A"));
    }

    #[test]
    fn test_rejected_save_on_row_switch_stays_put() {
        let mut s = session();
        let rows = rows();
        s.enter("A", Some("note"));
        s.hooks_mut().edits.insert("A".into(), "renamed".into());

        assert!(matches!(
            s.handle_row_click("C", None, ClickTarget::Cell, &rows),
            Step::Save(_)
        ));
        let resolved = s.finish_save(Ok(false)).unwrap();
        assert_eq!(
            resolved.step,
            Step::SaveFailed("save was not accepted".into())
        );
        assert_eq!(s.selected_cell(), Some(&cell("A", "note")));
        assert!(s.is_editing());
        assert!(!s.is_saving());
        // The input survives for another attempt
        assert_eq!(s.hooks().edits.get("A").map(String::as_str), Some("renamed"));

        s.handle_row_click("C", None, ClickTarget::Cell, &rows);
        let resolved = s.finish_save(Ok(true)).unwrap();
        assert_eq!(resolved.step, Step::Focus(cell("C", "title")));
        assert_eq!(s.selected_row_id(), Some("C"));
    }

    #[test]
    fn test_validation_failure_blocks_navigation() {
        let mut s = session();
        let rows = rows();
        s.enter("A", None);
        s.hooks_mut().edits.insert("A".into(), "   ".into());

        assert_eq!(s.handle_key(GridKey::Enter, &rows), Step::Invalid);
        assert_eq!(s.selected_row_id(), Some("A"));
        assert_eq!(
            s.field_errors().get("title").map(String::as_str),
            Some("title is required")
        );
        assert!(!s.is_saving());

        // Fixing the value clears the errors
        s.hooks_mut().edits.insert("A".into(), "fixed".into());
        assert!(matches!(s.handle_key(GridKey::Enter, &rows), Step::Save(_)));
        assert!(s.field_errors().is_empty());
    }

    #[test]
    fn test_input_ignored_while_saving() {
        let mut s = session();
        let rows = rows();
        s.enter("A", None);
        s.hooks_mut().edits.insert("A".into(), "renamed".into());
        assert!(matches!(s.handle_key(GridKey::ArrowDown, &rows), Step::Save(_)));

        assert_eq!(s.handle_key(GridKey::ArrowDown, &rows), Step::Ignored);
        assert_eq!(s.handle_key(GridKey::Escape, &rows), Step::Ignored);
        assert_eq!(
            s.handle_row_click("C", None, ClickTarget::Cell, &rows),
            Step::Ignored
        );
        assert_eq!(s.save_form_changes("A", &rows), SaveStart::Busy);

        let resolved = s.finish_save(Ok(true)).unwrap();
        assert_eq!(resolved.step, Step::Focus(cell("B", "title")));
        assert!(s.finish_save(Ok(true)).is_none());
    }

    #[test]
    fn test_arrow_navigation_without_changes() {
        let mut s = session();
        let rows = rows();
        s.enter("B", Some("note"));
        assert_eq!(
            s.handle_key(GridKey::ArrowDown, &rows),
            Step::Focus(cell("C", "title"))
        );
        assert_eq!(
            s.handle_key(GridKey::ArrowUp, &rows),
            Step::Focus(cell("B", "title"))
        );
        assert_eq!(
            s.handle_key(GridKey::ArrowUp, &rows),
            Step::Focus(cell("A", "title"))
        );
        // Up from the first row exits
        assert_eq!(s.handle_key(GridKey::ArrowUp, &rows), Step::Exited);
        assert!(!s.is_editing());
    }

    #[test]
    fn test_enter_on_last_row_exits() {
        let mut s = session();
        let rows = rows();
        s.enter("C", None);
        assert_eq!(
            s.handle_key(GridKey::Enter, &rows),
            Step::Focus(cell("draft-1", "title"))
        );
        s.hooks_mut().edits.insert("draft-1".into(), "New row".into());
        let Step::Save(request) = s.handle_key(GridKey::Enter, &rows) else {
            panic!("expected save");
        };
        assert!(request.is_draft);
        let resolved = s.finish_save(Ok(true)).unwrap();
        assert!(resolved.was_draft);
        assert_eq!(resolved.step, Step::Exited);
        assert_eq!(s.state(), &SessionState::Idle);
    }

    #[test]
    fn test_tab_moves_within_row_then_crosses() {
        let mut s = session();
        let rows = rows();
        s.enter("A", None);
        assert_eq!(s.handle_key(GridKey::Tab, &rows), Step::Focus(cell("A", "note")));
        // Last cell: crosses to the next row
        assert_eq!(s.handle_key(GridKey::Tab, &rows), Step::Focus(cell("B", "title")));
        // First cell: Shift+Tab goes to the previous row's last cell
        assert_eq!(
            s.handle_key(GridKey::BackTab, &rows),
            Step::Focus(cell("A", "note"))
        );
        assert_eq!(
            s.handle_key(GridKey::BackTab, &rows),
            Step::Focus(cell("A", "title"))
        );
    }

    #[test]
    fn test_tab_crossing_rows_saves_first() {
        let mut s = session();
        let rows = rows();
        s.enter("A", Some("note"));
        s.hooks_mut().edits.insert("A".into(), "renamed".into());
        assert!(matches!(s.handle_key(GridKey::Tab, &rows), Step::Save(_)));
        let resolved = s.finish_save(Ok(true)).unwrap();
        assert_eq!(resolved.step, Step::Focus(cell("B", "title")));
    }

    #[test]
    fn test_escape_discards_and_exits() {
        let mut s = session();
        let rows = rows();
        s.enter("A", None);
        s.hooks_mut().edits.insert("A".into(), "renamed".into());
        assert_eq!(s.handle_key(GridKey::Escape, &rows), Step::Exited);
        assert!(s.hooks().edits.is_empty());
        assert!(!s.is_editing());
    }

    #[test]
    fn test_escape_on_draft_cancels_draft() {
        let mut s = session();
        let rows = rows();
        s.enter("draft-1", None);
        s.hooks_mut().edits.insert("draft-1".into(), "typed".into());
        assert_eq!(
            s.handle_key(GridKey::Escape, &rows),
            Step::DraftCancelled("draft-1".into())
        );
        assert_eq!(s.state(), &SessionState::Idle);
        assert!(!s.is_saving());
    }

    #[test]
    fn test_click_outside_commits() {
        let mut s = session();
        let rows = rows();
        s.enter("A", None);
        assert_eq!(s.handle_click_outside(true, &rows), Step::Ignored);
        assert!(s.is_editing());
        assert_eq!(s.handle_click_outside(false, &rows), Step::Exited);

        s.enter("C", None);
        s.hooks_mut().edits.insert("C".into(), "renamed".into());
        assert!(matches!(s.handle_filter_interaction(&rows), Step::Save(_)));
        let resolved = s.finish_save(Ok(true)).unwrap();
        assert_eq!(resolved.step, Step::Exited);
    }

    #[test]
    fn test_save_form_changes_directly() {
        let mut s = session();
        let rows = rows();
        s.enter("A", None);
        assert_eq!(s.save_form_changes("A", &rows), SaveStart::Unchanged);
        assert!(s.save_form_changes("A", &rows).succeeded());

        s.hooks_mut().edits.insert("A".into(), "new".into());
        assert!(matches!(s.save_form_changes("A", &rows), SaveStart::Pending(_)));
        let resolved = s.finish_save(Ok(true)).unwrap();
        assert_eq!(resolved.step, Step::Focus(cell("A", "title")));
    }

    #[test]
    fn test_clear_drops_selection() {
        let mut s = session();
        s.enter("A", None);
        s.hooks_mut().edits.insert("A".into(), "x".into());
        s.clear();
        assert!(!s.is_editing());
        assert!(s.hooks().edits.is_empty());
    }

    #[test]
    fn test_enter_while_editing_is_ignored() {
        let mut s = session();
        s.enter("A", None);
        assert_eq!(s.enter("C", None), Step::Ignored);
        assert_eq!(s.selected_row_id(), Some("A"));
    }

    #[test]
    fn test_configure_replaces_hooks() {
        let mut s = session();
        s.configure(TitleForm {
            read_only: true,
            ..Default::default()
        });
        assert_eq!(s.enter("A", None), Step::Ignored);
    }
}
