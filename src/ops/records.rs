use std::collections::HashMap;

use chrono::NaiveDate;
use indexmap::IndexMap;

use crate::grid::session::{EditHooks, FieldErrors};
use crate::model::node::FlattenedNode;
use crate::model::record::{Record, RecordChanges, Status};
use crate::ops::validator::{
    Both, MoveCheck, MoveRejection, MoveValidator, StructuralValidator, both,
};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// Move rules
// ---------------------------------------------------------------------------

/// Milestones are leaves: nothing may be dropped under one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MilestoneRule;

impl MoveValidator<Record> for MilestoneRule {
    fn validate(
        &self,
        _active: &FlattenedNode<Record>,
        parent: Option<&FlattenedNode<Record>>,
        _parent_id: Option<&str>,
    ) -> MoveCheck {
        match parent {
            Some(p) if p.data().is_milestone() => MoveCheck::deny(MoveRejection::Rule(format!(
                "{} is a milestone and cannot have children",
                p.id()
            ))),
            _ => MoveCheck::allow(),
        }
    }
}

/// Structural checks followed by the record rules
pub fn record_validator() -> Both<StructuralValidator, MilestoneRule> {
    both(StructuralValidator, MilestoneRule)
}

// ---------------------------------------------------------------------------
// Form
// ---------------------------------------------------------------------------

/// Column → text as typed
pub type RecordValues = IndexMap<String, String>;

/// Inline-edit form for `Record` rows.
///
/// Typed text is buffered per row until the row is saved or discarded. Rows
/// without buffered input show the record's own values.
#[derive(Debug, Clone)]
pub struct RecordForm {
    columns: Vec<String>,
    edits: HashMap<String, RecordValues>,
}

impl RecordForm {
    pub fn new(columns: Vec<String>) -> Self {
        RecordForm {
            columns,
            edits: HashMap::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Replace the editable columns. Buffered input is kept.
    pub fn set_columns(&mut self, columns: Vec<String>) {
        self.columns = columns;
    }

    /// Current text of a cell: buffered input if any, else the record value.
    pub fn field_text(&self, row_id: &str, column: &str, rows: &[FlattenedNode<Record>]) -> String {
        if let Some(text) = self.edits.get(row_id).and_then(|e| e.get(column)) {
            return text.clone();
        }
        rows.iter()
            .find(|r| r.id() == row_id)
            .map(|r| r.data().field(column))
            .unwrap_or_else(|| Record::default().field(column))
    }

    pub fn set_field(&mut self, row_id: &str, column: &str, text: impl Into<String>) {
        self.edits
            .entry(row_id.to_string())
            .or_default()
            .insert(column.to_string(), text.into());
    }

    pub fn is_dirty(&self, row_id: &str) -> bool {
        self.edits.contains_key(row_id)
    }
}

fn parse_due(text: &str) -> Result<Option<NaiveDate>, chrono::ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT).map(Some)
}

impl EditHooks<Record> for RecordForm {
    type Values = RecordValues;
    type Changes = RecordChanges;

    fn form_values(&self, row_id: &str, rows: &[FlattenedNode<Record>]) -> RecordValues {
        self.columns
            .iter()
            .map(|c| (c.clone(), self.field_text(row_id, c, rows)))
            .collect()
    }

    fn compute_changes(
        &self,
        row_id: &str,
        values: &RecordValues,
        rows: &[FlattenedNode<Record>],
    ) -> Option<RecordChanges> {
        let current = rows
            .iter()
            .find(|r| r.id() == row_id)
            .map(|r| r.data().clone())
            .unwrap_or_default();

        let mut changes = RecordChanges::default();
        if let Some(title) = values.get("title").map(|t| t.trim())
            && title != current.title
        {
            changes.title = Some(title.to_string());
        }
        if let Some(status) = values.get("status").and_then(|s| Status::parse(s))
            && status != current.status
        {
            changes.status = Some(status);
        }
        if let Some(Ok(due)) = values.get("due").map(|d| parse_due(d))
            && due != current.due
        {
            changes.due = Some(due);
        }
        (!changes.is_empty()).then_some(changes)
    }

    fn validate_fields(&self, _row_id: &str, values: &RecordValues) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if values.get("title").is_some_and(|t| t.trim().is_empty()) {
            errors.insert("title".into(), "title is required".into());
        }
        if let Some(status) = values.get("status")
            && Status::parse(status).is_none()
        {
            errors.insert(
                "status".into(),
                format!("unknown status '{}' (todo, active, done)", status.trim()),
            );
        }
        if let Some(due) = values.get("due")
            && parse_due(due).is_err()
        {
            errors.insert("due".into(), "due must be YYYY-MM-DD".into());
        }
        errors
    }

    fn editable_columns(&self, _row_id: &str, is_draft: bool) -> Vec<String> {
        if is_draft {
            // Unsaved rows only ask for a title
            return self
                .columns
                .iter()
                .filter(|c| c.as_str() == "title")
                .cloned()
                .collect();
        }
        self.columns.clone()
    }

    fn reset_row(&mut self, row_id: &str) {
        self.edits.remove(row_id);
    }
}
