use serde::Serialize;

use crate::model::node::{DragProjection, FlattenedNode};
use crate::model::record::{Record, RecordKind, Status};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct RowJson {
    pub id: String,
    pub title: String,
    pub kind: RecordKind,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

#[derive(Serialize)]
pub struct RecordDetailJson {
    #[serde(flatten)]
    pub row: RowJson,
    pub ancestors: Vec<String>,
    pub children: Vec<String>,
}

#[derive(Serialize)]
pub struct CountJson {
    pub total: usize,
    pub todo: usize,
    pub active: usize,
    pub done: usize,
    pub milestones: usize,
}

#[derive(Serialize)]
pub struct ProjectionJson {
    pub active: String,
    pub over: String,
    pub depth: usize,
    pub min_depth: usize,
    pub max_depth: usize,
    pub parent: Option<String>,
    pub order: usize,
    pub can_drop: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct CheckJson {
    pub valid: bool,
    pub issues: Vec<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn row_to_json(row: &FlattenedNode<Record>) -> RowJson {
    let record = row.data();
    RowJson {
        id: row.id().to_string(),
        title: record.title.clone(),
        kind: record.kind,
        status: record.status,
        due: record.due.map(|d| d.to_string()),
        depth: row.depth,
        parent: row.parent_id.clone(),
    }
}

pub fn projection_to_json(
    active: &str,
    over: &str,
    projection: &DragProjection<Record>,
    order: usize,
) -> ProjectionJson {
    ProjectionJson {
        active: active.to_string(),
        over: over.to_string(),
        depth: projection.depth,
        min_depth: projection.min_depth,
        max_depth: projection.max_depth,
        parent: projection.parent_id.clone(),
        order,
        can_drop: projection.can_drop,
        reason: projection.reason.as_ref().map(|r| r.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn status_char(record: &Record) -> char {
    if record.is_milestone() {
        return '◇';
    }
    match record.status {
        Status::Todo => ' ',
        Status::Active => '>',
        Status::Done => 'x',
    }
}

/// One-line summary of a record
pub fn format_record_line(id: &str, record: &Record) -> String {
    let due = record
        .due
        .map(|d| format!("  (due {})", d))
        .unwrap_or_default();
    format!("[{}] {} {}{}", status_char(record), id, record.title, due)
}

/// A row indented by its depth
pub fn format_row(row: &FlattenedNode<Record>) -> String {
    format!("{}{}", "  ".repeat(row.depth), format_record_line(row.id(), row.data()))
}

/// Detailed view of one record
pub fn format_record_detail(row: &FlattenedNode<Record>) -> Vec<String> {
    let record = row.data();
    let mut lines = vec![format_record_line(row.id(), record)];
    lines.push(format!("kind: {}", record.field("kind")));
    lines.push(format!("status: {}", record.status));
    if let Some(due) = record.due {
        lines.push(format!("due: {}", due));
    }
    if !row.ancestor_ids.is_empty() {
        lines.push(format!("path: {}", row.ancestor_ids.join(" > ")));
    }
    if row.node.has_children() {
        lines.push(String::new());
        lines.push("children:".to_string());
        for child in &row.node.children {
            lines.push(format!("  {}", format_record_line(&child.id, &child.data)));
        }
    }
    lines
}

pub fn format_projection(p: &ProjectionJson) -> Vec<String> {
    let parent = p.parent.as_deref().unwrap_or("(root)");
    let mut lines = vec![format!(
        "{} over {}: depth {} (range {}..={}), parent {}, position {}",
        p.active, p.over, p.depth, p.min_depth, p.max_depth, parent, p.order
    )];
    match &p.reason {
        Some(reason) if !p.can_drop => lines.push(format!("cannot drop: {}", reason)),
        _ => lines.push("can drop".to_string()),
    }
    lines
}
