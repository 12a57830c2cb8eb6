use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What kind of row a record is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    #[default]
    Task,
    /// Leaf-only: milestones never receive children
    Milestone,
}

/// Record progress state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Todo,
    Active,
    Done,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::Active => "active",
            Status::Done => "done",
        }
    }

    /// Parse a status name (case-insensitive)
    pub fn parse(s: &str) -> Option<Status> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" => Some(Status::Todo),
            "active" => Some(Status::Active),
            "done" => Some(Status::Done),
            _ => None,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The domain payload carried by each tree node in a treegrid workspace
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    pub title: String,
    #[serde(default)]
    pub kind: RecordKind,
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDate>,
}

impl Record {
    pub fn new(title: impl Into<String>) -> Self {
        Record {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn milestone(title: impl Into<String>) -> Self {
        Record {
            title: title.into(),
            kind: RecordKind::Milestone,
            ..Default::default()
        }
    }

    pub fn is_milestone(&self) -> bool {
        self.kind == RecordKind::Milestone
    }

    /// Display text for a column
    pub fn field(&self, column: &str) -> String {
        match column {
            "title" => self.title.clone(),
            "status" => self.status.to_string(),
            "due" => self
                .due
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            "kind" => match self.kind {
                RecordKind::Task => "task".into(),
                RecordKind::Milestone => "milestone".into(),
            },
            _ => String::new(),
        }
    }
}

/// The fields of a record that changed in an edit. `None` means unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// `Some(None)` clears the due date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<RecordKind>,
}

impl RecordChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.status.is_none() && self.due.is_none() && self.kind.is_none()
    }

    /// Apply these changes to a record
    pub fn apply(&self, record: &mut Record) {
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(due) = self.due {
            record.due = due;
        }
        if let Some(kind) = self.kind {
            record.kind = kind;
        }
    }
}
