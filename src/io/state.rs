use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const STATE_FILE: &str = ".treegrid-state.json";

/// Persisted TUI state
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UiState {
    /// Row under the cursor (by id, so it survives reordering)
    #[serde(default)]
    pub cursor_id: Option<String>,
    /// Ids of expanded rows
    #[serde(default)]
    pub expanded: HashSet<String>,
    #[serde(default)]
    pub scroll_offset: usize,
}

/// Read the state file; missing or malformed files yield `None`.
pub fn read_ui_state(root: &Path) -> Option<UiState> {
    let content = fs::read_to_string(root.join(STATE_FILE)).ok()?;
    serde_json::from_str(&content).ok()
}

pub fn write_ui_state(root: &Path, state: &UiState) -> Result<(), std::io::Error> {
    let content = serde_json::to_string_pretty(state)?;
    fs::write(root.join(STATE_FILE), content)
}
