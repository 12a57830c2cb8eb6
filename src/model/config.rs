use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Configuration from treegrid.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default)]
    pub project: ProjectInfo,
    #[serde(default)]
    pub grid: GridSettings,
    #[serde(default)]
    pub focus: FocusSettings,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSettings {
    /// Horizontal distance (in cells) that represents one depth level
    #[serde(default = "default_indentation_width")]
    pub indentation_width: u16,
    /// Reserved id prefix for unsaved rows
    #[serde(default = "default_draft_prefix")]
    pub draft_prefix: String,
    /// Tree data file, relative to the workspace root
    #[serde(default = "default_tree_file")]
    pub tree_file: String,
}

impl Default for GridSettings {
    fn default() -> Self {
        GridSettings {
            indentation_width: default_indentation_width(),
            draft_prefix: default_draft_prefix(),
            tree_file: default_tree_file(),
        }
    }
}

/// Focus acquisition tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusSettings {
    /// Quiet period after the last mutation before focusing
    #[serde(default = "default_stability_ms")]
    pub stability_ms: u64,
    /// Base retry delay (doubles after each failed attempt)
    #[serde(default = "default_retry_ms")]
    pub retry_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for FocusSettings {
    fn default() -> Self {
        FocusSettings {
            stability_ms: default_stability_ms(),
            retry_ms: default_retry_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Editable columns, in tab order
    #[serde(default = "default_columns")]
    pub columns: Vec<String>,
    #[serde(default = "default_true")]
    pub show_key_hints: bool,
    /// Theme color overrides (`name = "#RRGGBB"`)
    #[serde(default)]
    pub colors: IndexMap<String, String>,
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            columns: default_columns(),
            show_key_hints: true,
            colors: IndexMap::new(),
        }
    }
}

fn default_indentation_width() -> u16 {
    2
}

fn default_draft_prefix() -> String {
    "draft-".into()
}

fn default_tree_file() -> String {
    "tree.json".into()
}

fn default_stability_ms() -> u64 {
    30
}

fn default_retry_ms() -> u64 {
    20
}

fn default_max_attempts() -> u32 {
    5
}

fn default_columns() -> Vec<String> {
    vec!["title".into(), "status".into(), "due".into()]
}

fn default_true() -> bool {
    true
}
