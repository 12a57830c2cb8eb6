use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tg", about = concat!("treegrid v", env!("CARGO_PKG_VERSION"), " - drag, nest and edit a tree of records"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different workspace directory
    #[arg(short = 'C', long = "workspace-dir", global = true)]
    pub workspace_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new workspace in the current directory
    Init(InitArgs),
    /// List records as an indented tree
    List(ListArgs),
    /// Count records
    Count,
    /// Show one record
    Show(ShowArgs),
    /// Validate ids in the tree file
    Check,
    /// Add a record (at the end of its parent)
    Add(AddArgs),
    /// Edit a record's fields
    Edit(EditArgs),
    /// Preview where a drag would land without moving anything
    Project(DragArgs),
    /// Move a record as if dragged over another row and dropped
    Mv(DragArgs),
}

// ---------------------------------------------------------------------------
// Init args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Workspace name (default: inferred from directory name)
    #[arg(long)]
    pub name: Option<String>,
    /// Reinitialize even if treegrid.toml already exists
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Read command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    /// Only show records whose title matches this regex (ancestors are kept)
    #[arg(long)]
    pub filter: Option<String>,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Record ID
    pub id: String,
}

// ---------------------------------------------------------------------------
// Write command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct AddArgs {
    /// Record title
    pub title: String,
    /// Parent record ID (default: root level)
    #[arg(long)]
    pub parent: Option<String>,
    /// Create a milestone (cannot receive children)
    #[arg(long)]
    pub milestone: bool,
}

#[derive(Args)]
pub struct EditArgs {
    /// Record ID
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    /// todo, active or done
    #[arg(long)]
    pub status: Option<String>,
    /// Due date (YYYY-MM-DD); an empty string clears it
    #[arg(long)]
    pub due: Option<String>,
}

#[derive(Args)]
pub struct DragArgs {
    /// Record being dragged
    pub active: String,
    /// Row the pointer is over
    pub over: String,
    /// Horizontal travel in indentation levels (negative = left)
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub offset: i64,
}
