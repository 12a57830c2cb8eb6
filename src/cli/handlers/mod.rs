mod init;
pub use init::cmd_init;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::grid::{DropOutcome, Grid, SaveStart, Step};
use crate::io::config_io;
use crate::io::tree_store::TreeStore;
use crate::model::config::GridConfig;
use crate::model::node::{FlattenedNode, Tree};
use crate::model::record::{Record, RecordChanges, RecordKind, Status};
use crate::ops::projection::compute_order;
use crate::ops::records::{RecordForm, record_validator};
use crate::ops::tree_codec::{check_ids, count_nodes, flatten};

type HandlerResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> HandlerResult {
    let json = cli.json;
    let start = start_dir(cli.workspace_dir.as_deref())?;

    match cli.command {
        None => Err("no command given (try `tg --help`)".into()),
        Some(cmd) => match cmd {
            // Init is handled in main.rs before workspace discovery
            Commands::Init(args) => cmd_init(args, &start),

            // Read commands
            Commands::List(args) => cmd_list(args, &start, json),
            Commands::Count => cmd_count(&start, json),
            Commands::Show(args) => cmd_show(args, &start, json),
            Commands::Check => cmd_check(&start, json),
            Commands::Project(args) => cmd_project(args, &start, json),

            // Write commands
            Commands::Add(args) => cmd_add(args, &start, json),
            Commands::Edit(args) => cmd_edit(args, &start, json),
            Commands::Mv(args) => cmd_mv(args, &start, json),
        },
    }
}

/// The directory discovery starts from: `-C` if given, else the cwd.
pub fn start_dir(workspace_dir: Option<&str>) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match workspace_dir {
        Some(dir) => Ok(std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?),
        None => Ok(std::env::current_dir()?),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A discovered workspace with its tree loaded
pub struct Workspace {
    pub root: PathBuf,
    pub config: GridConfig,
    pub store: TreeStore,
}

pub fn load_workspace(start: &Path) -> Result<Workspace, Box<dyn std::error::Error>> {
    let root = config_io::discover_workspace(start)?;
    let config = config_io::read_config(&root)?;
    let store = TreeStore::open(&config_io::tree_path(&root, &config))?;
    tracing::debug!(root = %root.display(), "workspace loaded");
    Ok(Workspace {
        root,
        config,
        store,
    })
}

/// Ids of every node that has children
pub fn all_parents(tree: &Tree<Record>) -> HashSet<String> {
    flatten(tree)
        .into_iter()
        .filter(|row| row.node.has_children())
        .map(|row| row.id().to_string())
        .collect()
}

/// A grid over the workspace tree with every row visible
fn open_grid(ws: &Workspace) -> Grid<Record, RecordForm> {
    let mut grid = Grid::new(
        ws.store.tree().clone(),
        RecordForm::new(ws.config.ui.columns.clone()),
        &ws.config.grid.draft_prefix,
        f64::from(ws.config.grid.indentation_width),
    );
    grid.set_validator(Box::new(record_validator()));
    grid.set_expanded(all_parents(ws.store.tree()));
    grid
}

fn find_row<'a>(
    rows: &'a [FlattenedNode<Record>],
    id: &str,
) -> Result<&'a FlattenedNode<Record>, String> {
    rows.iter()
        .find(|r| r.id() == id)
        .ok_or_else(|| format!("record not found: {}", id))
}

/// Drive a pending save to completion. Returns the saved row id.
fn finish_save(
    grid: &mut Grid<Record, RecordForm>,
    store: &mut TreeStore,
    start: SaveStart<RecordChanges>,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    match start {
        SaveStart::Pending(request) => {
            let resolved = grid
                .resolve_save(store, &request)
                .ok_or("save was not in flight")?;
            match resolved.step {
                Step::SaveFailed(msg) => Err(msg.into()),
                _ => Ok(Some(resolved.row_id)),
            }
        }
        SaveStart::Invalid => {
            let errors: Vec<String> = grid
                .session()
                .field_errors()
                .iter()
                .map(|(field, msg)| format!("{}: {}", field, msg))
                .collect();
            Err(errors.join("; ").into())
        }
        SaveStart::Unchanged => Ok(None),
        SaveStart::Busy => Err("another save is in progress".into()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> HandlerResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(args: ListArgs, start: &Path, json: bool) -> HandlerResult {
    let ws = load_workspace(start)?;
    let rows = flatten(ws.store.tree());

    let keep: Option<HashSet<&str>> = match args.filter.as_deref() {
        Some(pattern) => {
            let re = Regex::new(pattern).map_err(|e| format!("invalid filter: {}", e))?;
            let mut keep = HashSet::new();
            for row in rows.iter().filter(|r| re.is_match(&r.data().title)) {
                keep.insert(row.id());
                keep.extend(row.ancestor_ids.iter().map(String::as_str));
            }
            Some(keep)
        }
        None => None,
    };
    let shown: Vec<&FlattenedNode<Record>> = rows
        .iter()
        .filter(|r| keep.as_ref().is_none_or(|k| k.contains(r.id())))
        .collect();

    if json {
        let out: Vec<RowJson> = shown.iter().map(|r| row_to_json(r)).collect();
        return print_json(&out);
    }
    for row in shown {
        println!("{}", format_row(row));
    }
    Ok(())
}

fn cmd_count(start: &Path, json: bool) -> HandlerResult {
    let ws = load_workspace(start)?;
    let rows = flatten(ws.store.tree());
    let with_status = |s: Status| rows.iter().filter(|r| r.data().status == s).count();
    let counts = CountJson {
        total: count_nodes(ws.store.tree()),
        todo: with_status(Status::Todo),
        active: with_status(Status::Active),
        done: with_status(Status::Done),
        milestones: rows.iter().filter(|r| r.data().is_milestone()).count(),
    };
    if json {
        return print_json(&counts);
    }
    println!(
        "{} records ({} todo, {} active, {} done, {} milestones)",
        counts.total, counts.todo, counts.active, counts.done, counts.milestones
    );
    Ok(())
}

fn cmd_show(args: ShowArgs, start: &Path, json: bool) -> HandlerResult {
    let ws = load_workspace(start)?;
    let rows = flatten(ws.store.tree());
    let row = find_row(&rows, &args.id)?;
    if json {
        return print_json(&RecordDetailJson {
            row: row_to_json(row),
            ancestors: row.ancestor_ids.clone(),
            children: row.node.children.iter().map(|c| c.id.clone()).collect(),
        });
    }
    for line in format_record_detail(row) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_check(start: &Path, json: bool) -> HandlerResult {
    let ws = load_workspace(start)?;
    let issues: Vec<String> = check_ids(ws.store.tree())
        .iter()
        .map(|i| i.to_string())
        .collect();
    let valid = issues.is_empty();
    if json {
        print_json(&CheckJson {
            valid,
            issues: issues.clone(),
        })?;
    } else if valid {
        println!("ok: {} records", count_nodes(ws.store.tree()));
    } else {
        println!("Errors:");
        for issue in &issues {
            println!("  {}", issue);
        }
    }
    if valid {
        Ok(())
    } else {
        Err(format!("{} issue(s) found", issues.len()).into())
    }
}

fn cmd_project(args: DragArgs, start: &Path, json: bool) -> HandlerResult {
    let ws = load_workspace(start)?;
    let mut grid = open_grid(&ws);
    if !grid.start_drag(&args.active) {
        return Err(format!("record not found: {}", args.active).into());
    }
    let offset = args.offset as f64 * f64::from(ws.config.grid.indentation_width);
    let projection = grid
        .drag_over(&args.over, offset)
        .ok_or("no drag in progress")?;
    let order = compute_order(
        &grid.rows(),
        &args.active,
        &args.over,
        projection.parent_id.as_deref(),
    );
    grid.cancel_drag();

    let out = projection_to_json(&args.active, &args.over, &projection, order);
    if json {
        return print_json(&out);
    }
    for line in format_projection(&out) {
        println!("{}", line);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(args: AddArgs, start: &Path, json: bool) -> HandlerResult {
    let mut ws = load_workspace(start)?;
    let mut grid = open_grid(&ws);

    if let Some(parent) = args.parent.as_deref() {
        let rows = grid.rows();
        let row = find_row(&rows, parent)?;
        if row.data().is_milestone() {
            return Err(format!("{} is a milestone and cannot have children", parent).into());
        }
    }
    let draft = grid
        .create_draft(args.parent.as_deref())
        .ok_or("could not create a new row")?;
    grid.session_mut()
        .hooks_mut()
        .set_field(&draft, "title", args.title.as_str());

    let rows = grid.rows();
    let start = match grid.session_mut().save_form_changes(&draft, &rows) {
        SaveStart::Pending(mut request) if args.milestone => {
            request.changes.kind = Some(RecordKind::Milestone);
            SaveStart::Pending(request)
        }
        other => other,
    };
    finish_save(&mut grid, &mut ws.store, start)?;

    let id = ws
        .store
        .last_created()
        .ok_or("record was not created")?
        .to_string();
    if json {
        let rows = flatten(ws.store.tree());
        return print_json(&row_to_json(find_row(&rows, &id)?));
    }
    println!("{}", id);
    Ok(())
}

fn cmd_edit(args: EditArgs, start: &Path, json: bool) -> HandlerResult {
    let mut ws = load_workspace(start)?;
    let mut grid = open_grid(&ws);
    let rows = grid.rows();
    find_row(&rows, &args.id)?;

    let form = grid.session_mut().hooks_mut();
    let fields = [
        ("title", args.title.as_deref()),
        ("status", args.status.as_deref()),
        ("due", args.due.as_deref()),
    ];
    for (column, value) in fields {
        if let Some(value) = value {
            if !form.columns().iter().any(|c| c == column) {
                return Err(format!("column '{}' is not editable in this workspace", column).into());
            }
            form.set_field(&args.id, column, value);
        }
    }

    let start = grid.session_mut().save_form_changes(&args.id, &rows);
    let saved = finish_save(&mut grid, &mut ws.store, start)?;

    if json {
        let rows = flatten(ws.store.tree());
        return print_json(&row_to_json(find_row(&rows, &args.id)?));
    }
    match saved {
        Some(_) => println!("updated {}", args.id),
        None => println!("no changes"),
    }
    Ok(())
}

fn cmd_mv(args: DragArgs, start: &Path, json: bool) -> HandlerResult {
    let mut ws = load_workspace(start)?;
    let mut grid = open_grid(&ws);
    if !grid.start_drag(&args.active) {
        return Err(format!("record not found: {}", args.active).into());
    }
    let offset = args.offset as f64 * f64::from(ws.config.grid.indentation_width);
    grid.drag_over(&args.over, offset);

    let request = match grid.drop_drag() {
        DropOutcome::Persist(request) => request,
        DropOutcome::Unmoved => {
            if json {
                return print_json(&serde_json::json!({ "moved": false }));
            }
            println!("{} is already there", args.active);
            return Ok(());
        }
        DropOutcome::Rejected(reason) => {
            return Err(format!("cannot move {}: {}", args.active, reason).into());
        }
        DropOutcome::NoDrag => return Err("no drag in progress".into()),
    };

    match grid.resolve_move(&mut ws.store, &request) {
        Some(Ok(())) => {}
        Some(Err(reason)) => return Err(reason.to_string().into()),
        None => return Err("move was not in flight".into()),
    }

    if json {
        return print_json(&serde_json::json!({
            "moved": true,
            "id": request.node_id,
            "parent": request.new_parent_id,
            "order": request.new_order,
        }));
    }
    println!(
        "moved {} under {} at position {}",
        request.node_id,
        request.new_parent_id.as_deref().unwrap_or("(root)"),
        request.new_order
    );
    Ok(())
}
