use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;

use crate::cli::handlers::{Workspace, all_parents, load_workspace, start_dir};
use crate::grid::{CellId, DropOutcome, FocusAcquirer, FocusHost, FocusStatus, Grid, Step};
use crate::io::config_io::{self, CONFIG_FILE};
use crate::io::state::{UiState, read_ui_state, write_ui_state};
use crate::io::tree_store::TreeStore;
use crate::io::watcher::{FileEvent, TreeWatcher};
use crate::logging;
use crate::model::{FlattenedNode, GridConfig, Record, RecordChanges};
use crate::ops::records::{RecordForm, record_validator};
use crate::ops::tree_codec::find_by_id;

use super::input;
use super::render;
use super::text::snap_to_boundary;
use super::theme::Theme;

pub const LOG_FILE: &str = ".treegrid.log";

/// Current interaction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Navigate,
    /// A row is selected for inline editing
    Edit,
    /// Keyboard drag of the row under the cursor
    Move,
}

/// Mouse button held on a row
#[derive(Debug, Clone)]
pub struct MouseDrag {
    pub row_id: String,
    pub origin_column: u16,
    /// Set once the pointer leaves the origin cell
    pub started: bool,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub text: String,
    pub is_error: bool,
}

/// Main application state
pub struct App {
    pub root: PathBuf,
    pub config: GridConfig,
    pub store: TreeStore,
    pub grid: Grid<Record, RecordForm>,
    pub mode: Mode,
    pub should_quit: bool,
    pub theme: Theme,
    /// Cursor index into the visible rows
    pub cursor: usize,
    /// First visible row
    pub scroll_offset: usize,
    pub message: Option<Message>,
    /// Byte offset of the text cursor in the focused cell
    pub edit_cursor: usize,
    /// Pending focus request for the selected cell
    pub focus: Option<FocusAcquirer>,
    /// Cell that holds the text cursor
    pub focused_cell: Option<CellId>,
    /// Keyboard move: horizontal travel in depth levels
    pub move_levels: i64,
    pub mouse_drag: Option<MouseDrag>,
    /// Where the table was drawn and which rows it showed (set by render)
    pub table_area: Rect,
    pub rendered_rows: Vec<String>,
    /// Column id, first x, width
    pub column_spans: Vec<(String, u16, u16)>,
}

impl App {
    pub fn new(ws: Workspace) -> Self {
        let mut grid = Grid::new(
            ws.store.tree().clone(),
            RecordForm::new(ws.config.ui.columns.clone()),
            &ws.config.grid.draft_prefix,
            f64::from(ws.config.grid.indentation_width),
        );
        grid.set_validator(Box::new(record_validator()));
        grid.set_expanded(all_parents(ws.store.tree()));

        App {
            root: ws.root,
            theme: Theme::from_config(&ws.config.ui),
            config: ws.config,
            store: ws.store,
            grid,
            mode: Mode::Navigate,
            should_quit: false,
            cursor: 0,
            scroll_offset: 0,
            message: None,
            edit_cursor: 0,
            focus: None,
            focused_cell: None,
            move_levels: 0,
            mouse_drag: None,
            table_area: Rect::default(),
            rendered_rows: Vec::new(),
            column_spans: Vec::new(),
        }
    }

    pub fn rows(&self) -> Vec<FlattenedNode<Record>> {
        self.grid.rows()
    }

    pub fn cursor_row_id(&self) -> Option<String> {
        self.rows().get(self.cursor).map(|r| r.id().to_string())
    }

    /// Move the cursor onto `row_id` if it is visible.
    pub fn select_row(&mut self, row_id: &str) {
        if let Some(idx) = self.rows().iter().position(|r| r.id() == row_id) {
            self.cursor = idx;
        }
    }

    /// Terminal cells per depth level in the tree column
    pub fn indent_cells(&self) -> u16 {
        self.config.grid.indentation_width
    }

    pub fn clamp_cursor(&mut self) {
        let len = self.rows().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    pub fn notify(&mut self, text: impl Into<String>) {
        self.message = Some(Message {
            text: text.into(),
            is_error: false,
        });
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.message = Some(Message {
            text: text.into(),
            is_error: true,
        });
    }

    // -----------------------------------------------------------------------
    // Editing
    // -----------------------------------------------------------------------

    /// Text currently shown in `cell` (buffered input or the stored value)
    pub fn cell_text(&self, cell: &CellId) -> String {
        self.grid
            .session()
            .hooks()
            .field_text(&cell.row_id, &cell.column_id, &self.grid.all_rows())
    }

    /// Whether typed text goes into the selected cell
    pub fn has_input_focus(&self) -> bool {
        self.focused_cell.is_some()
            && self.focused_cell.as_ref() == self.grid.session().selected_cell()
    }

    /// React to the outcome of a session operation.
    pub fn apply_step(&mut self, step: Step<RecordChanges>) {
        match step {
            Step::Ignored => {}
            Step::Focus(cell) => self.request_focus(cell),
            Step::Exited => self.drop_focus(),
            Step::Invalid => {
                let errors: Vec<String> = self
                    .grid
                    .session()
                    .field_errors()
                    .iter()
                    .map(|(field, msg)| format!("{}: {}", field, msg))
                    .collect();
                self.error(errors.join("; "));
            }
            Step::Save(request) => {
                let resolved = self.grid.resolve_save(&mut self.store, &request);
                self.grid.set_tree(self.store.tree().clone());
                if let Some(resolved) = resolved {
                    if resolved.saved && resolved.was_draft {
                        if let Some(id) = self.store.last_created().map(str::to_string) {
                            self.select_row(&id);
                        }
                        self.notify("added");
                    }
                    self.apply_step(resolved.step);
                }
            }
            Step::DraftCancelled(_) => {
                self.drop_focus();
                self.clamp_cursor();
            }
            Step::SaveFailed(msg) => self.error(format!("save failed: {}", msg)),
        }
        self.sync_mode();
    }

    pub fn sync_mode(&mut self) {
        if self.mode == Mode::Move && self.grid.drag().is_some() {
            return;
        }
        self.mode = if self.grid.session().is_editing() {
            Mode::Edit
        } else {
            Mode::Navigate
        };
    }

    /// Add an unsaved row under `parent_id` and start editing it.
    pub fn add_draft(&mut self, parent_id: Option<&str>) {
        if let Some(pid) = parent_id
            && find_by_id(self.store.tree(), pid).is_some_and(|n| n.data.is_milestone())
        {
            self.error(format!("{} is a milestone and cannot have children", pid));
            return;
        }
        match self.grid.create_draft(parent_id) {
            Some(id) => {
                self.select_row(&id);
                if let Some(cell) = self.grid.session().selected_cell().cloned() {
                    self.request_focus(cell);
                }
            }
            None => self.error("finish the current row first"),
        }
        self.sync_mode();
    }

    fn request_focus(&mut self, cell: CellId) {
        self.focused_cell = None;
        self.select_row(&cell.row_id);
        self.focus = Some(FocusAcquirer::new(cell, &self.config.focus, Instant::now()));
    }

    fn drop_focus(&mut self) {
        self.focus = None;
        self.focused_cell = None;
    }

    /// Advance a pending focus request.
    pub fn tick(&mut self, now: Instant) {
        let Some(acquirer) = self.focus.as_mut() else {
            return;
        };
        let target = acquirer.target().clone();
        let mut host = RenderedCells {
            rendered: &self.rendered_rows,
            focused: &mut self.focused_cell,
        };
        match acquirer.poll(now, &mut host) {
            FocusStatus::Waiting => {}
            FocusStatus::Focused => {
                self.focus = None;
                self.edit_cursor = self.cell_text(&target).len();
            }
            FocusStatus::GaveUp => {
                self.focus = None;
                self.error(format!("could not focus {}", target));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Moving
    // -----------------------------------------------------------------------

    /// Release the current drag and persist the move.
    pub fn finish_drag(&mut self) {
        let outcome = self.grid.drop_drag();
        self.mode = Mode::Navigate;
        self.move_levels = 0;
        match outcome {
            DropOutcome::NoDrag | DropOutcome::Unmoved => {}
            DropOutcome::Rejected(reason) => self.error(format!("cannot move: {}", reason)),
            DropOutcome::Persist(request) => {
                let result = self.grid.resolve_move(&mut self.store, &request);
                self.grid.set_tree(self.store.tree().clone());
                match result {
                    Some(Ok(())) => {
                        self.select_row(&request.node_id);
                        self.notify("moved");
                    }
                    Some(Err(reason)) => self.error(format!("move failed: {}", reason)),
                    None => {}
                }
            }
        }
    }

    pub fn cancel_drag(&mut self) {
        self.grid.cancel_drag();
        self.mode = Mode::Navigate;
        self.move_levels = 0;
        self.mouse_drag = None;
    }

    // -----------------------------------------------------------------------
    // External changes
    // -----------------------------------------------------------------------

    /// The tree file or config changed on disk.
    pub fn handle_file_event(&mut self, event: FileEvent) {
        let FileEvent::Changed(paths) = event;
        let config_changed = paths
            .iter()
            .any(|p| p.file_name().is_some_and(|n| n == CONFIG_FILE));
        if config_changed {
            match config_io::read_config(&self.root) {
                Ok(config) => self.apply_config(config),
                Err(e) => tracing::warn!(error = %e, "config reload failed"),
            }
        }

        if let Err(e) = self.store.reload() {
            tracing::warn!(error = %e, "tree reload failed");
            self.error(format!("reload failed: {}", e));
            return;
        }
        self.grid.set_tree(self.store.tree().clone());
        if let Some(acquirer) = self.focus.as_mut() {
            acquirer.notify_mutation(Instant::now());
        }
        // The focused cell may now hold different text
        if let Some(cell) = self.focused_cell.clone() {
            self.edit_cursor = snap_to_boundary(&self.cell_text(&cell), self.edit_cursor);
        }
        self.clamp_cursor();
        tracing::debug!("tree reloaded after external change");
    }

    /// Push a reloaded config into the theme, the grid and the form.
    fn apply_config(&mut self, mut config: GridConfig) {
        self.theme = Theme::from_config(&config.ui);
        self.grid
            .set_indentation_width(f64::from(config.grid.indentation_width));
        self.grid
            .session_mut()
            .hooks_mut()
            .set_columns(config.ui.columns.clone());
        if config.grid.draft_prefix != self.config.grid.draft_prefix
            && !self.grid.set_draft_prefix(&config.grid.draft_prefix)
        {
            tracing::warn!("draft prefix unchanged while a draft is open");
            config.grid.draft_prefix = self.config.grid.draft_prefix.clone();
        }
        self.config = config;
    }
}

/// The rows drawn by the last render pass host the editable cells.
struct RenderedCells<'a> {
    rendered: &'a [String],
    focused: &'a mut Option<CellId>,
}

impl FocusHost for RenderedCells<'_> {
    fn try_focus(&mut self, cell: &CellId) -> bool {
        if !self.rendered.iter().any(|id| *id == cell.row_id) {
            return false;
        }
        *self.focused = Some(cell.clone());
        true
    }

    fn focused_cell(&self) -> Option<CellId> {
        self.focused.clone()
    }
}

/// Restore UI state from the state file
pub fn restore_ui_state(app: &mut App) {
    let Some(state) = read_ui_state(&app.root) else {
        return;
    };
    app.grid.set_expanded(state.expanded);
    app.scroll_offset = state.scroll_offset;
    if let Some(id) = state.cursor_id {
        app.select_row(&id);
    }
}

/// Save UI state to the state file
pub fn save_ui_state(app: &App) {
    let state = UiState {
        cursor_id: app.cursor_row_id(),
        expanded: app.grid.expanded().clone(),
        scroll_offset: app.scroll_offset,
    };
    if let Err(e) = write_ui_state(&app.root, &state) {
        tracing::warn!(error = %e, "could not save ui state");
    }
}

/// Run the TUI application
pub fn run(workspace_dir: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let start = start_dir(workspace_dir)?;
    let ws = load_workspace(&start)?;
    logging::init_file(&ws.root.join(LOG_FILE));

    let watched = vec![ws.store.path().to_path_buf(), ws.root.join(CONFIG_FILE)];
    let watcher = match TreeWatcher::start(&ws.root, watched) {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "file watcher unavailable");
            None
        }
    };

    let mut app = App::new(ws);
    restore_ui_state(&mut app);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Restore the terminal on panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let result = run_event_loop(&mut terminal, &mut app, watcher.as_ref());

    save_ui_state(&app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    watcher: Option<&TreeWatcher>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut save_counter = 0u32;
    loop {
        terminal.draw(|frame| render::render(frame, app))?;

        // Poll faster while a focus request is waiting on the next render
        let timeout = if app.focus.is_some() {
            Duration::from_millis(10)
        } else {
            Duration::from_millis(250)
        };
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    input::handle_key(app, key);
                    save_counter += 1;
                }
                Event::Mouse(mouse) => input::handle_mouse(app, mouse),
                Event::Paste(text) => input::handle_paste(app, &text),
                _ => {}
            }
        }

        if let Some(watcher) = watcher {
            for event in watcher.poll() {
                app.handle_file_event(event);
            }
        }
        app.tick(Instant::now());

        // Debounced state save: every ~5 key presses
        if save_counter >= 5 {
            save_ui_state(app);
            save_counter = 0;
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}
