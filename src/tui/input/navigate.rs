use crossterm::event::{KeyCode, KeyEvent};

use crate::grid::ClickTarget;
use crate::tui::app::{App, Mode};

pub(super) fn handle_navigate(app: &mut App, key: KeyEvent) {
    app.message = None;
    let rows = app.rows();
    let current = rows.get(app.cursor);

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('j') | KeyCode::Down => {
            if app.cursor + 1 < rows.len() {
                app.cursor += 1;
            }
        }
        KeyCode::Char('k') | KeyCode::Up => app.cursor = app.cursor.saturating_sub(1),
        KeyCode::Char('g') | KeyCode::Home => app.cursor = 0,
        KeyCode::Char('G') | KeyCode::End => app.cursor = rows.len().saturating_sub(1),
        KeyCode::Char(' ') => {
            if let Some(row) = current
                && row.node.has_children()
            {
                let id = row.id().to_string();
                app.grid.toggle_expanded(&id);
            }
        }
        KeyCode::Char('l') | KeyCode::Right => {
            if let Some(row) = current
                && row.node.has_children()
                && !app.grid.is_expanded(row.id())
            {
                let id = row.id().to_string();
                app.grid.toggle_expanded(&id);
            }
        }
        KeyCode::Char('h') | KeyCode::Left => {
            // Collapse, or jump to the parent of a leaf / collapsed row
            if let Some(row) = current {
                let id = row.id().to_string();
                if row.node.has_children() && app.grid.is_expanded(&id) {
                    app.grid.toggle_expanded(&id);
                } else if let Some(pid) = row.parent_id.clone() {
                    app.select_row(&pid);
                }
            }
        }
        KeyCode::Char('e') | KeyCode::Enter => {
            if let Some(row) = current {
                let id = row.id().to_string();
                let step = app.grid.handle_row_click(&id, None, ClickTarget::Cell);
                app.apply_step(step);
            }
        }
        KeyCode::Char('a') => {
            // New sibling at the end of the cursor row's parent
            let parent = current.and_then(|r| r.parent_id.clone());
            app.add_draft(parent.as_deref());
        }
        KeyCode::Char('A') => {
            let parent = current.map(|r| r.id().to_string());
            app.add_draft(parent.as_deref());
        }
        KeyCode::Char('m') => {
            if let Some(row) = current {
                let id = row.id().to_string();
                if app.grid.start_drag(&id) {
                    app.mode = Mode::Move;
                    app.move_levels = 0;
                }
            }
        }
        _ => {}
    }
}
