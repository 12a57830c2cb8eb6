use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::grid::GridKey;
use crate::tui::app::App;
use crate::tui::text::{next_boundary, prev_boundary, snap_to_boundary};

/// Keys the edit session handles itself
fn grid_key(key: &KeyEvent) -> Option<GridKey> {
    match key.code {
        KeyCode::Enter => Some(GridKey::Enter),
        KeyCode::Down => Some(GridKey::ArrowDown),
        KeyCode::Up => Some(GridKey::ArrowUp),
        KeyCode::Tab => Some(GridKey::Tab),
        KeyCode::BackTab => Some(GridKey::BackTab),
        KeyCode::Esc => Some(GridKey::Escape),
        _ => None,
    }
}

pub(super) fn handle_edit(app: &mut App, key: KeyEvent) {
    if let Some(grid_key) = grid_key(&key) {
        app.message = None;
        let step = app.grid.handle_key(grid_key);
        app.apply_step(step);
        return;
    }

    // Typing waits until the cell's input has focus
    if !app.has_input_focus() {
        return;
    }

    match key.code {
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            edit_text(app, |text, cursor| {
                text.replace_range(..*cursor, "");
                *cursor = 0;
            });
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            insert_text(app, c.encode_utf8(&mut [0; 4]));
        }
        KeyCode::Backspace => edit_text(app, |text, cursor| {
            if let Some(prev) = prev_boundary(text, *cursor) {
                text.replace_range(prev..*cursor, "");
                *cursor = prev;
            }
        }),
        KeyCode::Delete => edit_text(app, |text, cursor| {
            if let Some(next) = next_boundary(text, *cursor) {
                text.replace_range(*cursor..next, "");
            }
        }),
        KeyCode::Left => {
            let text = focused_text(app);
            if let Some(prev) = prev_boundary(&text, snap_to_boundary(&text, app.edit_cursor)) {
                app.edit_cursor = prev;
            }
        }
        KeyCode::Right => {
            let text = focused_text(app);
            if let Some(next) = next_boundary(&text, snap_to_boundary(&text, app.edit_cursor)) {
                app.edit_cursor = next;
            }
        }
        KeyCode::Home => app.edit_cursor = 0,
        KeyCode::End => app.edit_cursor = focused_text(app).len(),
        _ => {}
    }
}

fn focused_text(app: &App) -> String {
    app.focused_cell
        .as_ref()
        .map(|cell| app.cell_text(cell))
        .unwrap_or_default()
}

/// Insert at the text cursor of the focused cell.
pub(super) fn insert_text(app: &mut App, insert: &str) {
    edit_text(app, |text, cursor| {
        text.insert_str(*cursor, insert);
        *cursor += insert.len();
    });
}

/// Apply `f` to the focused cell's text and cursor, then buffer the result.
fn edit_text(app: &mut App, f: impl FnOnce(&mut String, &mut usize)) {
    if !app.has_input_focus() {
        return;
    }
    let Some(cell) = app.focused_cell.clone() else {
        return;
    };
    let mut text = app.cell_text(&cell);
    let mut cursor = snap_to_boundary(&text, app.edit_cursor);
    f(&mut text, &mut cursor);
    app.edit_cursor = cursor;
    app.grid
        .session_mut()
        .hooks_mut()
        .set_field(&cell.row_id, &cell.column_id, text);
}
