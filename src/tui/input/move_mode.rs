use crossterm::event::{KeyCode, KeyEvent};

use crate::tui::app::App;

/// Keyboard drag: ↑/↓ pick the row under the pointer, ←/→ the depth.
pub(super) fn handle_move(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_drag(),
        KeyCode::Enter => app.finish_drag(),
        KeyCode::Char('h') | KeyCode::Left => {
            app.move_levels -= 1;
            update_projection(app, 0);
        }
        KeyCode::Char('l') | KeyCode::Right => {
            app.move_levels += 1;
            update_projection(app, 0);
        }
        KeyCode::Char('k') | KeyCode::Up => update_projection(app, -1),
        KeyCode::Char('j') | KeyCode::Down => update_projection(app, 1),
        _ => {}
    }
}

/// Step the hovered row by `delta` and re-project at the current level offset.
fn update_projection(app: &mut App, delta: isize) {
    let Some(over_id) = app.grid.drag().map(|d| d.over_id.clone()) else {
        return;
    };
    let rows = app.rows();
    let Some(idx) = rows.iter().position(|r| r.id() == over_id) else {
        return;
    };
    let new_idx = idx
        .saturating_add_signed(delta)
        .min(rows.len().saturating_sub(1));
    let over = rows[new_idx].id().to_string();
    let offset = app.move_levels as f64 * f64::from(app.config.grid.indentation_width);
    app.grid.drag_over(&over, offset);
    app.cursor = new_idx;
}
