use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};

use crate::grid::ClickTarget;
use crate::tui::app::{App, Mode, MouseDrag};
use crate::tui::render::grid_view::TOGGLE_WIDTH;

pub(super) fn handle_mouse(app: &mut App, event: MouseEvent) {
    match event.kind {
        MouseEventKind::Down(MouseButton::Left) => on_press(app, event.column, event.row),
        MouseEventKind::Drag(MouseButton::Left) => on_drag(app, event.column, event.row),
        MouseEventKind::Up(MouseButton::Left) => on_release(app, event.column),
        MouseEventKind::ScrollDown if app.mode == Mode::Navigate => {
            if app.cursor + 1 < app.rows().len() {
                app.cursor += 1;
            }
        }
        MouseEventKind::ScrollUp if app.mode == Mode::Navigate => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        _ => {}
    }
}

/// Row drawn at screen line `y` (the first table line is the header)
fn row_at(app: &App, y: u16) -> Option<String> {
    let area = app.table_area;
    if y <= area.y || y >= area.y.saturating_add(area.height) {
        return None;
    }
    app.rendered_rows.get(usize::from(y - area.y - 1)).cloned()
}

fn column_at(app: &App, x: u16) -> Option<String> {
    app.column_spans
        .iter()
        .find(|(_, start, width)| x >= *start && x < start + width)
        .map(|(id, _, _)| id.clone())
}

/// Whether `x` hits the expand/collapse glyph of `row_id`
fn is_toggle(app: &App, row_id: &str, x: u16) -> bool {
    let Some((_, start, _)) = app.column_spans.first() else {
        return false;
    };
    let rows = app.rows();
    let Some(row) = rows.iter().find(|r| r.id() == row_id) else {
        return false;
    };
    let glyph = start + app.indent_cells() * row.depth as u16;
    row.node.has_children() && x >= glyph && x < glyph + TOGGLE_WIDTH
}

fn on_press(app: &mut App, x: u16, y: u16) {
    if app.mode == Mode::Move {
        return;
    }
    match row_at(app, y) {
        None => {
            app.message = None;
            let step = app.grid.handle_click_outside(false);
            app.apply_step(step);
        }
        Some(row_id) if is_toggle(app, &row_id, x) => {
            // The toggle is a control inside the row: it keeps the edit session
            let step = app.grid.handle_row_click(&row_id, None, ClickTarget::Control);
            app.apply_step(step);
            app.grid.toggle_expanded(&row_id);
            app.clamp_cursor();
        }
        Some(row_id) => {
            app.mouse_drag = Some(MouseDrag {
                row_id,
                origin_column: x,
                started: false,
            });
        }
    }
}

fn on_drag(app: &mut App, x: u16, y: u16) {
    let Some(drag) = app.mouse_drag.clone() else {
        return;
    };
    let over = row_at(app, y);

    if !drag.started {
        let moved = x != drag.origin_column || over.as_deref() != Some(drag.row_id.as_str());
        if !moved {
            return;
        }
        if !app.grid.start_drag(&drag.row_id) {
            app.mouse_drag = None;
            return;
        }
        // Starting a drag drops any edit selection
        app.mode = Mode::Move;
        app.focus = None;
        app.focused_cell = None;
        if let Some(d) = app.mouse_drag.as_mut() {
            d.started = true;
        }
    }

    let over = over
        .or_else(|| app.grid.drag().map(|d| d.over_id.clone()))
        .unwrap_or(drag.row_id);
    let offset = f64::from(x) - f64::from(drag.origin_column);
    app.grid.drag_over(&over, offset);
    app.select_row(&over);
}

fn on_release(app: &mut App, x: u16) {
    let Some(drag) = app.mouse_drag.take() else {
        return;
    };
    if drag.started {
        app.finish_drag();
        return;
    }
    // A press and release without movement is a click
    let column = column_at(app, x);
    app.select_row(&drag.row_id);
    app.message = None;
    let step = app
        .grid
        .handle_row_click(&drag.row_id, column.as_deref(), ClickTarget::Cell);
    app.apply_step(step);
}
