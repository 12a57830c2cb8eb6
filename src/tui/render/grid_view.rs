use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Position, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::grid::{CellId, DragGesture};
use crate::model::{DragProjection, FlattenedNode, Record};
use crate::tui::app::App;
use crate::tui::text::{cursor_col, display_width, fit_to_width};

/// Width of the expand/collapse glyph at the start of the tree column
pub const TOGGLE_WIDTH: u16 = 2;
/// Width of every column after the tree column
const COLUMN_WIDTH: u16 = 12;

/// Render the record grid: a header line, then one line per visible row.
pub fn render_grid_view(frame: &mut Frame, app: &mut App, area: Rect) {
    let bg = app.theme.background;
    app.table_area = area;

    let columns = app.config.ui.columns.clone();
    let constraints: Vec<Constraint> = (0..columns.len())
        .map(|i| {
            if i == 0 {
                Constraint::Fill(1)
            } else {
                Constraint::Length(COLUMN_WIDTH)
            }
        })
        .collect();
    let spans = Layout::horizontal(constraints).spacing(1).split(area);
    app.column_spans = columns
        .iter()
        .zip(spans.iter())
        .map(|(c, r)| (c.clone(), r.x, r.width))
        .collect();

    // Keep the cursor in view
    let rows = app.rows();
    let visible_height = usize::from(area.height.saturating_sub(1));
    app.clamp_cursor();
    if app.cursor < app.scroll_offset {
        app.scroll_offset = app.cursor;
    } else if visible_height > 0 && app.cursor >= app.scroll_offset + visible_height {
        app.scroll_offset = app.cursor + 1 - visible_height;
    }
    let end = rows.len().min(app.scroll_offset + visible_height);
    let start = app.scroll_offset.min(end);
    app.rendered_rows = rows[start..end].iter().map(|r| r.id().to_string()).collect();

    let mut lines: Vec<Line> = Vec::with_capacity(visible_height + 1);
    lines.push(header_line(app));

    if rows.is_empty() {
        lines.push(Line::from(Span::styled(
            " No records (a to add one)",
            Style::default().fg(app.theme.dim).bg(bg),
        )));
    }

    let drag = app.grid.drag().cloned();
    let projection = app.grid.projection();
    for (idx, row) in rows.iter().enumerate().take(end).skip(start) {
        lines.push(row_line(
            app,
            row,
            idx == app.cursor,
            drag.as_ref(),
            projection.as_ref(),
        ));
    }

    frame.render_widget(Paragraph::new(lines).style(Style::default().bg(bg)), area);

    if let Some(position) = text_cursor_position(app, &rows, area) {
        frame.set_cursor_position(position);
    }
}

fn header_line(app: &App) -> Line<'static> {
    let style = Style::default()
        .fg(app.theme.dim)
        .bg(app.theme.background)
        .add_modifier(Modifier::BOLD);
    let mut spans = Vec::new();
    for (i, (column, _, width)) in app.column_spans.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" ", style));
        }
        spans.push(Span::styled(
            fit_to_width(column, usize::from(*width)),
            style,
        ));
    }
    Line::from(spans)
}

/// Indentation and expand glyph drawn before the tree column's text
fn tree_prefix(app: &App, row: &FlattenedNode<Record>, depth: usize) -> String {
    let glyph = if row.node.has_children() {
        if app.grid.is_expanded(row.id()) {
            "\u{25BE} "
        } else {
            "\u{25B8} "
        }
    } else if row.data().is_milestone() {
        "\u{25C7} "
    } else {
        "  "
    };
    format!("{}{}", " ".repeat(usize::from(app.indent_cells()) * depth), glyph)
}

fn row_line(
    app: &App,
    row: &FlattenedNode<Record>,
    is_cursor: bool,
    drag: Option<&DragGesture>,
    projection: Option<&DragProjection<Record>>,
) -> Line<'static> {
    let theme = &app.theme;
    let session = app.grid.session();
    let is_editing_row = session.selected_row_id() == Some(row.id());
    let is_draft = app.grid.drafts().is_draft_id(row.id());
    let is_active = drag.is_some_and(|d| d.active_id == row.id());
    let is_over = drag.is_some_and(|d| d.over_id == row.id() && d.active_id != row.id());

    let mut base = Style::default().fg(theme.text).bg(theme.background);
    if is_cursor {
        base = base.bg(theme.selection_bg);
    }
    if is_draft {
        base = base.fg(theme.draft).add_modifier(Modifier::ITALIC);
    }

    // The dragged row is drawn at the depth it would land on
    let depth = match (is_active, projection) {
        (true, Some(p)) => p.depth,
        _ => row.depth,
    };
    if is_active {
        let color = if projection.is_some_and(|p| p.can_drop) {
            theme.drop_target
        } else {
            theme.red
        };
        base = base.fg(color).add_modifier(Modifier::BOLD);
    }

    let mut spans = Vec::new();
    for (i, (column, _, width)) in app.column_spans.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" ", base));
        }
        let text = if is_editing_row {
            app.cell_text(&CellId::new(row.id(), column))
        } else {
            row.data().field(column)
        };

        let mut style = base;
        if column == "status" && !is_draft && !is_active {
            style = style.fg(theme.status_color(row.data().status));
        }
        if is_editing_row && session.selected_cell().is_some_and(|c| c.column_id == *column) {
            style = style
                .fg(theme.text_bright)
                .add_modifier(Modifier::UNDERLINED);
        }
        if is_editing_row && session.field_errors().contains_key(column) {
            style = style.fg(theme.red).add_modifier(Modifier::UNDERLINED);
        }

        let content = if i == 0 {
            let marker = if is_over { "\u{2192}" } else { "" };
            format!("{}{}{}", marker, tree_prefix(app, row, depth), text)
        } else {
            text
        };
        spans.push(Span::styled(
            fit_to_width(&content, usize::from(*width)),
            style,
        ));
    }
    if is_over && let Some(first) = spans.first_mut() {
        first.style = first.style.fg(theme.drop_target);
    }
    Line::from(spans)
}

/// Screen position of the text cursor in the focused cell
fn text_cursor_position(app: &App, rows: &[FlattenedNode<Record>], area: Rect) -> Option<Position> {
    if !app.has_input_focus() {
        return None;
    }
    let cell = app.focused_cell.as_ref()?;
    let line = app.rendered_rows.iter().position(|id| *id == cell.row_id)?;
    let (col_idx, (_, x, width)) = app
        .column_spans
        .iter()
        .enumerate()
        .find(|(_, (c, _, _))| *c == cell.column_id)?;

    let mut offset = 0;
    if col_idx == 0 {
        let row = rows.iter().find(|r| r.id() == cell.row_id)?;
        offset += display_width(&tree_prefix(app, row, row.depth));
    }
    offset += cursor_col(&app.cell_text(cell), app.edit_cursor);
    let offset = u16::try_from(offset).unwrap_or(u16::MAX).min(width.saturating_sub(1));
    Some(Position::new(x + offset, area.y + 1 + line as u16))
}

#[cfg(test)]
mod tests {
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use tempfile::TempDir;

    use crate::tui::app::tests::test_app;
    use crate::tui::render::render;

    fn screen(app: &mut crate::tui::app::App) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(60, 8)).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect()
    }

    #[test]
    fn test_renders_tree_rows() {
        let tmp = TempDir::new().unwrap();
        let mut app = test_app(&tmp);
        let lines = screen(&mut app);
        assert!(lines[1].starts_with("title"));
        assert!(lines[2].starts_with("\u{25BE} Alpha"));
        assert!(lines[3].starts_with("    Beta"));
        assert!(lines[5].starts_with("\u{25C7} Delta"));
        assert!(lines[3].contains("todo"));
        assert_eq!(app.rendered_rows, vec!["N-001", "N-002", "N-003", "N-004"]);
        assert_eq!(app.column_spans[0].1, 0);
    }

    #[test]
    fn test_scroll_follows_cursor() {
        let tmp = TempDir::new().unwrap();
        let mut app = test_app(&tmp);
        let mut terminal = Terminal::new(TestBackend::new(60, 5)).unwrap();
        app.cursor = 3;
        terminal.draw(|frame| render(frame, &mut app)).unwrap();
        // title bar + header + status leave two row lines
        assert_eq!(app.scroll_offset, 2);
        assert_eq!(app.rendered_rows, vec!["N-003", "N-004"]);
    }

    #[test]
    fn test_indent_follows_config() {
        let tmp = TempDir::new().unwrap();
        let mut app = test_app(&tmp);
        app.config.grid.indentation_width = 4;
        let lines = screen(&mut app);
        assert!(lines[3].starts_with("      Beta"));
    }

    #[test]
    fn test_dragged_row_drawn_at_projected_depth() {
        let tmp = TempDir::new().unwrap();
        let mut app = test_app(&tmp);
        assert!(app.grid.start_drag("N-003"));
        app.grid.drag_over("N-003", -2.0);
        let lines = screen(&mut app);
        assert!(lines[4].starts_with("  Gamma"));
    }
}
