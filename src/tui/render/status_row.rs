use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::app::{App, Mode};
use crate::tui::text::display_width;

/// Render the status row (bottom of screen)
pub fn render_status_row(frame: &mut Frame, app: &App, area: Rect) {
    let bg = app.theme.background;
    let width = usize::from(area.width);

    let mut spans = Vec::new();
    let hint = match app.mode {
        Mode::Navigate => {
            if let Some(message) = &app.message {
                let fg = if message.is_error {
                    app.theme.red
                } else {
                    app.theme.green
                };
                spans.push(Span::styled(message.text.clone(), Style::default().fg(fg).bg(bg)));
            }
            "e edit  a add  A add child  m move  space fold  q quit"
        }
        Mode::Edit => {
            let cell = app
                .grid
                .session()
                .selected_cell()
                .map(|c| c.to_string())
                .unwrap_or_default();
            spans.push(Span::styled(
                format!("EDIT {}", cell),
                Style::default().fg(app.theme.highlight).bg(bg),
            ));
            if app.grid.session().is_saving() {
                spans.push(Span::styled(
                    "  saving\u{2026}",
                    Style::default().fg(app.theme.yellow).bg(bg),
                ));
            }
            if let Some(message) = app.message.as_ref().filter(|m| m.is_error) {
                spans.push(Span::styled(
                    format!("  {}", message.text),
                    Style::default().fg(app.theme.red).bg(bg),
                ));
            }
            "tab next  enter save  esc cancel"
        }
        Mode::Move => {
            let (text, fg) = match app.grid.projection() {
                Some(p) if p.can_drop => {
                    let parent = p.parent_id.as_deref().unwrap_or("top level");
                    (format!("MOVE under {} (depth {})", parent, p.depth), app.theme.drop_target)
                }
                Some(p) => {
                    let reason = p.reason.map(|r| r.to_string()).unwrap_or_default();
                    (format!("MOVE blocked: {}", reason), app.theme.red)
                }
                None => ("MOVE".to_string(), app.theme.dim),
            };
            spans.push(Span::styled(text, Style::default().fg(fg).bg(bg)));
            "\u{2190}/\u{2192} depth  \u{2191}/\u{2193} row  enter drop  esc cancel"
        }
    };

    // Right-align the key hint when it fits
    if app.config.ui.show_key_hints {
        let content_width: usize = spans.iter().map(|s| display_width(&s.content)).sum();
        let hint_width = display_width(hint);
        if content_width + hint_width < width {
            let padding = width - content_width - hint_width;
            spans.push(Span::styled(" ".repeat(padding), Style::default().bg(bg)));
            spans.push(Span::styled(hint, Style::default().fg(app.theme.dim).bg(bg)));
        }
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(bg));
    frame.render_widget(paragraph, area);
}
