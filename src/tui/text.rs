use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Display width in terminal cells.
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncate `s` to `cells` terminal cells (ending in `…` when cut), then pad
/// with spaces to exactly `cells`.
pub fn fit_to_width(s: &str, cells: usize) -> String {
    if cells == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut width = 0;
    if display_width(s) <= cells {
        out.push_str(s);
        width = display_width(s);
    } else {
        let budget = cells - 1;
        for grapheme in s.graphemes(true) {
            let gw = display_width(grapheme);
            if width + gw > budget {
                break;
            }
            width += gw;
            out.push_str(grapheme);
        }
        out.push('\u{2026}');
        width += 1;
    }
    out.extend(std::iter::repeat_n(' ', cells.saturating_sub(width)));
    out
}

/// Next grapheme boundary after `byte_offset`, or None at the end.
pub fn next_boundary(s: &str, byte_offset: usize) -> Option<usize> {
    if byte_offset >= s.len() {
        return None;
    }
    match s[byte_offset..].grapheme_indices(true).nth(1) {
        Some((i, _)) => Some(byte_offset + i),
        None => Some(s.len()),
    }
}

/// Previous grapheme boundary before `byte_offset`, or None at the start.
pub fn prev_boundary(s: &str, byte_offset: usize) -> Option<usize> {
    if byte_offset == 0 {
        return None;
    }
    s[..byte_offset.min(s.len())]
        .grapheme_indices(true)
        .last()
        .map(|(i, _)| i)
}

/// Clamp `byte_offset` into `s` and move it back onto a grapheme boundary.
pub fn snap_to_boundary(s: &str, byte_offset: usize) -> usize {
    if byte_offset >= s.len() {
        return s.len();
    }
    s.grapheme_indices(true)
        .map(|(i, _)| i)
        .take_while(|&i| i <= byte_offset)
        .last()
        .unwrap_or(0)
}

/// Display column of a byte offset.
pub fn cursor_col(s: &str, byte_offset: usize) -> usize {
    display_width(&s[..snap_to_boundary(s, byte_offset)])
}
