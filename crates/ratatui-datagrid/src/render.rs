//! Low-level buffer drawing shared by the grid regions.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::text::Span;
use unicode_width::UnicodeWidthChar;
use unicode_width::UnicodeWidthStr;

/// Draws a vertical scrollbar for `offset` within `content` rows, `viewport` of them visible.
pub fn render_scrollbar(area: Rect, buf: &mut Buffer, offset: u64, viewport: u64, content: u64, style: Style) {
    buf.set_style(area, style);
    if area.height == 0 {
        return;
    }
    if content <= viewport || content == 0 {
        for dy in 0..area.height {
            buf.set_stringn(area.x, area.y + dy, " ", 1, style);
        }
        return;
    }

    let track_h = area.height as f64;
    let thumb_h = ((viewport as f64 / content as f64) * track_h)
        .round()
        .clamp(1.0, track_h) as u16;
    let max_offset = content.saturating_sub(viewport).max(1) as f64;
    let thumb_top = ((offset as f64 / max_offset) * (track_h - thumb_h as f64))
        .round()
        .clamp(0.0, (track_h - thumb_h as f64).max(0.0)) as u16;

    for dy in 0..area.height {
        let ch = if dy >= thumb_top && dy < thumb_top + thumb_h {
            "█"
        } else {
            "│"
        };
        buf.set_stringn(area.x, area.y + dy, ch, 1, style);
    }
}

/// Draws `spans` on one row, skipping the first `start_col` display columns and stopping at
/// `max_cols`. Span styles are patched over `base`. Wide glyphs cut by either edge are dropped.
pub fn render_spans_clipped(
    x: u16,
    y: u16,
    start_col: u32,
    max_cols: u16,
    buf: &mut Buffer,
    spans: &[Span<'_>],
    base: Style,
) {
    if max_cols == 0 {
        return;
    }

    let start_col = start_col as usize;
    let max_cols = max_cols as usize;
    let mut col = 0usize;
    let mut out_cols = 0usize;
    let mut tmp = [0u8; 4];

    for span in spans {
        let style = base.patch(span.style);
        for ch in span.content.chars() {
            let ch = if ch == '\t' { ' ' } else { ch };
            let w = UnicodeWidthChar::width(ch).unwrap_or(0);
            if w == 0 {
                continue;
            }
            if col < start_col {
                col += w;
                continue;
            }
            if out_cols + w > max_cols {
                return;
            }
            let dx = out_cols as u16;
            if let Some(cell) = buf.cell_mut((x + dx, y)) {
                cell.set_style(style);
                cell.set_symbol(ch.encode_utf8(&mut tmp));
            }
            if w == 2 {
                if let Some(cell) = buf.cell_mut((x + dx + 1, y)) {
                    cell.set_style(style);
                    cell.set_symbol("");
                }
            }
            out_cols += w;
            col += w;
        }
    }
}

/// Shortens `text` to `width` display columns, ending in `…` when something was cut.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0usize;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w > width - 1 {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

/// Fits a cell line into `width` columns, truncating the last visible span and right-aligning
/// when asked.
pub fn fit_line(line: Line<'static>, width: usize, right_align: bool) -> Line<'static> {
    let total = line.width();
    if total > width {
        let mut remaining = width;
        let mut spans = Vec::new();
        for span in line.spans {
            if remaining == 0 {
                break;
            }
            let w = span.width();
            if w <= remaining {
                remaining -= w;
                spans.push(span);
            } else {
                let style = span.style;
                spans.push(Span::styled(truncate_to_width(&span.content, remaining), style));
                remaining = 0;
            }
        }
        return Line::from(spans).style(line.style);
    }
    if right_align && total < width {
        let mut spans = vec![Span::raw(" ".repeat(width - total))];
        spans.extend(line.spans);
        return Line::from(spans).style(line.style);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_keeps_room_for_the_ellipsis() {
        assert_eq!(truncate_to_width("spreadsheet", 6), "sprea…");
        assert_eq!(truncate_to_width("ok", 6), "ok");
        assert_eq!(truncate_to_width("wide", 0), "");
    }

    #[test]
    fn numbers_align_right() {
        let line = fit_line(Line::from("42"), 5, true);
        assert_eq!(line.to_string(), "   42");
    }

    #[test]
    fn clipping_skips_leading_columns() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 4, 1));
        render_spans_clipped(0, 0, 2, 4, &mut buf, &[Span::raw("abcdef")], Style::default());
        assert_eq!(buf[(0, 0)].symbol(), "c");
        assert_eq!(buf[(3, 0)].symbol(), "f");
    }
}
