//! Raw text buffer with a selection range

use super::line::Line;

/// The editable text buffer. Holds raw text plus the selection byte range;
/// everything else is derived per pass.
#[derive(Debug, Clone, Default)]
pub struct Buffer {
    text: String,
    sel_start: usize,
    sel_end: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Buffer::default()
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let end = text.len();
        Buffer {
            text,
            sel_start: end,
            sel_end: end,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn selection(&self) -> (usize, usize) {
        (self.sel_start, self.sel_end)
    }

    /// Replace the whole buffer, leaving the cursor at the end
    pub fn restore(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.sel_start = self.text.len();
        self.sel_end = self.text.len();
    }

    pub fn set_selection(&mut self, start: usize, end: usize) {
        let start = clamp_boundary(&self.text, start);
        let end = clamp_boundary(&self.text, end);
        self.sel_start = start.min(end);
        self.sel_end = start.max(end);
    }

    /// Split into Line records with offsets, depth, kind, and selection flags
    pub fn split_lines(&self) -> Vec<Line> {
        let mut lines = Vec::new();
        let mut position = 0;
        for (index, text) in self.text.split('\n').enumerate() {
            let mut line = Line::new(index, text.to_string(), position);
            line.selected = line.end >= self.sel_start && line.start <= self.sel_end;
            position = line.end + 1;
            lines.push(line);
        }
        lines
    }

    /// Replace `start..end` with `text`, select the inserted text, and
    /// return the updated selection bounds.
    pub fn replace_range(&mut self, start: usize, end: usize, text: &str) -> (usize, usize) {
        let start = clamp_boundary(&self.text, start);
        let end = clamp_boundary(&self.text, end).max(start);
        self.text.replace_range(start..end, text);
        self.sel_start = start;
        self.sel_end = start + text.len();
        (self.sel_start, self.sel_end)
    }

    /// Prefix every selected line with one two-space unit. The selection
    /// start shifts by 2, the end by 2 per affected line. Returns the
    /// number of lines touched.
    pub fn indent_selected(&mut self) -> usize {
        let lines = self.split_lines();
        let selected: Vec<&Line> = lines.iter().filter(|l| l.selected).collect();
        let Some((first, last)) = bounds(&selected) else {
            return 0;
        };

        let replacement: Vec<String> =
            selected.iter().map(|l| format!("  {}", l.text)).collect();
        let affected = selected.len();
        let (sel_start, sel_end) = (self.sel_start, self.sel_end);

        self.text
            .replace_range(first..last, &replacement.join("\n"));
        self.set_selection(sel_start + 2, sel_end + 2 * affected);
        affected
    }

    /// Strip one leading two-space unit from every selected line that has
    /// one; other selected lines stay untouched and do not count toward
    /// the selection shift. Exact inverse of `indent_selected` on lines
    /// that carry the prefix.
    pub fn dedent_selected(&mut self) -> usize {
        let lines = self.split_lines();
        let selected: Vec<&Line> = lines.iter().filter(|l| l.selected).collect();
        let Some((first, last)) = bounds(&selected) else {
            return 0;
        };

        let affected = selected
            .iter()
            .filter(|l| l.text.starts_with("  "))
            .count();
        if affected == 0 {
            return 0;
        }

        let replacement: Vec<&str> = selected
            .iter()
            .map(|l| l.text.strip_prefix("  ").unwrap_or(&l.text))
            .collect();
        let (sel_start, sel_end) = (self.sel_start, self.sel_end);

        self.text
            .replace_range(first..last, &replacement.join("\n"));
        self.set_selection(
            sel_start.saturating_sub(2),
            sel_end.saturating_sub(2 * affected),
        );
        affected
    }

    /// Duplicate the selection, or the cursor's line when the selection is
    /// empty, immediately after it; the inserted copy becomes the selection.
    pub fn duplicate_selection(&mut self) {
        if self.sel_start == self.sel_end {
            let lines = self.split_lines();
            let Some(line) = lines.iter().find(|l| l.selected) else {
                return;
            };
            self.text.insert_str(line.end, &format!("\n{}", line.text));
            self.sel_start = line.end + 1;
            self.sel_end = line.end + 1 + line.text.len();
        } else {
            let selection = self.text[self.sel_start..self.sel_end].to_string();
            self.text.insert_str(self.sel_end, &selection);
            self.sel_start = self.sel_end;
            self.sel_end += selection.len();
        }
    }
}

/// Span from the first selected line's start to the last one's end
fn bounds(selected: &[&Line]) -> Option<(usize, usize)> {
    match (selected.first(), selected.last()) {
        (Some(first), Some(last)) => Some((first.start, last.end)),
        _ => None,
    }
}

/// Clamp a byte offset into the text, backing up to a char boundary
fn clamp_boundary(text: &str, mut pos: usize) -> usize {
    pos = pos.min(text.len());
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines_offsets() {
        let buffer = Buffer::from_text("ab\ncd\n\nef");
        let lines = buffer.split_lines();
        assert_eq!(lines.len(), 4);
        assert_eq!((lines[0].start, lines[0].end), (0, 2));
        assert_eq!((lines[1].start, lines[1].end), (3, 5));
        assert_eq!((lines[2].start, lines[2].end), (6, 6));
        assert_eq!((lines[3].start, lines[3].end), (7, 9));
    }

    #[test]
    fn test_empty_buffer_is_one_blank_line() {
        let lines = Buffer::new().split_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "");
    }

    #[test]
    fn test_trailing_newline_yields_trailing_blank() {
        let lines = Buffer::from_text("a\n").split_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].text, "");
    }

    #[test]
    fn test_selection_intersection() {
        let mut buffer = Buffer::from_text("ab\ncd\nef");
        buffer.set_selection(4, 4);
        let lines = buffer.split_lines();
        assert!(!lines[0].selected);
        assert!(lines[1].selected);
        assert!(!lines[2].selected);
    }

    #[test]
    fn test_selection_spanning_two_lines() {
        let mut buffer = Buffer::from_text("ab\ncd\nef");
        buffer.set_selection(1, 4);
        let selected: Vec<bool> = buffer.split_lines().iter().map(|l| l.selected).collect();
        assert_eq!(selected, vec![true, true, false]);
    }

    #[test]
    fn test_replace_range_selects_inserted_text() {
        let mut buffer = Buffer::from_text("hello world");
        let (start, end) = buffer.replace_range(6, 11, "there");
        assert_eq!(buffer.text(), "hello there");
        assert_eq!((start, end), (6, 11));
    }

    #[test]
    fn test_replace_range_clamps() {
        let mut buffer = Buffer::from_text("ab");
        buffer.replace_range(10, 20, "c");
        assert_eq!(buffer.text(), "abc");
    }

    #[test]
    fn test_indent_two_selected_lines() {
        let mut buffer = Buffer::from_text("10\n20\n30");
        buffer.set_selection(0, 4);
        let affected = buffer.indent_selected();
        assert_eq!(affected, 2);
        assert_eq!(buffer.text(), "  10\n  20\n30");
        // Start grows by 2, end by 2 per affected line
        assert_eq!(buffer.selection(), (2, 8));
    }

    #[test]
    fn test_dedent_is_inverse_of_indent() {
        let mut buffer = Buffer::from_text("10\n20\n30");
        buffer.set_selection(0, 4);
        buffer.indent_selected();
        let affected = buffer.dedent_selected();
        assert_eq!(affected, 2);
        assert_eq!(buffer.text(), "10\n20\n30");
        assert_eq!(buffer.selection(), (0, 4));
    }

    #[test]
    fn test_dedent_skips_unprefixed_lines() {
        let mut buffer = Buffer::from_text("  a\nb\n  c");
        buffer.set_selection(0, buffer.text().len());
        let affected = buffer.dedent_selected();
        assert_eq!(affected, 2);
        assert_eq!(buffer.text(), "a\nb\nc");
    }

    #[test]
    fn test_dedent_with_nothing_to_strip_is_noop() {
        let mut buffer = Buffer::from_text("a\nb");
        buffer.set_selection(0, 3);
        assert_eq!(buffer.dedent_selected(), 0);
        assert_eq!(buffer.text(), "a\nb");
        assert_eq!(buffer.selection(), (0, 3));
    }

    #[test]
    fn test_duplicate_empty_selection_copies_line() {
        let mut buffer = Buffer::from_text("10\n20");
        buffer.set_selection(1, 1);
        buffer.duplicate_selection();
        assert_eq!(buffer.text(), "10\n10\n20");
        // The inserted copy is selected
        assert_eq!(buffer.selection(), (3, 5));
    }

    #[test]
    fn test_duplicate_nonempty_selection() {
        let mut buffer = Buffer::from_text("abcdef");
        buffer.set_selection(2, 4);
        buffer.duplicate_selection();
        assert_eq!(buffer.text(), "abcdcdef");
        assert_eq!(buffer.selection(), (4, 6));
    }

    #[test]
    fn test_restore_moves_cursor_to_end() {
        let mut buffer = Buffer::from_text("old");
        buffer.restore("fresh text");
        assert_eq!(buffer.text(), "fresh text");
        assert_eq!(buffer.selection(), (10, 10));
    }
}
