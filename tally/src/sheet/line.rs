//! Per-line records for one recalculation pass

use crate::engine::Value;
use crate::error::CalcError;

/// What a line is, decided from its text alone
#[derive(Debug, Clone, PartialEq)]
pub enum LineKind {
    /// An expression to evaluate
    Expression,
    /// A scope header: trimmed text ends with `:` and carries no `#`
    ScopeHeader { label: String },
    /// Empty, whitespace-only, or comment-only
    Blank,
}

/// One line of the buffer, rebuilt wholesale every pass
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub index: usize,
    /// Exact source text, indentation included
    pub text: String,
    /// Byte offset of the line's first character in the buffer
    pub start: usize,
    /// Byte offset just past the line's last character (the `\n` excluded)
    pub end: usize,
    /// Count of leading two-space units
    pub depth: usize,
    pub kind: LineKind,
    pub result: Option<Value>,
    pub error: Option<CalcError>,
    /// For headers: whether the scope was closed by a later line
    pub closed: bool,
    /// For headers: indices of lines that contributed to the total
    pub children: Vec<usize>,
    /// For headers: the contributing line whose value broke the accumulator
    pub error_source: Option<usize>,
    /// Whether the line intersects the current selection
    pub selected: bool,
    /// Display hint: result is a bare literal echo
    pub trivial: bool,
}

impl Line {
    pub fn new(index: usize, text: String, start: usize) -> Self {
        let end = start + text.len();
        let depth = indent_depth(&text);
        let kind = classify(&text);
        Line {
            index,
            text,
            start,
            end,
            depth,
            kind,
            result: None,
            error: None,
            closed: false,
            children: Vec::new(),
            error_source: None,
            selected: false,
            trivial: false,
        }
    }

    pub fn is_header(&self) -> bool {
        matches!(self.kind, LineKind::ScopeHeader { .. })
    }

    pub fn label(&self) -> Option<&str> {
        match &self.kind {
            LineKind::ScopeHeader { label } => Some(label),
            _ => None,
        }
    }
}

/// Indentation depth: count of leading two-space units. An odd trailing
/// space beyond a full unit does not count.
fn indent_depth(text: &str) -> usize {
    text.bytes().take_while(|&b| b == b' ').count() / 2
}

fn classify(text: &str) -> LineKind {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return LineKind::Blank;
    }
    if let Some(stripped) = trimmed.strip_suffix(':')
        && !text.contains('#')
    {
        return LineKind::ScopeHeader {
            label: stripped.trim().to_string(),
        };
    }
    LineKind::Expression
}
