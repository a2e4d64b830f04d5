//! Line views and terminal rendering

use super::line::Line;
use crate::engine::Value;
use crate::error::Result;
use crate::settings::Settings;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// What the presentation layer sees of one line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineView {
    pub text: String,
    pub indent: usize,
    pub is_scope_header: bool,
    pub result: Option<String>,
    pub error: Option<String>,
    pub selected: bool,
}

/// Display classification of one line
#[derive(Debug, Clone, PartialEq)]
pub enum LineStatus {
    /// Nothing to show: blank, or a muted literal echo
    Empty,
    /// A value to echo
    Value(String),
    /// A hard error
    Error(String),
    /// Error suppressed while the culprit is being edited
    Pending,
}

/// Classify one line for display. An errored line that is selected is
/// pending, not broken: the user is probably mid-edit. The same goes for a
/// header whose aggregation error came from the selected contributor, or
/// whose children include an errored nested header.
pub fn line_status(line: &Line, lines: &[Line], settings: &Settings) -> LineStatus {
    if let Some(error) = &line.error {
        if line.selected {
            return LineStatus::Pending;
        }
        if let Some(source) = line.error_source
            && lines[source].selected
        {
            return LineStatus::Pending;
        }
        if line.is_header()
            && line
                .children
                .iter()
                .any(|&child| lines[child].error.is_some())
        {
            return LineStatus::Pending;
        }
        return LineStatus::Error(error.to_string());
    }

    match &line.result {
        None => LineStatus::Empty,
        Some(_) if line.trivial && !line.is_header() => LineStatus::Empty,
        Some(value) => LineStatus::Value(format_value(value, settings)),
    }
}

/// Format a value for display, rounding floats per settings
pub fn format_value(value: &Value, settings: &Settings) -> String {
    match value {
        Value::Float(x) if settings.round_results && x.is_finite() && x.abs() < 1e15 => {
            let rounded = (x * 1e10).round() / 1e10;
            format!("{rounded}")
        }
        other => other.to_string(),
    }
}

/// Build the presentation records for a pass
pub fn views(lines: &[Line], settings: &Settings) -> Vec<LineView> {
    lines
        .iter()
        .map(|line| LineView {
            text: line.text.clone(),
            indent: line.depth,
            is_scope_header: line.is_header(),
            result: line.result.as_ref().map(|v| format_value(v, settings)),
            error: line.error.as_ref().map(|e| e.to_string()),
            selected: line.selected,
        })
        .collect()
}

/// Render the whole sheet as plain text: indentation drawn as `| ` guides,
/// results appended as ` = value`, errors as ` // message`.
pub fn render_text(lines: &[Line], settings: &Settings) -> String {
    let guided: Vec<String> = lines.iter().map(guided_text).collect();
    let width = guided.iter().map(|code| code.chars().count()).max().unwrap_or(0);

    let mut out = String::new();
    for (line, code) in lines.iter().zip(&guided) {
        let rendered = match line_status(line, lines, settings) {
            LineStatus::Value(value) => format!("{code:<width$} = {value}"),
            LineStatus::Error(message) => {
                format!("{code:<width$} // {}", message.replace('\n', ";"))
            }
            LineStatus::Empty | LineStatus::Pending => code.clone(),
        };
        out.push_str(rendered.trim_end());
        out.push('\n');
    }
    out
}

/// Write the rendered sheet to a file
pub fn write_export(path: &Path, lines: &[Line], settings: &Settings) -> Result<()> {
    fs::write(path, render_text(lines, settings))?;
    Ok(())
}

/// Timestamped default export file name
pub fn default_export_name() -> String {
    format!("tally-{}.txt", chrono::Local::now().format("%Y%m%d-%H%M%S"))
}

/// Replace each leading two-space unit with a `| ` guide
fn guided_text(line: &Line) -> String {
    let body = &line.text[line.depth * 2..];
    format!("{}{}", "| ".repeat(line.depth), body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Value;
    use crate::error::CalcError;
    use crate::sheet::line::Line;

    fn plain_line(index: usize, text: &str) -> Line {
        Line::new(index, text.to_string(), 0)
    }

    #[test]
    fn test_status_value() {
        let mut line = plain_line(0, "1+2");
        line.result = Some(Value::Int(3));
        let status = line_status(&line, std::slice::from_ref(&line), &Settings::default());
        assert_eq!(status, LineStatus::Value("3".to_string()));
    }

    #[test]
    fn test_status_blank_is_empty() {
        let line = plain_line(0, "");
        let status = line_status(&line, std::slice::from_ref(&line), &Settings::default());
        assert_eq!(status, LineStatus::Empty);
    }

    #[test]
    fn test_status_trivial_literal_is_muted() {
        let mut line = plain_line(0, "42");
        line.result = Some(Value::Int(42));
        line.trivial = true;
        let status = line_status(&line, std::slice::from_ref(&line), &Settings::default());
        assert_eq!(status, LineStatus::Empty);
    }

    #[test]
    fn test_status_selected_error_is_pending() {
        let mut line = plain_line(0, "1 +");
        line.error = Some(CalcError::eval("bad"));
        line.selected = true;
        let status = line_status(&line, std::slice::from_ref(&line), &Settings::default());
        assert_eq!(status, LineStatus::Pending);
    }

    #[test]
    fn test_status_unselected_error_is_hard() {
        let mut line = plain_line(0, "1 +");
        line.error = Some(CalcError::eval("bad"));
        let status = line_status(&line, std::slice::from_ref(&line), &Settings::default());
        assert!(matches!(status, LineStatus::Error(_)));
    }

    #[test]
    fn test_status_scope_error_pending_while_culprit_selected() {
        let mut header = plain_line(0, "total:");
        header.error = Some(CalcError::aggregation("cannot add"));
        header.error_source = Some(1);
        header.result = Some(Value::Int(0));

        let mut culprit = plain_line(1, "  \"oops\"");
        culprit.result = Some(Value::Str("oops".into()));
        culprit.selected = true;

        let lines = vec![header.clone(), culprit];
        assert_eq!(
            line_status(&lines[0], &lines, &Settings::default()),
            LineStatus::Pending
        );
    }

    #[test]
    fn test_format_value_rounds_float_noise() {
        let settings = Settings::default();
        let noisy = Value::Float(0.1 + 0.2);
        assert_eq!(format_value(&noisy, &settings), "0.3");

        let unrounded = Settings {
            round_results: false,
            ..Settings::default()
        };
        assert_ne!(format_value(&noisy, &unrounded), "0.3");
    }

    #[test]
    fn test_render_text_layout() {
        let mut a = plain_line(0, "total:");
        a.result = Some(Value::Int(30));
        let mut b = Line::new(1, "  10+20".to_string(), 7);
        b.result = Some(Value::Int(30));

        let lines = vec![a, b];
        let rendered = render_text(&lines, &Settings::default());
        let rows: Vec<&str> = rendered.lines().collect();
        assert_eq!(rows[0], "total:  = 30");
        assert_eq!(rows[1], "| 10+20 = 30");
    }

    #[test]
    fn test_views_carry_selection_and_errors() {
        let mut line = plain_line(0, "x +");
        line.error = Some(CalcError::eval("bad"));
        line.selected = true;
        let view = &views(std::slice::from_ref(&line), &Settings::default())[0];
        assert!(view.selected);
        assert!(view.error.as_deref().unwrap().contains("bad"));
        assert_eq!(view.result, None);
    }

    #[test]
    fn test_default_export_name_shape() {
        let name = default_export_name();
        assert!(name.starts_with("tally-"));
        assert!(name.ends_with(".txt"));
    }
}
