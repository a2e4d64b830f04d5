//! Error types and reporting

use crate::ast::Span;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, CalcError>;

/// Calculator error
///
/// The three semantic kinds are line- or scope-local and never abort a
/// recalculation pass; `Io` covers the CLI and persistence shell.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("syntax error: {message}")]
    Syntax { message: String, span: Span },

    #[error("evaluation error: {message}")]
    Eval { message: String },

    #[error("aggregation error: {message}")]
    Aggregation { message: String },

    #[error("IO error: {message}")]
    Io { message: String },
}

impl CalcError {
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::Syntax {
            message: message.into(),
            span,
        }
    }

    pub fn eval(message: impl Into<String>) -> Self {
        Self::Eval {
            message: message.into(),
        }
    }

    pub fn aggregation(message: impl Into<String>) -> Self {
        Self::Aggregation {
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn undefined_variable(name: &str, hint: &str) -> Self {
        Self::Eval {
            message: format!("undefined variable: {name}{hint}"),
        }
    }

    pub fn undefined_function(name: &str, hint: &str) -> Self {
        Self::Eval {
            message: format!("undefined function: {name}{hint}"),
        }
    }

    pub fn type_error(expected: &str, got: &str) -> Self {
        Self::Eval {
            message: format!("type error: expected {expected}, got {got}"),
        }
    }

    pub fn division_by_zero() -> Self {
        Self::Eval {
            message: "division by zero".to_string(),
        }
    }

    pub fn arity_mismatch(name: &str, expected: &str, got: usize) -> Self {
        Self::Eval {
            message: format!("function {name} expects {expected} argument(s), got {got}"),
        }
    }

    pub fn domain_error(message: impl Into<String>) -> Self {
        Self::Eval {
            message: message.into(),
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Syntax { span, .. } => Some(*span),
            Self::Eval { .. } | Self::Aggregation { .. } | Self::Io { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Syntax { message, .. } => message,
            Self::Eval { message } => message,
            Self::Aggregation { message } => message,
            Self::Io { message } => message,
        }
    }
}

impl From<std::io::Error> for CalcError {
    fn from(err: std::io::Error) -> Self {
        CalcError::io(err.to_string())
    }
}

/// Report an error against one line of source with ariadne
pub fn report_error(filename: &str, source: &str, error: &CalcError) {
    use ariadne::{Color, Label, Report, ReportKind, Source};

    let kind = match error {
        CalcError::Syntax { .. } => "Syntax",
        CalcError::Eval { .. } => "Evaluation",
        CalcError::Aggregation { .. } => "Aggregation",
        CalcError::Io { .. } => "IO",
    };

    if let Some(span) = error.span() {
        Report::build(ReportKind::Error, (filename, span.start..span.end))
            .with_message(format!("{kind} error"))
            .with_label(
                Label::new((filename, span.start..span.end))
                    .with_message(error.message())
                    .with_color(Color::Red),
            )
            .finish()
            .print((filename, Source::from(source)))
            .unwrap();
    } else {
        Report::build(ReportKind::Error, (filename, 0..0))
            .with_message(format!("{kind} error: {}", error.message()))
            .finish()
            .print((filename, Source::from(source)))
            .unwrap();
    }
}
