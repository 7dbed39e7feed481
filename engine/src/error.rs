use std::fmt;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::NoColor;

#[derive(Debug)]
pub enum RuntimeError {
    TypeMismatch { expected: String, got: String },
    UndefinedVariable(String),
    NotCallable(String),
    ArityMismatch { name: String, expected: usize, got: usize },
    UnknownNamedArgument { name: String, argument: String },
    DivisionByZero,
    IndexOutOfBounds { index: i64, len: usize },
    ReturnOutsideFunction,
    StackOverflow,
    DisplayConcat { left: String, right: String },
    NotPlottable(String),
    Custom(String),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::TypeMismatch { expected, got } => {
                write!(f, "type error: expected {}, got {}", expected, got)
            }
            RuntimeError::UndefinedVariable(name) => write!(f, "undefined variable: {}", name),
            RuntimeError::NotCallable(type_name) => {
                write!(f, "value of type {} is not callable", type_name)
            }
            RuntimeError::ArityMismatch {
                name,
                expected,
                got,
            } => write!(
                f,
                "{}() takes {} argument{}, got {}",
                name,
                expected,
                if *expected == 1 { "" } else { "s" },
                got
            ),
            RuntimeError::UnknownNamedArgument { name, argument } => {
                write!(f, "unknown named argument '{}' to {}()", argument, name)
            }
            RuntimeError::DivisionByZero => write!(f, "division by zero"),
            RuntimeError::IndexOutOfBounds { index, len } => {
                write!(f, "index {} out of bounds for list of length {}", index, len)
            }
            RuntimeError::ReturnOutsideFunction => write!(f, "'return' outside of a function"),
            RuntimeError::StackOverflow => write!(f, "stack overflow"),
            RuntimeError::DisplayConcat { left, right } => {
                write!(f, "can't add displays {} and {}", left, right)
            }
            RuntimeError::NotPlottable(type_name) => {
                write!(f, "value of type {} has no data representation", type_name)
            }
            RuntimeError::Custom(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for RuntimeError {}

/// A runtime error enriched with the byte span it occurred at (within the
/// padded block source, so line numbers match the original script).
#[derive(Debug)]
pub struct EvalError {
    pub error: RuntimeError,
    pub span: Option<Range<usize>>,
}

impl EvalError {
    /// Attach a span when none is present yet. Empty spans (from literal
    /// nodes) are ignored so callers can pass them unconditionally.
    pub fn with_span(mut self, span: Range<usize>) -> Self {
        if self.span.is_none() && !span.is_empty() {
            self.span = Some(span);
        }
        self
    }
}

impl From<RuntimeError> for EvalError {
    fn from(error: RuntimeError) -> Self {
        EvalError { error, span: None }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for EvalError {}

const SOURCE_NAME: &str = "<script>";

fn emit_plain(source: &str, diagnostic: &Diagnostic<usize>) -> String {
    let mut files = SimpleFiles::new();
    files.add(SOURCE_NAME.to_string(), source.to_string());
    let config = term::Config::default();
    let mut writer = NoColor::new(Vec::new());
    match term::emit_to_write_style(&mut writer, &config, &files, diagnostic) {
        Ok(()) => String::from_utf8_lossy(&writer.into_inner()).into_owned(),
        Err(_) => format!("error: {}", diagnostic.message),
    }
}

/// Render a runtime failure as a plain-text trace against the (padded)
/// block source it occurred in.
pub fn render_trace(source: &str, err: &EvalError) -> String {
    let mut diagnostic = Diagnostic::error().with_message(err.error.to_string());
    if let Some(span) = &err.span {
        let end = span.end.min(source.len());
        let start = span.start.min(end);
        diagnostic = diagnostic.with_labels(vec![Label::primary(0, start..end)]);
    }
    emit_plain(source, &diagnostic)
}

/// Render a parse failure as a plain-text trace against its source.
pub fn render_parse_trace(source: &str, err: &rill::ParseError) -> String {
    emit_plain(source, &err.to_diagnostic())
}
