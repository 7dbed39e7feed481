use rill::Parser;

use crate::error::render_parse_trace;

/// One maximal contiguous run of source lines belonging to a single
/// top-level statement, trailing blank lines included. Re-derived from the
/// source on every evaluation, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub text: String,
    /// Half-open, 1-based line range `[start, end)`.
    pub line_range: (usize, usize),
}

/// Produced instead of a block list when the source fails to parse.
#[derive(Debug, Clone)]
pub struct SegmentError {
    pub message: String,
    /// 1-based line of the reported parse failure.
    pub line: usize,
    /// Full rendered diagnostic, suitable for logging or display.
    pub trace: String,
}

/// Break a script into top-level code blocks.
///
/// A pure function of the text: the same source always yields the same
/// block list. Blank (and comment-only) lines between statements are
/// absorbed into the preceding block, so consecutive `line_range`s abut.
pub fn segment(source: &str) -> Result<Vec<CodeBlock>, SegmentError> {
    let parser = Parser::new(source.to_string(), 0);
    let script = match parser.parse() {
        Ok(script) => script,
        Err(err) => {
            return Err(SegmentError {
                message: err.message.clone(),
                line: err.line,
                trace: render_parse_trace(source, &err),
            });
        }
    };

    let lines: Vec<&str> = source.split('\n').collect();
    let total_lines = lines.len();
    let mut blocks = Vec::with_capacity(script.statements.len());

    for (i, stmt) in script.statements.iter().enumerate() {
        let start = stmt.line();
        let next_start = script
            .statements
            .get(i + 1)
            .map(|next| next.line())
            .unwrap_or(total_lines + 1);
        blocks.push(CodeBlock {
            text: lines[start - 1..next_start - 1].join("\n"),
            line_range: (start, next_start),
        });
    }

    Ok(blocks)
}
