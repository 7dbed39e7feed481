use tracing::{debug, info};

use crate::builtins::{self, truncate_printed};
use crate::display::Display;
use crate::environment::Environment;
use crate::error::{render_parse_trace, render_trace};
use crate::evaluator;
use crate::scratch::Scratch;
use crate::segment::{CodeBlock, segment};
use crate::value::Value;

/// Untitled displays are auto-titled with the block source only when the
/// block spans fewer than this many lines.
const AUTO_TITLE_MAX_LINES: usize = 10;

/// Result of one whole evaluation run: either an error trace with no
/// displays, or the ordered display list. Runs are atomic; a failed run
/// keeps no partial display list.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub error: Option<String>,
    pub displays: Vec<Display>,
}

impl RunOutcome {
    fn failed(trace: String) -> Self {
        RunOutcome {
            error: Some(trace),
            displays: Vec::new(),
        }
    }

    fn completed(displays: Vec<Display>) -> Self {
        RunOutcome {
            error: None,
            displays,
        }
    }
}

/// Result of evaluating one block.
#[derive(Debug)]
pub enum BlockOutcome {
    /// Displays produced by the block (possibly none).
    Displays(Vec<Display>),
    /// Rendered trace of the failure that aborted the block.
    Failed(String),
}

/// Reconstruct the block's source at its original file position, so error
/// line numbers reported against it match the full script.
fn padded_source(block: &CodeBlock) -> String {
    let mut text = "\n".repeat(block.line_range.0 - 1);
    text.push_str(&block.text);
    text
}

/// Evaluate one code block against the shared scope.
///
/// The block is first tried as a single expression: a `Display` result is
/// captured (auto-titled with the block source when untitled and short),
/// any other value is discarded, and a runtime failure aborts the block.
/// Only when the block is not a single expression does it run as a
/// statement sequence. Both paths mutate `env` in place.
pub fn evaluate_block(block: &CodeBlock, env: &mut Environment, scratch: &Scratch) -> BlockOutcome {
    let padded = padded_source(block);
    match scratch.stash(&padded) {
        Ok(path) => debug!(path = %path.display(), "stashed block source"),
        Err(err) => debug!(%err, "failed to stash block source"),
    }

    let parser = rill::Parser::new(padded.clone(), 0);
    if let Ok(expr) = parser.parse_expression() {
        return match evaluator::eval_expression(&expr, env) {
            Ok(Value::Display(display)) => {
                let display = if display.title().is_empty()
                    && block.text.lines().count() < AUTO_TITLE_MAX_LINES
                {
                    display.titled(block.text.clone())
                } else {
                    display
                };
                BlockOutcome::Displays(vec![display])
            }
            // a successful expression with a non-display value ends the
            // block; the value is only consulted by selection tail handling
            Ok(_) => BlockOutcome::Displays(Vec::new()),
            Err(err) => {
                info!("user code produced an error: {}", err);
                BlockOutcome::Failed(render_trace(&padded, &err))
            }
        };
    }

    // not a single expression: execute as statements
    match parser.parse() {
        Ok(script) => match evaluator::run_statements(&script.statements, env) {
            Ok(()) => BlockOutcome::Displays(Vec::new()),
            Err(err) => {
                info!("user code produced an error: {}", err);
                BlockOutcome::Failed(render_trace(&padded, &err))
            }
        },
        // the whole script already parsed during segmentation, so a block
        // re-parse failure is unexpected; surface it as the block's error
        Err(err) => BlockOutcome::Failed(render_parse_trace(&padded, &err)),
    }
}

/// Run a whole script, then optionally a selected sub-range against a copy
/// of the scope the script produced.
///
/// The first failing block aborts the run with its trace and an empty
/// display list. When a non-blank selection is supplied, its displays
/// replace (never append to) the full run's.
pub fn run_script(source: &str, selection: Option<&str>, scratch: &Scratch) -> RunOutcome {
    // Phase A: the full script
    let blocks = match segment(source) {
        Ok(blocks) => blocks,
        Err(err) => return RunOutcome::failed(err.trace),
    };

    let mut env = builtins::standard_environment();
    let mut displays = Vec::new();

    info!(blocks = blocks.len(), "evaluating code blocks");
    for block in &blocks {
        match evaluate_block(block, &mut env, scratch) {
            BlockOutcome::Displays(block_displays) => displays.extend(block_displays),
            BlockOutcome::Failed(trace) => return RunOutcome::failed(trace),
        }
    }
    info!("done evaluating code blocks");

    let selection = match selection {
        Some(text) if !text.trim().is_empty() => text,
        _ => return RunOutcome::completed(displays),
    };

    // Phase B: re-evaluate the selection; its displays replace phase A's
    info!("evaluating selection");
    let selection_blocks = match segment(selection) {
        Ok(blocks) => blocks,
        Err(err) => return RunOutcome::failed(err.trace),
    };

    // one copy of the script scope, threaded through all selection blocks;
    // selection assignments never reach the persisted phase-A scope
    let mut selection_env = env.clone();
    let mut selection_displays = Vec::new();
    let mut last: Option<(&CodeBlock, bool)> = None;

    for block in &selection_blocks {
        match evaluate_block(block, &mut selection_env, scratch) {
            BlockOutcome::Displays(block_displays) => {
                last = Some((block, !block_displays.is_empty()));
                selection_displays.extend(block_displays);
            }
            BlockOutcome::Failed(trace) => return RunOutcome::failed(trace),
        }
    }

    // show the last selected statement's value when it displayed nothing
    // directly; statements that aren't expressions are silently skipped
    if let Some((block, false)) = last {
        let padded = padded_source(block);
        if let Ok(expr) = rill::Parser::new(padded.clone(), 0).parse_expression() {
            match evaluator::eval_expression(&expr, &mut selection_env) {
                Ok(Value::Null) | Ok(Value::Display(_)) => {}
                Ok(value @ (Value::Function(_) | Value::Builtin(_))) => {
                    selection_displays.push(Display::Object {
                        object: builtins::object_ref(&value),
                        title: block.text.clone(),
                    });
                }
                Ok(value) => {
                    selection_displays.push(Display::Print {
                        text: truncate_printed(value.to_string()),
                        title: block.text.clone(),
                    });
                }
                Err(err) => return RunOutcome::failed(render_trace(&padded, &err)),
            }
        }
    }

    RunOutcome::completed(selection_displays)
}
