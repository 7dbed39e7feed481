use serde::{Deserialize, Serialize};

use crate::display::Display;

pub type ModuleId = u64;

/// Lifecycle of the shared evaluation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalState {
    /// No request has been made yet.
    Empty,
    /// A requester wants an evaluation.
    Dirty,
    /// The worker has claimed the request and is evaluating.
    Calculating,
    /// The last claimed request finished, with results or an error.
    Complete,
}

/// The singleton record coordinating one requester and one worker around an
/// evaluation request/response cycle. Lives inside the shared store; never
/// deleted during normal operation.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub module: Option<ModuleId>,
    /// The selected sub-range to evaluate, or None for the whole script.
    pub selection: Option<String>,
    pub state: EvalState,
    pub error: Option<String>,
    pub displays: Vec<Display>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        EvaluationContext {
            module: None,
            selection: None,
            state: EvalState::Empty,
            error: None,
            displays: Vec::new(),
        }
    }

    /// Requester-side transition: always valid, always forces Dirty. An
    /// in-flight run still commits its output; the next worker tick then
    /// recomputes for this request.
    pub fn request(&mut self, module: ModuleId, selection: Option<String>) {
        self.module = Some(module);
        self.selection = selection;
        self.displays.clear();
        self.error = None;
        self.state = EvalState::Dirty;
    }
}

impl Default for EvaluationContext {
    fn default() -> Self {
        EvaluationContext::new()
    }
}
