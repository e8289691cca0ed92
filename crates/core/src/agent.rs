//! Agent loop state types.

use serde::{Deserialize, Serialize};

/// Where one `process_message` call currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    Init,
    Streaming,
    Dispatching,
    Done,
}

/// Why a `process_message` call stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model answered without requesting tools
    Completed,
    /// The iteration budget ran out while the model still wanted tools
    IterationLimit,
    /// The tool-call budget was spent; takes precedence over `IterationLimit`
    ToolCallLimit,
    /// The caller cancelled
    Cancelled,
    /// The provider stream failed
    StreamFailed,
}

impl Termination {
    /// The trailing notice streamed after a budget ran out.
    pub fn notice(self, max: u32) -> Option<String> {
        match self {
            Self::ToolCallLimit => Some(format!("\n\n[Reached maximum tool calls limit ({max})]")),
            Self::IterationLimit => Some(format!("\n\n[Reached maximum iterations ({max})]")),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::IterationLimit => "iteration_limit",
            Self::ToolCallLimit => "tool_call_limit",
            Self::Cancelled => "cancelled",
            Self::StreamFailed => "stream_failed",
        }
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call counters. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopState {
    pub phase: LoopPhase,
    pub iteration: u32,
    pub tool_calls: u32,
    max_iterations: u32,
}

impl LoopState {
    pub fn new(max_iterations: u32) -> Self {
        Self {
            phase: LoopPhase::Init,
            iteration: 0,
            tool_calls: 0,
            max_iterations,
        }
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Start the next iteration. Returns `false` once the budget is spent.
    pub fn begin_iteration(&mut self) -> bool {
        if self.iteration >= self.max_iterations {
            return false;
        }
        self.iteration += 1;
        true
    }

    /// Whether another tool call fits in the budget.
    pub fn tool_budget_left(&self) -> bool {
        self.tool_calls < self.max_iterations
    }

    /// Count one tool call. Returns `false` if the budget was already spent.
    pub fn begin_tool_call(&mut self) -> bool {
        if !self.tool_budget_left() {
            return false;
        }
        self.tool_calls += 1;
        true
    }

    pub fn enter(&mut self, phase: LoopPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, iteration = self.iteration, "Loop phase");
        self.phase = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_never_exceed_budget() {
        let mut state = LoopState::new(2);
        assert!(state.begin_iteration());
        assert!(state.begin_iteration());
        assert!(!state.begin_iteration());
        assert_eq!(state.iteration, 2);

        assert!(state.begin_tool_call());
        assert!(state.begin_tool_call());
        assert!(!state.begin_tool_call());
        assert_eq!(state.tool_calls, 2);
        assert!(!state.tool_budget_left());
    }

    #[test]
    fn starts_in_init() {
        let state = LoopState::new(25);
        assert_eq!(state.phase, LoopPhase::Init);
        assert_eq!(state.max_iterations(), 25);
    }

    #[test]
    fn only_budget_terminations_carry_a_notice() {
        assert_eq!(
            Termination::ToolCallLimit.notice(2).as_deref(),
            Some("\n\n[Reached maximum tool calls limit (2)]")
        );
        assert_eq!(
            Termination::IterationLimit.notice(7).as_deref(),
            Some("\n\n[Reached maximum iterations (7)]")
        );
        assert_eq!(Termination::Completed.notice(7), None);
        assert_eq!(Termination::Cancelled.notice(7), None);
        assert_eq!(Termination::StreamFailed.to_string(), "stream_failed");
    }
}
