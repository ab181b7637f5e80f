// WHY: Output boundary of the engine; the host executes switches and reports failure back

use std::collections::HashSet;

use serde::Serialize;
use tracing::Level;

use crate::attribution::MatchKind;
use crate::error::SwitchExecutionFailure;
use crate::stream::TurnKey;

/// What caused a switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionTrigger {
    Detection,
    ManualReset,
    FocusLock,
}

/// Accepted request to change the displayed character
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwitchDecision {
    /// Folder (or name when unmapped) to issue; empty means the base character
    pub target: String,
    /// Canonical character name behind the target
    pub canonical: String,
    pub trigger: DecisionTrigger,
    /// Heuristic that produced the winner, for detections
    pub kind: Option<MatchKind>,
    pub score: Option<f64>,
    pub turn: Option<TurnKey>,
    pub at_ms: u64,
}

/// Host side of the engine
pub trait DecisionSink {
    /// Execute a switch; an error starts the failure cooldown for the target
    fn emit_switch(&mut self, decision: &SwitchDecision) -> Result<(), SwitchExecutionFailure>;

    /// Non-fatal engine notices (suppressions, evaluation faults)
    fn emit_diagnostic(&mut self, _level: Level, _message: &str) {}
}

/// Sink that records everything it is given
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub decisions: Vec<SwitchDecision>,
    pub diagnostics: Vec<(Level, String)>,
    /// Targets whose execution is reported as failed (lowercase)
    failing: HashSet<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report failure for every switch to `target`
    pub fn failing_on(mut self, target: &str) -> Self {
        self.failing.insert(target.to_lowercase());
        self
    }

    pub fn stop_failing(&mut self, target: &str) {
        self.failing.remove(&target.to_lowercase());
    }

    pub fn targets(&self) -> Vec<&str> {
        self.decisions.iter().map(|d| d.target.as_str()).collect()
    }
}

impl DecisionSink for RecordingSink {
    fn emit_switch(&mut self, decision: &SwitchDecision) -> Result<(), SwitchExecutionFailure> {
        if self.failing.contains(&decision.target.to_lowercase()) {
            return Err(SwitchExecutionFailure::new(&decision.target, "rejected by recording sink"));
        }
        self.decisions.push(decision.clone());
        Ok(())
    }

    fn emit_diagnostic(&mut self, level: Level, message: &str) {
        self.diagnostics.push((level, message.to_string()));
    }
}
