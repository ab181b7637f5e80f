// WHY: Decides whether a winning candidate may become a visible switch
// All timing rules read one GlobalDecisionState so a conversation reset clears them in one step

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::attribution::normalization::comparison_key;

/// Cooldown windows in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownSettings {
    pub global_cooldown_ms: u64,
    pub per_trigger_cooldown_ms: u64,
    pub failed_trigger_cooldown_ms: u64,
}

impl Default for CooldownSettings {
    fn default() -> Self {
        Self {
            global_cooldown_ms: 1200,
            per_trigger_cooldown_ms: 250,
            failed_trigger_cooldown_ms: 10_000,
        }
    }
}

/// Cross-turn decision memory owned by one engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalDecisionState {
    pub last_issued_target: Option<String>,
    pub last_switch_at: Option<u64>,
    /// Last successful switch per target key
    pub success_at: HashMap<String, u64>,
    /// Last failed switch per target key
    pub failure_at: HashMap<String, u64>,
    /// Most recent non-pronoun winner, used to resolve he/she/they
    pub pronoun_subject: Option<String>,
    /// Recently active characters by comparison key, with remaining turn TTL
    pub active_roster: HashMap<String, u32>,
}

impl GlobalDecisionState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Target currently on display: last issued, else the default costume
    pub fn current_target<'a>(&'a self, default_costume: &'a str) -> Option<&'a str> {
        self.last_issued_target
            .as_deref()
            .or_else(|| Some(default_costume.trim()).filter(|d| !d.is_empty()))
    }

    pub fn record_success(&mut self, target: &str, now_ms: u64) {
        self.success_at.insert(comparison_key(target), now_ms);
        self.last_switch_at = Some(now_ms);
        self.last_issued_target = Some(target.to_string());
    }

    /// Failures only start the failure cooldown; the display did not change
    pub fn record_failure(&mut self, target: &str, now_ms: u64) {
        self.failure_at.insert(comparison_key(target), now_ms);
    }

    /// Put a character at the front of the scene with a fresh TTL
    pub fn refresh_roster(&mut self, name: &str, ttl: u32) {
        if ttl > 0 {
            self.active_roster.insert(comparison_key(name), ttl);
        }
    }

    /// Age every roster entry by one turn, dropping expired ones
    pub fn decay_roster(&mut self) {
        self.active_roster.retain(|_, ttl| {
            *ttl = ttl.saturating_sub(1);
            *ttl > 0
        });
    }
}

/// Why a candidate did not become a switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SuppressionReason {
    /// Candidate is already on display
    Redundant,
    GlobalCooldown { remaining_ms: u64 },
    PerTriggerCooldown { remaining_ms: u64 },
    FailedTriggerCooldown { remaining_ms: u64 },
    /// Same turn accepted the same name moments ago
    RepeatedInTurn,
    /// A focus lock overrides streamed detections
    FocusLocked,
}

impl std::fmt::Display for SuppressionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuppressionReason::Redundant => f.write_str("already active"),
            SuppressionReason::GlobalCooldown { remaining_ms } => write!(f, "global cooldown ({remaining_ms}ms left)"),
            SuppressionReason::PerTriggerCooldown { remaining_ms } => {
                write!(f, "per-trigger cooldown ({remaining_ms}ms left)")
            }
            SuppressionReason::FailedTriggerCooldown { remaining_ms } => {
                write!(f, "failed-trigger cooldown ({remaining_ms}ms left)")
            }
            SuppressionReason::RepeatedInTurn => f.write_str("repeated in turn"),
            SuppressionReason::FocusLocked => f.write_str("focus lock active"),
        }
    }
}

/// Gate position for the current attempt
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GateState {
    #[default]
    Idle,
    Evaluated,
    Accepted,
    Suppressed(SuppressionReason),
}

/// One switch attempt presented to the gate
#[derive(Debug, Clone, Copy)]
pub struct SwitchRequest<'a> {
    /// Folder or name that would be issued
    pub target: &'a str,
    /// Manual reset and focus lock skip every timing rule
    pub lock_override: bool,
}

/// Debounce state machine in front of the decision sink
#[derive(Debug, Clone, Default)]
pub struct CooldownGate {
    settings: CooldownSettings,
    state: GateState,
}

impl CooldownGate {
    pub fn new(settings: CooldownSettings) -> Self {
        Self {
            settings,
            state: GateState::Idle,
        }
    }

    pub fn set_settings(&mut self, settings: CooldownSettings) {
        self.settings = settings;
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    /// Return to Idle once the attempt has been acted on
    pub fn reset(&mut self) {
        self.state = GateState::Idle;
    }

    /// Run every rule for one attempt and leave the gate Accepted or Suppressed
    pub fn check(
        &mut self,
        request: SwitchRequest<'_>,
        global: &GlobalDecisionState,
        default_costume: &str,
        now_ms: u64,
    ) -> Result<(), SuppressionReason> {
        self.state = GateState::Evaluated;

        let outcome = self.evaluate_rules(request, global, default_costume, now_ms);
        self.state = match &outcome {
            Ok(()) => GateState::Accepted,
            Err(reason) => {
                debug!("Switch to {} suppressed: {}", request.target, reason);
                GateState::Suppressed(reason.clone())
            }
        };
        outcome
    }

    fn evaluate_rules(
        &self,
        request: SwitchRequest<'_>,
        global: &GlobalDecisionState,
        default_costume: &str,
        now_ms: u64,
    ) -> Result<(), SuppressionReason> {
        let key = comparison_key(request.target);

        if let Some(current) = global.current_target(default_costume) {
            if comparison_key(current) == key {
                return Err(SuppressionReason::Redundant);
            }
        }

        if request.lock_override {
            return Ok(());
        }

        if let Some(remaining_ms) = remaining(global.last_switch_at, self.settings.global_cooldown_ms, now_ms) {
            return Err(SuppressionReason::GlobalCooldown { remaining_ms });
        }

        let success = global.success_at.get(&key).copied();
        if let Some(remaining_ms) = remaining(success, self.settings.per_trigger_cooldown_ms, now_ms) {
            return Err(SuppressionReason::PerTriggerCooldown { remaining_ms });
        }

        let failure = global.failure_at.get(&key).copied();
        if let Some(remaining_ms) = remaining(failure, self.settings.failed_trigger_cooldown_ms, now_ms) {
            return Err(SuppressionReason::FailedTriggerCooldown { remaining_ms });
        }

        Ok(())
    }
}

/// Time left in a window that started at `since`, None when the window has passed
fn remaining(since: Option<u64>, window_ms: u64, now_ms: u64) -> Option<u64> {
    let elapsed = now_ms.saturating_sub(since?);
    (elapsed < window_ms).then(|| window_ms - elapsed)
}
