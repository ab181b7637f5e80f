// WHY: Owns every piece of mutable attribution state and drives the pipeline per lifecycle event
// buffer -> veto -> quotes + matches -> scorer -> resolver + mapping -> cooldown gate -> sink

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn, Level};

use crate::attribution::normalization::normalize_costume_name;
use crate::attribution::{find_matches, index_quotes, select_best, CompiledHeuristicSet, MatchKind, PatternCompiler};
use crate::clock::{Clock, SystemClock};
use crate::config::Profile;
use crate::cooldown::{CooldownGate, GateState, GlobalDecisionState, SuppressionReason, SwitchRequest};
use crate::error::{EvaluationError, PatternCompileError};
use crate::events::LifecycleEvent;
use crate::names::{NameResolver, ResolutionMethod};
use crate::sink::{DecisionSink, DecisionTrigger, SwitchDecision};
use crate::stream::{TurnKey, TurnRegistry};

/// All mutable state of one engine; reset wholesale on conversation change
#[derive(Debug, Default)]
pub struct EngineState {
    pub turns: TurnRegistry,
    pub global: GlobalDecisionState,
    /// User-chosen character that overrides streamed detections
    pub focus_lock: Option<String>,
}

/// Winner of one evaluation before it meets the gate
struct Candidate {
    raw: String,
    kind: MatchKind,
    score: f64,
}

/// Streaming attribution engine
pub struct Engine<C: Clock = SystemClock> {
    profile: Profile,
    heuristics: Arc<CompiledHeuristicSet>,
    resolver: NameResolver,
    gate: CooldownGate,
    state: EngineState,
    clock: C,
    enabled: bool,
}

impl Engine<SystemClock> {
    pub fn new(profile: Profile) -> Result<Self, PatternCompileError> {
        Self::with_clock(profile, SystemClock)
    }
}

impl<C: Clock> Engine<C> {
    pub fn with_clock(profile: Profile, clock: C) -> Result<Self, PatternCompileError> {
        let heuristics = compile_profile(&profile)?;
        info!(
            "Engine ready with {} heuristics and {} roster names",
            heuristics.heuristic_count(),
            profile.roster_names().len()
        );
        Ok(Self {
            resolver: build_resolver(&profile),
            gate: CooldownGate::new(profile.cooldowns()),
            heuristics: Arc::new(heuristics),
            profile,
            state: EngineState::default(),
            clock,
            enabled: true,
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn heuristics(&self) -> Arc<CompiledHeuristicSet> {
        Arc::clone(&self.heuristics)
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Gate position after the latest attempt; each token starts from Idle
    pub fn gate_state(&self) -> &GateState {
        self.gate.state()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabled engines ignore tokens but still track lifecycle events
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Dispatch one lifecycle event
    pub fn handle(&mut self, event: LifecycleEvent, sink: &mut dyn DecisionSink) -> Option<SwitchDecision> {
        match event {
            LifecycleEvent::TurnStarted { key } => {
                self.on_turn_start(key);
                None
            }
            LifecycleEvent::Token { key, text } => self.on_token(&key, &text, sink),
            LifecycleEvent::TurnEnded { key } => {
                self.on_turn_end(&key);
                None
            }
            LifecycleEvent::MessageFinalized { key } => {
                self.on_message_finalized(&key);
                None
            }
            LifecycleEvent::ConversationReset => {
                self.on_conversation_reset();
                None
            }
        }
    }

    /// New generation: fresh buffer for the key, roster ages by one turn
    pub fn on_turn_start(&mut self, key: TurnKey) {
        self.state.global.decay_roster();
        debug!("Turn {} started", key);
        self.state.turns.start_turn(key, &self.profile.thresholds());
    }

    /// Append a streamed token and evaluate when due
    pub fn on_token(&mut self, key: &TurnKey, token: &str, sink: &mut dyn DecisionSink) -> Option<SwitchDecision> {
        if !self.enabled || token.is_empty() {
            return None;
        }

        self.gate.reset();
        let outcome = self.state.turns.on_token(key, token, &self.profile.thresholds());
        if outcome.created {
            // A token without a start event still opens a new generation
            self.state.global.decay_roster();
            debug!("Turn {} started by its first token", key);
        }
        if !outcome.evaluation_due {
            return None;
        }

        match self.evaluate(key) {
            Ok(Some(candidate)) => self.issue_detection(key, candidate, sink),
            Ok(None) => None,
            Err(err) => {
                warn!("Evaluation of turn {} failed: {}", key, err);
                sink.emit_diagnostic(Level::WARN, &err.to_string());
                None
            }
        }
    }

    /// Generation finished; the buffer is discarded without a final evaluation
    pub fn on_turn_end(&mut self, key: &TurnKey) {
        if self.state.turns.end_turn(key).is_some() {
            debug!("Turn {} ended", key);
        }
    }

    pub fn on_message_finalized(&mut self, key: &TurnKey) {
        if self.state.turns.end_turn(key).is_some() {
            debug!("Message {} finalized", key);
        }
    }

    /// Drop every buffer and all cross-turn memory in one step
    pub fn on_conversation_reset(&mut self) {
        self.state.turns.clear();
        self.state.global.reset();
        self.gate.reset();
        info!("Conversation reset, engine state cleared");
    }

    /// Swap in a new profile; on compile failure the previous configuration stays active
    pub fn reconfigure(&mut self, profile: Profile) -> Result<(), PatternCompileError> {
        let heuristics = match compile_profile(&profile) {
            Ok(set) => set,
            Err(err) => {
                warn!("Keeping previous patterns: {}", err);
                return Err(err);
            }
        };

        self.heuristics = Arc::new(heuristics);
        self.resolver = build_resolver(&profile);
        self.gate.set_settings(profile.cooldowns());
        self.profile = profile;
        info!("Reconfigured with {} heuristics", self.heuristics.heuristic_count());
        Ok(())
    }

    /// Switch back to the default costume, bypassing cooldowns
    pub fn manual_reset(&mut self, sink: &mut dyn DecisionSink) -> Option<SwitchDecision> {
        let target = self.profile.default_costume.trim().to_string();
        self.issue(&target, &target, DecisionTrigger::ManualReset, None, None, None, sink)
    }

    /// Lock display to one character (bypassing cooldowns) or release the lock
    pub fn set_focus_lock(&mut self, name: Option<&str>, sink: &mut dyn DecisionSink) -> Option<SwitchDecision> {
        let Some(name) = name.map(normalize_costume_name).filter(|n| !n.is_empty()) else {
            if self.state.focus_lock.take().is_some() {
                info!("Focus lock released");
            }
            return None;
        };

        let canonical = self.resolver.resolve(&name, None).canonical;
        let target = self.target_for(&canonical);
        info!("Focus lock set to {}", canonical);
        self.state.focus_lock = Some(canonical.clone());
        self.issue(&target, &canonical, DecisionTrigger::FocusLock, None, None, None, sink)
    }

    /// Find the winning candidate for a turn's current buffer
    fn evaluate(&mut self, key: &TurnKey) -> Result<Option<Candidate>, EvaluationError> {
        let now = self.clock.now_ms();
        let turn = self
            .state
            .turns
            .get_mut(key)
            .ok_or_else(|| EvaluationError::MissingTurn(key.to_string()))?;

        if self.heuristics.is_vetoed(&turn.buffer) {
            turn.vetoed = true;
            self.trace(format_args!("Turn {} vetoed", key));
            return Ok(None);
        }

        if let Some(locked) = &self.state.focus_lock {
            debug!("Detection in {} ignored: {} ({})", key, SuppressionReason::FocusLocked, locked);
            return Ok(None);
        }

        let quotes = index_quotes(&turn.buffer);
        let matches = find_matches(
            &turn.buffer,
            &self.heuristics,
            &quotes,
            &self.profile.enabled_heuristics(),
            self.state.global.pronoun_subject.as_deref(),
        );

        let empty = HashMap::new();
        let roster = if self.profile.enable_scene_roster {
            &self.state.global.active_roster
        } else {
            &empty
        };
        let Some(best) = select_best(&matches, self.profile.detection_bias, roster, self.profile.roster_bonus) else {
            return Ok(None);
        };

        let raw = normalize_costume_name(&best.candidate.name);
        if raw.is_empty() {
            return Err(EvaluationError::UnnamedMatch {
                kind: best.candidate.kind.as_str(),
                index: best.candidate.index,
            });
        }

        if turn.is_repeat(&raw, now, self.profile.repeat_suppress_ms) {
            debug!("Detection of {} in {} ignored: {}", raw, key, SuppressionReason::RepeatedInTurn);
            return Ok(None);
        }
        turn.record_accepted(&raw, now);

        Ok(Some(Candidate {
            raw,
            kind: best.candidate.kind,
            score: best.score,
        }))
    }

    fn issue_detection(&mut self, key: &TurnKey, candidate: Candidate, sink: &mut dyn DecisionSink) -> Option<SwitchDecision> {
        let resolution = self.resolver.resolve(&candidate.raw, Some(candidate.kind.priority()));
        if resolution.method != ResolutionMethod::Direct {
            self.trace(format_args!(
                "Resolved {} to {} via {:?} ({:.2})",
                candidate.raw, resolution.canonical, resolution.method, resolution.confidence
            ));
        }

        let target = self.target_for(&resolution.canonical);
        self.issue(
            &target,
            &resolution.canonical,
            DecisionTrigger::Detection,
            Some(candidate.kind),
            Some(candidate.score),
            Some(key.clone()),
            sink,
        )
    }

    /// Run the gate and hand an accepted switch to the sink
    #[allow(clippy::too_many_arguments)]
    fn issue(
        &mut self,
        target: &str,
        canonical: &str,
        trigger: DecisionTrigger,
        kind: Option<MatchKind>,
        score: Option<f64>,
        turn: Option<TurnKey>,
        sink: &mut dyn DecisionSink,
    ) -> Option<SwitchDecision> {
        let now = self.clock.now_ms();
        let request = SwitchRequest {
            target,
            lock_override: trigger != DecisionTrigger::Detection,
        };

        if let Err(reason) = self
            .gate
            .check(request, &self.state.global, &self.profile.default_costume, now)
        {
            let message = format!("Switch to \"{target}\" suppressed: {reason}");
            self.trace(format_args!("{message}"));
            sink.emit_diagnostic(Level::DEBUG, &message);
            return None;
        }

        let decision = SwitchDecision {
            target: target.to_string(),
            canonical: canonical.to_string(),
            trigger,
            kind,
            score,
            turn,
            at_ms: now,
        };

        if let Err(failure) = sink.emit_switch(&decision) {
            warn!("{}", failure);
            self.state.global.record_failure(target, now);
            sink.emit_diagnostic(Level::WARN, &failure.to_string());
            return None;
        }

        let global = &mut self.state.global;
        global.record_success(target, now);
        if trigger == DecisionTrigger::Detection {
            if kind != Some(MatchKind::Pronoun) {
                global.pronoun_subject = Some(canonical.to_string());
            }
            if self.profile.enable_scene_roster {
                global.refresh_roster(canonical, self.profile.scene_roster_ttl);
            }
        }

        self.trace(format_args!(
            "Switched to \"{}\" ({:?}, kind {:?})",
            decision.target, decision.trigger, decision.kind
        ));
        Some(decision)
    }

    /// Folder mapped to a canonical name, or the name itself
    fn target_for(&self, canonical: &str) -> String {
        self.profile
            .folder_for(canonical)
            .unwrap_or(canonical)
            .to_string()
    }

    /// Decision traces go to info when the profile asks for debugging
    fn trace(&self, message: std::fmt::Arguments<'_>) {
        if self.profile.debug {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }
    }
}

fn compile_profile(profile: &Profile) -> Result<CompiledHeuristicSet, PatternCompileError> {
    PatternCompiler::default().compile(&profile.name_patterns(), &profile.verb_lists(), &profile.veto_patterns)
}

fn build_resolver(profile: &Profile) -> NameResolver {
    NameResolver::new(&profile.roster_names(), &profile.aliases, profile.fuzzy_tolerance)
}
