// WHY: Per-turn incremental buffers with their evaluation thresholds, bounded by insertion order
// Buffer text and per-turn decision state live in one record so eviction drops both together

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attribution::normalization::{ends_with_terminal_punctuation, normalize_stream_text_into};

/// Maximum number of turns tracked at once
pub const MAX_TURN_BUFFERS: usize = 60;

/// Identity of one in-flight generation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKey {
    /// A generation bound to a chat message id
    Message(String),
    /// Streaming output not yet bound to a message
    Live,
}

impl TurnKey {
    pub fn message(id: impl ToString) -> Self {
        TurnKey::Message(id.to_string())
    }
}

impl std::fmt::Display for TurnKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TurnKey::Message(id) => write!(f, "m{id}"),
            TurnKey::Live => f.write_str("live"),
        }
    }
}

/// Buffer sizing taken from the active profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferThresholds {
    /// Characters kept in the buffer (tail retained)
    pub max_buffer_chars: usize,
    /// Characters between threshold-driven evaluations
    pub token_process_threshold: usize,
}

impl Default for BufferThresholds {
    fn default() -> Self {
        Self {
            max_buffer_chars: 2000,
            token_process_threshold: 60,
        }
    }
}

/// Streaming state of one turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnState {
    /// Normalized text, at most `max_buffer_chars` characters
    pub buffer: String,
    /// Characters appended over the whole turn, including any that were cut
    pub appended_chars: usize,
    /// `appended_chars` value at which the next threshold evaluation fires
    pub next_threshold: usize,
    /// Raw name most recently accepted from this turn
    pub last_accepted_name: Option<String>,
    pub last_accepted_at: Option<u64>,
    /// Set once a veto pattern matched; the turn yields nothing afterwards
    pub vetoed: bool,
}

impl TurnState {
    fn new(thresholds: &BufferThresholds) -> Self {
        Self {
            next_threshold: thresholds.token_process_threshold,
            ..Default::default()
        }
    }

    /// Record an accepted detection for repeat suppression
    pub fn record_accepted(&mut self, name: &str, now_ms: u64) {
        self.last_accepted_name = Some(name.to_string());
        self.last_accepted_at = Some(now_ms);
    }

    /// True when `name` was accepted from this turn less than `window_ms` ago
    pub fn is_repeat(&self, name: &str, now_ms: u64, window_ms: u64) -> bool {
        match (&self.last_accepted_name, self.last_accepted_at) {
            (Some(last), Some(at)) => last.eq_ignore_ascii_case(name) && now_ms.saturating_sub(at) < window_ms,
            _ => false,
        }
    }
}

/// Result of appending one token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenOutcome {
    /// The buffer should be evaluated now
    pub evaluation_due: bool,
    /// The turn did not exist and was created by this token
    pub created: bool,
}

/// Insertion-ordered registry of turn states with a hard capacity
#[derive(Debug)]
pub struct TurnRegistry {
    turns: IndexMap<TurnKey, TurnState>,
    capacity: usize,
    scratch: String,
}

impl Default for TurnRegistry {
    fn default() -> Self {
        Self::new(MAX_TURN_BUFFERS)
    }
}

impl TurnRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: IndexMap::new(),
            capacity: capacity.max(1),
            scratch: String::new(),
        }
    }

    /// Begin a turn, discarding any previous state under the same key
    pub fn start_turn(&mut self, key: TurnKey, thresholds: &BufferThresholds) -> &mut TurnState {
        self.turns.shift_remove(&key);
        self.insert_fresh(key, thresholds)
    }

    /// Append a token to its turn, creating the turn if it is unknown
    pub fn on_token(&mut self, key: &TurnKey, token: &str, thresholds: &BufferThresholds) -> TokenOutcome {
        let created = !self.turns.contains_key(key);
        if created {
            self.insert_fresh(key.clone(), thresholds);
        }

        normalize_stream_text_into(token, &mut self.scratch);
        let Some(state) = self.turns.get_mut(key) else {
            return TokenOutcome::default();
        };

        if state.vetoed {
            return TokenOutcome {
                evaluation_due: false,
                created,
            };
        }

        state.buffer.push_str(&self.scratch);
        state.appended_chars += self.scratch.chars().count();
        truncate_to_tail(&mut state.buffer, thresholds.max_buffer_chars);

        // Every evaluation, threshold or punctuation driven, restarts the count
        let evaluation_due =
            state.appended_chars >= state.next_threshold || ends_with_terminal_punctuation(&self.scratch);
        if evaluation_due {
            state.next_threshold = state.appended_chars + thresholds.token_process_threshold;
        }

        TokenOutcome {
            evaluation_due: evaluation_due && !state.buffer.is_empty(),
            created,
        }
    }

    pub fn get(&self, key: &TurnKey) -> Option<&TurnState> {
        self.turns.get(key)
    }

    pub fn get_mut(&mut self, key: &TurnKey) -> Option<&mut TurnState> {
        self.turns.get_mut(key)
    }

    /// Remove a turn and return its final state
    pub fn end_turn(&mut self, key: &TurnKey) -> Option<TurnState> {
        self.turns.shift_remove(key)
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &TurnKey> {
        self.turns.keys()
    }

    fn insert_fresh(&mut self, key: TurnKey, thresholds: &BufferThresholds) -> &mut TurnState {
        while self.turns.len() >= self.capacity {
            if let Some((evicted, _)) = self.turns.shift_remove_index(0) {
                debug!("Evicted oldest turn buffer {}", evicted);
            }
        }
        self.turns.entry(key).or_insert_with(|| TurnState::new(thresholds))
    }
}

/// Keep only the last `max_chars` characters, cutting on a char boundary
fn truncate_to_tail(buffer: &mut String, max_chars: usize) {
    let count = buffer.chars().count();
    if count <= max_chars {
        return;
    }
    let cut = buffer
        .char_indices()
        .nth(count - max_chars)
        .map_or(buffer.len(), |(i, _)| i);
    buffer.drain(..cut);
}
