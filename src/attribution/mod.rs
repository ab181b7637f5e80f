// WHY: Heuristic attribution pipeline: compile patterns, find candidates, score them
// Each stage is a pure function over the buffer so the engine can own all mutable state

use serde::{Deserialize, Serialize};

pub mod matcher;
pub mod normalization;
pub mod patterns;
pub mod quotes;
pub mod scorer;
pub mod verbs;

// Re-export core types
pub use matcher::{find_matches, EnabledHeuristics};
pub use normalization::{normalize_costume_name, normalize_stream_text, normalize_stream_text_into};
pub use patterns::{CompiledHeuristicSet, PatternCompiler, PatternEntry, VerbLists};
pub use quotes::{index_quotes, QuoteRange};
pub use scorer::{select_best, ScoredMatch};

/// Category of heuristic that produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchKind {
    Speaker,
    Attribution,
    Action,
    Pronoun,
    Vocative,
    Possessive,
    GeneralName,
}

impl MatchKind {
    /// Ranking priority, higher wins ties
    pub fn priority(self) -> u8 {
        match self {
            MatchKind::Speaker => 5,
            MatchKind::Attribution => 4,
            MatchKind::Action | MatchKind::Pronoun => 3,
            MatchKind::Vocative => 2,
            MatchKind::Possessive => 1,
            MatchKind::GeneralName => 0,
        }
    }

    /// Kinds at or above the action tier receive the detection bias
    pub fn is_high_confidence(self) -> bool {
        self.priority() >= MatchKind::Action.priority()
    }

    /// Vocative address happens inside quoted speech, so it is searched there too
    pub fn searches_inside_quotes(self) -> bool {
        matches!(self, MatchKind::Vocative)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchKind::Speaker => "speaker",
            MatchKind::Attribution => "attribution",
            MatchKind::Action => "action",
            MatchKind::Pronoun => "pronoun",
            MatchKind::Vocative => "vocative",
            MatchKind::Possessive => "possessive",
            MatchKind::GeneralName => "general-name",
        }
    }
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate attribution found in the buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Detected name (raw text, or the tracked subject for pronoun matches)
    pub name: String,
    pub kind: MatchKind,
    /// Byte offset of the match start in the buffer
    pub index: usize,
    pub priority: u8,
}

impl Match {
    pub fn new(name: impl Into<String>, kind: MatchKind, index: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            index,
            priority: kind.priority(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        let ordered = [
            MatchKind::Speaker,
            MatchKind::Attribution,
            MatchKind::Action,
            MatchKind::Vocative,
            MatchKind::Possessive,
            MatchKind::GeneralName,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].priority() > pair[1].priority(), "{} should outrank {}", pair[0], pair[1]);
        }
        assert_eq!(MatchKind::Pronoun.priority(), MatchKind::Action.priority());
    }

    #[test]
    fn test_high_confidence_tiers() {
        assert!(MatchKind::Pronoun.is_high_confidence());
        assert!(MatchKind::Speaker.is_high_confidence());
        assert!(!MatchKind::Vocative.is_high_confidence());
        assert!(!MatchKind::GeneralName.is_high_confidence());
    }

    #[test]
    fn test_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&MatchKind::GeneralName).unwrap();
        assert_eq!(json, "\"general-name\"");
    }
}
