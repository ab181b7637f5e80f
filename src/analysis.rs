// WHY: Offline pattern tester: every detection, the winner as text grows word by word,
// and how strongly each character is featured

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;

use crate::attribution::normalization::{comparison_key, normalize_costume_name, normalize_stream_text};
use crate::attribution::{find_matches, index_quotes, select_best, CompiledHeuristicSet, Match, MatchKind, ScoredMatch};
use crate::config::Profile;

/// Result of analyzing one complete text
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub vetoed: bool,
    /// Text of the first veto match
    pub veto_match: Option<String>,
    /// All candidates, ordered by position
    pub detections: Vec<Match>,
    pub winner: Option<ScoredMatch>,
    /// Successive distinct winners as the text is replayed word by word, each
    /// scored over the trailing `max_buffer_chars` window like a live buffer.
    /// Indices are offsets into the whole normalized text.
    pub winner_timeline: Vec<ScoredMatch>,
    /// Character -> focus points, highest first
    pub focus_scores: IndexMap<String, u32>,
}

/// Points a detection contributes to its character's focus score
pub fn focus_points(kind: MatchKind) -> u32 {
    match kind {
        MatchKind::Speaker | MatchKind::Attribution | MatchKind::Pronoun => 3,
        MatchKind::Action => 2,
        MatchKind::Vocative | MatchKind::Possessive | MatchKind::GeneralName => 1,
    }
}

/// Sum focus points per normalized name, sorted by score then first appearance
pub fn focus_scores(matches: &[Match]) -> IndexMap<String, u32> {
    let mut scores: IndexMap<String, u32> = IndexMap::new();
    for m in matches {
        *scores.entry(normalize_costume_name(&m.name)).or_default() += focus_points(m.kind);
    }
    scores.sort_by(|_, a, _, b| b.cmp(a));
    scores
}

/// Analyze a complete text with a compiled set and the profile's scoring settings
pub fn analyze_text(text: &str, set: &CompiledHeuristicSet, profile: &Profile) -> AnalysisReport {
    let combined = normalize_stream_text(text);

    if let Some(veto) = set.veto.as_ref().and_then(|re| re.find(&combined)) {
        return AnalysisReport {
            vetoed: true,
            veto_match: Some(combined[veto.range()].to_string()),
            detections: Vec::new(),
            winner: None,
            winner_timeline: Vec::new(),
            focus_scores: IndexMap::new(),
        };
    }

    let mut detections = detect(&combined, set, profile);
    detections.sort_by_key(|m| m.index);
    let winner = pick(&detections, profile);

    let char_starts: Vec<usize> = combined.char_indices().map(|(i, _)| i).collect();
    let mut winner_timeline: Vec<ScoredMatch> = Vec::new();
    for end in word_boundaries(&combined) {
        let start = window_start(&char_starts, end, profile.max_buffer_chars);
        let Some(mut best) = pick(&detect(&combined[start..end], set, profile), profile) else {
            continue;
        };
        best.candidate.index += start;
        let changed = winner_timeline
            .last()
            .map_or(true, |last| comparison_key(&last.candidate.name) != comparison_key(&best.candidate.name));
        if changed {
            winner_timeline.push(best);
        }
    }

    AnalysisReport {
        vetoed: false,
        veto_match: None,
        focus_scores: focus_scores(&detections),
        detections,
        winner,
        winner_timeline,
    }
}

/// Find candidates; pronouns refer to the best non-pronoun winner of the same text
fn detect(text: &str, set: &CompiledHeuristicSet, profile: &Profile) -> Vec<Match> {
    let quotes = index_quotes(text);
    let enabled = profile.enabled_heuristics();
    let named = find_matches(text, set, &quotes, &enabled, None);

    if !enabled.pronoun {
        return named;
    }
    match pick(&named, profile) {
        Some(subject) => find_matches(text, set, &quotes, &enabled, Some(&subject.candidate.name)),
        None => named,
    }
}

fn pick(matches: &[Match], profile: &Profile) -> Option<ScoredMatch> {
    select_best(matches, profile.detection_bias, &HashMap::new(), 0.0)
}

/// Byte offset where the last `max_chars` characters before `end` begin
fn window_start(char_starts: &[usize], end: usize, max_chars: usize) -> usize {
    let chars_before = char_starts.partition_point(|&i| i < end);
    char_starts
        .get(chars_before.saturating_sub(max_chars))
        .copied()
        .map_or(end, |i| i.min(end))
}

/// Byte offsets at the end of every word and every whitespace run
fn word_boundaries(text: &str) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut prev_space: Option<bool> = None;
    for (i, ch) in text.char_indices() {
        let space = ch.is_whitespace();
        if prev_space.is_some_and(|p| p != space) {
            ends.push(i);
        }
        prev_space = Some(space);
    }
    if !text.is_empty() {
        ends.push(text.len());
    }
    ends
}
