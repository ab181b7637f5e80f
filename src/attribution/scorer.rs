// WHY: Ranking is a pure function of the candidate list so identical input always picks the same winner

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use super::normalization::comparison_key;
use super::Match;

/// Candidate plus the score it was ranked by
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMatch {
    #[serde(flatten)]
    pub candidate: Match,
    pub score: f64,
}

/// Score one candidate
/// Position counts for everything; the bias only moves high-confidence kinds.
pub fn score_match(candidate: &Match, bias: f64, roster: &HashMap<String, u32>, roster_bonus: f64) -> f64 {
    let mut score = candidate.index as f64;
    if candidate.kind.is_high_confidence() {
        score += f64::from(candidate.priority) * bias;
    }
    if roster_bonus != 0.0 && roster.contains_key(&comparison_key(&candidate.name)) {
        score += roster_bonus;
    }
    score
}

/// Pick the single best candidate
///
/// With a zero bias only the highest priority tier competes and the rightmost
/// match in it wins. Otherwise every candidate competes on its biased score.
/// Equal scores go to the later index, then the higher priority.
pub fn select_best(
    matches: &[Match],
    bias: f64,
    roster: &HashMap<String, u32>,
    roster_bonus: f64,
) -> Option<ScoredMatch> {
    let top_priority = matches.iter().map(|m| m.priority).max()?;

    matches
        .iter()
        .filter(|m| bias != 0.0 || m.priority == top_priority)
        .map(|m| ScoredMatch {
            score: score_match(m, bias, roster, roster_bonus),
            candidate: m.clone(),
        })
        .max_by(compare_scored)
}

fn compare_scored(a: &ScoredMatch, b: &ScoredMatch) -> Ordering {
    a.score
        .total_cmp(&b.score)
        .then(a.candidate.index.cmp(&b.candidate.index))
        .then(a.candidate.priority.cmp(&b.candidate.priority))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::MatchKind;

    fn no_roster() -> HashMap<String, u32> {
        HashMap::new()
    }

    #[test]
    fn test_empty_has_no_winner() {
        assert!(select_best(&[], 0.0, &no_roster(), 0.0).is_none());
    }

    #[test]
    fn test_zero_bias_rightmost_of_top_priority() {
        let matches = vec![
            Match::new("Kotori", MatchKind::Speaker, 0),
            Match::new("Umi", MatchKind::Vocative, 40),
            Match::new("Honoka", MatchKind::Speaker, 20),
        ];
        let best = select_best(&matches, 0.0, &no_roster(), 0.0).unwrap();
        assert_eq!(best.candidate.name, "Honoka");
    }

    #[test]
    fn test_positive_bias_favors_high_confidence() {
        let matches = vec![
            Match::new("Kotori", MatchKind::Action, 10),
            Match::new("Umi", MatchKind::Vocative, 20),
        ];
        // Action: 10 + 3 * 5 = 25 beats vocative at 20
        let best = select_best(&matches, 5.0, &no_roster(), 0.0).unwrap();
        assert_eq!(best.candidate.name, "Kotori");
        assert_eq!(best.score, 25.0);

        // Small bias leaves position in charge
        let best = select_best(&matches, 1.0, &no_roster(), 0.0).unwrap();
        assert_eq!(best.candidate.name, "Umi");
    }

    #[test]
    fn test_negative_bias_penalizes_high_confidence() {
        let matches = vec![
            Match::new("Kotori", MatchKind::Attribution, 30),
            Match::new("Umi", MatchKind::Possessive, 25),
        ];
        let best = select_best(&matches, -2.0, &no_roster(), 0.0).unwrap();
        assert_eq!(best.candidate.name, "Umi");
    }

    #[test]
    fn test_roster_bonus_applies_by_comparison_key() {
        let matches = vec![
            Match::new("Kotori-san", MatchKind::Action, 5),
            Match::new("Umi", MatchKind::Action, 9),
        ];
        let mut roster = HashMap::new();
        roster.insert("kotori".to_string(), 3);

        let best = select_best(&matches, 0.0, &roster, 10.0).unwrap();
        assert_eq!(best.candidate.name, "Kotori-san");
        assert_eq!(best.score, 15.0);
    }

    #[test]
    fn test_equal_scores_prefer_later_then_priority() {
        // Action at 10 with bias 1: 13; vocative at 13: 13
        let matches = vec![
            Match::new("Kotori", MatchKind::Action, 10),
            Match::new("Umi", MatchKind::Vocative, 13),
        ];
        let best = select_best(&matches, 1.0, &no_roster(), 0.0).unwrap();
        assert_eq!(best.candidate.name, "Umi");

        let matches = vec![
            Match::new("Kotori", MatchKind::Action, 10),
            Match::new("Umi", MatchKind::Pronoun, 10),
        ];
        let first = select_best(&matches, 1.0, &no_roster(), 0.0).unwrap();
        let second = select_best(&matches, 1.0, &no_roster(), 0.0).unwrap();
        assert_eq!(first, second);
    }
}
