// WHY: Runs every enabled heuristic over the buffer and tags each hit with its kind
// Quote ranges decide which hits count as narration-level evidence

use regex_automata::meta::Regex;
use regex_automata::util::captures::Captures;
use regex_automata::Input;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::patterns::CompiledHeuristicSet;
use super::quotes::{is_inside_quotes, QuoteRange};
use super::{Match, MatchKind};

/// Suffixes that disqualify a bare-name mention ("Kotori's", "Kotori'll", "Kotori:")
const GENERAL_NAME_REJECT_SUFFIXES: &[&str] = &["'s", "'d", "'ll", "'ve", "'re", ":"];

/// Per-heuristic enable flags; the speaker heuristic is always on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnabledHeuristics {
    pub attribution: bool,
    pub action: bool,
    pub vocative: bool,
    pub possessive: bool,
    pub pronoun: bool,
    pub general: bool,
}

impl Default for EnabledHeuristics {
    fn default() -> Self {
        Self {
            attribution: true,
            action: true,
            vocative: true,
            possessive: true,
            pronoun: true,
            general: false,
        }
    }
}

/// Find every candidate match in the text
/// Pronoun hits resolve to `pronoun_subject` and are skipped when no subject is tracked.
pub fn find_matches(
    text: &str,
    set: &CompiledHeuristicSet,
    quotes: &[QuoteRange],
    enabled: &EnabledHeuristics,
    pronoun_subject: Option<&str>,
) -> Vec<Match> {
    let mut matches = Vec::new();
    if text.is_empty() {
        return matches;
    }

    let named = [
        (MatchKind::Speaker, true, &set.speaker),
        (MatchKind::Attribution, enabled.attribution, &set.attribution),
        (MatchKind::Action, enabled.action, &set.action),
        (MatchKind::Vocative, enabled.vocative, &set.vocative),
        (MatchKind::Possessive, enabled.possessive, &set.possessive),
        (MatchKind::GeneralName, enabled.general, &set.general_name),
    ];

    for (kind, on, regex) in named {
        let Some(regex) = regex.as_ref().filter(|_| on) else {
            continue;
        };
        scan(regex, text, |caps| {
            let Some(start) = caps.get_match().map(|m| m.start()) else {
                return;
            };
            if !kind.searches_inside_quotes() && is_inside_quotes(quotes, start) {
                return;
            }
            let Some((name, name_end)) = first_group(caps, text) else {
                return;
            };
            if kind == MatchKind::GeneralName && has_rejected_suffix(&text[name_end..]) {
                return;
            }
            matches.push(Match::new(name, kind, start));
        });
    }

    if enabled.pronoun {
        if let (Some(regex), Some(subject)) = (set.pronoun.as_ref(), pronoun_subject) {
            scan(regex, text, |caps| {
                if let Some(m) = caps.get_match() {
                    if !is_inside_quotes(quotes, m.start()) {
                        matches.push(Match::new(subject, MatchKind::Pronoun, m.start()));
                    }
                }
            });
        }
    }

    debug!("Found {} candidate matches in {} bytes", matches.len(), text.len());
    matches
}

/// Visit every match left to right, always advancing past zero-length matches
fn scan<F>(regex: &Regex, text: &str, mut on_match: F)
where
    F: FnMut(&Captures),
{
    let mut caps = regex.create_captures();
    let mut pos = 0;

    while pos <= text.len() {
        regex.search_captures(&Input::new(text).range(pos..), &mut caps);
        let Some(m) = caps.get_match() else {
            break;
        };
        on_match(&caps);

        pos = if m.is_empty() {
            next_char_boundary(text, m.end())
        } else {
            m.end()
        };
    }
}

fn next_char_boundary(text: &str, pos: usize) -> usize {
    text[pos..].chars().next().map_or(pos + 1, |c| pos + c.len_utf8())
}

/// First participating, non-blank capture group (trimmed) and its end offset
fn first_group<'t>(caps: &Captures, text: &'t str) -> Option<(&'t str, usize)> {
    (1..caps.group_len())
        .filter_map(|g| caps.get_group(g))
        .map(|span| (text[span.start..span.end].trim(), span.end))
        .find(|(name, _)| !name.is_empty())
}

fn has_rejected_suffix(rest: &str) -> bool {
    let folded: String = rest.chars().take(3).map(|c| if c == '\u{2019}' { '\'' } else { c }).collect();
    let folded = folded.to_lowercase();
    GENERAL_NAME_REJECT_SUFFIXES.iter().any(|s| folded.starts_with(s))
}
