// WHY: Centralized default vocabularies for attribution and action heuristics
// Profiles may override either list; these are used when a profile leaves them empty

use super::patterns::escape_regex;

/// Speech verbs that tie a name to adjacent quoted dialogue
pub const DEFAULT_ATTRIBUTION_VERBS: &[&str] = &[
    "admitted", "agreed", "announced", "answered", "asked", "bellowed", "called",
    "commented", "complained", "concluded", "confessed", "continued", "cried",
    "declared", "demanded", "denied", "exclaimed", "explained", "gasped", "insisted",
    "interrupted", "mumbled", "murmured", "mused", "muttered", "nodded", "objected",
    "ordered", "pleaded", "promised", "protested", "queried", "questioned", "replied",
    "responded", "retorted", "roared", "said", "scolded", "screamed", "shouted",
    "sighed", "snapped", "spoke", "stated", "suggested", "threatened", "warned",
    "whispered", "wondered", "yelled",
];

/// Physical action verbs that mark a character as the focus of narration
pub const DEFAULT_ACTION_VERBS: &[&str] = &[
    "blinked", "bowed", "crouched", "frowned", "gestured", "glanced", "grinned",
    "looked", "nodded", "paused", "ran", "shrugged", "sighed", "smiled", "stared",
    "stepped", "turned", "walked", "yelled",
];

/// Subject pronouns that continue the most recently named character
pub const PRONOUNS: &[&str] = &["he", "she", "they"];

/// Build a regex alternation body from a verb list
/// Verbs are trimmed and escaped, inner whitespace matches any whitespace run.
/// Returns None when no usable verb remains.
pub fn verb_alternation<S: AsRef<str>>(verbs: &[S]) -> Option<String> {
    let parts: Vec<String> = verbs
        .iter()
        .map(|v| v.as_ref().trim())
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.split_whitespace()
                .map(escape_regex)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(format!("(?:{})", parts.join("|")))
    }
}

/// Resolve a configured verb list, falling back to defaults when it is empty
pub fn effective_verbs(configured: &[String], defaults: &[&str]) -> Vec<String> {
    let cleaned: Vec<String> = configured
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();

    if cleaned.is_empty() {
        defaults.iter().map(|v| v.to_string()).collect()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_alternation_escapes_and_joins() {
        let alt = verb_alternation(&["said", " looked  up ", "", "a.b"]).unwrap();
        assert_eq!(alt, r"(?:said|looked\s+up|a\.b)");
    }

    #[test]
    fn test_verb_alternation_empty() {
        let empty: [&str; 2] = ["", "   "];
        assert!(verb_alternation(&empty).is_none());
    }

    #[test]
    fn test_effective_verbs_fallback() {
        let configured = vec![" ".to_string()];
        let verbs = effective_verbs(&configured, DEFAULT_ACTION_VERBS);
        assert_eq!(verbs.len(), DEFAULT_ACTION_VERBS.len());

        let configured = vec!["danced".to_string()];
        assert_eq!(effective_verbs(&configured, DEFAULT_ACTION_VERBS), vec!["danced"]);
    }

    #[test]
    fn test_default_lists_are_lowercase_words() {
        for verb in DEFAULT_ATTRIBUTION_VERBS.iter().chain(DEFAULT_ACTION_VERBS) {
            assert!(verb.chars().all(|c| c.is_ascii_lowercase()), "unexpected verb {verb}");
        }
    }
}
