// WHY: Maps a raw detected token onto a canonical roster name before any cooldown bookkeeping
// Exact lookups run first; fuzzy matching is opt-in and heavily filtered to avoid false switches

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use strsim::damerau_levenshtein;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Fuzzy candidates scoring above this are rejected unless a profile overrides it
pub const DEFAULT_FUZZY_MAX_SCORE: f64 = 0.45;
/// Minimum share of characters the token and candidate must have in common
const MIN_CHARACTER_OVERLAP_RATIO: f64 = 0.5;
/// Maximum normalized edit distance for tokens that do not merely extend a candidate
const MAX_NORMALIZED_EDIT_DISTANCE: f64 = 0.34;
/// Extra characters a token may carry beyond a candidate it starts or ends with
const MAX_AFFIX_OVERHANG: usize = 4;
/// Highest heuristic priority the named low-confidence modes treat as low confidence
pub const DEFAULT_LOW_CONFIDENCE_PRIORITY: u8 = 2;

/// Named fuzzy matching presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FuzzyTolerance {
    #[default]
    Off,
    Always,
    Accent,
    LowConfidence,
    Auto,
}

impl FuzzyTolerance {
    /// Case-insensitive preset lookup; unrecognized names select `Auto`
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "off" | "disabled" => FuzzyTolerance::Off,
            "always" | "on" => FuzzyTolerance::Always,
            "accent" | "accented" => FuzzyTolerance::Accent,
            "low" | "low-confidence" | "lowconfidence" => FuzzyTolerance::LowConfidence,
            _ => FuzzyTolerance::Auto,
        }
    }

    pub fn tolerance(self) -> Tolerance {
        let enabled = Tolerance {
            enabled: true,
            ..Tolerance::default()
        };
        match self {
            FuzzyTolerance::Off => Tolerance::default(),
            FuzzyTolerance::Always => Tolerance {
                accent_sensitive: false,
                ..enabled
            },
            FuzzyTolerance::Accent => enabled,
            FuzzyTolerance::LowConfidence => Tolerance {
                accent_sensitive: false,
                low_confidence_threshold: Some(DEFAULT_LOW_CONFIDENCE_PRIORITY),
                ..enabled
            },
            FuzzyTolerance::Auto => Tolerance {
                low_confidence_threshold: Some(DEFAULT_LOW_CONFIDENCE_PRIORITY),
                ..enabled
            },
        }
    }
}

impl<'de> Deserialize<'de> for FuzzyTolerance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

/// Resolved fuzzy matching parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub enabled: bool,
    /// Accented tokens always qualify for fuzzy matching
    pub accent_sensitive: bool,
    /// Tokens from heuristics at or below this priority qualify
    pub low_confidence_threshold: Option<u8>,
    /// Highest normalized edit distance a candidate may score, in 0..=1
    pub max_score: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            enabled: false,
            accent_sensitive: true,
            low_confidence_threshold: None,
            max_score: DEFAULT_FUZZY_MAX_SCORE,
        }
    }
}

impl Tolerance {
    /// Whether fuzzy matching applies to a token with this priority and accent state
    pub fn allows_fuzzy(&self, priority: Option<u8>, has_accents: bool) -> bool {
        if !self.enabled {
            return false;
        }
        // Neither trigger configured means every token qualifies
        if self.low_confidence_threshold.is_none() && !self.accent_sensitive {
            return true;
        }
        let low_confidence = match (self.low_confidence_threshold, priority) {
            (Some(threshold), Some(p)) => p <= threshold,
            _ => false,
        };
        low_confidence || (self.accent_sensitive && has_accents)
    }
}

impl From<FuzzyTolerance> for Tolerance {
    fn from(mode: FuzzyTolerance) -> Self {
        mode.tolerance()
    }
}

impl From<ToleranceSetting> for Tolerance {
    fn from(setting: ToleranceSetting) -> Self {
        setting.resolve()
    }
}

/// Explicit tolerance fields as written in a profile
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomTolerance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent_sensitive: Option<bool>,
    #[serde(alias = "threshold", skip_serializing_if = "Option::is_none")]
    pub low_confidence_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_score: Option<f64>,
}

/// Profile `fuzzyTolerance` value: a preset name, a priority threshold or explicit fields
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToleranceSetting {
    /// `false` disables, `true` selects `Auto`
    Switch(bool),
    Mode(FuzzyTolerance),
    /// Accent-sensitive matching plus tokens at or below this priority
    Threshold(f64),
    Custom(CustomTolerance),
}

impl Default for ToleranceSetting {
    fn default() -> Self {
        ToleranceSetting::Mode(FuzzyTolerance::Off)
    }
}

impl From<FuzzyTolerance> for ToleranceSetting {
    fn from(mode: FuzzyTolerance) -> Self {
        ToleranceSetting::Mode(mode)
    }
}

/// Non-negative whole priority; non-finite values yield `None`
fn priority_threshold(value: f64) -> Option<u8> {
    value
        .is_finite()
        .then(|| value.floor().clamp(0.0, f64::from(u8::MAX)) as u8)
}

impl ToleranceSetting {
    pub fn resolve(&self) -> Tolerance {
        match *self {
            ToleranceSetting::Switch(false) => Tolerance::default(),
            ToleranceSetting::Switch(true) => FuzzyTolerance::Auto.tolerance(),
            ToleranceSetting::Mode(mode) => mode.tolerance(),
            ToleranceSetting::Threshold(value) => match priority_threshold(value) {
                Some(threshold) => Tolerance {
                    enabled: true,
                    low_confidence_threshold: Some(threshold),
                    ..Tolerance::default()
                },
                None => Tolerance::default(),
            },
            ToleranceSetting::Custom(custom) => {
                if custom.enabled == Some(false) {
                    return Tolerance::default();
                }
                Tolerance {
                    enabled: true,
                    accent_sensitive: custom.accent_sensitive.unwrap_or(true),
                    low_confidence_threshold: custom.low_confidence_threshold.and_then(priority_threshold),
                    max_score: custom
                        .max_score
                        .filter(|s| s.is_finite())
                        .map_or(DEFAULT_FUZZY_MAX_SCORE, |s| s.clamp(0.0, 1.0)),
                }
            }
        }
    }
}

/// How a canonical name was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMethod {
    Direct,
    Alias,
    AccentFold,
    Fuzzy,
    /// No roster entry matched; the raw token is used as-is
    Raw,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub canonical: String,
    pub method: ResolutionMethod,
    /// 1.0 for exact lookups, `1 - distance` for fuzzy, 0.0 otherwise
    pub confidence: f64,
}

impl Resolution {
    fn exact(canonical: &str, method: ResolutionMethod) -> Self {
        Self {
            canonical: canonical.to_string(),
            method,
            confidence: 1.0,
        }
    }
}

/// Remove combining marks after canonical decomposition ("Zoë" -> "Zoe")
pub fn strip_diacritics(value: &str) -> String {
    value.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

pub fn has_diacritics(value: &str) -> bool {
    value.nfd().any(is_combining_mark)
}

/// Accent-free lowercase letters and digits, used for overlap checks
fn overlap_key(value: &str) -> String {
    strip_diacritics(value)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Shared characters (as a multiset) over the longer length
fn character_overlap_ratio(source: &str, target: &str) -> f64 {
    let max_len = source.chars().count().max(target.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in source.chars() {
        *counts.entry(c).or_default() += 1;
    }
    let shared = target
        .chars()
        .filter(|c| match counts.get_mut(c) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        })
        .count();
    shared as f64 / max_len as f64
}

fn normalized_edit_distance(source: &str, target: &str) -> f64 {
    let max_len = source.chars().count().max(target.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    damerau_levenshtein(source, target) as f64 / max_len as f64
}

/// Token is a candidate plus a short prefix or suffix ("Kotorichan" for "Kotori")
fn extends_candidate(token: &str, candidate: &str) -> bool {
    let (token_len, candidate_len) = (token.chars().count(), candidate.chars().count());
    token_len > candidate_len
        && token_len <= candidate_len + MAX_AFFIX_OVERHANG
        && (token.starts_with(candidate) || token.ends_with(candidate))
}

/// Canonicalizes detected names against a fixed roster
#[derive(Debug, Clone, Default)]
pub struct NameResolver {
    /// Roster in configuration order, deduplicated
    candidates: Vec<String>,
    direct: HashMap<String, usize>,
    accentless: HashMap<String, usize>,
    /// Lowercased alias -> canonical name
    aliases: HashMap<String, String>,
    tolerance: Tolerance,
}

impl NameResolver {
    pub fn new<S: AsRef<str>>(
        roster: &[S],
        aliases: &HashMap<String, String>,
        tolerance: impl Into<Tolerance>,
    ) -> Self {
        let mut resolver = Self {
            tolerance: tolerance.into(),
            aliases: aliases
                .iter()
                .map(|(alias, canonical)| (alias.trim().to_lowercase(), canonical.trim().to_string()))
                .filter(|(alias, canonical)| !alias.is_empty() && !canonical.is_empty())
                .collect(),
            ..Default::default()
        };

        for name in roster.iter().map(|n| n.as_ref().trim()).filter(|n| !n.is_empty()) {
            let lowered = name.to_lowercase();
            if resolver.direct.contains_key(&lowered) {
                continue;
            }
            let index = resolver.candidates.len();
            resolver.candidates.push(name.to_string());
            resolver.direct.insert(lowered, index);
            resolver.accentless.entry(strip_diacritics(name).to_lowercase()).or_insert(index);
        }
        resolver
    }

    /// Resolve a raw token; `priority` is the heuristic priority that produced it, if any
    pub fn resolve(&self, raw: &str, priority: Option<u8>) -> Resolution {
        let raw = raw.trim();
        if raw.is_empty() {
            return Resolution {
                canonical: String::new(),
                method: ResolutionMethod::Empty,
                confidence: 0.0,
            };
        }

        let lowered = raw.to_lowercase();
        if let Some(&i) = self.direct.get(&lowered) {
            return Resolution::exact(&self.candidates[i], ResolutionMethod::Direct);
        }
        if let Some(canonical) = self.aliases.get(&lowered) {
            return Resolution::exact(canonical, ResolutionMethod::Alias);
        }

        let folded = strip_diacritics(raw).to_lowercase();
        if let Some(canonical) = self.aliases.get(&folded) {
            return Resolution::exact(canonical, ResolutionMethod::Alias);
        }
        if let Some(&i) = self.accentless.get(&folded) {
            return Resolution::exact(&self.candidates[i], ResolutionMethod::AccentFold);
        }

        if self.tolerance.allows_fuzzy(priority, has_diacritics(raw)) {
            if let Some(resolution) = self.fuzzy_match(raw) {
                return resolution;
            }
        }

        Resolution {
            canonical: raw.to_string(),
            method: ResolutionMethod::Raw,
            confidence: 0.0,
        }
    }

    /// Best-scoring roster entry that survives the overlap and affix filters
    fn fuzzy_match(&self, raw: &str) -> Option<Resolution> {
        let token = overlap_key(raw);
        if token.is_empty() {
            return None;
        }

        let mut scored: Vec<(f64, usize)> = self
            .candidates
            .iter()
            .enumerate()
            .map(|(i, c)| (normalized_edit_distance(&token, &overlap_key(c)), i))
            .filter(|(score, _)| *score <= self.tolerance.max_score)
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        scored.into_iter().find_map(|(score, i)| {
            let candidate = &self.candidates[i];
            let key = overlap_key(candidate);
            let accepted = key.is_empty()
                || (character_overlap_ratio(&token, &key) >= MIN_CHARACTER_OVERLAP_RATIO
                    && (extends_candidate(&token, &key)
                        || normalized_edit_distance(&token, &key) <= MAX_NORMALIZED_EDIT_DISTANCE));
            accepted.then(|| Resolution {
                canonical: candidate.clone(),
                method: ResolutionMethod::Fuzzy,
                confidence: 1.0 - score,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(tolerance: FuzzyTolerance) -> NameResolver {
        let mut aliases = HashMap::new();
        aliases.insert("Birdie".to_string(), "Kotori".to_string());
        aliases.insert("Sonoda".to_string(), "Umi".to_string());
        NameResolver::new(&["Kotori", "Umi", "Zoë", "Honoka"], &aliases, tolerance)
    }

    #[test]
    fn test_strip_diacritics() {
        assert_eq!(strip_diacritics("Zoë Renée"), "Zoe Renee");
        assert!(has_diacritics("Chloé"));
        assert!(!has_diacritics("Chloe"));
    }

    #[test]
    fn test_direct_is_case_insensitive() {
        let r = resolver(FuzzyTolerance::Off).resolve("KOTORI", Some(5));
        assert_eq!(r.canonical, "Kotori");
        assert_eq!(r.method, ResolutionMethod::Direct);
        assert_eq!(r.confidence, 1.0);
    }

    #[test]
    fn test_alias_lookup() {
        let r = resolver(FuzzyTolerance::Off).resolve("birdie", None);
        assert_eq!(r.canonical, "Kotori");
        assert_eq!(r.method, ResolutionMethod::Alias);
    }

    #[test]
    fn test_accent_fold_both_directions() {
        let res = resolver(FuzzyTolerance::Off);
        let r = res.resolve("Zoe", None);
        assert_eq!((r.canonical.as_str(), r.method), ("Zoë", ResolutionMethod::AccentFold));

        let r = res.resolve("Umí", None);
        assert_eq!((r.canonical.as_str(), r.method), ("Umi", ResolutionMethod::AccentFold));
    }

    #[test]
    fn test_raw_and_empty() {
        let res = resolver(FuzzyTolerance::Off);
        let r = res.resolve("Nozomi", Some(5));
        assert_eq!((r.canonical.as_str(), r.method, r.confidence), ("Nozomi", ResolutionMethod::Raw, 0.0));
        assert_eq!(res.resolve("   ", None).method, ResolutionMethod::Empty);
    }

    #[test]
    fn test_tolerance_modes() {
        let allows = |mode: FuzzyTolerance, priority, accents| mode.tolerance().allows_fuzzy(priority, accents);
        assert!(!allows(FuzzyTolerance::Off, Some(0), true));
        assert!(allows(FuzzyTolerance::Always, Some(5), false));
        assert!(allows(FuzzyTolerance::Accent, Some(5), true));
        assert!(!allows(FuzzyTolerance::Accent, Some(0), false));
        assert!(allows(FuzzyTolerance::LowConfidence, Some(2), false));
        assert!(!allows(FuzzyTolerance::LowConfidence, Some(3), false));
        assert!(!allows(FuzzyTolerance::LowConfidence, None, false));
        assert!(allows(FuzzyTolerance::Auto, Some(3), true));
        assert!(allows(FuzzyTolerance::Auto, Some(1), false));
        assert!(!allows(FuzzyTolerance::Auto, Some(4), false));
    }

    #[test]
    fn test_fuzzy_typo_and_affix() {
        let res = resolver(FuzzyTolerance::Always);

        let r = res.resolve("Honkoa", Some(5));
        assert_eq!(r.canonical, "Honoka");
        assert_eq!(r.method, ResolutionMethod::Fuzzy);
        assert!(r.confidence > 0.6 && r.confidence < 1.0);

        let r = res.resolve("Kotorin", Some(5));
        assert_eq!(r.canonical, "Kotori");
    }

    #[test]
    fn test_fuzzy_rejects_distant_tokens() {
        let res = resolver(FuzzyTolerance::Always);
        assert_eq!(res.resolve("Hanayo", Some(5)).method, ResolutionMethod::Raw);
        assert_eq!(res.resolve("Rin", Some(5)).method, ResolutionMethod::Raw);
    }

    #[test]
    fn test_fuzzy_gated_by_tolerance() {
        let res = resolver(FuzzyTolerance::LowConfidence);
        assert_eq!(res.resolve("Honkoa", Some(5)).method, ResolutionMethod::Raw);
        assert_eq!(res.resolve("Honkoa", Some(1)).method, ResolutionMethod::Fuzzy);
    }

    #[test]
    fn test_accented_token_folds_to_roster_spelling() {
        let res = NameResolver::new(&["Kotori"], &HashMap::new(), FuzzyTolerance::Accent);
        let r = res.resolve("Kötori", None);
        assert_eq!(r.canonical, "Kotori");
        assert_eq!(r.method, ResolutionMethod::AccentFold);
        assert_eq!(r.confidence, 1.0);
    }

    #[test]
    fn test_tolerance_deserializes_aliases() {
        let t: FuzzyTolerance = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(t, FuzzyTolerance::LowConfidence);
        let t: FuzzyTolerance = serde_json::from_str("\"Low-Confidence\"").unwrap();
        assert_eq!(t, FuzzyTolerance::LowConfidence);
        let t: FuzzyTolerance = serde_json::from_str("\"on\"").unwrap();
        assert_eq!(t, FuzzyTolerance::Always);
        let t: FuzzyTolerance = serde_json::from_str("\"whatever\"").unwrap();
        assert_eq!(t, FuzzyTolerance::Auto);
    }

    #[test]
    fn test_numeric_setting_is_priority_threshold() {
        let setting: ToleranceSetting = serde_json::from_str("3.7").unwrap();
        let t = setting.resolve();
        assert!(t.enabled && t.accent_sensitive);
        assert_eq!(t.low_confidence_threshold, Some(3));
        assert_eq!(t.max_score, DEFAULT_FUZZY_MAX_SCORE);

        let res = resolver(FuzzyTolerance::Off);
        let res = NameResolver { tolerance: t, ..res };
        assert_eq!(res.resolve("Honkoa", Some(3)).method, ResolutionMethod::Fuzzy);
        assert_eq!(res.resolve("Honkoa", Some(4)).method, ResolutionMethod::Raw);

        let negative: ToleranceSetting = serde_json::from_str("-2").unwrap();
        assert_eq!(negative.resolve().low_confidence_threshold, Some(0));
    }

    #[test]
    fn test_object_setting_fields() {
        let setting: ToleranceSetting =
            serde_json::from_str(r#"{ "accentSensitive": false, "threshold": 1, "maxScore": 5 }"#).unwrap();
        assert_eq!(
            setting.resolve(),
            Tolerance {
                enabled: true,
                accent_sensitive: false,
                low_confidence_threshold: Some(1),
                max_score: 1.0,
            }
        );

        let setting: ToleranceSetting = serde_json::from_str(r#"{ "lowConfidenceThreshold": 4 }"#).unwrap();
        let t = setting.resolve();
        assert!(t.enabled && t.accent_sensitive);
        assert_eq!(t.low_confidence_threshold, Some(4));

        let setting: ToleranceSetting = serde_json::from_str(r#"{ "enabled": false, "maxScore": 0.9 }"#).unwrap();
        assert_eq!(setting.resolve(), Tolerance::default());

        let setting: ToleranceSetting = serde_json::from_str("false").unwrap();
        assert!(!setting.resolve().enabled);
        let setting: ToleranceSetting = serde_json::from_str("\"accented\"").unwrap();
        assert_eq!(setting, ToleranceSetting::Mode(FuzzyTolerance::Accent));
    }

    #[test]
    fn test_tightened_max_score_rejects_typo() {
        let setting: ToleranceSetting =
            serde_json::from_str(r#"{ "accentSensitive": false, "maxScore": 0.1 }"#).unwrap();
        let strict = NameResolver::new(&["Kotori", "Honoka"], &HashMap::new(), setting);
        assert_eq!(strict.resolve("Honkoa", Some(5)).method, ResolutionMethod::Raw);

        let loose = NameResolver::new(&["Kotori", "Honoka"], &HashMap::new(), FuzzyTolerance::Always);
        assert_eq!(loose.resolve("Honkoa", Some(5)).method, ResolutionMethod::Fuzzy);
    }
}
