// WHY: Profile settings the engine consumes read-only; field names and defaults follow the
// settings files the host already writes (camelCase JSON)

use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::attribution::matcher::EnabledHeuristics;
use crate::attribution::normalization::normalize_costume_name;
use crate::attribution::patterns::{filter_ignored, PatternEntry, VerbLists};
use crate::attribution::verbs::{effective_verbs, DEFAULT_ACTION_VERBS, DEFAULT_ATTRIBUTION_VERBS};
use crate::cooldown::CooldownSettings;
use crate::error::ConfigError;
use crate::names::ToleranceSetting;
use crate::stream::BufferThresholds;

/// Name of the profile created when none is configured
pub const DEFAULT_PROFILE_NAME: &str = "Default";

/// Costume folder issued for a canonical character name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub name: String,
    pub folder: String,
}

/// One named set of detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Profile {
    /// Character name patterns, literal text or `/regex/flags`
    pub patterns: Vec<String>,
    /// Names removed from `patterns` before compiling
    pub ignore_patterns: Vec<String>,
    /// Out-of-character markers that silence a whole turn
    pub veto_patterns: Vec<String>,
    /// Costume considered active before anything has been issued
    pub default_costume: String,
    /// Raise decision traces from debug to info
    pub debug: bool,

    pub global_cooldown_ms: u64,
    pub per_trigger_cooldown_ms: u64,
    pub failed_trigger_cooldown_ms: u64,
    pub max_buffer_chars: usize,
    pub repeat_suppress_ms: u64,
    pub token_process_threshold: usize,

    pub mappings: Vec<Mapping>,

    pub detect_attribution: bool,
    pub detect_action: bool,
    pub detect_vocative: bool,
    pub detect_possessive: bool,
    pub detect_pronoun: bool,
    pub detect_general: bool,

    /// Empty means the built-in list
    pub attribution_verbs: Vec<String>,
    /// Empty means the built-in list
    pub action_verbs: Vec<String>,

    /// Positive favors high-confidence kinds over position, negative the reverse
    pub detection_bias: f64,

    pub enable_scene_roster: bool,
    #[serde(alias = "sceneRosterTTL")]
    pub scene_roster_ttl: u32,
    /// Score bonus for candidates in the active roster
    pub roster_bonus: f64,

    /// Alias -> canonical name
    pub aliases: HashMap<String, String>,
    /// Preset name, priority threshold or explicit fields
    pub fuzzy_tolerance: ToleranceSetting,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            patterns: ["Char A", "Char B", "Char C", "Char D"].map(String::from).to_vec(),
            ignore_patterns: Vec::new(),
            veto_patterns: ["OOC:", "(OOC)"].map(String::from).to_vec(),
            default_costume: String::new(),
            debug: false,
            global_cooldown_ms: 1200,
            per_trigger_cooldown_ms: 250,
            failed_trigger_cooldown_ms: 10_000,
            max_buffer_chars: 2000,
            repeat_suppress_ms: 800,
            token_process_threshold: 60,
            mappings: Vec::new(),
            detect_attribution: true,
            detect_action: true,
            detect_vocative: true,
            detect_possessive: true,
            detect_pronoun: true,
            detect_general: false,
            attribution_verbs: Vec::new(),
            action_verbs: Vec::new(),
            detection_bias: 0.0,
            enable_scene_roster: true,
            scene_roster_ttl: 5,
            roster_bonus: 10.0,
            aliases: HashMap::new(),
            fuzzy_tolerance: ToleranceSetting::default(),
        }
    }
}

impl Profile {
    /// Name patterns with the ignore list applied
    pub fn name_patterns(&self) -> Vec<String> {
        filter_ignored(&self.patterns, &self.ignore_patterns)
    }

    pub fn verb_lists(&self) -> VerbLists {
        VerbLists {
            attribution: effective_verbs(&self.attribution_verbs, DEFAULT_ATTRIBUTION_VERBS),
            action: effective_verbs(&self.action_verbs, DEFAULT_ACTION_VERBS),
        }
    }

    pub fn enabled_heuristics(&self) -> EnabledHeuristics {
        EnabledHeuristics {
            attribution: self.detect_attribution,
            action: self.detect_action,
            vocative: self.detect_vocative,
            possessive: self.detect_possessive,
            pronoun: self.detect_pronoun,
            general: self.detect_general,
        }
    }

    pub fn thresholds(&self) -> BufferThresholds {
        BufferThresholds {
            max_buffer_chars: self.max_buffer_chars.max(1),
            token_process_threshold: self.token_process_threshold,
        }
    }

    pub fn cooldowns(&self) -> CooldownSettings {
        CooldownSettings {
            global_cooldown_ms: self.global_cooldown_ms,
            per_trigger_cooldown_ms: self.per_trigger_cooldown_ms,
            failed_trigger_cooldown_ms: self.failed_trigger_cooldown_ms,
        }
    }

    /// Canonical spellings the resolver matches against:
    /// literal name patterns plus mapped names, honorifics stripped
    pub fn roster_names(&self) -> Vec<String> {
        let literal = self
            .name_patterns()
            .into_iter()
            .filter_map(|p| PatternEntry::parse(&p))
            .filter(|e| e.flags.is_empty() && !e.raw.starts_with('/'))
            .map(|e| normalize_costume_name(&e.raw));
        let mapped = self.mappings.iter().map(|m| normalize_costume_name(&m.name));

        let mut names: Vec<String> = Vec::new();
        for name in literal.chain(mapped).filter(|n| !n.is_empty()) {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                names.push(name);
            }
        }
        names
    }

    /// Folder mapped to a canonical name (case-insensitive)
    pub fn folder_for(&self, name: &str) -> Option<&str> {
        let key = normalize_costume_name(name);
        self.mappings
            .iter()
            .find(|m| normalize_costume_name(&m.name).eq_ignore_ascii_case(&key))
            .map(|m| m.folder.trim())
            .filter(|f| !f.is_empty())
    }
}

/// Top-level settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub enabled: bool,
    pub active_profile: String,
    pub profiles: IndexMap<String, Profile>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut profiles = IndexMap::new();
        profiles.insert(DEFAULT_PROFILE_NAME.to_string(), Profile::default());
        Self {
            enabled: true,
            active_profile: DEFAULT_PROFILE_NAME.to_string(),
            profiles,
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(json)?;
        debug!(
            "Parsed settings with {} profiles, active {:?}",
            settings.profiles.len(),
            settings.active_profile
        );
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json_str(&json)?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load settings from a JSON file (async version)
    pub async fn load_from_path_async<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let settings = Self::from_json_str(&json)?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))
    }

    pub fn active_profile(&self) -> Result<&Profile, ConfigError> {
        self.profile(&self.active_profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::FuzzyTolerance;

    #[test]
    fn test_defaults_match_host_defaults() {
        let profile = Profile::default();
        assert_eq!(profile.patterns.len(), 4);
        assert_eq!(profile.veto_patterns, vec!["OOC:", "(OOC)"]);
        assert_eq!(profile.global_cooldown_ms, 1200);
        assert_eq!(profile.per_trigger_cooldown_ms, 250);
        assert_eq!(profile.failed_trigger_cooldown_ms, 10_000);
        assert_eq!(profile.max_buffer_chars, 2000);
        assert_eq!(profile.repeat_suppress_ms, 800);
        assert_eq!(profile.token_process_threshold, 60);
        assert!(!profile.detect_general);
        assert_eq!(profile.detection_bias, 0.0);
    }

    #[test]
    fn test_partial_profile_fills_defaults() {
        let json = r#"{
            "activeProfile": "Idols",
            "profiles": {
                "Idols": {
                    "patterns": ["Kotori", "Umi"],
                    "detectionBias": 2,
                    "sceneRosterTTL": 3,
                    "fuzzyTolerance": "auto",
                    "mappings": [{ "name": "Kotori", "folder": "kotori_casual" }]
                }
            }
        }"#;
        let settings = Settings::from_json_str(json).unwrap();
        assert!(settings.enabled);

        let profile = settings.active_profile().unwrap();
        assert_eq!(profile.patterns, vec!["Kotori", "Umi"]);
        assert_eq!(profile.detection_bias, 2.0);
        assert_eq!(profile.scene_roster_ttl, 3);
        assert_eq!(profile.fuzzy_tolerance, ToleranceSetting::Mode(FuzzyTolerance::Auto));
        assert_eq!(profile.global_cooldown_ms, 1200);
        assert_eq!(profile.folder_for("kotori-chan"), Some("kotori_casual"));
        assert_eq!(profile.folder_for("Umi"), None);
    }

    #[test]
    fn test_fuzzy_tolerance_object_form() {
        let json = r#"{ "fuzzyTolerance": { "threshold": 3, "maxScore": 0.3 } }"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        let tolerance = profile.fuzzy_tolerance.resolve();
        assert!(tolerance.enabled);
        assert_eq!(tolerance.low_confidence_threshold, Some(3));
        assert_eq!(tolerance.max_score, 0.3);

        let profile: Profile = serde_json::from_str(r#"{ "fuzzyTolerance": 1 }"#).unwrap();
        assert_eq!(profile.fuzzy_tolerance, ToleranceSetting::Threshold(1.0));
    }

    #[test]
    fn test_unknown_profile() {
        let settings = Settings {
            active_profile: "Missing".into(),
            ..Default::default()
        };
        assert!(matches!(settings.active_profile(), Err(ConfigError::UnknownProfile(name)) if name == "Missing"));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(Settings::from_json_str("{ not json"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_name_patterns_apply_ignore_list() {
        let profile = Profile {
            patterns: vec!["Kotori".into(), "Umi".into(), "Honoka".into()],
            ignore_patterns: vec!["umi".into()],
            ..Default::default()
        };
        assert_eq!(profile.name_patterns(), vec!["Kotori", "Honoka"]);
    }

    #[test]
    fn test_roster_names_skip_regex_entries() {
        let profile = Profile {
            patterns: vec!["Kotori-san".into(), "/Umi|Sonoda/i".into(), "Honoka".into()],
            mappings: vec![
                Mapping {
                    name: "Nozomi".into(),
                    folder: "nozomi".into(),
                },
                Mapping {
                    name: "kotori".into(),
                    folder: "kotori".into(),
                },
            ],
            ..Default::default()
        };
        assert_eq!(profile.roster_names(), vec!["Kotori", "Honoka", "Nozomi"]);
    }

    #[test]
    fn test_empty_verb_lists_use_defaults() {
        let verbs = Profile::default().verb_lists();
        assert_eq!(verbs.attribution.len(), DEFAULT_ATTRIBUTION_VERBS.len());
        assert_eq!(verbs.action.len(), DEFAULT_ACTION_VERBS.len());

        let custom = Profile {
            action_verbs: vec!["danced".into()],
            ..Default::default()
        };
        assert_eq!(custom.verb_lists().action, vec!["danced"]);
    }
}
