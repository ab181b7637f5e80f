// WHY: Compiles user-supplied name/verb/veto lists into one immutable set of heuristic regexes
// Uses regex-automata meta regexes so hostile patterns cannot trigger catastrophic backtracking

use regex_automata::meta::Regex;
use regex_automata::util::syntax;
use tracing::{debug, info};

use super::verbs::{verb_alternation, PRONOUNS};
use crate::error::{PatternCompileError, PatternList};

/// Maximum number of entries in one pattern list
pub const MAX_PATTERN_ENTRIES: usize = 250;
/// Maximum summed body length of one pattern list
pub const MAX_PATTERN_BODY_CHARS: usize = 4000;
/// Upper bound on compiled NFA size per heuristic
const NFA_SIZE_LIMIT: usize = 8 * (1 << 20);
/// Flags accepted in `/body/flags` entries
const ALLOWED_FLAGS: &str = "gimsuy";

// Compositional pattern components
/// Up to three capitalized words between a name and its verb (middle names, titles)
const OPTIONAL_MIDDLE_NAMES: &str = r"(?-i:\s+\p{Lu}\p{Ll}+){0,3}";
const QUOTE_CHARS: &str = "[\"\u{201C}\u{201D}]";
const POSSESSIVE_SUFFIX: &str = "['\u{2019}`]s";
const WORD: &str = r"[\p{L}'\u{2019}]+";

/// Regex flags that survive from JS-style pattern entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternFlags {
    pub multi_line: bool,
    pub dot_matches_new_line: bool,
}

impl PatternFlags {
    fn union(self, other: PatternFlags) -> PatternFlags {
        PatternFlags {
            multi_line: self.multi_line || other.multi_line,
            dot_matches_new_line: self.dot_matches_new_line || other.dot_matches_new_line,
        }
    }

    fn syntax_config(self) -> syntax::Config {
        // WHY: case-insensitive matching is mandatory for every heuristic
        syntax::Config::new()
            .case_insensitive(true)
            .multi_line(self.multi_line)
            .dot_matches_new_line(self.dot_matches_new_line)
    }
}

/// One parsed line of a pattern list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternEntry {
    /// Regex source for this entry
    pub body: String,
    /// Flag characters from the `/body/flags` form, deduplicated
    pub flags: String,
    /// Original trimmed line
    pub raw: String,
}

impl PatternEntry {
    /// Parse one line: `/body/flags` is a literal regex, anything else is escaped text.
    /// Blank lines yield None.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some((body, flags)) = split_regex_literal(trimmed) {
            let mut seen = String::new();
            for flag in flags.chars() {
                if !seen.contains(flag) {
                    seen.push(flag);
                }
            }
            return Some(Self {
                body: body.to_string(),
                flags: seen,
                raw: trimmed.to_string(),
            });
        }

        Some(Self {
            body: escape_regex(trimmed),
            flags: String::new(),
            raw: trimmed.to_string(),
        })
    }

    pub fn pattern_flags(&self) -> PatternFlags {
        PatternFlags {
            multi_line: self.flags.contains('m'),
            dot_matches_new_line: self.flags.contains('s'),
        }
    }
}

/// Split `/body/flags` into its parts; None when the line is not a regex literal
fn split_regex_literal(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('/')?;
    let closing = rest.rfind('/')?;
    let (body, flags) = (&rest[..closing], &rest[closing + 1..]);

    if body.is_empty() || !flags.chars().all(|c| ALLOWED_FLAGS.contains(c)) {
        return None;
    }

    // Body may only contain escaped slashes
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                chars.next()?;
            }
            '/' => return None,
            _ => {}
        }
    }

    Some((body, flags))
}

/// Escape regex metacharacters so a line matches literally
pub fn escape_regex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        if matches!(
            ch,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '#' | '&' | '-' | '~'
        ) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Parse every non-blank line of a list
pub fn parse_entries<S: AsRef<str>>(lines: &[S]) -> Vec<PatternEntry> {
    lines.iter().filter_map(|l| PatternEntry::parse(l.as_ref())).collect()
}

/// Drop names that appear in the ignore list (trimmed, case-insensitive)
pub fn filter_ignored(patterns: &[String], ignore: &[String]) -> Vec<String> {
    let ignored: Vec<String> = ignore.iter().map(|p| p.trim().to_lowercase()).collect();
    patterns
        .iter()
        .filter(|p| !ignored.contains(&p.trim().to_lowercase()))
        .cloned()
        .collect()
}

/// Verb vocabularies the compiler splices into attribution/action heuristics
#[derive(Debug, Clone, Default)]
pub struct VerbLists {
    pub attribution: Vec<String>,
    pub action: Vec<String>,
}

/// Immutable bundle of compiled heuristics, replaced wholesale on reconfiguration
#[derive(Debug, Clone, Default)]
pub struct CompiledHeuristicSet {
    pub speaker: Option<Regex>,
    /// Post-quote, pre-quote and voice attribution merged into one alternation
    pub attribution: Option<Regex>,
    pub action: Option<Regex>,
    pub vocative: Option<Regex>,
    pub possessive: Option<Regex>,
    pub pronoun: Option<Regex>,
    pub general_name: Option<Regex>,
    pub veto: Option<Regex>,
}

impl CompiledHeuristicSet {
    /// True when the veto heuristic matches anywhere in the text
    pub fn is_vetoed(&self, text: &str) -> bool {
        self.veto.as_ref().is_some_and(|re| re.is_match(text))
    }

    /// Number of heuristics that compiled to a regex
    pub fn heuristic_count(&self) -> usize {
        [
            &self.speaker,
            &self.attribution,
            &self.action,
            &self.vocative,
            &self.possessive,
            &self.pronoun,
            &self.general_name,
            &self.veto,
        ]
        .iter()
        .filter(|r| r.is_some())
        .count()
    }
}

/// Complexity ceiling applied to each pattern list
#[derive(Debug, Clone, Copy)]
pub struct ComplexityLimits {
    pub max_entries: usize,
    pub max_total_body_chars: usize,
}

impl Default for ComplexityLimits {
    fn default() -> Self {
        Self {
            max_entries: MAX_PATTERN_ENTRIES,
            max_total_body_chars: MAX_PATTERN_BODY_CHARS,
        }
    }
}

/// Builds a `CompiledHeuristicSet` from raw configuration lists
#[derive(Debug, Clone, Default)]
pub struct PatternCompiler {
    limits: ComplexityLimits,
}

impl PatternCompiler {
    pub fn new(limits: ComplexityLimits) -> Self {
        Self { limits }
    }

    /// Compile name patterns, verb lists and veto patterns into a heuristic set
    pub fn compile<S: AsRef<str>, V: AsRef<str>>(
        &self,
        patterns: &[S],
        verbs: &VerbLists,
        veto_patterns: &[V],
    ) -> Result<CompiledHeuristicSet, PatternCompileError> {
        let names = parse_entries(patterns);
        let vetoes = parse_entries(veto_patterns);

        self.check_complexity(PatternList::Names, &names)?;
        self.check_complexity(PatternList::Veto, &vetoes)?;
        validate_entries(PatternList::Names, &names)?;
        validate_entries(PatternList::Veto, &vetoes)?;

        let attribution_verbs = verb_alternation(&verbs.attribution);
        let action_verbs = verb_alternation(&verbs.action);

        let mut set = CompiledHeuristicSet {
            veto: build_heuristic(PatternList::Veto, &vetoes, |alt| alt.to_string())?,
            ..Default::default()
        };

        if let Some(av) = action_verbs.as_deref() {
            let pronouns = PRONOUNS.join("|");
            let body = format!(r"\b({pronouns})\b(?:\s+{WORD}){{0,2}}?\s+{av}\b");
            set.pronoun = Some(compile_regex(&body, PatternFlags::default()).map_err(|message| {
                PatternCompileError::Combined {
                    list: PatternList::Names,
                    message,
                }
            })?);
        }

        if names.is_empty() {
            info!("No name patterns configured; only veto and pronoun heuristics compiled");
            return Ok(set);
        }

        set.speaker = build_heuristic(PatternList::Names, &names, |n| {
            format!(r"(?:^|\n)\s*({n})\s*[:;,]")
        })?;

        set.vocative = build_heuristic(PatternList::Names, &names, |n| {
            format!("(?:^|[\"\u{201C}'\\s])({n})[,.!?]")
        })?;

        set.possessive = build_heuristic(PatternList::Names, &names, |n| {
            format!(r"\b({n}){POSSESSIVE_SUFFIX}\b")
        })?;

        set.general_name = build_heuristic(PatternList::Names, &names, |n| format!(r"\b({n})\b"))?;

        if let Some(av) = attribution_verbs.as_deref() {
            set.attribution = build_heuristic(PatternList::Names, &names, |n| {
                let post_quote = format!(
                    "{QUOTE_CHARS}[^\"\u{201C}\u{201D}]{{0,400}}{QUOTE_CHARS}\\s*,?\\s*({n}){OPTIONAL_MIDDLE_NAMES}\\s+{av}\\b"
                );
                let pre_quote = format!(r"\b({n}){OPTIONAL_MIDDLE_NAMES}\s+{av}\s*[:,]?\s*{QUOTE_CHARS}");
                let voice = format!(
                    r"\b({n}){OPTIONAL_MIDDLE_NAMES}{POSSESSIVE_SUFFIX}\s+(?:{WORD}\s+){{0,3}}?voice\b"
                );
                format!("(?:{post_quote})|(?:{pre_quote})|(?:{voice})")
            })?;
        }

        if let Some(xv) = action_verbs.as_deref() {
            set.action = build_heuristic(PatternList::Names, &names, |n| {
                format!(r"\b({n}){OPTIONAL_MIDDLE_NAMES}\b(?:\s+{WORD}){{0,4}}?\s+{xv}\b")
            })?;
        }

        debug!(
            "Compiled {} heuristics from {} name and {} veto entries",
            set.heuristic_count(),
            names.len(),
            vetoes.len()
        );
        Ok(set)
    }

    fn check_complexity(&self, list: PatternList, entries: &[PatternEntry]) -> Result<(), PatternCompileError> {
        let total_len: usize = entries.iter().map(|e| e.body.len()).sum();
        if entries.len() > self.limits.max_entries || total_len > self.limits.max_total_body_chars {
            return Err(PatternCompileError::TooComplex {
                list,
                entries: entries.len(),
                total_len,
            });
        }
        Ok(())
    }
}

/// Parse each entry on its own so one bad body is reported instead of corrupting the alternation
fn validate_entries(list: PatternList, entries: &[PatternEntry]) -> Result<(), PatternCompileError> {
    for (i, entry) in entries.iter().enumerate() {
        if let Err(err) = syntax::parse_with(&entry.body, &entry.pattern_flags().syntax_config()) {
            return Err(PatternCompileError::InvalidEntry {
                list,
                position: i + 1,
                raw: entry.raw.clone(),
                message: err.to_string(),
            });
        }
    }
    Ok(())
}

/// Wrap every entry in a non-capturing group, join, splice into the template and compile
fn build_heuristic<F>(list: PatternList, entries: &[PatternEntry], template: F) -> Result<Option<Regex>, PatternCompileError>
where
    F: Fn(&str) -> String,
{
    if entries.is_empty() {
        return Ok(None);
    }

    let alternation = entries
        .iter()
        .map(|e| format!("(?:{})", e.body))
        .collect::<Vec<_>>()
        .join("|");
    let flags = entries
        .iter()
        .fold(PatternFlags::default(), |acc, e| acc.union(e.pattern_flags()));

    let pattern = template(&alternation);
    match compile_regex(&pattern, flags) {
        Ok(regex) => Ok(Some(regex)),
        Err(message) => Err(diagnose_combined_failure(list, entries, message)),
    }
}

/// Re-test entries individually to name the one that broke the combined regex
fn diagnose_combined_failure(list: PatternList, entries: &[PatternEntry], combined_message: String) -> PatternCompileError {
    for (i, entry) in entries.iter().enumerate() {
        if let Err(message) = compile_regex(&entry.body, entry.pattern_flags()) {
            return PatternCompileError::InvalidEntry {
                list,
                position: i + 1,
                raw: entry.raw.clone(),
                message,
            };
        }
    }
    PatternCompileError::Combined {
        list,
        message: combined_message,
    }
}

fn compile_regex(pattern: &str, flags: PatternFlags) -> Result<Regex, String> {
    Regex::builder()
        .configure(Regex::config().nfa_size_limit(Some(NFA_SIZE_LIMIT)))
        .syntax(flags.syntax_config())
        .build(pattern)
        .map_err(|e| e.to_string())
}
