// Error taxonomy for the attribution engine
// WHY: compile errors surface to the settings owner, evaluation errors stop at the turn boundary,
// execution failures feed the failure cooldown

use std::path::PathBuf;
use thiserror::Error;

/// Which configured list a pattern came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternList {
    Names,
    Veto,
}

impl std::fmt::Display for PatternList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternList::Names => write!(f, "name patterns"),
            PatternList::Veto => write!(f, "veto patterns"),
        }
    }
}

/// User pattern could not be turned into a heuristic regex
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatternCompileError {
    /// Entry count or total body length exceeds the complexity ceiling
    #[error("{list}: too many or too long patterns ({entries} entries, {total_len} chars), shorten the list")]
    TooComplex {
        list: PatternList,
        entries: usize,
        total_len: usize,
    },

    /// A single entry is not a valid regex
    #[error("{list}: pattern #{position} failed to compile: \"{raw}\": {message}")]
    InvalidEntry {
        list: PatternList,
        position: usize,
        raw: String,
        message: String,
    },

    /// Every entry compiles alone but the combined heuristic does not
    #[error("{list}: combined pattern failed to compile: {message}")]
    Combined { list: PatternList, message: String },
}

/// Internal fault during one evaluation tick
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("turn state missing for {0}")]
    MissingTurn(String),

    #[error("{kind} match at {index} carried no name")]
    UnnamedMatch { kind: &'static str, index: usize },
}

/// Downstream switch command reported failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("switch to \"{target}\" failed: {reason}")]
pub struct SwitchExecutionFailure {
    pub target: String,
    pub reason: String,
}

impl SwitchExecutionFailure {
    pub fn new(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            reason: reason.into(),
        }
    }
}

/// Settings file could not be used
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("profile \"{0}\" not found")]
    UnknownProfile(String),
}
