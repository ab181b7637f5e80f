// Integration test utilities and common code
// WHY: Centralized utilities avoid duplication across integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use castcue::{Engine, ManualClock, Profile, RecordingSink, SwitchDecision, TurnKey};

/// Start time for every manual clock; far from zero so cooldown maps never see t=0
pub const START_MS: u64 = 1_000_000;

/// Temporary directory holding settings and text files
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub root_path: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root_path = temp_dir.path().to_path_buf();
        Self { temp_dir, root_path }
    }

    /// Write a file relative to the fixture root
    pub fn create_file<P: AsRef<Path>>(&self, relative_path: P, content: &str) -> PathBuf {
        let file_path = self.root_path.join(relative_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&file_path, content).expect("Failed to write test file");
        file_path
    }
}

/// Profile with the given names and everything else at defaults
pub fn profile_with(names: &[&str]) -> Profile {
    Profile {
        patterns: names.iter().map(|n| n.to_string()).collect(),
        ..Default::default()
    }
}

/// Engine driven by a manual clock plus a recording sink
pub struct EngineHarness {
    pub engine: Engine<ManualClock>,
    pub clock: ManualClock,
    pub sink: RecordingSink,
}

impl EngineHarness {
    pub fn new(profile: Profile) -> Self {
        Self::with_sink(profile, RecordingSink::new())
    }

    pub fn with_sink(profile: Profile, sink: RecordingSink) -> Self {
        let clock = ManualClock::new(START_MS);
        let engine = Engine::with_clock(profile, clock.clone()).expect("Profile should compile");
        Self { engine, clock, sink }
    }

    pub fn start(&mut self, key: &TurnKey) {
        self.engine.on_turn_start(key.clone());
    }

    pub fn token(&mut self, key: &TurnKey, text: &str) -> Option<SwitchDecision> {
        self.engine.on_token(key, text, &mut self.sink)
    }

    /// Run a whole turn: start, feed every token, end
    pub fn turn(&mut self, key: &TurnKey, tokens: &[&str]) -> Vec<SwitchDecision> {
        self.start(key);
        let decisions = tokens.iter().filter_map(|t| self.token(key, t)).collect();
        self.engine.on_turn_end(key);
        decisions
    }

    pub fn advance(&self, ms: u64) {
        self.clock.advance(ms);
    }
}
