pub mod analysis;
pub mod attribution;
pub mod clock;
pub mod config;
pub mod cooldown;
pub mod engine;
pub mod error;
pub mod events;
pub mod names;
pub mod sink;
pub mod stream;

// Re-export the engine surface for hosts
pub use engine::{Engine, EngineState};
pub use events::{HostEvent, LifecycleEvent};
pub use sink::{DecisionSink, DecisionTrigger, RecordingSink, SwitchDecision};
pub use clock::{Clock, ManualClock, SystemClock};
pub use stream::TurnKey;

// Re-export configuration and error types
pub use config::{Mapping, Profile, Settings};
pub use error::{ConfigError, EvaluationError, PatternCompileError, PatternList, SwitchExecutionFailure};

// Re-export attribution building blocks for analysis and benchmarking
pub use attribution::{CompiledHeuristicSet, Match, MatchKind, PatternCompiler, ScoredMatch};
pub use analysis::{analyze_text, AnalysisReport};
pub use names::{FuzzyTolerance, NameResolver, Resolution, ResolutionMethod, Tolerance, ToleranceSetting};
