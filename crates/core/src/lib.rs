//! Core library for the Rhythm Trainer sight-reading drill.
//!
//! The drill shows a note or two-note chord and judges what the learner
//! plays. In rhythm mode a look-ahead metronome drives the targets and an
//! attempt only scores when it lands within the tolerance window around the
//! most recent beat. Each module owns one piece: the clock, the beat grid, the
//! judge, the target source, the accuracy buffer, and the session loop that
//! ties them together.

pub mod clock;
pub mod config;
pub mod error;
pub mod judge;
pub mod pitch;
pub mod record;
pub mod session;
pub mod target;
pub mod timeline;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{AppConfig, JudgeConfig, Level, OctaveLabels, TempoConfig, ToleranceWindow};
pub use error::{Result, TrainerError};
pub use judge::{BeatCycle, JudgeMode, JudgeState, Judgment, RhythmJudge};
pub use pitch::{Pitch, QwertyLayout};
pub use record::{AccuracyRecorder, AccuracySummary};
pub use session::{PresentationSink, Trainer};
pub use target::{Arity, Difficulty, RandomTargets, ScriptedTargets, Target, TargetGenerator};
pub use timeline::{
    BeatHandler, BeatScheduler, EventKind, ScheduledEvent, SchedulerState, LOOKAHEAD_SECONDS,
    POLL_INTERVAL_SECONDS,
};
