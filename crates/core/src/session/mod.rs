//! The drill's main loop: wires the clock, scheduler, judge, target source,
//! accuracy buffer and presentation together.
//!
//! Everything runs on the caller's thread. [`Trainer::poll`] is the periodic
//! tick and attempts are processed between polls, which is the interleaving
//! the judge is built to resolve.

use crate::{
    AccuracyRecorder, AppConfig, BeatHandler, BeatScheduler, Clock, JudgeMode, Judgment, Level,
    Pitch, RhythmJudge, ScheduledEvent, Target, TargetGenerator, TempoConfig, ToleranceWindow,
};

/// Fire-and-forget notifications for whatever renders the drill.
pub trait PresentationSink {
    fn on_main_beat(&mut self, accented: bool) {
        let _ = accented;
    }

    fn on_subdivision(&mut self) {}

    fn on_target_changed(&mut self, target: &Target) {
        let _ = target;
    }

    fn on_judgment(&mut self, judgment: &Judgment) {
        let _ = judgment;
    }

    /// The beat that just ended was never scored.
    fn on_missed_beat(&mut self) {}
}

#[derive(Debug)]
pub struct Trainer<C: Clock + Clone, G: TargetGenerator, S: PresentationSink> {
    config: AppConfig,
    clock: C,
    scheduler: BeatScheduler<C>,
    judge: RhythmJudge,
    targets: G,
    accuracy: AccuracyRecorder,
    sink: S,
    pending_refresh: Option<f64>,
}

impl<C, G, S> Trainer<C, G, S>
where
    C: Clock + Clone,
    G: TargetGenerator,
    S: PresentationSink,
{
    pub fn new(config: AppConfig, clock: C, targets: G, sink: S) -> Self {
        Self {
            judge: RhythmJudge::new(config.judge.tolerance_window_ms),
            accuracy: AccuracyRecorder::new(config.accuracy_capacity),
            scheduler: BeatScheduler::new(clock.clone()),
            config,
            clock,
            targets,
            sink,
            pending_refresh: None,
        }
    }

    /// Puts up the first target, starting the metronome if the configuration
    /// asks for rhythm mode.
    pub fn start(&mut self) {
        if self.config.rhythm_enabled {
            self.enable_rhythm();
        } else {
            self.assign_next_target();
        }
    }

    /// Plays the accented first beat right now with a fresh target, then
    /// hands the following beats to the scheduler.
    pub fn enable_rhythm(&mut self) {
        self.scheduler.stop();
        self.pending_refresh = None;
        self.config.rhythm_enabled = true;
        self.judge.set_mode(JudgeMode::Rhythm);

        let now = self.clock.now();
        let target = self.next_target();
        self.judge.on_main_beat(now, target);
        self.sink.on_main_beat(true);
        self.sink.on_target_changed(&target);

        self.scheduler.start(self.config.tempo);
        tracing::info!(bpm = self.config.tempo.bpm(), "rhythm mode enabled");
    }

    pub fn disable_rhythm(&mut self) {
        self.scheduler.stop();
        self.pending_refresh = None;
        self.config.rhythm_enabled = false;
        self.judge.set_mode(JudgeMode::Free);
        self.assign_next_target();
        tracing::info!("rhythm mode disabled");
    }

    /// Tempo or meter changes restart the metronome from a fresh bar.
    pub fn set_tempo(&mut self, tempo: TempoConfig) {
        self.config.tempo = tempo;
        if self.config.rhythm_enabled {
            self.enable_rhythm();
        }
    }

    pub fn set_tolerance(&mut self, window: ToleranceWindow) {
        self.config.judge.tolerance_window_ms = window;
        self.judge.set_tolerance(window);
    }

    /// Free mode switches target immediately; rhythm mode picks the new level
    /// up on the next beat.
    pub fn set_level(&mut self, level: Level) {
        self.config.level = level;
        self.judge.clear_progress();
        if !self.config.rhythm_enabled {
            self.assign_next_target();
        }
    }

    /// Skips to a new target. Only honoured in free mode, where no beat
    /// drives the targets.
    pub fn new_target(&mut self) -> bool {
        if self.config.rhythm_enabled {
            return false;
        }
        self.pending_refresh = None;
        self.assign_next_target();
        true
    }

    /// Judges `pitch` stamped with the current clock time.
    pub fn attempt(&mut self, pitch: Pitch) -> Judgment {
        let now = self.clock.now();
        self.attempt_at(pitch, now)
    }

    /// Judges `pitch` stamped at `time` by the input layer.
    pub fn attempt_at(&mut self, pitch: Pitch, time: f64) -> Judgment {
        let judgment = self.judge.on_attempt(pitch, time);
        if let Judgment::Correct { offset_ms } = judgment {
            if let Some(offset_ms) = offset_ms {
                self.accuracy.record(offset_ms);
            }
            self.pending_refresh = Some(self.clock.now() + self.config.advance_delay_seconds());
        }
        tracing::debug!(%pitch, time, ?judgment, "attempt judged");
        self.sink.on_judgment(&judgment);
        judgment
    }

    /// The periodic tick. Delivers due metronome events, then any pending
    /// post-success target refresh. Returns the number of metronome events.
    pub fn poll(&mut self) -> usize {
        let mut beats = BeatDispatch {
            judge: &mut self.judge,
            targets: &mut self.targets,
            sink: &mut self.sink,
            level: self.config.level,
            pending_refresh: &mut self.pending_refresh,
        };
        let delivered = self.scheduler.poll_with(&mut beats);

        if let Some(due) = self.pending_refresh {
            if due <= self.clock.now() {
                self.pending_refresh = None;
                self.assign_next_target();
            }
        }
        delivered
    }

    /// Halts the metronome and drops any pending refresh.
    pub fn stop(&mut self) {
        self.scheduler.stop();
        self.pending_refresh = None;
    }

    pub fn score(&self) -> u32 {
        self.judge.score()
    }

    pub fn target(&self) -> Option<&Target> {
        self.judge.target()
    }

    pub fn accuracy(&self) -> &AccuracyRecorder {
        &self.accuracy
    }

    pub fn reset_accuracy(&mut self) {
        self.accuracy.clear();
    }

    pub fn is_rhythm_enabled(&self) -> bool {
        self.config.rhythm_enabled
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn judge(&self) -> &RhythmJudge {
        &self.judge
    }

    pub fn scheduler(&self) -> &BeatScheduler<C> {
        &self.scheduler
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn next_target(&mut self) -> Target {
        let Level { difficulty, arity } = self.config.level;
        self.targets.next(difficulty, arity)
    }

    fn assign_next_target(&mut self) {
        let target = self.next_target();
        self.judge.assign_target(target);
        self.sink.on_target_changed(&target);
    }
}

/// Routes metronome deliveries into the judge and the presentation layer.
struct BeatDispatch<'a, G, S> {
    judge: &'a mut RhythmJudge,
    targets: &'a mut G,
    sink: &'a mut S,
    level: Level,
    pending_refresh: &'a mut Option<f64>,
}

impl<G: TargetGenerator, S: PresentationSink> BeatDispatch<'_, G, S> {
    fn beat(&mut self, event: &ScheduledEvent) {
        // The beat's own target supersedes a refresh still waiting.
        *self.pending_refresh = None;
        let target = self.targets.next(self.level.difficulty, self.level.arity);
        let missed = self.judge.on_main_beat(event.time_seconds, target);
        if missed {
            tracing::info!(beat = event.bar_position, "missed beat");
            self.sink.on_missed_beat();
        }
        self.sink.on_main_beat(event.is_accented());
        self.sink.on_target_changed(&target);
    }
}

impl<G: TargetGenerator, S: PresentationSink> BeatHandler for BeatDispatch<'_, G, S> {
    fn on_main_beat(&mut self, event: &ScheduledEvent) {
        self.beat(event);
    }

    fn on_off_beat(&mut self, event: &ScheduledEvent) {
        self.beat(event);
    }

    fn on_subdivision(&mut self, _event: &ScheduledEvent) {
        self.sink.on_subdivision();
    }
}
