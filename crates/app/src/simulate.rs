use clap::Args;
use rhythm_trainer_core::{
    AccuracySummary, Clock, Judgment, ManualClock, PresentationSink, RandomTargets, Target,
    Trainer, POLL_INTERVAL_SECONDS,
};
use serde::Serialize;

use crate::SessionArgs;

/// How the virtual performer plays.
#[derive(Args, Debug, Clone)]
pub struct PerformerArgs {
    /// Number of metronome beats to play through.
    #[arg(long, default_value_t = 16)]
    beats: u32,
    /// Where the performer lands relative to each beat (negative = early).
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    offset_ms: i32,
    /// Alternating +/- deviation added to the offset.
    #[arg(long, default_value_t = 0)]
    jitter_ms: u32,
    /// Sit out every Nth beat.
    #[arg(long)]
    skip_every: Option<u32>,
}

#[derive(Debug, Default, Serialize)]
struct SimulationReport {
    beats: u32,
    score: u32,
    missed: u32,
    early: u32,
    late: u32,
    accuracy: AccuracySummary,
}

#[derive(Debug, Default)]
struct Tally {
    beats: u32,
    missed: u32,
    early: u32,
    late: u32,
}

impl PresentationSink for Tally {
    fn on_main_beat(&mut self, _accented: bool) {
        self.beats += 1;
    }

    fn on_judgment(&mut self, judgment: &Judgment) {
        match judgment {
            Judgment::Early { .. } => self.early += 1,
            Judgment::Late { .. } => self.late += 1,
            _ => {}
        }
    }

    fn on_missed_beat(&mut self) {
        self.missed += 1;
    }
}

/// Plays a whole session offline on a hand-driven clock and prints the
/// outcome as JSON.
pub fn run(settings: &SessionArgs, performer: &PerformerArgs) -> rhythm_trainer_core::Result<()> {
    let mut config = settings.resolve()?;
    config.rhythm_enabled = true;

    let clock = ManualClock::new();
    let targets = match settings.seed {
        Some(_) => settings.targets(),
        None => RandomTargets::seeded(1),
    };
    let mut trainer = Trainer::new(config, clock.clone(), targets, Tally::default());
    trainer.start();

    // The synchronous first beat is already counted by the sink.
    let mut seen_beat = f64::NEG_INFINITY;
    let mut planned: Option<(f64, Target)> = None;

    while trainer.sink().beats <= performer.beats {
        let beat_time = trainer.judge().state().last_main_beat_time;
        if beat_time > seen_beat {
            seen_beat = beat_time;
            let beat = trainer.sink().beats;
            let skip = performer
                .skip_every
                .is_some_and(|every| every > 0 && beat % every == 0);
            planned = match trainer.target() {
                Some(target) if !skip => {
                    Some((beat_time + performer.deviation(beat), *target))
                }
                _ => None,
            };
        }

        // An attempt stamped before "now" models input that was waiting to be
        // processed while the metronome moved on.
        if let Some((stamp, target)) = planned {
            if stamp <= clock.now() {
                planned = None;
                for pitch in target.pitches() {
                    trainer.attempt_at(*pitch, stamp);
                }
            }
        }

        clock.advance(POLL_INTERVAL_SECONDS);
        trainer.poll();
    }
    trainer.stop();

    let tally = trainer.sink();
    let report = SimulationReport {
        beats: performer.beats,
        score: trainer.score(),
        missed: tally.missed,
        early: tally.early,
        late: tally.late,
        accuracy: trainer.accuracy().summary(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

impl PerformerArgs {
    /// Offset from the beat in seconds for the `beat`-th beat.
    fn deviation(&self, beat: u32) -> f64 {
        let jitter = i64::from(self.jitter_ms);
        let jitter = if beat % 2 == 0 { jitter } else { -jitter };
        (i64::from(self.offset_ms) + jitter) as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deviation_alternates_around_offset() {
        let performer = PerformerArgs {
            beats: 4,
            offset_ms: 20,
            jitter_ms: 5,
            skip_every: None,
        };
        assert!((performer.deviation(0) - 0.025).abs() < 1e-12);
        assert!((performer.deviation(1) - 0.015).abs() < 1e-12);
    }
}
