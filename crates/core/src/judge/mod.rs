//! Per-beat rhythm judgment.
//!
//! Attempts are checked against a fixed list of rules, first match wins:
//!
//! 1. pitch not part of the target: [`Judgment::Wrong`]
//! 2. chord not yet complete: [`Judgment::Partial`]
//! 3. free mode: [`Judgment::Correct`]
//! 4. outside the tolerance window: [`Judgment::Early`] / [`Judgment::Late`]
//! 5. first on-time success this beat: [`Judgment::Correct`] with an offset
//! 6. already scored this beat: [`Judgment::AlreadyScored`]

use serde::Serialize;

use crate::{Pitch, Target, ToleranceWindow};

/// Slack at the window edges for floating-point representation error.
const EDGE_EPSILON_SECONDS: f64 = 1e-9;

/// Whether the learner is playing against the metronome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JudgeMode {
    Free,
    Rhythm,
}

/// Where the current beat cycle stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BeatCycle {
    /// No beat has been played yet (free mode, or rhythm mode before its
    /// first beat).
    Idle,
    AwaitingInput,
    Scored,
}

/// Outcome of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Judgment {
    /// The pitch is not (part of) the target.
    Wrong { expected: Target },
    /// Part of the chord is in; `remaining` still has to be played.
    Partial { remaining: Vec<Pitch> },
    /// Scored. `offset_ms` is set in rhythm mode, positive means late.
    Correct { offset_ms: Option<i32> },
    /// Right notes, before the window opened.
    Early { offset_ms: i32 },
    /// Right notes, after the window closed.
    Late { offset_ms: i32 },
    /// Right notes on time, but this beat was already scored.
    AlreadyScored,
    /// No target has been assigned yet.
    NoTarget,
}

impl Judgment {
    pub fn is_scored(&self) -> bool {
        matches!(self, Judgment::Correct { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JudgeState {
    pub last_main_beat_time: f64,
    pub tolerance_window: ToleranceWindow,
    pub cycle: BeatCycle,
}

impl JudgeState {
    pub fn has_scored_this_beat(&self) -> bool {
        self.cycle == BeatCycle::Scored
    }
}

/// Judges attempts against the current target and the most recent beat.
///
/// The target and the chord progress are replaced together, so an attempt is
/// always judged against one complete target.
#[derive(Debug, Clone)]
pub struct RhythmJudge {
    mode: JudgeMode,
    state: JudgeState,
    target: Option<Target>,
    chord_hits: Vec<Pitch>,
    score: u32,
}

impl RhythmJudge {
    pub fn new(tolerance_window: ToleranceWindow) -> Self {
        Self {
            mode: JudgeMode::Free,
            state: JudgeState {
                last_main_beat_time: 0.0,
                tolerance_window,
                cycle: BeatCycle::Idle,
            },
            target: None,
            chord_hits: Vec::with_capacity(2),
            score: 0,
        }
    }

    pub fn mode(&self) -> JudgeMode {
        self.mode
    }

    pub fn state(&self) -> &JudgeState {
        &self.state
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn chord_progress(&self) -> &[Pitch] {
        &self.chord_hits
    }

    pub fn set_tolerance(&mut self, window: ToleranceWindow) {
        self.state.tolerance_window = window;
    }

    /// Switches between free and rhythm judging. Either way the next beat
    /// starts a fresh cycle without reporting a miss.
    pub fn set_mode(&mut self, mode: JudgeMode) {
        self.mode = mode;
        self.state.cycle = BeatCycle::Idle;
    }

    /// Swaps in a new target and drops any chord progress.
    pub fn assign_target(&mut self, target: Target) {
        self.target = Some(target);
        self.chord_hits.clear();
    }

    /// Forgets chord progress without changing the target.
    pub fn clear_progress(&mut self) {
        self.chord_hits.clear();
    }

    /// Starts a new beat cycle at `beat_time` with a fresh target.
    ///
    /// Returns `true` when the cycle that just ended was never scored.
    pub fn on_main_beat(&mut self, beat_time: f64, target: Target) -> bool {
        let missed = self.state.cycle == BeatCycle::AwaitingInput;
        self.state.cycle = BeatCycle::AwaitingInput;
        self.state.last_main_beat_time = beat_time;
        self.assign_target(target);
        missed
    }

    /// Judges one pitch played at `time` (same clock domain as the beats).
    pub fn on_attempt(&mut self, pitch: Pitch, time: f64) -> Judgment {
        let Some(target) = self.target else {
            return Judgment::NoTarget;
        };

        if !target.contains(pitch) {
            return Judgment::Wrong { expected: target };
        }

        if target.is_chord() {
            if !self.chord_hits.contains(&pitch) {
                self.chord_hits.push(pitch);
            }
            let remaining: Vec<Pitch> = target
                .pitches()
                .iter()
                .copied()
                .filter(|p| !self.chord_hits.contains(p))
                .collect();
            if !remaining.is_empty() {
                return Judgment::Partial { remaining };
            }
            // A completed chord is spent whatever the timing says; the next
            // attempt has to play both notes again.
            self.chord_hits.clear();
        }

        if self.mode == JudgeMode::Free {
            self.score += 1;
            return Judgment::Correct { offset_ms: None };
        }

        let offset = time - self.state.last_main_beat_time;
        let offset_ms = (offset * 1000.0).round() as i32;
        if offset.abs() > self.state.tolerance_window.seconds() + EDGE_EPSILON_SECONDS {
            return if offset < 0.0 {
                Judgment::Early { offset_ms }
            } else {
                Judgment::Late { offset_ms }
            };
        }

        match self.state.cycle {
            BeatCycle::AwaitingInput => {
                self.state.cycle = BeatCycle::Scored;
                self.score += 1;
                Judgment::Correct {
                    offset_ms: Some(offset_ms),
                }
            }
            BeatCycle::Scored => Judgment::AlreadyScored,
            // Rhythm mode before its first beat: there is no window yet.
            BeatCycle::Idle => Judgment::Late { offset_ms },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: f64 = 42.0;

    fn pitch(name: &str) -> Pitch {
        name.parse().unwrap()
    }

    fn single(name: &str) -> Target {
        Target::single(pitch(name))
    }

    fn chord(a: &str, b: &str) -> Target {
        Target::chord(pitch(a), pitch(b)).unwrap()
    }

    fn rhythm_judge(target: Target) -> RhythmJudge {
        let mut judge = RhythmJudge::new(ToleranceWindow::new(120).unwrap());
        judge.set_mode(JudgeMode::Rhythm);
        judge.on_main_beat(T, target);
        judge
    }

    #[test]
    fn on_time_single_note_scores_with_offset() {
        let mut judge = rhythm_judge(single("A4"));
        let judgment = judge.on_attempt(pitch("A4"), T + 0.050);
        assert_eq!(judgment, Judgment::Correct { offset_ms: Some(50) });
        assert_eq!(judge.score(), 1);
        assert!(judge.state().has_scored_this_beat());
    }

    #[test]
    fn outside_window_is_reported_not_scored() {
        let mut judge = rhythm_judge(single("A4"));
        assert_eq!(
            judge.on_attempt(pitch("A4"), T - 0.200),
            Judgment::Early { offset_ms: -200 }
        );
        assert_eq!(
            judge.on_attempt(pitch("A4"), T + 0.121),
            Judgment::Late { offset_ms: 121 }
        );
        assert_eq!(judge.score(), 0);
        assert!(!judge.state().has_scored_this_beat());
    }

    #[test]
    fn window_edges_are_inclusive() {
        let mut judge = rhythm_judge(single("A4"));
        assert_eq!(
            judge.on_attempt(pitch("A4"), T - 0.120),
            Judgment::Correct { offset_ms: Some(-120) }
        );
    }

    #[test]
    fn wrong_pitch_wins_over_timing() {
        let mut judge = rhythm_judge(single("A4"));
        assert_eq!(
            judge.on_attempt(pitch("G4"), T + 0.010),
            Judgment::Wrong { expected: single("A4") }
        );
        assert_eq!(
            judge.on_attempt(pitch("G4"), T + 5.0),
            Judgment::Wrong { expected: single("A4") }
        );
        assert_eq!(judge.score(), 0);
    }

    #[test]
    fn scores_at_most_once_per_beat() {
        let mut judge = rhythm_judge(single("A4"));
        assert!(judge.on_attempt(pitch("A4"), T + 0.010).is_scored());
        assert_eq!(judge.on_attempt(pitch("A4"), T + 0.020), Judgment::AlreadyScored);
        assert_eq!(judge.score(), 1);

        let missed = judge.on_main_beat(T + 0.75, single("B4"));
        assert!(!missed);
        assert!(!judge.state().has_scored_this_beat());
        assert!(judge.on_attempt(pitch("B4"), T + 0.76).is_scored());
        assert_eq!(judge.score(), 2);
    }

    #[test]
    fn reports_missed_beats() {
        let mut judge = RhythmJudge::new(ToleranceWindow::default());
        judge.set_mode(JudgeMode::Rhythm);
        assert!(!judge.on_main_beat(0.0, single("C4")), "first beat has nothing to miss");
        assert!(judge.on_main_beat(0.5, single("D4")));
        assert!(judge.on_attempt(pitch("D4"), 0.52).is_scored());
        assert!(!judge.on_main_beat(1.0, single("E4")));
    }

    #[test]
    fn chord_needs_both_notes() {
        let mut judge = rhythm_judge(chord("C4", "E4"));
        assert_eq!(
            judge.on_attempt(pitch("C4"), T + 0.010),
            Judgment::Partial { remaining: vec![pitch("E4")] }
        );
        assert_eq!(
            judge.on_attempt(pitch("C4"), T + 0.020),
            Judgment::Partial { remaining: vec![pitch("E4")] }
        );
        assert!(!judge.state().has_scored_this_beat());

        assert_eq!(
            judge.on_attempt(pitch("E4"), T + 0.030),
            Judgment::Correct { offset_ms: Some(30) }
        );
        assert_eq!(judge.score(), 1);
        assert_eq!(
            judge.on_attempt(pitch("C4"), T + 0.040),
            Judgment::Partial { remaining: vec![pitch("E4")] }
        );
        assert_eq!(judge.on_attempt(pitch("E4"), T + 0.050), Judgment::AlreadyScored);
        assert_eq!(judge.score(), 1);
    }

    #[test]
    fn early_chord_leaves_no_progress_for_an_on_time_single_note() {
        let mut judge = rhythm_judge(chord("C4", "E4"));
        assert_eq!(
            judge.on_attempt(pitch("C4"), T - 0.300),
            Judgment::Partial { remaining: vec![pitch("E4")] }
        );
        assert_eq!(
            judge.on_attempt(pitch("E4"), T - 0.200),
            Judgment::Early { offset_ms: -200 }
        );
        assert!(judge.chord_progress().is_empty());

        assert_eq!(
            judge.on_attempt(pitch("C4"), T),
            Judgment::Partial { remaining: vec![pitch("E4")] }
        );
        assert_eq!(judge.score(), 0);
        assert!(!judge.state().has_scored_this_beat());
    }

    #[test]
    fn free_mode_chord_scores_once_per_full_chord() {
        let mut judge = RhythmJudge::new(ToleranceWindow::default());
        judge.assign_target(chord("C4", "E4"));
        judge.on_attempt(pitch("C4"), 1.0);
        assert!(judge.on_attempt(pitch("E4"), 1.1).is_scored());

        for _ in 0..3 {
            assert!(matches!(
                judge.on_attempt(pitch("C4"), 1.2),
                Judgment::Partial { .. }
            ));
        }
        assert_eq!(judge.score(), 1);
    }

    #[test]
    fn chord_note_outside_target_is_wrong() {
        let mut judge = rhythm_judge(chord("C4", "E4"));
        judge.on_attempt(pitch("C4"), T);
        assert!(matches!(
            judge.on_attempt(pitch("D4"), T),
            Judgment::Wrong { .. }
        ));
        assert_eq!(judge.chord_progress(), &[pitch("C4")]);
    }

    #[test]
    fn chord_progress_does_not_leak_into_next_target() {
        let mut judge = rhythm_judge(chord("C4", "E4"));
        judge.on_attempt(pitch("C4"), T);

        judge.on_main_beat(T + 0.75, chord("C4", "G4"));
        assert!(judge.chord_progress().is_empty());
        assert_eq!(
            judge.on_attempt(pitch("G4"), T + 0.76),
            Judgment::Partial { remaining: vec![pitch("C4")] }
        );
        assert_eq!(
            judge.on_attempt(pitch("E4"), T + 0.77),
            Judgment::Wrong { expected: chord("C4", "G4") }
        );
    }

    #[test]
    fn free_mode_ignores_timing() {
        let mut judge = RhythmJudge::new(ToleranceWindow::default());
        judge.assign_target(single("F3"));
        assert_eq!(
            judge.on_attempt(pitch("F3"), 1_000.0),
            Judgment::Correct { offset_ms: None }
        );
        assert_eq!(judge.score(), 1);
    }

    #[test]
    fn input_stamped_before_the_latest_beat_is_early_but_scored() {
        // The beat at T was delivered before an attempt stamped 30 ms ahead
        // of it was processed.
        let mut judge = rhythm_judge(single("A4"));
        assert_eq!(
            judge.on_attempt(pitch("A4"), T - 0.030),
            Judgment::Correct { offset_ms: Some(-30) }
        );
    }

    #[test]
    fn no_target_yet() {
        let mut judge = RhythmJudge::new(ToleranceWindow::default());
        assert_eq!(judge.on_attempt(pitch("A4"), 0.0), Judgment::NoTarget);
    }
}
