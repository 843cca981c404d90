use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{Pitch, Result, TrainerError};

/// Pitch range targets are drawn from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Naturals F3..E4 around middle C.
    Easy,
    /// Every chromatic pitch from C1 to B4.
    #[default]
    Full,
}

impl Difficulty {
    pub fn pool(self) -> Vec<Pitch> {
        match self {
            Difficulty::Easy => [(5, 3), (7, 3), (9, 3), (11, 3), (0, 4), (2, 4), (4, 4)]
                .into_iter()
                .filter_map(|(class, octave)| Pitch::new(class, octave).ok())
                .collect(),
            Difficulty::Full => (1..=4)
                .flat_map(|octave| {
                    (0..12).filter_map(move |class| Pitch::new(class, octave).ok())
                })
                .collect(),
        }
    }
}

/// How many pitches a target asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arity {
    #[default]
    Single,
    Pair,
}

/// What the learner must currently play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Single(Pitch),
    /// Two distinct pitches, order-independent. Build through [`Target::chord`].
    Chord([Pitch; 2]),
}

impl Target {
    pub fn single(pitch: Pitch) -> Self {
        Target::Single(pitch)
    }

    /// Builds a two-note target. The pitches are stored sorted so that
    /// `{C4, E4}` and `{E4, C4}` compare equal.
    pub fn chord(a: Pitch, b: Pitch) -> Result<Self> {
        if a == b {
            return Err(TrainerError::msg(format!(
                "a chord needs two distinct pitches, got {a} twice"
            )));
        }
        Ok(Target::Chord([a.min(b), a.max(b)]))
    }

    pub fn pitches(&self) -> &[Pitch] {
        match self {
            Target::Single(pitch) => std::slice::from_ref(pitch),
            Target::Chord(pitches) => pitches,
        }
    }

    pub fn contains(&self, pitch: Pitch) -> bool {
        self.pitches().contains(&pitch)
    }

    pub fn is_chord(&self) -> bool {
        matches!(self, Target::Chord(_))
    }

    pub fn display_name(&self, octave_shift: i8) -> String {
        self.pitches()
            .iter()
            .map(|pitch| pitch.display_name(octave_shift))
            .collect::<Vec<_>>()
            .join(" + ")
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name(0))
    }
}

/// Source of new targets. Implementations must not depend on judgment state.
pub trait TargetGenerator {
    fn next(&mut self, difficulty: Difficulty, arity: Arity) -> Target;
}

/// Uniform random targets from the difficulty's pool.
#[derive(Debug, Clone)]
pub struct RandomTargets {
    rng: StdRng,
}

impl RandomTargets {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomTargets {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetGenerator for RandomTargets {
    fn next(&mut self, difficulty: Difficulty, arity: Arity) -> Target {
        let pool = difficulty.pool();
        let first = self.rng.gen_range(0..pool.len());
        match arity {
            Arity::Single => Target::Single(pool[first]),
            Arity::Pair => {
                // Draw from the pool minus `first` so both pitches differ.
                let mut second = self.rng.gen_range(0..pool.len() - 1);
                if second >= first {
                    second += 1;
                }
                let (a, b) = (pool[first], pool[second]);
                Target::Chord([a.min(b), a.max(b)])
            }
        }
    }
}

/// Replays a fixed list of targets, cycling when it runs out.
#[derive(Debug, Clone)]
pub struct ScriptedTargets {
    targets: Vec<Target>,
    next: usize,
}

impl ScriptedTargets {
    pub fn new(targets: Vec<Target>) -> Result<Self> {
        if targets.is_empty() {
            return Err(TrainerError::msg("scripted targets need at least one entry"));
        }
        Ok(Self { targets, next: 0 })
    }
}

impl TargetGenerator for ScriptedTargets {
    fn next(&mut self, _difficulty: Difficulty, _arity: Arity) -> Target {
        let target = self.targets[self.next % self.targets.len()];
        self.next += 1;
        target
    }
}
