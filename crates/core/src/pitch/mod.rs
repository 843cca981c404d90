//! Normalized pitch identifiers and the keyboard-to-pitch mapping used at the
//! input boundary. Malformed names are rejected here and never reach the
//! judge.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Result, TrainerError};

const CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

pub const QWERTY_OCTAVE_RANGE: (u8, u8) = (1, 6);

/// A pitch class plus octave in scientific numbering (C4 = middle C).
///
/// Enharmonic spellings collapse to sharps, so `Db4` and `C#4` are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pitch {
    octave: u8,
    class: u8,
}

impl Pitch {
    /// `class` counts semitones above C (0..12), `octave` is 0..=9.
    pub fn new(class: u8, octave: u8) -> Result<Self> {
        if class >= 12 || octave > 9 {
            return Err(TrainerError::InvalidPitch(format!(
                "class {class}, octave {octave}"
            )));
        }
        Ok(Self { octave, class })
    }

    /// MIDI note number, A4 = 69.
    pub fn midi(&self) -> u8 {
        (self.octave + 1) * 12 + self.class
    }

    pub fn frequency_hz(&self) -> f64 {
        440.0 * 2f64.powf((f64::from(self.midi()) - 69.0) / 12.0)
    }

    /// Name with the octave number shifted for display only, e.g. `-1` for
    /// DAW-style labels.
    pub fn display_name(&self, octave_shift: i8) -> String {
        let octave = i16::from(self.octave) + i16::from(octave_shift);
        format!("{}{}", CLASS_NAMES[usize::from(self.class)], octave)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CLASS_NAMES[usize::from(self.class)], self.octave)
    }
}

impl FromStr for Pitch {
    type Err = TrainerError;

    fn from_str(name: &str) -> Result<Self> {
        let invalid = || TrainerError::InvalidPitch(name.to_string());
        let mut chars = name.trim().chars();

        let letter = chars.next().ok_or_else(invalid)?.to_ascii_uppercase();
        let natural: i8 = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(invalid()),
        };

        let rest = chars.as_str();
        let (accidental, digits) = match rest.chars().next() {
            Some('#') => (1, &rest[1..]),
            Some('b') => (-1, &rest[1..]),
            _ => (0, rest),
        };

        if digits.len() != 1 {
            return Err(invalid());
        }
        let octave = digits
            .chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(invalid)? as i8;

        // Only flats that have a sharp spelling on the same octave are accepted
        // (Db..Bb); Cb and E#-style spellings are not normalized.
        let semitone = natural + accidental;
        if !(0..12).contains(&semitone) || (accidental != 0 && !has_black_key(semitone)) {
            return Err(invalid());
        }

        Pitch::new(semitone as u8, octave as u8).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Pitch {
    type Error = TrainerError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Pitch> for String {
    fn from(pitch: Pitch) -> Self {
        pitch.to_string()
    }
}

fn has_black_key(semitone: i8) -> bool {
    matches!(semitone, 1 | 3 | 6 | 8 | 10)
}

/// Maps the Z row of a QWERTY keyboard onto one octave of piano keys.
///
/// Whites sit on `z x c v b n m`, blacks on `s d g h j`. Holding shift plays
/// one octave above the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QwertyLayout {
    base_octave: u8,
}

impl QwertyLayout {
    pub fn new(base_octave: u8) -> Self {
        let (min, max) = QWERTY_OCTAVE_RANGE;
        Self {
            base_octave: base_octave.clamp(min, max),
        }
    }

    pub fn base_octave(&self) -> u8 {
        self.base_octave
    }

    pub fn octave_up(&mut self) {
        *self = Self::new(self.base_octave.saturating_add(1));
    }

    pub fn octave_down(&mut self) {
        *self = Self::new(self.base_octave.saturating_sub(1));
    }

    pub fn pitch_for_key(&self, key: char, shift: bool) -> Option<Pitch> {
        let class = match key.to_ascii_lowercase() {
            'z' => 0,
            's' => 1,
            'x' => 2,
            'd' => 3,
            'c' => 4,
            'v' => 5,
            'g' => 6,
            'b' => 7,
            'h' => 8,
            'n' => 9,
            'j' => 10,
            'm' => 11,
            _ => return None,
        };
        let octave = self.base_octave + u8::from(shift);
        Pitch::new(class, octave).ok()
    }
}

impl Default for QwertyLayout {
    fn default() -> Self {
        Self::new(3)
    }
}
