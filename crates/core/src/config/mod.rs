use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Arity, Difficulty, Result, TrainerError};

pub const BPM_RANGE: (u32, u32) = (20, 240);
pub const SUBDIVISION_RANGE: (u32, u32) = (1, 4);
pub const BEATS_PER_BAR_RANGE: (u32, u32) = (2, 4);
pub const TOLERANCE_RANGE_MS: (u32, u32) = (20, 500);

/// Tempo and meter driving the beat scheduler.
///
/// Values are always within range: construction either rejects
/// ([`TempoConfig::new`], deserialisation) or clamps ([`TempoConfig::clamped`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTempo", into = "RawTempo")]
pub struct TempoConfig {
    bpm: u32,
    subdivisions_per_beat: u32,
    beats_per_bar: u32,
}

impl TempoConfig {
    pub fn new(bpm: u32, subdivisions_per_beat: u32, beats_per_bar: u32) -> Result<Self> {
        Ok(Self {
            bpm: check("bpm", bpm, BPM_RANGE)?,
            subdivisions_per_beat: check(
                "subdivisions_per_beat",
                subdivisions_per_beat,
                SUBDIVISION_RANGE,
            )?,
            beats_per_bar: check("beats_per_bar", beats_per_bar, BEATS_PER_BAR_RANGE)?,
        })
    }

    /// Clamps every value into its accepted range, the way the settings
    /// controls do.
    pub fn clamped(bpm: u32, subdivisions_per_beat: u32, beats_per_bar: u32) -> Self {
        Self {
            bpm: clamp("bpm", bpm, BPM_RANGE),
            subdivisions_per_beat: clamp(
                "subdivisions_per_beat",
                subdivisions_per_beat,
                SUBDIVISION_RANGE,
            ),
            beats_per_bar: clamp("beats_per_bar", beats_per_bar, BEATS_PER_BAR_RANGE),
        }
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn subdivisions_per_beat(&self) -> u32 {
        self.subdivisions_per_beat
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / f64::from(self.bpm)
    }

    /// Always strictly positive.
    pub fn seconds_per_subdivision(&self) -> f64 {
        self.seconds_per_beat() / f64::from(self.subdivisions_per_beat)
    }
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            bpm: 80,
            subdivisions_per_beat: 1,
            beats_per_bar: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawTempo {
    bpm: u32,
    subdivisions_per_beat: u32,
    beats_per_bar: u32,
}

impl TryFrom<RawTempo> for TempoConfig {
    type Error = TrainerError;

    fn try_from(raw: RawTempo) -> Result<Self> {
        Self::new(raw.bpm, raw.subdivisions_per_beat, raw.beats_per_bar)
    }
}

impl From<TempoConfig> for RawTempo {
    fn from(tempo: TempoConfig) -> Self {
        Self {
            bpm: tempo.bpm,
            subdivisions_per_beat: tempo.subdivisions_per_beat,
            beats_per_bar: tempo.beats_per_bar,
        }
    }
}

/// Symmetric half-width of the "on time" window around a beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ToleranceWindow(u32);

impl ToleranceWindow {
    pub fn new(ms: u32) -> Result<Self> {
        check("tolerance_window_ms", ms, TOLERANCE_RANGE_MS).map(Self)
    }

    pub fn clamped(ms: u32) -> Self {
        Self(clamp("tolerance_window_ms", ms, TOLERANCE_RANGE_MS))
    }

    pub fn ms(&self) -> u32 {
        self.0
    }

    pub fn seconds(&self) -> f64 {
        f64::from(self.0) / 1000.0
    }
}

impl Default for ToleranceWindow {
    fn default() -> Self {
        Self(120)
    }
}

impl TryFrom<u32> for ToleranceWindow {
    type Error = TrainerError;

    fn try_from(ms: u32) -> Result<Self> {
        Self::new(ms)
    }
}

impl From<ToleranceWindow> for u32 {
    fn from(window: ToleranceWindow) -> Self {
        window.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeConfig {
    pub tolerance_window_ms: ToleranceWindow,
}

/// Which notes are drawn and how many at once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub difficulty: Difficulty,
    pub arity: Arity,
}

/// Octave numbering used when showing pitch names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OctaveLabels {
    /// C4 is middle C.
    #[default]
    Scientific,
    /// C3 is middle C, as in most DAWs.
    Daw,
}

impl OctaveLabels {
    pub fn shift(self) -> i8 {
        match self {
            OctaveLabels::Scientific => 0,
            OctaveLabels::Daw => -1,
        }
    }
}

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tempo: TempoConfig,
    pub judge: JudgeConfig,
    pub level: Level,
    pub rhythm_enabled: bool,
    pub accuracy_capacity: usize,
    pub octave_labels: OctaveLabels,
    /// Pause between a correct answer and the next target.
    pub advance_delay_ms: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tempo: TempoConfig::default(),
            judge: JudgeConfig::default(),
            level: Level::default(),
            rhythm_enabled: false,
            accuracy_capacity: crate::record::DEFAULT_CAPACITY,
            octave_labels: OctaveLabels::default(),
            advance_delay_ms: 250,
        }
    }
}

impl AppConfig {
    /// Reads a JSON configuration file. Out-of-range values are rejected.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        if config.accuracy_capacity == 0 {
            return Err(TrainerError::InvalidConfig {
                field: "accuracy_capacity",
                value: 0,
                min: 1,
                max: i64::from(u32::MAX),
            });
        }
        tracing::debug!(?path, ?config, "loaded configuration");
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn advance_delay_seconds(&self) -> f64 {
        f64::from(self.advance_delay_ms) / 1000.0
    }
}

fn check(field: &'static str, value: u32, (min, max): (u32, u32)) -> Result<u32> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(TrainerError::InvalidConfig {
            field,
            value: i64::from(value),
            min: i64::from(min),
            max: i64::from(max),
        })
    }
}

fn clamp(field: &'static str, value: u32, (min, max): (u32, u32)) -> u32 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        tracing::warn!(field, value, clamped, "value out of range, clamping");
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_tempo() {
        let err = TempoConfig::new(300, 1, 4).unwrap_err();
        assert!(matches!(err, TrainerError::InvalidConfig { field: "bpm", .. }));

        assert!(TempoConfig::new(80, 0, 4).is_err());
        assert!(TempoConfig::new(80, 1, 5).is_err());
        assert!(ToleranceWindow::new(10).is_err());
    }

    #[test]
    fn clamps_like_the_settings_controls() {
        let tempo = TempoConfig::clamped(5, 9, 1);
        assert_eq!(tempo.bpm(), 20);
        assert_eq!(tempo.subdivisions_per_beat(), 4);
        assert_eq!(tempo.beats_per_bar(), 2);
        assert_eq!(ToleranceWindow::clamped(1_000).ms(), 500);
    }

    #[test]
    fn seconds_per_subdivision_is_positive() {
        let tempo = TempoConfig::new(120, 4, 4).unwrap();
        assert!((tempo.seconds_per_subdivision() - 0.125).abs() < 1e-12);

        let slowest = TempoConfig::clamped(0, 1, 2);
        assert!(slowest.seconds_per_subdivision() > 0.0);
    }

    #[test]
    fn json_round_trip_and_validation() {
        let config = AppConfig::default();
        let text = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, config);

        let bad = r#"{ "tempo": { "bpm": 999, "subdivisions_per_beat": 1, "beats_per_bar": 4 } }"#;
        assert!(serde_json::from_str::<AppConfig>(bad).is_err());

        let partial = r#"{ "judge": { "tolerance_window_ms": 200 }, "rhythm_enabled": true }"#;
        let parsed: AppConfig = serde_json::from_str(partial).unwrap();
        assert_eq!(parsed.judge.tolerance_window_ms.ms(), 200);
        assert!(parsed.rhythm_enabled);
        assert_eq!(parsed.tempo, TempoConfig::default());
    }

    #[test]
    fn saves_and_loads_from_disk() {
        let path = std::env::temp_dir().join(format!(
            "rhythm-trainer-config-{}.json",
            std::process::id()
        ));
        let mut config = AppConfig::default();
        config.tempo = TempoConfig::new(100, 2, 3).unwrap();
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
