use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rhythm_trainer_core::{
    AppConfig, Arity, Difficulty, OctaveLabels, RandomTargets, TempoConfig, ToleranceWindow,
};
use tracing_subscriber::EnvFilter;

mod drill;
mod simulate;

fn main() -> rhythm_trainer_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Drill { settings } => drill::run(&settings),
        Commands::Simulate { settings, performer } => simulate::run(&settings, &performer),
        Commands::InitConfig { output, settings } => run_init_config(&output, &settings),
    }
}

fn run_init_config(output: &PathBuf, settings: &SessionArgs) -> rhythm_trainer_core::Result<()> {
    let config = settings.resolve()?;
    config.save(output)?;
    tracing::info!(?output, "wrote configuration");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Sight-reading and rhythm drill", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Practise interactively: type note names (C4, Db3) or QWERTY keys.
    Drill {
        #[command(flatten)]
        settings: SessionArgs,
    },
    /// Run a virtual performer against the metronome and report accuracy.
    Simulate {
        #[command(flatten)]
        settings: SessionArgs,
        #[command(flatten)]
        performer: simulate::PerformerArgs,
    },
    /// Write the resolved settings to a configuration file.
    InitConfig {
        /// Output path for the JSON configuration.
        output: PathBuf,
        #[command(flatten)]
        settings: SessionArgs,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LevelArg {
    Easy,
    Full,
}

/// Settings shared by every subcommand. Flags override the configuration
/// file and are clamped into range like the on-screen controls.
#[derive(Args, Debug, Clone)]
struct SessionArgs {
    /// JSON configuration file to start from.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Tempo in beats per minute (20-240).
    #[arg(long)]
    bpm: Option<u32>,
    /// Ticks per beat (1-4).
    #[arg(long)]
    subdivisions: Option<u32>,
    /// Beats per bar (2-4).
    #[arg(long)]
    beats_per_bar: Option<u32>,
    /// Half-width of the on-time window in milliseconds (20-500).
    #[arg(long)]
    window_ms: Option<u32>,
    /// Pitch range to draw targets from.
    #[arg(long, value_enum)]
    level: Option<LevelArg>,
    /// Ask for two-note chords instead of single notes.
    #[arg(long)]
    pair: bool,
    /// Start with the metronome running.
    #[arg(long)]
    rhythm: bool,
    /// Label octaves DAW-style (C3 = middle C).
    #[arg(long)]
    daw_octaves: bool,
    /// Seed for reproducible targets.
    #[arg(long)]
    seed: Option<u64>,
}

impl SessionArgs {
    fn resolve(&self) -> rhythm_trainer_core::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };

        let tempo = config.tempo;
        config.tempo = TempoConfig::clamped(
            self.bpm.unwrap_or(tempo.bpm()),
            self.subdivisions.unwrap_or(tempo.subdivisions_per_beat()),
            self.beats_per_bar.unwrap_or(tempo.beats_per_bar()),
        );
        if let Some(ms) = self.window_ms {
            config.judge.tolerance_window_ms = ToleranceWindow::clamped(ms);
        }
        if let Some(level) = self.level {
            config.level.difficulty = match level {
                LevelArg::Easy => Difficulty::Easy,
                LevelArg::Full => Difficulty::Full,
            };
        }
        if self.pair {
            config.level.arity = Arity::Pair;
        }
        if self.rhythm {
            config.rhythm_enabled = true;
        }
        if self.daw_octaves {
            config.octave_labels = OctaveLabels::Daw;
        }
        Ok(config)
    }

    fn targets(&self) -> RandomTargets {
        match self.seed {
            Some(seed) => RandomTargets::seeded(seed),
            None => RandomTargets::new(),
        }
    }
}
