use std::{
    io::BufRead,
    sync::mpsc::{self, Receiver, Sender, TryRecvError},
    thread,
    time::Duration,
};

use rhythm_trainer_core::{
    Clock, Judgment, MonotonicClock, OctaveLabels, Pitch, PresentationSink, QwertyLayout,
    RandomTargets, Target, TempoConfig, ToleranceWindow, Trainer, POLL_INTERVAL_SECONDS,
};

use crate::SessionArgs;

type LiveTrainer = Trainer<MonotonicClock, RandomTargets, ConsoleSink>;

/// A line typed by the learner, stamped when it was read.
struct InputLine {
    text: String,
    time: f64,
}

pub fn run(settings: &SessionArgs) -> rhythm_trainer_core::Result<()> {
    let config = settings.resolve()?;
    let clock = MonotonicClock::start();
    let input = spawn_input_reader(clock);

    let sink = ConsoleSink::new(config.octave_labels);
    let mut trainer = Trainer::new(config, clock, settings.targets(), sink);
    let mut layout = QwertyLayout::default();

    print_help();
    trainer.start();

    loop {
        trainer.poll();

        loop {
            match input.try_recv() {
                Ok(line) => {
                    if !handle_line(&mut trainer, &mut layout, &line) {
                        return finish(&mut trainer);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return finish(&mut trainer),
            }
        }

        thread::sleep(Duration::from_secs_f64(POLL_INTERVAL_SECONDS));
    }
}

fn finish(trainer: &mut LiveTrainer) -> rhythm_trainer_core::Result<()> {
    trainer.stop();
    let summary = trainer.accuracy().summary();
    tracing::info!(score = trainer.score(), ?summary, "session finished");
    Ok(())
}

/// Reads stdin on its own thread. Lines are stamped on receipt with the
/// shared clock so the judge sees when the key was hit, not when the main
/// loop got round to it.
fn spawn_input_reader(clock: MonotonicClock) -> Receiver<InputLine> {
    let (tx, rx): (Sender<InputLine>, Receiver<InputLine>) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(text) = line else {
                break;
            };
            let time = clock.now();
            if tx.send(InputLine { text, time }).is_err() {
                break;
            }
        }
    });
    rx
}

/// Applies one input line. Returns `false` when the learner asked to quit.
fn handle_line(trainer: &mut LiveTrainer, layout: &mut QwertyLayout, line: &InputLine) -> bool {
    let text = line.text.trim();
    if let Some(command) = text.strip_prefix(':') {
        return handle_command(trainer, layout, command);
    }

    for token in text.split_whitespace() {
        match parse_note(layout, token) {
            Some(pitch) => {
                trainer.attempt_at(pitch, line.time);
            }
            None => tracing::warn!(token, "not a note name or keyboard key, ignoring"),
        }
    }
    true
}

fn parse_note(layout: &QwertyLayout, token: &str) -> Option<Pitch> {
    let mut chars = token.chars();
    if let (Some(key), None) = (chars.next(), chars.next()) {
        return layout.pitch_for_key(key, key.is_ascii_uppercase());
    }
    token.parse().ok()
}

fn handle_command(trainer: &mut LiveTrainer, layout: &mut QwertyLayout, command: &str) -> bool {
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let value = parts.next().and_then(|v| v.parse::<u32>().ok());
    let tempo = trainer.config().tempo;

    match (name, value) {
        ("q" | "quit", _) => return false,
        ("new", _) => {
            if !trainer.new_target() {
                println!("rhythm mode is on: the next beat brings a new target");
            }
        }
        ("rhythm", _) => {
            if trainer.is_rhythm_enabled() {
                trainer.disable_rhythm();
            } else {
                trainer.enable_rhythm();
            }
        }
        ("bpm", Some(bpm)) => trainer.set_tempo(TempoConfig::clamped(
            bpm,
            tempo.subdivisions_per_beat(),
            tempo.beats_per_bar(),
        )),
        ("sub", Some(subdivisions)) => trainer.set_tempo(TempoConfig::clamped(
            tempo.bpm(),
            subdivisions,
            tempo.beats_per_bar(),
        )),
        ("bar", Some(beats)) => trainer.set_tempo(TempoConfig::clamped(
            tempo.bpm(),
            tempo.subdivisions_per_beat(),
            beats,
        )),
        ("window", Some(ms)) => trainer.set_tolerance(ToleranceWindow::clamped(ms)),
        ("up", _) => {
            layout.octave_up();
            println!("QWERTY base = C{}", layout.base_octave());
        }
        ("down", _) => {
            layout.octave_down();
            println!("QWERTY base = C{}", layout.base_octave());
        }
        ("reset", _) => trainer.reset_accuracy(),
        ("stats", _) => print_stats(trainer),
        _ => print_help(),
    }
    true
}

fn print_stats(trainer: &LiveTrainer) {
    let summary = trainer.accuracy().summary();
    println!(
        "score {} | {} timed hits, mean {:+.1} ms, mean |offset| {:.1} ms",
        trainer.score(),
        summary.count,
        summary.mean_ms,
        summary.mean_abs_ms
    );
    let samples: Vec<String> = trainer
        .accuracy()
        .samples()
        .map(|offset| format!("{offset:+}"))
        .collect();
    if !samples.is_empty() {
        println!("offsets (ms): {}", samples.join(" "));
    }
}

fn print_help() {
    println!("play: note names (C4 Db3 ...) or z s x d c v g b h n j m (uppercase = octave up)");
    println!("commands: :new :rhythm :bpm N :sub N :bar N :window N :up :down :reset :stats :quit");
}

/// Prints what a graphical front end would draw.
#[derive(Debug)]
pub struct ConsoleSink {
    octave_shift: i8,
}

impl ConsoleSink {
    pub fn new(labels: OctaveLabels) -> Self {
        Self {
            octave_shift: labels.shift(),
        }
    }
}

impl PresentationSink for ConsoleSink {
    fn on_main_beat(&mut self, accented: bool) {
        println!("{}", if accented { "[BEAT]" } else { "[beat]" });
    }

    fn on_subdivision(&mut self) {
        println!("  .");
    }

    fn on_target_changed(&mut self, target: &Target) {
        let label = if target.is_chord() { "target (pair)" } else { "target" };
        println!("{label}: {}", target.display_name(self.octave_shift));
    }

    fn on_judgment(&mut self, judgment: &Judgment) {
        match judgment {
            Judgment::Correct {
                offset_ms: Some(offset),
            } => println!("on time! {offset:+} ms"),
            Judgment::Correct { offset_ms: None } => println!("correct!"),
            Judgment::Wrong { expected } => {
                println!("wrong, target was {}", expected.display_name(self.octave_shift))
            }
            Judgment::Partial { remaining } => {
                let names: Vec<String> = remaining
                    .iter()
                    .map(|pitch| pitch.display_name(self.octave_shift))
                    .collect();
                println!("still missing: {}", names.join(" + "));
            }
            Judgment::Early { offset_ms } => println!("too early ({offset_ms:+} ms)"),
            Judgment::Late { offset_ms } => println!("too late ({offset_ms:+} ms)"),
            Judgment::AlreadyScored | Judgment::NoTarget => {}
        }
    }

    fn on_missed_beat(&mut self) {
        println!("missed the beat, new note!");
    }
}
