//! Look-ahead beat scheduling.
//!
//! The scheduler keeps its own reference time (`next_event_time`) in the
//! clock's domain and advances it by exactly one subdivision per event. The
//! periodic [`BeatScheduler::poll`] only decides *when* queued events are
//! handed out; it never influences the timestamps themselves, so late or
//! irregular polling cannot make the grid drift.

use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use serde::Serialize;

use crate::{Clock, TempoConfig};

/// Polling period of the scheduling tick.
pub const POLL_INTERVAL_SECONDS: f64 = 0.025;
/// How far ahead of the clock events are computed and queued.
pub const LOOKAHEAD_SECONDS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// First beat of the bar (accented).
    MainBeat,
    /// Any other beat of the bar.
    OffBeat,
    /// A tick between beats.
    Subdivision,
}

/// A single grid point. Immutable once created, dropped after delivery.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScheduledEvent {
    pub time_seconds: f64,
    pub kind: EventKind,
    /// Beat of the bar this event belongs to, `0..beats_per_bar`.
    pub bar_position: u32,
}

impl ScheduledEvent {
    pub fn is_beat(&self) -> bool {
        matches!(self.kind, EventKind::MainBeat | EventKind::OffBeat)
    }

    pub fn is_accented(&self) -> bool {
        self.kind == EventKind::MainBeat
    }
}

/// Receiver for delivered events.
pub trait BeatHandler {
    fn on_main_beat(&mut self, event: &ScheduledEvent);

    fn on_off_beat(&mut self, event: &ScheduledEvent) {
        let _ = event;
    }

    fn on_subdivision(&mut self, event: &ScheduledEvent) {
        let _ = event;
    }
}

/// Snapshot of the scheduler's running state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerState {
    pub next_event_time: f64,
    pub subdivision_index: u32,
    pub beat_index: u32,
    pub config: TempoConfig,
}

#[derive(Debug, Clone, Copy)]
struct PendingDelivery {
    due: f64,
    seq: u64,
    event: ScheduledEvent,
}

impl PartialEq for PendingDelivery {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingDelivery {}

impl PartialOrd for PendingDelivery {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingDelivery {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due
            .total_cmp(&other.due)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Drift-free metronome grid with cancellable, queued deliveries.
///
/// Every instance owns its clock handle and its pending queue, so several
/// schedulers can run side by side.
#[derive(Debug)]
pub struct BeatScheduler<C: Clock> {
    clock: C,
    state: Option<SchedulerState>,
    pending: BinaryHeap<Reverse<PendingDelivery>>,
    seq: u64,
}

impl<C: Clock> BeatScheduler<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            state: None,
            pending: BinaryHeap::new(),
            seq: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.is_some()
    }

    pub fn state(&self) -> Option<&SchedulerState> {
        self.state.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// (Re)starts the grid at the current clock time.
    ///
    /// The caller is expected to play the accented first beat itself, right
    /// now; the first queued event is one subdivision later and the bar
    /// position continues from beat two. Restarting always returns to the
    /// start of a bar.
    pub fn start(&mut self, config: TempoConfig) {
        self.stop();

        let now = self.clock.now();
        let state = SchedulerState {
            next_event_time: now + config.seconds_per_subdivision(),
            subdivision_index: 0,
            beat_index: 1 % config.beats_per_bar(),
            config,
        };
        tracing::debug!(
            bpm = config.bpm(),
            subdivisions = config.subdivisions_per_beat(),
            beats_per_bar = config.beats_per_bar(),
            start = now,
            "starting beat scheduler"
        );
        self.state = Some(state);
        self.schedule(now);
    }

    /// Cancels every pending delivery. Safe to call at any time.
    pub fn stop(&mut self) {
        if self.state.take().is_some() {
            tracing::debug!(cancelled = self.pending.len(), "stopping beat scheduler");
        }
        self.pending.clear();
    }

    /// The periodic tick: queues everything inside the look-ahead horizon and
    /// returns the events whose delivery time has arrived, oldest first.
    pub fn poll(&mut self) -> Vec<ScheduledEvent> {
        let now = self.clock.now();
        self.schedule(now);

        let mut due = Vec::new();
        while let Some(Reverse(next)) = self.pending.peek() {
            if next.due > now {
                break;
            }
            if let Some(Reverse(delivery)) = self.pending.pop() {
                due.push(delivery.event);
            }
        }
        due
    }

    /// Polls and dispatches each due event to `handler` by kind.
    pub fn poll_with<H: BeatHandler + ?Sized>(&mut self, handler: &mut H) -> usize {
        let events = self.poll();
        for event in &events {
            match event.kind {
                EventKind::MainBeat => handler.on_main_beat(event),
                EventKind::OffBeat => handler.on_off_beat(event),
                EventKind::Subdivision => handler.on_subdivision(event),
            }
        }
        events.len()
    }

    fn schedule(&mut self, now: f64) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        let step = state.config.seconds_per_subdivision();
        let subdivisions = state.config.subdivisions_per_beat();
        let beats_per_bar = state.config.beats_per_bar();

        while state.next_event_time < now + LOOKAHEAD_SECONDS {
            state.subdivision_index = (state.subdivision_index + 1) % subdivisions;
            let event = if state.subdivision_index == 0 {
                let kind = if state.beat_index == 0 {
                    EventKind::MainBeat
                } else {
                    EventKind::OffBeat
                };
                let event = ScheduledEvent {
                    time_seconds: state.next_event_time,
                    kind,
                    bar_position: state.beat_index,
                };
                state.beat_index = (state.beat_index + 1) % beats_per_bar;
                event
            } else {
                ScheduledEvent {
                    time_seconds: state.next_event_time,
                    kind: EventKind::Subdivision,
                    bar_position: (state.beat_index + beats_per_bar - 1) % beats_per_bar,
                }
            };

            // Delivered no earlier than the event time and never in the past.
            self.seq += 1;
            self.pending.push(Reverse(PendingDelivery {
                due: event.time_seconds.max(now),
                seq: self.seq,
                event,
            }));
            state.next_event_time += step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;

    const EPSILON: f64 = 1e-9;

    fn tempo(bpm: u32, subdivisions: u32, beats_per_bar: u32) -> TempoConfig {
        TempoConfig::new(bpm, subdivisions, beats_per_bar).unwrap()
    }

    /// Polls at `step` intervals until `until`, collecting every delivery.
    fn run(
        scheduler: &mut BeatScheduler<ManualClock>,
        clock: &ManualClock,
        until: f64,
        step: impl Fn(usize) -> f64,
    ) -> Vec<ScheduledEvent> {
        let mut events = Vec::new();
        let mut i = 0;
        while clock.now() < until {
            clock.advance(step(i));
            events.extend(scheduler.poll());
            i += 1;
        }
        events
    }

    #[derive(Default)]
    struct Tally {
        main: Vec<f64>,
        off: Vec<f64>,
        sub: Vec<f64>,
    }

    impl BeatHandler for Tally {
        fn on_main_beat(&mut self, event: &ScheduledEvent) {
            self.main.push(event.time_seconds);
        }

        fn on_off_beat(&mut self, event: &ScheduledEvent) {
            self.off.push(event.time_seconds);
        }

        fn on_subdivision(&mut self, event: &ScheduledEvent) {
            self.sub.push(event.time_seconds);
        }
    }

    #[test]
    fn event_times_are_evenly_spaced_despite_jitter() {
        let clock = ManualClock::at(3.0);
        let mut scheduler = BeatScheduler::new(clock.clone());
        let config = tempo(137, 3, 3);
        scheduler.start(config);

        // Irregular polling: 25 ms nominal, some late by up to 60 ms.
        let jitter = [0.025, 0.031, 0.012, 0.085, 0.025, 0.004, 0.047];
        let events = run(&mut scheduler, &clock, 13.0, |i| jitter[i % jitter.len()]);

        let step = config.seconds_per_subdivision();
        assert!(events.len() > 100);
        assert!((events[0].time_seconds - (3.0 + step)).abs() < EPSILON);
        for pair in events.windows(2) {
            let gap = pair[1].time_seconds - pair[0].time_seconds;
            assert!(gap > 0.0);
            assert!((gap - step).abs() < EPSILON, "gap {gap} != {step}");
        }
    }

    #[test]
    fn classifies_beats_and_subdivisions() {
        let clock = ManualClock::new();
        let mut scheduler = BeatScheduler::new(clock.clone());
        scheduler.start(tempo(120, 2, 3));

        let events = run(&mut scheduler, &clock, 3.1, |_| 0.025);
        let kinds: Vec<_> = events.iter().take(12).map(|e| (e.kind, e.bar_position)).collect();
        use EventKind::*;
        assert_eq!(
            kinds,
            vec![
                (Subdivision, 0),
                (OffBeat, 1),
                (Subdivision, 1),
                (OffBeat, 2),
                (Subdivision, 2),
                (MainBeat, 0),
                (Subdivision, 0),
                (OffBeat, 1),
                (Subdivision, 1),
                (OffBeat, 2),
                (Subdivision, 2),
                (MainBeat, 0),
            ]
        );
        assert!(events[5].is_accented() && events[5].is_beat());
        assert!((events[5].time_seconds - 1.5).abs() < EPSILON);
    }

    #[test]
    fn fifth_beat_lands_four_beats_after_start() {
        let clock = ManualClock::at(10.0);
        let mut scheduler = BeatScheduler::new(clock.clone());
        scheduler.start(tempo(80, 1, 4));

        let events = run(&mut scheduler, &clock, 14.0, |_| 0.025);
        // The synchronous first beat at start counts as beat one.
        let beats: Vec<_> = events.iter().filter(|e| e.is_beat()).collect();
        let fifth = beats[3];
        assert!((fifth.time_seconds - (10.0 + 4.0 * 60.0 / 80.0)).abs() < 0.001);
        assert_eq!(fifth.kind, EventKind::MainBeat);
    }

    #[test]
    fn deliveries_wait_for_their_time() {
        let clock = ManualClock::new();
        let mut scheduler = BeatScheduler::new(clock.clone());
        scheduler.start(tempo(240, 1, 4));

        // 0.25 s per beat: nothing is due before the first grid point.
        clock.set(0.2);
        assert!(scheduler.poll().is_empty());
        assert_eq!(scheduler.pending_len(), 1);

        clock.set(0.25);
        let events = scheduler.poll();
        assert_eq!(events.len(), 1);
        assert!(clock.now() >= events[0].time_seconds);
    }

    #[test]
    fn late_poll_delivers_backlog_in_order() {
        let clock = ManualClock::new();
        let mut scheduler = BeatScheduler::new(clock.clone());
        scheduler.start(tempo(240, 4, 4));

        // A long stall: everything queued becomes due at once.
        clock.set(1.0);
        let events = scheduler.poll();
        assert!(events.len() >= 15);
        assert!(events
            .windows(2)
            .all(|pair| pair[0].time_seconds <= pair[1].time_seconds));
    }

    #[test]
    fn dispatches_to_handler_by_kind() {
        let clock = ManualClock::new();
        let mut scheduler = BeatScheduler::new(clock.clone());
        scheduler.start(tempo(60, 2, 2));

        let mut tally = Tally::default();
        while clock.now() < 4.0 {
            clock.advance(0.025);
            scheduler.poll_with(&mut tally);
        }
        assert_eq!(tally.off, vec![1.0, 3.0]);
        assert_eq!(tally.main, vec![2.0, 4.0]);
        assert_eq!(tally.sub.len(), 4);
    }

    #[test]
    fn stop_is_idempotent_and_cancels_everything() {
        let clock = ManualClock::new();
        let mut scheduler = BeatScheduler::new(clock.clone());
        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());

        scheduler.start(tempo(240, 4, 4));
        clock.set(0.05);
        scheduler.poll();
        assert!(scheduler.pending_len() > 0);

        scheduler.stop();
        scheduler.stop();
        assert_eq!(scheduler.pending_len(), 0);

        clock.set(5.0);
        let mut tally = Tally::default();
        assert_eq!(scheduler.poll_with(&mut tally), 0);
        assert!(tally.main.is_empty() && tally.off.is_empty() && tally.sub.is_empty());
    }

    #[test]
    fn restart_drops_stale_events_and_resets_the_bar() {
        let clock = ManualClock::new();
        let mut scheduler = BeatScheduler::new(clock.clone());
        scheduler.start(tempo(120, 1, 4));
        clock.set(0.9);
        scheduler.poll();

        scheduler.start(tempo(60, 1, 3));
        let state = *scheduler.state().unwrap();
        assert_eq!(state.beat_index, 1);
        assert_eq!(state.subdivision_index, 0);

        let events = run(&mut scheduler, &clock, 4.0, |_| 0.025);
        assert!((events[0].time_seconds - 1.9).abs() < EPSILON);
        assert_eq!(events[0].kind, EventKind::OffBeat);
        assert_eq!(events[2].kind, EventKind::MainBeat);
        for pair in events.windows(2) {
            assert!((pair[1].time_seconds - pair[0].time_seconds - 1.0).abs() < EPSILON);
        }
    }

    #[test]
    fn independent_schedulers_do_not_interfere() {
        let clock = ManualClock::new();
        let mut fast = BeatScheduler::new(clock.clone());
        let mut slow = BeatScheduler::new(clock.clone());
        fast.start(tempo(240, 1, 4));
        slow.start(tempo(60, 1, 4));
        fast.stop();

        clock.set(1.0);
        assert!(fast.poll().is_empty());
        assert_eq!(slow.poll().len(), 1);
    }
}
