use std::{
    cell::Cell,
    rc::Rc,
    time::{Duration, Instant},
};

/// Monotonic time source shared by the scheduler and by whatever stamps
/// learner input. All values are seconds in one clock domain.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Wall clock backed by [`Instant`], measured from the moment it was started.
///
/// Clones share the same origin, so a clone handed to an input thread stamps
/// attempts in the same domain the scheduler reads.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::start()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for tests and offline simulation. Clones observe the
/// same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    time_seconds: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(time_seconds: f64) -> Self {
        let clock = Self::new();
        clock.set(time_seconds);
        clock
    }

    /// Moves the clock to `time_seconds`. The clock never runs backwards.
    pub fn set(&self, time_seconds: f64) {
        self.time_seconds.set(time_seconds.max(self.time_seconds.get()));
    }

    pub fn advance(&self, delta: f64) {
        self.set(self.time_seconds.get() + delta.max(0.0));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.time_seconds.get()
    }
}
