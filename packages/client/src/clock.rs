//! Server clock synchronization.
//!
//! Each server time sample yields a target offset (server − local). The
//! offset glides to the target in [`SMOOTHING_STEPS`] equal steps spread
//! over [`SMOOTHING_WINDOW`] instead of jumping, so notes already scheduled
//! against the old offset do not stutter. The last step lands exactly on
//! the target.

use std::time::Duration;

/// Time over which a new offset is phased in.
pub const SMOOTHING_WINDOW: Duration = Duration::from_millis(1000);

/// Number of increments per smoothing pass.
pub const SMOOTHING_STEPS: u32 = 50;

/// Interval between two increments of a pass.
pub const SMOOTHING_STEP_INTERVAL: Duration =
    Duration::from_millis(SMOOTHING_WINDOW.as_millis() as u64 / SMOOTHING_STEPS as u64);

#[derive(Debug, Clone, Copy, PartialEq)]
struct SmoothingPass {
    target: f64,
    increment: f64,
    remaining: u32,
}

/// Smoothed estimate of `server time − local time`, in milliseconds.
#[derive(Debug, Clone, Default)]
pub struct ClockSynchronizer {
    offset: f64,
    pass: Option<SmoothingPass>,
}

impl ClockSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current offset in milliseconds.
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Whether a smoothing pass is in progress.
    pub fn is_smoothing(&self) -> bool {
        self.pass.is_some()
    }

    /// Offset the current pass is heading to, if any.
    pub fn target(&self) -> Option<f64> {
        self.pass.map(|p| p.target)
    }

    /// Best estimate of the server time at `local_now`.
    pub fn server_time(&self, local_now: i64) -> f64 {
        local_now as f64 + self.offset
    }

    /// Take a server time sample and start a fresh pass toward it.
    ///
    /// A pass already in flight is abandoned; the new one starts from the
    /// offset reached so far. Returns the target offset.
    pub fn sample(&mut self, server_time: f64, local_now: i64) -> f64 {
        let target = server_time - local_now as f64;
        let increment = (target - self.offset) / SMOOTHING_STEPS as f64;
        self.pass = Some(SmoothingPass {
            target,
            increment,
            remaining: SMOOTHING_STEPS,
        });
        tracing::debug!(
            "Clock sample: target offset {:.1} ms (current {:.1} ms)",
            target,
            self.offset
        );
        target
    }

    /// Apply one increment of the current pass.
    ///
    /// Returns `true` while the pass still has steps left.
    pub fn step(&mut self) -> bool {
        let Some(pass) = self.pass.as_mut() else {
            return false;
        };

        pass.remaining -= 1;
        if pass.remaining == 0 {
            self.offset = pass.target;
            self.pass = None;
            return false;
        }

        self.offset += pass.increment;
        true
    }

    /// Finish the current pass at once, landing on its target.
    pub fn settle(&mut self) {
        if let Some(pass) = self.pass.take() {
            self.offset = pass.target;
        }
    }
}
