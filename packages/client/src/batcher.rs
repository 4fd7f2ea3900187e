//! Outbound note batching.
//!
//! Key presses are buffered and sent in one `n` frame per flush. Each note
//! carries its delay from the first note of the batch, so the receiver can
//! replay the batch with its original timing even though batches only
//! leave every [`FLUSH_INTERVAL`].

use std::time::Duration;

use crate::domain::Note;

/// Period of the flush timer while connected.
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// A flushed batch, ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteBatch {
    /// Server time of the batch's first note
    pub server_time: f64,
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone, Default)]
pub struct NoteBatcher {
    pending: Vec<Note>,
    /// Local time of the first pending note
    reference_time: Option<i64>,
}

impl NoteBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a note-on at local time `now`.
    pub fn note_on(&mut self, pitch: impl Into<String>, velocity: f64, now: i64) {
        let delay = self.delay_at(now);
        self.pending.push(Note::start(pitch, velocity, delay));
    }

    /// Buffer a note-off at local time `now`.
    pub fn note_off(&mut self, pitch: impl Into<String>, now: i64) {
        let delay = self.delay_at(now);
        self.pending.push(Note::stop(pitch, delay));
    }

    /// Take the pending batch, if there is one.
    ///
    /// `clock_offset` converts the local reference time into server time.
    pub fn flush(&mut self, clock_offset: f64) -> Option<NoteBatch> {
        let reference_time = self.reference_time?;
        if self.pending.is_empty() {
            return None;
        }

        self.reference_time = None;
        Some(NoteBatch {
            server_time: reference_time as f64 + clock_offset,
            notes: std::mem::take(&mut self.pending),
        })
    }

    /// Drop everything pending.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.reference_time = None;
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn delay_at(&mut self, now: i64) -> i64 {
        match self.reference_time {
            Some(reference) => (now - reference).max(0),
            None => {
                self.reference_time = Some(now);
                0
            }
        }
    }
}
