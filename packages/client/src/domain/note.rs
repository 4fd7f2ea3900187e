//! A single note-on / note-off event inside a batch.

use serde::{Deserialize, Serialize};

use super::de;

/// Velocity sent with every note-off.
const STOP_VELOCITY: f64 = 0.0;

/// Note event as carried in an `n` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Pitch identifier, e.g. `"c4"` or `"a-1"`
    #[serde(rename = "n")]
    pub pitch: String,
    /// Milliseconds after the batch's reference time
    #[serde(rename = "d", default, deserialize_with = "de::rounded")]
    pub delay: i64,
    #[serde(rename = "s", default, deserialize_with = "de::flag")]
    pub is_stop: bool,
    /// 0.0 to 1.0
    #[serde(rename = "v", default)]
    pub velocity: f64,
}

impl Note {
    /// Note-on with velocity clamped to `[0, 1]` and rounded to three decimals.
    pub fn start(pitch: impl Into<String>, velocity: f64, delay: i64) -> Self {
        Self {
            pitch: pitch.into(),
            delay,
            is_stop: false,
            velocity: normalize_velocity(velocity),
        }
    }

    pub fn stop(pitch: impl Into<String>, delay: i64) -> Self {
        Self {
            pitch: pitch.into(),
            delay,
            is_stop: true,
            velocity: STOP_VELOCITY,
        }
    }
}

fn normalize_velocity(velocity: f64) -> f64 {
    if !velocity.is_finite() {
        return 0.0;
    }
    (velocity.clamp(0.0, 1.0) * 1000.0).round() / 1000.0
}
