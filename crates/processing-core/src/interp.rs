//! Mouse-position interpolation.
//!
//! Builds a normalized pointer path from an event stream once, then answers
//! position queries at arbitrary timestamps with an eased blend between the
//! bracketing samples.

use reelcut_project_model::event::{InputEvent, TimeMs};

use crate::easing::{ease_in_out, lerp};

/// Normalized pointer position at the query center when no data exists.
const EMPTY_STREAM_POSITION: (f64, f64) = (0.5, 0.5);

/// A queryable pointer path in normalized coordinates.
#[derive(Debug, Clone, Default)]
pub struct PointerPath {
    /// `(timestamp_ms, x, y)`, sorted by timestamp, coordinates in `[0, 1]`.
    samples: Vec<(TimeMs, f64, f64)>,
}

impl PointerPath {
    /// Build a path from timestamp-sorted events, keeping only events that
    /// carry their own screen geometry (moves and clicks).
    pub fn from_events(events: &[InputEvent]) -> Self {
        let samples = events
            .iter()
            .filter_map(|e| {
                e.normalized_position()
                    .map(|(x, y)| (e.timestamp_ms, x, y))
            })
            .collect();
        Self { samples }
    }

    /// Number of usable samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Interpolated normalized position at `t`.
    ///
    /// Falls back to the nearest sample beyond either stream boundary and
    /// to the frame center for an empty stream.
    pub fn position_at(&self, t: TimeMs) -> (f64, f64) {
        let samples = &self.samples;
        if samples.is_empty() {
            return EMPTY_STREAM_POSITION;
        }

        if t <= samples[0].0 {
            return (samples[0].1, samples[0].2);
        }
        let last = samples[samples.len() - 1];
        if t >= last.0 {
            return (last.1, last.2);
        }

        // Binary search for the bracketing pair around t.
        let idx = samples
            .partition_point(|(ts, _, _)| *ts <= t)
            .saturating_sub(1);
        let (t0, x0, y0) = samples[idx];
        let (t1, x1, y1) = samples[idx + 1];

        let span = t1 - t0;
        if span <= 0.0 {
            return (x1, y1);
        }

        let progress = ease_in_out((t - t0) / span);
        (lerp(x0, x1, progress), lerp(y0, y1, progress))
    }
}
