//! Motion/zoom detection: turning raw pointer activity into zoom effects.
//!
//! The continuous-activity model tracks one "zoom window" at a time:
//!
//! 1. **Activity** is any click, or pointer movement beyond a pixel
//!    threshold since the last activity position. Activity starts a window
//!    (if idle) or extends the current one.
//! 2. A window **closes** `fade_ms` after its last activity once the idle
//!    timeout is exceeded, or at end of stream.
//! 3. Windows shorter than a minimum duration are **discarded** as noise,
//!    never truncated.
//! 4. Adjacent windows separated by less than a merge gap are **merged**
//!    into one continuous effect.
//!
//! The result is fewer, longer zoom segments instead of one effect per
//! click, which avoids visual flicker under rapid clicking.

use reelcut_project_model::effect::{Effect, EffectKind, ZoomParams};
use reelcut_project_model::event::{InputEvent, TimeMs};
use serde::{Deserialize, Serialize};

/// Tunable thresholds for zoom detection.
///
/// These vary noticeably across users and recordings, so they are
/// configuration rather than constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Pointer movement (pixels) that counts as activity.
    pub activity_threshold_px: f64,

    /// Idle gap (ms) after which the current window stops extending.
    pub idle_timeout_ms: TimeMs,

    /// Trailing fade appended after the last activity when a window closes.
    pub fade_ms: TimeMs,

    /// Closed windows shorter than this are treated as noise.
    pub min_duration_ms: TimeMs,

    /// Adjacent windows closer than this gap are merged.
    pub merge_gap_ms: TimeMs,

    /// Magnification applied by generated effects.
    pub zoom_scale: f64,

    /// Intro ramp for generated effects (fast attack).
    pub intro_ms: TimeMs,

    /// Outro ramp for generated effects (slower release).
    pub outro_ms: TimeMs,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            activity_threshold_px: 30.0,
            idle_timeout_ms: 2000.0,
            fade_ms: 300.0,
            min_duration_ms: 900.0,
            merge_gap_ms: 400.0,
            zoom_scale: 2.0,
            intro_ms: 500.0,
            outro_ms: 700.0,
        }
    }
}

/// A detection policy: sorted events in, ordered non-overlapping effects out.
///
/// Only the continuous-activity policy ships today; alternative policies
/// plug in here without touching callers.
pub trait DetectionStrategy {
    fn detect(&self, events: &[InputEvent], duration_ms: TimeMs) -> Vec<Effect>;
}

/// The default continuous-activity zoom detector.
#[derive(Debug, Clone, Default)]
pub struct ContinuousActivityDetector {
    config: DetectorConfig,
}

/// An activity window while it is still being assembled.
#[derive(Debug, Clone)]
struct ActivityWindow {
    start_ms: TimeMs,
    /// Normalized position of the first activity event: the zoom anchor.
    anchor: (f64, f64),
    last_activity_ms: TimeMs,
}

impl ContinuousActivityDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(DetectorConfig::default())
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Collect raw activity windows from the event stream.
    fn collect_windows(&self, events: &[InputEvent]) -> Vec<ActivityWindow> {
        let cfg = &self.config;
        let mut windows: Vec<ActivityWindow> = Vec::new();
        let mut current: Option<ActivityWindow> = None;
        // Pointer position at the last activity mark; movement is measured
        // against this, not the previous sample, so slow drift accumulates.
        let mut activity_ref: Option<(f64, f64)> = None;

        for event in events {
            let Some(pos) = event.pointer_position() else {
                continue;
            };

            let moved_far = match activity_ref {
                Some((rx, ry)) => {
                    let dx = pos.0 - rx;
                    let dy = pos.1 - ry;
                    (dx * dx + dy * dy).sqrt() > cfg.activity_threshold_px
                }
                // The first pointer sample establishes presence; treat it
                // as activity so recordings that open mid-motion get framed.
                None => true,
            };

            let is_activity = event.is_click_down() || moved_far;
            if !is_activity {
                continue;
            }

            let t = event.timestamp_ms;
            let anchor = event.normalized_position().unwrap_or((0.5, 0.5));
            activity_ref = Some(pos);

            // Idle too long: close the old window before opening a new one.
            let idle_expired = current
                .as_ref()
                .is_some_and(|w| t - w.last_activity_ms > cfg.idle_timeout_ms);
            if idle_expired {
                windows.push(current.take().unwrap());
            }

            match current {
                Some(ref mut window) => window.last_activity_ms = t,
                None => {
                    current = Some(ActivityWindow {
                        start_ms: t,
                        anchor,
                        last_activity_ms: t,
                    });
                }
            }
        }

        // An unterminated window closes at end of stream.
        if let Some(window) = current {
            windows.push(window);
        }

        windows
    }

    /// Close windows (append fade), drop noise, and merge near-adjacent ones.
    fn finalize_windows(
        &self,
        windows: Vec<ActivityWindow>,
        duration_ms: TimeMs,
    ) -> Vec<(TimeMs, TimeMs, (f64, f64))> {
        let cfg = &self.config;

        let mut closed: Vec<(TimeMs, TimeMs, (f64, f64))> = windows
            .into_iter()
            .filter_map(|w| {
                let end = (w.last_activity_ms + cfg.fade_ms).min(duration_ms);
                let interval = (w.start_ms, end, w.anchor);
                // Noise windows are discarded outright, never truncated into
                // sub-minimum effects.
                if end - w.start_ms < cfg.min_duration_ms {
                    None
                } else {
                    Some(interval)
                }
            })
            .collect();

        if closed.is_empty() {
            return closed;
        }

        let mut merged: Vec<(TimeMs, TimeMs, (f64, f64))> = vec![closed.remove(0)];
        for window in closed {
            let last = merged.last_mut().unwrap();
            if window.0 - last.1 < cfg.merge_gap_ms {
                // Absorb: keep the earlier anchor, extend the end.
                last.1 = last.1.max(window.1);
            } else {
                merged.push(window);
            }
        }

        merged
    }
}

impl DetectionStrategy for ContinuousActivityDetector {
    fn detect(&self, events: &[InputEvent], duration_ms: TimeMs) -> Vec<Effect> {
        if events.is_empty() || duration_ms <= 0.0 {
            return vec![];
        }

        let windows = self.collect_windows(events);
        let intervals = self.finalize_windows(windows, duration_ms);

        tracing::debug!(
            events = events.len(),
            windows = intervals.len(),
            "Zoom detection pass complete"
        );

        intervals
            .into_iter()
            .enumerate()
            .map(|(index, (start_ms, end_ms, anchor))| Effect {
                id: format!("zoom-{index}"),
                start_ms,
                end_ms,
                kind: EffectKind::Zoom(ZoomParams {
                    target_x: anchor.0,
                    target_y: anchor.1,
                    scale: self.config.zoom_scale,
                    intro_ms: self.config.intro_ms,
                    outro_ms: self.config.outro_ms,
                }),
            })
            .collect()
    }
}
