//! Effect-state evaluation: (effect list, timestamp) -> camera transform.
//!
//! Inside an active zoom effect the camera moves through three phases:
//!
//! - **Intro** (`e < intro_ms`): scale eases out from 1.0 to the target,
//!   panning from frame center toward the anchor with the same eased
//!   progress value.
//! - **Tracking** (middle): scale holds at the target while the camera
//!   follows the live interpolated mouse position, optionally low-pass
//!   filtered to suppress jitter.
//! - **Outro** (`e > d - outro_ms`): scale eases back in to 1.0, panning
//!   from the last tracked position toward center.
//!
//! Outside any effect the state is the identity transform. The logical
//! camera center is never clamped here; keeping it continuous is what makes
//! the boundary-continuity properties testable. Bounds safety lives in the
//! compositor's sampled-region clamp.

use reelcut_project_model::effect::{
    active_effect_at, Effect, EffectKind, EffectState, ZoomParams, ZoomState,
};
use reelcut_project_model::event::TimeMs;

use crate::easing::{ease_in, ease_out, lerp};
use crate::interp::PointerPath;

/// Internal sampling step for the tracking-phase low-pass filter (ms).
const TRACKING_FILTER_STEP_MS: f64 = 50.0;

/// Evaluator options.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Exponential smoothing factor in `(0, 1]` for the tracking phase.
    /// `None` disables filtering and follows the raw interpolated position,
    /// which keeps evaluation bit-exact for reproducibility tests.
    pub tracking_smoothing: Option<f64>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            tracking_smoothing: Some(0.25),
        }
    }
}

/// Evaluates camera state at arbitrary timestamps.
#[derive(Debug, Clone, Default)]
pub struct EffectEvaluator {
    config: EvaluatorConfig,
}

impl EffectEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(EvaluatorConfig::default())
    }

    /// Camera state at `t`. `effects` must be sorted and non-overlapping;
    /// at most one zoom effect is active at any timestamp.
    pub fn state_at(&self, effects: &[Effect], pointer: &PointerPath, t: TimeMs) -> EffectState {
        let Some(effect) = active_effect_at(effects, t) else {
            return EffectState::IDENTITY;
        };

        let EffectKind::Zoom(params) = &effect.kind;
        let duration = effect.duration_ms();
        let elapsed = t - effect.start_ms;

        // Ramps never exceed the interval; short effects split it evenly.
        let intro = params.intro_ms.min(duration / 2.0);
        let outro = params.outro_ms.min(duration / 2.0);

        let zoom = if elapsed < intro {
            self.intro_state(params, elapsed, intro)
        } else if elapsed > duration - outro {
            let tracking_end = effect.start_ms + duration - outro;
            let last_tracked = self.tracked_position(effect, params, pointer, tracking_end, intro);
            self.outro_state(params, elapsed - (duration - outro), outro, last_tracked)
        } else {
            let (x, y) = self.tracked_position(effect, params, pointer, t, intro);
            ZoomState {
                x,
                y,
                scale: params.scale,
            }
        };

        EffectState { zoom }
    }

    fn intro_state(&self, params: &ZoomParams, elapsed: TimeMs, intro: TimeMs) -> ZoomState {
        let progress = if intro > 0.0 { elapsed / intro } else { 1.0 };
        let eased = ease_out(progress);
        ZoomState {
            x: lerp(0.5, params.target_x, eased),
            y: lerp(0.5, params.target_y, eased),
            scale: lerp(1.0, params.scale, eased),
        }
    }

    fn outro_state(
        &self,
        params: &ZoomParams,
        elapsed_in_outro: TimeMs,
        outro: TimeMs,
        last_tracked: (f64, f64),
    ) -> ZoomState {
        let progress = if outro > 0.0 {
            elapsed_in_outro / outro
        } else {
            1.0
        };
        let eased = ease_in(progress);
        ZoomState {
            x: lerp(last_tracked.0, 0.5, eased),
            y: lerp(last_tracked.1, 0.5, eased),
            scale: lerp(params.scale, 1.0, eased),
        }
    }

    /// Camera position during the tracking phase at time `t`.
    ///
    /// With smoothing enabled this folds an exponential moving average over
    /// fixed-step samples from the phase start, seeded at the anchor point.
    /// Fixed-step evaluation keeps the result a pure function of `t`.
    fn tracked_position(
        &self,
        effect: &Effect,
        params: &ZoomParams,
        pointer: &PointerPath,
        t: TimeMs,
        intro: TimeMs,
    ) -> (f64, f64) {
        let Some(alpha) = self.config.tracking_smoothing else {
            return pointer.position_at(t);
        };
        let alpha = alpha.clamp(0.0, 1.0);

        let phase_start = effect.start_ms + intro;
        let mut pos = (params.target_x, params.target_y);
        let mut sample_t = phase_start;
        while sample_t < t {
            let (sx, sy) = pointer.position_at(sample_t);
            pos.0 += alpha * (sx - pos.0);
            pos.1 += alpha * (sy - pos.1);
            sample_t += TRACKING_FILTER_STEP_MS;
        }
        let (sx, sy) = pointer.position_at(t);
        pos.0 += alpha * (sx - pos.0);
        pos.1 += alpha * (sy - pos.1);
        pos
    }
}
