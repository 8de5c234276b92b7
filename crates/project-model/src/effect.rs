//! Timeline effects and per-frame camera state.
//!
//! Effects are stored intervals on the timeline; [`EffectState`] is the
//! ephemeral camera transform recomputed per timestamp, never persisted.

use serde::{Deserialize, Serialize};

use crate::event::TimeMs;

/// Validation errors for effect data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EffectError {
    #[error("effect '{id}' has start {start_ms} >= end {end_ms}")]
    InvalidInterval {
        id: String,
        start_ms: TimeMs,
        end_ms: TimeMs,
    },

    #[error("effect '{id}' has zoom scale {scale}, must be > 1.0")]
    InvalidScale { id: String, scale: f64 },

    #[error("effects '{first}' and '{second}' of the same kind overlap")]
    Overlap { first: String, second: String },
}

/// A timeline effect interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    /// Stable identifier, unique within a timeline.
    pub id: String,

    /// Interval start (ms on the recording timeline).
    pub start_ms: TimeMs,

    /// Interval end (ms on the recording timeline).
    pub end_ms: TimeMs,

    /// Effect payload by kind.
    #[serde(flatten)]
    pub kind: EffectKind,
}

/// Closed union of effect kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectKind {
    /// Camera zoom toward an anchor point.
    Zoom(ZoomParams),
}

/// Parameters of a zoom effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoomParams {
    /// Anchor X, normalized 0-1.
    pub target_x: f64,

    /// Anchor Y, normalized 0-1.
    pub target_y: f64,

    /// Magnification at full zoom, > 1.0.
    pub scale: f64,

    /// Intro ramp duration (ms). Fast attack.
    pub intro_ms: TimeMs,

    /// Outro ramp duration (ms). Slightly slower release.
    pub outro_ms: TimeMs,
}

impl Effect {
    /// Interval duration in ms.
    pub fn duration_ms(&self) -> TimeMs {
        self.end_ms - self.start_ms
    }

    /// Whether the timestamp falls inside this effect's interval.
    pub fn contains(&self, t: TimeMs) -> bool {
        t >= self.start_ms && t <= self.end_ms
    }

    /// Validate this effect's own invariants.
    pub fn validate(&self) -> Result<(), EffectError> {
        if self.start_ms >= self.end_ms {
            return Err(EffectError::InvalidInterval {
                id: self.id.clone(),
                start_ms: self.start_ms,
                end_ms: self.end_ms,
            });
        }
        match &self.kind {
            EffectKind::Zoom(params) if params.scale <= 1.0 => Err(EffectError::InvalidScale {
                id: self.id.clone(),
                scale: params.scale,
            }),
            _ => Ok(()),
        }
    }
}

/// Validate a sorted effect list: each effect valid, and no two effects of
/// the same kind overlapping.
pub fn validate_effects(effects: &[Effect]) -> Result<(), EffectError> {
    for effect in effects {
        effect.validate()?;
    }
    for pair in effects.windows(2) {
        let same_kind =
            std::mem::discriminant(&pair[0].kind) == std::mem::discriminant(&pair[1].kind);
        if same_kind && pair[1].start_ms < pair[0].end_ms {
            return Err(EffectError::Overlap {
                first: pair[0].id.clone(),
                second: pair[1].id.clone(),
            });
        }
    }
    Ok(())
}

/// Find the effect active at `t`, if any. Assumes a non-overlapping sorted
/// list, so at most one match exists.
pub fn active_effect_at(effects: &[Effect], t: TimeMs) -> Option<&Effect> {
    effects.iter().find(|e| e.contains(t))
}

/// Ephemeral camera transform at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectState {
    pub zoom: ZoomState,
}

/// Zoom portion of the camera transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomState {
    /// Camera center X, normalized. May lie outside `[0, 1]` while zoomed;
    /// the compositor clamps the sampled region, not this coordinate.
    pub x: f64,

    /// Camera center Y, normalized.
    pub y: f64,

    /// Current magnification, 1.0 = no zoom.
    pub scale: f64,
}

impl EffectState {
    /// The no-op camera: centered, unscaled.
    pub const IDENTITY: EffectState = EffectState {
        zoom: ZoomState {
            x: 0.5,
            y: 0.5,
            scale: 1.0,
        },
    };
}

impl Default for EffectState {
    fn default() -> Self {
        Self::IDENTITY
    }
}
