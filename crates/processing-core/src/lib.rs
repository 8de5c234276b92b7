//! Reelcut Processing Core
//!
//! Pure computation turning telemetry into camera decisions:
//! - **Detector:** Find activity windows in pointer streams and emit zoom effects
//! - **Evaluator:** Resolve the camera transform at any timestamp
//! - **Easing/Interp:** Curves and pointer-path interpolation used by both
//!
//! This crate does no I/O. All inputs are data; all outputs are data.

pub mod detector;
pub mod easing;
pub mod evaluator;
pub mod interp;

pub use detector::{ContinuousActivityDetector, DetectionStrategy, DetectorConfig};
pub use evaluator::{EffectEvaluator, EvaluatorConfig};
pub use interp::PointerPath;
