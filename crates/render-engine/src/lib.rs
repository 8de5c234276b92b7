//! Reelcut Render Engine
//!
//! Offline rendering pipeline that turns a project timeline plus pointer
//! telemetry into exported video files.
//!
//! # Pipeline Architecture
//!
//! ```text
//! timeline ─────┐
//!               ├── Chunk Planner ── per-chunk timeline slices
//! events.jsonl ─┘                          │
//!                                          ├── Camera Evaluation (zoom)
//!                                          │         │
//!                                          │         ├── Crop/Scale Compositor
//!                                          │         │         │
//!                                          │         │         ▼
//!                                          │         │   Encode (chunk_NNN.mp4)
//!                                          │         │
//!                                          ▼         ▼
//!                                    Concat Mux ── output.mp4
//! ```

pub mod backend;
pub mod chunking;
pub mod compositor;
pub mod export;
pub mod slicing;
pub mod source;

pub use backend::{
    FfmpegMuxer, FrameSource, Muxer, RenderBackend, RenderRequest, SoftwareBackend,
};
pub use chunking::{plan_chunks, validate_chunks};
pub use compositor::{BilinearBackend, Frame, NearestBackend, SourceRect, ZoomBackend};
pub use export::{BackendFactory, CancelHandle, ExportOrchestrator, ProgressSink};
pub use slicing::filter_for_window;
pub use source::FfmpegFrameSource;
