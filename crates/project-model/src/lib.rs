//! Reelcut Project Model
//!
//! Defines the core data contracts for Reelcut projects:
//! - **Events:** Timestamped input events (pointer, click, key, scroll)
//! - **Effects:** Zoom intervals and the ephemeral per-frame camera state
//! - **Timeline:** Segments, clips, recordings, composition metadata
//! - **Export:** Job inputs, chunk assignments, and progress messages
//! - **Project:** The on-disk project document
//!
//! All payloads are closed tagged unions validated once on ingestion, so
//! everything downstream operates on fully-typed data.

pub mod effect;
pub mod event;
pub mod export;
pub mod project;
pub mod timeline;

pub use effect::*;
pub use event::*;
pub use export::*;
pub use project::{Project, ProjectFileError};
pub use timeline::*;
