//! Export job inputs, chunk assignments, and progress reporting types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::event::TimeMs;
use crate::timeline::{CompositionMeta, ProjectTimeline};

/// Video codec for the final output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    H264,
    H265,
    Vp9,
}

impl VideoCodec {
    /// The ffmpeg encoder name for this codec.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::H265 => "libx265",
            Self::Vp9 => "libvpx-vp9",
        }
    }
}

/// Encoder quality preset (maps to encoder speed/quality tradeoff flags).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityPreset {
    Draft,
    Standard,
    High,
}

/// Encoder settings for an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderSettings {
    pub codec: VideoCodec,
    pub video_bitrate_kbps: u32,
    pub quality: QualityPreset,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            codec: VideoCodec::H264,
            video_bitrate_kbps: 8000,
            quality: QualityPreset::Standard,
        }
    }
}

/// How the export renders its frames.
///
/// When unset on a job the orchestrator picks by frame count: jobs that fit
/// in one chunk stream single-pass, larger jobs are chunked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStrategy {
    /// One pass, streaming frames straight into the encoder. No chunk
    /// files touch disk regardless of job length.
    SinglePass,
    /// Split into chunks rendered in parallel, then concatenated.
    Chunked,
}

/// A contiguous frame range rendered and encoded independently.
///
/// Chunks partition `[0, total_frames)`: contiguous, non-overlapping, sorted
/// by index, each `chunk_size` frames long except possibly the last.
/// `end_frame` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkAssignment {
    pub index: usize,
    pub start_frame: u64,
    pub end_frame: u64,
    pub start_ms: TimeMs,
    pub end_ms: TimeMs,
}

impl ChunkAssignment {
    /// Number of frames in this chunk.
    pub fn frame_count(&self) -> u64 {
        self.end_frame - self.start_frame + 1
    }
}

/// The complete input to one export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    /// Composition metadata. Optional at the boundary so validation can
    /// reject its absence with a typed error.
    pub composition: Option<CompositionMeta>,

    /// Segment/clip/effect graph plus per-recording telemetry.
    pub timeline: ProjectTimeline,

    /// Encoder configuration.
    pub encoder: EncoderSettings,

    /// Frames per chunk for the chunked strategy.
    pub chunk_size_frames: u64,

    /// Forces a rendering strategy instead of the frame-count heuristic.
    #[serde(default)]
    pub strategy: Option<ExportStrategy>,

    /// When true, chunks are concatenated into `output_path`; when false,
    /// the ordered chunk file list is returned to the caller, which takes
    /// ownership of combining (e.g. a distributed coordinator).
    pub combine_chunks: bool,

    /// Externally pre-assigned chunks. When present, the planner is skipped
    /// and these are validated instead.
    pub external_chunks: Option<Vec<ChunkAssignment>>,

    /// Final output file path.
    pub output_path: PathBuf,
}

/// Output of a completed export.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutput {
    /// Single combined file.
    File(PathBuf),

    /// Ordered per-chunk results; the caller owns these files now.
    Chunks(Vec<ChunkResult>),
}

/// One rendered chunk file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    pub index: usize,
    pub path: PathBuf,
    pub frame_count: u64,
}

/// Stages of the export state machine, as surfaced to progress consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    Preparing,
    Audio,
    Rendering,
    Finalizing,
    Complete,
    Failed,
    Cancelled,
}

impl ExportStage {
    /// Terminal states stop progress emission.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }
}

/// A progress message. Fire-and-forget, rate-limited by the producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Overall progress, 0-100.
    pub progress: u8,

    pub stage: ExportStage,

    /// Human-readable status line.
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_frame: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_frames: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
}

impl ProgressUpdate {
    pub fn stage(stage: ExportStage, progress: u8, message: impl Into<String>) -> Self {
        Self {
            progress,
            stage,
            message: message.into(),
            current_frame: None,
            total_frames: None,
            chunk_index: None,
            chunk_count: None,
        }
    }
}
