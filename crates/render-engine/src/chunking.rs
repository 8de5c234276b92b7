//! Chunk planning: partitioning a frame range into bounded render units.

use reelcut_common::{ReelcutError, ReelcutResult};
use reelcut_project_model::export::ChunkAssignment;

/// Partition `[0, total_frames)` into chunks of `chunk_size` frames.
///
/// Pure arithmetic: every chunk except possibly the last is exactly
/// `chunk_size` frames, chunks are contiguous and sorted by index, and time
/// ranges are derived from frame ranges at the given fps.
pub fn plan_chunks(
    total_frames: u64,
    chunk_size: u64,
    fps: u32,
) -> ReelcutResult<Vec<ChunkAssignment>> {
    if total_frames == 0 {
        return Err(ReelcutError::validation("total_frames must be > 0"));
    }
    if chunk_size == 0 {
        return Err(ReelcutError::validation("chunk_size must be > 0"));
    }
    if fps == 0 {
        return Err(ReelcutError::validation("fps must be > 0"));
    }

    let num_chunks = total_frames.div_ceil(chunk_size);
    let mut chunks = Vec::with_capacity(num_chunks as usize);

    for index in 0..num_chunks {
        let start_frame = index * chunk_size;
        let end_frame = ((index + 1) * chunk_size - 1).min(total_frames - 1);
        chunks.push(ChunkAssignment {
            index: index as usize,
            start_frame,
            end_frame,
            start_ms: frame_to_ms(start_frame, fps),
            end_ms: frame_to_ms(end_frame + 1, fps),
        });
    }

    Ok(chunks)
}

/// Check that externally supplied assignments satisfy the planner's own
/// invariant: sorted by index, contiguous, non-overlapping, covering
/// exactly `[0, total_frames)`.
pub fn validate_chunks(chunks: &[ChunkAssignment], total_frames: u64) -> ReelcutResult<()> {
    if chunks.is_empty() {
        return Err(ReelcutError::validation("chunk assignment list is empty"));
    }

    let mut expected_start = 0u64;
    for (position, chunk) in chunks.iter().enumerate() {
        if chunk.index != position {
            return Err(ReelcutError::validation(format!(
                "chunk at position {position} has index {}",
                chunk.index
            )));
        }
        if chunk.start_frame != expected_start {
            return Err(ReelcutError::validation(format!(
                "chunk {} starts at frame {}, expected {expected_start}",
                chunk.index, chunk.start_frame
            )));
        }
        if chunk.end_frame < chunk.start_frame {
            return Err(ReelcutError::validation(format!(
                "chunk {} has inverted frame range",
                chunk.index
            )));
        }
        expected_start = chunk.end_frame + 1;
    }

    if expected_start != total_frames {
        return Err(ReelcutError::validation(format!(
            "chunks cover [0, {expected_start}), composition has {total_frames} frames"
        )));
    }

    Ok(())
}

/// Frame index to milliseconds at the given frame rate.
pub fn frame_to_ms(frame: u64, fps: u32) -> f64 {
    frame as f64 / fps as f64 * 1000.0
}
