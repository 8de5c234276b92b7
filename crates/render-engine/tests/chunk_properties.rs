//! Property tests for the chunk planner.

use proptest::prelude::*;

use reelcut_render_engine::chunking::{plan_chunks, validate_chunks};

proptest! {
    #[test]
    fn planned_chunks_always_validate(
        total_frames in 1u64..1_000_000,
        chunk_size in 1u64..10_000,
        fps in 1u32..240,
    ) {
        let chunks = plan_chunks(total_frames, chunk_size, fps).unwrap();
        prop_assert!(validate_chunks(&chunks, total_frames).is_ok());
    }

    #[test]
    fn frame_counts_partition_the_composition(
        total_frames in 1u64..1_000_000,
        chunk_size in 1u64..10_000,
    ) {
        let chunks = plan_chunks(total_frames, chunk_size, 30).unwrap();
        let covered: u64 = chunks.iter().map(|c| c.frame_count()).sum();
        prop_assert_eq!(covered, total_frames);
        // Every chunk except the last is full sized.
        prop_assert!(chunks[..chunks.len() - 1]
            .iter()
            .all(|c| c.frame_count() == chunk_size));
        prop_assert!(chunks.last().unwrap().frame_count() <= chunk_size);
    }

    #[test]
    fn chunk_times_are_contiguous(
        total_frames in 1u64..100_000,
        chunk_size in 1u64..5_000,
        fps in 1u32..240,
    ) {
        let chunks = plan_chunks(total_frames, chunk_size, fps).unwrap();
        prop_assert!((chunks[0].start_ms).abs() < 1e-9);
        for pair in chunks.windows(2) {
            prop_assert!((pair[0].end_ms - pair[1].start_ms).abs() < 1e-6);
        }
    }
}
