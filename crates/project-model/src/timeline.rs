//! Project timeline: segments, clips, recordings, and composition metadata.
//!
//! Times on segments are absolute milliseconds on the composition timeline;
//! clip ranges are relative to their owning segment so a segment can be
//! moved without rewriting its clips.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::effect::Effect;
use crate::event::{InputEvent, TimeMs};

/// Composition-level metadata required to render anything at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionMeta {
    /// Output frame rate.
    pub fps: u32,

    /// Total composition duration (ms).
    pub duration_ms: TimeMs,

    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,
}

impl CompositionMeta {
    /// Total frame count at the composition frame rate.
    pub fn total_frames(&self) -> u64 {
        (self.duration_ms / 1000.0 * self.fps as f64).ceil() as u64
    }
}

/// The full editable timeline of a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectTimeline {
    /// Ordered segments on the composition timeline.
    pub segments: Vec<Segment>,

    /// Source recordings referenced by clips.
    pub recordings: Vec<Recording>,

    /// Sorted, non-overlapping effect intervals.
    pub effects: Vec<Effect>,
}

/// A contiguous region of the composition timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,

    /// Absolute start on the composition timeline (ms).
    pub start_ms: TimeMs,

    /// Absolute end on the composition timeline (ms).
    pub end_ms: TimeMs,

    /// Clips inside this segment, with segment-relative time ranges.
    pub clips: Vec<Clip>,
}

/// A clip placing a slice of a recording inside a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub id: String,

    /// Which recording this clip plays.
    pub recording_id: String,

    /// Start relative to the owning segment (ms).
    pub start_ms: TimeMs,

    /// End relative to the owning segment (ms).
    pub end_ms: TimeMs,
}

/// A captured source recording and its telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub id: String,

    /// Capture dimensions in pixels.
    pub width: u32,
    pub height: u32,

    /// Capture frame rate.
    pub fps: u32,

    /// Location of the captured video, if materialized.
    pub video_url: Option<String>,

    /// Timestamp-sorted input events (moves, clicks, keys, scrolls).
    pub events: Vec<InputEvent>,
}

impl Segment {
    pub fn duration_ms(&self) -> TimeMs {
        self.end_ms - self.start_ms
    }
}

impl ProjectTimeline {
    /// Look up a recording by id.
    pub fn recording(&self, id: &str) -> Option<&Recording> {
        self.recordings.iter().find(|r| r.id == id)
    }

    /// Recording ids referenced by at least one clip.
    pub fn referenced_recording_ids(&self) -> HashSet<String> {
        self.segments
            .iter()
            .flat_map(|s| s.clips.iter())
            .map(|c| c.recording_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_frames_rounds_up() {
        let meta = CompositionMeta {
            fps: 30,
            duration_ms: 1001.0,
            width: 1920,
            height: 1080,
        };
        // 1.001s * 30fps = 30.03 frames -> 31
        assert_eq!(meta.total_frames(), 31);
    }

    #[test]
    fn test_referenced_recordings() {
        let timeline = ProjectTimeline {
            segments: vec![Segment {
                id: "s1".into(),
                start_ms: 0.0,
                end_ms: 1000.0,
                clips: vec![Clip {
                    id: "c1".into(),
                    recording_id: "rec-a".into(),
                    start_ms: 0.0,
                    end_ms: 1000.0,
                }],
            }],
            recordings: vec![
                Recording {
                    id: "rec-a".into(),
                    width: 1920,
                    height: 1080,
                    fps: 30,
                    video_url: Some("rec-a.mp4".into()),
                    events: vec![],
                },
                Recording {
                    id: "rec-b".into(),
                    width: 1920,
                    height: 1080,
                    fps: 30,
                    video_url: Some("rec-b.mp4".into()),
                    events: vec![],
                },
            ],
            effects: vec![],
        };

        let referenced = timeline.referenced_recording_ids();
        assert!(referenced.contains("rec-a"));
        assert!(!referenced.contains("rec-b"));
    }

    #[test]
    fn test_timeline_roundtrip() {
        let timeline = ProjectTimeline::default();
        let json = serde_json::to_string(&timeline).unwrap();
        let parsed: ProjectTimeline = serde_json::from_str(&json).unwrap();
        assert_eq!(timeline, parsed);
    }
}
