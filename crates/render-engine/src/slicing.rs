//! Timeline slicing: restricting a project timeline to a chunk's time window.
//!
//! Each chunk renders from a self-contained timeline whose clock starts at
//! zero. Segments and clips are clamped and rebased, events are filtered and
//! rebased, and effects are shifted without clamping so that a zoom whose
//! intro began before the window keeps its phase inside it.

use reelcut_project_model::event::InputEvent;
use reelcut_project_model::timeline::{Clip, ProjectTimeline, Recording, Segment};
use reelcut_project_model::TimeMs;

/// Restrict `timeline` to the half-open window `[start_ms, end_ms)` and
/// rebase all times so the window starts at zero.
pub fn filter_for_window(
    timeline: &ProjectTimeline,
    start_ms: TimeMs,
    end_ms: TimeMs,
) -> ProjectTimeline {
    let segments: Vec<Segment> = timeline
        .segments
        .iter()
        .filter_map(|segment| slice_segment(segment, start_ms, end_ms))
        .collect();

    let referenced: std::collections::HashSet<&str> = segments
        .iter()
        .flat_map(|s| s.clips.iter())
        .map(|c| c.recording_id.as_str())
        .collect();

    let recordings: Vec<Recording> = timeline
        .recordings
        .iter()
        .filter(|r| referenced.contains(r.id.as_str()))
        .map(|r| Recording {
            events: slice_events(&r.events, start_ms, end_ms),
            ..r.clone()
        })
        .collect();

    // Effects are shifted, never clamped. An effect that started before the
    // window gets a negative start so its intro ramp is already complete by
    // t = 0; one that ends past the window keeps its outro after end_ms.
    let effects = timeline
        .effects
        .iter()
        .filter(|e| e.start_ms < end_ms && e.end_ms > start_ms)
        .map(|e| {
            let mut shifted = e.clone();
            shifted.start_ms -= start_ms;
            shifted.end_ms -= start_ms;
            shifted
        })
        .collect();

    ProjectTimeline {
        segments,
        recordings,
        effects,
    }
}

fn slice_segment(segment: &Segment, start_ms: TimeMs, end_ms: TimeMs) -> Option<Segment> {
    if segment.start_ms >= end_ms || segment.end_ms <= start_ms {
        return None;
    }

    let clipped_start = segment.start_ms.max(start_ms);
    let clipped_end = segment.end_ms.min(end_ms);

    // Clips are segment-relative, so rebase them against the portion of the
    // segment that was cut away at the front.
    let front_trim = clipped_start - segment.start_ms;
    let visible_len = clipped_end - clipped_start;

    let clips: Vec<Clip> = segment
        .clips
        .iter()
        .filter_map(|clip| {
            if clip.start_ms >= front_trim + visible_len || clip.end_ms <= front_trim {
                return None;
            }
            Some(Clip {
                start_ms: (clip.start_ms - front_trim).max(0.0),
                end_ms: (clip.end_ms - front_trim).min(visible_len),
                ..clip.clone()
            })
        })
        .collect();

    if clips.is_empty() && !segment.clips.is_empty() {
        return None;
    }

    Some(Segment {
        start_ms: clipped_start - start_ms,
        end_ms: clipped_end - start_ms,
        clips,
        ..segment.clone()
    })
}

fn slice_events(events: &[InputEvent], start_ms: TimeMs, end_ms: TimeMs) -> Vec<InputEvent> {
    events
        .iter()
        .filter(|e| e.timestamp_ms >= start_ms && e.timestamp_ms < end_ms)
        .map(|e| {
            let mut rebased = e.clone();
            rebased.timestamp_ms -= start_ms;
            rebased
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcut_project_model::effect::{Effect, EffectKind, ZoomParams};

    fn zoom(id: &str, start_ms: TimeMs, end_ms: TimeMs) -> Effect {
        Effect {
            id: id.to_string(),
            start_ms,
            end_ms,
            kind: EffectKind::Zoom(ZoomParams {
                target_x: 0.5,
                target_y: 0.5,
                scale: 2.0,
                intro_ms: 500.0,
                outro_ms: 700.0,
            }),
        }
    }

    fn timeline() -> ProjectTimeline {
        ProjectTimeline {
            segments: vec![Segment {
                id: "seg-1".into(),
                start_ms: 0.0,
                end_ms: 10_000.0,
                clips: vec![Clip {
                    id: "clip-1".into(),
                    recording_id: "rec-1".into(),
                    start_ms: 0.0,
                    end_ms: 10_000.0,
                }],
            }],
            recordings: vec![Recording {
                id: "rec-1".into(),
                width: 1920,
                height: 1080,
                fps: 30,
                video_url: Some("rec-1.mp4".into()),
                events: vec![
                    InputEvent::pointer(1000.0, 100.0, 100.0, 1920, 1080),
                    InputEvent::pointer(3000.0, 200.0, 200.0, 1920, 1080),
                    InputEvent::pointer(5000.0, 300.0, 300.0, 1920, 1080),
                ],
            }],
            effects: vec![zoom("z-1", 1000.0, 4000.0), zoom("z-2", 8000.0, 9000.0)],
        }
    }

    #[test]
    fn test_segment_clamped_and_rebased() {
        let sliced = filter_for_window(&timeline(), 2000.0, 6000.0);
        assert_eq!(sliced.segments.len(), 1);
        assert_eq!(sliced.segments[0].start_ms, 0.0);
        assert_eq!(sliced.segments[0].end_ms, 4000.0);
    }

    #[test]
    fn test_events_filtered_half_open() {
        let sliced = filter_for_window(&timeline(), 3000.0, 5000.0);
        let events = &sliced.recordings[0].events;
        // 3000 is in, 5000 is out.
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].timestamp_ms, 0.0);
    }

    #[test]
    fn test_effect_shifted_not_clamped() {
        let sliced = filter_for_window(&timeline(), 2000.0, 6000.0);
        assert_eq!(sliced.effects.len(), 1);
        // z-1 began 1000ms before the window: negative start keeps its phase.
        assert_eq!(sliced.effects[0].start_ms, -1000.0);
        assert_eq!(sliced.effects[0].end_ms, 2000.0);
    }

    #[test]
    fn test_effect_outside_window_dropped() {
        let sliced = filter_for_window(&timeline(), 2000.0, 6000.0);
        assert!(sliced.effects.iter().all(|e| e.id != "z-2"));
    }

    #[test]
    fn test_unreferenced_recording_dropped() {
        let mut tl = timeline();
        tl.recordings.push(Recording {
            id: "rec-orphan".into(),
            width: 1280,
            height: 720,
            fps: 30,
            video_url: None,
            events: vec![],
        });
        let sliced = filter_for_window(&tl, 0.0, 10_000.0);
        assert_eq!(sliced.recordings.len(), 1);
        assert_eq!(sliced.recordings[0].id, "rec-1");
    }

    #[test]
    fn test_full_window_is_idempotent() {
        let tl = timeline();
        let once = filter_for_window(&tl, 0.0, 10_000.0);
        let twice = filter_for_window(&once, 0.0, 10_000.0);
        assert_eq!(once.segments.len(), twice.segments.len());
        assert_eq!(once.effects.len(), twice.effects.len());
        assert_eq!(
            once.recordings[0].events.len(),
            twice.recordings[0].events.len()
        );
        assert_eq!(once.effects[0].start_ms, twice.effects[0].start_ms);
    }
}
