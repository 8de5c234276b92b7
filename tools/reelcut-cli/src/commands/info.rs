//! Show project information.

use std::path::PathBuf;

use reelcut_project_model::Project;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let project =
        Project::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    let comp = &project.composition;
    println!("Project: {}", path.display());
    println!(
        "  Composition: {}x{} @ {}fps, {:.1}s ({} frames)",
        comp.width,
        comp.height,
        comp.fps,
        comp.duration_ms / 1000.0,
        comp.total_frames()
    );
    println!();

    println!("Segments: {}", project.timeline.segments.len());
    for segment in &project.timeline.segments {
        println!(
            "  {} [{:.0}ms, {:.0}ms] {} clip(s)",
            segment.id,
            segment.start_ms,
            segment.end_ms,
            segment.clips.len()
        );
    }
    println!();

    println!("Recordings: {}", project.timeline.recordings.len());
    for recording in &project.timeline.recordings {
        println!(
            "  {} {}x{} @ {}fps, {} event(s), video: {}",
            recording.id,
            recording.width,
            recording.height,
            recording.fps,
            recording.events.len(),
            recording.video_url.as_deref().unwrap_or("<none>")
        );
    }
    println!();

    println!("Effects: {}", project.timeline.effects.len());
    for effect in &project.timeline.effects {
        println!(
            "  {} [{:.0}ms, {:.0}ms] ({:.1}s)",
            effect.id,
            effect.start_ms,
            effect.end_ms,
            effect.duration_ms() / 1000.0
        );
    }

    Ok(())
}
