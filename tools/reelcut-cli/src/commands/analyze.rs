//! Derive zoom effects from a project's pointer telemetry.

use std::path::PathBuf;

use reelcut_common::config::AppConfig;
use reelcut_processing_core::{ContinuousActivityDetector, DetectionStrategy, DetectorConfig};
use reelcut_project_model::event::normalize_events;
use reelcut_project_model::Project;

#[allow(clippy::too_many_arguments)]
pub fn run(
    path: PathBuf,
    threshold_px: Option<f64>,
    idle_timeout_ms: Option<f64>,
    min_duration_ms: Option<f64>,
    merge_gap_ms: Option<f64>,
    scale: f64,
    write: bool,
) -> anyhow::Result<()> {
    println!("Analyzing project: {}", path.display());

    let mut project =
        Project::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;

    let defaults = AppConfig::load().detector;
    let config = DetectorConfig {
        activity_threshold_px: threshold_px.unwrap_or(defaults.activity_threshold_px),
        idle_timeout_ms: idle_timeout_ms.unwrap_or(defaults.idle_timeout_ms),
        min_duration_ms: min_duration_ms.unwrap_or(defaults.min_duration_ms),
        merge_gap_ms: merge_gap_ms.unwrap_or(defaults.merge_gap_ms),
        fade_ms: defaults.fade_ms,
        zoom_scale: scale,
        ..Default::default()
    };
    let detector = ContinuousActivityDetector::new(config);

    let mut effects = Vec::new();
    for recording in &mut project.timeline.recordings {
        recording.events = normalize_events(std::mem::take(&mut recording.events));
        if recording.events.is_empty() {
            println!("  {}: no events, skipping", recording.id);
            continue;
        }
        let detected = detector.detect(&recording.events, project.composition.duration_ms);
        println!(
            "  {}: {} events, {} zoom effect(s)",
            recording.id,
            recording.events.len(),
            detected.len()
        );
        effects.extend(detected);
    }

    for effect in &effects {
        println!(
            "    {} [{:.0}ms, {:.0}ms] ({:.1}s)",
            effect.id,
            effect.start_ms,
            effect.end_ms,
            effect.duration_ms() / 1000.0
        );
    }

    if write {
        project.timeline.effects = effects;
        project
            .save(&path)
            .map_err(|e| anyhow::anyhow!("Failed to save project: {e}"))?;
        println!("Effects written to: {}", path.display());
    } else {
        println!("{}", serde_json::to_string_pretty(&effects)?);
    }

    println!("Analysis complete.");
    Ok(())
}
