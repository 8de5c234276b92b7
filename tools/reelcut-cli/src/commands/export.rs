//! Export a project to video.

use std::path::PathBuf;
use std::sync::Arc;

use reelcut_common::config::AppConfig;
use reelcut_common::pool::WorkerPool;
use reelcut_project_model::export::{
    EncoderSettings, ExportJob, ExportOutput, ExportStrategy, VideoCodec,
};
use reelcut_project_model::Project;
use reelcut_render_engine::backend::{FfmpegMuxer, RenderBackend, SoftwareBackend};
use reelcut_render_engine::compositor::BilinearBackend;
use reelcut_render_engine::export::{CancelHandle, ExportOrchestrator, ProgressSink};
use reelcut_render_engine::source::FfmpegFrameSource;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    path: PathBuf,
    output: Option<PathBuf>,
    chunk_size: Option<u64>,
    combine: bool,
    single_pass: bool,
    codec: String,
    bitrate_kbps: Option<u32>,
) -> anyhow::Result<()> {
    println!("Exporting project: {}", path.display());

    let project =
        Project::load(&path).map_err(|e| anyhow::anyhow!("Failed to load project: {e}"))?;
    let base_dir = path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let codec = match codec.as_str() {
        "h264" => VideoCodec::H264,
        "h265" => VideoCodec::H265,
        "vp9" => VideoCodec::Vp9,
        other => {
            return Err(anyhow::anyhow!("Unknown codec: {other}. Use: h264, h265, vp9"));
        }
    };

    let defaults = AppConfig::load().export;
    let output_path = output.unwrap_or_else(|| base_dir.join("output.mp4"));
    let job = ExportJob {
        composition: Some(project.composition.clone()),
        timeline: project.timeline.clone(),
        encoder: EncoderSettings {
            codec,
            video_bitrate_kbps: bitrate_kbps.unwrap_or(defaults.video_bitrate_kbps),
            ..Default::default()
        },
        chunk_size_frames: chunk_size.unwrap_or(defaults.chunk_size_frames),
        strategy: single_pass.then_some(ExportStrategy::SinglePass),
        combine_chunks: combine,
        external_chunks: None,
        output_path: output_path.clone(),
    };

    println!("  Output: {}", output_path.display());
    println!(
        "  Resolution: {}x{} @ {}fps, {} frames",
        project.composition.width,
        project.composition.height,
        project.composition.fps,
        project.composition.total_frames()
    );

    // Source media is validated once here; workers clone the validated set.
    let source = Arc::new(FfmpegFrameSource::from_timeline(&project.timeline, &base_dir)?);
    let orchestrator = ExportOrchestrator::new(
        Arc::new(move || {
            Box::new(SoftwareBackend::new(
                Box::new(BilinearBackend),
                Box::new(source.instantiate()),
            )) as Box<dyn RenderBackend>
        }),
        Arc::new(FfmpegMuxer),
        Arc::new(WorkerPool::from_hardware()),
    );

    let cancel = CancelHandle::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling export...");
            ctrl_c_cancel.cancel();
        }
    });

    let progress: ProgressSink = Arc::new(|update| {
        match (update.current_frame, update.total_frames) {
            (Some(current), Some(total)) => {
                print!("\r  [{:>3}%] {} ({current}/{total} frames)  ", update.progress, update.message);
            }
            _ => print!("\r  [{:>3}%] {}  ", update.progress, update.message),
        }
        use std::io::Write;
        let _ = std::io::stdout().flush();
    });

    match orchestrator.export(job, Some(progress), &cancel).await {
        Ok(ExportOutput::File(path)) => {
            println!("\nExport complete: {}", path.display());
        }
        Ok(ExportOutput::Chunks(chunks)) => {
            println!("\nExport complete: {} chunk file(s)", chunks.len());
            for chunk in chunks {
                println!("  {} ({} frames)", chunk.path.display(), chunk.frame_count);
            }
        }
        Err(e) if e.is_cancellation() => {
            println!("\nExport cancelled.");
        }
        Err(e) => return Err(anyhow::anyhow!("Export failed: {e}")),
    }

    Ok(())
}
