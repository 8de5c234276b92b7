//! End-to-end orchestrator tests with a scripted render backend and an
//! in-process muxer, so no ffmpeg binary is needed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use reelcut_common::pool::WorkerPool;
use reelcut_common::{ReelcutError, ReelcutResult};
use reelcut_project_model::export::{
    ChunkAssignment, ExportJob, ExportOutput, ExportStage, ExportStrategy, ProgressUpdate,
};
use reelcut_project_model::timeline::{CompositionMeta, ProjectTimeline};
use reelcut_render_engine::backend::{FrameProgress, Muxer, RenderBackend, RenderRequest};
use reelcut_render_engine::export::{CancelHandle, ExportOrchestrator, ProgressSink};

/// Shared test hooks for the scripted backend. One instance is shared by all
/// backend clones an export spawns.
#[derive(Default)]
struct Script {
    /// Fail the chunk whose `start_frame` matches.
    fail_start_frame: Option<u64>,
    /// Called after every rendered frame with the global rendered count.
    frame_hook: Option<Box<dyn Fn(u64) + Send + Sync>>,
    frames_rendered: AtomicU64,
}

struct ScriptedBackend {
    script: Arc<Script>,
}

impl RenderBackend for ScriptedBackend {
    fn render(
        &mut self,
        request: &RenderRequest,
        on_frame: Option<&FrameProgress>,
    ) -> ReelcutResult<()> {
        if self.script.fail_start_frame == Some(request.start_frame) {
            return Err(ReelcutError::render("scripted chunk failure"));
        }
        for frame in 0..request.frame_count {
            if request.cancel.load(Ordering::SeqCst) {
                return Err(ReelcutError::Cancelled);
            }
            let total = self.script.frames_rendered.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(hook) = &self.script.frame_hook {
                hook(total);
            }
            if let Some(cb) = on_frame {
                cb(frame + 1);
            }
        }
        std::fs::write(
            &request.output_path,
            format!("frames={}\n", request.frame_count),
        )?;
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
struct RecordingMuxer {
    calls: Mutex<Vec<Vec<PathBuf>>>,
}

impl Muxer for RecordingMuxer {
    fn concat(&self, chunk_paths: &[PathBuf], output: &Path) -> ReelcutResult<()> {
        self.calls.lock().unwrap().push(chunk_paths.to_vec());
        let mut combined = Vec::new();
        for path in chunk_paths {
            combined.extend(std::fs::read(path)?);
        }
        std::fs::write(output, combined)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

struct Rig {
    orchestrator: ExportOrchestrator,
    muxer: Arc<RecordingMuxer>,
    script: Arc<Script>,
    /// Chunk work directories land here; dropped last.
    temp_root: tempfile::TempDir,
}

impl Rig {
    fn temp_entries(&self) -> usize {
        std::fs::read_dir(self.temp_root.path()).unwrap().count()
    }
}

fn rig(script: Script) -> Rig {
    let script = Arc::new(script);
    let muxer = Arc::new(RecordingMuxer::default());
    let temp_root = tempfile::tempdir().unwrap();
    let factory_script = Arc::clone(&script);
    let orchestrator = ExportOrchestrator::new(
        Arc::new(move || {
            Box::new(ScriptedBackend {
                script: Arc::clone(&factory_script),
            }) as Box<dyn RenderBackend>
        }),
        muxer.clone(),
        Arc::new(WorkerPool::new(2)),
    )
    .with_temp_root(temp_root.path().to_path_buf());
    Rig {
        orchestrator,
        muxer,
        script,
        temp_root,
    }
}

fn job(total_frames: u64, chunk_size: u64, output: PathBuf) -> ExportJob {
    let fps = 30;
    ExportJob {
        composition: Some(CompositionMeta {
            fps,
            duration_ms: total_frames as f64 / fps as f64 * 1000.0,
            width: 640,
            height: 360,
        }),
        timeline: ProjectTimeline::default(),
        encoder: Default::default(),
        chunk_size_frames: chunk_size,
        strategy: None,
        combine_chunks: true,
        external_chunks: None,
        output_path: output,
    }
}

fn collect_progress() -> (ProgressSink, Arc<Mutex<Vec<ProgressUpdate>>>) {
    let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::default();
    let sink_updates = Arc::clone(&updates);
    let sink: ProgressSink = Arc::new(move |u| sink_updates.lock().unwrap().push(u));
    (sink, updates)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_small_job_single_pass_skips_muxer() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.mp4");
    let rig = rig(Script::default());

    let result = rig
        .orchestrator
        .export(job(500, 2000, output.clone()), None, &CancelHandle::new())
        .await
        .unwrap();

    assert_eq!(result, ExportOutput::File(output.clone()));
    assert!(output.exists());
    assert!(rig.muxer.calls.lock().unwrap().is_empty());
    // No partial file or chunk dir left behind.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_chunked_export_combines_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.mp4");
    let rig = rig(Script::default());

    // 4500 frames at 2000/chunk makes chunks of 2000, 2000, 500 frames.
    let result = rig
        .orchestrator
        .export(job(4500, 2000, output.clone()), None, &CancelHandle::new())
        .await
        .unwrap();

    assert_eq!(result, ExportOutput::File(output.clone()));
    let calls = rig.muxer.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 3);
    let names: Vec<String> = calls[0]
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["chunk_000.mp4", "chunk_001.mp4", "chunk_002.mp4"]);

    let combined = std::fs::read_to_string(&output).unwrap();
    assert_eq!(combined, "frames=2000\nframes=2000\nframes=500\n");
    // Chunk work dir was cleaned up after muxing.
    assert_eq!(rig.temp_entries(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_single_pass_override_streams_large_job() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.mp4");
    let rig = rig(Script::default());

    // 4500 frames would normally be chunked; the override streams them in
    // one pass with no chunk files.
    let mut j = job(4500, 2000, output.clone());
    j.strategy = Some(ExportStrategy::SinglePass);

    let result = rig
        .orchestrator
        .export(j, None, &CancelHandle::new())
        .await
        .unwrap();

    assert_eq!(result, ExportOutput::File(output.clone()));
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "frames=4500\n");
    assert!(rig.muxer.calls.lock().unwrap().is_empty());
    assert_eq!(rig.temp_entries(), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_chunked_override_chunks_small_job() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.mp4");
    let rig = rig(Script::default());

    let mut j = job(500, 2000, output.clone());
    j.strategy = Some(ExportStrategy::Chunked);

    let result = rig
        .orchestrator
        .export(j, None, &CancelHandle::new())
        .await
        .unwrap();

    assert_eq!(result, ExportOutput::File(output.clone()));
    let calls = rig.muxer.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 1);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "frames=500\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_combine_false_hands_chunks_to_caller() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.mp4");
    let rig = rig(Script::default());
    let mut j = job(4500, 2000, output.clone());
    j.combine_chunks = false;

    let result = rig
        .orchestrator
        .export(j, None, &CancelHandle::new())
        .await
        .unwrap();

    let ExportOutput::Chunks(chunks) = result else {
        panic!("expected chunk list");
    };
    assert_eq!(chunks.len(), 3);
    assert_eq!(
        chunks.iter().map(|c| c.index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(
        chunks.iter().map(|c| c.frame_count).collect::<Vec<_>>(),
        vec![2000, 2000, 500]
    );
    for chunk in &chunks {
        assert!(chunk.path.exists());
    }
    assert!(rig.muxer.calls.lock().unwrap().is_empty());
    assert!(!output.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_external_chunks_are_validated() {
    let dir = tempfile::tempdir().unwrap();
    let rig = rig(Script::default());
    let mut j = job(4500, 2000, dir.path().join("out.mp4"));
    // Gap between chunk 0 and chunk 1.
    j.external_chunks = Some(vec![
        ChunkAssignment {
            index: 0,
            start_frame: 0,
            end_frame: 1999,
            start_ms: 0.0,
            end_ms: 66_666.67,
        },
        ChunkAssignment {
            index: 1,
            start_frame: 2500,
            end_frame: 4499,
            start_ms: 83_333.33,
            end_ms: 150_000.0,
        },
    ]);

    let err = rig
        .orchestrator
        .export(j, None, &CancelHandle::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ReelcutError::Validation { .. }));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cancellation_cleans_temp_and_reports_stage() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.mp4");

    let cancel = CancelHandle::new();
    let hook_cancel = cancel.clone();
    let rig = rig(Script {
        frame_hook: Some(Box::new(move |total| {
            if total == 100 {
                hook_cancel.cancel();
            }
        })),
        ..Default::default()
    });
    let (sink, updates) = collect_progress();

    let err = rig
        .orchestrator
        .export(job(4500, 2000, output.clone()), Some(sink), &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancellation());
    assert!(!output.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    // The chunk work dir is gone too.
    assert_eq!(rig.temp_entries(), 0);

    let stages: Vec<ExportStage> = updates.lock().unwrap().iter().map(|u| u.stage).collect();
    assert_eq!(stages.last(), Some(&ExportStage::Cancelled));
    assert!(!stages.contains(&ExportStage::Complete));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_chunk_failure_fails_export_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.mp4");
    let rig = rig(Script {
        fail_start_frame: Some(2000),
        ..Default::default()
    });
    let (sink, updates) = collect_progress();

    let err = rig
        .orchestrator
        .export(
            job(4500, 2000, output.clone()),
            Some(sink),
            &CancelHandle::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ReelcutError::RenderBackend { .. }));
    assert!(!output.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(rig.temp_entries(), 0);
    assert_eq!(
        updates.lock().unwrap().last().map(|u| u.stage),
        Some(ExportStage::Failed)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_export_rejected_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let hook_gate = Arc::clone(&gate);
    let rig = Arc::new(rig(Script {
        frame_hook: Some(Box::new(move |_| {
            while !hook_gate.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        })),
        ..Default::default()
    }));

    let first_rig = Arc::clone(&rig);
    let first_output = dir.path().join("first.mp4");
    let first = tokio::spawn(async move {
        first_rig
            .orchestrator
            .export(job(500, 2000, first_output), None, &CancelHandle::new())
            .await
    });

    // Wait until the first export is actually rendering.
    while rig.script.frames_rendered.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }

    let err = rig
        .orchestrator
        .export(
            job(500, 2000, dir.path().join("second.mp4")),
            None,
            &CancelHandle::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ReelcutError::ExportAlreadyRunning));

    gate.store(true, Ordering::SeqCst);
    first.await.unwrap().unwrap();

    // The slot is free again after the first export finishes.
    let again = rig
        .orchestrator
        .export(
            job(500, 2000, dir.path().join("third.mp4")),
            None,
            &CancelHandle::new(),
        )
        .await;
    assert!(again.is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_progress_is_monotone_and_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let rig = rig(Script::default());
    let (sink, updates) = collect_progress();

    rig.orchestrator
        .export(
            job(4500, 2000, dir.path().join("out.mp4")),
            Some(sink),
            &CancelHandle::new(),
        )
        .await
        .unwrap();

    let updates = updates.lock().unwrap();
    let percents: Vec<u8> = updates.iter().map(|u| u.progress).collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
    assert_eq!(percents.last(), Some(&100));
    assert_eq!(updates.last().unwrap().stage, ExportStage::Complete);
}
