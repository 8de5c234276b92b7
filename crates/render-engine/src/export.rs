//! Export orchestration: validation, chunk planning, render scheduling,
//! progress reporting, and final muxing.
//!
//! The orchestrator is a state machine over [`ExportStage`]. One export runs
//! at a time per orchestrator; a second submission while one is in flight is
//! rejected with `ExportAlreadyRunning`. All temp artifacts are removed on
//! every exit path, including failure and cancellation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use reelcut_common::pool::{PoolError, Priority, WorkerPool};
use reelcut_common::{ReelcutError, ReelcutResult};
use reelcut_project_model::effect::validate_effects;
use reelcut_project_model::export::{
    ChunkAssignment, ChunkResult, ExportJob, ExportOutput, ExportStage, ExportStrategy,
    ProgressUpdate,
};
use reelcut_project_model::timeline::CompositionMeta;

use crate::backend::{FrameProgress, Muxer, RenderBackend, RenderRequest};
use crate::chunking::{plan_chunks, validate_chunks};
use crate::slicing::filter_for_window;

/// Minimum wall-clock gap between rendering progress emissions.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Cooperative cancellation token shared between the caller and the render
/// workers. Workers check it between frames.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. In-flight chunks stop at the next frame
    /// boundary; queued chunks stop before their first frame.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }
}

/// Fire-and-forget progress consumer.
pub type ProgressSink = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Produces one backend instance per render task, so parallel chunks never
/// share mutable backend state.
pub type BackendFactory = Arc<dyn Fn() -> Box<dyn RenderBackend> + Send + Sync>;

/// Drives one export job end to end.
pub struct ExportOrchestrator {
    backend_factory: BackendFactory,
    muxer: Arc<dyn Muxer>,
    pool: Arc<WorkerPool>,
    temp_root: PathBuf,
    running: Arc<AtomicBool>,
}

impl ExportOrchestrator {
    pub fn new(backend_factory: BackendFactory, muxer: Arc<dyn Muxer>, pool: Arc<WorkerPool>) -> Self {
        Self {
            backend_factory,
            muxer,
            pool,
            temp_root: std::env::temp_dir(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Place chunk work directories under `root` instead of the OS temp dir.
    pub fn with_temp_root(mut self, root: PathBuf) -> Self {
        self.temp_root = root;
        self
    }

    /// Run an export job to completion.
    ///
    /// Emits progress through `progress` (rate-limited while rendering) and
    /// always finishes with a terminal stage update. Returns the combined
    /// output file, or the ordered chunk list when `combine_chunks` is false.
    pub async fn export(
        &self,
        job: ExportJob,
        progress: Option<ProgressSink>,
        cancel: &CancelHandle,
    ) -> ReelcutResult<ExportOutput> {
        let _slot = SlotGuard::acquire(&self.running)?;
        let reporter = ProgressReporter::new(progress);

        let result = self.run(job, &reporter, cancel).await;
        match &result {
            Ok(_) => reporter.stage(ExportStage::Complete, 100, "Export complete"),
            Err(err) if err.is_cancellation() => {
                reporter.stage(ExportStage::Cancelled, 0, "Export cancelled")
            }
            Err(err) => reporter.stage(ExportStage::Failed, 0, format!("Export failed: {err}")),
        }
        result
    }

    async fn run(
        &self,
        job: ExportJob,
        reporter: &ProgressReporter,
        cancel: &CancelHandle,
    ) -> ReelcutResult<ExportOutput> {
        reporter.stage(ExportStage::Preparing, 0, "Validating export job");
        let composition = validate_job(&job)?;
        let total_frames = composition.total_frames();

        let plan = match (&job.external_chunks, job.strategy) {
            (Some(_), Some(ExportStrategy::SinglePass)) => {
                return Err(ReelcutError::validation(
                    "External chunk assignments conflict with a single-pass strategy",
                ));
            }
            (Some(chunks), _) => {
                validate_chunks(chunks, total_frames)?;
                Plan::Chunked(chunks.clone())
            }
            (None, Some(ExportStrategy::SinglePass)) => Plan::SinglePass,
            (None, None) if total_frames <= job.chunk_size_frames => Plan::SinglePass,
            (None, _) => Plan::Chunked(plan_chunks(
                total_frames,
                job.chunk_size_frames,
                composition.fps,
            )?),
        };

        match &plan {
            Plan::SinglePass => {
                tracing::info!(total_frames, "Export planned as single pass");
            }
            Plan::Chunked(chunks) => {
                tracing::info!(total_frames, chunks = chunks.len(), "Export planned as chunks");
            }
        }
        reporter.stage(ExportStage::Preparing, 10, "Export plan ready");

        match plan {
            Plan::SinglePass => {
                self.render_single(&job, &composition, total_frames, reporter, cancel)
                    .await
            }
            Plan::Chunked(chunks) => {
                self.render_chunked(&job, &composition, total_frames, chunks, reporter, cancel)
                    .await
            }
        }
    }

    async fn render_single(
        &self,
        job: &ExportJob,
        composition: &CompositionMeta,
        total_frames: u64,
        reporter: &ProgressReporter,
        cancel: &CancelHandle,
    ) -> ReelcutResult<ExportOutput> {
        // Encode to a sibling temp file, then rename. A failed or cancelled
        // run never leaves a partial file at the output path.
        let temp_path = job.output_path.with_extension("partial.mp4");
        let guard = TempArtifacts::file(temp_path.clone());

        let request = RenderRequest {
            timeline: filter_for_window(&job.timeline, 0.0, composition.duration_ms),
            composition: composition.clone(),
            encoder: job.encoder.clone(),
            start_frame: 0,
            frame_count: total_frames,
            output_path: temp_path.clone(),
            cancel: cancel.flag(),
        };

        let reporter_frames = reporter.clone();
        let on_frame: FrameProgress = Box::new(move |rendered| {
            let progress = 10 + (rendered.saturating_mul(85) / total_frames.max(1)) as u8;
            reporter_frames.rendering(ProgressUpdate {
                current_frame: Some(rendered),
                total_frames: Some(total_frames),
                ..ProgressUpdate::stage(ExportStage::Rendering, progress, "Rendering frames")
            });
        });

        let factory = Arc::clone(&self.backend_factory);
        let handle = self.pool.execute(Priority::NORMAL, move || {
            let mut backend = factory();
            backend.render(&request, Some(&on_frame))
        });
        handle.join().await.map_err(pool_error)??;

        reporter.stage(ExportStage::Finalizing, 95, "Finalizing output");
        std::fs::rename(&temp_path, &job.output_path)?;
        guard.release();

        Ok(ExportOutput::File(job.output_path.clone()))
    }

    async fn render_chunked(
        &self,
        job: &ExportJob,
        composition: &CompositionMeta,
        total_frames: u64,
        chunks: Vec<ChunkAssignment>,
        reporter: &ProgressReporter,
        cancel: &CancelHandle,
    ) -> ReelcutResult<ExportOutput> {
        let chunk_count = chunks.len();
        let work_dir = self.chunk_work_dir(&job.output_path);
        std::fs::create_dir_all(&work_dir)?;
        let guard = TempArtifacts::dir(work_dir.clone());

        let frames_done = Arc::new(AtomicU64::new(0));
        let mut handles = Vec::with_capacity(chunk_count);

        for chunk in &chunks {
            let chunk_path = work_dir.join(format!("chunk_{:03}.mp4", chunk.index));
            let request = RenderRequest {
                timeline: filter_for_window(&job.timeline, chunk.start_ms, chunk.end_ms),
                composition: CompositionMeta {
                    duration_ms: chunk.end_ms - chunk.start_ms,
                    ..composition.clone()
                },
                encoder: job.encoder.clone(),
                start_frame: chunk.start_frame,
                frame_count: chunk.frame_count(),
                output_path: chunk_path.clone(),
                cancel: cancel.flag(),
            };

            let reporter_frames = reporter.clone();
            let frames_done = Arc::clone(&frames_done);
            let chunk_index = chunk.index;
            let chunk_frames_seen = AtomicU64::new(0);
            let on_frame: FrameProgress = Box::new(move |rendered| {
                let previous = chunk_frames_seen.swap(rendered, Ordering::SeqCst);
                let done =
                    frames_done.fetch_add(rendered - previous, Ordering::SeqCst) + (rendered - previous);
                let progress = 10 + (done.saturating_mul(80) / total_frames.max(1)) as u8;
                reporter_frames.rendering(ProgressUpdate {
                    current_frame: Some(done),
                    total_frames: Some(total_frames),
                    chunk_index: Some(chunk_index),
                    chunk_count: Some(chunk_count),
                    ..ProgressUpdate::stage(ExportStage::Rendering, progress, "Rendering chunks")
                });
            });

            let factory = Arc::clone(&self.backend_factory);
            let index = chunk.index;
            let frame_count = chunk.frame_count();
            handles.push(self.pool.execute(Priority::NORMAL, move || {
                let span = tracing::info_span!("chunk", index);
                let _enter = span.enter();
                let mut backend = factory();
                backend.render(&request, Some(&on_frame))?;
                Ok::<ChunkResult, ReelcutError>(ChunkResult {
                    index,
                    path: chunk_path,
                    frame_count,
                })
            }));
        }

        // Join everything before touching the temp dir, even after a
        // failure, so no worker is still writing when cleanup runs.
        let mut results = Vec::with_capacity(chunk_count);
        let mut first_error: Option<ReelcutError> = None;
        for handle in handles {
            match handle.join().await.map_err(pool_error) {
                Ok(Ok(result)) => results.push(result),
                Ok(Err(err)) | Err(err) => match &first_error {
                    // Prefer reporting cancellation over the secondary
                    // errors it causes in other chunks.
                    None => first_error = Some(err),
                    Some(existing) if !existing.is_cancellation() && err.is_cancellation() => {
                        first_error = Some(err)
                    }
                    Some(_) => {}
                },
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }
        if cancel.is_cancelled() {
            return Err(ReelcutError::Cancelled);
        }
        results.sort_by_key(|r| r.index);

        if !job.combine_chunks {
            // Caller takes ownership of the chunk files.
            guard.release();
            return Ok(ExportOutput::Chunks(results));
        }

        reporter.stage(ExportStage::Finalizing, 90, "Combining chunks");
        let paths: Vec<PathBuf> = results.iter().map(|r| r.path.clone()).collect();
        self.muxer.concat(&paths, &job.output_path)?;
        tracing::info!(
            chunks = chunk_count,
            output = %job.output_path.display(),
            "Chunks combined"
        );
        drop(guard);

        Ok(ExportOutput::File(job.output_path.clone()))
    }
}

enum Plan {
    SinglePass,
    Chunked(Vec<ChunkAssignment>),
}

fn validate_job(job: &ExportJob) -> ReelcutResult<CompositionMeta> {
    let composition = job
        .composition
        .clone()
        .ok_or_else(|| ReelcutError::validation("Export job is missing composition metadata"))?;
    if composition.duration_ms <= 0.0 {
        return Err(ReelcutError::validation("Composition duration must be > 0"));
    }
    if composition.width == 0 || composition.height == 0 {
        return Err(ReelcutError::validation("Composition dimensions must be > 0"));
    }
    if composition.fps == 0 {
        return Err(ReelcutError::validation("Composition fps must be > 0"));
    }
    if job.chunk_size_frames == 0 {
        return Err(ReelcutError::validation("chunk_size_frames must be > 0"));
    }
    if job.output_path.as_os_str().is_empty() {
        return Err(ReelcutError::validation("Output path is empty"));
    }
    validate_effects(&job.timeline.effects).map_err(|e| ReelcutError::validation(e.to_string()))?;
    Ok(composition)
}

impl ExportOrchestrator {
    /// Collision-resistant work directory for one export's chunk files.
    fn chunk_work_dir(&self, output_path: &std::path::Path) -> PathBuf {
        let stem = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "export".to_string());
        self.temp_root.join(format!(
            "reelcut-{stem}-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_millis()
        ))
    }
}

fn pool_error(err: PoolError) -> ReelcutError {
    match err {
        PoolError::TaskPanicked => ReelcutError::processing("chunk render task panicked"),
        PoolError::Rejected => ReelcutError::processing("worker pool disposed during export"),
    }
}

/// Marks the orchestrator busy for the lifetime of one export.
struct SlotGuard {
    running: Arc<AtomicBool>,
}

impl SlotGuard {
    fn acquire(running: &Arc<AtomicBool>) -> ReelcutResult<Self> {
        running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ReelcutError::ExportAlreadyRunning)?;
        Ok(Self {
            running: Arc::clone(running),
        })
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Removes a temp file or directory on drop unless released.
struct TempArtifacts {
    path: PathBuf,
    released: bool,
}

impl TempArtifacts {
    fn file(path: PathBuf) -> Self {
        Self { path, released: false }
    }

    fn dir(path: PathBuf) -> Self {
        Self { path, released: false }
    }

    /// Keep the artifacts; ownership passes to the caller.
    fn release(mut self) {
        self.released = true;
    }
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let result = if self.path.is_dir() {
            std::fs::remove_dir_all(&self.path)
        } else if self.path.exists() {
            std::fs::remove_file(&self.path)
        } else {
            Ok(())
        };
        if let Err(err) = result {
            tracing::warn!(path = %self.path.display(), %err, "Failed to clean temp artifacts");
        }
    }
}

/// Throttles rendering updates; stage transitions always go through.
#[derive(Clone)]
struct ProgressReporter {
    sink: Option<ProgressSink>,
    last_emit: Arc<Mutex<Option<Instant>>>,
}

impl ProgressReporter {
    fn new(sink: Option<ProgressSink>) -> Self {
        Self {
            sink,
            last_emit: Arc::new(Mutex::new(None)),
        }
    }

    fn stage(&self, stage: ExportStage, progress: u8, message: impl Into<String>) {
        if let Some(sink) = &self.sink {
            sink(ProgressUpdate::stage(stage, progress, message));
        }
    }

    fn rendering(&self, update: ProgressUpdate) {
        let Some(sink) = &self.sink else {
            return;
        };
        // Emission happens under the lock so concurrent chunk workers
        // cannot deliver updates out of order.
        let mut last = self.last_emit.lock().expect("progress mutex poisoned");
        let due = last.map(|t| t.elapsed() >= PROGRESS_INTERVAL).unwrap_or(true);
        if due {
            *last = Some(Instant::now());
            sink(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcut_project_model::timeline::ProjectTimeline;

    fn job(frames: u64, fps: u32) -> ExportJob {
        ExportJob {
            composition: Some(CompositionMeta {
                fps,
                duration_ms: frames as f64 / fps as f64 * 1000.0,
                width: 640,
                height: 360,
            }),
            timeline: ProjectTimeline::default(),
            encoder: Default::default(),
            chunk_size_frames: 2000,
            strategy: None,
            combine_chunks: true,
            external_chunks: None,
            output_path: PathBuf::from("/tmp/out.mp4"),
        }
    }

    #[tokio::test]
    async fn test_single_pass_override_conflicts_with_external_chunks() {
        let mut j = job(100, 30);
        j.strategy = Some(ExportStrategy::SinglePass);
        j.external_chunks = Some(vec![]);
        let orchestrator = ExportOrchestrator::new(
            Arc::new(|| unreachable!("never instantiated")),
            Arc::new(NullMuxer),
            Arc::new(reelcut_common::pool::WorkerPool::new(1)),
        );
        let err = orchestrator.export(j, None, &CancelHandle::new()).await;
        assert!(matches!(err, Err(ReelcutError::Validation { .. })));
    }

    #[test]
    fn test_validate_requires_composition() {
        let mut j = job(100, 30);
        j.composition = None;
        assert!(matches!(
            validate_job(&j),
            Err(ReelcutError::Validation { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let mut j = job(100, 30);
        j.composition.as_mut().unwrap().duration_ms = 0.0;
        assert!(validate_job(&j).is_err());
    }

    #[test]
    fn test_chunk_work_dir_under_temp_root() {
        let orchestrator = ExportOrchestrator::new(
            Arc::new(|| unreachable!("never instantiated")),
            Arc::new(NullMuxer),
            Arc::new(reelcut_common::pool::WorkerPool::new(1)),
        )
        .with_temp_root(PathBuf::from("/scratch"));

        let dir = orchestrator.chunk_work_dir(std::path::Path::new("/exports/final.mp4"));
        assert!(dir.starts_with("/scratch"));
        let name = dir.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("reelcut-final-"));
    }

    struct NullMuxer;

    impl crate::backend::Muxer for NullMuxer {
        fn concat(
            &self,
            _chunk_paths: &[PathBuf],
            _output: &std::path::Path,
        ) -> reelcut_common::ReelcutResult<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "null"
        }
    }

    #[test]
    fn test_cancel_handle_round_trip() {
        let cancel = CancelHandle::new();
        assert!(!cancel.is_cancelled());
        cancel.cancel();
        assert!(cancel.is_cancelled());
        assert!(cancel.flag().load(Ordering::SeqCst));
    }

    #[test]
    fn test_temp_artifacts_removes_file_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.mp4");
        std::fs::write(&path, b"x").unwrap();
        drop(TempArtifacts::file(path.clone()));
        assert!(!path.exists());
    }

    #[test]
    fn test_temp_artifacts_release_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.mp4");
        std::fs::write(&path, b"x").unwrap();
        TempArtifacts::file(path.clone()).release();
        assert!(path.exists());
    }

    #[test]
    fn test_reporter_throttles_rendering_updates() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let reporter = ProgressReporter::new(Some(Arc::new(move |u: ProgressUpdate| {
            sink_seen.lock().unwrap().push(u.progress);
        })));

        for i in 0..10 {
            reporter.rendering(ProgressUpdate::stage(ExportStage::Rendering, i, "r"));
        }
        // First one goes through, the burst is suppressed.
        assert_eq!(seen.lock().unwrap().len(), 1);

        // Stage transitions are never throttled.
        reporter.stage(ExportStage::Finalizing, 90, "f");
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
