//! Render backend seams: frame sources, encoders, and muxing.
//!
//! The orchestrator never talks to ffmpeg directly. It hands a
//! [`RenderRequest`] to a [`RenderBackend`] and, when chunks need joining, a
//! manifest to a [`Muxer`]. Both are traits so tests can substitute fakes.

use std::collections::HashMap;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use reelcut_common::{ReelcutError, ReelcutResult};
use reelcut_processing_core::{EffectEvaluator, PointerPath};
use reelcut_project_model::export::EncoderSettings;
use reelcut_project_model::timeline::{CompositionMeta, ProjectTimeline};

use crate::compositor::{Frame, ZoomBackend};

/// One unit of rendering work: a self-contained timeline (already sliced to
/// the chunk window, clock starting at zero) and the frame range to produce.
pub struct RenderRequest {
    pub timeline: ProjectTimeline,
    pub composition: CompositionMeta,
    pub encoder: EncoderSettings,
    /// Frame index of the first frame, in composition coordinates. Used only
    /// for reporting; the timeline is already rebased.
    pub start_frame: u64,
    pub frame_count: u64,
    pub output_path: PathBuf,
    /// Checked between frames. When set, the backend stops and returns
    /// `ReelcutError::Cancelled`.
    pub cancel: Arc<AtomicBool>,
}

/// Called with the number of frames rendered so far for this request.
pub type FrameProgress = Box<dyn Fn(u64) + Send + Sync>;

/// A video rendering backend.
pub trait RenderBackend: Send {
    /// Render the request to its output path.
    fn render(
        &mut self,
        request: &RenderRequest,
        on_frame: Option<&FrameProgress>,
    ) -> ReelcutResult<()>;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

/// Joins already-encoded chunk files into one output without re-encoding.
pub trait Muxer: Send + Sync {
    fn concat(&self, chunk_paths: &[PathBuf], output: &Path) -> ReelcutResult<()>;

    fn name(&self) -> &str;
}

/// Supplies the raw source frame for a recording at a given time.
///
/// Production sources decode video; tests return synthetic frames.
pub trait FrameSource: Send {
    fn frame_at(&mut self, recording_id: &str, time_ms: f64) -> ReelcutResult<Frame>;
}

/// CPU renderer: evaluates the camera state per frame, composes through a
/// [`ZoomBackend`], and streams raw RGBA into an ffmpeg encoder process.
pub struct SoftwareBackend {
    zoom: Box<dyn ZoomBackend>,
    source: Box<dyn FrameSource>,
}

impl SoftwareBackend {
    pub fn new(zoom: Box<dyn ZoomBackend>, source: Box<dyn FrameSource>) -> Self {
        Self { zoom, source }
    }

    fn render_frames<F>(&mut self, request: &RenderRequest, mut sink: F) -> ReelcutResult<()>
    where
        F: FnMut(u64, &Frame) -> ReelcutResult<()>,
    {
        let comp = &request.composition;
        let frame_interval_ms = 1000.0 / comp.fps as f64;

        // One pointer path per recording; tracking follows the mouse of
        // whichever recording the active clip plays.
        let paths: HashMap<&str, PointerPath> = request
            .timeline
            .recordings
            .iter()
            .map(|r| (r.id.as_str(), PointerPath::from_events(&r.events)))
            .collect();
        let empty_path = PointerPath::default();
        let evaluator = EffectEvaluator::default();

        for local_frame in 0..request.frame_count {
            if request.cancel.load(Ordering::SeqCst) {
                return Err(ReelcutError::Cancelled);
            }

            let t = local_frame as f64 * frame_interval_ms;
            let active = active_recording(&request.timeline, t);
            let path = active
                .as_deref()
                .and_then(|id| paths.get(id))
                .unwrap_or(&empty_path);
            let state = evaluator.state_at(&request.timeline.effects, path, t);

            // The timeline is rebased to the chunk window but the source
            // media is not, so frames are fetched at absolute time.
            let t_source = (request.start_frame + local_frame) as f64 * frame_interval_ms;
            let source_frame = match active {
                Some(id) => self.source.frame_at(&id, t_source)?,
                None => Frame::new(comp.width, comp.height),
            };
            let composed = self
                .zoom
                .compose(&source_frame, &state, comp.width, comp.height);
            sink(local_frame, &composed)?;
        }
        Ok(())
    }
}

/// Recording id of the clip covering `t`, if any.
fn active_recording(timeline: &ProjectTimeline, t: f64) -> Option<String> {
    for segment in &timeline.segments {
        if t < segment.start_ms || t >= segment.end_ms {
            continue;
        }
        let local = t - segment.start_ms;
        for clip in &segment.clips {
            if local >= clip.start_ms && local < clip.end_ms {
                return Some(clip.recording_id.clone());
            }
        }
    }
    None
}

impl RenderBackend for SoftwareBackend {
    fn render(
        &mut self,
        request: &RenderRequest,
        on_frame: Option<&FrameProgress>,
    ) -> ReelcutResult<()> {
        let mut encoder = FfmpegEncoder::spawn(
            &request.composition,
            &request.encoder,
            &request.output_path,
        )?;

        let result = self.render_frames(request, |local_frame, frame| {
            encoder.write_frame(&frame.data)?;
            if let Some(cb) = on_frame {
                cb(local_frame + 1);
            }
            Ok(())
        });

        match result {
            Ok(()) => encoder.finish(),
            Err(err) => {
                encoder.abort();
                Err(err)
            }
        }
    }

    fn is_available(&self) -> bool {
        ffmpeg_available()
    }

    fn name(&self) -> &str {
        "software"
    }
}

/// A running ffmpeg encode fed raw RGBA frames over stdin.
///
/// Stdin writes block when the encoder falls behind, which is the
/// backpressure mechanism: we never buffer more than the pipe holds.
struct FfmpegEncoder {
    child: std::process::Child,
    stdin: Option<std::process::ChildStdin>,
    stderr_task: Option<std::thread::JoinHandle<String>>,
}

impl FfmpegEncoder {
    fn spawn(
        comp: &CompositionMeta,
        encoder: &EncoderSettings,
        output: &Path,
    ) -> ReelcutResult<Self> {
        let args = encode_args(comp, encoder, output);
        tracing::debug!(args = ?args, "Spawning ffmpeg encoder");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ReelcutError::spawn_failed("ffmpeg", &e))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ReelcutError::render("Failed to capture ffmpeg stdin"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelcutError::render("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently to avoid ffmpeg blocking on a full pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut buf = String::new();
            match reader.read_to_string(&mut buf) {
                Ok(_) => buf,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        Ok(Self {
            child,
            stdin: Some(stdin),
            stderr_task: Some(stderr_task),
        })
    }

    fn write_frame(&mut self, rgba: &[u8]) -> ReelcutResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ReelcutError::render("ffmpeg stdin already closed"))?;
        stdin
            .write_all(rgba)
            .map_err(|e| ReelcutError::render(format!("Failed writing frame to ffmpeg: {e}")))
    }

    /// Close stdin, wait for the encoder to flush, and check its exit status.
    fn finish(mut self) -> ReelcutResult<()> {
        drop(self.stdin.take());
        let status = self
            .child
            .wait()
            .map_err(|e| ReelcutError::render(format!("Failed waiting for ffmpeg: {e}")))?;
        let stderr = self.drain_stderr();
        if !status.success() {
            return Err(ReelcutError::render(format!(
                "ffmpeg encode failed (status {}): {}",
                status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn abort(mut self) {
        drop(self.stdin.take());
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.drain_stderr();
    }

    fn drain_stderr(&mut self) -> String {
        self.stderr_task
            .take()
            .map(|t| t.join().unwrap_or_else(|_| String::new()))
            .unwrap_or_default()
    }
}

fn encode_args(comp: &CompositionMeta, encoder: &EncoderSettings, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgba".to_string(),
        "-s".to_string(),
        format!("{}x{}", comp.width, comp.height),
        "-r".to_string(),
        comp.fps.to_string(),
        "-i".to_string(),
        "pipe:0".to_string(),
        "-c:v".to_string(),
        encoder.codec.ffmpeg_name().to_string(),
        "-b:v".to_string(),
        format!("{}k", encoder.video_bitrate_kbps),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        output.display().to_string(),
    ]
}

pub fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Stream-copy concat via ffmpeg's concat demuxer.
pub struct FfmpegMuxer;

impl Muxer for FfmpegMuxer {
    fn concat(&self, chunk_paths: &[PathBuf], output: &Path) -> ReelcutResult<()> {
        if chunk_paths.is_empty() {
            return Err(ReelcutError::validation("No chunk files to concatenate"));
        }

        let manifest_path = manifest_path(output);
        let manifest = concat_manifest(chunk_paths);
        std::fs::write(&manifest_path, manifest)?;

        let result = run_concat(&manifest_path, output);
        let _ = std::fs::remove_file(&manifest_path);
        result
    }

    fn name(&self) -> &str {
        "ffmpeg-concat"
    }
}

/// Manifest location in the OS temp dir. Pid, timestamp, and a process-wide
/// counter keep concurrent exports to same-stem outputs from colliding.
fn manifest_path(output: &Path) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    std::env::temp_dir().join(format!(
        "reelcut-concat-{stem}-{}-{}-{}.txt",
        std::process::id(),
        chrono::Utc::now().timestamp_millis(),
        SEQ.fetch_add(1, Ordering::Relaxed)
    ))
}

fn run_concat(manifest: &Path, output: &Path) -> ReelcutResult<()> {
    let child = Command::new("ffmpeg")
        .args([
            "-y",
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
            &manifest.display().to_string(),
            "-c",
            "copy",
            &output.display().to_string(),
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ReelcutError::spawn_failed("ffmpeg", &e))?;

    let out = child
        .wait_with_output()
        .map_err(|e| ReelcutError::render(format!("Failed waiting for ffmpeg concat: {e}")))?;
    if !out.status.success() {
        return Err(ReelcutError::Muxer {
            status: out.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// Concat demuxer manifest: one `file '<path>'` line per chunk, in order.
pub fn concat_manifest(chunk_paths: &[PathBuf]) -> String {
    let mut out = String::new();
    for path in chunk_paths {
        // Single quotes in paths are escaped per the concat demuxer's rules.
        let escaped = path.display().to_string().replace('\'', "'\\''");
        out.push_str(&format!("file '{escaped}'\n"));
    }
    out
}
