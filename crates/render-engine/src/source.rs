//! Frame sources backed by ffmpeg rawvideo decode.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use reelcut_common::{ReelcutError, ReelcutResult};
use reelcut_project_model::timeline::ProjectTimeline;

use crate::backend::FrameSource;
use crate::compositor::Frame;

#[derive(Clone)]
#[derive(Debug)]
struct RecordingMedia {
    path: PathBuf,
    width: u32,
    height: u32,
    fps: u32,
}

/// Decodes recording video through an ffmpeg subprocess emitting raw RGBA.
///
/// The render loop requests frames at monotonically increasing timestamps
/// within a chunk, so decode is sequential. A request that jumps backwards
/// (a new chunk reusing the same source instance) restarts the decode with
/// a seek.
#[derive(Debug)]
pub struct FfmpegFrameSource {
    media: HashMap<String, RecordingMedia>,
    active: Option<ActiveDecode>,
}

#[derive(Debug)]
struct ActiveDecode {
    recording_id: String,
    child: Child,
    stdout: ChildStdout,
    /// Index of the next frame the decoder will produce, in recording frames.
    next_frame: u64,
    /// Last decoded frame, held so times past the end of the media return
    /// the final frame instead of failing.
    last: Frame,
    finished: bool,
}

impl FfmpegFrameSource {
    /// Build a source for every recording in the timeline that carries a
    /// video file. Paths are resolved relative to `base_dir`.
    pub fn from_timeline(timeline: &ProjectTimeline, base_dir: &Path) -> ReelcutResult<Self> {
        let mut media = HashMap::new();
        for recording in &timeline.recordings {
            let Some(url) = &recording.video_url else {
                continue;
            };
            let path = base_dir.join(url);
            if !path.exists() {
                return Err(ReelcutError::FileNotFound { path });
            }
            media.insert(
                recording.id.clone(),
                RecordingMedia {
                    path,
                    width: recording.width,
                    height: recording.height,
                    fps: recording.fps,
                },
            );
        }
        Ok(Self {
            media,
            active: None,
        })
    }

    /// Fresh instance over the same media set, with no decode in flight.
    /// Parallel chunk workers each get their own.
    pub fn instantiate(&self) -> Self {
        Self {
            media: self.media.clone(),
            active: None,
        }
    }

    fn start_decode(&self, id: &str, start_frame: u64) -> ReelcutResult<ActiveDecode> {
        let media = self
            .media
            .get(id)
            .ok_or_else(|| ReelcutError::project(format!("Recording '{id}' has no video file")))?;

        let seek_secs = start_frame as f64 / media.fps as f64;
        tracing::debug!(
            recording = id,
            start_frame,
            path = %media.path.display(),
            "Starting source decode"
        );

        let mut child = Command::new("ffmpeg")
            .args([
                "-ss",
                &format!("{seek_secs:.6}"),
                "-i",
                &media.path.display().to_string(),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "-s",
                &format!("{}x{}", media.width, media.height),
                "-r",
                &media.fps.to_string(),
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ReelcutError::spawn_failed("ffmpeg", &e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReelcutError::render("Failed to capture ffmpeg stdout"))?;

        Ok(ActiveDecode {
            recording_id: id.to_string(),
            child,
            stdout,
            next_frame: start_frame,
            last: Frame::new(media.width, media.height),
            finished: false,
        })
    }
}

impl FrameSource for FfmpegFrameSource {
    fn frame_at(&mut self, recording_id: &str, time_ms: f64) -> ReelcutResult<Frame> {
        let fps = self
            .media
            .get(recording_id)
            .map(|m| m.fps)
            .ok_or_else(|| {
                ReelcutError::project(format!("Recording '{recording_id}' has no video file"))
            })?;
        let target = (time_ms / 1000.0 * fps as f64).floor().max(0.0) as u64;

        let needs_restart = match &self.active {
            Some(active) => active.recording_id != recording_id || target + 1 < active.next_frame,
            None => true,
        };
        if needs_restart {
            self.active = Some(self.start_decode(recording_id, target)?);
        }

        let active = self.active.as_mut().ok_or_else(|| {
            ReelcutError::render("Source decode unexpectedly missing")
        })?;

        while !active.finished && active.next_frame <= target {
            let frame_bytes = active.last.data.len();
            let mut buf = vec![0u8; frame_bytes];
            match read_exact_or_eof(&mut active.stdout, &mut buf)? {
                true => {
                    active.last.data = buf;
                    active.next_frame += 1;
                }
                false => {
                    active.finished = true;
                    tracing::debug!(
                        recording = recording_id,
                        frame = active.next_frame,
                        "Source media ended; holding last frame"
                    );
                }
            }
        }

        Ok(active.last.clone())
    }
}

// Dropping a `Child` neither kills nor reaps it, so every decode that gets
// replaced (recording switch, backward seek) must be cleaned up here.
impl Drop for ActiveDecode {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Read exactly `buf.len()` bytes. Returns false on clean EOF at a frame
/// boundary; a partial frame is an error.
fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> ReelcutResult<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader
            .read(&mut buf[filled..])
            .map_err(|e| ReelcutError::render(format!("Failed reading decoded frames: {e}")))?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(ReelcutError::render("Truncated frame from source decode"));
        }
        filled += n;
    }
    Ok(true)
}
