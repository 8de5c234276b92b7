//! Input event types for the Reelcut telemetry stream.
//!
//! Events are recorded in append-only JSONL format for crash safety.
//! Pointer coordinates are recording-local pixels; each pointer-carrying
//! event also records the screen dimensions it was captured against so
//! positions can be normalized later without extra context.

use serde::{Deserialize, Serialize};

/// Millisecond timestamp, monotonic within one recording.
pub type TimeMs = f64;

/// A single recorded input event with timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    /// Milliseconds since recording start.
    #[serde(rename = "t")]
    pub timestamp_ms: TimeMs,

    /// The event payload.
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Discriminated union of event types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Mouse/touchpad pointer position update.
    Move {
        /// X coordinate in recording-local pixels.
        x: f64,
        /// Y coordinate in recording-local pixels.
        y: f64,
        /// Screen width at capture time.
        screen_width: u32,
        /// Screen height at capture time.
        screen_height: u32,
    },

    /// Mouse button click.
    Click {
        /// Which button was pressed.
        button: MouseButton,
        /// Press or release.
        state: ButtonState,
        /// Pointer position at click time (recording-local pixels).
        x: f64,
        y: f64,
        screen_width: u32,
        screen_height: u32,
    },

    /// Keyboard key event.
    Key {
        /// Key code (e.g., "KeyA", "Enter", "ShiftLeft").
        code: String,
        /// Press or release.
        state: ButtonState,
    },

    /// Scroll wheel event.
    Scroll {
        /// Horizontal scroll delta in pixels.
        dx: f64,
        /// Vertical scroll delta in pixels.
        dy: f64,
        /// Pointer position at scroll time (recording-local pixels).
        x: f64,
        y: f64,
    },
}

/// Mouse button identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
}

/// Button/key state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonState {
    Down,
    Up,
}

/// Stream header written as the first (commented) line of an events file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStreamHeader {
    /// Schema version for forward compatibility.
    pub schema_version: String,

    /// Wall-clock time at recording start (ISO 8601).
    pub recorded_at: String,

    /// Capture region dimensions in physical pixels.
    pub capture_width: u32,
    pub capture_height: u32,

    /// Nominal sampling rate for pointer events (Hz).
    pub pointer_sample_rate_hz: u32,
}

impl EventStreamHeader {
    pub fn new(capture_width: u32, capture_height: u32, pointer_sample_rate_hz: u32) -> Self {
        Self {
            schema_version: "1.0".to_string(),
            recorded_at: chrono::Utc::now().to_rfc3339(),
            capture_width,
            capture_height,
            pointer_sample_rate_hz,
        }
    }
}

impl InputEvent {
    /// Create a pointer move event.
    pub fn pointer(timestamp_ms: TimeMs, x: f64, y: f64, sw: u32, sh: u32) -> Self {
        Self {
            timestamp_ms,
            kind: EventKind::Move {
                x,
                y,
                screen_width: sw,
                screen_height: sh,
            },
        }
    }

    /// Create a left-button press event.
    pub fn click(timestamp_ms: TimeMs, x: f64, y: f64, sw: u32, sh: u32) -> Self {
        Self {
            timestamp_ms,
            kind: EventKind::Click {
                button: MouseButton::Left,
                state: ButtonState::Down,
                x,
                y,
                screen_width: sw,
                screen_height: sh,
            },
        }
    }

    /// Create a key event.
    pub fn key(timestamp_ms: TimeMs, code: impl Into<String>, state: ButtonState) -> Self {
        Self {
            timestamp_ms,
            kind: EventKind::Key {
                code: code.into(),
                state,
            },
        }
    }

    /// Extract the pointer position in recording-local pixels, if any.
    pub fn pointer_position(&self) -> Option<(f64, f64)> {
        match &self.kind {
            EventKind::Move { x, y, .. } => Some((*x, *y)),
            EventKind::Click { x, y, .. } => Some((*x, *y)),
            EventKind::Scroll { x, y, .. } => Some((*x, *y)),
            _ => None,
        }
    }

    /// Pointer position normalized to `[0, 1]` against the recorded screen
    /// dimensions. `None` for events without their own screen geometry.
    pub fn normalized_position(&self) -> Option<(f64, f64)> {
        match &self.kind {
            EventKind::Move {
                x,
                y,
                screen_width,
                screen_height,
            }
            | EventKind::Click {
                x,
                y,
                screen_width,
                screen_height,
                ..
            } => {
                let sw = (*screen_width).max(1) as f64;
                let sh = (*screen_height).max(1) as f64;
                Some((x / sw, y / sh))
            }
            _ => None,
        }
    }

    /// True for a button-down click.
    pub fn is_click_down(&self) -> bool {
        matches!(
            self.kind,
            EventKind::Click {
                state: ButtonState::Down,
                ..
            }
        )
    }
}

/// Sort events by timestamp and collapse duplicate timestamps, keeping the
/// last value for each. All consumers (detector, interpolator) require this
/// normalized ordering.
pub fn normalize_events(mut events: Vec<InputEvent>) -> Vec<InputEvent> {
    events.sort_by(|a, b| a.timestamp_ms.total_cmp(&b.timestamp_ms));

    let mut normalized: Vec<InputEvent> = Vec::with_capacity(events.len());
    for event in events {
        match normalized.last() {
            Some(last)
                if last.timestamp_ms == event.timestamp_ms
                    && std::mem::discriminant(&last.kind)
                        == std::mem::discriminant(&event.kind) =>
            {
                *normalized.last_mut().unwrap() = event;
            }
            _ => normalized.push(event),
        }
    }
    normalized
}

/// Parse events from JSONL content (one JSON object per line).
/// Lines starting with `#` (the stream header) are skipped.
pub fn parse_events(jsonl: &str) -> Result<Vec<InputEvent>, serde_json::Error> {
    jsonl
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(serde_json::from_str)
        .collect()
}

/// Serialize events to JSONL format.
pub fn serialize_events(events: &[InputEvent]) -> Result<String, serde_json::Error> {
    let mut output = String::new();
    for event in events {
        output.push_str(&serde_json::to_string(event)?);
        output.push('\n');
    }
    Ok(output)
}
