//! Structured diagnostics emitted by the playback core.
//!
//! Components hold a [`Notifier`] and push [`DiagnosticEvent`]s into it. The
//! notifier fans each event out to its sinks: tracing for logs, a channel for
//! callers that poll, JSON lines for offline inspection, or an in-memory
//! recorder for tests.

use std::{
    fmt,
    io::Write,
    sync::{Arc, Mutex},
};

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// Media is loaded and the session may start. Emitted at most once.
    Ready,
    PlaybackStarted,
    PlaybackStopped,
    VideoStarted {
        position_seconds: f64,
    },
    VideoDeferred {
        delay_seconds: f64,
    },
    /// The video gap cannot be scheduled; playback continues audio only.
    VideoUnavailable {
        video_gap_seconds: f64,
    },
    /// Video drifted too far from the audio clock and was dropped for the
    /// rest of the session.
    DesyncDetected {
        video_seconds: f64,
        audio_seconds: f64,
        video_gap_seconds: f64,
        drift_seconds: f64,
    },
    DensityChanged {
        previous: Option<f64>,
        current: f64,
    },
    TitleFinished,
    TitleCancelled,
}

/// Consumer of diagnostic events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DiagnosticEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &DiagnosticEvent) {
        match event {
            DiagnosticEvent::DesyncDetected {
                video_seconds,
                audio_seconds,
                video_gap_seconds,
                drift_seconds,
            } => tracing::warn!(
                video_seconds,
                audio_seconds,
                video_gap_seconds,
                drift_seconds,
                "A/V desync, disabling video"
            ),
            DiagnosticEvent::VideoDeferred { delay_seconds } => {
                tracing::info!(delay_seconds, "delaying video playback")
            }
            DiagnosticEvent::VideoUnavailable { video_gap_seconds } => {
                tracing::warn!(video_gap_seconds, "unusable video gap, disabling video")
            }
            DiagnosticEvent::VideoStarted { position_seconds } => {
                tracing::info!(position_seconds, "video started")
            }
            DiagnosticEvent::DensityChanged { previous, current } => {
                tracing::debug!(?previous, current, "pixel density changed")
            }
            other => tracing::info!(event = ?other, "playback"),
        }
    }
}

/// Forwards events to a channel the caller drains at its own pace.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<DiagnosticEvent>,
}

impl ChannelSink {
    pub fn new(sender: Sender<DiagnosticEvent>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &DiagnosticEvent) {
        // A receiver that went away simply stops listening.
        let _ = self.sender.send(event.clone());
    }
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&self, event: &DiagnosticEvent) {
        let Ok(mut writer) = self.writer.lock() else {
            return;
        };
        let written = serde_json::to_writer(&mut *writer, event)
            .map_err(std::io::Error::from)
            .and_then(|()| writer.write_all(b"\n"));
        if let Err(err) = written {
            tracing::warn!(%err, "failed to write diagnostic event");
        }
    }
}

impl<W> fmt::Debug for JsonLinesSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonLinesSink").finish()
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, predicate: impl Fn(&DiagnosticEvent) -> bool) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|event| predicate(event)).count())
            .unwrap_or(0)
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &DiagnosticEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Cloneable fan-out handle held by components that report diagnostics.
#[derive(Clone, Default)]
pub struct Notifier {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Notifier {
    /// A notifier without sinks; events are dropped.
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier that logs through `tracing`.
    pub fn tracing() -> Self {
        Self::new().with_sink(Arc::new(TracingSink))
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn emit(&self, event: DiagnosticEvent) {
        for sink in &self.sinks {
            sink.emit(&event);
        }
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Latch that reports readiness at most once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadySignal {
    fired: bool,
}

impl ReadySignal {
    /// Returns `true` only for the first call.
    pub fn signal(&mut self) -> bool {
        !std::mem::replace(&mut self.fired, true)
    }

    pub fn is_ready(&self) -> bool {
        self.fired
    }
}
