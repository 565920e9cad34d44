//! Core library for the Singalong karaoke game.
//!
//! Two pieces carry the real logic. The playback side keeps an optional
//! background video locked to the authoritative audio clock and drives the
//! overlays once per frame ([`SyncController`], [`GameSession`]). The scoring
//! side matches the pitches a singer produced against the notes of their part
//! ([`ScoreSheet`], [`IncrementalScorer`]). Everything that draws pixels,
//! decodes media or talks to the network is supplied by the host through the
//! traits exported here.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod player;
pub mod render;
pub mod scoring;
pub mod session;
pub mod song;
pub mod source;
pub mod sync;
pub mod timeline;
pub mod title;

pub use analysis::{frequency_to_midi, midi_to_frequency, PitchEstimate, PitchTracker};
pub use audio::CaptureEngine;
pub use config::{AppConfig, CaptureConfig, SyncConfig, TitleConfig};
pub use error::{Result, SingalongError};
pub use events::{
    ChannelSink, DiagnosticEvent, EventSink, JsonLinesSink, Notifier, ReadySignal, RecordingSink,
    TracingSink,
};
pub use player::{Participant, Player};
pub use render::{Layout, LyricOverlay, NoteOverlay, Rect, RenderGraph, ScoreOverlay, TitleOverlay};
pub use scoring::{pitch_class_matches, IncrementalScorer, ScoreSheet, MAX_SCORE};
pub use session::{DensityProbe, FixedDensity, GameSession, Wakeup};
pub use song::{BeatGrid, Note, NoteKind, Part, Phrase, Song};
pub use source::{load_note_log, DetectedNote, LiveSource, NoteStreamSource, RemoteSource};
pub use sync::SyncController;
pub use timeline::{ClockSource, MediaClock, PlaybackClock, Scheduler, SimulatedMedia, TimerId};
pub use title::{TitleCard, TitleFrame, TitleState};
