//! Overlays that draw to the log instead of a screen.

use std::sync::Arc;

use singalong_core::{
    LyricOverlay, NoteOverlay, NoteStreamSource, Part, Rect, ScoreOverlay, Song, TitleOverlay,
};

/// Beats of sung history shown behind the playhead.
const PITCH_WINDOW_BEATS: i64 = 8;

pub struct ConsoleLyrics {
    song: Arc<Song>,
    part: Part,
    current: Option<i64>,
}

impl ConsoleLyrics {
    pub fn new(song: Arc<Song>, part: Part) -> Self {
        Self {
            song,
            part,
            current: None,
        }
    }
}

impl LyricOverlay for ConsoleLyrics {
    fn set_rect(&mut self, rect: Rect) {
        tracing::debug!(?rect, "lyrics placed");
    }

    fn render(&mut self, time_ms: i64) {
        let beat = self.song.beat_at_ms(time_ms as f64);
        let Some(note) = self.part.note_at(beat) else {
            return;
        };
        if self.current != Some(note.beat) {
            self.current = Some(note.beat);
            tracing::info!(beat = note.beat, pitch = note.pitch, "{}", note.text.trim());
        }
    }
}

pub struct ConsolePitch {
    song: Arc<Song>,
    last: Option<i32>,
}

impl ConsolePitch {
    pub fn new(song: Arc<Song>) -> Self {
        Self { song, last: None }
    }
}

impl NoteOverlay for ConsolePitch {
    fn set_rect(&mut self, rect: Rect) {
        tracing::debug!(?rect, "pitch lane placed");
    }

    fn render(&mut self, time_ms: i64, sung: &dyn NoteStreamSource) {
        let beat = self.song.beat_at_ms(time_ms as f64);
        let recent = sung.notes_in_range(beat - PITCH_WINDOW_BEATS, beat + 1);
        let latest = recent.last().map(|note| note.note);
        if latest != self.last {
            self.last = latest;
            tracing::trace!(beat, sung = ?latest, window = recent.len(), "pitch");
        }
    }
}

pub struct ConsoleScore {
    player: usize,
    shown: Option<u32>,
}

impl ConsoleScore {
    pub fn new(player: usize) -> Self {
        Self {
            player,
            shown: None,
        }
    }
}

impl ScoreOverlay for ConsoleScore {
    fn set_rect(&mut self, rect: Rect) {
        tracing::debug!(player = self.player, ?rect, "score placed");
    }

    fn render(&mut self, score: u32) {
        if self.shown != Some(score) {
            self.shown = Some(score);
            tracing::debug!(player = self.player, score, "score");
        }
    }
}

pub struct ConsoleTitle {
    heading: String,
}

impl ConsoleTitle {
    pub fn new(song: &Song) -> Self {
        let heading = if song.artist.is_empty() {
            song.title.clone()
        } else {
            format!("{} - {}", song.artist, song.title)
        };
        Self { heading }
    }
}

impl TitleOverlay for ConsoleTitle {
    fn render(&mut self, opacity: f32) {
        if opacity >= 1.0 {
            tracing::info!("{}", self.heading);
        } else {
            tracing::trace!(opacity, "title fading");
        }
    }

    fn clear(&mut self) {
        tracing::debug!("title cleared");
    }
}
