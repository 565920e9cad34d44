//! Read-only song data shared by players and overlays.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Result, SingalongError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    #[default]
    Normal,
    /// Sung freely; never scored and never counted towards the beat total.
    Freestyle,
    Golden,
}

/// One expected note. `beat` and `length` live on the song timeline, the same
/// integer axis detected notes are stamped with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(rename = "type", default)]
    pub kind: NoteKind,
    pub pitch: i32,
    pub beat: i64,
    pub length: i64,
    #[serde(default)]
    pub text: String,
}

impl Note {
    pub fn new(kind: NoteKind, pitch: i32, beat: i64, length: i64) -> Self {
        Self {
            kind,
            pitch,
            beat,
            length,
            text: String::new(),
        }
    }

    pub fn end(&self) -> i64 {
        self.beat + self.length
    }

    pub fn is_scored(&self) -> bool {
        self.kind != NoteKind::Freestyle
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phrase {
    pub notes: Vec<Note>,
}

/// A single vocal track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub phrases: Vec<Phrase>,
}

impl Part {
    /// All notes of the part in phrase order.
    pub fn notes(&self) -> impl Iterator<Item = &Note> + '_ {
        self.phrases.iter().flat_map(|phrase| phrase.notes.iter())
    }

    /// The note sounding at `beat`, if any.
    pub fn note_at(&self, beat: i64) -> Option<&Note> {
        self.notes()
            .find(|note| note.beat <= beat && beat < note.end())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Song {
    pub title: String,
    pub artist: String,
    pub bpm: f64,
    pub audio_gap_seconds: f64,
    pub video_gap_seconds: f64,
    pub video: Option<String>,
    pub background: Option<String>,
    pub parts: Vec<Part>,
}

impl Song {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn part(&self, index: usize) -> Result<&Part> {
        self.parts.get(index).ok_or(SingalongError::UnknownPart {
            requested: index,
            available: self.parts.len(),
        })
    }

    pub fn beat_grid(&self) -> BeatGrid {
        BeatGrid::new(self.bpm, self.audio_gap_seconds)
    }

    /// Converts a beat to milliseconds of audio playback time.
    pub fn to_time_ms(&self, beat: i64) -> f64 {
        self.beat_grid().to_time_ms(beat)
    }

    /// Beat sounding at `time_ms` of audio playback.
    pub fn beat_at_ms(&self, time_ms: f64) -> i64 {
        self.beat_grid().beat_at_ms(time_ms)
    }
}

/// Mapping between song beats and audio playback time. UltraStar BPM counts
/// quarter beats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatGrid {
    pub gap_ms: f64,
    pub beat_ms: f64,
}

impl BeatGrid {
    pub fn new(bpm: f64, gap_seconds: f64) -> Self {
        let beat_ms = if bpm > 0.0 { 60_000.0 / (bpm * 4.0) } else { 0.0 };
        Self {
            gap_ms: gap_seconds * 1000.0,
            beat_ms,
        }
    }

    pub fn to_time_ms(&self, beat: i64) -> f64 {
        self.gap_ms + beat as f64 * self.beat_ms
    }

    /// Floored inverse of [`to_time_ms`](Self::to_time_ms). Times before the
    /// gap map to negative beats; a grid without tempo maps everything to 0.
    pub fn beat_at_ms(&self, time_ms: f64) -> i64 {
        if self.beat_ms <= 0.0 {
            return 0;
        }
        ((time_ms - self.gap_ms) / self.beat_ms).floor() as i64
    }
}
