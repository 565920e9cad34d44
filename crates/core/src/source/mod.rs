//! Producers of detected notes for a player.

use std::path::Path;

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use crate::{BeatGrid, CaptureConfig, CaptureEngine, Result};

/// A pitch heard at one point of the song timeline. `time` shares the axis of
/// [`Note::beat`](crate::Note::beat); `note` is an absolute semitone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedNote {
    pub time: i64,
    pub note: i32,
}

impl DetectedNote {
    pub fn new(time: i64, note: i32) -> Self {
        Self { time, note }
    }
}

/// Reads a recorded detection log: a JSON array of `{ "time", "note" }`.
pub fn load_note_log(path: impl AsRef<Path>) -> Result<Vec<DetectedNote>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Common surface of live and remote note streams.
pub trait NoteStreamSource {
    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Pulls detections that arrived since the last call. Called once per tick
    /// before anything reads [`notes`](Self::notes).
    fn refresh(&mut self) {}

    /// Full detection history in arrival order.
    fn notes(&self) -> &[DetectedNote];

    /// Detections with `start <= time < end`.
    fn notes_in_range(&self, start: i64, end: i64) -> Vec<DetectedNote> {
        self.notes()
            .iter()
            .filter(|note| start <= note.time && note.time < end)
            .copied()
            .collect()
    }
}

/// Notes detected on this machine by a [`CaptureEngine`].
#[derive(Debug)]
pub struct LiveSource {
    engine: CaptureEngine,
    receiver: Receiver<DetectedNote>,
    notes: Vec<DetectedNote>,
}

impl LiveSource {
    pub fn new(config: CaptureConfig, grid: BeatGrid) -> Self {
        let (engine, receiver) = CaptureEngine::new(config, grid);
        Self {
            engine,
            receiver,
            notes: Vec::new(),
        }
    }

    /// Handle for the audio callback feeding this source.
    pub fn engine(&self) -> CaptureEngine {
        self.engine.clone()
    }
}

impl NoteStreamSource for LiveSource {
    /// Begins a new performance; detections of a previous one are discarded.
    fn start(&mut self) -> Result<()> {
        // Drain before capture resumes.
        self.receiver.try_iter().for_each(drop);
        self.notes.clear();
        self.engine.start()
    }

    fn stop(&mut self) -> Result<()> {
        self.engine.stop()
    }

    fn refresh(&mut self) {
        for note in self.receiver.try_iter() {
            if self.notes.last().is_some_and(|last| note.time < last.time) {
                tracing::debug!(?note, "dropping out of order detection");
                continue;
            }
            self.notes.push(note);
        }
    }

    fn notes(&self) -> &[DetectedNote] {
        &self.notes
    }

    fn notes_in_range(&self, start: i64, end: i64) -> Vec<DetectedNote> {
        let from = self.notes.partition_point(|note| note.time < start);
        let to = self.notes.partition_point(|note| note.time < end).max(from);
        self.notes[from..to].to_vec()
    }
}

/// Notes pushed to us on behalf of a singer on another machine. Lifecycle is
/// owned by the remote peer, so start and stop do nothing.
#[derive(Debug, Clone, Default)]
pub struct RemoteSource {
    notes: Vec<DetectedNote>,
}

impl RemoteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_notes(&mut self, batch: impl IntoIterator<Item = DetectedNote>) {
        self.notes.extend(batch);
    }
}

impl NoteStreamSource for RemoteSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn notes(&self) -> &[DetectedNote] {
        &self.notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::sine_block;

    #[test]
    fn note_log_reads_json_array() {
        let path = std::env::temp_dir().join(format!("singalong-notes-{}.json", std::process::id()));
        std::fs::write(&path, r#"[{ "time": 0, "note": 60 }, { "time": 2, "note": 62 }]"#).unwrap();
        let notes = load_note_log(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(notes, vec![DetectedNote::new(0, 60), DetectedNote::new(2, 62)]);

        assert!(load_note_log(path).is_err());
    }

    #[test]
    fn remote_filters_half_open_range() {
        let mut remote = RemoteSource::new();
        remote.add_notes([DetectedNote::new(5, 60), DetectedNote::new(1, 61)]);
        remote.add_notes([DetectedNote::new(3, 62), DetectedNote::new(4, 63)]);

        assert_eq!(remote.notes().len(), 4);
        let in_range = remote.notes_in_range(3, 5);
        assert_eq!(
            in_range,
            vec![DetectedNote::new(3, 62), DetectedNote::new(4, 63)]
        );
        assert!(remote.notes_in_range(6, 10).is_empty());

        remote.start().unwrap();
        remote.stop().unwrap();
        assert_eq!(remote.notes().len(), 4);
    }

    #[test]
    fn live_collects_captured_notes_on_refresh() {
        let mut live = LiveSource::new(CaptureConfig::default(), BeatGrid::new(300.0, 0.0));
        let engine = live.engine();
        live.start().unwrap();

        for block in 0..6 {
            engine
                .push_samples(&sine_block(261.63, 48_000, 2048, block * 2048))
                .unwrap();
        }
        assert!(live.notes().is_empty());

        live.refresh();
        let notes = live.notes().to_vec();
        assert!(!notes.is_empty());
        assert!(notes.iter().all(|note| note.note == 60));

        let first = notes[0].time;
        assert_eq!(live.notes_in_range(first, first + 1), vec![notes[0]]);
        assert!(live.notes_in_range(first + 100, first).is_empty());
    }

    #[test]
    fn live_restart_discards_previous_performance() {
        let mut live = LiveSource::new(CaptureConfig::default(), BeatGrid::new(300.0, 0.0));
        let engine = live.engine();
        live.start().unwrap();
        engine
            .push_samples(&sine_block(440.0, 48_000, 2048, 0))
            .unwrap();
        live.refresh();
        assert_eq!(live.notes().len(), 1);

        live.stop().unwrap();
        engine
            .push_samples(&sine_block(440.0, 48_000, 2048, 2048))
            .unwrap();
        live.start().unwrap();
        live.refresh();
        assert!(live.notes().is_empty());
    }

    #[test]
    fn singing_right_after_start_is_kept() {
        let mut live = LiveSource::new(CaptureConfig::default(), BeatGrid::new(300.0, 0.0));
        let engine = live.engine();
        live.start().unwrap();
        engine
            .push_samples(&sine_block(440.0, 48_000, 2048, 0))
            .unwrap();
        live.stop().unwrap();

        let worker = live.engine();
        live.start().unwrap();
        std::thread::spawn(move || {
            worker
                .push_samples(&sine_block(440.0, 48_000, 2048, 0))
                .unwrap();
        })
        .join()
        .unwrap();

        live.refresh();
        assert_eq!(live.notes().len(), 1);
        assert_eq!(live.notes()[0].note, 69);
    }
}
