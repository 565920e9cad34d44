//! Matches detected pitches against the expected notes of a part.
//!
//! Every player can reach at most [`MAX_SCORE`] points. The budget is spread
//! evenly over the beats of all non-freestyle notes, and a beat earns its
//! share when a detected note inside the note window has a pitch class within
//! one semitone of the expected pitch.

use std::sync::Arc;

use crate::{DetectedNote, Note, Result, Song};

/// Score of a flawless performance.
pub const MAX_SCORE: u32 = 10_000;

/// Compares pitch classes, ignoring octaves. Neighbouring semitones count as
/// a hit, including across the B/C boundary.
pub fn pitch_class_matches(detected: i32, expected: i32) -> bool {
    let diff = (detected.rem_euclid(12) - expected.rem_euclid(12)).abs();
    diff <= 1 || diff >= 11
}

/// Scoreable notes of one song part together with the per-beat budget.
/// Built once per song/part pairing and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSheet {
    notes: Vec<Note>,
    total_beats: i64,
    score_per_beat: f64,
}

impl ScoreSheet {
    pub fn for_part(song: &Song, part: usize) -> Result<Self> {
        Ok(Self::from_notes(song.part(part)?.notes().cloned()))
    }

    pub fn from_notes(notes: impl IntoIterator<Item = Note>) -> Self {
        let mut notes: Vec<Note> = notes.into_iter().filter(Note::is_scored).collect();
        notes.sort_by_key(|note| note.beat);

        let total_beats: i64 = notes.iter().map(|note| note.length.max(0)).sum();
        let score_per_beat = if total_beats > 0 {
            f64::from(MAX_SCORE) / total_beats as f64
        } else {
            0.0
        };

        Self {
            notes,
            total_beats,
            score_per_beat,
        }
    }

    pub fn total_beats(&self) -> i64 {
        self.total_beats
    }

    pub fn score_per_beat(&self) -> f64 {
        self.score_per_beat
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Scores a complete detection history from scratch.
    pub fn score(&self, detected: &[DetectedNote]) -> u32 {
        let mut sweep = Sweep::default();
        sweep.run(self, detected);
        sweep.score()
    }
}

/// Resumable two-pointer sweep over expected notes and detections.
#[derive(Debug, Clone, Default)]
struct Sweep {
    note: usize,
    cursor: usize,
    /// Time of the detection last rewarded inside the current note window.
    awarded_at: Option<i64>,
    sum: f64,
}

impl Sweep {
    fn run(&mut self, sheet: &ScoreSheet, detected: &[DetectedNote]) {
        while let Some(note) = sheet.notes.get(self.note) {
            while detected
                .get(self.cursor)
                .is_some_and(|hit| hit.time < note.beat)
            {
                self.cursor += 1;
            }

            while let Some(hit) = detected.get(self.cursor) {
                if hit.time >= note.end() {
                    break;
                }
                if self.awarded_at != Some(hit.time) && pitch_class_matches(hit.note, note.pitch) {
                    self.sum += sheet.score_per_beat;
                    self.awarded_at = Some(hit.time);
                }
                self.cursor += 1;
            }

            // History exhausted before the window closed: later detections may
            // still land in this note, so the sweep resumes here.
            if self.cursor >= detected.len() {
                return;
            }

            self.note += 1;
            self.awarded_at = None;
        }
    }

    fn score(&self) -> u32 {
        let rounded = self.sum.round().max(0.0);
        if rounded >= f64::from(MAX_SCORE) {
            MAX_SCORE
        } else {
            rounded as u32
        }
    }
}

/// Caches the sweep position between calls so that re-scoring a growing
/// history only visits the new detections.
#[derive(Debug, Clone)]
pub struct IncrementalScorer {
    sheet: Arc<ScoreSheet>,
    sweep: Sweep,
}

impl IncrementalScorer {
    pub fn new(sheet: Arc<ScoreSheet>) -> Self {
        Self {
            sheet,
            sweep: Sweep::default(),
        }
    }

    pub fn sheet(&self) -> &ScoreSheet {
        &self.sheet
    }

    /// Returns the score of `detected`, which is expected to extend the
    /// history passed on the previous call. A shorter history restarts the
    /// sweep.
    pub fn update(&mut self, detected: &[DetectedNote]) -> u32 {
        if detected.len() < self.sweep.cursor {
            tracing::debug!(
                cached = self.sweep.cursor,
                len = detected.len(),
                "detection history shrank, rescoring"
            );
            self.reset();
        }
        self.sweep.run(&self.sheet, detected);
        self.sweep.score()
    }

    pub fn reset(&mut self) {
        self.sweep = Sweep::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoteKind;

    fn note(pitch: i32, beat: i64, length: i64) -> Note {
        Note::new(NoteKind::Normal, pitch, beat, length)
    }

    fn hit(time: i64, note: i32) -> DetectedNote {
        DetectedNote { time, note }
    }

    /// One matching detection on every beat of every note.
    fn perfect_run(sheet: &ScoreSheet) -> Vec<DetectedNote> {
        sheet
            .notes()
            .iter()
            .flat_map(|n| (n.beat..n.end()).map(move |t| hit(t, n.pitch + 24)))
            .collect()
    }

    #[test]
    fn pitch_classes_wrap_around_the_octave() {
        assert!(pitch_class_matches(0, 11));
        assert!(pitch_class_matches(11, 0));
        assert!(pitch_class_matches(60, 61));
        assert!(pitch_class_matches(72, 60));
        assert!(!pitch_class_matches(0, 6));
        assert!(!pitch_class_matches(6, 0));
        assert!(!pitch_class_matches(62, 60));
        assert!(pitch_class_matches(-1, 0));
    }

    #[test]
    fn budget_is_split_across_scored_beats() {
        let sheet = ScoreSheet::from_notes(vec![
            note(0, 0, 1),
            note(2, 2, 1),
            Note::new(NoteKind::Freestyle, 4, 3, 5),
            note(4, 4, 1),
            Note::new(NoteKind::Golden, 5, 6, 1),
        ]);
        assert_eq!(sheet.total_beats(), 4);
        assert_eq!(sheet.score_per_beat(), 2500.0);
        assert_eq!(sheet.notes().len(), 4);
    }

    #[test]
    fn matching_every_window_scores_the_maximum() {
        let sheet = ScoreSheet::from_notes(vec![
            note(0, 0, 3),
            Note::new(NoteKind::Freestyle, 9, 3, 2),
            note(5, 6, 7),
            note(11, 14, 1),
        ]);
        let detected = perfect_run(&sheet);
        assert_eq!(sheet.score(&detected), MAX_SCORE);
    }

    #[test]
    fn empty_history_scores_zero() {
        let sheet = ScoreSheet::from_notes(vec![note(0, 0, 4)]);
        assert_eq!(sheet.score(&[]), 0);
    }

    #[test]
    fn part_without_scored_beats_scores_zero() {
        let sheet = ScoreSheet::from_notes(vec![Note::new(NoteKind::Freestyle, 0, 0, 4)]);
        assert_eq!(sheet.total_beats(), 0);
        assert_eq!(sheet.score(&[hit(0, 0), hit(1, 0)]), 0);
    }

    #[test]
    fn partial_matches_score_their_share() {
        let sheet = ScoreSheet::from_notes(vec![
            note(0, 0, 1),
            note(2, 1, 1),
            note(4, 2, 1),
            note(5, 3, 1),
        ]);
        let detected = [hit(0, 12), hit(1, 8), hit(2, 16), hit(3, 11)];
        assert_eq!(sheet.score(&detected), 5000);
    }

    #[test]
    fn notes_sung_before_the_window_do_not_count() {
        let sheet = ScoreSheet::from_notes(vec![note(0, 10, 2)]);
        assert_eq!(sheet.score(&[hit(8, 0), hit(9, 0)]), 0);
        assert_eq!(sheet.score(&[hit(9, 0), hit(10, 0)]), 5000);
    }

    #[test]
    fn duplicates_never_exceed_the_maximum() {
        let sheet = ScoreSheet::from_notes(vec![note(0, 0, 2), note(0, 1, 2)]);
        let detected: Vec<_> = (0..3).flat_map(|t| [hit(t, 0); 6]).collect();
        assert!(sheet.score(&detected) <= MAX_SCORE);

        let single = ScoreSheet::from_notes(vec![note(0, 0, 1)]);
        assert_eq!(single.score(&[hit(0, 0); 10]), MAX_SCORE);
    }

    #[test]
    fn score_grows_monotonically_with_history() {
        let sheet = ScoreSheet::from_notes(vec![note(0, 0, 4), note(7, 6, 4), note(2, 12, 2)]);
        let detected: Vec<_> = (0..16).map(|t| hit(t, (t as i32 * 5) % 12)).collect();

        let mut previous = 0;
        for len in 0..=detected.len() {
            let score = sheet.score(&detected[..len]);
            assert!(score >= previous, "score dropped at {len}");
            previous = score;
        }
    }

    #[test]
    fn incremental_matches_batch_recomputation() {
        let sheet = Arc::new(ScoreSheet::from_notes(vec![
            note(0, 0, 4),
            note(7, 6, 4),
            note(2, 12, 2),
        ]));
        let detected: Vec<_> = (0..16)
            .flat_map(|t| [hit(t, 0), hit(t, 7)])
            .collect();

        let mut scorer = IncrementalScorer::new(sheet.clone());
        for len in 0..=detected.len() {
            assert_eq!(
                scorer.update(&detected[..len]),
                sheet.score(&detected[..len]),
                "diverged at {len}"
            );
        }
        // Repeated calls are idempotent.
        let full = scorer.update(&detected);
        assert_eq!(scorer.update(&detected), full);
    }

    #[test]
    fn incremental_restarts_when_history_shrinks() {
        let sheet = Arc::new(ScoreSheet::from_notes(vec![note(0, 0, 4)]));
        let mut scorer = IncrementalScorer::new(sheet);
        assert_eq!(scorer.update(&[hit(0, 0), hit(1, 0)]), 5000);
        assert_eq!(scorer.update(&[hit(3, 0)]), 2500);
    }

    #[test]
    fn out_of_order_history_does_not_panic() {
        let sheet = ScoreSheet::from_notes(vec![note(0, 0, 2), note(0, 4, 2)]);
        let detected = [hit(5, 0), hit(0, 0), hit(4, 0), hit(1, 0), hit(-3, 0)];
        assert!(sheet.score(&detected) <= MAX_SCORE);

        let mut scorer = IncrementalScorer::new(Arc::new(sheet));
        for len in 0..=detected.len() {
            assert!(scorer.update(&detected[..len]) <= MAX_SCORE);
        }
    }

    #[test]
    fn sheet_follows_the_assigned_part() {
        let song = Song {
            parts: vec![
                crate::Part::default(),
                crate::Part {
                    phrases: vec![crate::Phrase {
                        notes: vec![note(0, 0, 2), note(0, 2, 2)],
                    }],
                },
            ],
            ..Song::default()
        };
        assert_eq!(ScoreSheet::for_part(&song, 0).unwrap().total_beats(), 0);
        assert_eq!(ScoreSheet::for_part(&song, 1).unwrap().total_beats(), 4);
        assert!(ScoreSheet::for_part(&song, 2).is_err());
    }
}
