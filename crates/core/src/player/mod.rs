use std::sync::Arc;

use crate::{
    CaptureConfig, CaptureEngine, DetectedNote, IncrementalScorer, LiveSource, NoteStreamSource,
    RemoteSource, Result, ScoreSheet, Song, MAX_SCORE,
};

/// Where a player's notes and score come from.
#[derive(Debug)]
pub enum Participant {
    /// Sung on this machine; scored locally.
    Local {
        source: LiveSource,
        scorer: IncrementalScorer,
    },
    /// Sung elsewhere; the peer reports its own score.
    Remote { source: RemoteSource, score: u32 },
}

/// A singer assigned to one vocal part for the length of a session.
#[derive(Debug)]
pub struct Player {
    part: usize,
    participant: Participant,
}

impl Player {
    /// Local singer capturing through a fresh [`LiveSource`].
    pub fn local(song: &Song, part: usize, config: &CaptureConfig) -> Result<Self> {
        let sheet = Arc::new(ScoreSheet::for_part(song, part)?);
        let source = LiveSource::new(config.clone(), song.beat_grid());
        Ok(Self::with_source(part, source, sheet))
    }

    pub fn with_source(part: usize, source: LiveSource, sheet: Arc<ScoreSheet>) -> Self {
        Self {
            part,
            participant: Participant::Local {
                source,
                scorer: IncrementalScorer::new(sheet),
            },
        }
    }

    pub fn remote(part: usize) -> Self {
        Self {
            part,
            participant: Participant::Remote {
                source: RemoteSource::new(),
                score: 0,
            },
        }
    }

    pub fn part(&self) -> usize {
        self.part
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.participant, Participant::Remote { .. })
    }

    pub fn source(&self) -> &dyn NoteStreamSource {
        match &self.participant {
            Participant::Local { source, .. } => source,
            Participant::Remote { source, .. } => source,
        }
    }

    fn source_mut(&mut self) -> &mut dyn NoteStreamSource {
        match &mut self.participant {
            Participant::Local { source, .. } => source,
            Participant::Remote { source, .. } => source,
        }
    }

    /// Capture handle of a local player, for the audio callback.
    pub fn capture(&self) -> Option<CaptureEngine> {
        match &self.participant {
            Participant::Local { source, .. } => Some(source.engine()),
            Participant::Remote { .. } => None,
        }
    }

    /// Appends notes received from the network. Ignored for local players.
    pub fn add_remote_notes(&mut self, batch: impl IntoIterator<Item = DetectedNote>) -> bool {
        match &mut self.participant {
            Participant::Remote { source, .. } => {
                source.add_notes(batch);
                true
            }
            Participant::Local { .. } => false,
        }
    }

    /// Stores the score reported by a remote peer. Ignored for local players.
    pub fn set_remote_score(&mut self, reported: u32) -> bool {
        match &mut self.participant {
            Participant::Remote { score, .. } => {
                *score = reported.min(MAX_SCORE);
                true
            }
            Participant::Local { .. } => false,
        }
    }

    /// Current score. Local players are rescored against everything detected
    /// so far; remote scores are returned as reported.
    pub fn score(&mut self) -> u32 {
        match &mut self.participant {
            Participant::Local { source, scorer } => scorer.update(source.notes()),
            Participant::Remote { score, .. } => *score,
        }
    }

    pub fn refresh(&mut self) {
        self.source_mut().refresh();
    }

    pub fn start(&mut self) -> Result<()> {
        if let Participant::Local { scorer, .. } = &mut self.participant {
            scorer.reset();
        }
        self.source_mut().start()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.source_mut().stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{midi_to_frequency, sine_block};
    use crate::{Note, NoteKind, Part, Phrase};

    fn song() -> Song {
        Song {
            bpm: 300.0,
            parts: vec![Part {
                phrases: vec![Phrase {
                    notes: vec![
                        Note::new(NoteKind::Normal, 57, 0, 4),
                        Note::new(NoteKind::Normal, 64, 4, 4),
                    ],
                }],
            }],
            ..Song::default()
        }
    }

    #[test]
    fn remote_score_is_trusted_but_clamped() {
        let mut player = Player::remote(0);
        assert!(player.is_remote());
        assert_eq!(player.score(), 0);
        assert!(player.set_remote_score(4200));
        assert_eq!(player.score(), 4200);
        player.set_remote_score(50_000);
        assert_eq!(player.score(), MAX_SCORE);
        assert!(player.capture().is_none());
    }

    #[test]
    fn remote_notes_are_not_scored_locally() {
        let mut player = Player::remote(0);
        player.add_remote_notes([DetectedNote::new(0, 57), DetectedNote::new(1, 57)]);
        assert_eq!(player.source().notes().len(), 2);
        assert_eq!(player.score(), 0);
    }

    #[test]
    fn local_player_rejects_remote_input() {
        let mut player = Player::local(&song(), 0, &CaptureConfig::default()).unwrap();
        assert!(!player.add_remote_notes([DetectedNote::new(0, 57)]));
        assert!(!player.set_remote_score(100));
        assert!(player.source().notes().is_empty());
    }

    #[test]
    fn unknown_part_cannot_be_assigned() {
        assert!(Player::local(&song(), 3, &CaptureConfig::default()).is_err());
    }

    #[test]
    fn local_player_scores_captured_singing() {
        let song = song();
        let mut player = Player::local(&song, 0, &CaptureConfig::default()).unwrap();
        let capture = player.capture().unwrap();
        player.start().unwrap();

        // 50 ms beats; 2400 samples per block cover exactly one beat.
        let tone = midi_to_frequency(57);
        for block in 0..4 {
            capture
                .push_samples(&sine_block(tone, 48_000, 2400, block * 2400))
                .unwrap();
        }
        player.refresh();
        assert_eq!(player.score(), 5000);

        player.stop().unwrap();
        assert_eq!(player.score(), 5000);
    }
}
