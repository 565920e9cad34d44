use std::{f64::consts::TAU, sync::Arc};

use singalong_core::{midi_to_frequency, CaptureConfig, CaptureEngine, Part, Song};

const AMPLITUDE: f64 = 0.4;

/// A singer that hits every scored note of a part, pushed through the capture
/// pipeline one block at a time as if it came from a microphone.
pub struct SyntheticVoice {
    song: Arc<Song>,
    part: Part,
    sample_rate: u32,
    block: Vec<f32>,
    block_size: usize,
    samples_sung: u64,
    phase: f64,
    /// Beat of the last sample and the frequency sung on it.
    tone: Option<(i64, Option<f64>)>,
}

impl SyntheticVoice {
    pub fn new(song: Arc<Song>, part: Part, config: &CaptureConfig) -> Self {
        let block_size = config.block_size.max(2);
        Self {
            song,
            part,
            sample_rate: config.sample_rate,
            block: Vec::with_capacity(block_size),
            block_size,
            samples_sung: 0,
            phase: 0.0,
            tone: None,
        }
    }

    /// Produces audio up to `seconds` of playback time. Complete blocks are
    /// handed to `capture`; a partial block waits for the next call.
    pub fn sing_until(
        &mut self,
        seconds: f64,
        capture: &CaptureEngine,
    ) -> singalong_core::Result<()> {
        let rate = f64::from(self.sample_rate);
        let target = (seconds * rate).max(0.0) as u64;
        while self.samples_sung < target {
            let time_ms = self.samples_sung as f64 * 1000.0 / rate;
            let beat = self.song.beat_at_ms(time_ms);
            let frequency = self.frequency_at(beat);
            let sample = match frequency {
                Some(frequency) => {
                    self.phase = (self.phase + TAU * frequency / rate) % TAU;
                    (AMPLITUDE * self.phase.sin()) as f32
                }
                None => 0.0,
            };
            self.block.push(sample);
            self.samples_sung += 1;

            if self.block.len() == self.block_size {
                capture.push_samples(&self.block)?;
                self.block.clear();
            }
        }
        Ok(())
    }

    fn frequency_at(&mut self, beat: i64) -> Option<f64> {
        if let Some((cached, frequency)) = self.tone {
            if cached == beat {
                return frequency;
            }
        }
        let frequency = self
            .part
            .note_at(beat)
            .filter(|note| note.is_scored())
            .map(|note| f64::from(midi_to_frequency(note.pitch)));
        self.tone = Some((beat, frequency));
        frequency
    }
}
