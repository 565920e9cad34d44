use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{CaptureConfig, Result, SingalongError};

/// Pitch found in a single block of captured audio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchEstimate {
    /// Midpoint of the analysed block, in milliseconds since capture start.
    pub time_ms: f64,
    pub frequency_hz: f32,
    /// Nearest absolute MIDI semitone.
    pub note: i32,
    pub rms: f32,
}

/// Minimal monophonic pitch tracker: picks the strongest spectral peak inside
/// the configured vocal range. It is synchronous so tests and the command line
/// driver can feed it blocks directly.
pub struct PitchTracker {
    config: CaptureConfig,
    processed_samples: usize,
    fft_planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl PitchTracker {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            processed_samples: 0,
            fft_planner: RealFftPlanner::new(),
            fft: None,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Restarts the capture timeline. FFT plans are kept.
    pub fn reset(&mut self) {
        self.processed_samples = 0;
    }

    /// Milliseconds of audio consumed since the last reset.
    pub fn elapsed_ms(&self) -> f64 {
        self.samples_to_ms(self.processed_samples)
    }

    /// Consumes one block of mono samples. Silent blocks and blocks without a
    /// peak inside the vocal range yield `None` but still advance the clock.
    pub fn process_block(&mut self, samples: &[f32]) -> Result<Option<PitchEstimate>> {
        if samples.len() < 2 {
            return Err(SingalongError::InvalidInput(
                "pitch tracking requires blocks with at least two samples",
            ));
        }
        if self.config.sample_rate == 0 {
            return Err(SingalongError::InvalidInput("sample rate must be positive"));
        }

        let start = self.processed_samples;
        self.processed_samples += samples.len();
        let time_ms = (self.samples_to_ms(start) + self.samples_to_ms(self.processed_samples)) * 0.5;

        let rms = compute_rms(samples);
        if rms < self.config.min_rms {
            return Ok(None);
        }

        let Some(frequency_hz) = self.dominant_frequency(samples)? else {
            return Ok(None);
        };

        Ok(Some(PitchEstimate {
            time_ms,
            frequency_hz,
            note: frequency_to_midi(frequency_hz),
            rms,
        }))
    }

    fn samples_to_ms(&self, samples: usize) -> f64 {
        samples as f64 * 1000.0 / f64::from(self.config.sample_rate.max(1))
    }

    fn dominant_frequency(&mut self, samples: &[f32]) -> Result<Option<f32>> {
        let len = samples.len();
        let bin_hz = self.config.sample_rate as f32 / len as f32;
        let min_hz = self.config.min_frequency_hz;
        let max_hz = self.config.max_frequency_hz;
        let fft = self.prepare_fft(len);

        for (index, value) in samples.iter().enumerate() {
            fft.input[index] = *value * hann_value(index, len);
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        let last_bin = fft.spectrum.len().saturating_sub(1);
        let low = ((min_hz / bin_hz).ceil() as usize).max(1);
        let high = ((max_hz / bin_hz).floor() as usize).min(last_bin);
        if low > high {
            return Ok(None);
        }

        let magnitudes: Vec<f32> = fft.spectrum.iter().map(|bin| bin.norm()).collect();
        let mut peak = low;
        for bin in low..=high {
            if magnitudes[bin] > magnitudes[peak] {
                peak = bin;
            }
        }

        if magnitudes[peak] <= f32::EPSILON {
            return Ok(None);
        }

        // Parabolic interpolation between the neighbouring bins.
        let offset = if peak > 0 && peak < last_bin {
            let (a, b, c) = (magnitudes[peak - 1], magnitudes[peak], magnitudes[peak + 1]);
            let denominator = a - 2.0 * b + c;
            if denominator.abs() > f32::EPSILON {
                (0.5 * (a - c) / denominator).clamp(-0.5, 0.5)
            } else {
                0.0
            }
        } else {
            0.0
        };

        Ok(Some((peak as f32 + offset) * bin_hz))
    }

    fn prepare_fft(&mut self, size: usize) -> &mut FftResources {
        let rebuild = self
            .fft
            .as_ref()
            .map(|fft| fft.size != size)
            .unwrap_or(true);

        if rebuild {
            self.fft = None;
        }

        let planner = &mut self.fft_planner;
        self.fft.get_or_insert_with(|| {
            let plan = planner.plan_fft_forward(size);
            let scratch = plan.make_scratch_vec();
            let spectrum = plan.make_output_vec();
            let input = plan.make_input_vec();
            FftResources {
                size,
                plan,
                scratch,
                spectrum,
                input,
            }
        })
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for PitchTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PitchTracker")
            .field("config", &self.config)
            .field("processed_samples", &self.processed_samples)
            .field("fft", &self.fft)
            .finish()
    }
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

/// Nearest MIDI note number for a frequency (A4 = 440 Hz = 69).
pub fn frequency_to_midi(frequency_hz: f32) -> i32 {
    (69.0 + 12.0 * (frequency_hz / 440.0).log2()).round() as i32
}

/// Frequency of a MIDI note number, used to synthesise reference tones.
pub fn midi_to_frequency(note: i32) -> f32 {
    440.0 * 2f32.powf((note - 69) as f32 / 12.0)
}

fn compute_rms(samples: &[f32]) -> f32 {
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

#[cfg(test)]
pub(crate) fn sine_block(frequency_hz: f32, sample_rate: u32, len: usize, offset: usize) -> Vec<f32> {
    (offset..offset + len)
        .map(|i| 0.5 * (2.0 * PI * frequency_hz * i as f32 / sample_rate as f32).sin())
        .collect()
}
