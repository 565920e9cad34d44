use std::sync::{Arc, Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender};

use crate::{BeatGrid, CaptureConfig, DetectedNote, PitchTracker, Result, SingalongError};

/// Capture front end for a local singer.
///
/// The audio callback pushes blocks into [`CaptureEngine::push_samples`] from
/// whatever thread it runs on. Every block with a recognisable pitch is mapped
/// onto the song's beat grid and at most one [`DetectedNote`] per beat is sent
/// to the paired receiver, which never blocks the sender.
#[derive(Clone)]
pub struct CaptureEngine {
    shared: Arc<Mutex<CaptureState>>,
    grid: BeatGrid,
    sender: Sender<DetectedNote>,
}

#[derive(Debug)]
struct CaptureState {
    tracker: PitchTracker,
    active: bool,
    last_beat: Option<i64>,
}

impl CaptureEngine {
    /// Creates an engine together with the receiving end of its note channel.
    pub fn new(config: CaptureConfig, grid: BeatGrid) -> (Self, Receiver<DetectedNote>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let state = CaptureState {
            tracker: PitchTracker::new(config),
            active: false,
            last_beat: None,
        };
        let engine = Self {
            shared: Arc::new(Mutex::new(state)),
            grid,
            sender,
        };
        (engine, receiver)
    }

    pub fn grid(&self) -> BeatGrid {
        self.grid
    }

    /// Starts a fresh capture timeline aligned with audio position zero.
    pub fn start(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.tracker.reset();
        state.last_beat = None;
        state.active = true;
        tracing::debug!("capture started");
        Ok(())
    }

    pub fn stop(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.active = false;
        tracing::debug!(elapsed_ms = state.tracker.elapsed_ms(), "capture stopped");
        Ok(())
    }

    pub fn is_active(&self) -> Result<bool> {
        Ok(self.lock()?.active)
    }

    /// Feeds a block of mono samples. Blocks arriving while the engine is
    /// stopped are discarded.
    pub fn push_samples(&self, samples: &[f32]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let mut state = self.lock()?;
        if !state.active {
            return Ok(());
        }

        let Some(estimate) = state.tracker.process_block(samples)? else {
            return Ok(());
        };

        let beat = self.grid.beat_at_ms(estimate.time_ms);
        if state.last_beat.is_some_and(|last| beat <= last) {
            return Ok(());
        }
        state.last_beat = Some(beat);

        let note = DetectedNote {
            time: beat,
            note: estimate.note,
        };
        if self.sender.send(note).is_err() {
            tracing::debug!(?note, "live source dropped, discarding detection");
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, CaptureState>> {
        self.shared
            .lock()
            .map_err(|_| SingalongError::msg("capture pipeline has been poisoned"))
    }
}

impl std::fmt::Debug for CaptureEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureEngine")
            .field("grid", &self.grid)
            .finish()
    }
}
