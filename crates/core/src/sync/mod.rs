//! Keeps the background video aligned with the audio clock.
//!
//! Audio is the authority. The video is started at the song's video gap and
//! then only watched: once it is further than the configured tolerance from
//! where the audio says it should be, it is disabled for the rest of the
//! session and playback continues audio only.

use std::time::Duration;

use crate::{DiagnosticEvent, MediaClock, Notifier, Scheduler, SyncConfig, TimerId};

#[derive(Debug)]
pub struct SyncController<V> {
    video: Option<V>,
    video_gap_seconds: f64,
    drift_tolerance_seconds: f64,
    /// One-way: once false it stays false for the lifetime of the controller.
    video_enabled: bool,
    running: bool,
    deferred_start: Option<TimerId>,
    notifier: Notifier,
}

impl<V: MediaClock> SyncController<V> {
    /// A video without media is treated as no video at all.
    pub fn new(
        video: Option<V>,
        video_gap_seconds: f64,
        config: &SyncConfig,
        notifier: Notifier,
    ) -> Self {
        let video_enabled = video.as_ref().is_some_and(MediaClock::has_media);
        Self {
            video,
            video_gap_seconds,
            drift_tolerance_seconds: config.drift_tolerance_seconds,
            video_enabled,
            running: false,
            deferred_start: None,
            notifier,
        }
    }

    pub fn video(&self) -> Option<&V> {
        self.video.as_ref()
    }

    /// Host access for feeding decoded frames or simulated time.
    pub fn video_mut(&mut self) -> Option<&mut V> {
        self.video.as_mut()
    }

    pub fn video_enabled(&self) -> bool {
        self.video_enabled
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn deferred_start(&self) -> Option<TimerId> {
        self.deferred_start
    }

    /// Starts playback. With a negative video gap the video is held at zero
    /// and `wake` is scheduled for when it should begin; the owner passes that
    /// wakeup back through [`start_deferred_video`](Self::start_deferred_video).
    pub fn start<T: Clone + PartialEq>(&mut self, scheduler: &mut Scheduler<T>, wake: T) {
        self.running = true;
        let Some(video) = self.video.as_mut() else {
            return;
        };
        video.seek(0.0);
        if !self.video_enabled {
            return;
        }

        if self.video_gap_seconds >= 0.0 && self.video_gap_seconds.is_finite() {
            video.seek(self.video_gap_seconds);
            video.play();
            self.notifier.emit(DiagnosticEvent::VideoStarted {
                position_seconds: self.video_gap_seconds,
            });
            return;
        }

        let delay_seconds = -self.video_gap_seconds;
        let Ok(delay) = Duration::try_from_secs_f64(delay_seconds) else {
            video.disable();
            self.video_enabled = false;
            self.notifier.emit(DiagnosticEvent::VideoUnavailable {
                video_gap_seconds: self.video_gap_seconds,
            });
            return;
        };
        if let Some(stale) = self.deferred_start.take() {
            scheduler.cancel(stale);
        }
        self.deferred_start = Some(scheduler.schedule_after(delay, wake));
        self.notifier
            .emit(DiagnosticEvent::VideoDeferred { delay_seconds });
    }

    /// Fired by the deferred start timer.
    pub fn start_deferred_video(&mut self) {
        if self.deferred_start.take().is_none() || !self.running || !self.video_enabled {
            return;
        }
        if let Some(video) = self.video.as_mut() {
            video.play();
            self.notifier.emit(DiagnosticEvent::VideoStarted {
                position_seconds: video.current_time(),
            });
        }
    }

    /// Cancels a pending deferred start and pauses the video. Idempotent.
    pub fn stop<T: Clone + PartialEq>(&mut self, scheduler: &mut Scheduler<T>) {
        if let Some(timer) = self.deferred_start.take() {
            scheduler.cancel(timer);
        }
        if let Some(video) = self.video.as_mut() {
            video.pause();
        }
        self.running = false;
    }

    /// Seeks the video back to its first frame, e.g. while the title card is
    /// shown.
    pub fn rewind_video(&mut self) {
        if self.video_enabled {
            if let Some(video) = self.video.as_mut() {
                video.seek(0.0);
            }
        }
    }

    /// Distance between where the video is and where the audio says it should
    /// be. `None` while the video is disabled or not due to play yet.
    pub fn drift_at(&self, audio_seconds: f64) -> Option<f64> {
        if !self.video_enabled || audio_seconds < (-self.video_gap_seconds).max(0.0) {
            return None;
        }
        let video = self.video.as_ref()?;
        Some((video.current_time() - audio_seconds - self.video_gap_seconds).abs())
    }

    /// Compares the clocks and drops the video when they drifted apart.
    /// Returns whether video is still enabled afterwards.
    pub fn tick(&mut self, audio_seconds: f64) -> bool {
        let Some(drift) = self.drift_at(audio_seconds) else {
            return self.video_enabled;
        };
        if drift <= self.drift_tolerance_seconds {
            return true;
        }

        let Some(video) = self.video.as_mut() else {
            return false;
        };
        let video_seconds = video.current_time();
        video.disable();
        self.video_enabled = false;
        self.notifier.emit(DiagnosticEvent::DesyncDetected {
            video_seconds,
            audio_seconds,
            video_gap_seconds: self.video_gap_seconds,
            drift_seconds: drift,
        });
        false
    }
}
