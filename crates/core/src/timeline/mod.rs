use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Authoritative playback position in seconds. Never decreases while playing.
pub trait ClockSource {
    fn current_time(&self) -> f64;
}

/// Secondary media (the background video) that follows the audio clock.
pub trait MediaClock: ClockSource {
    fn seek(&mut self, seconds: f64);
    fn play(&mut self);
    fn pause(&mut self);
    /// Detaches the media for good. Later calls must not revive playback.
    fn disable(&mut self);
    fn has_media(&self) -> bool;
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackClock {
    pub time_seconds: f64,
}

impl PlaybackClock {
    pub fn reset(&mut self) {
        self.time_seconds = 0.0;
    }

    pub fn advance(&mut self, delta: f64) {
        self.time_seconds = (self.time_seconds + delta).max(0.0);
    }
}

impl ClockSource for PlaybackClock {
    fn current_time(&self) -> f64 {
        self.time_seconds
    }
}

/// Media clock driven by the host loop. `rate` lets tests and the simulator
/// run the video slightly fast or slow to provoke drift.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedMedia {
    position: f64,
    rate: f64,
    playing: bool,
    disabled: bool,
    has_media: bool,
}

impl SimulatedMedia {
    pub fn new(rate: f64) -> Self {
        Self {
            position: 0.0,
            rate,
            playing: false,
            disabled: false,
            has_media: true,
        }
    }

    /// A video element without a source.
    pub fn empty() -> Self {
        Self {
            has_media: false,
            ..Self::new(1.0)
        }
    }

    pub fn advance(&mut self, delta: f64) {
        if self.playing && !self.disabled {
            self.position += delta * self.rate;
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }
}

impl ClockSource for SimulatedMedia {
    fn current_time(&self) -> f64 {
        self.position
    }
}

impl MediaClock for SimulatedMedia {
    fn seek(&mut self, seconds: f64) {
        if !self.disabled {
            self.position = seconds.max(0.0);
        }
    }

    fn play(&mut self) {
        self.playing = self.has_media && !self.disabled;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn disable(&mut self) {
        self.disabled = true;
        self.playing = false;
        self.position = 0.0;
    }

    fn has_media(&self) -> bool {
        self.has_media && !self.disabled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Timer<T> {
    id: TimerId,
    due: Duration,
    period: Option<Duration>,
    payload: T,
}

/// Cooperative single-threaded scheduler.
///
/// The host advances it with its own monotonic clock, once per display
/// refresh. Each [`advance_to`](Self::advance_to) returns the timers that
/// came due (in due order), followed by the frame requests that were pending
/// when the call started. Requests made while handling a frame land in the
/// next one, which is what keeps a render loop from spinning.
#[derive(Debug)]
pub struct Scheduler<T> {
    now: Duration,
    timers: Vec<Timer<T>>,
    frames: Vec<T>,
    next_id: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            timers: Vec::new(),
            frames: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T: Clone + PartialEq> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// One-shot timer firing `delay` after the current host time.
    pub fn schedule_after(&mut self, delay: Duration, payload: T) -> TimerId {
        self.insert(delay, None, payload)
    }

    /// Repeating timer. A zero period is bumped to one millisecond.
    pub fn schedule_every(&mut self, period: Duration, payload: T) -> TimerId {
        let period = period.max(Duration::from_millis(1));
        self.insert(period, Some(period), payload)
    }

    /// Returns whether the timer was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.id != id);
        self.timers.len() != before
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.iter().any(|timer| timer.id == id)
    }

    /// Asks for `payload` on the next frame. Identical pending requests
    /// collapse into one.
    pub fn request_frame(&mut self, payload: T) {
        if !self.frames.contains(&payload) {
            self.frames.push(payload);
        }
    }

    pub fn has_frame_request(&self, payload: &T) -> bool {
        self.frames.contains(payload)
    }

    pub fn advance_to(&mut self, now: Duration) -> Vec<T> {
        self.now = self.now.max(now);

        let mut due: Vec<Timer<T>> = Vec::new();
        let mut index = 0;
        while index < self.timers.len() {
            if self.timers[index].due <= self.now {
                due.push(self.timers.swap_remove(index));
            } else {
                index += 1;
            }
        }
        due.sort_by(|a, b| a.due.cmp(&b.due).then(a.id.0.cmp(&b.id.0)));

        let mut fired = Vec::with_capacity(due.len() + self.frames.len());
        for mut timer in due {
            fired.push(timer.payload.clone());
            if let Some(period) = timer.period {
                // Missed periods coalesce into a single firing.
                timer.due += period;
                if timer.due <= self.now {
                    timer.due = self.now.checked_add(period).unwrap_or(Duration::MAX);
                }
                self.timers.push(timer);
            }
        }

        fired.append(&mut self.frames);
        fired
    }

    fn insert(&mut self, delay: Duration, period: Option<Duration>, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer {
            id,
            // Unrepresentable deadlines never come due.
            due: self.now.checked_add(delay).unwrap_or(Duration::MAX),
            period,
            payload,
        });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn playback_clock_never_goes_negative() {
        let mut clock = PlaybackClock::default();
        clock.advance(1.5);
        assert_eq!(clock.current_time(), 1.5);
        clock.advance(-4.0);
        assert_eq!(clock.current_time(), 0.0);
        clock.advance(0.25);
        clock.reset();
        assert_eq!(clock.current_time(), 0.0);
    }

    #[test]
    fn simulated_media_only_moves_while_playing() {
        let mut media = SimulatedMedia::new(2.0);
        media.advance(1.0);
        assert_eq!(media.current_time(), 0.0);

        media.seek(3.0);
        media.play();
        media.advance(0.5);
        assert_eq!(media.current_time(), 4.0);

        media.disable();
        media.play();
        media.seek(1.0);
        media.advance(1.0);
        assert!(!media.is_playing());
        assert!(!media.has_media());
        assert_eq!(media.current_time(), 0.0);
    }

    #[test]
    fn empty_media_never_plays() {
        let mut media = SimulatedMedia::empty();
        media.play();
        assert!(!media.is_playing());
        assert!(!media.has_media());
    }

    #[test]
    fn one_shot_timers_fire_once_in_due_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_after(ms(300), "late");
        scheduler.schedule_after(ms(100), "early");

        assert!(scheduler.advance_to(ms(50)).is_empty());
        assert_eq!(scheduler.advance_to(ms(400)), vec!["early", "late"]);
        assert!(scheduler.advance_to(ms(1000)).is_empty());
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule_after(ms(100), 1);
        assert!(scheduler.is_pending(id));
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert!(scheduler.advance_to(ms(200)).is_empty());
    }

    #[test]
    fn repeating_timers_rearm_and_coalesce() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule_every(ms(1000), "poll");

        assert_eq!(scheduler.advance_to(ms(1000)), vec!["poll"]);
        assert!(scheduler.advance_to(ms(1500)).is_empty());
        assert_eq!(scheduler.advance_to(ms(5200)), vec!["poll"]);
        assert!(scheduler.advance_to(ms(6000)).is_empty());
        assert_eq!(scheduler.advance_to(ms(6200)), vec!["poll"]);

        scheduler.cancel(id);
        assert!(scheduler.advance_to(ms(20_000)).is_empty());
    }

    #[test]
    fn frame_requests_are_delivered_once_and_deduplicated() {
        let mut scheduler = Scheduler::new();
        scheduler.request_frame("frame");
        scheduler.request_frame("frame");
        scheduler.request_frame("fade");
        assert!(scheduler.has_frame_request(&"frame"));

        assert_eq!(scheduler.advance_to(ms(16)), vec!["frame", "fade"]);
        assert!(scheduler.advance_to(ms(32)).is_empty());
    }

    #[test]
    fn timers_fire_before_frames() {
        let mut scheduler = Scheduler::new();
        scheduler.request_frame("frame");
        scheduler.schedule_after(ms(10), "timer");
        assert_eq!(scheduler.advance_to(ms(16)), vec!["timer", "frame"]);
    }

    #[test]
    fn host_time_does_not_run_backwards() {
        let mut scheduler: Scheduler<u8> = Scheduler::new();
        scheduler.advance_to(ms(500));
        scheduler.advance_to(ms(100));
        assert_eq!(scheduler.now(), ms(500));
    }

    #[test]
    fn far_future_timers_saturate_instead_of_overflowing() {
        let mut scheduler = Scheduler::new();
        scheduler.advance_to(ms(500));
        let id = scheduler.schedule_after(Duration::MAX, "never");
        scheduler.schedule_every(Duration::MAX, "rarely");

        assert!(scheduler.advance_to(ms(10_000)).is_empty());
        assert!(scheduler.is_pending(id));
    }
}
