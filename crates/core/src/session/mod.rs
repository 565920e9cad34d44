//! Composition root of one karaoke performance.
//!
//! [`GameSession`] owns the clocks, the sync controller, the players and the
//! overlays, and runs them from a single cooperative [`Scheduler`]. The host
//! calls [`GameSession::advance`] once per display refresh with its monotonic
//! time; everything else happens inside that call.

use std::sync::Arc;

use crate::{
    AppConfig, ClockSource, DiagnosticEvent, Layout, MediaClock, Notifier, Player, ReadySignal,
    RenderGraph, Scheduler, Song, SyncController, TimerId, TitleCard, TitleFrame, TitleOverlay,
    TitleState,
};

/// Reasons the scheduler wakes a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    Frame,
    VideoStart,
    DensityPoll,
    TitleHold,
    TitleFade,
}

/// Reports the current device pixel ratio of the output surface.
pub trait DensityProbe {
    fn device_pixel_ratio(&self) -> f64;
}

/// Probe for surfaces whose density never changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedDensity(pub f64);

impl DensityProbe for FixedDensity {
    fn device_pixel_ratio(&self) -> f64 {
        self.0
    }
}

pub struct GameSession<A, V> {
    song: Arc<Song>,
    audio: A,
    sync: SyncController<V>,
    scheduler: Scheduler<Wakeup>,
    graph: RenderGraph,
    players: Vec<Player>,
    layout: Layout,
    title_overlay: Option<Box<dyn TitleOverlay>>,
    title: Option<TitleCard>,
    title_timer: Option<TimerId>,
    density_probe: Box<dyn DensityProbe>,
    density: Option<f64>,
    density_timer: Option<TimerId>,
    ready: ReadySignal,
    running: bool,
    frames_rendered: u64,
    config: AppConfig,
    notifier: Notifier,
}

impl<A: ClockSource, V: MediaClock> GameSession<A, V> {
    pub fn new(
        song: Arc<Song>,
        audio: A,
        video: Option<V>,
        config: AppConfig,
        notifier: Notifier,
    ) -> Self {
        let sync = SyncController::new(
            video,
            song.video_gap_seconds,
            &config.sync,
            notifier.clone(),
        );
        Self {
            song,
            audio,
            sync,
            scheduler: Scheduler::new(),
            graph: RenderGraph::new(),
            players: Vec::new(),
            layout: Layout::default(),
            title_overlay: None,
            title: None,
            title_timer: None,
            density_probe: Box::new(FixedDensity(1.0)),
            density: None,
            density_timer: None,
            ready: ReadySignal::default(),
            running: false,
            frames_rendered: 0,
            config,
            notifier,
        }
    }

    pub fn song(&self) -> &Arc<Song> {
        &self.song
    }

    pub fn audio(&self) -> &A {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut A {
        &mut self.audio
    }

    pub fn sync(&self) -> &SyncController<V> {
        &self.sync
    }

    pub fn video_mut(&mut self) -> Option<&mut V> {
        self.sync.video_mut()
    }

    pub fn video_enabled(&self) -> bool {
        self.sync.video_enabled()
    }

    pub fn scheduler(&self) -> &Scheduler<Wakeup> {
        &self.scheduler
    }

    pub fn graph_mut(&mut self) -> &mut RenderGraph {
        &mut self.graph
    }

    /// Adds a player and returns the index overlays use to refer to it.
    pub fn add_player(&mut self, player: Player) -> usize {
        self.players.push(player);
        self.players.len() - 1
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player_mut(&mut self, index: usize) -> Option<&mut Player> {
        self.players.get_mut(index)
    }

    pub fn scores(&mut self) -> Vec<u32> {
        self.players.iter_mut().map(Player::score).collect()
    }

    pub fn set_title_overlay(&mut self, overlay: Box<dyn TitleOverlay>) {
        self.title_overlay = Some(overlay);
    }

    pub fn set_density_probe(&mut self, probe: Box<dyn DensityProbe>) {
        self.density_probe = probe;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn title_state(&self) -> Option<TitleState> {
        self.title.as_ref().map(TitleCard::state)
    }

    /// Installs new overlay rectangles and redraws once, as after a resize.
    pub fn set_layout(&mut self, layout: Layout) {
        self.layout = layout;
        self.graph.apply_layout(&self.layout);
        self.redraw();
    }

    /// Sessions without video media are ready straight away; otherwise the
    /// host reports [`media_ready`](Self::media_ready) once the video can play
    /// through.
    pub fn prepare_video(&mut self) {
        let has_media = self.sync.video().is_some_and(MediaClock::has_media);
        if !has_media {
            self.mark_ready();
        }
    }

    pub fn media_ready(&mut self) {
        self.mark_ready();
    }

    fn mark_ready(&mut self) {
        if self.ready.signal() {
            self.notifier.emit(DiagnosticEvent::Ready);
        }
    }

    /// Shows the title card. It holds for the configured time and then fades
    /// out one step per frame.
    pub fn show_title(&mut self) {
        self.cancel_title();
        self.sync.rewind_video();
        if let Some(overlay) = self.title_overlay.as_mut() {
            overlay.render(1.0);
        }
        self.title = Some(TitleCard::new(&self.config.title));
        self.title_timer = Some(
            self.scheduler
                .schedule_after(self.config.title.hold(), Wakeup::TitleHold),
        );
    }

    /// Aborts a title card in progress. Returns whether one was running.
    pub fn cancel_title(&mut self) -> bool {
        if let Some(timer) = self.title_timer.take() {
            self.scheduler.cancel(timer);
        }
        let cancelled = self.title.as_mut().is_some_and(TitleCard::cancel);
        if cancelled {
            self.notifier.emit(DiagnosticEvent::TitleCancelled);
        }
        cancelled
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.notifier.emit(DiagnosticEvent::PlaybackStarted);

        for (index, player) in self.players.iter_mut().enumerate() {
            if let Err(err) = player.start() {
                tracing::warn!(player = index, %err, "failed to start note source");
            }
        }

        self.sync.start(&mut self.scheduler, Wakeup::VideoStart);

        if self.density.is_none() {
            self.density = Some(self.density_probe.device_pixel_ratio());
        }
        self.density_timer = Some(self.scheduler.schedule_every(
            self.config.sync.density_poll_interval(),
            Wakeup::DensityPoll,
        ));

        self.scheduler.request_frame(Wakeup::Frame);
    }

    /// Stops playback and cancels every outstanding timer. Idempotent.
    pub fn stop(&mut self) {
        if let Some(timer) = self.density_timer.take() {
            self.scheduler.cancel(timer);
        }
        self.sync.stop(&mut self.scheduler);
        self.cancel_title();

        if !self.running {
            return;
        }
        self.running = false;
        for (index, player) in self.players.iter_mut().enumerate() {
            if let Err(err) = player.stop() {
                tracing::warn!(player = index, %err, "failed to stop note source");
            }
        }
        self.notifier.emit(DiagnosticEvent::PlaybackStopped);
    }

    /// Runs everything that came due by host time `now`.
    pub fn advance(&mut self, now: std::time::Duration) {
        for wakeup in self.scheduler.advance_to(now) {
            match wakeup {
                Wakeup::Frame => {
                    self.render_frame(false);
                }
                Wakeup::VideoStart => self.sync.start_deferred_video(),
                Wakeup::DensityPoll => self.poll_density(),
                Wakeup::TitleHold => self.begin_title_fade(),
                Wakeup::TitleFade => self.step_title(),
            }
        }
    }

    /// One render pass without scheduling a follow-up frame.
    pub fn redraw(&mut self) -> bool {
        self.render_frame(true)
    }

    fn render_frame(&mut self, manual: bool) -> bool {
        // A frame requested before stop() may still be delivered.
        if !self.running {
            return false;
        }

        let audio_seconds = self.audio.current_time();
        self.sync.tick(audio_seconds);

        let time_ms = (audio_seconds * 1000.0).round() as i64;
        for player in &mut self.players {
            player.refresh();
        }
        self.graph.render_pass(time_ms, &mut self.players);
        self.frames_rendered += 1;

        if !manual {
            self.scheduler.request_frame(Wakeup::Frame);
        }
        true
    }

    fn poll_density(&mut self) {
        let current = self.density_probe.device_pixel_ratio();
        if self.density == Some(current) {
            return;
        }
        let previous = self.density.replace(current);
        self.notifier
            .emit(DiagnosticEvent::DensityChanged { previous, current });
        self.graph.apply_layout(&self.layout);
        self.redraw();
    }

    fn begin_title_fade(&mut self) {
        self.title_timer = None;
        if self.title.as_mut().is_some_and(TitleCard::begin_fade) {
            self.scheduler.request_frame(Wakeup::TitleFade);
        }
    }

    fn step_title(&mut self) {
        let Some(frame) = self.title.as_mut().and_then(TitleCard::step) else {
            return;
        };
        match frame {
            TitleFrame::Render { opacity } => {
                if let Some(overlay) = self.title_overlay.as_mut() {
                    overlay.render(opacity);
                }
                self.scheduler.request_frame(Wakeup::TitleFade);
            }
            TitleFrame::Clear => {
                if let Some(overlay) = self.title_overlay.as_mut() {
                    overlay.clear();
                }
                self.notifier.emit(DiagnosticEvent::TitleFinished);
            }
        }
    }
}

impl<A: std::fmt::Debug, V: std::fmt::Debug> std::fmt::Debug for GameSession<A, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("song", &self.song.title)
            .field("audio", &self.audio)
            .field("sync", &self.sync)
            .field("players", &self.players.len())
            .field("graph", &self.graph)
            .field("running", &self.running)
            .field("frames_rendered", &self.frames_rendered)
            .finish()
    }
}
