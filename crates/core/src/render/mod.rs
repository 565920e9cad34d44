use serde::{Deserialize, Serialize};

use crate::{NoteStreamSource, Player};

/// Screen rectangle handed to an overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }
}

/// Scrolling lyrics of one vocal part.
pub trait LyricOverlay {
    fn set_rect(&mut self, rect: Rect);
    fn render(&mut self, time_ms: i64);
}

/// Expected and sung notes of one player.
pub trait NoteOverlay {
    fn set_rect(&mut self, rect: Rect);
    fn render(&mut self, time_ms: i64, sung: &dyn NoteStreamSource);
}

/// Running score of one player. Not time dependent.
pub trait ScoreOverlay {
    fn set_rect(&mut self, rect: Rect);
    fn render(&mut self, score: u32);
}

/// Song title card, drawn before playback.
pub trait TitleOverlay {
    fn render(&mut self, opacity: f32);
    fn clear(&mut self);
}

/// Rectangles for every overlay, indexed like the overlays themselves.
/// Overlays without an entry keep their previous rectangle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub lyrics: Vec<Rect>,
    pub notes: Vec<Rect>,
    pub scores: Vec<Rect>,
}

/// Overlays of a session in draw order: lyrics, then notes, then scores.
/// Note and score overlays are bound to a player by index.
#[derive(Default)]
pub struct RenderGraph {
    lyrics: Vec<Box<dyn LyricOverlay>>,
    notes: Vec<(usize, Box<dyn NoteOverlay>)>,
    scores: Vec<(usize, Box<dyn ScoreOverlay>)>,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_lyrics(&mut self, overlay: Box<dyn LyricOverlay>) {
        self.lyrics.push(overlay);
    }

    pub fn add_notes(&mut self, player: usize, overlay: Box<dyn NoteOverlay>) {
        self.notes.push((player, overlay));
    }

    pub fn add_score(&mut self, player: usize, overlay: Box<dyn ScoreOverlay>) {
        self.scores.push((player, overlay));
    }

    pub fn is_empty(&self) -> bool {
        self.lyrics.is_empty() && self.notes.is_empty() && self.scores.is_empty()
    }

    pub fn apply_layout(&mut self, layout: &Layout) {
        for (overlay, rect) in self.lyrics.iter_mut().zip(&layout.lyrics) {
            overlay.set_rect(*rect);
        }
        for ((_, overlay), rect) in self.notes.iter_mut().zip(&layout.notes) {
            overlay.set_rect(*rect);
        }
        for ((_, overlay), rect) in self.scores.iter_mut().zip(&layout.scores) {
            overlay.set_rect(*rect);
        }
    }

    /// Draws one frame at `time_ms`. Overlays bound to a missing player are
    /// skipped.
    pub fn render_pass(&mut self, time_ms: i64, players: &mut [Player]) {
        for overlay in &mut self.lyrics {
            overlay.render(time_ms);
        }
        for (player, overlay) in &mut self.notes {
            if let Some(player) = players.get(*player) {
                overlay.render(time_ms, player.source());
            }
        }
        for (player, overlay) in &mut self.scores {
            if let Some(player) = players.get_mut(*player) {
                overlay.render(player.score());
            }
        }
    }
}

impl std::fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderGraph")
            .field("lyrics", &self.lyrics.len())
            .field("notes", &self.notes.len())
            .field("scores", &self.scores.len())
            .finish()
    }
}

/// Overlays that record what they were asked to draw.
#[cfg(test)]
pub(crate) mod recording {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Draw {
        Rect(&'static str, Rect),
        Lyrics(i64),
        Notes(i64, usize),
        Score(u32),
        Title(f32),
        TitleCleared,
    }

    #[derive(Debug, Clone, Default)]
    pub(crate) struct DrawLog(Arc<Mutex<Vec<Draw>>>);

    impl DrawLog {
        pub(crate) fn push(&self, draw: Draw) {
            self.0.lock().unwrap().push(draw);
        }

        pub(crate) fn take(&self) -> Vec<Draw> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }

        pub(crate) fn lyrics(&self) -> Box<dyn LyricOverlay> {
            Box::new(Recorder(self.clone()))
        }

        pub(crate) fn notes(&self) -> Box<dyn NoteOverlay> {
            Box::new(Recorder(self.clone()))
        }

        pub(crate) fn score(&self) -> Box<dyn ScoreOverlay> {
            Box::new(Recorder(self.clone()))
        }

        pub(crate) fn title(&self) -> Box<dyn TitleOverlay> {
            Box::new(Recorder(self.clone()))
        }
    }

    struct Recorder(DrawLog);

    impl LyricOverlay for Recorder {
        fn set_rect(&mut self, rect: Rect) {
            self.0.push(Draw::Rect("lyrics", rect));
        }

        fn render(&mut self, time_ms: i64) {
            self.0.push(Draw::Lyrics(time_ms));
        }
    }

    impl NoteOverlay for Recorder {
        fn set_rect(&mut self, rect: Rect) {
            self.0.push(Draw::Rect("notes", rect));
        }

        fn render(&mut self, time_ms: i64, sung: &dyn NoteStreamSource) {
            self.0.push(Draw::Notes(time_ms, sung.notes().len()));
        }
    }

    impl ScoreOverlay for Recorder {
        fn set_rect(&mut self, rect: Rect) {
            self.0.push(Draw::Rect("score", rect));
        }

        fn render(&mut self, score: u32) {
            self.0.push(Draw::Score(score));
        }
    }

    impl TitleOverlay for Recorder {
        fn render(&mut self, opacity: f32) {
            self.0.push(Draw::Title(opacity));
        }

        fn clear(&mut self) {
            self.0.push(Draw::TitleCleared);
        }
    }
}
