use crate::TitleConfig;

/// Progress of the title card shown before a song.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TitleState {
    /// Fully opaque, waiting for the hold timer.
    Showing,
    Fading { opacity: f32 },
    Cleared,
    /// Stopped before it finished; nothing more is drawn.
    Cancelled,
}

/// What the title overlay should do for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TitleFrame {
    Render { opacity: f32 },
    Clear,
}

#[derive(Debug, Clone)]
pub struct TitleCard {
    state: TitleState,
    fade_step: f32,
    fade_frames: u32,
}

impl TitleCard {
    pub fn new(config: &TitleConfig) -> Self {
        Self {
            state: TitleState::Showing,
            fade_step: config.fade_step.clamp(f32::EPSILON, 1.0),
            fade_frames: 0,
        }
    }

    pub fn state(&self) -> TitleState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, TitleState::Cleared | TitleState::Cancelled)
    }

    /// Hold elapsed: switch to fading. Only valid from `Showing`.
    pub fn begin_fade(&mut self) -> bool {
        if self.state != TitleState::Showing {
            return false;
        }
        self.state = TitleState::Fading { opacity: 1.0 };
        true
    }

    /// Advances the fade by one frame. Returns `None` once the card is done.
    pub fn step(&mut self) -> Option<TitleFrame> {
        let TitleState::Fading { .. } = self.state else {
            return None;
        };

        self.fade_frames += 1;
        let opacity = 1.0 - self.fade_frames as f32 * self.fade_step;
        if opacity <= 1e-4 {
            self.state = TitleState::Cleared;
            Some(TitleFrame::Clear)
        } else {
            self.state = TitleState::Fading { opacity };
            Some(TitleFrame::Render { opacity })
        }
    }

    /// Returns whether the card was still in progress.
    pub fn cancel(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        self.state = TitleState::Cancelled;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fades_out_in_a_fixed_number_of_frames() {
        let mut card = TitleCard::new(&TitleConfig::default());
        assert_eq!(card.step(), None);
        assert!(card.begin_fade());
        assert!(!card.begin_fade());

        let mut renders = 0;
        loop {
            match card.step() {
                Some(TitleFrame::Render { opacity }) => {
                    assert!(opacity > 0.0 && opacity < 1.0);
                    renders += 1;
                }
                Some(TitleFrame::Clear) => break,
                None => panic!("fade ended without clearing"),
            }
        }
        assert_eq!(renders, 19);
        assert_eq!(card.state(), TitleState::Cleared);
        assert_eq!(card.step(), None);
    }

    #[test]
    fn cancel_stops_the_fade() {
        let mut card = TitleCard::new(&TitleConfig::default());
        card.begin_fade();
        card.step();
        assert!(card.cancel());
        assert!(!card.cancel());
        assert_eq!(card.state(), TitleState::Cancelled);
        assert_eq!(card.step(), None);
    }
}
