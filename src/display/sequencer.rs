use std::thread;
use std::time::{Duration, Instant};

use super::bitmap::ScreenBuffer;
use super::panel::PanelDriver;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Uninitialized,
    Ready,
    Refreshing,
}

/// Timing of one completed render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderReport {
    pub pixels_on: usize,
    /// Total time including the settle wait.
    pub elapsed: Duration,
}

/// Drives a panel through reinit, paint, refresh and the settle wait.
///
/// Every render starts with a forced `init`, so the panel's own interval guard never
/// trips between renders; the blocking settle wait keeps refreshes apart instead.
#[derive(Debug)]
pub struct RefreshSequencer<P: PanelDriver> {
    panel: P,
    state: SequencerState,
    settle_margin: Duration,
}

impl<P: PanelDriver> RefreshSequencer<P> {
    pub fn new(panel: P, settle_margin: Duration) -> Self {
        Self {
            panel,
            state: SequencerState::Uninitialized,
            settle_margin,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn into_panel(self) -> P {
        self.panel
    }

    /// Rated refresh time plus the safety margin.
    pub fn settle_duration(&self) -> Duration {
        self.panel.rated_refresh_time() + self.settle_margin
    }

    pub fn init(&mut self) -> Result<()> {
        match self.panel.init() {
            Ok(()) => {
                self.state = SequencerState::Ready;
                Ok(())
            }
            Err(e) => {
                self.state = SequencerState::Uninitialized;
                Err(e)
            }
        }
    }

    /// Paint `screen` and block until the panel has settled.
    pub fn render(&mut self, screen: &ScreenBuffer) -> Result<RenderReport> {
        let started = Instant::now();
        if (screen.width(), screen.height()) != (self.panel.width(), self.panel.height()) {
            return Err(Error::Render(format!(
                "frame is {}x{} but panel is {}x{}",
                screen.width(),
                screen.height(),
                self.panel.width(),
                self.panel.height()
            )));
        }

        self.init()?;
        let mut pixels_on = 0;
        for y in 0..screen.height() {
            for x in 0..screen.width() {
                let on = screen.get(x, y).unwrap_or(false);
                pixels_on += usize::from(on);
                self.panel.set_pixel(x, y, on)?;
            }
        }
        self.panel.push_buffer()?;

        self.state = SequencerState::Refreshing;
        if let Err(e) = self.panel.refresh() {
            self.state = SequencerState::Ready;
            return Err(e);
        }
        thread::sleep(self.settle_duration());
        self.state = SequencerState::Ready;

        Ok(RenderReport {
            pixels_on,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{Bitmap, MemoryPanel};

    #[test]
    fn render_reinitializes_and_shows_frame() {
        let panel = MemoryPanel::new(4, 2, Duration::ZERO);
        let mut seq = RefreshSequencer::new(panel, Duration::ZERO);
        assert_eq!(seq.state(), SequencerState::Uninitialized);

        let frame = Bitmap::unpack(&[0b1011_0000], 4, 2);
        let report = seq.render(&frame).unwrap();
        assert_eq!(report.pixels_on, 3);
        assert_eq!(seq.state(), SequencerState::Ready);
        seq.render(&frame).unwrap();

        let panel = seq.into_panel();
        assert_eq!(panel.init_count(), 2);
        assert_eq!(panel.refresh_count(), 2);
        assert_eq!(panel.preview(), "#.##\n....\n");
    }

    #[test]
    fn back_to_back_renders_respect_interval() {
        let panel = MemoryPanel::new(2, 2, Duration::from_millis(20));
        let mut seq = RefreshSequencer::new(panel, Duration::from_millis(5));
        assert_eq!(seq.settle_duration(), Duration::from_millis(25));
        let frame = Bitmap::new(2, 2);
        seq.render(&frame).unwrap();
        let report = seq.render(&frame).unwrap();
        assert!(report.elapsed >= Duration::from_millis(25));
    }

    #[test]
    fn size_mismatch_is_render_error() {
        let mut seq = RefreshSequencer::new(MemoryPanel::new(4, 4, Duration::ZERO), Duration::ZERO);
        let err = seq.render(&Bitmap::new(2, 2)).unwrap_err();
        assert!(matches!(err, Error::Render(_)));
        assert_eq!(seq.panel().refresh_count(), 0);
    }
}
