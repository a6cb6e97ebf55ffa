use std::time::{Duration, Instant};

use super::bitmap::Bitmap;
use crate::{Error, Result};

/// Primitives exposed by an e-paper panel driver.
pub trait PanelDriver {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// (Re)configure the bus and panel. Also resets the driver's refresh-interval guard.
    fn init(&mut self) -> Result<()>;
    fn set_pixel(&mut self, x: u32, y: u32, on: bool) -> Result<()>;
    /// Transfer the staged pixels into panel frame memory.
    fn push_buffer(&mut self) -> Result<()>;
    /// Start the physical refresh from frame memory.
    fn refresh(&mut self) -> Result<()>;
    fn rated_refresh_time(&self) -> Duration;
}

/// In-process panel with the same timing rules as the hardware.
///
/// Refreshing again before `rated_refresh_time` has passed faults, unless `init` ran in
/// between.
#[derive(Debug)]
pub struct MemoryPanel {
    staging: Bitmap,
    frame: Bitmap,
    shown: Option<Bitmap>,
    rated_refresh: Duration,
    last_refresh: Option<Instant>,
    initialized: bool,
    inits: u32,
    refreshes: u32,
}

impl MemoryPanel {
    pub fn new(width: u32, height: u32, rated_refresh: Duration) -> Self {
        Self {
            staging: Bitmap::new(width, height),
            frame: Bitmap::new(width, height),
            shown: None,
            rated_refresh,
            last_refresh: None,
            initialized: false,
            inits: 0,
            refreshes: 0,
        }
    }

    /// The frame most recently made visible by `refresh`.
    pub fn shown(&self) -> Option<&Bitmap> {
        self.shown.as_ref()
    }

    pub fn init_count(&self) -> u32 {
        self.inits
    }

    pub fn refresh_count(&self) -> u32 {
        self.refreshes
    }

    /// ASCII art of the visible frame, empty before the first refresh.
    pub fn preview(&self) -> String {
        self.shown.as_ref().map(Bitmap::to_ascii).unwrap_or_default()
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::Render("panel used before init".into()))
        }
    }
}

impl PanelDriver for MemoryPanel {
    fn width(&self) -> u32 {
        self.staging.width()
    }

    fn height(&self) -> u32 {
        self.staging.height()
    }

    fn init(&mut self) -> Result<()> {
        self.initialized = true;
        self.last_refresh = None;
        self.inits += 1;
        Ok(())
    }

    fn set_pixel(&mut self, x: u32, y: u32, on: bool) -> Result<()> {
        self.ensure_initialized()?;
        self.staging.set(x, y, on)
    }

    fn push_buffer(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        self.frame = self.staging.clone();
        Ok(())
    }

    fn refresh(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        let now = Instant::now();
        if let Some(last) = self.last_refresh {
            let since = now.saturating_duration_since(last);
            if since < self.rated_refresh {
                return Err(Error::Render(format!(
                    "panel refreshed {} after the previous refresh (minimum {})",
                    humantime::format_duration(Duration::from_millis(since.as_millis() as u64)),
                    humantime::format_duration(self.rated_refresh)
                )));
            }
        }
        self.shown = Some(self.frame.clone());
        self.last_refresh = Some(now);
        self.refreshes += 1;
        Ok(())
    }

    fn rated_refresh_time(&self) -> Duration {
        self.rated_refresh
    }
}
