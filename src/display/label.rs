use crate::Result;

/// Longest text the on-board status label shows.
pub const MAX_LABEL_CHARS: usize = 40;

pub const CYAN: u32 = 0x00FF_FF;
pub const GREEN: u32 = 0x00FF_00;
pub const RED: u32 = 0xFF_0000;

/// Single-line status widget next to the panel.
pub trait TextLabel {
    fn set_text(&mut self, text: &str) -> Result<()>;
    fn set_color(&mut self, color: u32) -> Result<()>;

    /// Colour first so the text never flashes in the previous colour.
    fn show(&mut self, text: &str, color: u32) -> Result<()> {
        self.set_color(color)?;
        self.set_text(text)
    }
}

/// In-process label holding the last text and colour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLabel {
    text: String,
    color: u32,
    updates: u32,
}

impl StatusLabel {
    pub fn new() -> Self {
        Self {
            text: String::new(),
            color: CYAN,
            updates: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn color(&self) -> u32 {
        self.color
    }

    /// Number of `set_text` calls so far.
    pub fn updates(&self) -> u32 {
        self.updates
    }
}

impl Default for StatusLabel {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLabel for StatusLabel {
    fn set_text(&mut self, text: &str) -> Result<()> {
        self.text = text.chars().take(MAX_LABEL_CHARS).collect();
        self.updates += 1;
        Ok(())
    }

    fn set_color(&mut self, color: u32) -> Result<()> {
        self.color = color & 0xFF_FFFF;
        Ok(())
    }
}
