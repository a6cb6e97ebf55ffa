//! Everything between a completed image buffer and pixels on the panel.

pub mod bitmap;
pub mod compositor;
pub mod label;
pub mod panel;
pub mod sequencer;
pub mod wrap;

pub use bitmap::{Bitmap, PixelGrid, ScreenBuffer};
pub use compositor::{compose, place_caption, Composition, CropWindow, Layout, Orientation, Rect};
pub use label::{StatusLabel, TextLabel, MAX_LABEL_CHARS};
pub use panel::{MemoryPanel, PanelDriver};
pub use sequencer::{RefreshSequencer, RenderReport, SequencerState};
pub use wrap::{wrap_words, TextBudget};
