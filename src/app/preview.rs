//! `inklink preview`: run one packed bitmap through the compositor and print the frame.

use std::fs;
use std::time::Duration;

use crate::{
    cli::PreviewOptions,
    config::Config,
    display::{compose, MemoryPanel, RefreshSequencer},
    protocol::packed_len,
    Error, Result,
};

/// Compose the bitmap file onto a panel-sized frame and return it as ASCII art.
pub fn render_preview(opts: &PreviewOptions, config: &Config) -> Result<String> {
    let packed = fs::read(&opts.bitmap)?;
    let expected = packed_len(opts.image_width, opts.image_height);
    if packed.is_empty() {
        return Err(Error::InvalidArgs(format!("{} is empty", opts.bitmap)));
    }
    let packed = &packed[..packed.len().min(expected)];

    let width = u32::from(opts.width.unwrap_or(config.display_width));
    let height = u32::from(opts.height.unwrap_or(config.display_height));
    let composition = compose(
        packed,
        opts.image_width,
        opts.image_height,
        &opts.caption,
        width,
        height,
    )?;

    let panel = MemoryPanel::new(width, height, Duration::ZERO);
    let mut sequencer = RefreshSequencer::new(panel, Duration::ZERO);
    sequencer.render(&composition.screen)?;
    Ok(sequencer.panel().preview())
}
