//! Builds the full-screen frame for a received image: cropped bitmap in one region,
//! word-wrapped caption in the other.

use embedded_graphics::{
    mono_font::{ascii::FONT_6X10, MonoFont, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};

use super::bitmap::{packed_bit, Bitmap, PixelGrid, ScreenBuffer};
use super::wrap::{wrap_words, TextBudget};
use crate::{Error, Result};

/// Blank border around and between the two regions.
pub const MARGIN: u32 = 4;
/// Largest image square the layout will allot.
pub const MAX_IMAGE_SIDE: u32 = 122;

const CAPTION_FONT: &MonoFont<'static> = &FONT_6X10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Image left, caption right.
    Horizontal,
    /// Image top, caption bottom.
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub orientation: Orientation,
    /// Square image region; `width == height`.
    pub image: Rect,
    pub text: Rect,
}

impl Layout {
    pub fn for_display(width: u32, height: u32) -> Result<Self> {
        let layout = if width >= height {
            let side = (height.saturating_sub(2 * MARGIN))
                .min((width / 2).saturating_sub(2 * MARGIN))
                .min(MAX_IMAGE_SIDE);
            let text_x = MARGIN + side + MARGIN;
            Layout {
                orientation: Orientation::Horizontal,
                image: Rect {
                    x: MARGIN,
                    y: MARGIN + (height.saturating_sub(2 * MARGIN) - side) / 2,
                    width: side,
                    height: side,
                },
                text: Rect {
                    x: text_x,
                    y: MARGIN,
                    width: width.saturating_sub(text_x + MARGIN),
                    height: height.saturating_sub(2 * MARGIN),
                },
            }
        } else {
            let side = (width.saturating_sub(2 * MARGIN))
                .min((height / 2).saturating_sub(2 * MARGIN))
                .min(MAX_IMAGE_SIDE);
            let text_y = MARGIN + side + MARGIN;
            Layout {
                orientation: Orientation::Vertical,
                image: Rect {
                    x: (width - side) / 2,
                    y: MARGIN,
                    width: side,
                    height: side,
                },
                text: Rect {
                    x: MARGIN,
                    y: text_y,
                    width: width.saturating_sub(2 * MARGIN),
                    height: height.saturating_sub(text_y + MARGIN),
                },
            }
        };
        if layout.image.width == 0 {
            return Err(Error::Render(format!(
                "display {width}x{height} too small for an image region"
            )));
        }
        Ok(layout)
    }
}

/// Source window kept by the center crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropWindow {
    /// Center a `side`-square window over the source; axes smaller than `side` are kept whole.
    pub fn centered(src_width: u32, src_height: u32, side: u32) -> Self {
        Self {
            x: src_width.saturating_sub(side) / 2,
            y: src_height.saturating_sub(side) / 2,
            width: src_width.min(side),
            height: src_height.min(side),
        }
    }
}

/// Unpack only the pixels inside the crop window, straight into their destination
/// coordinates. Bits past the end of `packed` are background.
pub fn unpack_cropped(packed: &[u8], src_width: u32, src_height: u32, side: u32) -> PixelGrid {
    let window = CropWindow::centered(src_width, src_height, side);
    let mut grid = Bitmap::new(window.width, window.height);
    for dy in 0..window.height {
        let row_start = (window.y + dy) as usize * src_width as usize;
        for dx in 0..window.width {
            if packed_bit(packed, row_start + (window.x + dx) as usize) {
                // In bounds by construction of `grid`.
                let _ = grid.set(dx, dy, true);
            }
        }
    }
    grid
}

/// A composed frame plus the geometry that produced it.
#[derive(Debug, Clone)]
pub struct Composition {
    pub screen: ScreenBuffer,
    pub layout: Layout,
    pub crop: CropWindow,
    pub caption_lines: Vec<String>,
    /// Set when glyph rendering failed and the text region got a border instead.
    pub caption_fallback: bool,
}

/// Compose a packed source image and its caption into a display-sized frame.
pub fn compose(
    packed: &[u8],
    src_width: u32,
    src_height: u32,
    caption: &str,
    display_width: u32,
    display_height: u32,
) -> Result<Composition> {
    if src_width == 0 || src_height == 0 {
        return Err(Error::Render(format!(
            "source image {src_width}x{src_height} has no pixels"
        )));
    }
    let layout = Layout::for_display(display_width, display_height)?;
    let side = layout.image.width;
    let crop = CropWindow::centered(src_width, src_height, side);
    let image = unpack_cropped(packed, src_width, src_height, side);

    let mut screen = Bitmap::new(display_width, display_height);
    screen.blit(
        &image,
        layout.image.x + (side - image.width()) / 2,
        layout.image.y + (side - image.height()) / 2,
    );

    let text = layout.text;
    let budget = TextBudget::for_region(
        text.width,
        text.height,
        CAPTION_FONT.character_size.width,
        CAPTION_FONT.character_size.height,
    );
    let caption_lines = wrap_words(caption, budget);
    let caption_fallback =
        !caption_lines.is_empty() && place_caption(&mut screen, text, render_lines(&caption_lines));

    Ok(Composition {
        screen,
        layout,
        crop,
        caption_lines,
        caption_fallback,
    })
}

/// Center rendered caption glyphs in `region`, or outline the region when rendering
/// failed. Returns `true` when the outline was drawn.
pub fn place_caption(screen: &mut ScreenBuffer, region: Rect, glyphs: Result<Bitmap>) -> bool {
    match glyphs {
        Ok(glyphs) => {
            screen.blit(
                &glyphs,
                region.x + region.width.saturating_sub(glyphs.width()) / 2,
                region.y + region.height.saturating_sub(glyphs.height()) / 2,
            );
            false
        }
        Err(_) => {
            screen.outline(region.x, region.y, region.width, region.height);
            true
        }
    }
}

/// Render lines into a bitmap sized exactly to the text block, each line centered.
pub fn render_lines(lines: &[String]) -> Result<Bitmap> {
    let cell = CAPTION_FONT.character_size;
    let columns = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as u32;
    let mut glyphs = Bitmap::new(columns * cell.width, lines.len() as u32 * cell.height);
    let style = MonoTextStyle::new(CAPTION_FONT, BinaryColor::On);

    for (row, line) in lines.iter().enumerate() {
        let pad = (columns - line.chars().count() as u32) * cell.width / 2;
        let origin = Point::new(pad as i32, (row as u32 * cell.height) as i32);
        Text::with_baseline(line, origin, style, Baseline::Top).draw(&mut glyphs)?;
    }
    Ok(glyphs)
}
