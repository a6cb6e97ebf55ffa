use embedded_graphics::{
    pixelcolor::BinaryColor,
    prelude::{DrawTarget, OriginDimensions, Pixel, Point, Size},
};

use crate::{Error, Result};

/// Row-major 1bpp bitmap. `true` is foreground (black on the panel).
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    stride: usize,
    bits: Vec<u8>,
}

/// Decoded source image, read-only once built.
pub type PixelGrid = Bitmap;
/// Exactly the pixels pushed to the panel for one frame.
pub type ScreenBuffer = Bitmap;

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("on", &self.count_on())
            .finish()
    }
}

impl Bitmap {
    /// A background-filled bitmap.
    pub fn new(width: u32, height: u32) -> Self {
        let stride = (width as usize).div_ceil(8);
        Self {
            width,
            height,
            stride,
            bits: vec![0; stride * height as usize],
        }
    }

    /// Unpack a whole MSB-first buffer. Pixels past the end of `packed` stay background.
    pub fn unpack(packed: &[u8], width: u32, height: u32) -> Self {
        let mut grid = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let index = y as usize * width as usize + x as usize;
                if packed_bit(packed, index) {
                    grid.put(x, y, true);
                }
            }
        }
        grid
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Option<bool> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let (byte, mask) = self.locate(x, y);
        Some(self.bits[byte] & mask != 0)
    }

    pub fn set(&mut self, x: u32, y: u32, on: bool) -> Result<()> {
        if x >= self.width || y >= self.height {
            return Err(Error::Render(format!(
                "pixel ({x}, {y}) outside {}x{} bitmap",
                self.width, self.height
            )));
        }
        self.put(x, y, on);
        Ok(())
    }

    pub fn fill(&mut self, on: bool) {
        self.bits.fill(if on { 0xFF } else { 0x00 });
    }

    /// Copy `src` with its top-left at (`x`, `y`), clipping at the edges.
    pub fn blit(&mut self, src: &Bitmap, x: u32, y: u32) {
        for sy in 0..src.height {
            let dy = y + sy;
            if dy >= self.height {
                break;
            }
            for sx in 0..src.width {
                let dx = x + sx;
                if dx >= self.width {
                    break;
                }
                let (byte, mask) = src.locate(sx, sy);
                self.put(dx, dy, src.bits[byte] & mask != 0);
            }
        }
    }

    /// One-pixel rectangle outline, clipped to the bitmap.
    pub fn outline(&mut self, x: u32, y: u32, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let right = x + width - 1;
        let bottom = y + height - 1;
        for px in x..=right {
            self.put_clipped(px, y);
            self.put_clipped(px, bottom);
        }
        for py in y..=bottom {
            self.put_clipped(x, py);
            self.put_clipped(right, py);
        }
    }

    pub fn count_on(&self) -> usize {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .filter(|&(x, y)| self.get(x, y) == Some(true))
            .count()
    }

    /// Text rendering for logs and the preview command: `#` foreground, `.` background.
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity((self.width as usize + 1) * self.height as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                out.push(if self.get(x, y) == Some(true) { '#' } else { '.' });
            }
            out.push('\n');
        }
        out
    }

    fn locate(&self, x: u32, y: u32) -> (usize, u8) {
        let byte = y as usize * self.stride + x as usize / 8;
        (byte, 0x80 >> (x % 8))
    }

    fn put(&mut self, x: u32, y: u32, on: bool) {
        let (byte, mask) = self.locate(x, y);
        if on {
            self.bits[byte] |= mask;
        } else {
            self.bits[byte] &= !mask;
        }
    }

    fn put_clipped(&mut self, x: u32, y: u32) {
        if x < self.width && y < self.height {
            self.put(x, y, true);
        }
    }
}

/// Bit `index` of an MSB-first packed buffer; missing bytes read as background.
pub fn packed_bit(packed: &[u8], index: usize) -> bool {
    packed
        .get(index / 8)
        .is_some_and(|byte| byte & (0x80 >> (index % 8)) != 0)
}

impl OriginDimensions for Bitmap {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Strict target: a pixel outside the bitmap is an error, not silently clipped.
impl DrawTarget for Bitmap {
    type Color = BinaryColor;
    type Error = Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<()>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(Point { x, y }, color) in pixels {
            if x < 0 || y < 0 {
                return Err(Error::Render(format!("glyph pixel ({x}, {y}) off canvas")));
            }
            self.set(x as u32, y as u32, color.is_on())?;
        }
        Ok(())
    }
}
