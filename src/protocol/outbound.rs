//! Sender side of the protocol: what the companion app puts on the wire.
//!
//! The receiver never calls this on the device path. Demo mode and the tests use it to
//! produce byte streams shaped exactly like the app's uploads.

use serde_json::json;

use super::{packed_len, IMAGE_START_CMD};
use crate::{Error, Result};

/// Bytes per write used by the app for image data.
pub const CHUNK_SIZE: usize = 180;
/// Luminance below this becomes a dark (1) pixel.
const DARK_THRESHOLD: f32 = 128.0;
/// Stretch contrast only when the range is wider than this.
const MIN_STRETCH_RANGE: f32 = 50.0;

/// A text control message, newline-terminated.
pub fn text_message(text: &str, color: u32) -> String {
    let line = json!({ "text": text, "color": format!("#{color:06X}") });
    format!("{line}\n")
}

/// An `image_start` control line, newline-terminated.
pub fn image_start_line(width: u32, height: u32, byte_len: usize, caption: &str) -> String {
    let line = json!({
        "cmd": IMAGE_START_CMD,
        "w": width,
        "h": height,
        "len": byte_len,
        "prompt": caption.trim(),
    });
    format!("{line}\n")
}

/// A complete upload: the start line followed by fixed-size data chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub width: u32,
    pub height: u32,
    pub caption: String,
    pub packed: Vec<u8>,
}

impl ImageUpload {
    pub fn new(width: u32, height: u32, caption: &str, packed: Vec<u8>) -> Self {
        Self {
            width,
            height,
            caption: caption.to_string(),
            packed,
        }
    }

    /// Every write the app would make, in order.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames_with_chunk_size(CHUNK_SIZE)
    }

    pub fn frames_with_chunk_size(&self, chunk_size: usize) -> Vec<Vec<u8>> {
        let header = image_start_line(self.width, self.height, self.packed.len(), &self.caption);
        std::iter::once(header.into_bytes())
            .chain(self.packed.chunks(chunk_size.max(1)).map(<[u8]>::to_vec))
            .collect()
    }
}

/// Pack an 8-bit grayscale raster into the 1bpp wire format.
///
/// Contrast is stretched to the full range when the image is not already flat, then
/// Floyd–Steinberg dithering decides each pixel. Bits are MSB-first, 1 = dark.
pub fn pack_grayscale(gray: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 || gray.len() != w * h {
        return Err(Error::InvalidArgs(format!(
            "grayscale buffer of {} bytes does not match {width}x{height}",
            gray.len()
        )));
    }

    let mut levels: Vec<f32> = gray.iter().map(|&g| f32::from(g)).collect();
    stretch_contrast(&mut levels);

    let mut packed = vec![0u8; packed_len(width, height)];
    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            let old = levels[idx];
            let new = if old < DARK_THRESHOLD { 0.0 } else { 255.0 };
            if new == 0.0 {
                packed[idx / 8] |= 1 << (7 - (idx % 8));
            }

            let error = old - new;
            if x + 1 < w {
                levels[idx + 1] += error * 7.0 / 16.0;
            }
            if y + 1 < h {
                if x > 0 {
                    levels[idx + w - 1] += error * 3.0 / 16.0;
                }
                levels[idx + w] += error * 5.0 / 16.0;
                if x + 1 < w {
                    levels[idx + w + 1] += error / 16.0;
                }
            }
        }
    }
    Ok(packed)
}

fn stretch_contrast(levels: &mut [f32]) {
    let (min, max) = levels
        .iter()
        .fold((255.0f32, 0.0f32), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if max - min <= MIN_STRETCH_RANGE {
        return;
    }
    let factor = 255.0 / (max - min);
    for level in levels.iter_mut() {
        *level = ((*level - min) * factor).clamp(0.0, 255.0);
    }
}
