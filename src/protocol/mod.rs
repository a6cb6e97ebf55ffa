//! Wire protocol spoken by the companion app over the UART service.
//!
//! Control messages are single UTF-8 JSON objects; image data is raw bytes that follow
//! an `image_start` command with no framing of their own.

mod decoder;
pub mod outbound;

pub use decoder::{
    classify, decode_lossy, looks_like_command, parse_color, parse_control, Classified,
};

use crate::{Error, Result};

/// Written back after a text message has been shown.
pub const ACK: &[u8] = b"{\"ok\":true}\n";
/// `#00FFFF`, used when a message has no colour or a malformed one.
pub const DEFAULT_COLOR: u32 = 0x00FF_FF;
pub const IMAGE_START_CMD: &str = "image_start";

/// A decoded textual command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    TextDisplay { text: String, color: u32 },
    ImageStart(ImageStart),
    Unknown,
}

/// `image_start` fields exactly as received; numeric fields default to 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageStart {
    pub width: i64,
    pub height: i64,
    pub byte_len: i64,
    pub caption: String,
}

/// A validated `image_start` that may begin a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
    pub byte_len: usize,
    pub caption: String,
}

impl ImageHeader {
    /// Packed size needed to cover every pixel.
    pub fn packed_len(&self) -> usize {
        packed_len(self.width, self.height)
    }
}

impl ImageStart {
    /// Reject non-positive dimensions or length, and lengths above `max_bytes`.
    pub fn validate(&self, max_bytes: usize) -> Result<ImageHeader> {
        if self.width <= 0 || self.height <= 0 || self.byte_len <= 0 {
            return Err(Error::Protocol(format!(
                "image_start needs positive w/h/len (got w={}, h={}, len={})",
                self.width, self.height, self.byte_len
            )));
        }
        let width = u32::try_from(self.width)
            .map_err(|_| Error::Protocol(format!("image width {} too large", self.width)))?;
        let height = u32::try_from(self.height)
            .map_err(|_| Error::Protocol(format!("image height {} too large", self.height)))?;
        let byte_len = usize::try_from(self.byte_len)
            .ok()
            .filter(|len| *len <= max_bytes)
            .ok_or_else(|| {
                Error::Protocol(format!(
                    "image len {} exceeds limit of {max_bytes} bytes",
                    self.byte_len
                ))
            })?;
        Ok(ImageHeader {
            width,
            height,
            byte_len,
            caption: self.caption.clone(),
        })
    }
}

/// `ceil(width * height / 8)`.
pub fn packed_len(width: u32, height: u32) -> usize {
    (width as usize * height as usize).div_ceil(8)
}
