use serde_json::{Map, Value};

use super::{ControlMessage, ImageStart, DEFAULT_COLOR, IMAGE_START_CMD};
use crate::{Error, Result};

/// How one raw chunk from the link should be handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified<'a> {
    /// No transfer was active; the chunk is a control message.
    Control(ControlMessage),
    /// A transfer was active but the chunk is a new command; the transfer must be
    /// cancelled before the message is handled.
    Interrupt(ControlMessage),
    /// Image bytes for the active transfer, unmodified.
    Fragment(&'a [u8]),
}

/// Classify a chunk given whether an image transfer is currently active.
pub fn classify(chunk: &[u8], transfer_active: bool) -> Classified<'_> {
    if transfer_active {
        if looks_like_command(chunk) {
            return Classified::Interrupt(parse_control(&decode_lossy(chunk)));
        }
        return Classified::Fragment(chunk);
    }
    Classified::Control(parse_control(&decode_lossy(chunk)))
}

/// A chunk that starts with `{` and mentions `cmd` is treated as a command even while
/// image bytes are expected.
pub fn looks_like_command(chunk: &[u8]) -> bool {
    chunk.first() == Some(&b'{') && chunk.windows(3).any(|w| w == b"cmd")
}

/// Decode UTF-8, dropping invalid sequences instead of substituting U+FFFD.
///
/// Intentionally lossy: the app only sends UTF-8, so anything else is line noise.
pub fn decode_lossy(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

/// Parse a decoded string into a control message, falling back to literal text.
pub fn parse_control(raw: &str) -> ControlMessage {
    let trimmed = raw.trim();
    match parse_structured(trimmed) {
        Ok(message) => message,
        Err(_) => ControlMessage::TextDisplay {
            text: trimmed.to_string(),
            color: DEFAULT_COLOR,
        },
    }
}

fn parse_structured(trimmed: &str) -> Result<ControlMessage> {
    let value: Value =
        serde_json::from_str(trimmed).map_err(|e| Error::Parse(format!("json: {e}")))?;
    let Value::Object(fields) = value else {
        return Err(Error::Parse("control message is not an object".into()));
    };

    match fields.get("cmd").and_then(Value::as_str) {
        Some(IMAGE_START_CMD) => Ok(ControlMessage::ImageStart(image_start(&fields))),
        Some(_) if !fields.contains_key("text") => Ok(ControlMessage::Unknown),
        _ => Ok(ControlMessage::TextDisplay {
            text: text_field(fields.get("text")),
            color: parse_color(fields.get("color").and_then(Value::as_str)),
        }),
    }
}

fn image_start(fields: &Map<String, Value>) -> ImageStart {
    let int = |key: &str| fields.get(key).and_then(Value::as_i64).unwrap_or(0);
    ImageStart {
        width: int("w"),
        height: int("h"),
        byte_len: int("len"),
        caption: fields
            .get("prompt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

fn text_field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Parse `#RRGGBB` (case-insensitive, `#` optional) into `0xRRGGBB`.
pub fn parse_color(raw: Option<&str>) -> u32 {
    let Some(raw) = raw else {
        return DEFAULT_COLOR;
    };
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return DEFAULT_COLOR;
    }
    u32::from_str_radix(hex, 16).unwrap_or(DEFAULT_COLOR)
}
