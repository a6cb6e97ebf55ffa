use super::{AppConfig, Logger, Session, SessionSettings, SessionState};
use crate::{
    display::{MemoryPanel, StatusLabel},
    protocol::outbound::{image_start_line, pack_grayscale, text_message, ImageUpload},
    transport::{FakeTransport, ScriptStep},
    Result,
};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

const DEMO_SIDE: u32 = 122;
const DEMO_RATED_REFRESH: Duration = Duration::from_millis(200);
const DEMO_SETTLE_MARGIN: Duration = Duration::from_millis(100);
const DEMO_POLL: Duration = Duration::from_millis(10);

/// Replay a scripted phone session through the real session controller.
pub fn run_demo(config: &AppConfig, logger: &Logger, running: &AtomicBool) -> Result<()> {
    let script = build_script()?;
    logger.info(format!("demo: replaying {} scripted link events", script.len()));

    let settings = SessionSettings {
        settle_margin: DEMO_SETTLE_MARGIN,
        poll_interval: DEMO_POLL,
        ..SessionSettings::from(config)
    };
    let panel = MemoryPanel::new(
        u32::from(config.display_width),
        u32::from(config.display_height),
        DEMO_RATED_REFRESH,
    );
    let mut session = Session::new(
        FakeTransport::new(script),
        panel,
        StatusLabel::new(),
        settings,
        logger,
    );

    while running.load(Ordering::SeqCst) {
        session.step();
        if session.transport().is_exhausted() && session.state() != SessionState::Connected {
            break;
        }
        thread::sleep(DEMO_POLL);
    }
    session.shutdown()?;

    let stats = session.stats();
    logger.info(format!(
        "demo finished: {} texts, {} images, {} transfers cancelled, {} acks",
        stats.texts_shown,
        stats.images_rendered,
        stats.transfers_cancelled,
        session.transport().writes().len()
    ));
    let frame = session.panel().preview();
    if !frame.is_empty() {
        println!("{frame}");
    }
    Ok(())
}

/// Text message, an upload superseded halfway, a full upload, then link loss.
fn build_script() -> Result<Vec<ScriptStep>> {
    let pattern = test_pattern(DEMO_SIDE);
    let packed = pack_grayscale(&pattern, DEMO_SIDE, DEMO_SIDE)?;
    let caption = "demo pattern from the scripted link";
    let upload = ImageUpload::new(DEMO_SIDE, DEMO_SIDE, caption, packed);

    let mut script = vec![
        ScriptStep::Connect,
        ScriptStep::Chunk(text_message("hello from demo mode", 0xFF8800).into_bytes()),
        ScriptStep::Idle(5),
        ScriptStep::Chunk(
            image_start_line(DEMO_SIDE, DEMO_SIDE, upload.packed.len(), "never shown").into_bytes(),
        ),
        ScriptStep::Chunk(upload.packed[..upload.packed.len() / 2].to_vec()),
    ];
    script.extend(upload.frames().into_iter().map(ScriptStep::Chunk));
    script.push(ScriptStep::Idle(5));
    script.push(ScriptStep::Disconnect);
    Ok(script)
}

/// Concentric rings on a diagonal gradient, 8-bit grayscale.
fn test_pattern(side: u32) -> Vec<u8> {
    let centre = side as f32 / 2.0;
    (0..side)
        .flat_map(|y| (0..side).map(move |x| (x, y)))
        .map(|(x, y)| {
            let (dx, dy) = (x as f32 - centre, y as f32 - centre);
            let ring = ((dx * dx + dy * dy).sqrt() / 8.0) as u32 % 2 == 0;
            let gradient = ((x + y) * 255 / (2 * side)) as u8;
            if ring {
                gradient / 2
            } else {
                255 - gradient / 2
            }
        })
        .collect()
}
