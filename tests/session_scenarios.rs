use inklink::{
    app::{session::STATUS_IMAGE_SHOWN, Logger, Session, SessionSettings, SessionState},
    display::{Layout, MemoryPanel, StatusLabel},
    protocol::{outbound::image_start_line, ACK},
    transport::{FakeTransport, ScriptStep},
};
use std::time::Duration;

const PANEL_W: u32 = 250;
const PANEL_H: u32 = 122;

type TestSession<'a> = Session<'a, FakeTransport, MemoryPanel, StatusLabel>;

fn settings() -> SessionSettings {
    SessionSettings {
        transfer_timeout: Duration::from_secs(25),
        connect_wait: Duration::from_secs(60),
        advertise_cooldown: Duration::ZERO,
        poll_interval: Duration::from_millis(1),
        settle_margin: Duration::ZERO,
        max_image_bytes: 64 * 1024,
    }
}

fn session(script: Vec<ScriptStep>, logger: &Logger) -> TestSession<'_> {
    Session::new(
        FakeTransport::new(script),
        MemoryPanel::new(PANEL_W, PANEL_H, Duration::ZERO),
        StatusLabel::new(),
        settings(),
        logger,
    )
}

/// Step until the script is used up, plus a few idle iterations.
fn drive(s: &mut TestSession<'_>) {
    for _ in 0..10_000 {
        if s.transport().is_exhausted() {
            break;
        }
        s.step();
    }
    for _ in 0..3 {
        s.step();
    }
}

fn chunk(bytes: &[u8]) -> ScriptStep {
    ScriptStep::Chunk(bytes.to_vec())
}

#[test]
fn text_message_shows_in_red_and_acks() {
    let logger = Logger::quiet();
    let mut s = session(
        vec![
            ScriptStep::Connect,
            chunk(br##"{"text":"hello","color":"#ff0000"}"##),
        ],
        &logger,
    );
    drive(&mut s);

    assert_eq!(s.label().text(), "hello");
    assert_eq!(s.label().color(), 0xFF0000);
    assert_eq!(s.transport().writes(), &[ACK.to_vec()]);
    assert_eq!(ACK, b"{\"ok\":true}\n");
    assert_eq!(s.panel().refresh_count(), 0);
}

#[test]
fn plain_text_uses_default_color() {
    let logger = Logger::quiet();
    let mut s = session(vec![ScriptStep::Connect, chunk(b"just words\n")], &logger);
    drive(&mut s);
    assert_eq!(s.label().text(), "just words");
    assert_eq!(s.label().color(), 0x00FFFF);
    assert_eq!(s.transport().writes().len(), 1);
}

#[test]
fn four_by_two_image_renders_top_row() {
    let logger = Logger::quiet();
    let mut s = session(
        vec![
            ScriptStep::Connect,
            chunk(br#"{"cmd":"image_start","w":4,"h":2,"len":1,"prompt":"hi"}"#),
            chunk(&[0b1011_0000]),
        ],
        &logger,
    );
    drive(&mut s);

    assert_eq!(s.stats().images_rendered, 1);
    assert_eq!(s.label().text(), STATUS_IMAGE_SHOWN);
    assert!(s.transport().writes().is_empty());

    let frame = s.panel().shown().expect("frame refreshed");
    let region = Layout::for_display(PANEL_W, PANEL_H).unwrap().image;
    let x0 = region.x + (region.width - 4) / 2;
    let y0 = region.y + (region.height - 2) / 2;
    let row = |y| {
        (0..4)
            .map(|dx| frame.get(x0 + dx, y).unwrap() as u8)
            .collect::<Vec<_>>()
    };
    assert_eq!(row(y0), vec![1, 0, 1, 1]);
    assert_eq!(row(y0 + 1), vec![0, 0, 0, 0]);

    // Nothing else inside the image region.
    let mut region_on = 0;
    for y in region.y..region.y + region.height {
        for x in region.x..region.x + region.width {
            region_on += frame.get(x, y).unwrap() as u32;
        }
    }
    assert_eq!(region_on, 3);
    // The caption landed somewhere.
    assert!(frame.count_on() > 3);
}

#[test]
fn image_arriving_in_odd_chunks_renders_once() {
    let logger = Logger::quiet();
    let packed = vec![0xFFu8; 32];
    let mut script = vec![
        ScriptStep::Connect,
        ScriptStep::Chunk(image_start_line(16, 16, packed.len(), "chunky").into_bytes()),
    ];
    script.extend(packed.chunks(7).map(chunk));
    let mut s = session(script, &logger);
    drive(&mut s);

    assert_eq!(s.stats().images_rendered, 1);
    assert_eq!(s.panel().refresh_count(), 1);
    assert!(!s.reassembler().is_active());
}

#[test]
fn disconnect_mid_transfer_then_clean_restart() {
    let logger = Logger::quiet();
    let mut s = session(
        vec![
            ScriptStep::Connect,
            ScriptStep::Chunk(image_start_line(40, 20, 100, "first").into_bytes()),
            chunk(&[0x55; 40]),
            ScriptStep::Disconnect,
            ScriptStep::Connect,
            ScriptStep::Chunk(image_start_line(40, 20, 100, "second").into_bytes()),
            ScriptStep::Idle(50),
        ],
        &logger,
    );

    let mut saw_forty = false;
    for _ in 0..100 {
        s.step();
        if s.reassembler().percent() == Some(40) {
            saw_forty = true;
            break;
        }
    }
    assert!(saw_forty);
    assert_eq!(s.label().text(), "Receiving 40%");

    for _ in 0..100 {
        s.step();
        if s.state() == SessionState::Connected && s.reassembler().is_active() {
            break;
        }
    }
    assert_eq!(s.reassembler().received(), 0);
    assert_eq!(s.reassembler().header().unwrap().caption, "second");
    assert_eq!(s.stats().transfers_cancelled, 1);
    assert_eq!(s.stats().connections, 2);
    assert_eq!(s.panel().refresh_count(), 0);
}

#[test]
fn interrupting_image_start_discards_old_transfer() {
    let logger = Logger::quiet();
    let mut s = session(
        vec![
            ScriptStep::Connect,
            ScriptStep::Chunk(image_start_line(40, 20, 100, "old").into_bytes()),
            chunk(&[0xFF; 30]),
            chunk(br#"{"cmd":"image_start","w":4,"h":2,"len":1,"prompt":"new"}"#),
            chunk(&[0b1011_0000]),
        ],
        &logger,
    );
    drive(&mut s);

    assert_eq!(s.stats().transfers_cancelled, 1);
    assert_eq!(s.stats().images_rendered, 1);
    assert_eq!(s.panel().refresh_count(), 1);

    let frame = s.panel().shown().unwrap();
    let region = Layout::for_display(PANEL_W, PANEL_H).unwrap().image;
    let mut region_on = 0;
    for y in region.y..region.y + region.height {
        for x in region.x..region.x + region.width {
            region_on += frame.get(x, y).unwrap() as u32;
        }
    }
    assert_eq!(region_on, 3, "only the 4x2 image may be visible");
}

#[test]
fn text_interrupting_transfer_is_shown() {
    let logger = Logger::quiet();
    let mut s = session(
        vec![
            ScriptStep::Connect,
            ScriptStep::Chunk(image_start_line(40, 20, 100, "old").into_bytes()),
            chunk(&[0x00; 10]),
            chunk(br#"{"cmd":"note","text":"stop"}"#),
        ],
        &logger,
    );
    drive(&mut s);

    assert!(!s.reassembler().is_active());
    assert_eq!(s.label().text(), "stop");
    assert_eq!(s.transport().writes().len(), 1);
}

#[test]
fn render_failure_keeps_session_alive() {
    let logger = Logger::quiet();
    let mut s = Session::new(
        FakeTransport::new(vec![
            ScriptStep::Connect,
            chunk(br#"{"cmd":"image_start","w":4,"h":2,"len":1,"prompt":"hi"}"#),
            chunk(&[0xFF]),
            chunk(br#"{"text":"still here"}"#),
        ]),
        // Too small for any image region.
        MemoryPanel::new(8, 8, Duration::ZERO),
        StatusLabel::new(),
        settings(),
        &logger,
    );
    drive(&mut s);

    assert_eq!(s.stats().render_failures, 1);
    assert_eq!(s.state(), SessionState::Connected);
    assert_eq!(s.label().text(), "still here");
}
