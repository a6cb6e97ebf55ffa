//! The control loop: advertise, serve one connection, tear down, repeat.
//!
//! A [`Session`] owns every piece of transient state (link edge detector, image
//! transfer, panel sequencer). Nothing in here is fatal; decode, protocol, timeout and
//! render failures end up as label text, and link failures end the connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use super::lifecycle::render_shutdown;
use super::{AppConfig, Logger};
use crate::{
    display::{
        compose,
        label::{CYAN, GREEN, RED},
        Composition, PanelDriver, RefreshSequencer, RenderReport, TextLabel,
    },
    protocol::{classify, Classified, ControlMessage, ImageStart, ACK},
    transfer::{CompletedImage, Reassembler},
    transport::{classify_error, read_available, LinkEvent, LinkWatch, Transport},
    Result,
};

pub const STATUS_WAITING: &str = "Waiting for BLE...";
pub const STATUS_CONNECTED: &str = "Connected";
pub const STATUS_RECEIVING: &str = "Receiving image...";
pub const STATUS_IMAGE_SHOWN: &str = "Image shown";
pub const STATUS_TIMEOUT: &str = "Image timeout";
pub const STATUS_BAD_HEADER: &str = "Bad image header";
pub const STATUS_IMAGE_ERROR: &str = "Image error";

/// Timing and limits for the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub transfer_timeout: Duration,
    /// Advertising is restarted when nobody connects within this window.
    pub connect_wait: Duration,
    /// Pause between a disconnect and the next advertisement.
    pub advertise_cooldown: Duration,
    pub poll_interval: Duration,
    pub settle_margin: Duration,
    pub max_image_bytes: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SessionSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            transfer_timeout: config.transfer_timeout,
            connect_wait: config.connect_wait,
            advertise_cooldown: config.advertise_cooldown,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            settle_margin: config.settle_margin,
            max_image_bytes: config.max_image_bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Advertising,
    Connected,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    /// `None` on startup: advertise without waiting for the cooldown.
    Idle { since: Option<Instant> },
    Advertising { since: Instant },
    Connected { since: Instant },
}

/// Running totals, reported by demo mode and asserted by tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub connections: u32,
    pub texts_shown: u32,
    pub images_rendered: u32,
    pub transfers_cancelled: u32,
    pub timeouts: u32,
    pub rejected_headers: u32,
    pub render_failures: u32,
    pub ignored_commands: u32,
}

pub struct Session<'a, T: Transport, P: PanelDriver, L: TextLabel> {
    transport: T,
    sequencer: RefreshSequencer<P>,
    label: L,
    logger: &'a Logger,
    settings: SessionSettings,
    phase: Phase,
    link: LinkWatch,
    reassembler: Reassembler,
    stats: SessionStats,
}

impl<'a, T: Transport, P: PanelDriver, L: TextLabel> Session<'a, T, P, L> {
    pub fn new(
        transport: T,
        panel: P,
        label: L,
        settings: SessionSettings,
        logger: &'a Logger,
    ) -> Self {
        Self {
            transport,
            sequencer: RefreshSequencer::new(panel, settings.settle_margin),
            label,
            logger,
            settings,
            phase: Phase::Idle { since: None },
            link: LinkWatch::new(),
            reassembler: Reassembler::new(settings.transfer_timeout),
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Idle { .. } => SessionState::Idle,
            Phase::Advertising { .. } => SessionState::Advertising,
            Phase::Connected { .. } => SessionState::Connected,
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn panel(&self) -> &P {
        self.sequencer.panel()
    }

    pub fn label(&self) -> &L {
        &self.label
    }

    pub fn reassembler(&self) -> &Reassembler {
        &self.reassembler
    }

    /// Loop until `running` is cleared, then cancel any transfer and show `offline`.
    pub fn run(&mut self, running: &AtomicBool) -> Result<()> {
        while running.load(Ordering::SeqCst) {
            self.step();
            thread::sleep(self.settings.poll_interval);
        }
        self.shutdown()
    }

    pub fn step(&mut self) {
        self.step_at(Instant::now());
    }

    /// One loop iteration as if the clock read `now`.
    pub fn step_at(&mut self, now: Instant) {
        match self.phase {
            Phase::Idle { since } => {
                let cooled = since.map_or(true, |t| {
                    now.saturating_duration_since(t) >= self.settings.advertise_cooldown
                });
                if cooled {
                    self.begin_advertising(now);
                }
            }
            Phase::Advertising { since } => {
                if self.link.poll(&mut self.transport) == Some(LinkEvent::Connected) {
                    self.on_connected(now);
                } else if now.saturating_duration_since(since) >= self.settings.connect_wait {
                    self.logger.info(format!(
                        "no connection within {}; restarting advertisement",
                        humantime::format_duration(self.settings.connect_wait)
                    ));
                    self.begin_advertising(now);
                }
            }
            Phase::Connected { .. } => self.serve(now),
        }
    }

    pub fn shutdown(&mut self) -> Result<()> {
        if let Some(discarded) = self.reassembler.cancel() {
            self.logger
                .info(format!("shutdown: dropped in-flight image ({discarded} bytes)"));
        }
        if let Err(e) = self.transport.stop_advertising() {
            self.logger.warn(format!("shutdown: stop advertising failed: {e}"));
        }
        render_shutdown(&mut self.label)
    }

    fn begin_advertising(&mut self, now: Instant) {
        if self.transport.is_advertising() {
            if let Err(e) = self.transport.stop_advertising() {
                self.logger.warn(format!("stop advertising failed: {e}"));
            }
        }
        match self.transport.start_advertising() {
            Ok(()) => {
                self.logger.info("advertising");
                self.phase = Phase::Advertising { since: now };
                self.set_status(STATUS_WAITING, CYAN);
            }
            Err(e) => {
                self.logger.warn(format!(
                    "start advertising failed ({}): {e}",
                    classify_error(&e)
                ));
                self.phase = Phase::Idle { since: Some(now) };
            }
        }
    }

    fn on_connected(&mut self, now: Instant) {
        self.stats.connections += 1;
        self.logger.info("central connected");
        if let Err(e) = self.transport.stop_advertising() {
            self.logger.debug(format!("stop advertising after connect: {e}"));
        }
        self.reassembler.cancel();
        self.phase = Phase::Connected { since: now };
        self.set_status(STATUS_CONNECTED, GREEN);
    }

    fn on_disconnected(&mut self, reason: &str, now: Instant) {
        if let Some(discarded) = self.reassembler.cancel() {
            self.stats.transfers_cancelled += 1;
            self.logger.warn(format!("link lost mid-transfer; discarded {discarded} bytes"));
        }
        let uptime = match self.phase {
            Phase::Connected { since } => now.saturating_duration_since(since),
            _ => Duration::ZERO,
        };
        self.logger.info(format!(
            "disconnected ({reason}) after {}",
            humantime::format_duration(Duration::from_secs(uptime.as_secs()))
        ));
        self.link.observe(false);
        self.phase = Phase::Idle { since: Some(now) };
    }

    fn serve(&mut self, now: Instant) {
        if self.link.poll(&mut self.transport) == Some(LinkEvent::Disconnected) {
            self.on_disconnected("central went away", now);
            return;
        }

        // Expire before reading so a late fragment cannot revive a stale transfer.
        if let Err(e) = self.reassembler.check_timeout(now) {
            self.stats.timeouts += 1;
            self.logger.warn(format!("image transfer aborted: {e}"));
            self.set_status(STATUS_TIMEOUT, RED);
        }

        match read_available(&mut self.transport) {
            Ok(chunk) if chunk.is_empty() => {}
            Ok(chunk) => self.handle_chunk(&chunk, now),
            Err(e) => {
                let reason = format!("read failed: {}", classify_error(&e));
                self.logger.warn(format!("{reason}: {e}"));
                self.on_disconnected(&reason, now);
            }
        }
    }

    fn handle_chunk(&mut self, chunk: &[u8], now: Instant) {
        self.logger.trace(format!("read {} bytes", chunk.len()));
        match classify(chunk, self.reassembler.is_active()) {
            Classified::Fragment(bytes) => self.on_fragment(bytes, now),
            Classified::Interrupt(message) => {
                if let Some(discarded) = self.reassembler.cancel() {
                    self.stats.transfers_cancelled += 1;
                    self.logger.warn(format!(
                        "transfer interrupted by a new command; discarded {discarded} bytes"
                    ));
                }
                self.on_control(message, now);
            }
            Classified::Control(message) => self.on_control(message, now),
        }
    }

    fn on_control(&mut self, message: ControlMessage, now: Instant) {
        match message {
            ControlMessage::TextDisplay { text, color } => self.show_text(&text, color),
            ControlMessage::ImageStart(start) => self.start_image(&start, now),
            ControlMessage::Unknown => {
                self.stats.ignored_commands += 1;
                self.logger.info("ignoring unknown command");
            }
        }
    }

    fn show_text(&mut self, text: &str, color: u32) {
        if text.is_empty() {
            self.logger.debug("empty text message ignored");
            return;
        }
        if let Err(e) = self.label.show(text, color) {
            self.logger.warn(format!("label update failed: {e}"));
            return;
        }
        self.stats.texts_shown += 1;
        self.logger.info(format!("text shown (#{color:06X}): {text}"));
        if let Err(e) = self.transport.write_all(ACK) {
            self.logger.warn(format!(
                "ack write failed ({}): {e}",
                classify_error(&e)
            ));
        }
    }

    fn start_image(&mut self, start: &ImageStart, now: Instant) {
        let header = match start.validate(self.settings.max_image_bytes) {
            Ok(header) => header,
            Err(e) => {
                self.stats.rejected_headers += 1;
                self.logger.warn(format!("rejected image_start: {e}"));
                self.set_status(STATUS_BAD_HEADER, RED);
                return;
            }
        };
        if header.byte_len < header.packed_len() {
            self.logger.warn(format!(
                "image_start len {} is short of {} bytes for {}x{}; missing pixels stay blank",
                header.byte_len,
                header.packed_len(),
                header.width,
                header.height
            ));
        }
        self.logger.info(format!(
            "image transfer started: {}x{}, {} bytes, caption {:?}",
            header.width, header.height, header.byte_len, header.caption
        ));
        if let Some(discarded) = self.reassembler.begin(header, now) {
            self.stats.transfers_cancelled += 1;
            self.logger
                .warn(format!("previous transfer superseded; discarded {discarded} bytes"));
        }
        self.set_status(STATUS_RECEIVING, CYAN);
    }

    fn on_fragment(&mut self, bytes: &[u8], now: Instant) {
        let outcome = match self.reassembler.append(bytes, now) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.logger.warn(format!("fragment dropped: {e}"));
                return;
            }
        };
        if outcome.overflow > 0 {
            self.logger.debug(format!(
                "dropped {} bytes past the declared length",
                outcome.overflow
            ));
        }
        if let Some(percent) = outcome.progress {
            self.logger.info(format!(
                "image {percent}% ({}/{} bytes)",
                outcome.received, outcome.expected
            ));
            if !outcome.complete {
                self.set_status(&format!("Receiving {percent}%"), CYAN);
            }
        }
        if outcome.complete {
            self.complete_image(now);
        }
    }

    fn complete_image(&mut self, now: Instant) {
        let image = match self.reassembler.finish(now) {
            Ok(image) => image,
            Err(e) => {
                self.logger.error(format!("completed transfer could not be taken: {e}"));
                self.set_status(STATUS_IMAGE_ERROR, RED);
                return;
            }
        };
        self.logger.info(format!(
            "image received: {} bytes in {}",
            image.data.len(),
            humantime::format_duration(Duration::from_millis(image.elapsed.as_millis() as u64))
        ));
        match self.render_image(&image) {
            Ok((composition, report)) => {
                self.stats.images_rendered += 1;
                self.logger.info(format!(
                    "image rendered: crop {}x{}+{}+{}, {} caption lines{}, {} dark pixels, {}",
                    composition.crop.width,
                    composition.crop.height,
                    composition.crop.x,
                    composition.crop.y,
                    composition.caption_lines.len(),
                    if composition.caption_fallback {
                        " (border fallback)"
                    } else {
                        ""
                    },
                    report.pixels_on,
                    humantime::format_duration(Duration::from_millis(
                        report.elapsed.as_millis() as u64
                    ))
                ));
                self.logger
                    .trace(format!("frame:\n{}", composition.screen.to_ascii()));
                self.set_status(STATUS_IMAGE_SHOWN, GREEN);
            }
            Err(e) => {
                self.stats.render_failures += 1;
                self.logger.error(format!("image render failed: {e}"));
                self.set_status(STATUS_IMAGE_ERROR, RED);
            }
        }
    }

    fn render_image(&mut self, image: &CompletedImage) -> Result<(Composition, RenderReport)> {
        let header = &image.header;
        let panel = self.sequencer.panel();
        let composition = compose(
            &image.data,
            header.width,
            header.height,
            &header.caption,
            panel.width(),
            panel.height(),
        )?;
        let report = self.sequencer.render(&composition.screen)?;
        Ok((composition, report))
    }

    fn set_status(&mut self, text: &str, color: u32) {
        self.logger.debug(format!("status: {text}"));
        if let Err(e) = self.label.show(text, color) {
            self.logger.warn(format!("label update failed: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{MemoryPanel, StatusLabel};
    use crate::protocol::outbound::{image_start_line, text_message};
    use crate::transport::{FakeTransport, ScriptStep};

    fn settings() -> SessionSettings {
        SessionSettings {
            transfer_timeout: Duration::from_secs(25),
            connect_wait: Duration::from_secs(60),
            advertise_cooldown: Duration::from_millis(500),
            poll_interval: Duration::from_millis(1),
            settle_margin: Duration::ZERO,
            max_image_bytes: 4096,
        }
    }

    fn session(
        script: Vec<ScriptStep>,
        logger: &Logger,
    ) -> Session<'_, FakeTransport, MemoryPanel, StatusLabel> {
        Session::new(
            FakeTransport::new(script),
            MemoryPanel::new(250, 122, Duration::ZERO),
            StatusLabel::new(),
            settings(),
            logger,
        )
    }

    #[test]
    fn startup_advertises_immediately() {
        let logger = Logger::quiet();
        let mut s = session(vec![], &logger);
        assert_eq!(s.state(), SessionState::Idle);
        s.step_at(Instant::now());
        assert_eq!(s.state(), SessionState::Advertising);
        assert_eq!(s.label().text(), STATUS_WAITING);
        assert_eq!(s.label().color(), CYAN);
    }

    #[test]
    fn advertising_restarts_after_connect_wait() {
        let logger = Logger::quiet();
        let mut s = session(vec![], &logger);
        let t0 = Instant::now();
        s.step_at(t0);
        s.step_at(t0 + Duration::from_secs(59));
        assert_eq!(s.transport().advertise_starts(), 1);
        s.step_at(t0 + Duration::from_secs(60));
        assert_eq!(s.transport().advertise_starts(), 2);
        assert_eq!(s.transport().advertise_stops(), 1);
        assert_eq!(s.state(), SessionState::Advertising);
    }

    #[test]
    fn cooldown_delays_readvertising() {
        let logger = Logger::quiet();
        let mut s = session(vec![ScriptStep::Connect, ScriptStep::Disconnect], &logger);
        let t0 = Instant::now();
        s.step_at(t0);
        s.step_at(t0);
        assert_eq!(s.state(), SessionState::Connected);
        s.step_at(t0 + Duration::from_secs(1));
        assert_eq!(s.state(), SessionState::Idle);
        s.step_at(t0 + Duration::from_millis(1200));
        assert_eq!(s.state(), SessionState::Idle);
        s.step_at(t0 + Duration::from_millis(1500));
        assert_eq!(s.state(), SessionState::Advertising);
        assert_eq!(s.stats().connections, 1);
    }

    #[test]
    fn unknown_and_empty_messages_leave_label_alone() {
        let logger = Logger::quiet();
        let mut s = session(
            vec![
                ScriptStep::Connect,
                ScriptStep::Chunk(br#"{"cmd":"reboot"}"#.to_vec()),
                ScriptStep::Chunk(br#"{"text":""}"#.to_vec()),
            ],
            &logger,
        );
        let t0 = Instant::now();
        for _ in 0..4 {
            s.step_at(t0);
        }
        assert_eq!(s.label().text(), STATUS_CONNECTED);
        assert_eq!(s.stats().ignored_commands, 1);
        assert!(s.transport().writes().is_empty());
    }

    #[test]
    fn bad_header_is_reported_and_no_transfer_starts() {
        let logger = Logger::quiet();
        let mut s = session(
            vec![
                ScriptStep::Connect,
                ScriptStep::Chunk(image_start_line(0, 2, 1, "x").into_bytes()),
            ],
            &logger,
        );
        let t0 = Instant::now();
        for _ in 0..3 {
            s.step_at(t0);
        }
        assert_eq!(s.label().text(), STATUS_BAD_HEADER);
        assert_eq!(s.label().color(), RED);
        assert!(!s.reassembler().is_active());
        assert_eq!(s.stats().rejected_headers, 1);
    }

    #[test]
    fn oversized_header_is_rejected() {
        let logger = Logger::quiet();
        let mut s = session(
            vec![
                ScriptStep::Connect,
                ScriptStep::Chunk(image_start_line(400, 400, 20_000, "x").into_bytes()),
            ],
            &logger,
        );
        let t0 = Instant::now();
        for _ in 0..3 {
            s.step_at(t0);
        }
        assert_eq!(s.label().text(), STATUS_BAD_HEADER);
    }

    #[test]
    fn inactivity_timeout_aborts_transfer() {
        let logger = Logger::quiet();
        let mut s = session(
            vec![
                ScriptStep::Connect,
                ScriptStep::Chunk(image_start_line(16, 16, 32, "slow").into_bytes()),
                ScriptStep::Chunk(vec![0xAA; 8]),
            ],
            &logger,
        );
        let t0 = Instant::now();
        for _ in 0..4 {
            s.step_at(t0);
        }
        assert_eq!(s.reassembler().received(), 8);
        s.step_at(t0 + Duration::from_secs(25));
        assert!(s.reassembler().is_active());
        s.step_at(t0 + Duration::from_secs(26));
        assert!(!s.reassembler().is_active());
        assert_eq!(s.label().text(), STATUS_TIMEOUT);
        assert_eq!(s.stats().timeouts, 1);
        assert_eq!(s.state(), SessionState::Connected);
    }

    #[test]
    fn late_fragment_does_not_revive_expired_transfer() {
        let logger = Logger::quiet();
        let mut s = session(
            vec![
                ScriptStep::Connect,
                ScriptStep::Chunk(image_start_line(16, 16, 32, "late").into_bytes()),
                ScriptStep::Chunk(vec![0xAA; 8]),
                ScriptStep::Chunk(b"tail".to_vec()),
            ],
            &logger,
        );
        let t0 = Instant::now();
        for _ in 0..4 {
            s.step_at(t0);
        }
        assert_eq!(s.reassembler().received(), 8);

        // The queued chunk is read in the same iteration the window expires.
        s.step_at(t0 + Duration::from_secs(40));
        assert_eq!(s.stats().timeouts, 1);
        assert!(!s.reassembler().is_active());
        assert_eq!(s.reassembler().received(), 0);
        // With no transfer left, the chunk is ordinary text.
        assert_eq!(s.label().text(), "tail");
        assert_eq!(s.stats().images_rendered, 0);
    }

    #[test]
    fn read_error_ends_connection() {
        let logger = Logger::quiet();
        let mut s = session(
            vec![
                ScriptStep::Connect,
                ScriptStep::ReadError(std::io::ErrorKind::BrokenPipe),
            ],
            &logger,
        );
        let t0 = Instant::now();
        s.step_at(t0);
        s.step_at(t0);
        assert_eq!(s.state(), SessionState::Connected);
        s.step_at(t0);
        assert_eq!(s.state(), SessionState::Idle);
    }

    #[test]
    fn shutdown_shows_offline() {
        let logger = Logger::quiet();
        let mut s = session(vec![], &logger);
        s.step_at(Instant::now());
        let running = AtomicBool::new(false);
        s.run(&running).unwrap();
        assert_eq!(s.label().text(), "offline");
        assert!(!s.transport().is_advertising());
    }

    #[test]
    fn text_message_is_acknowledged() {
        let logger = Logger::quiet();
        let mut s = session(
            vec![
                ScriptStep::Connect,
                ScriptStep::Chunk(text_message("hi there", 0x112233).into_bytes()),
            ],
            &logger,
        );
        let t0 = Instant::now();
        for _ in 0..3 {
            s.step_at(t0);
        }
        assert_eq!(s.label().text(), "hi there");
        assert_eq!(s.label().color(), 0x112233);
        assert_eq!(s.transport().writes(), &[ACK.to_vec()]);
    }
}
