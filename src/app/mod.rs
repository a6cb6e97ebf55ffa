use crate::{
    cli::RunOptions,
    config::{Config, LinkDetect},
    display::{MemoryPanel, StatusLabel},
    transport::{serial::SerialOptions, SerialTransport},
    Result,
};
use std::{str::FromStr, time::Duration};

mod demo;
mod lifecycle;
mod logger;
pub mod preview;
pub mod session;

use demo::run_demo;
use lifecycle::create_shutdown_flag;
pub use logger::{LogLevel, Logger};
pub use session::{Session, SessionSettings, SessionState, SessionStats};

/// Config for the daemon: the config file with CLI overrides applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub device: String,
    pub baud: u32,
    pub serial_timeout_ms: u64,
    pub link_detect: LinkDetect,
    pub display_width: u16,
    pub display_height: u16,
    pub rated_refresh: Duration,
    pub settle_margin: Duration,
    pub transfer_timeout: Duration,
    pub connect_wait: Duration,
    pub advertise_cooldown: Duration,
    pub poll_interval_ms: u64,
    pub max_image_bytes: usize,
    pub log_level: LogLevel,
    pub log_file: Option<String>,
    pub demo: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_config(Config::default(), LogLevel::default(), None, false)
    }
}

pub struct App {
    config: AppConfig,
    logger: Logger,
}

impl App {
    pub fn new(config: AppConfig) -> Result<Self> {
        let logger = Logger::new(config.log_level, config.log_file.clone())?;
        Ok(Self { config, logger })
    }

    pub fn from_options(opts: RunOptions) -> Result<Self> {
        let cfg_file = Config::load_or_default()?;
        let merged = AppConfig::from_sources(cfg_file, opts)?;
        Self::new(merged)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Entry point for the daemon. Wire up the link, panel and label here.
    pub fn run(&self) -> Result<()> {
        let config = &self.config;
        self.logger.info(format!(
            "daemon start (device={}, baud={}, link={}, panel={}x{})",
            config.device,
            config.baud,
            config.link_detect,
            config.display_width,
            config.display_height
        ));

        let running = create_shutdown_flag()?;
        if config.demo {
            self.logger.info("demo mode enabled: scripted link, no device opened");
            return run_demo(config, &self.logger, &running);
        }

        let transport = SerialTransport::new(&config.device, config.serial_options())?;
        let panel = MemoryPanel::new(
            u32::from(config.display_width),
            u32::from(config.display_height),
            config.rated_refresh,
        );
        let mut session = Session::new(
            transport,
            panel,
            StatusLabel::new(),
            SessionSettings::from(config),
            &self.logger,
        );
        session.run(&running)?;

        let stats = session.stats();
        self.logger.info(format!(
            "daemon stopped ({} connections, {} texts, {} images)",
            stats.connections, stats.texts_shown, stats.images_rendered
        ));
        Ok(())
    }
}

impl AppConfig {
    /// Apply CLI overrides on top of the file config and validate the result.
    pub fn from_sources(mut config: Config, opts: RunOptions) -> Result<Self> {
        if let Some(device) = opts.device {
            config.device = device;
        }
        if let Some(baud) = opts.baud {
            config.baud = baud;
        }
        if let Some(width) = opts.width {
            config.display_width = width;
        }
        if let Some(height) = opts.height {
            config.display_height = height;
        }
        crate::config::validate(&config)?;

        let log_level = opts
            .log_level
            .as_deref()
            .map(LogLevel::from_str)
            .transpose()?
            .unwrap_or_default();
        Ok(Self::from_config(config, log_level, opts.log_file, opts.demo))
    }

    fn from_config(
        config: Config,
        log_level: LogLevel,
        log_file: Option<String>,
        demo: bool,
    ) -> Self {
        Self {
            device: config.device,
            baud: config.baud,
            serial_timeout_ms: config.serial_timeout_ms,
            link_detect: config.link_detect,
            display_width: config.display_width,
            display_height: config.display_height,
            rated_refresh: config.rated_refresh,
            settle_margin: config.settle_margin,
            transfer_timeout: config.transfer_timeout,
            connect_wait: config.connect_wait,
            advertise_cooldown: config.advertise_cooldown,
            poll_interval_ms: config.poll_interval_ms,
            max_image_bytes: config.max_image_bytes,
            log_level,
            log_file,
            demo,
        }
    }

    pub fn serial_options(&self) -> SerialOptions {
        SerialOptions {
            baud: self.baud,
            timeout_ms: self.serial_timeout_ms,
            link_detect: self.link_detect,
        }
    }
}
