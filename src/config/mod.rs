use crate::{Error, Result};
use std::path::Path;
use std::time::Duration;

pub mod loader;

pub const DEFAULT_DEVICE: &str = "/dev/ttyUSB0";
pub const DEFAULT_BAUD: u32 = 9_600;
pub const DEFAULT_SERIAL_TIMEOUT_MS: u64 = 50;
pub const DEFAULT_LINK_DETECT: LinkDetect = LinkDetect::Open;
pub const DEFAULT_DISPLAY_WIDTH: u16 = 250;
pub const DEFAULT_DISPLAY_HEIGHT: u16 = 122;
pub const DEFAULT_RATED_REFRESH: Duration = Duration::from_secs(3);
pub const DEFAULT_SETTLE_MARGIN: Duration = Duration::from_secs(5);
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(25);
pub const DEFAULT_CONNECT_WAIT: Duration = Duration::from_secs(60);
pub const DEFAULT_ADVERTISE_COOLDOWN: Duration = Duration::from_millis(500);
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 64 * 1024;

pub const MIN_TRANSFER_TIMEOUT: Duration = Duration::from_secs(20);
pub const MAX_TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);
const MIN_DISPLAY_DIM: u16 = 16;
const MAX_DISPLAY_DIM: u16 = 2048;

const CONFIG_DIR_NAME: &str = ".inklink";
const CONFIG_FILE_NAME: &str = "config.toml";

/// How the serial transport decides that a peer is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkDetect {
    /// An open port counts as a live link.
    #[default]
    Open,
    /// Bridge state pin wired to carrier detect.
    Dcd,
    /// Bridge state pin wired to clear-to-send.
    Cts,
}

impl std::str::FromStr for LinkDetect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(LinkDetect::Open),
            "dcd" => Ok(LinkDetect::Dcd),
            "cts" => Ok(LinkDetect::Cts),
            _ => Err("expected one of: open, dcd, cts".to_string()),
        }
    }
}

impl std::fmt::Display for LinkDetect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LinkDetect::Open => "open",
            LinkDetect::Dcd => "dcd",
            LinkDetect::Cts => "cts",
        };
        f.write_str(name)
    }
}

/// User-supplied settings loaded from the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
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
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            baud: DEFAULT_BAUD,
            serial_timeout_ms: DEFAULT_SERIAL_TIMEOUT_MS,
            link_detect: DEFAULT_LINK_DETECT,
            display_width: DEFAULT_DISPLAY_WIDTH,
            display_height: DEFAULT_DISPLAY_HEIGHT,
            rated_refresh: DEFAULT_RATED_REFRESH,
            settle_margin: DEFAULT_SETTLE_MARGIN,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
            connect_wait: DEFAULT_CONNECT_WAIT,
            advertise_cooldown: DEFAULT_ADVERTISE_COOLDOWN,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl Config {
    pub fn load_or_default() -> Result<Self> {
        loader::load_or_default()
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        loader::load_from_path(path)
    }

    pub fn save(&self) -> Result<()> {
        loader::save(self)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        loader::save_to_path(self, path)
    }
}

pub(crate) fn validate(cfg: &Config) -> Result<()> {
    if cfg.device.trim().is_empty() {
        return Err(Error::InvalidArgs("device must not be empty".into()));
    }
    if cfg.baud == 0 {
        return Err(Error::InvalidArgs("baud must be > 0".into()));
    }
    validate_dimension("display_width", cfg.display_width)?;
    validate_dimension("display_height", cfg.display_height)?;
    if cfg.transfer_timeout < MIN_TRANSFER_TIMEOUT || cfg.transfer_timeout > MAX_TRANSFER_TIMEOUT
    {
        return Err(Error::InvalidArgs(format!(
            "transfer_timeout must be between {} and {}",
            humantime::format_duration(MIN_TRANSFER_TIMEOUT),
            humantime::format_duration(MAX_TRANSFER_TIMEOUT)
        )));
    }
    if cfg.connect_wait.is_zero() {
        return Err(Error::InvalidArgs("connect_wait must be > 0".into()));
    }
    if !(1..=1_000).contains(&cfg.poll_interval_ms) {
        return Err(Error::InvalidArgs(
            "poll_interval_ms must be between 1 and 1000".into(),
        ));
    }
    if cfg.max_image_bytes == 0 {
        return Err(Error::InvalidArgs("max_image_bytes must be > 0".into()));
    }
    Ok(())
}

fn validate_dimension(name: &str, value: u16) -> Result<()> {
    if !(MIN_DISPLAY_DIM..=MAX_DISPLAY_DIM).contains(&value) {
        return Err(Error::InvalidArgs(format!(
            "{name} must be between {MIN_DISPLAY_DIM} and {MAX_DISPLAY_DIM}"
        )));
    }
    Ok(())
}

pub(crate) fn parse_duration(raw: &str) -> std::result::Result<Duration, String> {
    humantime::parse_duration(raw).map_err(|e| e.to_string())
}

pub(crate) fn format_duration(value: Duration) -> String {
    humantime::format_duration(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_default_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_from_path(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn parses_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let contents = r#"
            device = "/dev/rfcomm0"
            baud = 115200
            link_detect = "dcd"
            display_width = 296
            display_height = 128
            rated_refresh = "2s"
            settle_margin = "5s"
            transfer_timeout = "20s"
            connect_wait = "1m"
            advertise_cooldown = "250ms"
            poll_interval_ms = 20
            max_image_bytes = 4096
        "#;
        fs::write(&path, contents).unwrap();
        let cfg = Config::load_from_path(&path).unwrap();
        assert_eq!(cfg.device, "/dev/rfcomm0");
        assert_eq!(cfg.baud, 115_200);
        assert_eq!(cfg.link_detect, LinkDetect::Dcd);
        assert_eq!(cfg.display_width, 296);
        assert_eq!(cfg.display_height, 128);
        assert_eq!(cfg.rated_refresh, Duration::from_secs(2));
        assert_eq!(cfg.transfer_timeout, Duration::from_secs(20));
        assert_eq!(cfg.connect_wait, Duration::from_secs(60));
        assert_eq!(cfg.advertise_cooldown, Duration::from_millis(250));
        assert_eq!(cfg.poll_interval_ms, 20);
        assert_eq!(cfg.max_image_bytes, 4096);
    }

    #[test]
    fn rejects_unknown_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "nope = 1").unwrap();
        let err = Config::load_from_path(&path).unwrap_err();
        assert!(format!("{err}").contains("unknown config key"));
    }

    #[test]
    fn rejects_transfer_timeout_out_of_range() {
        let cfg = Config {
            transfer_timeout: Duration::from_secs(5),
            ..Config::default()
        };
        let err = validate(&cfg).unwrap_err();
        assert!(format!("{err}").contains("transfer_timeout"));
    }

    #[test]
    fn link_detect_parses_case_insensitively() {
        assert_eq!("CTS".parse::<LinkDetect>().unwrap(), LinkDetect::Cts);
        assert!("rts".parse::<LinkDetect>().is_err());
    }

    #[test]
    fn saves_and_loads_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            device: "/dev/ttyS1".into(),
            baud: 57_600,
            link_detect: LinkDetect::Cts,
            settle_margin: Duration::from_millis(1_500),
            ..Config::default()
        };
        cfg.save_to_path(&path).unwrap();
        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(cfg, loaded);
    }
}
