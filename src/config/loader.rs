use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{Error, Result};

use super::{Config, CONFIG_DIR_NAME, CONFIG_FILE_NAME};

pub fn load_or_default() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        let cfg = Config::default();
        cfg.save_to_path(&path)?;
        super::validate(&cfg)?;
        return Ok(cfg);
    }
    load_from_path(&path)
}

pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        super::validate(&cfg)?;
        return Ok(cfg);
    }

    let raw = fs::read_to_string(path)?;
    parse(&raw)
}

pub fn save(config: &Config) -> Result<()> {
    let path = config_path()?;
    save_to_path(config, &path)
}

pub fn save_to_path(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let contents = format!(
        "# inklink config\n\
device = \"{}\"\n\
baud = {}\n\
serial_timeout_ms = {}\n\
link_detect = \"{}\"\n\
display_width = {}\n\
display_height = {}\n\
rated_refresh = \"{}\"\n\
settle_margin = \"{}\"\n\
transfer_timeout = \"{}\"\n\
connect_wait = \"{}\"\n\
advertise_cooldown = \"{}\"\n\
poll_interval_ms = {}\n\
max_image_bytes = {}\n",
        config.device,
        config.baud,
        config.serial_timeout_ms,
        config.link_detect,
        config.display_width,
        config.display_height,
        super::format_duration(config.rated_refresh),
        super::format_duration(config.settle_margin),
        super::format_duration(config.transfer_timeout),
        super::format_duration(config.connect_wait),
        super::format_duration(config.advertise_cooldown),
        config.poll_interval_ms,
        config.max_image_bytes,
    );
    fs::write(path, contents)?;
    Ok(())
}

pub fn parse(raw: &str) -> Result<Config> {
    let mut cfg = Config::default();

    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (key, value) = trimmed.split_once('=').ok_or_else(|| {
            Error::InvalidArgs(format!("invalid config line {}: '{}'", idx + 1, line))
        })?;

        let key = key.trim();
        let value = value.trim().trim_matches('"');
        let line_no = idx + 1;
        match key {
            "device" => cfg.device = value.to_string(),
            "baud" => cfg.baud = parse_number(key, value, line_no)?,
            "serial_timeout_ms" => cfg.serial_timeout_ms = parse_number(key, value, line_no)?,
            "link_detect" => {
                cfg.link_detect = value.parse().map_err(|e: String| {
                    Error::InvalidArgs(format!("invalid link_detect on line {line_no}: {e}"))
                })?;
            }
            "display_width" => cfg.display_width = parse_number(key, value, line_no)?,
            "display_height" => cfg.display_height = parse_number(key, value, line_no)?,
            "rated_refresh" => cfg.rated_refresh = parse_duration_value(key, value, line_no)?,
            "settle_margin" => cfg.settle_margin = parse_duration_value(key, value, line_no)?,
            "transfer_timeout" => {
                cfg.transfer_timeout = parse_duration_value(key, value, line_no)?
            }
            "connect_wait" => cfg.connect_wait = parse_duration_value(key, value, line_no)?,
            "advertise_cooldown" => {
                cfg.advertise_cooldown = parse_duration_value(key, value, line_no)?
            }
            "poll_interval_ms" => cfg.poll_interval_ms = parse_number(key, value, line_no)?,
            "max_image_bytes" => cfg.max_image_bytes = parse_number(key, value, line_no)?,
            other => {
                return Err(Error::InvalidArgs(format!(
                    "unknown config key '{other}' on line {line_no}"
                )));
            }
        }
    }

    super::validate(&cfg)?;
    Ok(cfg)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str, line_no: usize) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::InvalidArgs(format!("invalid {key} value on line {line_no}")))
}

fn parse_duration_value(
    key: &str,
    value: &str,
    line_no: usize,
) -> Result<std::time::Duration> {
    super::parse_duration(value)
        .map_err(|e| Error::InvalidArgs(format!("invalid {key} on line {line_no}: {e}")))
}

fn config_path() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| Error::InvalidArgs("HOME not set; cannot locate config directory".into()))?;
    Ok(home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}
