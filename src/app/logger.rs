use std::io::Write;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{Error, Result};

const ENV_LOG_LEVEL: &str = "INKLINK_LOG_LEVEL";
const ENV_LOG_PATH: &str = "INKLINK_LOG_PATH";

/// Log verbosity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    #[default]
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(Error::InvalidArgs(format!(
                "unknown log level '{other}' (expected error|warn|info|debug|trace)"
            ))),
        }
    }
}

/// Stderr logger with levels and an optional append-only file sink.
///
/// `INKLINK_LOG_LEVEL` overrides the configured level and `INKLINK_LOG_PATH` supplies a
/// file when none was configured.
#[derive(Debug)]
pub struct Logger {
    level: LogLevel,
    file: Option<std::fs::File>,
}

impl Logger {
    pub fn new(level: LogLevel, file_path: Option<String>) -> Result<Self> {
        let env_level = std::env::var(ENV_LOG_LEVEL)
            .ok()
            .and_then(|s| LogLevel::from_str(&s).ok());
        let path = file_path.or_else(|| std::env::var(ENV_LOG_PATH).ok());
        let file = match path {
            Some(p) => Some(
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&p)?,
            ),
            None => None,
        };
        Ok(Self {
            level: env_level.unwrap_or(level),
            file,
        })
    }

    /// Logger that only prints errors; used by tests and one-shot commands.
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            file: None,
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn log(&self, level: LogLevel, msg: impl AsRef<str>) {
        if level > self.level {
            return;
        }
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let line = format!("[{ts:.3}] [{level:?}] {}", msg.as_ref());
        eprintln!("{line}");
        if let Some(file) = self.file.as_ref() {
            if let Ok(mut clone) = file.try_clone() {
                let _ = writeln!(clone, "{line}");
            }
        }
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Error, msg);
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Warn, msg);
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Info, msg);
    }

    pub fn debug(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Debug, msg);
    }

    pub fn trace(&self, msg: impl AsRef<str>) {
        self.log(LogLevel::Trace, msg);
    }
}
