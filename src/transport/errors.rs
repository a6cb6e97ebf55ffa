use crate::Error;
use std::fmt;
use std::io::ErrorKind;

/// High-level reason for a link failure, used in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFailureKind {
    PermissionDenied,
    DeviceMissing,
    Disconnected,
    Timeout,
    Framing,
    Busy,
    Config,
    Unknown,
}

impl LinkFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkFailureKind::PermissionDenied => "permission_denied",
            LinkFailureKind::DeviceMissing => "device_missing",
            LinkFailureKind::Disconnected => "disconnected",
            LinkFailureKind::Timeout => "timeout",
            LinkFailureKind::Framing => "framing",
            LinkFailureKind::Busy => "busy",
            LinkFailureKind::Config => "config",
            LinkFailureKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LinkFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a crate-level error into a link failure reason.
pub fn classify_error(err: &Error) -> LinkFailureKind {
    match err {
        Error::InvalidArgs(_) => LinkFailureKind::Config,
        Error::Io(io_err) => classify_io_error(io_err),
        Error::Parse(_) | Error::Protocol(_) => LinkFailureKind::Framing,
        Error::Timeout(_) => LinkFailureKind::Timeout,
        Error::Render(_) => LinkFailureKind::Unknown,
    }
}

/// Classify an std::io::Error into a link failure reason.
pub fn classify_io_error(err: &std::io::Error) -> LinkFailureKind {
    match err.kind() {
        ErrorKind::PermissionDenied => LinkFailureKind::PermissionDenied,
        ErrorKind::NotFound => LinkFailureKind::DeviceMissing,
        ErrorKind::TimedOut | ErrorKind::WouldBlock => LinkFailureKind::Timeout,
        ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::NotConnected
        | ErrorKind::UnexpectedEof => LinkFailureKind::Disconnected,
        ErrorKind::InvalidInput => LinkFailureKind::Config,
        ErrorKind::InvalidData => LinkFailureKind::Framing,
        _ => match err.raw_os_error() {
            // 5 = EIO, 6 = ENXIO, 13 = EACCES, 16 = EBUSY, 19 = ENODEV, 110 = ETIMEDOUT
            Some(13) => LinkFailureKind::PermissionDenied,
            Some(16) => LinkFailureKind::Busy,
            Some(19) | Some(6) => LinkFailureKind::DeviceMissing,
            Some(5) => LinkFailureKind::Disconnected,
            Some(110) => LinkFailureKind::Timeout,
            _ => LinkFailureKind::Unknown,
        },
    }
}
