pub mod app;
pub mod cli;
pub mod config;
pub mod display;
pub mod protocol;
pub mod transfer;
pub mod transport;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    InvalidArgs(String),
    Io(std::io::Error),
    Parse(String),
    Protocol(String),
    Timeout(String),
    Render(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidArgs(msg) => write!(f, "invalid arguments: {msg}"),
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Parse(msg) => write!(f, "parse error: {msg}"),
            Error::Protocol(msg) => write!(f, "protocol violation: {msg}"),
            Error::Timeout(msg) => write!(f, "timeout: {msg}"),
            Error::Render(msg) => write!(f, "render error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}
