//! Byte-oriented access to the wireless link.
//!
//! The radio stack is an external collaborator; everything above this module only sees
//! the [`Transport`] trait. [`LinkWatch`] turns the connected-query polling that radio
//! stacks expose into explicit up/down transitions.

pub mod errors;
pub mod fake;
pub mod serial;

pub use errors::{classify_error, LinkFailureKind};
pub use fake::{FakeTransport, ScriptStep};
pub use serial::SerialTransport;

use crate::Result;

/// Upper bound for a single read; one read per control-loop iteration.
pub const MAX_READ_BYTES: usize = 512;

/// Radio + link primitives consumed by the session controller.
pub trait Transport {
    fn start_advertising(&mut self) -> Result<()>;
    fn stop_advertising(&mut self) -> Result<()>;
    fn is_advertising(&self) -> bool;
    fn is_connected(&mut self) -> bool;
    /// Number of bytes ready to read without blocking.
    fn bytes_waiting(&mut self) -> Result<usize>;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
}

/// Edge detector over [`Transport::is_connected`].
#[derive(Debug, Default)]
pub struct LinkWatch {
    was_connected: bool,
}

impl LinkWatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Option<LinkEvent> {
        let now_connected = transport.is_connected();
        self.observe(now_connected)
    }

    /// Record an externally detected state, e.g. a read failure.
    pub fn observe(&mut self, now_connected: bool) -> Option<LinkEvent> {
        let event = match (self.was_connected, now_connected) {
            (false, true) => Some(LinkEvent::Connected),
            (true, false) => Some(LinkEvent::Disconnected),
            _ => None,
        };
        self.was_connected = now_connected;
        event
    }

    pub fn is_connected(&self) -> bool {
        self.was_connected
    }
}

/// Read at most one chunk of whatever is waiting. Returns an empty vec when idle.
pub fn read_available<T: Transport + ?Sized>(transport: &mut T) -> Result<Vec<u8>> {
    let waiting = transport.bytes_waiting()?;
    if waiting == 0 {
        return Ok(Vec::new());
    }
    let mut buf = vec![0u8; waiting.min(MAX_READ_BYTES)];
    let read = transport.read(&mut buf)?;
    buf.truncate(read);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_watch_reports_edges_only() {
        let mut watch = LinkWatch::new();
        assert_eq!(watch.observe(false), None);
        assert_eq!(watch.observe(true), Some(LinkEvent::Connected));
        assert_eq!(watch.observe(true), None);
        assert_eq!(watch.observe(false), Some(LinkEvent::Disconnected));
        assert!(!watch.is_connected());
    }

    #[test]
    fn read_available_returns_one_chunk() {
        let mut fake = FakeTransport::new(vec![
            ScriptStep::Connect,
            ScriptStep::Chunk(b"hello".to_vec()),
        ]);
        fake.start_advertising().unwrap();
        assert!(fake.is_connected());
        let chunk = read_available(&mut fake).unwrap();
        assert_eq!(chunk, b"hello");
        assert!(read_available(&mut fake).unwrap().is_empty());
    }
}
