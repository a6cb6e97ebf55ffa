use super::Transport;
use crate::{Error, Result};
use std::collections::VecDeque;

/// One scripted radio event, consumed in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// A central connects (only while advertising).
    Connect,
    /// One read's worth of bytes arrives on the link.
    Chunk(Vec<u8>),
    /// Nothing arrives for this many polls.
    Idle(u32),
    /// The link fails with the given error kind on the next read.
    ReadError(std::io::ErrorKind),
    /// The central drops the link.
    Disconnect,
}

/// Scripted transport for tests and demo mode.
#[derive(Debug, Default)]
pub struct FakeTransport {
    script: VecDeque<ScriptStep>,
    advertising: bool,
    connected: bool,
    writes: Vec<Vec<u8>>,
    advertise_starts: u32,
    advertise_stops: u32,
}

impl FakeTransport {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script: script.into(),
            ..Self::default()
        }
    }

    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    pub fn advertise_starts(&self) -> u32 {
        self.advertise_starts
    }

    pub fn advertise_stops(&self) -> u32 {
        self.advertise_stops
    }

    pub fn is_exhausted(&self) -> bool {
        self.script.is_empty()
    }

    /// Apply link-state steps at the head of the script.
    fn advance_link_state(&mut self) {
        loop {
            match self.script.front() {
                Some(ScriptStep::Connect) if self.advertising && !self.connected => {
                    self.script.pop_front();
                    self.connected = true;
                }
                Some(ScriptStep::Disconnect) if self.connected => {
                    self.script.pop_front();
                    self.connected = false;
                    return;
                }
                _ => return,
            }
        }
    }
}

impl Transport for FakeTransport {
    fn start_advertising(&mut self) -> Result<()> {
        self.advertising = true;
        self.advertise_starts += 1;
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<()> {
        if self.advertising {
            self.advertise_stops += 1;
        }
        self.advertising = false;
        Ok(())
    }

    fn is_advertising(&self) -> bool {
        self.advertising
    }

    fn is_connected(&mut self) -> bool {
        self.advance_link_state();
        self.connected
    }

    fn bytes_waiting(&mut self) -> Result<usize> {
        if !self.connected {
            return Ok(0);
        }
        match self.script.front_mut() {
            Some(ScriptStep::Chunk(bytes)) => Ok(bytes.len()),
            Some(ScriptStep::Idle(remaining)) => {
                if *remaining <= 1 {
                    self.script.pop_front();
                } else {
                    *remaining -= 1;
                }
                Ok(0)
            }
            Some(ScriptStep::ReadError(kind)) => {
                let kind = *kind;
                self.script.pop_front();
                self.connected = false;
                Err(Error::Io(std::io::Error::new(kind, "scripted read failure")))
            }
            _ => Ok(0),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if !self.connected {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "link down",
            )));
        }
        let Some(ScriptStep::Chunk(bytes)) = self.script.front_mut() else {
            return Ok(0);
        };
        let take = bytes.len().min(buf.len());
        buf[..take].copy_from_slice(&bytes[..take]);
        if take == bytes.len() {
            self.script.pop_front();
        } else {
            bytes.drain(..take);
        }
        Ok(take)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "link down",
            )));
        }
        self.writes.push(bytes.to_vec());
        Ok(())
    }
}
