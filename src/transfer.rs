//! Reassembly of chunked image uploads.
//!
//! At most one transfer exists at a time. A transfer ends in exactly one of: `finish`
//! (complete), `check_timeout` firing, or `cancel` (superseding `image_start` or link
//! loss). Only `finish` hands data onwards; every other ending discards it.

use std::time::{Duration, Instant};

use crate::{protocol::ImageHeader, Error, Result};

const PROGRESS_STEP_PERCENT: u8 = 10;

/// Mutable state of the transfer in flight.
#[derive(Debug)]
struct ImageTransfer {
    header: ImageHeader,
    buffer: Vec<u8>,
    started_at: Instant,
    last_fragment_at: Instant,
    reported_step: u8,
}

impl ImageTransfer {
    fn percent(&self) -> u8 {
        let expected = self.header.byte_len.max(1);
        (self.buffer.len().saturating_mul(100) / expected).min(100) as u8
    }
}

/// What a single `append` observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    pub received: usize,
    pub expected: usize,
    /// Set when this fragment crossed a 10% boundary (or completed the transfer).
    pub progress: Option<u8>,
    pub complete: bool,
    /// Bytes beyond the declared length that were dropped.
    pub overflow: usize,
}

/// A finished upload, trimmed to exactly the declared length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedImage {
    pub header: ImageHeader,
    pub data: Vec<u8>,
    pub elapsed: Duration,
}

/// Accumulates raw fragments for the active `image_start`.
#[derive(Debug)]
pub struct Reassembler {
    timeout: Duration,
    active: Option<ImageTransfer>,
}

impl Reassembler {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn header(&self) -> Option<&ImageHeader> {
        self.active.as_ref().map(|t| &t.header)
    }

    pub fn received(&self) -> usize {
        self.active.as_ref().map_or(0, |t| t.buffer.len())
    }

    pub fn percent(&self) -> Option<u8> {
        self.active.as_ref().map(ImageTransfer::percent)
    }

    /// Start a new transfer. Returns the byte count of a discarded prior transfer.
    pub fn begin(&mut self, header: ImageHeader, now: Instant) -> Option<usize> {
        let discarded = self.cancel();
        self.active = Some(ImageTransfer {
            buffer: Vec::with_capacity(header.byte_len),
            header,
            started_at: now,
            last_fragment_at: now,
            reported_step: 0,
        });
        discarded
    }

    /// Append raw bytes; anything past the declared length is dropped.
    pub fn append(&mut self, fragment: &[u8], now: Instant) -> Result<AppendOutcome> {
        let transfer = self
            .active
            .as_mut()
            .ok_or_else(|| Error::Protocol("image data without image_start".into()))?;

        let expected = transfer.header.byte_len;
        let room = expected.saturating_sub(transfer.buffer.len());
        let take = fragment.len().min(room);
        transfer.buffer.extend_from_slice(&fragment[..take]);
        transfer.last_fragment_at = now;

        let percent = transfer.percent();
        let step = percent / PROGRESS_STEP_PERCENT;
        let progress = if step > transfer.reported_step {
            transfer.reported_step = step;
            Some(percent)
        } else {
            None
        };

        Ok(AppendOutcome {
            received: transfer.buffer.len(),
            expected,
            progress,
            complete: transfer.buffer.len() >= expected,
            overflow: fragment.len() - take,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|t| t.buffer.len() >= t.header.byte_len)
    }

    /// Abort the transfer when no fragment arrived for longer than the timeout.
    pub fn check_timeout(&mut self, now: Instant) -> Result<()> {
        let Some(transfer) = self.active.as_ref() else {
            return Ok(());
        };
        let idle = now.saturating_duration_since(transfer.last_fragment_at);
        if idle <= self.timeout {
            return Ok(());
        }
        let received = transfer.buffer.len();
        let expected = transfer.header.byte_len;
        self.active = None;
        Err(Error::Timeout(format!(
            "no image data for {} ({received}/{expected} bytes received)",
            humantime::format_duration(Duration::from_millis(idle.as_millis() as u64))
        )))
    }

    /// Hand off the completed buffer and return to idle.
    pub fn finish(&mut self, now: Instant) -> Result<CompletedImage> {
        if !self.is_complete() {
            return Err(Error::Protocol(match self.active.as_ref() {
                Some(t) => format!(
                    "image incomplete ({}/{} bytes)",
                    t.buffer.len(),
                    t.header.byte_len
                ),
                None => "no image transfer active".into(),
            }));
        }
        let Some(mut transfer) = self.active.take() else {
            return Err(Error::Protocol("no image transfer active".into()));
        };
        transfer.buffer.truncate(transfer.header.byte_len);
        Ok(CompletedImage {
            elapsed: now.saturating_duration_since(transfer.started_at),
            header: transfer.header,
            data: transfer.buffer,
        })
    }

    /// Drop the active transfer, if any. Returns how many bytes were discarded.
    pub fn cancel(&mut self) -> Option<usize> {
        self.active.take().map(|t| t.buffer.len())
    }
}
