use super::Transport;
use crate::{config::LinkDetect, Error, Result};
use std::io::{self, Read, Write};
use std::time::Duration;

/// Settings for opening the BLE-UART bridge device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialOptions {
    pub baud: u32,
    pub timeout_ms: u64,
    pub link_detect: LinkDetect,
}

impl Default for SerialOptions {
    fn default() -> Self {
        Self {
            baud: crate::config::DEFAULT_BAUD,
            timeout_ms: crate::config::DEFAULT_SERIAL_TIMEOUT_MS,
            link_detect: LinkDetect::default(),
        }
    }
}

/// Transport over a BLE-UART bridge module that shows up as a serial device.
///
/// Advertising is owned by the bridge; here it means "device opened and listening".
/// Link state comes from the configured modem line when the bridge exposes one.
pub struct SerialTransport {
    device: String,
    options: SerialOptions,
    port: Option<Box<dyn serialport::SerialPort>>,
    advertising: bool,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("device", &self.device)
            .field("options", &self.options)
            .field("open", &self.port.is_some())
            .field("advertising", &self.advertising)
            .finish()
    }
}

impl SerialTransport {
    pub fn new(device: &str, options: SerialOptions) -> Result<Self> {
        if device.is_empty() {
            return Err(Error::InvalidArgs(
                "device path cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            device: device.to_string(),
            options,
            port: None,
            advertising: false,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }
        let port = serialport::new(&self.device, self.options.baud)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(self.options.timeout_ms))
            .open()
            .map_err(map_serial_error)?;
        self.port = Some(port);
        Ok(())
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| Error::Io(io::Error::new(io::ErrorKind::NotConnected, "link down")))
    }

    /// Drop the port after a link failure so the next advertise reopens it.
    fn close(&mut self) {
        self.port = None;
    }

    fn line_state(&mut self) -> Option<bool> {
        let detect = self.options.link_detect;
        let port = self.port.as_mut()?;
        match detect {
            LinkDetect::Open => Some(true),
            LinkDetect::Dcd => port.read_carrier_detect().ok(),
            LinkDetect::Cts => port.read_clear_to_send().ok(),
        }
    }
}

impl Transport for SerialTransport {
    fn start_advertising(&mut self) -> Result<()> {
        self.open()?;
        self.advertising = true;
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<()> {
        self.advertising = false;
        Ok(())
    }

    fn is_advertising(&self) -> bool {
        self.advertising
    }

    fn is_connected(&mut self) -> bool {
        match self.line_state() {
            Some(up) => up,
            None => {
                if self.port.is_some() && self.options.link_detect != LinkDetect::Open {
                    // Modem line query failed: the device itself went away.
                    self.close();
                }
                false
            }
        }
    }

    fn bytes_waiting(&mut self) -> Result<usize> {
        let port = self.port_mut()?;
        match port.bytes_to_read() {
            Ok(n) => Ok(n as usize),
            Err(err) => {
                self.close();
                Err(map_serial_error(err))
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let port = self.port_mut()?;
        match port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => {
                self.close();
                Err(Error::Io(e))
            }
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port_mut()?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }
}

fn map_serial_error(err: serialport::Error) -> Error {
    use serialport::ErrorKind;

    let kind = match err.kind() {
        ErrorKind::NoDevice => io::ErrorKind::NotFound,
        ErrorKind::InvalidInput => io::ErrorKind::InvalidInput,
        ErrorKind::Io(inner) => inner,
        ErrorKind::Unknown => io::ErrorKind::Other,
    };

    Error::Io(io::Error::new(kind, err))
}
