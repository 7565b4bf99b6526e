use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Default line speed for picmd devices.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default read timeout. Bounds how long a stop request waits on an idle line.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial device settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyAMA0` or `COM3`.
    pub path: PathBuf,
    /// Line speed in baud. Default: 115200.
    pub baud_rate: u32,
    /// Maximum time a single read blocks. Default: 100 ms.
    pub read_timeout: Duration,
}

impl SerialConfig {
    /// Settings for `path` with default speed and timeout.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// A serial device opened in raw 8N1 mode.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    path: PathBuf,
}

impl SerialTransport {
    /// Open the device described by `config`.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let path_str = config.path.to_string_lossy();
        let port = serialport::new(path_str.as_ref(), config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|err| TransportError::Open {
                path: config.path.clone(),
                source: err.into(),
            })?;

        info!(path = ?config.path, baud = config.baud_rate, "opened serial device");

        Ok(Self {
            port: Some(port),
            path: config.path.clone(),
        })
    }

    /// The device path this transport was opened on.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let Some(port) = self.port.as_mut() else {
            return Ok(0);
        };
        Ok(port.read(buf)?)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port()?;

        let mut offset = 0usize;
        while offset < data.len() {
            match port.write(&data[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        port.flush().map_err(TransportError::Io)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            debug!(path = ?self.path, "closing serial device");
            port.flush()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .field("open", &self.port.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = SerialConfig::new("/dev/ttyUSB0");
        assert_eq!(config.path, PathBuf::from("/dev/ttyUSB0"));
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.read_timeout, DEFAULT_READ_TIMEOUT);
    }

    #[test]
    fn open_missing_device_fails() {
        let config = SerialConfig::new("/dev/picmd-does-not-exist");
        let result = SerialTransport::open(&config);
        assert!(matches!(result, Err(TransportError::Open { .. })));
    }
}
