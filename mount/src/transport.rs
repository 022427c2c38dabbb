//! Byte channel to the motion controller.
//!
//! The controller speaks ASCII over a serial line. [`Transport`] is the seam
//! between the engine and the physical port, so tests can substitute the
//! scripted [`mock::MockTransport`]. The one non-obvious primitive is
//! [`Transport::flush_input`]: the controller chatters status bytes whenever
//! the joystick is live, and any of that left in the OS buffer would be read
//! back as if it were a sensor response.

pub mod mock;

use std::io::Read;
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use thiserror::Error;
use tracing::debug;

/// Line rate the controller firmware is built for.
pub const BAUD_RATE: u32 = 115_200;

/// Read timeout on the serial port.
pub const READ_TIMEOUT: Duration = Duration::from_millis(200);

/// Failures on the physical channel.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("port control failed: {0}")]
    Control(#[source] serialport::Error),
}

/// Duplex byte channel with an input-discard primitive.
pub trait Transport: Send {
    /// Write the whole buffer.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Read whatever the controller has sent so far.
    fn read_available(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Throw away unread input so stale bytes never precede a response.
    fn flush_input(&mut self) -> Result<(), TransportError>;
}

/// [`Transport`] over a physical serial port.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Open `path` at the given baud rate with the standard timeout.
    pub fn open(path: &str, baud: u32) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|source| TransportError::Open {
                path: path.to_string(),
                source,
            })?;
        debug!("opened {path} at {baud} baud");
        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(bytes).map_err(TransportError::Write)
    }

    fn read_available(&mut self) -> Result<Vec<u8>, TransportError> {
        let waiting = self.port.bytes_to_read().map_err(TransportError::Control)? as usize;
        let mut buf = vec![0u8; waiting];
        if waiting > 0 {
            self.port.read_exact(&mut buf).map_err(TransportError::Read)?;
        }
        Ok(buf)
    }

    fn flush_input(&mut self) -> Result<(), TransportError> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(TransportError::Control)
    }
}
