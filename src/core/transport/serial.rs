//! Serial port backend

use super::{DeviceError, DeviceHandle, DeviceProvider, OpenFailure, PortDescriptor, PortEnumerator};
use serialport::{SerialPort, SerialPortType};
use std::io::{self, BufRead, BufReader, Write};
use std::time::{Duration, Instant};
use tracing::debug;

/// Enumerates ports through `serialport::available_ports`
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialPortEnumerator;

impl PortEnumerator for SerialPortEnumerator {
    fn list_ports(&self) -> Result<Vec<PortDescriptor>, DeviceError> {
        let ports =
            serialport::available_ports().map_err(|e| DeviceError::Enumeration(e.to_string()))?;

        Ok(ports
            .into_iter()
            .map(|info| {
                let serial_number = match info.port_type {
                    SerialPortType::UsbPort(usb) => usb.serial_number,
                    _ => None,
                };
                PortDescriptor {
                    name: reported_name(&info.port_name).to_string(),
                    serial_number,
                }
            })
            .collect())
    }
}

/// Strip the device directory so names match what the platform reports
/// (`/dev/ttyUSB0` becomes `ttyUSB0`); the addressing rule adds it back.
fn reported_name(port_name: &str) -> &str {
    port_name.strip_prefix("/dev/").unwrap_or(port_name)
}

/// Opens ports with 8N1 framing and no flow control
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialDeviceProvider;

impl DeviceProvider for SerialDeviceProvider {
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn DeviceHandle>, DeviceError> {
        let handle = serialport::new(port, baud_rate)
            .timeout(read_timeout)
            .open()
            .map_err(|e| {
                let kind = match e.kind() {
                    serialport::ErrorKind::NoDevice => OpenFailure::NotFound,
                    serialport::ErrorKind::Io(io::ErrorKind::NotFound) => OpenFailure::NotFound,
                    serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
                        OpenFailure::PermissionDenied
                    }
                    _ => OpenFailure::Other,
                };
                DeviceError::open(port, kind, e.to_string())
            })?;

        Ok(Box::new(SerialDevice::new(handle)))
    }
}

/// An open OS serial port
pub struct SerialDevice {
    port: Option<BufReader<Box<dyn SerialPort>>>,
}

impl SerialDevice {
    /// Wrap an already opened port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            port: Some(BufReader::new(port)),
        }
    }

    fn closed() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, "serial port is closed")
    }
}

impl DeviceHandle for SerialDevice {
    fn read_line(&mut self, timeout: Duration) -> io::Result<Vec<u8>> {
        let reader = self.port.as_mut().ok_or_else(Self::closed)?;
        // One deadline for the whole call; a chatty device without newlines
        // must not keep the device locked past it
        let deadline = Instant::now() + timeout;
        let mut line = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(line);
            }
            reader.get_mut().set_timeout(remaining).map_err(io::Error::from)?;

            let (used, complete) = {
                let available = match reader.fill_buf() {
                    Ok(available) => available,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(line),
                    // Hand over what arrived; the error resurfaces on the next read
                    Err(e) if !line.is_empty() => {
                        debug!("Read ended early after {} bytes: {}", line.len(), e);
                        return Ok(line);
                    }
                    Err(e) => return Err(e),
                };
                if available.is_empty() {
                    return Ok(line);
                }
                match available.iter().position(|&b| b == b'\n') {
                    Some(end) => {
                        line.extend_from_slice(&available[..=end]);
                        (end + 1, true)
                    }
                    None => {
                        line.extend_from_slice(available);
                        (available.len(), false)
                    }
                }
            };
            reader.consume(used);
            if complete {
                return Ok(line);
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let port = self.port.as_mut().ok_or_else(Self::closed)?.get_mut();
        port.write_all(data)?;
        port.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        // Dropping the handle releases the OS descriptor
        self.port.take();
        Ok(())
    }

    fn is_open(&self) -> bool {
        // A vanished USB adapter fails the queue query
        self.port
            .as_ref()
            .is_some_and(|reader| reader.get_ref().bytes_to_read().is_ok())
    }
}
