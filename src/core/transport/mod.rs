//! Device layer contracts
//!
//! The session core never talks to the operating system directly. It goes
//! through three small contracts:
//! - [`PortEnumerator`] lists the serial endpoints currently present
//! - [`DeviceProvider`] opens one of them
//! - [`DeviceHandle`] is the exclusively owned open port
//!
//! [`serial`] implements them on top of the `serialport` crate.

mod serial;

pub use serial::{SerialDevice, SerialDeviceProvider, SerialPortEnumerator};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Identifying record for a discoverable serial endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortDescriptor {
    /// Name reported by the platform (e.g. `ttyUSB0`, `COM3`)
    pub name: String,
    /// USB serial number, when the adapter reports one
    pub serial_number: Option<String>,
}

impl PortDescriptor {
    /// Create a descriptor without a serial number
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            serial_number: None,
        }
    }

    /// Attach a serial number
    #[must_use]
    pub fn with_serial_number(mut self, serial_number: &str) -> Self {
        self.serial_number = Some(serial_number.to_string());
        self
    }
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.serial_number {
            Some(sn) => write!(f, "{} [{}]", self.name, sn),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Why a device could not be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFailure {
    /// Path does not exist
    NotFound,
    /// Insufficient permissions
    PermissionDenied,
    /// Held by another process
    Busy,
    /// Anything else the platform reported
    Other,
}

impl fmt::Display for OpenFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no such device"),
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::Busy => write!(f, "device busy"),
            Self::Other => write!(f, "open failed"),
        }
    }
}

/// Failures reported by the device layer
#[derive(Error, Debug)]
pub enum DeviceError {
    /// Port enumeration failed (platform driver error)
    #[error("Port enumeration failed: {0}")]
    Enumeration(String),

    /// Port could not be opened
    #[error("Cannot open {port}: {kind} ({message})")]
    Open {
        /// Address that was opened
        port: String,
        /// Classified failure
        kind: OpenFailure,
        /// Platform message
        message: String,
    },

    /// I/O error on an open device
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DeviceError {
    /// Convenience constructor for open failures
    pub fn open(port: &str, kind: OpenFailure, message: impl Into<String>) -> Self {
        Self::Open {
            port: port.to_string(),
            kind,
            message: message.into(),
        }
    }
}

/// Lists the serial ports currently present on the system
#[cfg_attr(test, mockall::automock)]
pub trait PortEnumerator: Send + Sync {
    /// Fetch the current port list; may fail with a platform error
    fn list_ports(&self) -> Result<Vec<PortDescriptor>, DeviceError>;
}

/// Opens serial devices
pub trait DeviceProvider: Send + Sync {
    /// Open `port` at `baud_rate`; reads on the handle block at most `read_timeout`
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn DeviceHandle>, DeviceError>;
}

/// An open serial port
///
/// Implementations must bound `read_line` by `timeout` so that a cancelled
/// reader observes its stop flag within one timeout.
pub trait DeviceHandle: Send {
    /// Read one line, blocking at most `timeout`.
    ///
    /// Returns the bytes read including the line delimiter, a partial line if
    /// the timeout expired mid-line, or an empty buffer if nothing arrived.
    fn read_line(&mut self, timeout: Duration) -> io::Result<Vec<u8>>;

    /// Write all of `data`
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Close the port; further reads and writes fail
    fn close(&mut self) -> io::Result<()>;

    /// Whether the handle is still usable (false once closed or unplugged)
    fn is_open(&self) -> bool;
}

/// The pair of collaborators a session is built on
#[derive(Clone)]
pub struct Providers {
    /// Port enumeration
    pub ports: Arc<dyn PortEnumerator>,
    /// Device opening
    pub devices: Arc<dyn DeviceProvider>,
}

impl Providers {
    /// Build from explicit collaborators
    pub fn new(ports: Arc<dyn PortEnumerator>, devices: Arc<dyn DeviceProvider>) -> Self {
        Self { ports, devices }
    }

    /// Real serial ports via the `serialport` crate
    pub fn system() -> Self {
        Self::new(Arc::new(SerialPortEnumerator), Arc::new(SerialDeviceProvider))
    }
}

impl fmt::Debug for Providers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Providers").finish_non_exhaustive()
    }
}
