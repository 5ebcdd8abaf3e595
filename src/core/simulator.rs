//! Virtual Device Simulator
//!
//! In-process serial ports for testing and development. [`SimulatedPorts`]
//! plays the OS port list, [`SimulatedDevices`] opens scriptable devices that
//! replay queued lines, optionally echo what is written to them, and can be
//! told to fail or to vanish mid-session.

use super::transport::{
    DeviceError, DeviceHandle, DeviceProvider, OpenFailure, PortDescriptor, PortEnumerator,
    Providers,
};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Simulated OS port list
#[derive(Debug, Default)]
pub struct SimulatedPorts {
    ports: RwLock<Vec<PortDescriptor>>,
    fail_next: AtomicUsize,
    calls: AtomicUsize,
}

impl SimulatedPorts {
    /// Start with the given ports
    pub fn new(ports: Vec<PortDescriptor>) -> Self {
        Self {
            ports: RwLock::new(ports),
            ..Self::default()
        }
    }

    /// Plug a port in
    pub fn add(&self, port: PortDescriptor) {
        self.ports.write().push(port);
    }

    /// Unplug a port by name
    pub fn remove(&self, name: &str) {
        self.ports.write().retain(|p| p.name != name);
    }

    /// Make the next `count` enumerations fail
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of enumeration calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PortEnumerator for SimulatedPorts {
    fn list_ports(&self) -> Result<Vec<PortDescriptor>, DeviceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DeviceError::Enumeration("simulated driver failure".into()));
        }
        Ok(self.ports.read().clone())
    }
}

/// Shared state behind one simulated device
#[derive(Debug, Default)]
pub struct DeviceState {
    incoming: Mutex<VecDeque<io::Result<Vec<u8>>>>,
    arrived: Condvar,
    written: Mutex<Vec<Vec<u8>>>,
    echo: AtomicBool,
    fail_writes: AtomicBool,
    unplugged: AtomicBool,
    open: AtomicBool,
    closes: AtomicUsize,
}

impl DeviceState {
    /// Queue raw bytes for the next read
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.incoming.lock().push_back(Ok(bytes.to_vec()));
        self.arrived.notify_all();
    }

    /// Queue a line; `\n` is appended
    pub fn push_line(&self, line: &str) {
        self.push_bytes(format!("{}\n", line).as_bytes());
    }

    /// Make the next read fail
    pub fn push_read_error(&self, kind: io::ErrorKind) {
        self.incoming
            .lock()
            .push_back(Err(io::Error::new(kind, "simulated read failure")));
        self.arrived.notify_all();
    }

    /// Reads still queued
    pub fn pending(&self) -> usize {
        self.incoming.lock().len()
    }

    /// Write every line back to the reader
    pub fn set_echo(&self, echo: bool) {
        self.echo.store(echo, Ordering::SeqCst);
    }

    /// Make writes fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Simulate the adapter being pulled out
    pub fn unplug(&self) {
        self.unplugged.store(true, Ordering::SeqCst);
        self.arrived.notify_all();
    }

    /// Everything written so far, one buffer per write
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().clone()
    }

    /// Number of close calls
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Whether a handle is currently open
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Device provider over simulated ports
#[derive(Debug, Default)]
pub struct SimulatedDevices {
    devices: Mutex<HashMap<String, Arc<DeviceState>>>,
    open_failure: Mutex<Option<OpenFailure>>,
    opens: Mutex<Vec<(String, u32)>>,
}

impl SimulatedDevices {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// State for the device at `address`, created on first use
    pub fn device(&self, address: &str) -> Arc<DeviceState> {
        self.devices
            .lock()
            .entry(address.to_string())
            .or_default()
            .clone()
    }

    /// Make every open fail with `kind` (or succeed again with `None`)
    pub fn fail_opens(&self, kind: Option<OpenFailure>) {
        *self.open_failure.lock() = kind;
    }

    /// Every `(address, baud)` opened so far
    pub fn opens(&self) -> Vec<(String, u32)> {
        self.opens.lock().clone()
    }
}

impl DeviceProvider for SimulatedDevices {
    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        _read_timeout: Duration,
    ) -> Result<Box<dyn DeviceHandle>, DeviceError> {
        if let Some(kind) = *self.open_failure.lock() {
            return Err(DeviceError::open(port, kind, "simulated open failure"));
        }

        let state = self.device(port);
        if state.unplugged.load(Ordering::SeqCst) {
            return Err(DeviceError::open(port, OpenFailure::NotFound, "device unplugged"));
        }
        if state.open.swap(true, Ordering::SeqCst) {
            return Err(DeviceError::open(port, OpenFailure::Busy, "already open"));
        }

        self.opens.lock().push((port.to_string(), baud_rate));
        Ok(Box::new(SimulatedDevice {
            state,
            closed: false,
        }))
    }
}

/// Open handle onto a [`DeviceState`]
#[derive(Debug)]
pub struct SimulatedDevice {
    state: Arc<DeviceState>,
    closed: bool,
}

impl SimulatedDevice {
    fn check(&self) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "device closed"));
        }
        if self.state.unplugged.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        Ok(())
    }
}

impl DeviceHandle for SimulatedDevice {
    fn read_line(&mut self, timeout: Duration) -> io::Result<Vec<u8>> {
        self.check()?;
        let mut incoming = self.state.incoming.lock();
        if incoming.is_empty() {
            self.state.arrived.wait_for(&mut incoming, timeout);
        }
        match incoming.pop_front() {
            Some(item) => item,
            None => {
                drop(incoming);
                self.check()?;
                Ok(Vec::new())
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.check()?;
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "simulated write failure"));
        }
        self.state.written.lock().push(data.to_vec());
        if self.state.echo.load(Ordering::SeqCst) {
            self.state.push_bytes(data);
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        if !self.closed {
            self.closed = true;
            self.state.open.store(false, Ordering::SeqCst);
            self.state.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed && !self.state.unplugged.load(Ordering::SeqCst)
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        // Release the port without counting an explicit close
        self.state.open.store(false, Ordering::SeqCst);
    }
}

/// Ports and devices wired together, ready to hand to a session
#[derive(Debug, Clone)]
pub struct Simulator {
    /// Port list
    pub ports: Arc<SimulatedPorts>,
    /// Devices
    pub devices: Arc<SimulatedDevices>,
}

impl Simulator {
    /// Simulator exposing `ports`
    pub fn new(ports: Vec<PortDescriptor>) -> Self {
        Self {
            ports: Arc::new(SimulatedPorts::new(ports)),
            devices: Arc::new(SimulatedDevices::new()),
        }
    }

    /// Collaborators for a session
    pub fn providers(&self) -> Providers {
        Providers::new(self.ports.clone(), self.devices.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumeration_failure_injection() {
        let ports = SimulatedPorts::new(vec![PortDescriptor::new("sim0")]);
        ports.fail_next(1);
        assert!(ports.list_ports().is_err());
        assert_eq!(ports.list_ports().unwrap().len(), 1);
        assert_eq!(ports.calls(), 2);
    }

    #[test]
    fn test_echo_device() {
        let devices = SimulatedDevices::new();
        let mut dev = devices.open("/dev/sim0", 9600, Duration::from_millis(10)).unwrap();
        devices.device("/dev/sim0").set_echo(true);

        dev.write(b"Hello\n").unwrap();
        assert_eq!(dev.read_line(Duration::from_millis(10)).unwrap(), b"Hello\n");
        assert!(dev.read_line(Duration::from_millis(1)).unwrap().is_empty());
    }

    #[test]
    fn test_exclusive_open() {
        let devices = SimulatedDevices::new();
        let mut first = devices.open("sim0", 9600, Duration::ZERO).unwrap();
        assert!(matches!(
            devices.open("sim0", 9600, Duration::ZERO),
            Err(DeviceError::Open { kind: OpenFailure::Busy, .. })
        ));

        first.close().unwrap();
        first.close().unwrap();
        assert_eq!(devices.device("sim0").closes(), 1);
        assert!(devices.open("sim0", 9600, Duration::ZERO).is_ok());
    }

    #[test]
    fn test_unplug_invalidates_handle() {
        let devices = SimulatedDevices::new();
        let mut dev = devices.open("sim0", 9600, Duration::ZERO).unwrap();
        devices.device("sim0").unplug();

        assert!(!dev.is_open());
        assert!(dev.write(b"x").is_err());
        assert!(dev.read_line(Duration::ZERO).is_err());
    }
}
