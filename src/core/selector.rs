//! Port selection and platform addressing

use super::transport::PortDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the caller identifies the port to open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum PortSelector {
    /// Match the reported port name
    Name(String),
    /// Match the adapter's serial number
    SerialNumber(String),
}

impl PortSelector {
    /// Select by port name
    pub fn name(name: &str) -> Self {
        Self::Name(name.to_string())
    }

    /// Select by serial number
    pub fn serial_number(sn: &str) -> Self {
        Self::SerialNumber(sn.to_string())
    }

    fn matches(&self, port: &PortDescriptor) -> bool {
        match self {
            Self::Name(name) => port.name == *name,
            Self::SerialNumber(sn) => port.serial_number.as_deref() == Some(sn.as_str()),
        }
    }
}

impl From<&PortDescriptor> for PortSelector {
    fn from(port: &PortDescriptor) -> Self {
        Self::Name(port.name.clone())
    }
}

impl fmt::Display for PortSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "port {}", name),
            Self::SerialNumber(sn) => write!(f, "serial number {}", sn),
        }
    }
}

/// Outcome of resolving a selector that did not yield exactly one port
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No port matched
    NotFound(String),
    /// More than one port matched
    Ambiguous(String, usize),
}

/// Resolve `selector` against a port snapshot.
///
/// With no selector the snapshot itself must contain exactly one port.
pub fn resolve<'a>(
    selector: Option<&PortSelector>,
    ports: &'a [PortDescriptor],
) -> Result<&'a PortDescriptor, Resolution> {
    let describe = || {
        selector.map_or_else(|| "any port".to_string(), ToString::to_string)
    };

    let mut matches = ports
        .iter()
        .filter(|port| selector.map_or(true, |s| s.matches(port)));

    let first = matches.next();
    match (first, matches.count()) {
        (None, _) => Err(Resolution::NotFound(describe())),
        (Some(port), 0) => Ok(port),
        (Some(_), rest) => Err(Resolution::Ambiguous(describe(), rest + 1)),
    }
}

/// Operating system family, for the port addressing rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Linux, macOS and other POSIX systems: ports live under `/dev`
    Posix,
    /// Everything else: the reported name is the address
    Other,
}

impl Platform {
    /// Platform this binary was built for
    pub fn current() -> Self {
        if cfg!(unix) {
            Self::Posix
        } else {
            Self::Other
        }
    }

    /// Address to hand to the device provider for `port`
    pub fn device_address(self, port: &PortDescriptor) -> String {
        match self {
            Self::Posix => format!("/dev/{}", port.name),
            Self::Other => port.name.clone(),
        }
    }
}
