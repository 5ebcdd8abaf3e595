//! # Serialbridge Core Library
//!
//! Headless serial-port session engine. A [`ConnectionSession`] owns one
//! serial device at a time and exposes:
//!
//! - Toggle-style connect/disconnect by port name or adapter serial number
//! - A background reader delivering decoded lines in arrival order
//! - Writes with a configurable line terminator
//! - Background port polling that tears the session down when the device
//!   vanishes
//! - An output log and control state for whatever UI sits on top
//!
//! ## Example
//!
//! ```rust,no_run
//! use serialbridge_core::{ConnectionConfig, ConnectionSession, PortSelector, Providers};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConnectionConfig::new(Some(PortSelector::name("ttyUSB0")));
//!     let session = ConnectionSession::new(config, Providers::system()).await?;
//!
//!     session.connect().await?;
//!     session.send("PING").await?;
//!
//!     let mut rx = session.subscribe();
//!     while let Ok(event) = rx.recv().await {
//!         if let serialbridge_core::SessionEvent::LineReceived(line) = event {
//!             println!("Received: {}", line);
//!         }
//!     }
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;
pub mod logging;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes, OutputFormat};
pub use crate::config::{AppConfig, BaudRate, ConnectionConfig, LineTerminator};
pub use crate::core::error::{ReaderError, SessionError};
pub use crate::core::output::{MessageTag, OutputEntry, OutputSink};
pub use crate::core::reader::{LineReader, ReaderConfig};
pub use crate::core::registry::{PortRegistry, PortSnapshot};
pub use crate::core::selector::{Platform, PortSelector};
pub use crate::core::session::{ConnectionSession, ControlState, SessionEvent, ToggleLabel};
pub use crate::core::simulator::Simulator;
pub use crate::core::state_machine::{SessionState, StateTransition};
pub use crate::core::transport::{
    DeviceError, DeviceHandle, DeviceProvider, OpenFailure, PortDescriptor, PortEnumerator,
    Providers,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
