//! Session error types

use super::state_machine::SessionState;
use super::transport::DeviceError;
use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;

/// Failure inside the line reader loop
#[derive(Error, Debug)]
pub enum ReaderError {
    /// Device produced bytes that are not UTF-8
    #[error("invalid UTF-8 in received line: {0}")]
    Decode(#[from] FromUtf8Error),

    /// The underlying read raised
    #[error("read failed: {0}")]
    Io(#[from] io::Error),
}

/// Session error types
#[derive(Error, Debug)]
pub enum SessionError {
    /// Selector matches no known port
    #[error("Port not found: {0}")]
    NotFound(String),

    /// Selector matches several ports
    #[error("Selector is ambiguous: {selector} matches {count} ports")]
    Ambiguous {
        /// Selector description
        selector: String,
        /// Number of matching ports
        count: usize,
    },

    /// Device could not be opened
    #[error("Open failed: {0}")]
    OpenFailed(#[source] DeviceError),

    /// Write to the open device raised
    #[error("Write failed: {0}")]
    WriteFailed(#[source] io::Error),

    /// Decode or I/O failure inside the line reader
    #[error("Read error: {0}")]
    ReadError(#[from] ReaderError),

    /// Port enumeration failed
    #[error("Port enumeration failed: {0}")]
    EnumerationFailed(#[source] DeviceError),

    /// Operation requires a connected session
    #[error("Not connected")]
    NotConnected,

    /// Port or baud selection can only change while disconnected
    #[error("Selection is locked while {0:?}")]
    SelectionLocked(SessionState),

    /// Session has been closed for good
    #[error("Session closed")]
    SessionClosed,

    /// State table violation
    #[error("Invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        /// Current state
        from: SessionState,
        /// Requested state
        to: SessionState,
    },

    /// Interval is negative, not a number or too large
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    /// Baud rate must be positive
    #[error("Invalid baud rate: {0}")]
    InvalidBaudRate(u32),

    /// A background task panicked or was aborted
    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl From<tokio::task::JoinError> for SessionError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskFailed(err.to_string())
    }
}
