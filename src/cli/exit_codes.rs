//! CLI Exit Codes
//!
//! Stable exit codes so scripts can tell failure causes apart.

use crate::core::error::SessionError;
use crate::core::transport::{DeviceError, OpenFailure};
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Connection failed
    pub const CONNECTION_FAILED: u8 = 3;

    /// Timed out waiting for the device
    pub const TIMEOUT: u8 = 4;

    /// Permission denied
    pub const PERMISSION_DENIED: u8 = 7;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 8;

    /// User cancelled
    pub const CANCELLED: u8 = 11;

    /// Device vanished or failed mid-session
    pub const DEVICE_LOST: u8 = 12;

    /// Device busy
    pub const DEVICE_BUSY: u8 = 13;

    /// Port not found
    pub const PORT_NOT_FOUND: u8 = 14;

    /// Selector matched several ports
    pub const AMBIGUOUS_PORT: u8 = 15;

    /// Port enumeration failed
    pub const ENUMERATION_FAILED: u8 = 16;

    /// Internal error
    pub const INTERNAL_ERROR: u8 = 127;
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Plain success
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Success with a message for the user
    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success(Some(msg.into()))
    }

    /// Failure with an explicit code
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) => Some(msg),
            Self::Error(_, msg) => Some(msg),
            _ => None,
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<&SessionError> for CliResult {
    fn from(err: &SessionError) -> Self {
        let code = match err {
            SessionError::NotFound(_) => ExitCodes::PORT_NOT_FOUND,
            SessionError::Ambiguous { .. } => ExitCodes::AMBIGUOUS_PORT,
            SessionError::OpenFailed(DeviceError::Open { kind, .. }) => match kind {
                OpenFailure::NotFound => ExitCodes::PORT_NOT_FOUND,
                OpenFailure::PermissionDenied => ExitCodes::PERMISSION_DENIED,
                OpenFailure::Busy => ExitCodes::DEVICE_BUSY,
                OpenFailure::Other => ExitCodes::CONNECTION_FAILED,
            },
            SessionError::OpenFailed(_) => ExitCodes::CONNECTION_FAILED,
            SessionError::WriteFailed(_) | SessionError::ReadError(_) => ExitCodes::DEVICE_LOST,
            SessionError::EnumerationFailed(_) => ExitCodes::ENUMERATION_FAILED,
            SessionError::InvalidBaudRate(_) | SessionError::InvalidInterval(_) => {
                ExitCodes::INVALID_ARGS
            }
            SessionError::NotConnected
            | SessionError::SelectionLocked(_)
            | SessionError::SessionClosed => ExitCodes::ERROR,
            SessionError::InvalidTransition { .. } | SessionError::TaskFailed(_) => {
                ExitCodes::INTERNAL_ERROR
            }
        };
        Self::Error(code, err.to_string())
    }
}

impl From<std::io::Error> for CliResult {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let code = match err.kind() {
            ErrorKind::PermissionDenied => ExitCodes::PERMISSION_DENIED,
            ErrorKind::TimedOut => ExitCodes::TIMEOUT,
            _ => ExitCodes::ERROR,
        };

        Self::Error(code, err.to_string())
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Invalid arguments",
        3 => "Connection failed",
        4 => "Timed out",
        7 => "Permission denied",
        8 => "Configuration error",
        11 => "Operation cancelled",
        12 => "Device lost",
        13 => "Device busy",
        14 => "Port not found",
        15 => "Ambiguous port selector",
        16 => "Port enumeration failed",
        127 => "Internal error",
        _ => "Unknown error",
    }
}
