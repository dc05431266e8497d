use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GvcpError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Framing error: {0}")]
    Framing(String),

    #[error("Unexpected acknowledge: {0}")]
    Correlation(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("Invalid subnet mask: {0}")]
    InvalidSubnetMask(String),

    #[error("Invalid assignment: {0}")]
    InvalidAssignment(String),

    #[error("Cannot resolve device address: {0}")]
    Resolve(String),

    #[error("Device reported status 0x{0:04x}")]
    DeviceStatus(u16),
}

impl GvcpError {
    /// Errors tied to a single datagram. Receive loops drop the datagram
    /// and keep waiting instead of failing the call.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GvcpError::Framing(_) | GvcpError::Correlation(_))
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            GvcpError::Timeout(_) => 2,
            GvcpError::NotFound(_) => 3,
            _ => 1,
        }
    }
}
