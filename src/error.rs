use std::io;
use thiserror::Error;

/// Errors surfaced by the protocol engine and its consumers
#[derive(Debug, Error)]
pub enum AdbError {
    /// The transport could not be opened, or a read/write on it failed
    #[error("ADB connection error: {0}")]
    Connection(io::Error),

    /// The remote replied FAIL, or a malformed frame was received
    #[error("ADB protocol error: {0}")]
    Protocol(String),

    #[error("No device found matching serial: {0}")]
    DeviceNotFound(String),

    /// A blocking call exceeded its deadline; the socket must be discarded
    #[error("Operation timed out")]
    Timeout,

    #[error("Sync chunk of {size} bytes exceeds the maximum of {max} bytes")]
    BufferOverrun { size: usize, max: usize },

    #[error("Remote path is {length} bytes long (max: {max})")]
    RemotePathTooLong { length: usize, max: usize },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Request of {0} bytes does not fit the 4 digit length field")]
    RequestTooLong(usize),

    #[error("Invalid forward spec: {0}")]
    InvalidForwardSpec(String),

    #[error("Sync session is closed")]
    SessionClosed,

    #[error("Command not found: {0}")]
    CommandNotFound(String),

    #[error("No such file or directory: {0}")]
    FileNotFound(String),

    #[error("Unknown option: {0}")]
    UnknownOption(String),

    #[error("Command aborted: {0}")]
    CommandAborting(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Starting or stopping the local server process failed
    #[error("ADB server error: {0}")]
    Server(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No devices found")]
    NoDevicesFound,

    #[error("Multiple devices connected; pick one with --serial")]
    DeviceIdRequired,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local filesystem error during a transfer
    #[error("Local I/O error: {0}")]
    Io(io::Error),
}

impl AdbError {
    /// Map a socket-side I/O error onto the taxonomy.
    pub fn from_socket(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => AdbError::Timeout,
            _ => AdbError::Connection(err),
        }
    }

    /// Map a local file I/O error onto the taxonomy.
    pub fn from_local(err: io::Error) -> Self {
        AdbError::Io(err)
    }

    /// Whether a fresh transport may succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        matches!(self, AdbError::Connection(_) | AdbError::Timeout)
    }
}

impl From<io::Error> for AdbError {
    fn from(err: io::Error) -> Self {
        AdbError::from_socket(err)
    }
}

pub type Result<T> = std::result::Result<T, AdbError>;
