//! Error types for espburn.

use std::io;
use thiserror::Error;

use crate::chip::Chip;

/// Result type for espburn operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for espburn operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, trace file).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Opening the serial device failed.
    #[cfg(feature = "native")]
    #[error("Cannot open {port}: {source}")]
    Open {
        /// Port name/path.
        port: String,
        /// Underlying serial port error.
        source: serialport::Error,
    },

    /// Configuring the freshly opened serial device failed.
    #[cfg(feature = "native")]
    #[error("Cannot configure {port}: {source}")]
    Configure {
        /// Port name/path.
        port: String,
        /// Underlying serial port error.
        source: serialport::Error,
    },

    /// A read or write deadline elapsed.
    #[error("Timeout elapsed")]
    TimedOut,

    /// The bootloader did not answer the connect handshake.
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// The auto-port scan exhausted all candidates.
    #[error("No serial port with a responding target found")]
    NoTargetFound,

    /// The bootloader reported an unknown or reserved chip id.
    #[error("Unsupported chip (target id {0})")]
    UnsupportedChip(u32),

    /// Requested and detected chips differ.
    #[error("Selected target {requested}, but found {detected}")]
    ChipMismatch {
        /// Chip the caller asked for.
        requested: Chip,
        /// Chip the bootloader reported.
        detected: Chip,
    },

    /// The local link could not follow a remote rate change.
    #[error("Cannot change baud rate")]
    BaudUpgradeFailed,

    /// Writing a flash block failed.
    #[error("Writing flash failed: {0}")]
    FlashWriteFailed(String),

    /// Post-write verification did not match the written image.
    #[error("Flash verification mismatch")]
    VerifyMismatch,

    /// The operation was cancelled via the session's token.
    #[error("Cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
