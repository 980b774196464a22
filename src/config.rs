//! Session configuration.

use std::fmt;
use std::str::FromStr;

use crate::chip::Chip;
use crate::error::Error;

/// Baud rate used for the initial connection when none is requested.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Baud rate the link is upgraded to when the caller asked for `auto`.
pub const HIGHER_BAUD: u32 = 460_800;

/// What to do before connecting to the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResetBeforeOperation {
    /// Toggle the DTR/RTS bootstrap sequence to force the ROM bootloader.
    #[default]
    DefaultReset,
    /// Assume the caller already put the target in bootloader mode.
    NoReset,
}

impl fmt::Display for ResetBeforeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DefaultReset => f.write_str("default_reset"),
            Self::NoReset => f.write_str("no_reset"),
        }
    }
}

impl FromStr for ResetBeforeOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "default_reset" => Ok(Self::DefaultReset),
            "no_reset" => Ok(Self::NoReset),
            _ => Err(Error::Config(format!("unknown pre-action: {s}"))),
        }
    }
}

/// What to do after the operation is finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResetAfterOperation {
    /// Toggle the reset line to boot the freshly flashed firmware.
    #[default]
    HardReset,
    /// Leave the target in the bootloader.
    NoReset,
}

impl fmt::Display for ResetAfterOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardReset => f.write_str("hard_reset"),
            Self::NoReset => f.write_str("no_reset"),
        }
    }
}

impl FromStr for ResetAfterOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "hard_reset" => Ok(Self::HardReset),
            "no_reset" => Ok(Self::NoReset),
            _ => Err(Error::Config(format!("unknown post-action: {s}"))),
        }
    }
}

/// Immutable inputs of one flash or erase invocation.
///
/// `None` fields mean `auto`: scan all candidate ports, detect the chip,
/// connect at [`DEFAULT_BAUD`] and upgrade to [`HIGHER_BAUD`] where the
/// chip allows it.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Requested chip; `None` adopts whatever the bootloader reports.
    pub chip: Option<Chip>,
    /// Requested port; `None` scans all candidate ports.
    pub port: Option<String>,
    /// Requested baud; `None` connects at [`DEFAULT_BAUD`] and upgrades.
    pub baud: Option<u32>,
    /// Pre-connect action.
    pub before: ResetBeforeOperation,
    /// Post-operation action.
    pub after: ResetAfterOperation,
    /// Upload the flasher stub instead of talking to the ROM directly.
    pub use_stub: bool,
    /// Mirror transport bytes to the trace log.
    pub trace: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chip: None,
            port: None,
            baud: None,
            before: ResetBeforeOperation::default(),
            after: ResetAfterOperation::default(),
            use_stub: true,
            trace: false,
        }
    }
}

impl SessionConfig {
    /// Create an all-auto configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a specific chip.
    #[must_use]
    pub fn with_chip(mut self, chip: Chip) -> Self {
        self.chip = Some(chip);
        self
    }

    /// Use a specific port instead of scanning.
    #[must_use]
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// Use a fixed baud rate; disables the automatic upgrade.
    #[must_use]
    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = Some(baud);
        self
    }

    /// Set the pre-connect action.
    #[must_use]
    pub fn with_before(mut self, before: ResetBeforeOperation) -> Self {
        self.before = before;
        self
    }

    /// Set the post-operation action.
    #[must_use]
    pub fn with_after(mut self, after: ResetAfterOperation) -> Self {
        self.after = after;
        self
    }

    /// Enable or disable the flasher stub.
    #[must_use]
    pub fn with_stub(mut self, use_stub: bool) -> Self {
        self.use_stub = use_stub;
        self
    }

    /// Enable or disable transport tracing.
    #[must_use]
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Baud rate the connection is opened at.
    #[must_use]
    pub fn connect_baud(&self) -> u32 {
        self.baud.unwrap_or(DEFAULT_BAUD)
    }

    /// Whether the link rate should be raised after connecting.
    #[must_use]
    pub fn wants_baud_upgrade(&self) -> bool {
        self.baud.is_none()
    }
}
