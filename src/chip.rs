//! Target chip model.
//!
//! The bootloader reports a numeric target id during the connect
//! handshake; this module maps those ids onto the closed set of supported
//! chips and records the per-chip capabilities the session cares about.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Supported target chips, in protocol-engine target-id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Chip {
    /// ESP8266.
    Esp8266,
    /// ESP32.
    Esp32,
    /// ESP32-S2.
    Esp32S2,
    /// ESP32-C3.
    Esp32C3,
    /// ESP32-S3.
    Esp32S3,
    /// ESP32-C2.
    Esp32C2,
    /// ESP32-H4. Selectable by name, but its target id is still the
    /// engine's reserved slot and is rejected at detection.
    Esp32H4,
    /// ESP32-H2.
    Esp32H2,
    /// ESP32-C6.
    Esp32C6,
    /// ESP32-P4.
    Esp32P4,
}

impl Chip {
    /// All chips selectable by name.
    pub const ALL: [Self; 10] = [
        Self::Esp8266,
        Self::Esp32,
        Self::Esp32S2,
        Self::Esp32C3,
        Self::Esp32S3,
        Self::Esp32C2,
        Self::Esp32H4,
        Self::Esp32H2,
        Self::Esp32C6,
        Self::Esp32P4,
    ];

    /// Map a target id reported by the protocol engine to a chip.
    ///
    /// Id 6 is the engine's reserved slot and ids past the known range are
    /// rejected with [`Error::UnsupportedChip`].
    pub fn from_target_id(id: u32) -> Result<Self> {
        match id {
            0 => Ok(Self::Esp8266),
            1 => Ok(Self::Esp32),
            2 => Ok(Self::Esp32S2),
            3 => Ok(Self::Esp32C3),
            4 => Ok(Self::Esp32S3),
            5 => Ok(Self::Esp32C2),
            7 => Ok(Self::Esp32H2),
            8 => Ok(Self::Esp32C6),
            9 => Ok(Self::Esp32P4),
            _ => Err(Error::UnsupportedChip(id)),
        }
    }

    /// Chip name as used in textual options.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Esp8266 => "esp8266",
            Self::Esp32 => "esp32",
            Self::Esp32S2 => "esp32s2",
            Self::Esp32C3 => "esp32c3",
            Self::Esp32S3 => "esp32s3",
            Self::Esp32C2 => "esp32c2",
            Self::Esp32H4 => "esp32h4",
            Self::Esp32H2 => "esp32h2",
            Self::Esp32C6 => "esp32c6",
            Self::Esp32P4 => "esp32p4",
        }
    }

    /// Whether the chip supports a bootloader transmission-rate change.
    ///
    /// The ESP8266 ROM has no rate-change command; the link stays at the
    /// connect rate for that family.
    #[must_use]
    pub fn supports_rate_change(self) -> bool {
        !matches!(self, Self::Esp8266)
    }

    /// Whether the chip supports the post-write flash verify command.
    #[must_use]
    pub fn supports_verify(self) -> bool {
        !matches!(self, Self::Esp8266)
    }

    /// Parse a chip selection where `"auto"` means auto-detection.
    pub fn parse_selection(s: &str) -> Result<Option<Self>> {
        if s.eq_ignore_ascii_case("auto") {
            Ok(None)
        } else {
            s.parse().map(Some)
        }
    }
}

impl fmt::Display for Chip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Chip {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|chip| chip.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Config(format!("unknown chip: {s}")))
    }
}
