//! # espburn
//!
//! Session and transport layer for driving ESP-series ROM/stub serial
//! bootloaders.
//!
//! The crate owns everything around the wire protocol, not the protocol
//! itself: entering the bootloader via DTR/RTS toggling, discovering and
//! validating the target chip across serial ports, upgrading the link
//! rate, streaming firmware images in fixed-size blocks with progress
//! reporting and cooperative cancellation, and resetting the target
//! afterwards. The bootloader command set (SLIP framing, opcodes,
//! checksums) is supplied by an external engine implementing [`Loader`];
//! the engine performs all of its I/O through the [`LoaderIo`] capability
//! object it is handed on every call.
//!
//! ## Supported Platforms
//!
//! - **Native** (default): Linux, macOS, Windows via the `serialport`
//!   crate
//! - Any other transport through the [`Port`] trait
//!
//! ## Features
//!
//! - `native` (default): native serial port support
//! - `serde`: serialization support for the plain data types
//!
//! ## Example
//!
//! ```rust,no_run
//! use espburn::{Segment, Session, SessionConfig};
//!
//! fn flash(engine: impl espburn::Loader) -> espburn::Result<()> {
//!     let config = SessionConfig::new().with_port("/dev/ttyUSB0");
//!     let app = std::fs::read("app.bin")?;
//!
//!     let mut session = Session::new(config, engine)
//!         .with_events(|event| println!("{event:?}"));
//!     session.flash(&[Segment::new(0x1000, &app)])
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod baud;
pub mod cancel;
pub mod chip;
pub mod config;
mod connect;
pub mod error;
pub mod flash;
pub mod image;
pub mod loader;
pub mod port;
pub mod reset;
pub mod session;
pub mod timer;
pub mod trace;

#[cfg(test)]
pub(crate) mod testutil;

// Re-exports for convenience
// Native-specific re-exports
#[cfg(feature = "native")]
pub use port::{PortInfo, SerialPort, available_ports};
pub use {
    cancel::CancelToken,
    chip::Chip,
    config::{
        DEFAULT_BAUD, HIGHER_BAUD, ResetAfterOperation, ResetBeforeOperation, SessionConfig,
    },
    error::{Error, Result},
    flash::{FLASH_SECTOR_SIZE, FLASH_WRITE_SIZE, PADDING_BYTE},
    image::Segment,
    loader::{Loader, LoaderIo, LoaderPort},
    port::Port,
    session::{Event, Session, SessionState},
    timer::Deadline,
    trace::{Direction, TraceLog},
};
