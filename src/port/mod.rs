//! Serial transport abstraction.
//!
//! Separates byte-level I/O from the session logic so the negotiator and
//! flash writer run against any transport: the `serialport`-backed
//! implementation in [`native`] (default `native` feature) or test
//! doubles. The protocol engine never sees this trait directly; it talks
//! to the [`LoaderPort`](crate::loader::LoaderPort) adapter built on top
//! of it.

#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};

use crate::error::Result;

/// Byte-level serial transport with control-line access.
pub trait Port: Read + Write + Send {
    /// Change the link baud rate.
    fn set_baud_rate(&mut self, baud: u32) -> Result<()>;

    /// Current link baud rate.
    fn baud_rate(&self) -> u32;

    /// Bytes currently buffered for reading.
    fn bytes_to_read(&mut self) -> Result<usize>;

    /// Bytes still queued in the OS send buffer.
    fn bytes_to_write(&mut self) -> Result<usize>;

    /// Set the DTR line level.
    fn set_dtr(&mut self, level: bool) -> Result<()>;

    /// Set the RTS line level.
    fn set_rts(&mut self, level: bool) -> Result<()>;

    /// Set both control lines. Both lines have reached their target state
    /// when the call returns.
    fn set_lines(&mut self, dtr: bool, rts: bool) -> Result<()> {
        self.set_dtr(dtr)?;
        self.set_rts(rts)
    }

    /// Discard buffered input and output.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Port name/path.
    fn name(&self) -> &str;
}

// Re-export the native implementation for convenience
#[cfg(feature = "native")]
pub use native::{PortInfo, SerialPort, available_ports};
