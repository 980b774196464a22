//! Protocol-engine boundary and the transport adapter behind it.
//!
//! The bootloader wire protocol (SLIP framing, command opcodes,
//! checksums) lives in an external engine. The session drives it through
//! [`Loader`]; the engine performs all of its I/O, delays and timeout
//! bookkeeping through the [`LoaderIo`] capability object passed into
//! every call. [`LoaderPort`] is the [`Port`]-backed implementation of
//! that capability and owns the serial handle for the session's lifetime.

use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use crate::config::ResetBeforeOperation;
use crate::error::{Error, Result};
use crate::port::Port;
use crate::reset;
use crate::timer::Deadline;
use crate::trace::{Direction, TraceLog};

/// Sleep granularity while polling the OS buffers against a deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Capability object handed to the protocol engine.
pub trait LoaderIo {
    /// Read exactly `buf.len()` bytes.
    ///
    /// Fails with [`Error::TimedOut`] if the bytes do not arrive within
    /// `timeout`; never succeeds with a short read.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()>;

    /// Write all of `data` and wait until the OS send buffer has drained,
    /// or fail with [`Error::TimedOut`].
    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<()>;

    /// Block for `duration`.
    fn delay(&mut self, duration: Duration);

    /// Arm the engine-visible operation timer.
    fn start_timer(&mut self, duration: Duration);

    /// Time left on the operation timer, zero once elapsed.
    fn remaining_time(&self) -> Duration;

    /// Run the configured enter-bootloader sequence, if any.
    fn enter_bootloader(&mut self) -> Result<()>;

    /// Toggle the reset line to restart the target.
    fn reset_target(&mut self) -> Result<()>;

    /// Reconfigure the local link rate.
    fn set_baud_rate(&mut self, baud: u32) -> Result<()>;
}

/// Command surface of the external bootloader-protocol engine.
///
/// One instance serves one session. [`target`](Loader::target) is only
/// meaningful after a successful [`connect`](Loader::connect).
pub trait Loader {
    /// Perform the bootloader connect handshake.
    fn connect(&mut self, io: &mut dyn LoaderIo, use_stub: bool) -> Result<()>;

    /// Numeric target id the bootloader reported during the handshake.
    fn target(&self) -> u32;

    /// Change the target's transmission rate (ROM-only variant).
    fn change_transmission_rate(&mut self, io: &mut dyn LoaderIo, baud: u32) -> Result<()>;

    /// Change the target's transmission rate through the stub.
    fn change_transmission_rate_stub(
        &mut self,
        io: &mut dyn LoaderIo,
        current: u32,
        baud: u32,
    ) -> Result<()>;

    /// Announce an image: flash offset, true image size, block size.
    fn flash_start(
        &mut self,
        io: &mut dyn LoaderIo,
        offset: u32,
        size: u32,
        block_size: u32,
    ) -> Result<()>;

    /// Transmit one block.
    ///
    /// Blocks always arrive at the full block size; the tail of the final
    /// block is `0xFF` padding past the image size announced in
    /// [`flash_start`](Loader::flash_start).
    fn flash_write(&mut self, io: &mut dyn LoaderIo, block: &[u8]) -> Result<()>;

    /// Verify the image written since [`flash_start`](Loader::flash_start).
    fn flash_verify(&mut self, io: &mut dyn LoaderIo) -> Result<()>;

    /// Erase the entire flash.
    fn erase_flash(&mut self, io: &mut dyn LoaderIo) -> Result<()>;
}

/// Transport adapter between one open port and the protocol engine.
///
/// Owns the port for the lifetime of a session; dropping the adapter
/// closes the device on every exit path. When tracing is enabled every
/// successful transfer is mirrored to the trace log.
pub struct LoaderPort<P: Port> {
    port: P,
    before: ResetBeforeOperation,
    timer: Deadline,
    trace: Option<TraceLog>,
}

impl<P: Port> LoaderPort<P> {
    /// Wrap an open port.
    pub fn new(port: P, before: ResetBeforeOperation, trace: Option<TraceLog>) -> Self {
        Self {
            port,
            before,
            timer: Deadline::elapsed(),
            trace,
        }
    }

    /// Access the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Close the port, handing the trace log back for reuse.
    pub(crate) fn into_trace(self) -> Option<TraceLog> {
        self.trace
    }

    fn record(&mut self, direction: Direction, data: &[u8]) {
        if let Some(trace) = self.trace.as_mut() {
            trace.record(direction, data);
        }
    }
}

impl<P: Port> LoaderIo for LoaderPort<P> {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()> {
        let deadline = Deadline::after(timeout);
        while self.port.bytes_to_read()? < buf.len() {
            if deadline.expired() {
                return Err(Error::TimedOut);
            }
            thread::sleep(POLL_INTERVAL);
        }
        self.port.read_exact(buf)?;
        self.record(Direction::Read, buf);
        Ok(())
    }

    fn write(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        let deadline = Deadline::after(timeout);
        let written = self.port.write(data)?;
        if written != data.len() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                "serial port did not accept the whole write",
            )));
        }
        while self.port.bytes_to_write()? > 0 {
            if deadline.expired() {
                return Err(Error::TimedOut);
            }
            thread::sleep(POLL_INTERVAL);
        }
        self.record(Direction::Write, data);
        Ok(())
    }

    fn delay(&mut self, duration: Duration) {
        thread::sleep(duration);
    }

    fn start_timer(&mut self, duration: Duration) {
        self.timer = Deadline::after(duration);
    }

    fn remaining_time(&self) -> Duration {
        self.timer.remaining()
    }

    fn enter_bootloader(&mut self) -> Result<()> {
        match self.before {
            ResetBeforeOperation::DefaultReset => reset::enter_bootloader(&mut self.port),
            ResetBeforeOperation::NoReset => Ok(()),
        }
    }

    fn reset_target(&mut self) -> Result<()> {
        reset::hard_reset(&mut self.port)
    }

    fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        self.port.set_baud_rate(baud)
    }
}
