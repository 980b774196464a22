//! Mock transports and engines shared by the unit tests.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use crate::cancel::CancelToken;
use crate::config::DEFAULT_BAUD;
use crate::error::{Error, Result};
use crate::loader::{Loader, LoaderIo};
use crate::port::Port;
use crate::session::{Event, EventHook};

/// In-memory port: scripted input, recorded output and line changes.
pub(crate) struct MockPort {
    pub(crate) name: String,
    pub(crate) rx: VecDeque<u8>,
    pub(crate) tx: Vec<u8>,
    /// `(dtr, rts)` after each control-line change.
    pub(crate) lines: Vec<(bool, bool)>,
    pub(crate) dtr: bool,
    pub(crate) rts: bool,
    pub(crate) baud: u32,
    /// Simulated bytes stuck in the OS send buffer.
    pub(crate) pending_write: usize,
    /// Accept at most this many bytes per write call.
    pub(crate) accept: Option<usize>,
}

impl MockPort {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rx: VecDeque::new(),
            tx: Vec::new(),
            lines: Vec::new(),
            dtr: true,
            rts: true,
            baud: DEFAULT_BAUD,
            pending_write: 0,
            accept: None,
        }
    }

    pub(crate) fn with_input(mut self, data: &[u8]) -> Self {
        self.rx.extend(data);
        self
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.rx.len());
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        for slot in &mut buf[..n] {
            *slot = self.rx.pop_front().expect("length checked above");
        }
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.accept.map_or(buf.len(), |max| buf.len().min(max));
        self.tx.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Port for MockPort {
    fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        self.baud = baud;
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.baud
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        Ok(self.rx.len())
    }

    fn bytes_to_write(&mut self) -> Result<usize> {
        Ok(self.pending_write)
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        self.dtr = level;
        self.lines.push((self.dtr, self.rts));
        Ok(())
    }

    fn set_rts(&mut self, level: bool) -> Result<()> {
        self.rts = level;
        self.lines.push((self.dtr, self.rts));
        Ok(())
    }

    fn set_lines(&mut self, dtr: bool, rts: bool) -> Result<()> {
        self.dtr = dtr;
        self.rts = rts;
        self.lines.push((dtr, rts));
        Ok(())
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.rx.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Opener for mock ports, shaped like `SerialPort::open`.
pub(crate) fn open_mock(name: &str, baud: u32) -> Result<MockPort> {
    let mut port = MockPort::new(name);
    port.baud = baud;
    Ok(port)
}

/// Opener that records every attempted port name.
pub(crate) fn recording_opener(
    attempted: &mut Vec<String>,
) -> impl FnMut(&str, u32) -> Result<MockPort> + '_ {
    move |name, baud| {
        attempted.push(name.to_string());
        open_mock(name, baud)
    }
}

/// Event sink capturing everything it sees.
pub(crate) fn collect_events() -> (EventHook, Arc<Mutex<Vec<Event>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let hook: EventHook = Some(Box::new(move |event| {
        sink.lock().expect("event sink poisoned").push(event);
    }));
    (hook, seen)
}

/// Scripted protocol engine.
pub(crate) struct MockLoader {
    /// Outcome per connect attempt; exhausted entries succeed.
    pub(crate) connect_results: VecDeque<Result<()>>,
    /// Target id reported after a successful handshake.
    pub(crate) target_id: u32,
    pub(crate) connects: usize,
    /// `(offset, size, block_size)` per flash-start command.
    pub(crate) starts: Vec<(u32, u32, u32)>,
    pub(crate) blocks: Vec<Vec<u8>>,
    pub(crate) verified: usize,
    pub(crate) erased: usize,
    /// `(stub current rate, new rate)` per rate-change command.
    pub(crate) rate_changes: Vec<(Option<u32>, u32)>,
    pub(crate) fail_rate_change: bool,
    pub(crate) fail_verify: bool,
    /// Fail the flash-write once this many blocks went through.
    pub(crate) fail_block_at: Option<usize>,
    /// Set the token once this many blocks went through.
    pub(crate) cancel_after: Option<(usize, CancelToken)>,
}

impl MockLoader {
    pub(crate) fn new(target_id: u32) -> Self {
        Self {
            connect_results: VecDeque::new(),
            target_id,
            connects: 0,
            starts: Vec::new(),
            blocks: Vec::new(),
            verified: 0,
            erased: 0,
            rate_changes: Vec::new(),
            fail_rate_change: false,
            fail_verify: false,
            fail_block_at: None,
            cancel_after: None,
        }
    }

    pub(crate) fn with_connect_results(mut self, results: Vec<Result<()>>) -> Self {
        self.connect_results = results.into();
        self
    }
}

impl Loader for MockLoader {
    fn connect(&mut self, _io: &mut dyn LoaderIo, _use_stub: bool) -> Result<()> {
        self.connects += 1;
        self.connect_results.pop_front().unwrap_or(Ok(()))
    }

    fn target(&self) -> u32 {
        self.target_id
    }

    fn change_transmission_rate(&mut self, _io: &mut dyn LoaderIo, baud: u32) -> Result<()> {
        if self.fail_rate_change {
            return Err(Error::TimedOut);
        }
        self.rate_changes.push((None, baud));
        Ok(())
    }

    fn change_transmission_rate_stub(
        &mut self,
        _io: &mut dyn LoaderIo,
        current: u32,
        baud: u32,
    ) -> Result<()> {
        if self.fail_rate_change {
            return Err(Error::TimedOut);
        }
        self.rate_changes.push((Some(current), baud));
        Ok(())
    }

    fn flash_start(
        &mut self,
        _io: &mut dyn LoaderIo,
        offset: u32,
        size: u32,
        block_size: u32,
    ) -> Result<()> {
        self.starts.push((offset, size, block_size));
        Ok(())
    }

    fn flash_write(&mut self, _io: &mut dyn LoaderIo, block: &[u8]) -> Result<()> {
        if self.fail_block_at == Some(self.blocks.len()) {
            return Err(Error::FlashWriteFailed("scripted failure".into()));
        }
        self.blocks.push(block.to_vec());
        if let Some((after, token)) = &self.cancel_after {
            if self.blocks.len() == *after {
                token.cancel();
            }
        }
        Ok(())
    }

    fn flash_verify(&mut self, _io: &mut dyn LoaderIo) -> Result<()> {
        if self.fail_verify {
            return Err(Error::VerifyMismatch);
        }
        self.verified += 1;
        Ok(())
    }

    fn erase_flash(&mut self, _io: &mut dyn LoaderIo) -> Result<()> {
        self.erased += 1;
        Ok(())
    }
}
