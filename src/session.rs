//! End-to-end flash and erase sessions.

use log::{error, info, warn};

use crate::baud;
use crate::cancel::CancelToken;
use crate::chip::Chip;
use crate::config::{ResetAfterOperation, SessionConfig};
use crate::connect;
use crate::error::{Error, Result};
use crate::flash::{self, FLASH_WRITE_SIZE};
use crate::image::Segment;
use crate::loader::{Loader, LoaderIo, LoaderPort};
use crate::port::Port;
use crate::trace::TraceLog;

/// Progress of a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No operation started yet.
    Idle,
    /// Looking for a responding bootloader.
    Connecting,
    /// Raising the link rate.
    BaudUpgrading,
    /// Writing image `i` of the supplied batch.
    Flashing(usize),
    /// Erasing the entire flash.
    Erasing,
    /// Applying the post-operation reset.
    Resetting,
    /// Terminal: the operation completed.
    Done,
    /// Terminal: the operation failed with the contained reason.
    Failed(String),
    /// Terminal: the cancellation token was honored.
    Cancelled,
}

impl SessionState {
    /// Whether the session reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed(_) | Self::Cancelled)
    }
}

/// Discrete status notification.
///
/// Advisory and fire-and-forget: the session behaves identically with no
/// sink installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A connection attempt started.
    Connecting {
        /// Port name/path.
        port: String,
    },
    /// Handshake succeeded and the chip was validated.
    ChipDetected {
        /// Detected chip.
        chip: Chip,
    },
    /// The link now runs at a new rate.
    BaudChanged {
        /// New baud rate.
        baud: u32,
    },
    /// Span the flash-start command will erase.
    EraseRange {
        /// First erased address.
        start: u32,
        /// One past the last erased address (sector aligned).
        end: u32,
    },
    /// Cumulative progress crossed a 10 % boundary.
    WriteProgress {
        /// Address just written up to.
        addr: u32,
        /// `floor(100 * written / total)`.
        percent: u8,
    },
    /// The chip cannot verify; the written image went unchecked.
    VerifySkipped {
        /// Detected chip.
        chip: Chip,
    },
    /// One image was written (and verified where supported).
    SegmentWritten {
        /// Index into the supplied batch.
        index: usize,
    },
    /// The session finished successfully.
    Finished,
}

/// Installed event sink, if any.
pub(crate) type EventHook = Option<Box<dyn FnMut(Event) + Send>>;

/// Deliver `event` to the sink, if one is installed.
pub(crate) fn emit(hook: &mut EventHook, event: Event) {
    if let Some(sink) = hook.as_mut() {
        sink(event);
    }
}

/// One flash or erase operation against one target.
///
/// Owns the configuration, the protocol engine and the cancellation
/// token. The serial handle only exists inside a running operation and is
/// released on every exit path; nothing is process-global, so sessions on
/// distinct ports are independent.
///
/// All operations block the calling thread up to their own timeouts. Run
/// the session on a dedicated worker thread and keep a
/// [`cancel_token`](Session::cancel_token) clone to stop it from
/// elsewhere; cancellation is honored at the next checkpoint, never by
/// interrupting an in-flight call.
pub struct Session<L: Loader> {
    config: SessionConfig,
    loader: L,
    cancel: CancelToken,
    events: EventHook,
    state: SessionState,
    resolved_chip: Option<Chip>,
}

impl<L: Loader> Session<L> {
    /// Create a session that drives `loader`.
    pub fn new(config: SessionConfig, loader: L) -> Self {
        Self {
            config,
            loader,
            cancel: CancelToken::new(),
            events: None,
            state: SessionState::Idle,
            resolved_chip: None,
        }
    }

    /// Install an event sink.
    #[must_use]
    pub fn with_events<F>(mut self, sink: F) -> Self
    where
        F: FnMut(Event) + Send + 'static,
    {
        self.events = Some(Box::new(sink));
        self
    }

    /// Token that cancels this session from any thread.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Chip the session resolved to, once connected.
    #[must_use]
    pub fn chip(&self) -> Option<Chip> {
        self.resolved_chip
    }

    /// Access the protocol engine.
    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Mutable access to the protocol engine.
    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }

    /// Consume the session and return the protocol engine.
    pub fn into_loader(self) -> L {
        self.loader
    }

    /// Flash `segments` in order over the configured port.
    #[cfg(feature = "native")]
    pub fn flash(&mut self, segments: &[Segment<'_>]) -> Result<()> {
        match self.scan_candidates() {
            Ok(candidates) => self.flash_with(&candidates, open_native, segments),
            Err(err) => self.finish(Err(err)),
        }
    }

    /// Erase the entire flash over the configured port.
    #[cfg(feature = "native")]
    pub fn erase(&mut self) -> Result<()> {
        match self.scan_candidates() {
            Ok(candidates) => self.erase_with(&candidates, open_native),
            Err(err) => self.finish(Err(err)),
        }
    }

    #[cfg(feature = "native")]
    fn scan_candidates(&self) -> Result<Vec<String>> {
        if self.config.port.is_some() {
            return Ok(Vec::new());
        }
        Ok(crate::port::available_ports()?
            .into_iter()
            .map(|p| p.name)
            .collect())
    }

    /// Flash through an explicit candidate list and port opener.
    ///
    /// Transport-agnostic entry point; useful for tests and custom port
    /// implementations.
    pub fn flash_with<P, F>(
        &mut self,
        candidates: &[String],
        open: F,
        segments: &[Segment<'_>],
    ) -> Result<()>
    where
        P: Port,
        F: FnMut(&str, u32) -> Result<P>,
    {
        let result = self.run_flash(candidates, open, segments);
        self.finish(result)
    }

    /// Erase through an explicit candidate list and port opener.
    pub fn erase_with<P, F>(&mut self, candidates: &[String], open: F) -> Result<()>
    where
        P: Port,
        F: FnMut(&str, u32) -> Result<P>,
    {
        let result = self.run_erase(candidates, open);
        self.finish(result)
    }

    fn run_flash<P, F>(
        &mut self,
        candidates: &[String],
        open: F,
        segments: &[Segment<'_>],
    ) -> Result<()>
    where
        P: Port,
        F: FnMut(&str, u32) -> Result<P>,
    {
        let (mut io, chip) = self.establish(candidates, open)?;

        if self.config.wants_baud_upgrade() && chip.supports_rate_change() {
            self.state = SessionState::BaudUpgrading;
            baud::upgrade(&self.config, &mut self.loader, &mut io, &mut self.events)?;
        }

        for (index, segment) in segments.iter().enumerate() {
            self.state = SessionState::Flashing(index);
            flash::write_segment(
                &mut self.loader,
                &mut io,
                segment,
                FLASH_WRITE_SIZE,
                chip,
                &self.cancel,
                &mut self.events,
            )?;
            emit(&mut self.events, Event::SegmentWritten { index });
        }

        self.reset_stage(&mut io);
        Ok(())
    }

    fn run_erase<P, F>(&mut self, candidates: &[String], open: F) -> Result<()>
    where
        P: Port,
        F: FnMut(&str, u32) -> Result<P>,
    {
        let (mut io, _chip) = self.establish(candidates, open)?;

        self.state = SessionState::Erasing;
        self.cancel.check()?;
        info!("Erasing flash...");
        self.loader.erase_flash(&mut io)?;

        self.reset_stage(&mut io);
        Ok(())
    }

    fn establish<P, F>(
        &mut self,
        candidates: &[String],
        open: F,
    ) -> Result<(LoaderPort<P>, Chip)>
    where
        P: Port,
        F: FnMut(&str, u32) -> Result<P>,
    {
        self.state = SessionState::Connecting;

        let trace = if self.config.trace {
            match TraceLog::create(TraceLog::default_path()) {
                Ok(log) => Some(log),
                Err(err) => {
                    warn!("Cannot open trace log: {err}");
                    None
                },
            }
        } else {
            None
        };

        let (io, chip) = connect::negotiate(
            &self.config,
            &mut self.loader,
            &self.cancel,
            &mut self.events,
            trace,
            candidates,
            open,
        )?;
        self.resolved_chip = Some(chip);
        Ok((io, chip))
    }

    /// Post-operation reset. Failures are logged, never escalated; the
    /// session still completes.
    fn reset_stage<P: Port>(&mut self, io: &mut LoaderPort<P>) {
        self.state = SessionState::Resetting;
        if self.config.after == ResetAfterOperation::HardReset {
            if let Err(err) = io.reset_target() {
                warn!("Hard reset failed: {err}");
            }
        }
        emit(&mut self.events, Event::Finished);
        info!("Done");
    }

    fn finish(&mut self, result: Result<()>) -> Result<()> {
        self.state = match &result {
            Ok(()) => SessionState::Done,
            Err(Error::Cancelled) => {
                info!("Cancelled");
                SessionState::Cancelled
            },
            Err(err) => {
                error!("{err}");
                SessionState::Failed(err.to_string())
            },
        };
        result
    }
}

#[cfg(feature = "native")]
fn open_native(name: &str, baud: u32) -> Result<crate::port::SerialPort> {
    crate::port::SerialPort::open(name, baud)
}
