//! Connection negotiation.
//!
//! Finds a port with a responding bootloader, reads back the detected
//! chip and validates it against the configuration. Candidate ports and
//! the opener are injected so the scan works over any [`Port`]
//! implementation.

use log::{debug, info};

use crate::cancel::CancelToken;
use crate::chip::Chip;
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::loader::{Loader, LoaderIo, LoaderPort};
use crate::port::Port;
use crate::session::{Event, EventHook, emit};
use crate::trace::TraceLog;

/// Establish a verified bootloader session.
///
/// With a concrete configured port the first failure is terminal. In auto
/// mode every candidate gets one open/enter/handshake attempt and the
/// first successful handshake wins; exhausting the list yields
/// [`Error::NoTargetFound`]. After the handshake the detected chip is
/// validated once — a mismatch ends the session, it never resumes the
/// scan.
pub(crate) fn negotiate<P, F>(
    config: &SessionConfig,
    loader: &mut dyn Loader,
    cancel: &CancelToken,
    events: &mut EventHook,
    mut trace: Option<TraceLog>,
    candidates: &[String],
    mut open: F,
) -> Result<(LoaderPort<P>, Chip)>
where
    P: Port,
    F: FnMut(&str, u32) -> Result<P>,
{
    let baud = config.connect_baud();

    let io = if let Some(name) = config.port.as_deref() {
        // Port defined, this must work
        cancel.check()?;
        info!("Connecting to {name}");
        emit(
            events,
            Event::Connecting {
                port: name.to_string(),
            },
        );
        let mut io = LoaderPort::new(open(name, baud)?, config.before, trace);
        io.enter_bootloader()?;
        loader.connect(&mut io, config.use_stub)?;
        io
    } else {
        // Try all candidates and see if one opens and connects
        info!("Found {} serial ports", candidates.len());
        let mut connected = None;
        for name in candidates {
            cancel.check()?;
            info!("Connecting to {name}");
            emit(events, Event::Connecting { port: name.clone() });

            let port = match open(name, baud) {
                Ok(port) => port,
                Err(err) => {
                    debug!("Cannot open {name}: {err}");
                    continue;
                },
            };

            let mut io = LoaderPort::new(port, config.before, trace.take());
            let attempt = match io.enter_bootloader() {
                Ok(()) => loader.connect(&mut io, config.use_stub),
                Err(err) => Err(err),
            };
            match attempt {
                Ok(()) => {
                    connected = Some(io);
                    break;
                },
                Err(err) => {
                    debug!("Cannot connect to {name}: {err}");
                    trace = io.into_trace();
                },
            }
        }
        connected.ok_or(Error::NoTargetFound)?
    };

    let detected = Chip::from_target_id(loader.target())?;
    if let Some(requested) = config.chip {
        if requested != detected {
            return Err(Error::ChipMismatch {
                requested,
                detected,
            });
        }
    }
    info!("Found {detected}");
    emit(events, Event::ChipDetected { chip: detected });

    cancel.check()?;

    Ok((io, detected))
}
