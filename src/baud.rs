//! Link-rate upgrade after connection.

use log::{info, warn};

use crate::config::{DEFAULT_BAUD, HIGHER_BAUD, SessionConfig};
use crate::error::{Error, Result};
use crate::loader::{Loader, LoaderIo, LoaderPort};
use crate::port::Port;
use crate::session::{Event, EventHook, emit};

/// Switch the target and the local link to [`HIGHER_BAUD`].
///
/// The remote side changes first, through the stub-aware or ROM-only
/// engine command depending on the configuration; its errors propagate
/// unchanged. A local reconfiguration failure after a successful remote
/// change cannot be rolled back and surfaces as
/// [`Error::BaudUpgradeFailed`].
pub(crate) fn upgrade<P: Port>(
    config: &SessionConfig,
    loader: &mut dyn Loader,
    io: &mut LoaderPort<P>,
    events: &mut EventHook,
) -> Result<()> {
    if config.use_stub {
        loader.change_transmission_rate_stub(io, DEFAULT_BAUD, HIGHER_BAUD)?;
    } else {
        loader.change_transmission_rate(io, HIGHER_BAUD)?;
    }

    io.set_baud_rate(HIGHER_BAUD).map_err(|err| {
        warn!("Local rate change failed: {err}");
        Error::BaudUpgradeFailed
    })?;

    info!("Changing baud rate to {HIGHER_BAUD}");
    emit(events, Event::BaudChanged { baud: HIGHER_BAUD });
    Ok(())
}
