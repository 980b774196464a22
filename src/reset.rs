//! DTR/RTS reset sequences.
//!
//! The serial control lines are wired to the target's reset and
//! boot-strap pins; toggling them lands the target in its ROM bootloader
//! or restarts the flashed firmware without a physical button. Line
//! levels below are logical: `true` means asserted.

use std::thread;
use std::time::Duration;

use log::{debug, info};

use crate::error::Result;
use crate::port::Port;

/// Hold time after asserting reset.
pub const RESET_HOLD_TIME: Duration = Duration::from_millis(100);

/// Hold time after asserting the boot-strap line.
pub const BOOT_HOLD_TIME: Duration = Duration::from_millis(50);

/// Assert the boot-strap pins and toggle reset to force the target into
/// its ROM bootloader.
pub(crate) fn enter_bootloader<P: Port + ?Sized>(port: &mut P) -> Result<()> {
    debug!("Entering bootloader via DTR/RTS");

    // Reset asserted, boot-strap released
    port.set_lines(false, true)?;
    thread::sleep(RESET_HOLD_TIME);

    // Boot-strap asserted, reset released
    port.set_lines(true, false)?;
    thread::sleep(BOOT_HOLD_TIME);

    // Back to the idle-asserted link state
    port.set_lines(true, true)?;

    Ok(())
}

/// Toggle DTR to restart the freshly flashed firmware.
pub(crate) fn hard_reset<P: Port + ?Sized>(port: &mut P) -> Result<()> {
    info!("Hard resetting via DTR pin...");
    port.set_dtr(false)?;
    thread::sleep(RESET_HOLD_TIME);
    port.set_dtr(true)
}
