//! Native serial port implementation using the `serialport` crate.

use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

use log::trace;
use serialport::ClearBuffer;

use crate::error::{Error, Result};
use crate::port::Port;
use crate::reset::RESET_HOLD_TIME;

/// Blocking-read granularity of the underlying handle. Callers poll
/// [`Port::bytes_to_read`] before reading, so this only bounds stray
/// reads.
const PORT_TIMEOUT: Duration = Duration::from_millis(10);

/// Serial port opened for a bootloader session.
pub struct SerialPort {
    inner: Box<dyn serialport::SerialPort>,
    name: String,
    baud: u32,
}

impl SerialPort {
    /// Open `name` at `baud` with the bootloader link settings: 8 data
    /// bits, no parity, one stop bit, software flow control.
    ///
    /// Both control lines are asserted afterwards, the idle state the
    /// enter-bootloader sequence starts from. On any failure the device
    /// is closed again; no partially configured handle escapes.
    pub fn open(name: &str, baud: u32) -> Result<Self> {
        let inner = serialport::new(name, baud)
            .timeout(PORT_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::Software)
            .open()
            .map_err(|source| Error::Open {
                port: name.to_string(),
                source,
            })?;

        let mut port = Self {
            inner,
            name: name.to_string(),
            baud,
        };

        // DTR and RTS both asserted, then let the lines settle.
        if let Err(err) = port.set_lines(true, true) {
            return Err(match err {
                Error::Serial(source) => Error::Configure {
                    port: name.to_string(),
                    source,
                },
                other => other,
            });
        }
        thread::sleep(RESET_HOLD_TIME);

        Ok(port)
    }
}

impl Port for SerialPort {
    fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        self.inner.set_baud_rate(baud)?;
        self.baud = baud;
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.baud
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        Ok(self.inner.bytes_to_read()? as usize)
    }

    fn bytes_to_write(&mut self) -> Result<usize> {
        Ok(self.inner.bytes_to_write()? as usize)
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        trace!("Setting DTR to {level}");
        self.inner.write_data_terminal_ready(level)?;
        Ok(())
    }

    fn set_rts(&mut self, level: bool) -> Result<()> {
        trace!("Setting RTS to {level}");
        self.inner.write_request_to_send(level)?;
        Ok(())
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.inner.clear(ClearBuffer::All)?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Description of a detected serial port.
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial_number: Option<String>,
}

/// List serial ports suitable for a connection attempt.
///
/// The host's list is filtered to not contain virtual ports: entries
/// without a product description never host a target.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(Error::Serial)?;

    Ok(ports
        .into_iter()
        .filter_map(|p| match p.port_type {
            serialport::SerialPortType::UsbPort(info)
                if info.product.as_deref().is_some_and(|s| !s.is_empty()) =>
            {
                Some(PortInfo {
                    name: p.port_name,
                    vid: Some(info.vid),
                    pid: Some(info.pid),
                    manufacturer: info.manufacturer,
                    product: info.product,
                    serial_number: info.serial_number,
                })
            },
            _ => None,
        })
        .collect())
}
