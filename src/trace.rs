//! Transport byte tracing.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Direction of a traced transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Bytes received from the target.
    Read,
    /// Bytes sent to the target.
    Write,
}

/// Append-only hex dump of everything the transport moves.
///
/// Transfers are grouped into `--- READ ---` / `--- WRITE ---` sections
/// whenever the direction changes. Purely observational: recording
/// failures are swallowed and nothing here feeds back into control flow
/// or timing.
#[derive(Debug)]
pub struct TraceLog {
    out: BufWriter<File>,
    last: Option<Direction>,
}

impl TraceLog {
    /// Create (or truncate) a trace log at `path`.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            out: BufWriter::new(File::create(path)?),
            last: None,
        })
    }

    /// Default location: `trace.log` next to the running executable.
    #[must_use]
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_default()
            .join("trace.log")
    }

    /// Record one transfer.
    pub fn record(&mut self, direction: Direction, data: &[u8]) {
        if self.last != Some(direction) {
            self.last = Some(direction);
            let tag = match direction {
                Direction::Read => "READ",
                Direction::Write => "WRITE",
            };
            let _ = writeln!(self.out, "\n--- {tag} ---");
        }
        for byte in data {
            let _ = write!(self.out, "{byte:02x} ");
        }
        let _ = self.out.flush();
    }
}
