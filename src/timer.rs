//! Deadline tracking for blocking operations.

use std::time::{Duration, Instant};

/// A monotonic point in time a blocking operation must finish by.
///
/// Each blocking transport call arms its own deadline on entry; deadlines
/// are never shared between operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Instant);

impl Deadline {
    /// Deadline `timeout` from now.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    /// An already-expired deadline.
    #[must_use]
    pub fn elapsed() -> Self {
        Self(Instant::now())
    }

    /// Whether the deadline has passed.
    #[must_use]
    pub fn expired(&self) -> bool {
        Instant::now() >= self.0
    }

    /// Time left, zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }
}
