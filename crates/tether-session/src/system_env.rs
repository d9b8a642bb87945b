//! Production Environment implementation using the system clock.

use std::time::{SystemTime, UNIX_EPOCH};

use tether_core::Environment;

/// Production environment reading wall-clock time.
///
/// A clock set before 1970 reads as the epoch; message ids stay monotonic
/// regardless.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::disallowed_methods)]
    fn unix_nanos(&self) -> u128 {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or_default()
    }
}
