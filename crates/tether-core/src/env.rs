//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from the wall clock. Message ids and timestamps
//! come from here, so tests can pin them and production uses system time.

/// Abstract environment providing wall-clock time.
///
/// # Invariants
///
/// Implementations should not go backwards within one process, but callers
/// must not rely on it: message ids are forced monotonic by
/// [`crate::message::IdGenerator`] regardless of what the clock returns.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Nanoseconds since the Unix epoch (UTC).
    fn unix_nanos(&self) -> u128;

    /// Milliseconds since the Unix epoch (UTC).
    fn unix_millis(&self) -> u64 {
        (self.unix_nanos() / 1_000_000) as u64
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    use super::Environment;

    /// Clock that advances one microsecond per reading.
    #[derive(Clone, Default)]
    pub(crate) struct TickingClock {
        ticks: Arc<AtomicU64>,
    }

    impl Environment for TickingClock {
        fn unix_nanos(&self) -> u128 {
            let tick = self.ticks.fetch_add(1, Ordering::Relaxed);
            1_700_000_000_000_000_000 + u128::from(tick) * 1_000
        }
    }

    /// Clock moved forward by hand.
    #[derive(Clone, Default)]
    pub(crate) struct ManualClock {
        nanos: Arc<AtomicU64>,
    }

    impl ManualClock {
        pub(crate) fn advance(&self, by: std::time::Duration) {
            self.nanos.fetch_add(by.as_nanos() as u64, Ordering::Relaxed);
        }
    }

    impl Environment for ManualClock {
        fn unix_nanos(&self) -> u128 {
            1_700_000_000_000_000_000 + u128::from(self.nanos.load(Ordering::Relaxed))
        }
    }

    /// Clock stuck at a single instant.
    #[derive(Clone, Copy)]
    pub(crate) struct FrozenClock(pub(crate) u128);

    impl Environment for FrozenClock {
        fn unix_nanos(&self) -> u128 {
            self.0
        }
    }
}
