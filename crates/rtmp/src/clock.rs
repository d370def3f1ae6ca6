//! The millisecond clock stamping outbound messages.

use std::sync::Arc;
use std::time::Instant;

/// A monotonic millisecond source.
///
/// Sessions stamp outbound messages and the handshake time field with this
/// clock; audio and video timestamps fed to a session must come from the
/// same source or A/V sync drifts.
pub trait RtmpClock: Send + Sync {
    /// Milliseconds since an arbitrary, fixed epoch.
    fn now_ms(&self) -> u32;
}

/// The default clock: milliseconds since the instant it was created.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose epoch is now.
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl RtmpClock for MonotonicClock {
    fn now_ms(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }
}

/// The clock handle sessions carry.
pub type SharedClock = Arc<dyn RtmpClock>;

/// Returns the default shared clock.
pub fn default_clock() -> SharedClock {
    Arc::new(MonotonicClock::new())
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_does_not_go_backwards() {
        let clock = MonotonicClock::new();
        let first = clock.now_ms();
        let second = clock.now_ms();
        assert!(second >= first);
    }
}
