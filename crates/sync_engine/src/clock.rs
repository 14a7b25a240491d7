//! Device-time to bus-time mapping.
//!
//! The first sample of any kind fixes the reference pair
//! (bus time now, device time of that sample). Every later timestamp is
//! mapped by offsetting the reference bus time.

use std::sync::{Arc, OnceLock};

use contracts::{Clock, Stamp};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
struct ClockReference {
    bus: Stamp,
    device_ms: f64,
}

/// Session clock base, set exactly once
pub struct ClockBase {
    clock: Arc<dyn Clock>,
    reference: OnceLock<ClockReference>,
}

impl std::fmt::Debug for ClockBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockBase")
            .field("reference", &self.reference.get())
            .finish()
    }
}

impl ClockBase {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            reference: OnceLock::new(),
        }
    }

    /// Record the reference pair if nobody did yet
    ///
    /// Returns `true` only for the caller that performed the assignment.
    pub fn ensure_initialized(&self, device_time_ms: f64, metadata_available: bool) -> bool {
        if self.reference.get().is_some() {
            return false;
        }

        let mut initialized = false;
        self.reference.get_or_init(|| {
            initialized = true;
            if !metadata_available {
                warn!("frame metadata isn't available, device timestamps are in the system time domain");
            }
            let reference = ClockReference {
                bus: self.clock.now(),
                device_ms: device_time_ms,
            };
            debug!(
                bus_time = %reference.bus,
                device_time_ms,
                "clock base initialized"
            );
            reference
        });
        initialized
    }

    pub fn is_initialized(&self) -> bool {
        self.reference.get().is_some()
    }

    /// Map a device timestamp (ms) to bus time
    ///
    /// Falls back to `now` before the base is established.
    pub fn to_bus_time(&self, device_time_ms: f64) -> Stamp {
        match self.reference.get() {
            Some(reference) => reference
                .bus
                .offset_nanos((device_time_ms - reference.device_ms) * 1e6),
            None => self.clock.now(),
        }
    }

    /// Nanoseconds elapsed since the reference device time
    pub fn elapsed_ns(&self, device_time_ms: f64) -> f64 {
        match self.reference.get() {
            Some(reference) => (device_time_ms - reference.device_ms) * 1e6,
            None => 0.0,
        }
    }

    /// Bus time of an offset produced by [`ClockBase::elapsed_ns`]
    pub fn bus_time_from_elapsed(&self, elapsed_ns: f64) -> Stamp {
        match self.reference.get() {
            Some(reference) => reference.bus.offset_nanos(elapsed_ns),
            None => self.clock.now(),
        }
    }

    pub fn now(&self) -> Stamp {
        self.clock.now()
    }
}
