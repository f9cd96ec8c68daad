//! Monotonic host clock with an application-time offset.
//!
//! Platform time counts milliseconds since the clock was created and never
//! jumps. Application time adds an offset captured when the runtime sets
//! its wall clock, matching the embedded split where the RTOS tick counter
//! is authoritative and the VM only shifts its view of it.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use vmport_core::time::{application_offset, apply_offset, millis_to_nanos};

/// Monotonic clock backing both platform and application time.
pub struct HostClock {
    origin: Instant,
    offset_ms: AtomicI64,
}

impl HostClock {
    /// Creates a clock whose platform time starts at zero.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_ms: AtomicI64::new(0),
        }
    }

    /// Milliseconds since the clock was created. Never decreases.
    pub fn platform_time_ms(&self) -> i64 {
        // saturate far beyond any realistic process lifetime
        i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX)
    }

    /// Platform time scaled to nanoseconds.
    pub fn platform_time_ns(&self) -> i64 {
        millis_to_nanos(self.platform_time_ms())
    }

    /// Application time: platform time shifted by the configured offset.
    pub fn application_time_ms(&self) -> i64 {
        apply_offset(self.platform_time_ms(), self.offset_ms.load(Ordering::SeqCst))
    }

    /// Returns platform or application time, as requested.
    pub fn time_ms(&self, application: bool) -> i64 {
        if application {
            self.application_time_ms()
        } else {
            self.platform_time_ms()
        }
    }

    /// Pins the application clock: from now on `application_time_ms`
    /// returns `wall_ms` plus elapsed platform time.
    pub fn set_application_time(&self, wall_ms: i64) {
        let offset = application_offset(wall_ms, self.platform_time_ms());
        self.offset_ms.store(offset, Ordering::SeqCst);
        log::debug!("application time set, offset {} ms", offset);
    }
}

impl Default for HostClock {
    fn default() -> Self {
        Self::new()
    }
}
