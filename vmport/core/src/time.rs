//! Tick/millisecond timebase arithmetic.
//!
//! RTOS delay and timer services take durations in ticks while the runtime
//! schedules in milliseconds. [`Timebase`] does the conversions for a fixed
//! tick rate, rounding and saturating so that a converted delay is never
//! shorter than requested and an overflowing one becomes "wait forever"
//! rather than wrapping into the past.

const MICROS_PER_MILLI: i64 = 1_000;
const MICROS_PER_SECOND: i64 = 1_000_000;
const NANOS_PER_MILLI: i64 = 1_000_000;

/// Conversion rules for a fixed-rate tick clock.
///
/// Negative durations clamp to zero and arithmetic overflow saturates to
/// `i64::MAX`, which ports treat as an unbounded delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timebase {
    rate_hz: u32,
    micros_per_tick: i64,
}

impl Timebase {
    /// Creates a timebase for the given tick rate.
    ///
    /// The rate must be between 1 Hz and 1 MHz.
    pub const fn new(rate_hz: u32) -> Self {
        assert!(rate_hz >= 1 && rate_hz as i64 <= MICROS_PER_SECOND);
        Self {
            rate_hz,
            micros_per_tick: MICROS_PER_SECOND / rate_hz as i64,
        }
    }

    /// Returns the tick rate in Hz.
    pub const fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    /// Converts a millisecond duration to ticks, rounding up.
    ///
    /// Rounding up guarantees that sleeping for the returned tick count
    /// covers at least `millis` milliseconds.
    pub const fn millis_to_ticks(&self, millis: i64) -> i64 {
        if millis <= 0 {
            return 0;
        }
        let micros = match millis.checked_mul(MICROS_PER_MILLI) {
            Some(micros) => micros,
            None => return i64::MAX,
        };
        match micros.checked_add(self.micros_per_tick - 1) {
            Some(rounded) => rounded / self.micros_per_tick,
            None => i64::MAX,
        }
    }

    /// Converts a tick count to milliseconds.
    pub const fn ticks_to_millis(&self, ticks: i64) -> i64 {
        if ticks <= 0 {
            return 0;
        }
        match ticks.checked_mul(MICROS_PER_MILLI) {
            Some(scaled) => scaled / self.rate_hz as i64,
            None => i64::MAX,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Timebase {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "Timebase({} Hz)", self.rate_hz);
    }
}

/// Scales a millisecond time to nanoseconds, saturating.
pub const fn millis_to_nanos(millis: i64) -> i64 {
    if millis <= 0 {
        0
    } else {
        millis.saturating_mul(NANOS_PER_MILLI)
    }
}

/// Offset that maps a platform time onto an application wall-clock time.
///
/// Computed once when the application sets its clock and then added to every
/// platform timestamp.
pub const fn application_offset(wall_ms: i64, platform_ms: i64) -> i64 {
    wall_ms.saturating_sub(platform_ms)
}

/// Applies an application-time offset to a platform timestamp.
pub const fn apply_offset(platform_ms: i64, offset_ms: i64) -> i64 {
    platform_ms.saturating_add(offset_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_to_ticks_rounds_up() {
        let tb = Timebase::new(100); // 10 ms per tick
        assert_eq!(tb.millis_to_ticks(10), 1);
        assert_eq!(tb.millis_to_ticks(11), 2);
        assert_eq!(tb.millis_to_ticks(19), 2);
        assert_eq!(tb.millis_to_ticks(20), 2);
        assert_eq!(tb.millis_to_ticks(1), 1);
    }

    #[test]
    fn test_negative_durations_clamp_to_zero() {
        let tb = Timebase::new(1000);
        assert_eq!(tb.millis_to_ticks(-5), 0);
        assert_eq!(tb.ticks_to_millis(-5), 0);
        assert_eq!(millis_to_nanos(-5), 0);
    }

    #[test]
    fn test_overflow_saturates() {
        let tb = Timebase::new(1000);
        assert_eq!(tb.millis_to_ticks(i64::MAX), i64::MAX);
        assert_eq!(tb.ticks_to_millis(i64::MAX), i64::MAX);
        assert_eq!(millis_to_nanos(i64::MAX), i64::MAX);
    }

    #[test]
    fn test_round_trip_never_shrinks() {
        let tb = Timebase::new(100);
        for ms in [1, 9, 10, 11, 15, 99, 100, 101, 12345] {
            let ticks = tb.millis_to_ticks(ms);
            assert!(tb.ticks_to_millis(ticks) >= ms, "shrank at {} ms", ms);
        }
    }

    #[test]
    fn test_ticks_to_millis_exact_rates() {
        let tb = Timebase::new(1000); // 1 ms per tick
        assert_eq!(tb.ticks_to_millis(7), 7);

        let tb = Timebase::new(250); // 4 ms per tick
        assert_eq!(tb.ticks_to_millis(3), 12);
    }

    #[test]
    fn test_application_offset_round_trip() {
        let offset = application_offset(1_700_000_000_000, 12_345);
        assert_eq!(apply_offset(12_345, offset), 1_700_000_000_000);
        assert_eq!(apply_offset(13_345, offset), 1_700_000_001_000);
    }

    #[test]
    fn test_offset_saturates() {
        assert_eq!(application_offset(i64::MAX, -1), i64::MAX);
        assert_eq!(apply_offset(i64::MAX, 1), i64::MAX);
    }
}
