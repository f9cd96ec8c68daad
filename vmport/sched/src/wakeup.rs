//! Deadline scheduling for the VM wakeup timer.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;
use vmport_core::{PortResult, Timebase};

/// Sentinel for "no wakeup pending".
pub const NO_WAKEUP: i64 = i64::MAX;

/// Platform one-shot timer driving VM wakeups.
///
/// Implementations take `&self`; a timer that needs mutable state keeps it
/// behind its own synchronization.
pub trait WakeupTimer {
    /// Arms the timer to fire once after `ticks`. Replaces any pending arm.
    fn arm(&self, ticks: i64) -> PortResult<()>;

    /// Stops the timer without firing it. Stopping an idle timer is allowed.
    fn stop(&self) -> PortResult<()>;
}

/// What [`WakeupScheduler::schedule`] decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// The deadline has already passed. The caller wakes the VM now; no
    /// timer is left armed.
    Immediate,
    /// The timer was armed (or re-armed) for the requested deadline.
    Armed,
    /// An earlier wakeup is already pending; the request was absorbed.
    AlreadyPending,
}

#[cfg(feature = "defmt")]
impl defmt::Format for ScheduleOutcome {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            ScheduleOutcome::Immediate => defmt::write!(fmt, "Immediate"),
            ScheduleOutcome::Armed => defmt::write!(fmt, "Armed"),
            ScheduleOutcome::AlreadyPending => defmt::write!(fmt, "AlreadyPending"),
        }
    }
}

/// Coalesces VM wakeup requests onto a single one-shot timer.
///
/// The VM may request many wakeups; only the earliest one matters. The
/// scheduler keeps the pending deadline and re-arms the timer only when a
/// request moves it closer, when the previous arm already fired, or when
/// the pending deadline turns out to lie in the past.
pub struct WakeupScheduler<T: WakeupTimer> {
    timer: T,
    timebase: Timebase,
    next_wakeup_ms: Mutex<Cell<i64>>,
    timer_fired: AtomicBool,
}

impl<T: WakeupTimer> WakeupScheduler<T> {
    /// Creates a scheduler with no wakeup pending.
    pub const fn new(timer: T, timebase: Timebase) -> Self {
        Self {
            timer,
            timebase,
            next_wakeup_ms: Mutex::new(Cell::new(NO_WAKEUP)),
            timer_fired: AtomicBool::new(false),
        }
    }

    /// Requests a VM wakeup at the absolute platform time `at_ms`.
    ///
    /// `now_ms` is the current platform time. The returned outcome tells
    /// the caller whether it must wake the VM itself ([`Immediate`]) or the
    /// timer will ([`Armed`], [`AlreadyPending`]).
    ///
    /// [`Immediate`]: ScheduleOutcome::Immediate
    /// [`Armed`]: ScheduleOutcome::Armed
    /// [`AlreadyPending`]: ScheduleOutcome::AlreadyPending
    pub fn schedule(&self, at_ms: i64, now_ms: i64) -> PortResult<ScheduleOutcome> {
        let delay_ticks = self.timebase.millis_to_ticks(at_ms.saturating_sub(now_ms));
        if delay_ticks <= 0 {
            self.set_next_wakeup(NO_WAKEUP);
            self.timer.stop()?;
            return Ok(ScheduleOutcome::Immediate);
        }

        let pending = self.next_wakeup_ms();
        let stale = self.timer_fired.load(Ordering::Acquire) || pending <= now_ms;
        if stale || at_ms < pending {
            self.set_next_wakeup(at_ms);
            self.timer.stop()?;
            self.timer_fired.store(false, Ordering::Release);
            self.timer.arm(delay_ticks)?;
            Ok(ScheduleOutcome::Armed)
        } else {
            Ok(ScheduleOutcome::AlreadyPending)
        }
    }

    /// Records that the armed timer fired.
    ///
    /// Called from the timer expiry context, before waking the VM. The next
    /// [`schedule`] treats the pending deadline as consumed and re-arms.
    ///
    /// [`schedule`]: Self::schedule
    pub fn note_timer_fired(&self) {
        self.timer_fired.store(true, Ordering::Release);
    }

    /// Whether the armed timer fired and no request re-armed it since.
    pub fn timer_fired(&self) -> bool {
        self.timer_fired.load(Ordering::Acquire)
    }

    /// The pending wakeup deadline, or [`NO_WAKEUP`].
    pub fn next_wakeup_ms(&self) -> i64 {
        critical_section::with(|cs| self.next_wakeup_ms.borrow(cs).get())
    }

    /// Whether a wakeup deadline is pending.
    pub fn has_pending(&self) -> bool {
        self.next_wakeup_ms() != NO_WAKEUP
    }

    /// The timebase used for deadline conversions.
    pub fn timebase(&self) -> Timebase {
        self.timebase
    }

    /// The platform timer driving this scheduler.
    pub fn timer(&self) -> &T {
        &self.timer
    }

    fn set_next_wakeup(&self, at_ms: i64) {
        critical_section::with(|cs| self.next_wakeup_ms.borrow(cs).set(at_ms));
    }
}
