//! Idle signalling between the VM task and the platform.
//!
//! While the VM has nothing to run it parks on a binary signal; timer
//! expiry, incoming events or other tasks release the signal to resume it.
//! Releasing has a thread variant and an ISR variant because most RTOS
//! primitives must not be called with the thread API from an interrupt
//! handler.

use vmport_core::InterruptContext;

/// Binary signal the VM task parks on.
///
/// A freshly created signal is released, so the first [`acquire`] returns
/// without blocking. Releases do not accumulate: releasing an already
/// released signal is a no-op.
///
/// [`acquire`]: IdleSignal::acquire
pub trait IdleSignal {
    /// Blocks the calling task until the signal is released, consuming the
    /// release.
    fn acquire(&self);

    /// Releases the signal from task context.
    fn release(&self);

    /// Releases the signal from interrupt context.
    fn release_from_isr(&self);
}

/// Wakes the parked VM task, picking the release variant for the current
/// execution context.
pub fn wake_vm<S: IdleSignal>(signal: &S, interrupts: &InterruptContext) {
    if interrupts.is_in_interrupt() {
        signal.release_from_isr();
    } else {
        signal.release();
    }
}
