//! Interrupt-context tracking.
//!
//! Platform glue frequently needs to know whether it is running inside an
//! interrupt handler, because many RTOS services come in paired thread/ISR
//! variants and calling the wrong one corrupts scheduler state. The types
//! here answer that question: an interrupt handler brackets its body with
//! [`InterruptContext::enter`] and [`InterruptContext::leave`], and any code
//! reached from within can query [`InterruptContext::is_in_interrupt`] to
//! pick the ISR-safe call variant.

use core::sync::atomic::{AtomicBool, Ordering};

/// Single-slot marker for "execution is inside an interrupt handler".
///
/// The slot is claimed with a compare-and-swap, so even with handlers racing
/// on multiple cores at most one `enter` succeeds until the matching
/// `leave(true)`. A failed claim is a normal outcome, not an error: the
/// caller simply skips the bracketing and must pass its `false` token to
/// `leave`, which then changes nothing.
///
/// This is not a counting guard. While one handler holds the slot, a nested
/// higher-priority handler observes `enter() == false` and the flag stays
/// set until the outer `leave(true)`; the nesting depth is not tracked.
///
/// Construction is `const`, so a port can own a `static InterruptContext`
/// for its process-wide marker while tests and multi-runtime hosts create
/// independent instances.
#[derive(Debug)]
pub struct InterruptContext {
    in_interrupt: AtomicBool,
}

impl InterruptContext {
    /// Creates a context with the marker clear.
    pub const fn new() -> Self {
        Self {
            in_interrupt: AtomicBool::new(false),
        }
    }

    /// Attempts to claim the interrupt marker.
    ///
    /// Returns `true` when this call set the marker, `false` when it was
    /// already set. The returned token must be handed back to [`leave`]
    /// unchanged.
    ///
    /// [`leave`]: Self::leave
    #[must_use = "the token must be passed back to leave()"]
    pub fn enter(&self) -> bool {
        self.in_interrupt
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Releases the interrupt marker claimed by a successful [`enter`].
    ///
    /// With `entered == true` the marker is cleared unconditionally; with
    /// `entered == false` the call is a no-op, so a handler that lost the
    /// claim cannot release the one held by its interruptee.
    ///
    /// [`enter`]: Self::enter
    pub fn leave(&self, entered: bool) {
        if entered {
            self.in_interrupt.store(false, Ordering::Release);
        }
    }

    /// Returns `true` while execution is marked as inside an interrupt.
    pub fn is_in_interrupt(&self) -> bool {
        self.in_interrupt.load(Ordering::Acquire)
    }

    /// Claims the marker and returns a guard that releases it on drop.
    ///
    /// `None` means the marker was already held; the caller proceeds without
    /// bracketing, exactly as with a `false` token from [`enter`].
    ///
    /// [`enter`]: Self::enter
    pub fn scope(&self) -> Option<InterruptScope<'_>> {
        if self.enter() {
            Some(InterruptScope { context: self })
        } else {
            None
        }
    }
}

impl Default for InterruptContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for InterruptContext {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "InterruptContext({})", self.is_in_interrupt());
    }
}

/// Guard that releases the interrupt marker when dropped.
#[derive(Debug)]
pub struct InterruptScope<'a> {
    context: &'a InterruptContext,
}

impl Drop for InterruptScope<'_> {
    fn drop(&mut self) {
        self.context.leave(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_idle() {
        let ctx = InterruptContext::new();
        assert!(!ctx.is_in_interrupt());
    }

    #[test]
    fn test_enter_claims_marker() {
        let ctx = InterruptContext::new();
        assert!(ctx.enter());
        assert!(ctx.is_in_interrupt());
    }

    #[test]
    fn test_enter_fails_when_claimed() {
        let ctx = InterruptContext::new();
        assert!(ctx.enter());
        assert!(!ctx.enter());
        assert!(ctx.is_in_interrupt());
    }

    #[test]
    fn test_leave_with_token_clears() {
        let ctx = InterruptContext::new();
        let entered = ctx.enter();
        ctx.leave(entered);
        assert!(!ctx.is_in_interrupt());
    }

    #[test]
    fn test_leave_without_token_is_noop() {
        let ctx = InterruptContext::new();
        assert!(ctx.enter());
        ctx.leave(false);
        assert!(ctx.is_in_interrupt());

        ctx.leave(true);
        ctx.leave(false);
        assert!(!ctx.is_in_interrupt());
    }

    #[test]
    fn test_leave_true_clears_from_any_state() {
        let ctx = InterruptContext::new();
        ctx.leave(true);
        assert!(!ctx.is_in_interrupt());
    }

    #[test]
    fn test_scope_guard_releases_on_drop() {
        let ctx = InterruptContext::new();
        {
            let scope = ctx.scope();
            assert!(scope.is_some());
            assert!(ctx.is_in_interrupt());
            assert!(ctx.scope().is_none());
        }
        assert!(!ctx.is_in_interrupt());
    }
}
