//! Condvar-backed idle signal.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use vmport_sched::IdleSignal;

/// Binary signal the VM task parks on, built on a mutex and condvar.
///
/// Starts released, so the first `acquire` passes immediately. Releases do
/// not accumulate.
pub struct CondvarSignal {
    available: Mutex<bool>,
    cond: Condvar,
}

impl CondvarSignal {
    /// Creates a released signal.
    pub fn new() -> Self {
        Self {
            available: Mutex::new(true),
            cond: Condvar::new(),
        }
    }

    /// Like [`IdleSignal::acquire`] but gives up after `timeout`.
    ///
    /// Returns `true` when the signal was consumed.
    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut available = self.available.lock().unwrap();
        while !*available {
            let now = std::time::Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self.cond.wait_timeout(available, deadline - now).unwrap();
            available = guard;
        }
        *available = false;
        true
    }
}

impl Default for CondvarSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleSignal for CondvarSignal {
    fn acquire(&self) {
        let mut available = self.available.lock().unwrap();
        while !*available {
            available = self.cond.wait(available).unwrap();
        }
        *available = false;
    }

    fn release(&self) {
        *self.available.lock().unwrap() = true;
        self.cond.notify_one();
    }

    fn release_from_isr(&self) {
        // no thread/ISR split exists on a host
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fresh_signal_is_released() {
        let signal = CondvarSignal::new();
        assert!(signal.acquire_timeout(Duration::from_millis(10)));
        // the release was consumed
        assert!(!signal.acquire_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_releases_do_not_accumulate() {
        let signal = CondvarSignal::new();
        signal.release();
        signal.release();

        assert!(signal.acquire_timeout(Duration::from_millis(10)));
        assert!(!signal.acquire_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_release_unblocks_parked_task() {
        let signal = Arc::new(CondvarSignal::new());
        signal.acquire();

        let parked = Arc::clone(&signal);
        let handle = thread::spawn(move || parked.acquire_timeout(Duration::from_secs(5)));

        thread::sleep(Duration::from_millis(20));
        signal.release_from_isr();
        assert!(handle.join().unwrap());
    }
}
