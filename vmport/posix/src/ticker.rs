//! Periodic tick generation.
//!
//! A dedicated thread produces ticks at a fixed rate using absolute
//! deadlines on a monotonic clock, so the rate does not drift with callback
//! runtime. Each callback is bracketed with the interrupt context exactly
//! like a tick ISR on a board, which makes code under test observe
//! `is_in_interrupt() == true` and exercise its ISR-safe paths.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use vmport_core::InterruptContext;

/// Nanoseconds per second
const NSEC_PER_SEC: u64 = 1_000_000_000;

/// Highest supported tick rate
const MAX_TICK_RATE_HZ: u32 = 10_000;

/// Periodic tick thread.
///
/// Stopping joins the thread; dropping a running ticker stops it.
pub struct Ticker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    rate_hz: u32,
}

impl Ticker {
    /// Starts a ticker at `rate_hz` ticks per second.
    ///
    /// Every tick claims `interrupts`, runs `on_tick`, and releases the
    /// claim again.
    ///
    /// # Panics
    ///
    /// Panics when `rate_hz` is zero or above 10 kHz.
    pub fn start<F>(rate_hz: u32, interrupts: Arc<InterruptContext>, mut on_tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        assert!(rate_hz > 0, "tick rate must be greater than 0");
        assert!(rate_hz <= MAX_TICK_RATE_HZ, "tick rate too high (max 10 kHz)");

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = Arc::clone(&running);
        let period = Duration::from_nanos(NSEC_PER_SEC / u64::from(rate_hz));

        let handle = thread::spawn(move || {
            let mut next_tick = Instant::now();
            while thread_running.load(Ordering::Relaxed) {
                next_tick += period;
                let now = Instant::now();
                if next_tick > now {
                    thread::sleep(next_tick - now);
                }

                // bracket the callback like a tick interrupt handler
                let entered = interrupts.enter();
                on_tick();
                interrupts.leave(entered);
            }
        });

        log::debug!("ticker started at {} Hz", rate_hz);
        Self {
            running,
            handle: Some(handle),
            rate_hz,
        }
    }

    /// The configured tick rate in Hz.
    pub fn rate_hz(&self) -> u32 {
        self.rate_hz
    }

    /// The tick period.
    pub fn period(&self) -> Duration {
        Duration::from_nanos(NSEC_PER_SEC / u64::from(self.rate_hz))
    }

    /// Stops the ticker and waits for the thread to finish.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            log::debug!("ticker stopped");
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
