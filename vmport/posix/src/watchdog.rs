//! Software watchdog backend.
//!
//! Hosts have no watchdog peripheral, so a monitor thread stands in: once
//! started it expects a refresh within the configured timeout, and a missed
//! deadline latches an expiry flag instead of resetting the machine. The
//! flag doubles as the host's "reset cause" answer, letting supervision
//! logic be tested end to end off-target.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use vmport_core::PortResult;
use vmport_wdt::WatchdogBackend;

struct DogState {
    deadline: Option<Instant>,
    shutdown: bool,
}

struct DogInner {
    state: Mutex<DogState>,
    cond: Condvar,
    expired: AtomicBool,
}

/// Thread-based [`WatchdogBackend`] for host builds.
pub struct HostWatchdog {
    inner: Arc<DogInner>,
    monitor: Option<JoinHandle<()>>,
    timeout: Duration,
}

impl HostWatchdog {
    /// Creates a watchdog with the given countdown timeout. The countdown
    /// does not run until `start`.
    pub fn new(timeout: Duration) -> Self {
        let inner = Arc::new(DogInner {
            state: Mutex::new(DogState {
                deadline: None,
                shutdown: false,
            }),
            cond: Condvar::new(),
            expired: AtomicBool::new(false),
        });

        let monitor_inner = Arc::clone(&inner);
        let monitor = thread::spawn(move || monitor_loop(monitor_inner));

        Self {
            inner,
            monitor: Some(monitor),
            timeout,
        }
    }

    /// Whether the countdown ever lapsed during this process run.
    pub fn expired(&self) -> bool {
        self.inner.expired.load(Ordering::SeqCst)
    }

    fn rearm(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.deadline = Some(Instant::now() + self.timeout);
        self.inner.cond.notify_all();
    }

    fn disarm(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.deadline = None;
        self.inner.cond.notify_all();
    }
}

impl WatchdogBackend for HostWatchdog {
    fn init(&mut self) -> PortResult<()> {
        log::debug!("software watchdog ready, timeout {} ms", self.timeout.as_millis());
        Ok(())
    }

    fn start(&mut self) -> PortResult<()> {
        self.rearm();
        log::info!("watchdog started, timeout {} ms", self.timeout.as_millis());
        Ok(())
    }

    fn stop(&mut self) -> PortResult<()> {
        self.disarm();
        log::info!("watchdog stopped");
        Ok(())
    }

    fn refresh(&mut self) -> PortResult<()> {
        let mut state = self.inner.state.lock().unwrap();
        if state.deadline.is_some() {
            state.deadline = Some(Instant::now() + self.timeout);
            self.inner.cond.notify_all();
            log::trace!("watchdog refreshed");
        }
        Ok(())
    }

    fn reset_was_watchdog(&self) -> bool {
        self.expired()
    }

    fn timeout_ms(&self) -> i64 {
        i64::try_from(self.timeout.as_millis()).unwrap_or(i64::MAX)
    }
}

impl Drop for HostWatchdog {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.shutdown = true;
            self.inner.cond.notify_all();
        }
        if let Some(monitor) = self.monitor.take() {
            let _ = monitor.join();
        }
    }
}

fn monitor_loop(inner: Arc<DogInner>) {
    let mut state = inner.state.lock().unwrap();
    loop {
        if state.shutdown {
            return;
        }
        match state.deadline {
            None => {
                state = inner.cond.wait(state).unwrap();
            }
            Some(deadline) => {
                let now = Instant::now();
                if now < deadline {
                    let (guard, _) = inner.cond.wait_timeout(state, deadline - now).unwrap();
                    state = guard;
                    continue;
                }

                log::error!("watchdog timeout: no refresh within the deadline");
                inner.expired.store(true, Ordering::SeqCst);
                state.deadline = None;
            }
        }
    }
}
