//! One-shot wakeup timer on a dedicated thread.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use vmport_core::{PortResult, Timebase};
use vmport_sched::WakeupTimer;

type ExpiryHandler = Box<dyn Fn() + Send>;

struct TimerState {
    deadline: Option<Instant>,
    shutdown: bool,
}

struct TimerInner {
    state: Mutex<TimerState>,
    cond: Condvar,
    handler: Mutex<Option<ExpiryHandler>>,
    timebase: Timebase,
}

/// [`WakeupTimer`] implementation backed by a waiting thread.
///
/// Arming replaces the pending deadline under the state lock and the worker
/// re-checks the deadline after every wakeup, so a stale expiry from an
/// earlier arm can never fire the handler.
pub struct ThreadWakeupTimer {
    inner: Arc<TimerInner>,
    worker: Option<JoinHandle<()>>,
}

impl ThreadWakeupTimer {
    /// Spawns the timer thread. The timer is idle until armed.
    pub fn spawn(timebase: Timebase) -> Self {
        let inner = Arc::new(TimerInner {
            state: Mutex::new(TimerState {
                deadline: None,
                shutdown: false,
            }),
            cond: Condvar::new(),
            handler: Mutex::new(None),
            timebase,
        });

        let thread_inner = Arc::clone(&inner);
        let worker = thread::spawn(move || run(thread_inner));

        Self {
            inner,
            worker: Some(worker),
        }
    }

    /// Registers the handler invoked when the armed deadline is reached.
    ///
    /// The handler runs on the timer thread, which models the interrupt
    /// context of a hardware timer; callers usually claim an
    /// `InterruptContext` inside it.
    pub fn set_expiry_handler<F>(&self, handler: F)
    where
        F: Fn() + Send + 'static,
    {
        *self.inner.handler.lock().unwrap() = Some(Box::new(handler));
    }

    /// Whether a deadline is currently armed.
    pub fn is_armed(&self) -> bool {
        self.inner.state.lock().unwrap().deadline.is_some()
    }
}

impl WakeupTimer for ThreadWakeupTimer {
    fn arm(&self, ticks: i64) -> PortResult<()> {
        let millis = self.inner.timebase.ticks_to_millis(ticks);
        let delay = Duration::from_millis(millis.max(0) as u64);

        let mut state = self.inner.state.lock().unwrap();
        // a delay too large for the clock simply never fires
        state.deadline = Instant::now().checked_add(delay);
        self.inner.cond.notify_all();
        log::trace!("wakeup timer armed for {} ms", millis);
        Ok(())
    }

    fn stop(&self) -> PortResult<()> {
        let mut state = self.inner.state.lock().unwrap();
        state.deadline = None;
        self.inner.cond.notify_all();
        Ok(())
    }
}

impl Drop for ThreadWakeupTimer {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.shutdown = true;
            self.inner.cond.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run(inner: Arc<TimerInner>) {
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
                    // re-evaluate: the deadline may have moved or been
                    // cleared while we slept
                    continue;
                }

                state.deadline = None;
                drop(state);
                if let Some(handler) = inner.handler.lock().unwrap().as_ref() {
                    handler();
                }
                state = inner.state.lock().unwrap();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fire_counter(timer: &ThreadWakeupTimer) -> Arc<AtomicUsize> {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        timer.set_expiry_handler(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        fired
    }

    #[test]
    fn test_armed_timer_fires_once() {
        let timer = ThreadWakeupTimer::spawn(Timebase::new(1000));
        let fired = fire_counter(&timer);

        timer.arm(20).unwrap();
        thread::sleep(Duration::from_millis(200));

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed());
    }

    #[test]
    fn test_stopped_timer_does_not_fire() {
        let timer = ThreadWakeupTimer::spawn(Timebase::new(1000));
        let fired = fire_counter(&timer);

        timer.arm(100).unwrap();
        timer.stop().unwrap();
        thread::sleep(Duration::from_millis(250));

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let timer = ThreadWakeupTimer::spawn(Timebase::new(1000));
        let fired = fire_counter(&timer);

        timer.arm(5_000).unwrap();
        timer.arm(20).unwrap();
        thread::sleep(Duration::from_millis(300));

        assert_eq!(fired.load(Ordering::SeqCst), 1, "re-armed deadline did not fire");
    }

    #[test]
    fn test_idle_timer_stays_quiet() {
        let timer = ThreadWakeupTimer::spawn(Timebase::new(100));
        let fired = fire_counter(&timer);

        thread::sleep(Duration::from_millis(50));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!timer.is_armed());
    }
}
