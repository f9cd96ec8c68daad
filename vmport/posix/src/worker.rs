//! Deferred-job worker thread.
//!
//! Jobs the VM must not block on run here. Slot accounting lives in the
//! portable [`WorkQueue`]; this module adds the actual storage for boxed
//! jobs, the executing thread and the park/unpark plumbing for callers that
//! hit slot exhaustion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle, Thread};

use vmport_core::PortResult;
use vmport_sched::{JobId, WorkQueue};

use crate::HostError;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct WorkerInner<const JOBS: usize, const WAITERS: usize> {
    queue: Mutex<WorkQueue<Thread, JOBS, WAITERS>>,
    jobs: Mutex<[Option<Job>; JOBS]>,
    cond: Condvar,
    shutdown: AtomicBool,
}

/// Executes submitted jobs in order on a dedicated thread.
///
/// `JOBS` bounds the jobs in flight; a caller that finds no free slot parks
/// until one is released, and at most `WAITERS` callers may park at once.
pub struct Worker<const JOBS: usize, const WAITERS: usize> {
    inner: Arc<WorkerInner<JOBS, WAITERS>>,
    thread: Option<JoinHandle<()>>,
}

impl<const JOBS: usize, const WAITERS: usize> Worker<JOBS, WAITERS> {
    /// Spawns the worker thread under the given name.
    pub fn spawn(name: &str) -> Result<Self, HostError> {
        let inner = Arc::new(WorkerInner {
            queue: Mutex::new(WorkQueue::new()),
            jobs: Mutex::new(std::array::from_fn(|_| None)),
            cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        let thread_inner = Arc::clone(&inner);
        let thread = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || run(thread_inner))?;

        log::debug!("worker '{}' started with {} job slots", name, JOBS);
        Ok(Self {
            inner,
            thread: Some(thread),
        })
    }

    /// Queues `job` for execution, parking until a job slot frees up if
    /// none is available.
    ///
    /// Fails with [`WaitQueueFull`] when too many callers are already
    /// parked.
    ///
    /// [`WaitQueueFull`]: vmport_core::PortError::WaitQueueFull
    pub fn execute<F>(&self, job: F) -> PortResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.allocate_slot()?;
        self.inner.jobs.lock().unwrap()[id.index()] = Some(Box::new(job));

        let submitted = self.inner.queue.lock().unwrap().submit(id);
        if let Err(error) = submitted {
            // roll the slot back so it is not leaked
            self.inner.jobs.lock().unwrap()[id.index()] = None;
            if let Ok(Some(waiter)) = self.inner.queue.lock().unwrap().release(id) {
                waiter.unpark();
            }
            return Err(error);
        }
        self.inner.cond.notify_one();
        Ok(())
    }

    /// Number of jobs submitted but not yet executed.
    pub fn pending_jobs(&self) -> usize {
        self.inner.queue.lock().unwrap().pending_count()
    }

    fn allocate_slot(&self) -> PortResult<JobId> {
        let me = thread::current();
        loop {
            {
                let mut queue = self.inner.queue.lock().unwrap();
                // a waiter token leaves the queue only when a release pops
                // it; a wakeup while still queued is stray and must not
                // enqueue a second token
                if !queue.has_waiter(|waiter| waiter.id() == me.id()) {
                    if let Some(id) = queue.allocate_or_wait(me.clone())? {
                        return Ok(id);
                    }
                }
            }
            thread::park();
        }
    }
}

impl<const JOBS: usize, const WAITERS: usize> Drop for Worker<JOBS, WAITERS> {
    fn drop(&mut self) {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        self.inner.cond.notify_all();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run<const JOBS: usize, const WAITERS: usize>(inner: Arc<WorkerInner<JOBS, WAITERS>>) {
    loop {
        let id = {
            let mut queue = inner.queue.lock().unwrap();
            loop {
                match queue.take() {
                    Some(id) => break id,
                    None => {
                        if inner.shutdown.load(Ordering::SeqCst) {
                            return;
                        }
                        queue = inner.cond.wait(queue).unwrap();
                    }
                }
            }
        };

        let job = inner.jobs.lock().unwrap()[id.index()].take();
        if let Some(job) = job {
            job();
        }

        let waiter = inner.queue.lock().unwrap().release(id);
        match waiter {
            Ok(Some(thread)) => thread.unpark(),
            Ok(None) => {}
            Err(error) => log::warn!("job slot release failed: {}", error),
        }
    }
}
