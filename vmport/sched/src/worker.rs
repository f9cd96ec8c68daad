//! Bookkeeping for a bounded deferred-work executor.
//!
//! The VM hands work it must not block on to a platform worker. Job slots
//! are a fixed resource: when none is free the requesting task parks and is
//! resumed by the next release. [`WorkQueue`] tracks slot ownership,
//! submission order and the parked waiters; running the jobs is the
//! embedding port's business.

use heapless::{Deque, Vec};
use vmport_core::{PortError, PortResult};

/// Identifier of a job slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobId(usize);

impl JobId {
    /// Returns the slot index, for indexing port-side job storage.
    pub const fn index(&self) -> usize {
        self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for JobId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "JobId({})", self.0);
    }
}

/// Slot, submission and waiter accounting for `JOBS` job slots and up to
/// `WAITERS` parked requesters.
///
/// `W` is the port's waiter token, whatever it needs to resume a parked
/// task. The queue itself never blocks; callers park on their own
/// primitive when [`allocate_or_wait`] returns `Ok(None)`.
///
/// [`allocate_or_wait`]: WorkQueue::allocate_or_wait
pub struct WorkQueue<W, const JOBS: usize, const WAITERS: usize> {
    free: Vec<JobId, JOBS>,
    pending: Deque<JobId, JOBS>,
    waiters: Deque<W, WAITERS>,
}

impl<W, const JOBS: usize, const WAITERS: usize> WorkQueue<W, JOBS, WAITERS> {
    /// Creates a queue with every job slot free.
    pub fn new() -> Self {
        let mut free = Vec::new();
        // seeded in reverse so slot 0 is handed out first
        for index in (0..JOBS).rev() {
            let _ = free.push(JobId(index));
        }
        Self {
            free,
            pending: Deque::new(),
            waiters: Deque::new(),
        }
    }

    /// Takes a free job slot, if any.
    pub fn allocate(&mut self) -> Option<JobId> {
        self.free.pop()
    }

    /// Takes a free job slot or parks `waiter` until one is released.
    ///
    /// `Ok(None)` means the waiter was parked; the caller blocks on its own
    /// primitive and retries after being resumed.
    pub fn allocate_or_wait(&mut self, waiter: W) -> PortResult<Option<JobId>> {
        match self.free.pop() {
            Some(id) => Ok(Some(id)),
            None => {
                self.waiters
                    .push_back(waiter)
                    .map_err(|_| PortError::WaitQueueFull)?;
                Ok(None)
            }
        }
    }

    /// Queues an allocated job for the worker.
    pub fn submit(&mut self, id: JobId) -> PortResult<()> {
        if id.0 >= JOBS {
            return Err(PortError::InvalidArgument);
        }
        self.pending.push_back(id).map_err(|_| PortError::QueueFull)
    }

    /// Takes the next submitted job, in submission order.
    pub fn take(&mut self) -> Option<JobId> {
        self.pending.pop_front()
    }

    /// Returns a job slot to the free set.
    ///
    /// Yields the longest-parked waiter, which the caller resumes so it can
    /// retry its allocation. Releasing a slot that is already free reports
    /// [`PortError::InvalidArgument`].
    pub fn release(&mut self, id: JobId) -> PortResult<Option<W>> {
        if id.0 >= JOBS || self.free.iter().any(|free| free.0 == id.0) {
            return Err(PortError::InvalidArgument);
        }
        debug_assert!(self.free.len() < JOBS);
        let _ = self.free.push(id);
        Ok(self.waiters.pop_front())
    }

    /// Number of free job slots
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Number of submitted jobs not yet taken
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of parked waiters
    pub fn waiting_count(&self) -> usize {
        self.waiters.len()
    }

    /// Whether any parked waiter matches `predicate`.
    ///
    /// Ports use this to tell a release-driven resume from a stray one: a
    /// waiter token leaves the queue only through [`release`], so a resumed
    /// task that is still queued was not resumed by a release.
    ///
    /// [`release`]: WorkQueue::release
    pub fn has_waiter<F>(&self, predicate: F) -> bool
    where
        F: Fn(&W) -> bool,
    {
        self.waiters.iter().any(predicate)
    }
}

impl<W, const JOBS: usize, const WAITERS: usize> Default for WorkQueue<W, JOBS, WAITERS> {
    fn default() -> Self {
        Self::new()
    }
}
