//! Fixed-slot storage pool.

use core::cell::RefCell;

use critical_section::Mutex;
use vmport_core::{PortError, PortResult};

/// Opaque reference to a reserved slot.
///
/// A handle stays valid until the slot is released; using it afterwards
/// reports [`PortError::ItemNotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotHandle(usize);

impl SlotHandle {
    /// Returns the slot index, for diagnostics.
    pub const fn index(&self) -> usize {
        self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SlotHandle {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "SlotHandle({})", self.0);
    }
}

struct Inner<T, const N: usize> {
    slots: [Option<T>; N],
    stats: PoolStats,
}

/// A pool of `N` statically owned slots.
///
/// Reservation takes the first free slot, lookups scan the used ones.
/// All operations run inside a critical section, so the pool can be shared
/// between tasks and interrupt handlers.
pub struct SlotPool<T, const N: usize> {
    inner: Mutex<RefCell<Inner<T, N>>>,
}

impl<T, const N: usize> SlotPool<T, N> {
    const VACANT: Option<T> = None;

    /// Create an empty pool
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                slots: [Self::VACANT; N],
                stats: PoolStats {
                    total_slots: N,
                    free_slots: N,
                    used_slots: 0,
                    min_free_slots: N,
                },
            })),
        }
    }

    /// Total number of slots
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Reserves the first free slot for `value`.
    ///
    /// When the pool is exhausted the value is handed back in the error,
    /// so the caller can retry elsewhere without losing it.
    pub fn try_reserve(&self, value: T) -> Result<SlotHandle, T> {
        critical_section::with(|cs| {
            let mut guard = self.inner.borrow_ref_mut(cs);
            let inner = &mut *guard;
            match inner.slots.iter().position(Option::is_none) {
                Some(index) => {
                    inner.slots[index] = Some(value);
                    inner.stats.on_reserve();
                    Ok(SlotHandle(index))
                }
                None => Err(value),
            }
        })
    }

    /// Reserves the first free slot for `value`.
    pub fn reserve(&self, value: T) -> PortResult<SlotHandle> {
        self.try_reserve(value).map_err(|_| PortError::PoolExhausted)
    }

    /// Finds the first used slot whose value matches `predicate`.
    pub fn find<F>(&self, predicate: F) -> PortResult<SlotHandle>
    where
        F: Fn(&T) -> bool,
    {
        critical_section::with(|cs| {
            let inner = self.inner.borrow_ref(cs);
            inner
                .slots
                .iter()
                .position(|slot| matches!(slot, Some(value) if predicate(value)))
                .map(SlotHandle)
                .ok_or(PortError::ItemNotFound)
        })
    }

    /// Runs `f` with shared access to the slot value.
    pub fn with_ref<R, F>(&self, handle: SlotHandle, f: F) -> PortResult<R>
    where
        F: FnOnce(&T) -> R,
    {
        critical_section::with(|cs| {
            let inner = self.inner.borrow_ref(cs);
            match inner.slots.get(handle.0) {
                Some(Some(value)) => Ok(f(value)),
                Some(None) => Err(PortError::ItemNotFound),
                None => Err(PortError::InvalidArgument),
            }
        })
    }

    /// Runs `f` with exclusive access to the slot value.
    pub fn with<R, F>(&self, handle: SlotHandle, f: F) -> PortResult<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            match inner.slots.get_mut(handle.0) {
                Some(Some(value)) => Ok(f(value)),
                Some(None) => Err(PortError::ItemNotFound),
                None => Err(PortError::InvalidArgument),
            }
        })
    }

    /// Releases the slot and returns its value.
    pub fn release(&self, handle: SlotHandle) -> PortResult<T> {
        critical_section::with(|cs| {
            let mut guard = self.inner.borrow_ref_mut(cs);
            let inner = &mut *guard;
            match inner.slots.get_mut(handle.0) {
                Some(slot) => match slot.take() {
                    Some(value) => {
                        inner.stats.on_release();
                        Ok(value)
                    }
                    None => Err(PortError::ItemNotFound),
                },
                None => Err(PortError::InvalidArgument),
            }
        })
    }

    /// Current pool statistics
    pub fn stats(&self) -> PoolStats {
        critical_section::with(|cs| self.inner.borrow_ref(cs).stats)
    }
}

impl<T, const N: usize> Default for SlotPool<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Occupancy snapshot of a [`SlotPool`], as handed out by
/// [`SlotPool::stats`].
///
/// `min_free_slots` is a low-water mark: the fewest free slots the pool has
/// had at any point. A pool sized right for its workload keeps it above
/// zero.
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    /// Capacity of the pool.
    pub total_slots: usize,
    /// Slots currently free.
    pub free_slots: usize,
    /// Slots currently holding a value.
    pub used_slots: usize,
    /// Fewest free slots observed over the pool's lifetime.
    pub min_free_slots: usize,
}

impl PoolStats {
    /// True when every slot is occupied.
    pub const fn is_full(&self) -> bool {
        self.free_slots == 0
    }

    /// True when every slot is free.
    pub const fn is_empty(&self) -> bool {
        self.used_slots == 0
    }

    fn on_reserve(&mut self) {
        self.free_slots -= 1;
        self.used_slots += 1;
        self.min_free_slots = self.min_free_slots.min(self.free_slots);
    }

    fn on_release(&mut self) {
        // only reachable after a value actually left a slot
        debug_assert!(self.used_slots > 0);
        self.used_slots -= 1;
        self.free_slots += 1;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PoolStats {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "{}/{} slots used, min free {}",
            self.used_slots,
            self.total_slots,
            self.min_free_slots
        );
    }
}
