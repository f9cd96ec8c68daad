//! Two-tier reservation policy.
//!
//! Boards with external RAM prefer placing runtime buffers there and fall
//! back to internal memory when the preferred region is exhausted.
//! [`TieredPool`] captures that policy over two [`SlotPool`]s and remembers
//! per handle which tier satisfied the reservation.

use vmport_core::{PortError, PortResult};

use crate::{PoolStats, SlotHandle, SlotPool};

/// The storage tier that satisfied a reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// First-choice region, tried on every reservation
    Preferred,
    /// Used only when the preferred region is exhausted
    Fallback,
}

#[cfg(feature = "defmt")]
impl defmt::Format for Tier {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Tier::Preferred => defmt::write!(fmt, "Preferred"),
            Tier::Fallback => defmt::write!(fmt, "Fallback"),
        }
    }
}

/// Handle to a slot reserved through a [`TieredPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TieredHandle {
    tier: Tier,
    handle: SlotHandle,
}

impl TieredHandle {
    /// The tier holding the slot
    pub const fn tier(&self) -> Tier {
        self.tier
    }

    /// The handle within that tier's pool
    pub const fn slot(&self) -> SlotHandle {
        self.handle
    }
}

/// Preferred-then-fallback reservation over two slot pools.
pub struct TieredPool<T, const P: usize, const F: usize> {
    preferred: SlotPool<T, P>,
    fallback: SlotPool<T, F>,
}

impl<T, const P: usize, const F: usize> TieredPool<T, P, F> {
    /// Create a pool with both tiers empty
    pub const fn new() -> Self {
        Self {
            preferred: SlotPool::new(),
            fallback: SlotPool::new(),
        }
    }

    /// Reserves a slot, trying the preferred tier first.
    ///
    /// The value is handed back when both tiers are exhausted.
    pub fn try_reserve(&self, value: T) -> Result<TieredHandle, T> {
        match self.preferred.try_reserve(value) {
            Ok(handle) => Ok(TieredHandle {
                tier: Tier::Preferred,
                handle,
            }),
            Err(value) => self.fallback.try_reserve(value).map(|handle| TieredHandle {
                tier: Tier::Fallback,
                handle,
            }),
        }
    }

    /// Reserves a slot, trying the preferred tier first.
    pub fn reserve(&self, value: T) -> PortResult<TieredHandle> {
        self.try_reserve(value).map_err(|_| PortError::PoolExhausted)
    }

    /// Runs `f` with shared access to the slot value.
    pub fn with_ref<R, G>(&self, handle: TieredHandle, f: G) -> PortResult<R>
    where
        G: FnOnce(&T) -> R,
    {
        match handle.tier {
            Tier::Preferred => self.preferred.with_ref(handle.handle, f),
            Tier::Fallback => self.fallback.with_ref(handle.handle, f),
        }
    }

    /// Runs `f` with exclusive access to the slot value.
    pub fn with<R, G>(&self, handle: TieredHandle, f: G) -> PortResult<R>
    where
        G: FnOnce(&mut T) -> R,
    {
        match handle.tier {
            Tier::Preferred => self.preferred.with(handle.handle, f),
            Tier::Fallback => self.fallback.with(handle.handle, f),
        }
    }

    /// Releases the slot and returns its value.
    pub fn release(&self, handle: TieredHandle) -> PortResult<T> {
        match handle.tier {
            Tier::Preferred => self.preferred.release(handle.handle),
            Tier::Fallback => self.fallback.release(handle.handle),
        }
    }

    /// Statistics for one tier
    pub fn stats(&self, tier: Tier) -> PoolStats {
        match tier {
            Tier::Preferred => self.preferred.stats(),
            Tier::Fallback => self.fallback.stats(),
        }
    }
}

impl<T, const P: usize, const F: usize> Default for TieredPool<T, P, F> {
    fn default() -> Self {
        Self::new()
    }
}
