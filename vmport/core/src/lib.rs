#![no_std]
#![forbid(unsafe_code)]

//! # VM Port Core
//!
//! Foundation types for the VM port layer: interrupt-context tracking,
//! tick/millisecond timebase arithmetic, and the error type shared by the
//! port crates. Everything here is `no_std`, allocation-free, and safe to
//! call from interrupt handlers.

#[cfg(feature = "std")]
extern crate std;

use core::fmt;

pub mod interrupt;
pub mod time;

pub use interrupt::*;
pub use time::*;

/// VM port layer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type used throughout the VM port layer
pub type PortResult<T> = Result<T, PortError>;

/// Error types for VM port operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    /// Slot pool has no free slot
    PoolExhausted,
    /// No slot matched the lookup
    ItemNotFound,
    /// Handle or identifier is invalid for this operation
    InvalidArgument,
    /// Job queue is full
    QueueFull,
    /// Waiter list is full
    WaitQueueFull,
    /// Operation requires prior initialization
    NotInitialized,
    /// All checkpoint identifiers are in use
    CheckpointLimit,
    /// Platform timer operation failed
    TimerError,
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortError::PoolExhausted => write!(f, "Slot pool has no free slot"),
            PortError::ItemNotFound => write!(f, "No slot matched the lookup"),
            PortError::InvalidArgument => write!(f, "Handle or identifier is invalid"),
            PortError::QueueFull => write!(f, "Job queue is full"),
            PortError::WaitQueueFull => write!(f, "Waiter list is full"),
            PortError::NotInitialized => write!(f, "Operation requires prior initialization"),
            PortError::CheckpointLimit => write!(f, "All checkpoint identifiers are in use"),
            PortError::TimerError => write!(f, "Platform timer operation failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PortError {}

#[cfg(feature = "defmt")]
impl defmt::Format for PortError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            PortError::PoolExhausted => defmt::write!(fmt, "PoolExhausted"),
            PortError::ItemNotFound => defmt::write!(fmt, "ItemNotFound"),
            PortError::InvalidArgument => defmt::write!(fmt, "InvalidArgument"),
            PortError::QueueFull => defmt::write!(fmt, "QueueFull"),
            PortError::WaitQueueFull => defmt::write!(fmt, "WaitQueueFull"),
            PortError::NotInitialized => defmt::write!(fmt, "NotInitialized"),
            PortError::CheckpointLimit => defmt::write!(fmt, "CheckpointLimit"),
            PortError::TimerError => defmt::write!(fmt, "TimerError"),
        }
    }
}
