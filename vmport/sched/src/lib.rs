#![no_std]
#![forbid(unsafe_code)]

//! # VM Port Scheduling
//!
//! Sleep/wakeup plumbing between a managed-runtime VM and the platform it
//! runs on. The VM announces its next deadline through a
//! [`WakeupScheduler`], parks itself on an [`IdleSignal`], and is woken by
//! whichever side reaches the deadline first. [`WorkQueue`] adds bounded
//! bookkeeping for work the VM defers to a platform worker.

pub mod signal;
pub mod wakeup;
pub mod worker;

pub use signal::*;
pub use wakeup::*;
pub use worker::*;
