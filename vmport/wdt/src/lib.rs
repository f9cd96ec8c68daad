#![no_std]
#![forbid(unsafe_code)]

//! # VM Port Watchdog
//!
//! Checkpoint-based watchdog supervision. A hardware watchdog alone only
//! proves that *something* still runs; the supervisor refreshes it only when
//! every registered activity has reported since the last refresh, so a
//! single stuck task starves the refresh and forces the watchdog reset.

pub mod supervisor;

pub use supervisor::*;
