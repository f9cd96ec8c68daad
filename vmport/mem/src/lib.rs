#![no_std]
#![forbid(unsafe_code)]

//! # VM Port Memory
//!
//! Fixed-capacity slot pools for the VM port layer. Pools own their storage
//! statically and guard it with critical sections, so reservation and
//! release are safe from both task and interrupt context.

pub mod pool;
pub mod tiered;

pub use pool::*;
pub use tiered::*;
