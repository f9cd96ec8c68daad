//! POSIX host port of the VM support layer.
//!
//! Substitutes threads, condvars and `Instant` for the RTOS services an
//! embedded port would use: a monotonic [`HostClock`], a drift-free
//! [`Ticker`] whose callbacks run in interrupt context, a
//! [`ThreadWakeupTimer`] and [`CondvarSignal`] driving the VM sleep/wakeup
//! cycle, a software [`HostWatchdog`] and a [`Worker`] thread executing
//! deferred jobs. Behavior matches the embedded contract, so runtime glue
//! can be exercised on a workstation before it touches a board.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use vmport_core::PortError;
use vmport_sched::IdleSignal;

pub mod clock;
pub mod signal;
pub mod ticker;
pub mod timer;
pub mod watchdog;
pub mod worker;

pub use clock::HostClock;
pub use signal::CondvarSignal;
pub use ticker::Ticker;
pub use timer::ThreadWakeupTimer;
pub use watchdog::HostWatchdog;
pub use worker::Worker;

/// Errors raised while setting up or running the host port.
#[derive(Error, Debug)]
pub enum HostError {
    /// Failure reported by the portable layer
    #[error("port error: {0}")]
    Port(#[from] PortError),
    /// Spawning a port thread failed
    #[error("thread spawn failed: {0}")]
    Spawn(#[from] io::Error),
    /// Installing the Ctrl-C hook failed
    #[error("shutdown hook installation failed: {0}")]
    Shutdown(#[from] ctrlc::Error),
}

/// Installs a Ctrl-C hook that trips `stop` and releases the VM task.
///
/// The hook runs on its own thread, so the plain release variant is the
/// right one.
pub fn install_shutdown_hook(
    stop: Arc<AtomicBool>,
    signal: Arc<CondvarSignal>,
) -> Result<(), HostError> {
    ctrlc::set_handler(move || {
        log::info!("shutdown requested");
        stop.store(true, Ordering::SeqCst);
        signal.release();
    })?;
    Ok(())
}
