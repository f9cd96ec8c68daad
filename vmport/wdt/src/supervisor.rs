//! Watchdog checkpoint supervisor.

use vmport_core::{PortError, PortResult};

/// Highest number of checkpoints a supervisor can hand out between resets.
pub const MAX_CHECKPOINTS: u8 = 32;

/// Lifecycle of the supervised watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogStatus {
    /// Not initialized; no operation except `init` is allowed
    Off,
    /// Initialized; checkpoints can be registered, the countdown is not
    /// running
    Initialized,
    /// The hardware countdown is running
    Started,
}

#[cfg(feature = "defmt")]
impl defmt::Format for WatchdogStatus {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            WatchdogStatus::Off => defmt::write!(fmt, "Off"),
            WatchdogStatus::Initialized => defmt::write!(fmt, "Initialized"),
            WatchdogStatus::Started => defmt::write!(fmt, "Started"),
        }
    }
}

/// Identifier of a registered checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointId(u8);

impl CheckpointId {
    /// Returns the raw identifier (the bit position in the masks).
    pub const fn raw(&self) -> u8 {
        self.0
    }

    const fn mask(&self) -> u32 {
        1u32 << self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CheckpointId {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "CheckpointId({})", self.0);
    }
}

/// Hardware seam of the supervisor.
///
/// On a board this wraps the task watchdog peripheral; hosts substitute a
/// software countdown.
pub trait WatchdogBackend {
    /// Prepares the hardware without starting the countdown.
    fn init(&mut self) -> PortResult<()>;

    /// Starts the countdown.
    fn start(&mut self) -> PortResult<()>;

    /// Stops the countdown.
    fn stop(&mut self) -> PortResult<()>;

    /// Restarts the countdown from its full timeout.
    fn refresh(&mut self) -> PortResult<()>;

    /// Whether the last system reset was caused by this watchdog.
    fn reset_was_watchdog(&self) -> bool;

    /// Configured countdown timeout in milliseconds.
    fn timeout_ms(&self) -> i64;
}

/// Refreshes a watchdog backend only when every registered checkpoint has
/// reported.
///
/// Checkpoint identifiers are bit positions in a 32-bit mask, handed out
/// monotonically. Unregistering frees the bit but not the identifier;
/// [`stop`] resets the whole checkpoint space.
///
/// [`stop`]: Self::stop
pub struct WatchdogSupervisor<B: WatchdogBackend> {
    backend: B,
    status: WatchdogStatus,
    registered: u32,
    passed: u32,
    next_id: u8,
}

impl<B: WatchdogBackend> WatchdogSupervisor<B> {
    /// Creates a supervisor in the [`Off`] state.
    ///
    /// [`Off`]: WatchdogStatus::Off
    pub const fn new(backend: B) -> Self {
        Self {
            backend,
            status: WatchdogStatus::Off,
            registered: 0,
            passed: 0,
            next_id: 0,
        }
    }

    /// Initializes the backend. Initializing twice is a no-op.
    pub fn init(&mut self) -> PortResult<()> {
        if self.status == WatchdogStatus::Off {
            self.backend.init()?;
            self.status = WatchdogStatus::Initialized;
        }
        Ok(())
    }

    /// Starts the countdown. Starting twice is a no-op; starting before
    /// [`init`] fails.
    ///
    /// [`init`]: Self::init
    pub fn start(&mut self) -> PortResult<()> {
        match self.status {
            WatchdogStatus::Initialized => {
                self.backend.start()?;
                self.status = WatchdogStatus::Started;
                Ok(())
            }
            WatchdogStatus::Started => Ok(()),
            WatchdogStatus::Off => Err(PortError::NotInitialized),
        }
    }

    /// Stops the countdown and resets the checkpoint space.
    ///
    /// Stopping a supervisor that is not started is a no-op and keeps its
    /// checkpoints.
    pub fn stop(&mut self) -> PortResult<()> {
        if self.status != WatchdogStatus::Started {
            return Ok(());
        }
        self.backend.stop()?;
        self.status = WatchdogStatus::Initialized;
        self.registered = 0;
        self.passed = 0;
        self.next_id = 0;
        Ok(())
    }

    /// Registers a new checkpoint and returns its identifier.
    ///
    /// At most [`MAX_CHECKPOINTS`] identifiers exist between resets of the
    /// checkpoint space, even if some were unregistered in the meantime.
    pub fn register_checkpoint(&mut self) -> PortResult<CheckpointId> {
        if self.status == WatchdogStatus::Off {
            return Err(PortError::NotInitialized);
        }
        if self.next_id >= MAX_CHECKPOINTS {
            return Err(PortError::CheckpointLimit);
        }
        let id = CheckpointId(self.next_id);
        self.registered |= id.mask();
        self.next_id += 1;
        Ok(id)
    }

    /// Removes a checkpoint from supervision.
    pub fn unregister_checkpoint(&mut self, id: CheckpointId) -> PortResult<()> {
        if self.status == WatchdogStatus::Off {
            return Err(PortError::NotInitialized);
        }
        if !self.is_registered(id) {
            return Err(PortError::InvalidArgument);
        }
        self.registered &= !id.mask();
        self.passed &= !id.mask();
        Ok(())
    }

    /// Marks the checkpoint as passed.
    ///
    /// When every registered checkpoint has passed since the last refresh,
    /// the backend is refreshed, the passed marks are cleared and the call
    /// returns `Ok(true)`.
    pub fn checkpoint(&mut self, id: CheckpointId) -> PortResult<bool> {
        if self.status == WatchdogStatus::Off {
            return Err(PortError::NotInitialized);
        }
        if !self.is_registered(id) {
            return Err(PortError::InvalidArgument);
        }
        self.passed |= id.mask();
        if self.passed & self.registered == self.registered {
            self.backend.refresh()?;
            self.passed = 0;
            return Ok(true);
        }
        Ok(false)
    }

    /// Refreshes the backend directly, bypassing checkpoint accounting.
    pub fn refresh(&mut self) -> PortResult<()> {
        self.backend.refresh()
    }

    /// Whether the last system reset was caused by the watchdog.
    pub fn reset_was_watchdog(&self) -> bool {
        self.backend.reset_was_watchdog()
    }

    /// Configured countdown timeout in milliseconds.
    pub fn timeout_ms(&self) -> i64 {
        self.backend.timeout_ms()
    }

    /// Current lifecycle state
    pub fn status(&self) -> WatchdogStatus {
        self.status
    }

    /// Number of currently registered checkpoints
    pub fn registered_count(&self) -> u32 {
        self.registered.count_ones()
    }

    /// The supervised backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn is_registered(&self, id: CheckpointId) -> bool {
        id.0 < MAX_CHECKPOINTS && self.registered & id.mask() != 0
    }
}
