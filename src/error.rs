//! Error taxonomy for the platform layer.
//!
//! Three tiers: degraded subsystems keep running (a failed panel init leaves
//! the transport non-ready and flushes become no-ops), reported conditions
//! are logged and returned to the caller (short reads, unknown link bytes),
//! and [`FatalError`] is the single unrecoverable path. There is no process
//! to exit to on the target, so the firmware top level answers a fatal error
//! with log, bounded delay, full reset.

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageError {
    /// No card in the socket (detect pin open).
    NoMedium,
    /// Operation needs a mounted volume.
    NotMounted,
    NotFound,
    /// All descriptor slots are in use.
    TableFull,
    /// Stale or never-issued handle, e.g. use after close.
    BadHandle,
    OutOfMemory,
    /// Fewer bytes arrived than the caller asked for.
    ShortRead { wanted: usize, got: usize },
    /// Bus or card error reported by the backend.
    Device,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayError {
    /// SPI bus setup or transfer failure.
    Bus,
    /// Panel rejected part of its init sequence.
    Panel,
}

/// The only error with no recovery. Everything that reaches this type has
/// already been judged unsalvageable; the run loop translates it into a
/// controlled restart, never a partial continuation.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FatalError {
    /// The allocator refused the framebuffer.
    FramebufferAlloc,
    /// Display is mandatory and never reached ready.
    DisplayInit(DisplayError),
    /// Storage is mandatory (assets live there) and would not mount.
    StorageMount(StorageError),
}
