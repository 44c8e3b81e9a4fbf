//! Hardware-independent platform layer for the picodoom handheld port.
//!
//! The engine proper (simulation, rendering rules, asset formats) is an
//! external black box; this crate owns everything it needs from the machine:
//! an off-screen pixel surface, button snapshots with edge detection, a
//! POSIX-ish file surface over removable storage, monotonic game time and the
//! fixed-period tick schedule. The firmware crate wires these onto real
//! peripherals; everything here runs on the host for testing.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod clock;
pub mod error;
pub mod framebuffer;
pub mod input;
pub mod link;
pub mod storage;
pub mod tick;

pub use error::{DisplayError, FatalError, StorageError};
pub use framebuffer::FrameBuffer;
pub use input::{Buttons, InputSource, InputState};
pub use link::{BytePort, RemoteLink};
pub use storage::{Handle, Storage, StorageBackend};
pub use tick::{Engine, Platform, TickDriver, TickSchedule};
