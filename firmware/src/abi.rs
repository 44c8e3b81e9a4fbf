//! The flat `extern "C"` surface the unmodified engine links against, plus
//! the engine's own entrypoints.
//!
//! The engine is a black box with two entrypoints; everything it needs back
//! from the machine goes through the exports below. They are only live
//! while an engine step is on the stack: the platform pointer is published
//! at the top of `step` and cleared on the way out, so a stray call from
//! anywhere else degrades to a no-op instead of touching freed state.

use core::ptr;

use alloc::boxed::Box;
use embassy_time::Instant;
use picodoom_platform::{clock, Buttons, Engine, Handle, Platform};

use crate::storage::{SdBackend, MAX_OPEN_FILES};

type FirmwarePlatform = Platform<SdBackend, MAX_OPEN_FILES>;

static mut PLATFORM: *mut FirmwarePlatform = ptr::null_mut();

extern "C" {
    fn doom_init();
    fn doom_game_tick();
}

/// The externally linked engine, one fixed-size simulate+render step per
/// tick. Init is deferred to the first step so the engine can already open
/// its assets through the platform.
pub struct CEngine {
    initialized: bool,
}

impl CEngine {
    pub const fn new() -> Self {
        Self { initialized: false }
    }
}

impl Engine<SdBackend, MAX_OPEN_FILES> for CEngine {
    fn step(&mut self, platform: &mut FirmwarePlatform) {
        unsafe {
            PLATFORM = platform as *mut _;
            if !self.initialized {
                self.initialized = true;
                doom_init();
            }
            doom_game_tick();
            PLATFORM = ptr::null_mut();
        }
    }
}

fn with_platform<T>(f: impl FnOnce(&mut FirmwarePlatform) -> T) -> Option<T> {
    unsafe { PLATFORM.as_mut() }.map(f)
}

// --- pixel surface ---

#[no_mangle]
pub extern "C" fn platform_clear() {
    with_platform(|p| p.framebuffer.clear());
}

#[no_mangle]
pub extern "C" fn platform_draw_pixel(x: i32, y: i32, color: u16) {
    with_platform(|p| p.framebuffer.draw_pixel(x, y, color));
}

#[no_mangle]
pub extern "C" fn platform_draw_hline(x: i32, y: i32, w: i32, color: u16) {
    with_platform(|p| p.framebuffer.draw_hline(x, y, w, color));
}

#[no_mangle]
pub extern "C" fn platform_draw_vline(x: i32, y: i32, h: i32, color: u16) {
    with_platform(|p| p.framebuffer.draw_vline(x, y, h, color));
}

#[no_mangle]
pub extern "C" fn platform_draw_rect(x: i32, y: i32, w: i32, h: i32, color: u16) {
    with_platform(|p| p.framebuffer.draw_rect(x, y, w, h, color));
}

#[no_mangle]
pub extern "C" fn platform_fill_rect(x: i32, y: i32, w: i32, h: i32, color: u16) {
    with_platform(|p| p.framebuffer.fill_rect(x, y, w, h, color));
}

// --- input state ---

fn input_down(signal: Buttons) -> bool {
    with_platform(|p| p.input.is_down(signal)).unwrap_or(false)
}

#[no_mangle]
pub extern "C" fn platform_input_left() -> bool {
    input_down(Buttons::LEFT)
}

#[no_mangle]
pub extern "C" fn platform_input_right() -> bool {
    input_down(Buttons::RIGHT)
}

#[no_mangle]
pub extern "C" fn platform_input_up() -> bool {
    input_down(Buttons::UP)
}

#[no_mangle]
pub extern "C" fn platform_input_down() -> bool {
    input_down(Buttons::DOWN)
}

#[no_mangle]
pub extern "C" fn platform_input_fire() -> bool {
    input_down(Buttons::FIRE)
}

#[no_mangle]
pub extern "C" fn platform_input_start() -> bool {
    input_down(Buttons::START)
}

// --- time ---

#[no_mangle]
pub extern "C" fn platform_now_micros() -> u64 {
    Instant::now().as_micros()
}

#[no_mangle]
pub extern "C" fn platform_get_ticks() -> i32 {
    clock::ticks(Instant::now().as_micros()) as i32
}

#[no_mangle]
pub extern "C" fn platform_get_tick_fraction() -> u32 {
    clock::tick_fraction(Instant::now().as_micros())
}

// --- file surface ---

/// Returns a packed descriptor, or -1 when the path is bad, the table is
/// full or the open fails.
#[no_mangle]
pub unsafe extern "C" fn platform_open(path: *const u8, len: usize) -> i32 {
    let path = unsafe { core::slice::from_raw_parts(path, len) };
    let Ok(path) = core::str::from_utf8(path) else {
        return -1;
    };
    with_platform(|p| match p.storage.open(path) {
        Ok(handle) => handle.into_raw(),
        Err(_) => -1,
    })
    .unwrap_or(-1)
}

/// Bytes actually read, which may be short; -1 on a bad descriptor.
#[no_mangle]
pub unsafe extern "C" fn platform_read(fd: i32, buf: *mut u8, len: usize) -> i32 {
    let Some(handle) = Handle::from_raw(fd) else {
        return -1;
    };
    let buf = unsafe { core::slice::from_raw_parts_mut(buf, len) };
    with_platform(|p| match p.storage.read(handle, buf) {
        Ok(got) => got as i32,
        Err(_) => -1,
    })
    .unwrap_or(-1)
}

#[no_mangle]
pub extern "C" fn platform_seek(fd: i32, offset: u32) -> i32 {
    let Some(handle) = Handle::from_raw(fd) else {
        return -1;
    };
    with_platform(|p| match p.storage.seek(handle, offset) {
        Ok(()) => 0,
        Err(_) => -1,
    })
    .unwrap_or(-1)
}

#[no_mangle]
pub extern "C" fn platform_file_length(fd: i32) -> i32 {
    let Some(handle) = Handle::from_raw(fd) else {
        return -1;
    };
    with_platform(|p| match p.storage.length(handle) {
        Ok(len) => len as i32,
        Err(_) => -1,
    })
    .unwrap_or(-1)
}

#[no_mangle]
pub extern "C" fn platform_close(fd: i32) {
    if let Some(handle) = Handle::from_raw(fd) {
        with_platform(|p| p.storage.close(handle));
    }
}

/// mmap emulation: the mapping is an owned heap buffer of exactly `len`
/// bytes, handed to the engine as a raw pointer. Null on any failure.
#[no_mangle]
pub extern "C" fn platform_mmap(fd: i32, len: usize, offset: u32) -> *mut u8 {
    let Some(handle) = Handle::from_raw(fd) else {
        return ptr::null_mut();
    };
    with_platform(|p| match p.storage.mmap(handle, len, offset) {
        Ok(buf) => Box::into_raw(buf.into_boxed_slice()) as *mut u8,
        Err(_err) => {
            #[cfg(feature = "defmt")]
            defmt::error!("mmap of {} bytes failed: {}", len, _err);
            ptr::null_mut()
        }
    })
    .unwrap_or(ptr::null_mut())
}

#[no_mangle]
pub unsafe extern "C" fn platform_munmap(ptr: *mut u8, len: usize) {
    if ptr.is_null() {
        return;
    }
    unsafe { drop(Box::from_raw(core::ptr::slice_from_raw_parts_mut(ptr, len))) };
}
