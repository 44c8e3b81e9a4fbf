//! The periodic wrapper around the externally-owned engine step.
//!
//! Deadlines are absolute: the next wake is last wake plus the period, so
//! jitter inside one tick never drifts the cadence. An overrun gets at most
//! one immediate catch-up tick before the schedule snaps back onto the
//! boundary grid; there is no backlog execution.

use crate::framebuffer::FrameBuffer;
use crate::input::{InputSource, InputState};
use crate::storage::{Storage, StorageBackend};

/// Presentation period between simulate+render+flush passes.
pub const TICK_PERIOD_MS: u64 = 33;

pub struct TickSchedule {
    period_us: u64,
    next_us: u64,
}

impl TickSchedule {
    pub fn new(period_us: u64, now_us: u64) -> Self {
        Self {
            period_us,
            next_us: now_us,
        }
    }

    /// Absolute time the caller should sleep until before the next tick.
    /// A returned deadline in the past means "run now" (the bounded
    /// catch-up); deadlines older than one period are skipped entirely.
    pub fn next_wake(&mut self, now_us: u64) -> u64 {
        self.next_us += self.period_us;
        while self.next_us + self.period_us <= now_us {
            self.next_us += self.period_us;
        }
        self.next_us
    }
}

/// The platform context handed to the engine every step: the machine state
/// that used to be scattered globals, owned in one place so tests can build
/// doubles of it.
pub struct Platform<B: StorageBackend, const FILES: usize> {
    pub framebuffer: FrameBuffer,
    pub input: InputState,
    pub storage: Storage<B, FILES>,
}

/// One fixed-size simulation+render step of the external engine. The engine
/// reads input, mutates its own world and draws into the framebuffer, all
/// synchronously inside `step`.
pub trait Engine<B: StorageBackend, const FILES: usize> {
    fn step(&mut self, platform: &mut Platform<B, FILES>);
}

pub struct TickDriver<E, B: StorageBackend, const FILES: usize> {
    platform: Platform<B, FILES>,
    engine: E,
    schedule: TickSchedule,
}

impl<E, B, const FILES: usize> TickDriver<E, B, FILES>
where
    B: StorageBackend,
    E: Engine<B, FILES>,
{
    pub fn new(engine: E, platform: Platform<B, FILES>, period_us: u64, now_us: u64) -> Self {
        Self {
            platform,
            engine,
            schedule: TickSchedule::new(period_us, now_us),
        }
    }

    pub fn platform(&mut self) -> &mut Platform<B, FILES> {
        &mut self.platform
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Sample input, run one engine step, return the completed frame for the
    /// caller to flush. Flushing stays outside so the transport can overlap
    /// the transfer with the sleep to the next deadline.
    pub fn tick<I: InputSource>(&mut self, source: &mut I, now_us: u64) -> &FrameBuffer {
        self.platform.input.update(source, now_us / 1_000);
        self.engine.step(&mut self.platform);
        &self.platform.framebuffer
    }

    pub fn next_wake(&mut self, now_us: u64) -> u64 {
        self.schedule.next_wake(now_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: u64 = 33_000;

    #[test]
    fn deadlines_are_absolute_not_relative() {
        let t0 = 1_000_000;
        let mut schedule = TickSchedule::new(PERIOD, t0);
        // 5ms of work per tick must not push the grid.
        assert_eq!(schedule.next_wake(t0 + 5_000), t0 + PERIOD);
        assert_eq!(schedule.next_wake(t0 + PERIOD + 5_000), t0 + 2 * PERIOD);
        assert_eq!(schedule.next_wake(t0 + 2 * PERIOD + 5_000), t0 + 3 * PERIOD);
    }

    #[test]
    fn single_overrun_gets_one_immediate_catch_up() {
        let t0 = 0;
        let mut schedule = TickSchedule::new(PERIOD, t0);
        // Tick ran 40ms; the 33ms deadline already passed.
        let wake = schedule.next_wake(40_000);
        assert_eq!(wake, PERIOD);
        assert!(wake < 40_000);
        // The follow-up lands back on the grid.
        assert_eq!(schedule.next_wake(45_000), 2 * PERIOD);
    }

    #[test]
    fn long_stall_skips_missed_deadlines_instead_of_replaying_them() {
        let mut schedule = TickSchedule::new(PERIOD, 0);
        // Six periods of stall: deadlines 33..165 are gone, 198 is next,
        // and the one immediately behind `now` is the only catch-up.
        let wake = schedule.next_wake(200_000);
        assert_eq!(wake, 6 * PERIOD);
        assert_eq!(schedule.next_wake(205_000), 7 * PERIOD);
    }
}
