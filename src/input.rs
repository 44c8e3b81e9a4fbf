//! Button snapshots and press/release edge detection.
//!
//! The two physical backends (direct GPIO pins in the firmware crate and the
//! serial remote link in [`crate::link`]) both answer the same question:
//! which signals are asserted this tick. Everything above them works off the
//! one-snapshot-of-history pair kept here.

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Buttons: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const UP = 1 << 2;
        const DOWN = 1 << 3;
        const FIRE = 1 << 4;
        const START = 1 << 5;
    }
}

impl Default for Buttons {
    fn default() -> Self {
        Buttons::empty()
    }
}

/// A snapshot of the named boolean signals as of one poll.
pub trait InputSource {
    /// Zero-wait sample. `now_ms` lets link-style sources expire held
    /// signals without owning a clock of their own.
    fn poll(&mut self, now_ms: u64) -> Buttons;
}

/// Current and previous-tick signal state. No history beyond one tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct InputState {
    current: Buttons,
    previous: Buttons,
}

impl InputState {
    pub const fn new() -> Self {
        Self {
            current: Buttons::empty(),
            previous: Buttons::empty(),
        }
    }

    /// Copy current into previous, then resample. The order is the whole
    /// contract: a caller must never observe this tick's sample next to a
    /// stale previous value.
    pub fn update<S: InputSource + ?Sized>(&mut self, source: &mut S, now_ms: u64) {
        self.previous = self.current;
        self.current = source.poll(now_ms);
    }

    pub fn current(&self) -> Buttons {
        self.current
    }

    pub fn is_down(&self, buttons: Buttons) -> bool {
        self.current.contains(buttons)
    }

    /// Signals that went up this tick.
    pub fn pressed(&self) -> Buttons {
        self.current & !self.previous
    }

    /// Signals that went down this tick.
    pub fn released(&self) -> Buttons {
        self.previous & !self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted {
        frames: alloc::vec::Vec<Buttons>,
        at: usize,
    }

    impl InputSource for Scripted {
        fn poll(&mut self, _now_ms: u64) -> Buttons {
            let b = self.frames[self.at.min(self.frames.len() - 1)];
            self.at += 1;
            b
        }
    }

    #[test]
    fn press_edge_fires_exactly_once() {
        let mut src = Scripted {
            frames: alloc::vec![
                Buttons::empty(),
                Buttons::FIRE,
                Buttons::FIRE,
                Buttons::empty(),
            ],
            at: 0,
        };
        let mut state = InputState::new();

        state.update(&mut src, 0);
        assert!(state.pressed().is_empty());

        state.update(&mut src, 1);
        assert_eq!(state.pressed(), Buttons::FIRE);

        state.update(&mut src, 2);
        assert!(state.pressed().is_empty());
        assert!(state.is_down(Buttons::FIRE));

        state.update(&mut src, 3);
        assert_eq!(state.released(), Buttons::FIRE);
        assert!(!state.is_down(Buttons::FIRE));
    }

    #[test]
    fn simultaneous_signals_keep_independent_edges() {
        let mut src = Scripted {
            frames: alloc::vec![Buttons::LEFT, Buttons::LEFT | Buttons::UP],
            at: 0,
        };
        let mut state = InputState::new();
        state.update(&mut src, 0);
        assert_eq!(state.pressed(), Buttons::LEFT);
        state.update(&mut src, 1);
        assert_eq!(state.pressed(), Buttons::UP);
        assert!(state.is_down(Buttons::LEFT | Buttons::UP));
    }
}
