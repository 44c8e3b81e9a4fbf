//! Game time as pure functions of the monotonic microsecond counter.
//!
//! The counter itself lives in hardware (or the test harness); nothing here
//! holds mutable state, so tick count and sub-tick fraction can never
//! disagree about what time it is. A u64 of microseconds does not wrap
//! within any plausible uptime.

/// Engine simulation rate, ticks per second.
pub const TICRATE: u32 = 35;

/// Fractional bits of [`tick_fraction`]'s fixed-point result.
pub const FRACBITS: u32 = 16;

/// Whole ticks elapsed since the counter's zero.
pub fn ticks(now_us: u64) -> u32 {
    (now_us * TICRATE as u64 / 1_000_000) as u32
}

/// Position inside the current tick as an unsigned 16.16 fixed-point
/// fraction in `[0, 1)`.
pub fn tick_fraction(now_us: u64) -> u32 {
    let scaled = now_us * TICRATE as u64;
    (((scaled % 1_000_000) << FRACBITS) / 1_000_000) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_advance_at_ticrate() {
        assert_eq!(ticks(0), 0);
        assert_eq!(ticks(999_999 / TICRATE as u64), 0);
        assert_eq!(ticks(1_000_000), TICRATE);
        assert_eq!(ticks(10_000_000), 10 * TICRATE);
    }

    #[test]
    fn fraction_stays_below_one_and_resets_on_the_tick() {
        assert_eq!(tick_fraction(0), 0);
        let tick_us = 1_000_000 / TICRATE as u64;
        // Just before the boundary the fraction is nearly 1.0.
        assert!(tick_fraction(tick_us - 1) > 0xF000);
        assert!(tick_fraction(tick_us - 1) < 1 << FRACBITS);
        // Half a tick in, the fraction is close to 0.5.
        let half = tick_fraction(tick_us / 2);
        assert!((half as i64 - (1 << (FRACBITS - 1))).abs() < 0x800);
    }

    #[test]
    fn derivations_are_pure() {
        let t = 123_456_789;
        assert_eq!(ticks(t), ticks(t));
        assert_eq!(tick_fraction(t), tick_fraction(t));
    }
}
