//! Game-time constants: a compressed 4-hour "day" of ten-minute "hours".

use crate::Millis;

/// Milliseconds per in-game hour.
pub const HOUR_MS: Millis = 10 * 60 * 1000;

/// Hours per in-game day.
pub const HOURS_PER_DAY: Millis = 24;

/// Milliseconds per in-game day (4 wall-clock hours).
pub const DAY_MS: Millis = HOURS_PER_DAY * HOUR_MS;

/// Position within the day/night cycle for a wall-clock time, in
/// milliseconds since in-game midnight. Used only for NPC scheduling.
pub fn day_night_ms(wall_clock: Millis) -> Millis {
    wall_clock.rem_euclid(DAY_MS)
}

/// In-game hour (0..24) for a wall-clock time.
pub fn day_night_hour(wall_clock: Millis) -> Millis {
    day_night_ms(wall_clock) / HOUR_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_wraps_every_four_hours() {
        assert_eq!(day_night_ms(0), 0);
        assert_eq!(day_night_ms(DAY_MS), 0);
        assert_eq!(day_night_ms(DAY_MS + 1), 1);
        assert_eq!(day_night_ms(-1), DAY_MS - 1);
    }

    #[test]
    fn hours_are_ten_minutes_long() {
        assert_eq!(day_night_hour(0), 0);
        assert_eq!(day_night_hour(HOUR_MS - 1), 0);
        assert_eq!(day_night_hour(HOUR_MS), 1);
        assert_eq!(day_night_hour(DAY_MS - 1), 23);
    }
}
