//! Live countdown percentage.
//!
//! The cup fills while steeping and drains while cooling. Values depend on
//! the wall clock, so callers recompute on every redraw.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::session::Phase;

/// Redraw steps per phase; one per pixel row of the cup graphic.
pub const REDRAW_STEPS: u64 = 38;

/// 0..=100 progress through the current phase, ending at `scheduled_at`.
///
/// # Panics
///
/// Panics if `duration_secs` is zero. Sessions never carry a zero duration.
pub fn percentage(
    now: DateTime<Utc>,
    scheduled_at: DateTime<Utc>,
    duration_secs: u16,
    phase: Phase,
) -> u8 {
    assert!(duration_secs > 0, "progress requested for a zero-length phase");
    let duration = i64::from(duration_secs);
    let remaining = (scheduled_at - now).num_seconds();
    let elapsed = duration - remaining;
    let pct = (elapsed.saturating_mul(100) / duration).clamp(0, 100) as u8;
    match phase {
        Phase::Cooling => 100 - pct,
        Phase::Steeping | Phase::Ready => pct,
    }
}

/// How often a display should recompute `percentage` for a phase of this
/// length.
pub fn redraw_interval(duration_secs: u16) -> Duration {
    let ms = u64::from(duration_secs) * 1000 / REDRAW_STEPS;
    Duration::from_millis(ms.max(100))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use proptest::prelude::*;

    fn at(start: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
        start + ChronoDuration::seconds(secs)
    }

    #[test]
    fn steeping_endpoints() {
        let start = Utc::now();
        let end = at(start, 240);
        assert_eq!(percentage(start, end, 240, Phase::Steeping), 0);
        assert_eq!(percentage(at(start, 120), end, 240, Phase::Steeping), 50);
        assert_eq!(percentage(end, end, 240, Phase::Steeping), 100);
    }

    #[test]
    fn cooling_is_inverted() {
        let start = Utc::now();
        let end = at(start, 600);
        assert_eq!(percentage(start, end, 600, Phase::Cooling), 100);
        assert_eq!(percentage(at(start, 150), end, 600, Phase::Cooling), 75);
        assert_eq!(percentage(end, end, 600, Phase::Cooling), 0);
    }

    #[test]
    fn clamps_outside_the_phase() {
        let start = Utc::now();
        let end = at(start, 60);
        assert_eq!(percentage(at(start, -30), end, 60, Phase::Steeping), 0);
        assert_eq!(percentage(at(start, 500), end, 60, Phase::Steeping), 100);
        assert_eq!(percentage(at(start, 500), end, 60, Phase::Cooling), 0);
    }

    #[test]
    #[should_panic]
    fn zero_duration_is_a_bug() {
        let now = Utc::now();
        percentage(now, now, 0, Phase::Steeping);
    }

    #[test]
    fn redraw_interval_tracks_duration() {
        assert_eq!(redraw_interval(240), Duration::from_millis(6315));
        assert_eq!(redraw_interval(1), Duration::from_millis(100));
    }

    proptest! {
        #[test]
        fn always_within_bounds(duration in 1u16..=u16::MAX, offset in -200_000i64..200_000) {
            let end = Utc::now();
            let now = at(end, offset);
            prop_assert!(percentage(now, end, duration, Phase::Steeping) <= 100);
            prop_assert!(percentage(now, end, duration, Phase::Cooling) <= 100);
        }

        #[test]
        fn monotonic_in_elapsed(duration in 1u16..=7200, a in 0u16..=7200, b in 0u16..=7200) {
            let (lo, hi) = (a.min(b).min(duration), a.max(b).min(duration));
            let start = Utc::now();
            let end = at(start, i64::from(duration));
            let p = |e: u16, phase| percentage(at(start, i64::from(e)), end, duration, phase);
            prop_assert!(p(lo, Phase::Steeping) <= p(hi, Phase::Steeping));
            prop_assert!(p(lo, Phase::Cooling) >= p(hi, Phase::Cooling));
        }
    }
}
