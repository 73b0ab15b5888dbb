//! Canonical 5-minute aggregation windows

use chrono::{DateTime, Duration, Utc};

pub const WINDOW_MINUTES: i64 = 5;
const WINDOW_SECS: i64 = WINDOW_MINUTES * 60;

/// Half-open interval `[start, end)` aligned to a 5-minute UTC boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    pub fn duration() -> Duration {
        Duration::seconds(WINDOW_SECS)
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} → {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Window containing `now`: start truncated down to the 5-minute boundary
/// (seconds and sub-seconds zeroed), end = start + 5 minutes.
pub fn aligned_window(now: DateTime<Utc>) -> Window {
    let into_window = Duration::seconds(now.timestamp().rem_euclid(WINDOW_SECS))
        + Duration::nanoseconds(i64::from(now.timestamp_subsec_nanos()));
    let start = now - into_window;

    Window {
        start,
        end: start + Window::duration(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_truncates_to_five_minute_boundary() {
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 10, 37, 42).unwrap()
            + Duration::milliseconds(512);

        let window = aligned_window(now);

        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 3, 14, 10, 35, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2024, 3, 14, 10, 40, 0).unwrap());
        assert_eq!(window.start.nanosecond(), 0);
        assert!(window.contains(now));
    }

    #[test]
    fn test_boundary_instant_starts_its_own_window() {
        let now = Utc.with_ymd_and_hms(2024, 3, 14, 10, 40, 0).unwrap();

        let window = aligned_window(now);

        assert_eq!(window.start, now);
        assert!(!aligned_window(now - Duration::nanoseconds(1)).contains(now));
    }

    #[test]
    fn test_hour_rollover() {
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();

        let window = aligned_window(now);

        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 12, 31, 23, 55, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_deterministic_within_window() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 1).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 1, 0, 9, 59).unwrap();

        assert_eq!(aligned_window(a), aligned_window(b));
        assert_eq!(aligned_window(a), aligned_window(a));
    }
}
