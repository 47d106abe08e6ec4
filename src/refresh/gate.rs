//! Staleness gate deciding whether a channel is due for a re-fetch

use chrono::{DateTime, Duration, Utc};

use crate::models::Channel;

/// Whether a channel last refreshed at `last_refreshed_at` should be fetched
///
/// Forced refreshes and never-refreshed channels are always due; otherwise a
/// channel is due once at least `interval` has elapsed.
pub fn should_refresh(
    last_refreshed_at: Option<DateTime<Utc>>,
    interval: Duration,
    force: bool,
    now: DateTime<Utc>,
) -> bool {
    if force {
        return true;
    }
    match last_refreshed_at {
        None => true,
        Some(last) => now - last >= interval,
    }
}

impl Channel {
    pub fn is_due(&self, interval: Duration, force: bool, now: DateTime<Utc>) -> bool {
        should_refresh(self.last_refreshed_at, interval, force, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_force_always_refreshes() {
        let interval = Duration::hours(6);
        assert!(should_refresh(Some(now()), interval, true, now()));
        assert!(should_refresh(None, interval, true, now()));
    }

    #[test]
    fn test_never_refreshed_is_due() {
        assert!(should_refresh(None, Duration::hours(6), false, now()));
    }

    #[test]
    fn test_interval_boundary() {
        let interval = Duration::hours(6);
        let just_inside = now() - interval + Duration::seconds(1);
        assert!(!should_refresh(Some(just_inside), interval, false, now()));
        assert!(should_refresh(Some(now() - interval), interval, false, now()));
        assert!(should_refresh(
            Some(now() - interval - Duration::seconds(1)),
            interval,
            false,
            now()
        ));
    }

    #[test]
    fn test_future_timestamp_is_not_due() {
        let future = now() + Duration::minutes(5);
        assert!(!should_refresh(Some(future), Duration::hours(1), false, now()));
    }
}
