//! Streak arithmetic: expected length from metadata and backdated timestamps.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

pub const SECS_PER_DAY: i64 = 86_400;

/// Recorded start/end of the account's current streak, as unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakWindow {
    pub start: i64,
    pub end: i64,
}

impl StreakWindow {
    /// Read `currentStreak.startDate/endDate` from raw streak metadata.
    ///
    /// Returns `None` when `currentStreak` is absent, null or empty. Dates that
    /// fail to parse fall back to `now`.
    pub fn from_metadata(metadata: &Value, now: i64) -> Option<Self> {
        let current = metadata.get("currentStreak")?.as_object()?;
        if current.is_empty() {
            return None;
        }
        let date = |key: &str| {
            current
                .get(key)
                .and_then(Value::as_str)
                .and_then(parse_timestamp)
                .unwrap_or(now)
        };
        Some(Self {
            start: date("startDate"),
            end: date("endDate"),
        })
    }

    /// `floor((end - start) / day) + 1`, at least 1.
    pub fn expected_length(&self) -> u64 {
        let days = (self.end - self.start).div_euclid(SECS_PER_DAY) + 1;
        days.max(1) as u64
    }

    /// Days missing from the observed streak length.
    pub fn deficit(&self, observed: u64) -> u64 {
        self.expected_length().saturating_sub(observed)
    }
}

/// Timestamps for repair backfills: one per missing day, each a day older.
pub fn backfill_timestamps(now: i64, deficit: u64) -> Vec<i64> {
    (0..deficit as i64)
        .map(|i| now - (i + 1) * SECS_PER_DAY)
        .collect()
}

/// Timestamp for the next streak-farm session.
///
/// Starts a day back and moves one more day back per streak already gained
/// since the baseline, so successive sessions land on distinct days.
pub fn farm_timestamp(now: i64, baseline_streak: u64, current_streak: u64) -> i64 {
    let gained = current_streak.saturating_sub(baseline_streak) as i64;
    now - SECS_PER_DAY - gained * SECS_PER_DAY
}

/// Parse an ISO-8601 date or datetime into unix seconds (naive values as UTC).
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc().timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt.and_utc().timestamp());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expected_length_counts_inclusive_days() {
        let metadata = json!({"currentStreak": {"startDate": "2024-01-01", "endDate": "2024-01-05"}});
        let window = StreakWindow::from_metadata(&metadata, 0).expect("window");
        assert_eq!(window.expected_length(), 5);
        assert_eq!(window.deficit(3), 2);
        assert_eq!(window.deficit(9), 0);
    }

    #[test]
    fn inverted_window_is_at_least_one_day() {
        let window = StreakWindow {
            start: 10 * SECS_PER_DAY,
            end: 0,
        };
        assert_eq!(window.expected_length(), 1);
    }

    #[test]
    fn missing_or_empty_current_streak_yields_none() {
        assert_eq!(StreakWindow::from_metadata(&Value::Null, 0), None);
        assert_eq!(StreakWindow::from_metadata(&json!({}), 0), None);
        assert_eq!(
            StreakWindow::from_metadata(&json!({"currentStreak": {}}), 0),
            None
        );
        assert_eq!(
            StreakWindow::from_metadata(&json!({"currentStreak": null}), 0),
            None
        );
    }

    #[test]
    fn unparseable_dates_fall_back_to_now() {
        let metadata = json!({"currentStreak": {"startDate": "soon", "endDate": "2024-01-05"}});
        let now = 1_800_000_000;
        let window = StreakWindow::from_metadata(&metadata, now).expect("window");
        assert_eq!(window.start, now);
        assert_eq!(window.expected_length(), 1);
    }

    #[test]
    fn backfills_step_back_one_day_each() {
        let now = 1_700_000_000;
        assert_eq!(
            backfill_timestamps(now, 3),
            vec![now - SECS_PER_DAY, now - 2 * SECS_PER_DAY, now - 3 * SECS_PER_DAY]
        );
        assert!(backfill_timestamps(now, 0).is_empty());
    }

    #[test]
    fn farm_timestamp_moves_back_with_gains() {
        let now = 1_700_000_000;
        assert_eq!(farm_timestamp(now, 5, 5), now - SECS_PER_DAY);
        assert_eq!(farm_timestamp(now, 5, 7), now - 3 * SECS_PER_DAY);
    }

    #[test]
    fn parses_common_date_shapes() {
        assert_eq!(parse_timestamp("1970-01-02"), Some(SECS_PER_DAY));
        assert_eq!(parse_timestamp("1970-01-02T00:00:10"), Some(SECS_PER_DAY + 10));
        assert_eq!(parse_timestamp("1970-01-02T00:00:00+00:00"), Some(SECS_PER_DAY));
        assert_eq!(parse_timestamp("nope"), None);
    }
}
