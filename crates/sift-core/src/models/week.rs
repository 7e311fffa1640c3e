//! Week key model
//!
//! Items are batched into weekly newsletters keyed by the Monday of the week
//! they were captured in.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// ISO date of the Monday anchoring a weekly batch of items.
///
/// Sunday counts as day 7 of the previous week, so a Sunday capture lands in
/// the batch that started six days earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekKey(NaiveDate);

impl WeekKey {
    /// Week key for the week containing the given date.
    #[must_use]
    pub fn for_date(date: NaiveDate) -> Self {
        let days_back = match date.weekday() {
            Weekday::Sun => 6,
            other => i64::from(other.number_from_monday() - 1),
        };
        Self(date - Duration::days(days_back))
    }

    /// Week key for the week containing the given Unix-millisecond timestamp (UTC).
    #[must_use]
    pub fn for_timestamp_millis(millis: i64) -> Self {
        let date = DateTime::from_timestamp_millis(millis)
            .unwrap_or(DateTime::UNIX_EPOCH)
            .date_naive();
        Self::for_date(date)
    }

    /// Week key for the current week.
    #[must_use]
    pub fn current() -> Self {
        Self::for_date(Utc::now().date_naive())
    }

    /// The Monday this key anchors.
    #[must_use]
    pub const fn as_date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for WeekKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(NaiveDate::parse_from_str(s, "%Y-%m-%d")?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monday_maps_to_itself() {
        let key = WeekKey::for_date(date(2024, 6, 3));
        assert_eq!(key.to_string(), "2024-06-03");
    }

    #[test]
    fn midweek_maps_to_preceding_monday() {
        assert_eq!(
            WeekKey::for_date(date(2024, 6, 5)).to_string(),
            "2024-06-03"
        );
        assert_eq!(
            WeekKey::for_date(date(2024, 6, 8)).to_string(),
            "2024-06-03"
        );
    }

    #[test]
    fn sunday_belongs_to_previous_week() {
        // 2024-06-09 is a Sunday; it is day 7 of the week starting 2024-06-03.
        assert_eq!(
            WeekKey::for_date(date(2024, 6, 9)).to_string(),
            "2024-06-03"
        );
        assert_eq!(
            WeekKey::for_date(date(2024, 6, 2)).to_string(),
            "2024-05-27"
        );
    }

    #[test]
    fn week_key_crosses_month_boundary() {
        // 2024-05-01 is a Wednesday.
        assert_eq!(
            WeekKey::for_date(date(2024, 5, 1)).to_string(),
            "2024-04-29"
        );
    }

    #[test]
    fn parse_and_display_roundtrip() {
        let key: WeekKey = "2024-06-03".parse().unwrap();
        assert_eq!(key, WeekKey::for_date(date(2024, 6, 3)));
        assert_eq!(key.to_string(), "2024-06-03");
    }

    #[test]
    fn serializes_as_iso_date_string() {
        let key = WeekKey::for_date(date(2024, 6, 3));
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"2024-06-03\"");
        let parsed: WeekKey = serde_json::from_str("\"2024-06-03\"").unwrap();
        assert_eq!(parsed, key);
    }

    #[test]
    fn timestamp_millis_uses_utc_date() {
        // 2024-06-05T12:00:00Z
        let key = WeekKey::for_timestamp_millis(1_717_588_800_000);
        assert_eq!(key.to_string(), "2024-06-03");
    }
}
