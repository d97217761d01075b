use std::fmt;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A wiki timestamp in the fixed-width `YYYY-MM-DDTHH:MM:SSZ` form.
///
/// Values are only built from a UTC datetime or from a string that passed
/// [`Timestamp::parse`], so comparing the underlying strings gives the same
/// order as comparing the instants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(String);

impl Timestamp {
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.format(FORMAT).to_string())
    }

    /// Validate a backend-supplied timestamp. Returns `None` for anything that
    /// is not exactly the fixed-width UTC form.
    pub fn parse(raw: &str) -> Option<Self> {
        let parsed = NaiveDateTime::parse_from_str(raw, FORMAT).ok()?;
        // chrono tolerates space padding; only the canonical rendering keeps
        // string order equal to time order.
        (parsed.format(FORMAT).to_string() == raw).then(|| Self(raw.to_string()))
    }

    /// The cutoff for a run starting at `now`: anything pending since before
    /// this instant was already covered by an earlier report.
    pub fn cutoff(now: DateTime<Utc>, window_hours: u64) -> Self {
        let hours = i64::try_from(window_hours).unwrap_or(i64::MAX);
        let window = Duration::try_hours(hours).unwrap_or(Duration::MAX);
        let at = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self::from_datetime(at)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_is_zero_padded() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(
            Timestamp::from_datetime(at).as_str(),
            "2024-03-05T07:08:09Z"
        );
    }

    #[test]
    fn test_cutoff_is_one_day_back() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 30, 0).unwrap();
        assert_eq!(Timestamp::cutoff(now, 24).as_str(), "2024-02-29T00:30:00Z");
    }

    #[test]
    fn test_parse_accepts_wiki_format() {
        let ts = Timestamp::parse("2023-12-31T23:59:59Z").unwrap();
        assert_eq!(ts.to_string(), "2023-12-31T23:59:59Z");
    }

    #[test]
    fn test_parse_rejects_other_shapes() {
        assert!(Timestamp::parse("2023-12-31 23:59:59").is_none());
        assert!(Timestamp::parse("2023-1-31T23:59:59Z").is_none());
        assert!(Timestamp::parse("2023-12-31T23:59:59.000Z").is_none());
        assert!(Timestamp::parse("").is_none());
    }

    #[test]
    fn test_parse_rejects_space_padding() {
        assert!(Timestamp::parse("2024- 5-01T00:00:00Z").is_none());
        assert!(Timestamp::parse("2024-05-01T 0:00:00Z").is_none());
        assert!(Timestamp::parse("2024-05-01T00:00:00Z").is_some());
    }

    #[test]
    fn test_string_order_matches_time_order() {
        let earlier = Timestamp::parse("2023-09-30T23:59:59Z").unwrap();
        let later = Timestamp::parse("2023-10-01T00:00:00Z").unwrap();
        assert!(earlier < later);
    }
}
