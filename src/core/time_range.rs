use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// GetMetricStatistics rejects requests that would return more datapoints.
pub const MAX_DATAPOINTS_PER_REQUEST: u32 = 1440;

/// A closed UTC window `[start, end]` used for metric and log queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The last `hours` hours ending now.
    pub fn last_hours(hours: u32) -> Self {
        Self::ending_at(Utc::now(), hours)
    }

    pub fn ending_at(end: DateTime<Utc>, hours: u32) -> Self {
        Self {
            start: end - Duration::hours(i64::from(hours)),
            end,
        }
    }

    pub fn last_days(days: u32) -> Self {
        Self::last_hours(days.saturating_mul(24))
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn hours(&self) -> f64 {
        self.duration().num_seconds() as f64 / 3600.0
    }

    pub fn start_millis(&self) -> i64 {
        self.start.timestamp_millis()
    }

    pub fn end_millis(&self) -> i64 {
        self.end.timestamp_millis()
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    pub fn buckets(&self, count: usize) -> Vec<DateTime<Utc>> {
        time_buckets(self.start, self.end, count)
    }

    /// Smallest period, at least `requested` and a multiple of 60 seconds,
    /// that keeps this window within [`MAX_DATAPOINTS_PER_REQUEST`].
    pub fn period_within_limit(&self, requested: u32) -> u32 {
        let seconds = self.duration().num_seconds().max(0) as u64;
        let minimum = seconds
            .div_ceil(u64::from(MAX_DATAPOINTS_PER_REQUEST))
            .div_ceil(60)
            * 60;
        u32::try_from(minimum).map_or(u32::MAX, |m| m.max(requested))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeRangePreset {
    LastHour,
    Last6Hours,
    Last24Hours,
    Last3Days,
    LastWeek,
}

impl TimeRangePreset {
    pub const ALL: [TimeRangePreset; 5] = [
        TimeRangePreset::LastHour,
        TimeRangePreset::Last6Hours,
        TimeRangePreset::Last24Hours,
        TimeRangePreset::Last3Days,
        TimeRangePreset::LastWeek,
    ];

    pub fn hours(&self) -> u32 {
        match self {
            TimeRangePreset::LastHour => 1,
            TimeRangePreset::Last6Hours => 6,
            TimeRangePreset::Last24Hours => 24,
            TimeRangePreset::Last3Days => 72,
            TimeRangePreset::LastWeek => 168,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeRangePreset::LastHour => "Last Hour",
            TimeRangePreset::Last6Hours => "Last 6 Hours",
            TimeRangePreset::Last24Hours => "Last 24 Hours",
            TimeRangePreset::Last3Days => "Last 3 Days",
            TimeRangePreset::LastWeek => "Last Week",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|preset| preset.label() == label)
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// `count` equal buckets between `start` and `end`, returned as `count + 1` boundaries.
pub fn time_buckets(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    count: usize,
) -> Vec<DateTime<Utc>> {
    if count == 0 {
        return vec![start, end];
    }

    let total_ms = (end - start).num_milliseconds();
    (0..=count)
        .map(|i| {
            if i == count {
                end
            } else {
                start + Duration::milliseconds(total_ms * i as i64 / count as i64)
            }
        })
        .collect()
}

/// Static region list used when the account's regions cannot be listed.
pub fn supported_regions() -> &'static [&'static str] {
    &[
        "us-east-1",
        "us-east-2",
        "us-west-1",
        "us-west-2",
        "eu-west-1",
        "eu-west-2",
        "eu-central-1",
        "ap-south-1",
        "ap-southeast-1",
        "ap-southeast-2",
        "ap-northeast-1",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_period_within_limit() {
        let end = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        assert_eq!(TimeRange::ending_at(end, 24).period_within_limit(300), 300);
        // a week at 5 minutes would be 2016 points
        let week = TimeRange::ending_at(end, 168);
        let period = week.period_within_limit(300);
        assert_eq!(period, 420);
        assert!(week.duration().num_seconds() / i64::from(period) <= 1440);
        // 63 days of hourly points is 1512
        assert_eq!(TimeRange::ending_at(end, 63 * 24).period_within_limit(3600), 3780);
        assert_eq!(TimeRange::ending_at(end, 1).period_within_limit(60), 60);
    }

    #[test]
    fn test_last_hours_spans_requested_window() {
        let range = TimeRange::last_hours(24);
        assert_eq!(range.duration().num_hours(), 24);
        assert!((Utc::now() - range.end).num_seconds() < 60);
        assert_eq!(range.hours(), 24.0);
    }

    #[test]
    fn test_format_timestamp() {
        let timestamp = Utc.with_ymd_and_hms(2023, 1, 1, 12, 30, 45).unwrap();
        assert_eq!(format_timestamp(timestamp), "2023-01-01 12:30:45 UTC");
    }

    #[test]
    fn test_time_buckets() {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap();

        let buckets = time_buckets(start, end, 12);

        assert_eq!(buckets.len(), 13);
        assert_eq!(buckets[0], start);
        assert_eq!(buckets[12], end);
        for pair in buckets.windows(2) {
            assert_eq!((pair[1] - pair[0]).num_seconds(), 3600);
        }
    }

    #[test]
    fn test_presets() {
        assert_eq!(TimeRangePreset::LastWeek.hours(), 168);
        assert_eq!(
            TimeRangePreset::from_label("Last 3 Days"),
            Some(TimeRangePreset::Last3Days)
        );
        assert_eq!(TimeRangePreset::from_label("Last Month"), None);
    }

    #[test]
    fn test_contains() {
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let range = TimeRange::ending_at(end, 1);
        assert!(range.contains(end));
        assert!(range.contains(end - Duration::minutes(30)));
        assert!(!range.contains(end - Duration::hours(2)));
    }
}
