use crate::config::LogPatternConfig;
use crate::core::stats;
use crate::core::time_range::format_timestamp;
use crate::domain::model::LogEvent;
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

const INVOCATION_MARKER: &str = "START RequestId:";
const COLD_START_MARKER: &str = "INIT_START";
const MAX_ERROR_MESSAGE_CHARS: usize = 200;

/// Compiled matchers for Lambda runtime log lines.
#[derive(Debug, Clone)]
pub struct LogPatterns {
    error_markers: Vec<String>,
    timeout: Regex,
    memory: Regex,
    duration: Regex,
}

impl LogPatterns {
    pub fn from_config(config: &LogPatternConfig) -> Result<Self> {
        Ok(Self {
            error_markers: config.error_patterns.clone(),
            timeout: Regex::new(&config.timeout_pattern)?,
            memory: Regex::new(&config.memory_pattern)?,
            duration: Regex::new(&config.duration_pattern)?,
        })
    }

    /// Patterns matching the standard Lambda runtime output.
    pub fn standard() -> Self {
        Self::from_config(&LogPatternConfig::default())
            .expect("built-in log patterns are valid regular expressions")
    }

    fn is_error(&self, message: &str) -> bool {
        self.error_markers
            .iter()
            .any(|marker| message.contains(marker.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub timestamp: i64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LambdaLogMetrics {
    pub total_invocations: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub durations: Vec<f64>,
    pub memory_usage: Vec<u64>,
    pub cold_starts: u64,
    pub error_messages: Vec<ErrorMessage>,
}

impl LambdaLogMetrics {
    pub fn error_rate(&self) -> f64 {
        calculate_error_rate(self.total_invocations, self.errors)
    }
}

pub fn extract_lambda_metrics(events: &[LogEvent], patterns: &LogPatterns) -> LambdaLogMetrics {
    let mut metrics = LambdaLogMetrics::default();

    for event in events {
        let message = event.message.as_str();

        if message.contains(INVOCATION_MARKER) {
            metrics.total_invocations += 1;
        }

        if patterns.is_error(message) {
            metrics.errors += 1;
            metrics.error_messages.push(ErrorMessage {
                timestamp: event.timestamp,
                message: message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect(),
            });
        }

        if patterns.timeout.is_match(message) {
            metrics.timeouts += 1;
        }

        if let Some(duration) = capture_number::<f64>(&patterns.duration, message) {
            metrics.durations.push(duration);
        }

        if let Some(memory) = capture_number::<u64>(&patterns.memory, message) {
            metrics.memory_usage.push(memory);
        }

        if message.contains(COLD_START_MARKER) {
            metrics.cold_starts += 1;
        }
    }

    metrics
}

fn capture_number<T: std::str::FromStr>(pattern: &Regex, message: &str) -> Option<T> {
    pattern
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Error rate as a percentage of invocations.
pub fn calculate_error_rate(total_invocations: u64, errors: u64) -> f64 {
    if total_invocations == 0 {
        return 0.0;
    }
    errors as f64 / total_invocations as f64 * 100.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub p95: f64,
    pub p99: f64,
}

pub fn performance_stats(durations: &[f64]) -> PerformanceStats {
    if durations.is_empty() {
        return PerformanceStats::default();
    }

    PerformanceStats {
        avg: stats::mean(durations),
        min: stats::min(durations),
        max: stats::max(durations),
        p95: stats::percentile(durations, 0.95),
        p99: stats::percentile(durations, 0.99),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketCount {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count: u64,
}

/// Counts recorded errors per bucket; `boundaries` are as produced by `time_buckets`.
pub fn error_timeline(metrics: &LambdaLogMetrics, boundaries: &[DateTime<Utc>]) -> Vec<BucketCount> {
    let mut buckets: Vec<BucketCount> = boundaries
        .windows(2)
        .map(|pair| BucketCount {
            start: pair[0],
            end: pair[1],
            count: 0,
        })
        .collect();

    // the final bucket is closed so events at `end` are kept
    let final_end = buckets.last().map(|b| b.end);
    for error in &metrics.error_messages {
        let Some(at) = DateTime::from_timestamp_millis(error.timestamp) else {
            continue;
        };
        if let Some(index) = buckets
            .iter()
            .position(|b| at >= b.start && (at < b.end || (at == b.end && Some(b.end) == final_end)))
        {
            buckets[index].count += 1;
        }
    }

    buckets
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: String,
    pub message: String,
}

/// Newest `limit` events with trimmed messages.
pub fn recent_log_lines(events: &[LogEvent], limit: usize) -> Vec<LogLine> {
    let mut sorted: Vec<&LogEvent> = events.iter().collect();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    sorted
        .into_iter()
        .take(limit)
        .map(|event| LogLine {
            timestamp: event
                .time()
                .map(format_timestamp)
                .unwrap_or_else(|| event.timestamp.to_string()),
            message: event.message.trim().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time_range::time_buckets;
    use chrono::TimeZone;

    fn event(timestamp: i64, message: &str) -> LogEvent {
        LogEvent::new(timestamp, message)
    }

    #[test]
    fn test_extract_lambda_metrics_empty_logs() {
        let metrics = extract_lambda_metrics(&[], &LogPatterns::standard());

        assert_eq!(metrics.total_invocations, 0);
        assert_eq!(metrics.errors, 0);
        assert_eq!(metrics.timeouts, 0);
        assert!(metrics.durations.is_empty());
        assert!(metrics.memory_usage.is_empty());
        assert_eq!(metrics.cold_starts, 0);
    }

    #[test]
    fn test_extract_lambda_metrics_with_data() {
        let events = vec![
            event(1234567890, "START RequestId: 123-456-789"),
            event(1234567891, "Duration: 150.25 ms"),
            event(1234567892, "Max Memory Used: 128 MB"),
            event(1234567893, "ERROR Something went wrong"),
            event(1234567894, "INIT_START Runtime Version: python3.9"),
        ];

        let metrics = extract_lambda_metrics(&events, &LogPatterns::standard());

        assert_eq!(metrics.total_invocations, 1);
        assert_eq!(metrics.errors, 1);
        assert_eq!(metrics.cold_starts, 1);
        assert_eq!(metrics.durations, vec![150.25]);
        assert_eq!(metrics.memory_usage, vec![128]);
        assert_eq!(metrics.error_messages[0].timestamp, 1234567893);
    }

    #[test]
    fn test_report_line_yields_duration_and_memory() {
        let events = vec![event(
            0,
            "REPORT RequestId: abc Duration: 102.25 ms Billed Duration: 103 ms \
             Memory Size: 512 MB Max Memory Used: 87 MB Init Duration: 245.10 ms",
        )];

        let metrics = extract_lambda_metrics(&events, &LogPatterns::standard());

        assert_eq!(metrics.durations, vec![102.25]);
        assert_eq!(metrics.memory_usage, vec![87]);
        assert_eq!(metrics.errors, 0);
    }

    #[test]
    fn test_error_counted_once_per_event() {
        let events = vec![event(0, "[ERROR] Exception: Failed to connect - Traceback follows")];

        let metrics = extract_lambda_metrics(&events, &LogPatterns::standard());

        assert_eq!(metrics.errors, 1);
        assert_eq!(metrics.error_messages.len(), 1);
    }

    #[test]
    fn test_timeouts_are_detected() {
        let events = vec![
            event(0, "2024-01-01T00:00:03.000Z abc Task timed out after 3.00 seconds"),
            event(1, "END RequestId: abc"),
        ];

        let metrics = extract_lambda_metrics(&events, &LogPatterns::standard());

        assert_eq!(metrics.timeouts, 1);
    }

    #[test]
    fn test_error_message_truncated_to_200_chars() {
        let long = format!("ERROR {}", "é".repeat(400));
        let metrics = extract_lambda_metrics(&[event(0, &long)], &LogPatterns::standard());

        assert_eq!(metrics.error_messages[0].message.chars().count(), 200);
    }

    #[test]
    fn test_custom_patterns() {
        let config = LogPatternConfig {
            error_patterns: vec!["FATAL".to_string()],
            ..LogPatternConfig::default()
        };
        let patterns = LogPatterns::from_config(&config).unwrap();
        let events = vec![event(0, "ERROR ignored"), event(1, "FATAL boom")];

        let metrics = extract_lambda_metrics(&events, &patterns);

        assert_eq!(metrics.errors, 1);
        assert_eq!(metrics.error_messages[0].message, "FATAL boom");
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let config = LogPatternConfig {
            duration_pattern: "Duration: (".to_string(),
            ..LogPatternConfig::default()
        };
        assert!(LogPatterns::from_config(&config).is_err());
    }

    #[test]
    fn test_calculate_error_rate() {
        assert_eq!(calculate_error_rate(100, 5), 5.0);
        assert_eq!(calculate_error_rate(0, 0), 0.0);
        assert_eq!(calculate_error_rate(100, 0), 0.0);
    }

    #[test]
    fn test_performance_stats() {
        let empty = performance_stats(&[]);
        assert_eq!(empty, PerformanceStats::default());

        let stats = performance_stats(&[100.0, 200.0, 300.0, 400.0, 500.0]);
        assert_eq!(stats.avg, 300.0);
        assert_eq!(stats.min, 100.0);
        assert_eq!(stats.max, 500.0);
        assert!((stats.p95 - 480.0).abs() < 1e-9);
    }

    #[test]
    fn test_error_timeline_buckets_errors() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap();
        let hour = 3_600_000;
        let base = start.timestamp_millis();
        let events = vec![
            event(base + 10, "ERROR a"),
            event(base + hour + 10, "ERROR b"),
            event(base + hour + 20, "ERROR c"),
            event(end.timestamp_millis(), "ERROR at the very end"),
        ];
        let metrics = extract_lambda_metrics(&events, &LogPatterns::standard());

        let timeline = error_timeline(&metrics, &time_buckets(start, end, 4));

        let counts: Vec<u64> = timeline.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 2, 0, 1]);
    }

    #[test]
    fn test_recent_log_lines_newest_first() {
        let events = vec![
            event(1_700_000_000_000, "  first  "),
            event(1_700_000_060_000, "third\n"),
            event(1_700_000_030_000, "second"),
        ];

        let lines = recent_log_lines(&events, 2);

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].message, "third");
        assert_eq!(lines[1].message, "second");
        assert!(lines[0].timestamp.ends_with("UTC"));
    }
}
