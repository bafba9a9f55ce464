use crate::core::stats;
use crate::domain::model::{Datapoint, Statistic};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anomaly detection needs at least this many points to estimate spread.
pub const MIN_POINTS_FOR_ANOMALIES: usize = 10;
pub const DEFAULT_ANOMALY_MULTIPLIER: f64 = 2.0;

/// Lambda metrics fetched for every function, with the statistic requested for each.
pub const LAMBDA_METRICS: &[(&str, Statistic)] = &[
    ("Invocations", Statistic::Sum),
    ("Errors", Statistic::Sum),
    ("Duration", Statistic::Average),
    ("Throttles", Statistic::Sum),
    ("ConcurrentExecutions", Statistic::Maximum),
];

/// EC2 metrics fetched for every instance.
pub const EC2_METRICS: &[(&str, Statistic)] = &[
    ("CPUUtilization", Statistic::Average),
    ("NetworkIn", Statistic::Sum),
    ("NetworkOut", Statistic::Sum),
    ("DiskReadBytes", Statistic::Sum),
    ("DiskWriteBytes", Statistic::Sum),
];

/// Key under which a metric is stored in reports.
pub fn metric_key(metric_name: &str) -> String {
    metric_name.to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Flattens datapoints into a time-ordered series.
///
/// The value is taken from Average, then Sum, then Maximum, defaulting to zero.
pub fn process_metric_data(datapoints: &[Datapoint]) -> Vec<TimeSeriesPoint> {
    let mut series: Vec<TimeSeriesPoint> = datapoints
        .iter()
        .map(|point| TimeSeriesPoint {
            timestamp: point.timestamp,
            value: point
                .average
                .or(point.sum)
                .or(point.maximum)
                .unwrap_or(0.0),
        })
        .collect();

    series.sort_by_key(|point| point.timestamp);
    series
}

/// Like [`process_metric_data`] but reads one specific statistic.
pub fn series_for(datapoints: &[Datapoint], statistic: Statistic) -> Vec<TimeSeriesPoint> {
    let mut series: Vec<TimeSeriesPoint> = datapoints
        .iter()
        .filter_map(|point| {
            point.value_of(statistic).map(|value| TimeSeriesPoint {
                timestamp: point.timestamp,
                value,
            })
        })
        .collect();

    series.sort_by_key(|point| point.timestamp);
    series
}

pub fn values(series: &[TimeSeriesPoint]) -> Vec<f64> {
    series.iter().map(|point| point.value).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub current: f64,
}

pub fn calculate_metric_stats(series: &[TimeSeriesPoint]) -> MetricStats {
    let Some(last) = series.last() else {
        return MetricStats::default();
    };

    let values = values(series);
    MetricStats {
        avg: stats::mean(&values),
        min: stats::min(&values),
        max: stats::max(&values),
        current: last.value,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub threshold: f64,
}

/// Flags points above `mean + multiplier * std_dev`.
pub fn detect_anomalies(series: &[TimeSeriesPoint], threshold_multiplier: f64) -> Vec<Anomaly> {
    if series.len() < MIN_POINTS_FOR_ANOMALIES {
        return Vec::new();
    }

    let values = values(series);
    let threshold = stats::mean(&values) + threshold_multiplier * stats::std_dev(&values);

    series
        .iter()
        .filter(|point| point.value > threshold)
        .map(|point| Anomaly {
            timestamp: point.timestamp,
            value: point.value,
            threshold,
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSeriesAnalysis {
    pub metric_name: String,
    pub statistic: Option<Statistic>,
    pub points: Vec<TimeSeriesPoint>,
    pub stats: MetricStats,
    pub anomalies: Vec<Anomaly>,
}

pub fn analyze_series(
    metric_name: &str,
    statistic: Statistic,
    datapoints: &[Datapoint],
    threshold_multiplier: f64,
) -> MetricSeriesAnalysis {
    let points = process_metric_data(datapoints);
    let stats = calculate_metric_stats(&points);
    let anomalies = detect_anomalies(&points, threshold_multiplier);

    if !anomalies.is_empty() {
        tracing::debug!(
            "{} anomalies in {} (threshold {:.2})",
            anomalies.len(),
            metric_name,
            anomalies[0].threshold
        );
    }

    MetricSeriesAnalysis {
        metric_name: metric_name.to_string(),
        statistic: Some(statistic),
        points,
        stats,
        anomalies,
    }
}
