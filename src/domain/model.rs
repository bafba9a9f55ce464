use crate::core::time_range::TimeRange;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const LAMBDA_LOG_GROUP_PREFIX: &str = "/aws/lambda/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
    #[serde(untagged)]
    Other(String),
}

impl InstanceState {
    pub fn parse(value: &str) -> Self {
        match value {
            "pending" => InstanceState::Pending,
            "running" => InstanceState::Running,
            "stopping" => InstanceState::Stopping,
            "stopped" => InstanceState::Stopped,
            "shutting-down" => InstanceState::ShuttingDown,
            "terminated" => InstanceState::Terminated,
            other => InstanceState::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
            InstanceState::Other(other) => other,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, InstanceState::Running)
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ec2Instance {
    pub id: String,
    pub name: String,
    pub instance_type: String,
    pub state: InstanceState,
    pub private_ip: Option<String>,
    pub public_ip: Option<String>,
    pub availability_zone: Option<String>,
    pub launch_time: Option<DateTime<Utc>>,
    pub platform: Option<String>,
}

impl Ec2Instance {
    pub fn new(id: &str, name: &str, instance_type: &str, state: InstanceState) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            instance_type: instance_type.to_string(),
            state,
            private_ip: None,
            public_ip: None,
            availability_zone: None,
            launch_time: None,
            platform: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaFunction {
    pub name: String,
    pub runtime: Option<String>,
    pub memory_mb: u32,
    pub timeout_secs: u32,
    pub code_size: i64,
    pub handler: Option<String>,
    pub last_modified: Option<String>,
}

impl LambdaFunction {
    pub fn new(name: &str, memory_mb: u32, timeout_secs: u32) -> Self {
        Self {
            name: name.to_string(),
            runtime: None,
            memory_mb,
            timeout_secs,
            code_size: 0,
            handler: None,
            last_modified: None,
        }
    }

    pub fn log_group_name(&self) -> String {
        format!("{}{}", LAMBDA_LOG_GROUP_PREFIX, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogGroup {
    pub name: String,
    pub creation_time: i64,
    pub stored_bytes: i64,
}

impl LogGroup {
    pub fn is_lambda(&self) -> bool {
        self.name.starts_with(LAMBDA_LOG_GROUP_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub message: String,
}

impl LogEvent {
    pub fn new(timestamp: i64, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    Average,
    Sum,
    Maximum,
    Minimum,
    SampleCount,
}

impl Statistic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Average => "Average",
            Statistic::Sum => "Sum",
            Statistic::Maximum => "Maximum",
            Statistic::Minimum => "Minimum",
            Statistic::SampleCount => "SampleCount",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub timestamp: DateTime<Utc>,
    pub average: Option<f64>,
    pub sum: Option<f64>,
    pub maximum: Option<f64>,
    pub minimum: Option<f64>,
    pub sample_count: Option<f64>,
    pub unit: Option<String>,
}

impl Datapoint {
    pub fn value_of(&self, statistic: Statistic) -> Option<f64> {
        match statistic {
            Statistic::Average => self.average,
            Statistic::Sum => self.sum,
            Statistic::Maximum => self.maximum,
            Statistic::Minimum => self.minimum,
            Statistic::SampleCount => self.sample_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricQuery {
    pub namespace: String,
    pub metric_name: String,
    pub dimension_name: String,
    pub dimension_value: String,
    pub range: TimeRange,
    pub period_seconds: u32,
    pub statistics: Vec<Statistic>,
}

impl MetricQuery {
    pub fn ec2(metric_name: &str, instance_id: &str, range: TimeRange, period_seconds: u32) -> Self {
        Self {
            namespace: "AWS/EC2".to_string(),
            metric_name: metric_name.to_string(),
            dimension_name: "InstanceId".to_string(),
            dimension_value: instance_id.to_string(),
            range,
            period_seconds,
            statistics: vec![Statistic::Average],
        }
    }

    pub fn lambda(
        metric_name: &str,
        function_name: &str,
        range: TimeRange,
        period_seconds: u32,
    ) -> Self {
        Self {
            namespace: "AWS/Lambda".to_string(),
            metric_name: metric_name.to_string(),
            dimension_name: "FunctionName".to_string(),
            dimension_value: function_name.to_string(),
            range,
            period_seconds,
            statistics: vec![Statistic::Sum],
        }
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn with_statistics(mut self, statistics: &[Statistic]) -> Self {
        self.statistics = statistics.to_vec();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogQuery {
    pub log_group: String,
    pub range: TimeRange,
    pub filter_pattern: Option<String>,
    pub limit: usize,
}

/// Billed cost per service as reported by Cost Explorer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostAndUsage {
    pub total_cost: f64,
    pub cost_by_service: BTreeMap<String, f64>,
    pub period: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub available: u64,
    pub percent: f64,
}

impl MemoryUsage {
    pub fn new(total: u64, used: u64, free: u64, available: u64) -> Self {
        Self {
            total,
            used,
            free,
            available,
            percent: percent_of(used, total),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub percent: f64,
}

impl DiskUsage {
    pub fn new(total: u64, used: u64, free: u64) -> Self {
        Self {
            total,
            used,
            free,
            percent: percent_of(used, total),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuLoad {
    pub percent: f64,
    pub load_avg: [f64; 3],
}

/// Host metrics of the machine running the analyzer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalSystemMetrics {
    pub memory: MemoryUsage,
    pub swap: MemoryUsage,
    pub disk: DiskUsage,
    pub cpu: CpuLoad,
}

fn percent_of(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}
