use crate::core::time_range::{TimeRange, MAX_DATAPOINTS_PER_REQUEST};
use crate::domain::model::{
    CostAndUsage, Datapoint, Ec2Instance, InstanceState, LambdaFunction, LogEvent, LogGroup,
    LogQuery, MetricQuery, Statistic,
};
use crate::domain::ports::MetricsSource;
use crate::utils::error::{AnalyzerError, Result};
use async_trait::async_trait;
use chrono::Duration;
use std::collections::BTreeMap;


struct DemoInstance {
    id: &'static str,
    name: &'static str,
    instance_type: &'static str,
    base_cpu: f64,
    base_memory: f64,
}

const INSTANCES: &[DemoInstance] = &[
    DemoInstance {
        id: "i-1234567890abcdef0",
        name: "Web Server 1",
        instance_type: "t3.medium",
        base_cpu: 45.0,
        base_memory: 62.0,
    },
    DemoInstance {
        id: "i-0987654321fedcba0",
        name: "Database Server",
        instance_type: "t3.large",
        base_cpu: 85.0,
        base_memory: 78.0,
    },
    DemoInstance {
        id: "i-abcdef1234567890",
        name: "API Gateway",
        instance_type: "t3.small",
        base_cpu: 12.0,
        base_memory: 35.0,
    },
    DemoInstance {
        id: "i-fedcba0987654321",
        name: "Cache Server",
        instance_type: "t3.micro",
        base_cpu: 3.0,
        base_memory: 20.0,
    },
];

struct DemoFunction {
    name: &'static str,
    memory_mb: u32,
    base_duration_ms: f64,
    /// One error every `error_every` invocations.
    error_every: usize,
    stored_bytes: i64,
}

const FUNCTIONS: &[DemoFunction] = &[
    DemoFunction {
        name: "user-authentication",
        memory_mb: 512,
        base_duration_ms: 120.0,
        error_every: 60,
        stored_bytes: 1_024_000,
    },
    DemoFunction {
        name: "data-processor",
        memory_mb: 1024,
        base_duration_ms: 450.0,
        error_every: 25,
        stored_bytes: 2_048_000,
    },
    DemoFunction {
        name: "email-service",
        memory_mb: 256,
        base_duration_ms: 200.0,
        error_every: 80,
        stored_bytes: 512_000,
    },
    DemoFunction {
        name: "image-resizer",
        memory_mb: 1536,
        base_duration_ms: 800.0,
        error_every: 40,
        stored_bytes: 3_072_000,
    },
    DemoFunction {
        name: "payment-handler",
        memory_mb: 512,
        base_duration_ms: 300.0,
        error_every: 50,
        stored_bytes: 1_536_000,
    },
];

const ERROR_MESSAGES: &[&str] = &[
    "ERROR: Database connection timeout",
    "ERROR: Invalid JSON payload",
    "ERROR: Memory limit exceeded",
];

/// Invocations written to the demo log of every function.
const INVOCATIONS_PER_FUNCTION: usize = 200;

/// Sample data for running the whole analysis without AWS credentials.
///
/// Output depends only on the request, so repeated runs over the same
/// window produce identical reports.
#[derive(Debug, Clone, Default)]
pub struct DemoSource;

impl DemoSource {
    pub fn new() -> Self {
        Self
    }
}

/// Small stable hash used to give each series its own phase.
fn seed(text: &str) -> f64 {
    let sum = text
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));
    (sum % 628) as f64 / 100.0
}

fn wave(index: i64, phase: f64) -> f64 {
    (index as f64 * 0.3 + phase).sin()
}

fn find_function(name: &str) -> Option<&'static DemoFunction> {
    FUNCTIONS.iter().find(|f| f.name == name)
}

fn find_instance(id: &str) -> Option<&'static DemoInstance> {
    INSTANCES.iter().find(|i| i.id == id)
}

fn function_log(function: &DemoFunction, range: TimeRange) -> Vec<LogEvent> {
    let span = (range.end_millis() - range.start_millis()).max(1);
    let step = (span / (INVOCATIONS_PER_FUNCTION as i64 + 1)).max(5);
    let mut events = Vec::with_capacity(INVOCATIONS_PER_FUNCTION * 3);

    for i in 0..INVOCATIONS_PER_FUNCTION {
        let at = range.start_millis() + step * (i as i64 + 1) - 4;
        let request_id = format!("{}-{:05}", function.name, i);

        if i % 40 == 0 {
            events.push(LogEvent::new(
                at,
                "INIT_START Runtime Version: python:3.11.v29",
            ));
        }
        events.push(LogEvent::new(
            at + 1,
            format!("START RequestId: {} Version: $LATEST", request_id),
        ));

        if i % function.error_every == function.error_every - 1 {
            let message = ERROR_MESSAGES[i % ERROR_MESSAGES.len()];
            events.push(LogEvent::new(at + 2, format!("{} RequestId: {}", message, request_id)));
        }
        if i == INVOCATIONS_PER_FUNCTION / 2 && function.base_duration_ms > 500.0 {
            events.push(LogEvent::new(
                at + 2,
                format!("{} Task timed out after 30.00 seconds", request_id),
            ));
        }

        let duration = function.base_duration_ms * (1.0 + 0.25 * wave(i as i64, 0.0));
        let memory_used = (function.memory_mb as f64 * (0.35 + 0.1 * wave(i as i64, 1.0))) as u64;
        events.push(LogEvent::new(
            at + 3,
            format!(
                "REPORT RequestId: {} Duration: {:.2} ms Billed Duration: {} ms Memory Size: {} MB Max Memory Used: {} MB",
                request_id,
                duration,
                duration.ceil() as u64,
                function.memory_mb,
                memory_used
            ),
        ));
    }

    events
}

fn point_values(query: &MetricQuery, index: i64, count: i64) -> Option<f64> {
    let phase = seed(&format!("{}{}", query.dimension_value, query.metric_name));
    let w = wave(index, phase);
    let period_minutes = query.period_seconds as f64 / 60.0;

    match query.namespace.as_str() {
        "AWS/EC2" => {
            let instance = find_instance(&query.dimension_value)?;
            let value = match query.metric_name.as_str() {
                "CPUUtilization" => {
                    // a single spike near the middle of the window
                    let spike = if index == count / 2 { 2.5 } else { 1.0 };
                    (instance.base_cpu * (1.0 + 0.15 * w) * spike).clamp(0.0, 100.0)
                }
                "NetworkIn" => 10.0 * 1024.0 * 1024.0 * (1.0 + 0.3 * w) * period_minutes / 5.0,
                "NetworkOut" => 5.0 * 1024.0 * 1024.0 * (1.0 + 0.3 * w) * period_minutes / 5.0,
                "DiskReadBytes" => 2.0 * 1024.0 * 1024.0 * (1.0 + 0.5 * w),
                "DiskWriteBytes" => 3.0 * 1024.0 * 1024.0 * (1.0 + 0.5 * w),
                _ => return None,
            };
            Some(value)
        }
        "CWAgent" if query.metric_name == "mem_used_percent" => {
            let instance = find_instance(&query.dimension_value)?;
            Some((instance.base_memory * (1.0 + 0.1 * w)).clamp(0.0, 100.0))
        }
        "AWS/Lambda" => {
            let function = find_function(&query.dimension_value)?;
            let invocations = (40.0 * (1.0 + 0.5 * w) * period_minutes / 5.0).round();
            let value = match query.metric_name.as_str() {
                "Invocations" => invocations,
                "Errors" => (invocations / function.error_every as f64).floor(),
                "Duration" => function.base_duration_ms * (1.0 + 0.25 * w),
                "Throttles" => 0.0,
                "ConcurrentExecutions" => (2.0 + 2.0 * w).round().max(1.0),
                _ => return None,
            };
            Some(value)
        }
        _ => None,
    }
}

fn datapoint(query: &MetricQuery, value: f64, at: chrono::DateTime<chrono::Utc>) -> Datapoint {
    let percent = query.metric_name == "CPUUtilization" || query.metric_name == "mem_used_percent";
    let mut point = Datapoint {
        timestamp: at,
        unit: Some(if percent { "Percent" } else { "None" }.to_string()),
        ..Datapoint::default()
    };

    for statistic in &query.statistics {
        let stat_value = match statistic {
            Statistic::Average | Statistic::Sum => value,
            Statistic::Maximum if percent => (value * 1.2).min(100.0),
            Statistic::Maximum => value * 1.2,
            Statistic::Minimum => value * 0.8,
            Statistic::SampleCount => (query.period_seconds / 60).max(1) as f64,
        };
        match statistic {
            Statistic::Average => point.average = Some(stat_value),
            Statistic::Sum => point.sum = Some(stat_value),
            Statistic::Maximum => point.maximum = Some(stat_value),
            Statistic::Minimum => point.minimum = Some(stat_value),
            Statistic::SampleCount => point.sample_count = Some(stat_value),
        }
    }

    point
}

#[async_trait]
impl MetricsSource for DemoSource {
    async fn list_instances(&self) -> Result<Vec<Ec2Instance>> {
        Ok(INSTANCES
            .iter()
            .map(|i| {
                let mut instance =
                    Ec2Instance::new(i.id, i.name, i.instance_type, InstanceState::Running);
                instance.availability_zone = Some("ap-south-1a".to_string());
                instance.platform = Some("Linux/UNIX".to_string());
                instance
            })
            .collect())
    }

    async fn list_functions(&self) -> Result<Vec<LambdaFunction>> {
        Ok(FUNCTIONS
            .iter()
            .map(|f| {
                let mut function = LambdaFunction::new(f.name, f.memory_mb, 30);
                function.runtime = Some("python3.11".to_string());
                function.handler = Some("app.handler".to_string());
                function
            })
            .collect())
    }

    async fn list_log_groups(&self) -> Result<Vec<LogGroup>> {
        let mut groups: Vec<LogGroup> = FUNCTIONS
            .iter()
            .enumerate()
            .map(|(i, f)| LogGroup {
                name: format!("/aws/lambda/{}", f.name),
                creation_time: 1_234_567_890 + i as i64,
                stored_bytes: f.stored_bytes,
            })
            .collect();
        groups.push(LogGroup {
            name: "/ecs/demo-cluster".to_string(),
            creation_time: 1_234_567_899,
            stored_bytes: 4_096_000,
        });
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn log_events(&self, query: &LogQuery) -> Result<Vec<LogEvent>> {
        let Some(name) = query.log_group.strip_prefix("/aws/lambda/") else {
            return Ok(Vec::new());
        };
        let Some(function) = find_function(name) else {
            return Ok(Vec::new());
        };

        Ok(function_log(function, query.range)
            .into_iter()
            .filter(|e| match &query.filter_pattern {
                Some(pattern) => e.message.contains(pattern.as_str()),
                None => true,
            })
            .take(query.limit)
            .collect())
    }

    async fn metric_statistics(&self, query: &MetricQuery) -> Result<Vec<Datapoint>> {
        let period = Duration::seconds(query.period_seconds.max(1) as i64);
        let total = query.range.duration().num_seconds() / period.num_seconds();
        // like CloudWatch, refuse rather than truncate oversized requests
        if total > i64::from(MAX_DATAPOINTS_PER_REQUEST) {
            return Err(AnalyzerError::from_aws(
                "cloudwatch",
                "GetMetricStatistics",
                format!(
                    "InvalidParameterCombination: You have requested up to {} datapoints, which exceeds the limit of {}",
                    total, MAX_DATAPOINTS_PER_REQUEST
                ),
            ));
        }

        let mut points = Vec::with_capacity(total.max(0) as usize);
        for index in 0..total {
            let Some(value) = point_values(query, index, total) else {
                return Ok(Vec::new());
            };
            let at = query.range.start + period * index as i32;
            points.push(datapoint(query, value, at));
        }
        Ok(points)
    }

    async fn actual_costs(&self, days: u32) -> Result<Option<CostAndUsage>> {
        let cost_by_service: BTreeMap<String, f64> = [
            ("Amazon Elastic Compute Cloud - Compute", 96.42),
            ("AWS Lambda", 4.18),
            ("Amazon CloudWatch", 7.35),
            ("Amazon Simple Storage Service", 2.91),
        ]
        .into_iter()
        .map(|(service, cost)| (service.to_string(), cost * days as f64 / 30.0))
        .collect();

        Ok(Some(CostAndUsage {
            total_cost: cost_by_service.values().sum(),
            cost_by_service,
            period: format!("last {} days", days),
        }))
    }

    async fn check_connection(&self) -> Result<()> {
        Ok(())
    }

    fn is_demo(&self) -> bool {
        true
    }
}
