use crate::config::AnalysisSettings;
use crate::core::cost::{
    estimate_lambda_usage, generate_comprehensive_analysis, CostAnalysis, CostInputs, LambdaUsage,
};
use crate::core::health::{CardValue, MetricCard};
use crate::core::log_processor::{
    calculate_error_rate, error_timeline, extract_lambda_metrics, performance_stats,
    recent_log_lines, BucketCount, LambdaLogMetrics, LogLine, LogPatterns, PerformanceStats,
};
use crate::core::metric_processor::{
    analyze_series, metric_key, MetricSeriesAnalysis, EC2_METRICS, LAMBDA_METRICS,
};
use crate::core::optimization::{
    build_ec2_report, CpuUtilization, Ec2OptimizationReport, InstanceUtilization,
    MemoryUtilization,
};
use crate::core::time_range::TimeRange;
use crate::domain::model::{
    CostAndUsage, Datapoint, Ec2Instance, LambdaFunction, LocalSystemMetrics, LogEvent, Statistic,
};
use crate::utils::error::{AnalyzerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Everything fetched from the metrics source for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    pub captured_at: DateTime<Utc>,
    pub region: String,
    pub range: TimeRange,
    pub utilization_days: u32,
    pub demo: bool,
    pub functions: Vec<FunctionSnapshot>,
    pub instances: Vec<InstanceSnapshot>,
    pub actual_costs: Option<CostAndUsage>,
    pub local_system: Option<LocalSystemMetrics>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSnapshot {
    pub function: LambdaFunction,
    pub log_events: Vec<LogEvent>,
    /// Datapoints keyed by lowercased metric name.
    pub metrics: BTreeMap<String, Vec<Datapoint>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSnapshot {
    pub instance: Ec2Instance,
    pub metrics: BTreeMap<String, Vec<Datapoint>>,
    pub cpu_utilization: Vec<Datapoint>,
    pub memory_utilization: Vec<Datapoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionAnalysis {
    pub function: LambdaFunction,
    pub cards: Vec<MetricCard>,
    pub log_metrics: LambdaLogMetrics,
    pub error_rate: f64,
    pub performance: PerformanceStats,
    pub error_timeline: Vec<BucketCount>,
    pub recent_logs: Vec<LogLine>,
    pub metrics: BTreeMap<String, MetricSeriesAnalysis>,
    pub estimated_usage: Option<LambdaUsage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceAnalysis {
    pub instance: Ec2Instance,
    pub cards: Vec<MetricCard>,
    pub metrics: BTreeMap<String, MetricSeriesAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    pub generated_at: DateTime<Utc>,
    pub region: String,
    pub time_range: TimeRange,
    pub demo: bool,
    pub summary: Vec<MetricCard>,
    pub functions: Vec<FunctionAnalysis>,
    pub instances: Vec<InstanceAnalysis>,
    pub cost_analysis: CostAnalysis,
    pub ec2_optimization: Ec2OptimizationReport,
    pub local_system: Option<LocalSystemMetrics>,
    pub warnings: Vec<String>,
}

/// Settings the report builder reads.
pub struct ReportContext<'a> {
    pub patterns: &'a LogPatterns,
    pub analysis: &'a AnalysisSettings,
    pub default_lambda_usage: LambdaUsage,
}

pub fn analyze_function(
    snapshot: &FunctionSnapshot,
    range: TimeRange,
    ctx: &ReportContext<'_>,
) -> FunctionAnalysis {
    let log_metrics = extract_lambda_metrics(&snapshot.log_events, ctx.patterns);
    let error_rate = log_metrics.error_rate();
    let performance = performance_stats(&log_metrics.durations);
    let timeline = error_timeline(
        &log_metrics,
        &range.buckets(ctx.analysis.error_timeline_buckets),
    );

    let metrics = analyze_metric_set(&snapshot.metrics, LAMBDA_METRICS, ctx.analysis);
    let empty = Vec::new();
    let estimated_usage = estimate_lambda_usage(
        snapshot.metrics.get(&metric_key("Invocations")).unwrap_or(&empty),
        snapshot.metrics.get(&metric_key("Duration")).unwrap_or(&empty),
        range.hours(),
        ctx.default_lambda_usage,
    );

    let cards = vec![
        MetricCard::new(
            "Total Invocations",
            CardValue::Count(log_metrics.total_invocations),
        ),
        MetricCard::new("Error Rate (%)", CardValue::Number(error_rate)),
        MetricCard::new("Avg Duration (ms)", CardValue::Number(performance.avg)),
        MetricCard::new("Cold Starts", CardValue::Count(log_metrics.cold_starts)),
    ];

    FunctionAnalysis {
        function: snapshot.function.clone(),
        cards,
        error_rate,
        performance,
        error_timeline: timeline,
        recent_logs: recent_log_lines(&snapshot.log_events, ctx.analysis.recent_log_limit),
        log_metrics,
        metrics,
        estimated_usage,
    }
}

pub fn analyze_instance_metrics(
    snapshot: &InstanceSnapshot,
    analysis: &AnalysisSettings,
) -> InstanceAnalysis {
    let metrics = analyze_metric_set(&snapshot.metrics, EC2_METRICS, analysis);
    let current = |name: &str| {
        metrics
            .get(&metric_key(name))
            .map(|series| series.stats.current)
            .unwrap_or(0.0)
    };

    let cards = vec![
        MetricCard::new(
            "CPU Utilization (%)",
            CardValue::Number(current("CPUUtilization")),
        ),
        MetricCard::new(
            "Network In (MB)",
            CardValue::Number(current("NetworkIn") / BYTES_PER_MB),
        ),
        MetricCard::new(
            "Network Out (MB)",
            CardValue::Number(current("NetworkOut") / BYTES_PER_MB),
        ),
        MetricCard::new(
            "Instance State",
            CardValue::Text(title_case(snapshot.instance.state.as_str())),
        ),
    ];

    InstanceAnalysis {
        instance: snapshot.instance.clone(),
        cards,
        metrics,
    }
}

fn analyze_metric_set(
    datapoints: &BTreeMap<String, Vec<Datapoint>>,
    metric_set: &[(&str, Statistic)],
    analysis: &AnalysisSettings,
) -> BTreeMap<String, MetricSeriesAnalysis> {
    metric_set
        .iter()
        .map(|(name, statistic)| {
            let key = metric_key(name);
            let points = datapoints.get(&key).map(Vec::as_slice).unwrap_or(&[]);
            let mut series = analyze_series(
                name,
                *statistic,
                points,
                analysis.anomaly_threshold_multiplier,
            );
            // keep the newest points for charting
            if series.points.len() > analysis.max_datapoints {
                let excess = series.points.len() - analysis.max_datapoints;
                series.points.drain(..excess);
            }
            (key, series)
        })
        .collect()
}

fn title_case(value: &str) -> String {
    value
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}

/// Runs every analysis step over a snapshot. Never fails on empty input.
pub fn build_report(snapshot: RawSnapshot, ctx: &ReportContext<'_>) -> DashboardReport {
    let functions: Vec<FunctionAnalysis> = snapshot
        .functions
        .iter()
        .map(|f| analyze_function(f, snapshot.range, ctx))
        .collect();
    let instances: Vec<InstanceAnalysis> = snapshot
        .instances
        .iter()
        .map(|i| analyze_instance_metrics(i, ctx.analysis))
        .collect();

    let lambda_usage: HashMap<String, LambdaUsage> = functions
        .iter()
        .filter_map(|f| f.estimated_usage.map(|u| (f.function.name.clone(), u)))
        .collect();
    let ec2_instances: Vec<Ec2Instance> = snapshot
        .instances
        .iter()
        .map(|i| i.instance.clone())
        .collect();
    let lambda_functions: Vec<LambdaFunction> = snapshot
        .functions
        .iter()
        .map(|f| f.function.clone())
        .collect();

    let cost_analysis = generate_comprehensive_analysis(CostInputs {
        region: &snapshot.region,
        instances: &ec2_instances,
        functions: &lambda_functions,
        lambda_usage: &lambda_usage,
        default_lambda_usage: ctx.default_lambda_usage,
        actual_costs: snapshot.actual_costs.clone(),
        now: snapshot.captured_at,
    });

    let utilizations: Vec<InstanceUtilization> = snapshot
        .instances
        .iter()
        .map(|i| InstanceUtilization {
            instance: i.instance.clone(),
            cpu: CpuUtilization::from_datapoints(&i.cpu_utilization, snapshot.utilization_days),
            memory: MemoryUtilization::from_datapoints(&i.memory_utilization),
        })
        .collect();
    let ec2_optimization =
        build_ec2_report(&snapshot.region, utilizations, snapshot.captured_at);

    let summary = summary_cards(&snapshot, &functions, &cost_analysis, &ec2_optimization);

    DashboardReport {
        generated_at: snapshot.captured_at,
        region: snapshot.region,
        time_range: snapshot.range,
        demo: snapshot.demo,
        summary,
        functions,
        instances,
        cost_analysis,
        ec2_optimization,
        local_system: snapshot.local_system,
        warnings: snapshot.warnings,
    }
}

fn summary_cards(
    snapshot: &RawSnapshot,
    functions: &[FunctionAnalysis],
    costs: &CostAnalysis,
    ec2: &Ec2OptimizationReport,
) -> Vec<MetricCard> {
    let invocations: u64 = functions
        .iter()
        .map(|f| f.log_metrics.total_invocations)
        .sum();
    let errors: u64 = functions.iter().map(|f| f.log_metrics.errors).sum();

    vec![
        MetricCard::new(
            "Total EC2 Instances",
            CardValue::Count(snapshot.instances.len() as u64),
        ),
        MetricCard::new(
            "Running Instances",
            CardValue::Count(costs.ec2.running_instances as u64),
        ),
        MetricCard::new(
            "Lambda Functions",
            CardValue::Count(functions.len() as u64),
        ),
        MetricCard::new("Total Invocations", CardValue::Count(invocations)),
        MetricCard::new(
            "Error Rate (%)",
            CardValue::Number(calculate_error_rate(invocations, errors)),
        ),
        MetricCard::new(
            "Monthly Cost Estimate",
            CardValue::Text(format!("${:.2}", costs.summary.total_monthly_estimate)),
        ),
        MetricCard::new(
            "Potential Savings",
            CardValue::Text(format!("${:.2}", ec2.total_potential_savings)),
        ),
        MetricCard::new("Region", CardValue::Text(snapshot.region.clone())),
    ]
}

#[derive(Debug, Serialize)]
struct InstanceCostRow<'a> {
    instance_id: &'a str,
    name: &'a str,
    instance_type: &'a str,
    state: &'a str,
    avg_cpu: f64,
    max_cpu: f64,
    hourly_rate: f64,
    monthly_cost: f64,
    potential_savings: f64,
    optimization_score: u8,
}

const INSTANCE_COSTS_HEADER: [&str; 10] = [
    "instance_id",
    "name",
    "instance_type",
    "state",
    "avg_cpu",
    "max_cpu",
    "hourly_rate",
    "monthly_cost",
    "potential_savings",
    "optimization_score",
];

/// Per-instance cost table as CSV bytes. The header is written even with no instances.
pub fn instance_costs_csv(report: &Ec2OptimizationReport) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(INSTANCE_COSTS_HEADER)?;
    for item in &report.instances {
        writer.serialize(InstanceCostRow {
            instance_id: &item.instance.id,
            name: &item.instance.name,
            instance_type: &item.instance.instance_type,
            state: item.instance.state.as_str(),
            avg_cpu: item.cpu.average,
            max_cpu: item.cpu.max,
            hourly_rate: item.hourly_rate,
            monthly_cost: item.monthly_cost,
            potential_savings: item.optimization.total_potential_savings,
            optimization_score: item.optimization.optimization_score,
        })?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| AnalyzerError::ProcessingError {
            message: format!("Failed to finish CSV output: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::health::HealthLevel;
    use crate::domain::model::InstanceState;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn empty_snapshot() -> RawSnapshot {
        RawSnapshot {
            captured_at: now(),
            region: "ap-south-1".to_string(),
            range: TimeRange::ending_at(now(), 24),
            utilization_days: 7,
            demo: false,
            functions: Vec::new(),
            instances: Vec::new(),
            actual_costs: None,
            local_system: None,
            warnings: vec!["EC2 DescribeInstances failed".to_string()],
        }
    }

    fn hourly(value: f64, hours: i64) -> Vec<Datapoint> {
        (0..hours)
            .map(|h| Datapoint {
                timestamp: now() - Duration::hours(hours - h),
                average: Some(value),
                maximum: Some(value + 5.0),
                sum: Some(value),
                ..Datapoint::default()
            })
            .collect()
    }

    fn with_context<T>(f: impl FnOnce(&ReportContext<'_>) -> T) -> T {
        let patterns = LogPatterns::standard();
        let analysis = AnalysisSettings::default();
        let ctx = ReportContext {
            patterns: &patterns,
            analysis: &analysis,
            default_lambda_usage: LambdaUsage::default(),
        };
        f(&ctx)
    }

    #[test]
    fn test_build_report_on_empty_snapshot() {
        let report = with_context(|ctx| build_report(empty_snapshot(), ctx));

        assert!(report.functions.is_empty());
        assert!(report.instances.is_empty());
        assert_eq!(report.ec2_optimization.total_instances, 0);
        assert_eq!(report.cost_analysis.summary.total_monthly_estimate, 8.0);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.summary.len(), 8);
    }

    #[test]
    fn test_function_analysis() {
        let base = now().timestamp_millis() - 3_600_000;
        let snapshot = FunctionSnapshot {
            function: LambdaFunction::new("payment-handler", 512, 30),
            log_events: vec![
                LogEvent::new(base, "INIT_START Runtime Version: python:3.11"),
                LogEvent::new(base + 1, "START RequestId: 1 Version: $LATEST"),
                LogEvent::new(base + 2, "REPORT RequestId: 1 Duration: 120.00 ms Max Memory Used: 80 MB"),
                LogEvent::new(base + 3, "START RequestId: 2 Version: $LATEST"),
                LogEvent::new(base + 4, "[ERROR] Payment gateway unreachable"),
                LogEvent::new(base + 5, "REPORT RequestId: 2 Duration: 80.00 ms Max Memory Used: 82 MB"),
            ],
            metrics: BTreeMap::from([("invocations".to_string(), hourly(10.0, 24))]),
        };

        let analysis = with_context(|ctx| {
            analyze_function(&snapshot, TimeRange::ending_at(now(), 24), ctx)
        });

        assert_eq!(analysis.log_metrics.total_invocations, 2);
        assert_eq!(analysis.error_rate, 50.0);
        assert_eq!(analysis.performance.avg, 100.0);
        assert_eq!(analysis.cards[1].level, HealthLevel::Critical);
        assert_eq!(analysis.error_timeline.iter().map(|b| b.count).sum::<u64>(), 1);
        assert_eq!(analysis.recent_logs[0].message, "REPORT RequestId: 2 Duration: 80.00 ms Max Memory Used: 82 MB");
        assert_eq!(analysis.metrics.len(), 5);
        assert_eq!(
            analysis.estimated_usage.map(|u| u.requests_per_month),
            Some(7200.0)
        );
    }

    #[test]
    fn test_instance_analysis_cards() {
        let snapshot = InstanceSnapshot {
            instance: Ec2Instance::new("i-1", "web", "t3.medium", InstanceState::ShuttingDown),
            metrics: BTreeMap::from([
                ("cpuutilization".to_string(), hourly(72.0, 3)),
                ("networkin".to_string(), hourly(2.0 * BYTES_PER_MB, 3)),
            ]),
            cpu_utilization: Vec::new(),
            memory_utilization: Vec::new(),
        };

        let analysis = analyze_instance_metrics(&snapshot, &AnalysisSettings::default());

        assert_eq!(analysis.cards[0].value, CardValue::Number(72.0));
        assert_eq!(analysis.cards[0].level, HealthLevel::Warning);
        assert_eq!(analysis.cards[1].value, CardValue::Number(2.0));
        assert_eq!(analysis.cards[2].value, CardValue::Number(0.0));
        assert_eq!(analysis.cards[3].display, "Shutting-Down");
    }

    #[test]
    fn test_series_truncated_to_newest_points() {
        let analysis_settings = AnalysisSettings {
            max_datapoints: 5,
            ..AnalysisSettings::default()
        };
        let points = hourly(10.0, 12);
        let newest = points.last().map(|p| p.timestamp);
        let metrics = BTreeMap::from([("cpuutilization".to_string(), points)]);

        let analyzed = analyze_metric_set(&metrics, EC2_METRICS, &analysis_settings);
        let cpu = &analyzed["cpuutilization"];

        assert_eq!(cpu.points.len(), 5);
        assert_eq!(cpu.points.last().map(|p| p.timestamp), newest);
    }

    #[test]
    fn test_report_includes_optimization_and_costs() {
        let mut snapshot = empty_snapshot();
        snapshot.instances.push(InstanceSnapshot {
            instance: Ec2Instance::new("i-1", "web", "t3.large", InstanceState::Running),
            metrics: BTreeMap::new(),
            cpu_utilization: hourly(5.0, 24),
            memory_utilization: Vec::new(),
        });

        let report = with_context(|ctx| build_report(snapshot, ctx));

        assert_eq!(report.ec2_optimization.total_instances, 1);
        assert_eq!(report.ec2_optimization.total_potential_savings, 41.93);
        assert_eq!(report.cost_analysis.ec2.running_instances, 1);
        assert_eq!(report.summary[6].display, "$41.93");
    }

    #[test]
    fn test_instance_costs_csv() {
        let mut snapshot = empty_snapshot();
        snapshot.instances.push(InstanceSnapshot {
            instance: Ec2Instance::new("i-1", "web", "t3.large", InstanceState::Running),
            metrics: BTreeMap::new(),
            cpu_utilization: hourly(5.0, 24),
            memory_utilization: Vec::new(),
        });
        let report = with_context(|ctx| build_report(snapshot, ctx));

        let csv = String::from_utf8(instance_costs_csv(&report.ec2_optimization).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("instance_id,name,instance_type,state,avg_cpu"));
        assert!(lines[1].starts_with("i-1,web,t3.large,running,5.0,10.0"));
    }

    #[test]
    fn test_instance_costs_csv_without_instances_has_header() {
        let report = with_context(|ctx| build_report(empty_snapshot(), ctx));

        let csv = String::from_utf8(instance_costs_csv(&report.ec2_optimization).unwrap()).unwrap();

        assert_eq!(
            csv,
            "instance_id,name,instance_type,state,avg_cpu,max_cpu,hourly_rate,monthly_cost,potential_savings,optimization_score\n"
        );
    }
}
