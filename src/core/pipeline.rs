use crate::core::log_processor::LogPatterns;
use crate::core::metric_processor::{metric_key, EC2_METRICS, LAMBDA_METRICS};
use crate::core::report::{
    build_report, instance_costs_csv, DashboardReport, FunctionSnapshot, InstanceSnapshot,
    RawSnapshot, ReportContext,
};
use crate::core::time_range::TimeRange;
use crate::domain::model::{
    Datapoint, Ec2Instance, LambdaFunction, LogQuery, MetricQuery, Statistic,
};
use crate::domain::ports::{ConfigProvider, MetricsSource, Pipeline, Storage};
use crate::utils::error::Result;
use crate::utils::monitor;
use chrono::Utc;
use std::collections::BTreeMap;

pub const INSTANCE_COSTS_FILENAME: &str = "instance_costs.csv";

const MEMORY_NAMESPACE: &str = "CWAgent";
const MEMORY_METRIC: &str = "mem_used_percent";

/// Fetches CloudWatch data through a [`MetricsSource`], analyzes it and
/// writes the dashboard report through a [`Storage`].
pub struct DashboardPipeline<Src: MetricsSource, S: Storage, C: ConfigProvider> {
    source: Src,
    storage: S,
    config: C,
    patterns: LogPatterns,
    collect_local_metrics: bool,
}

impl<Src: MetricsSource, S: Storage, C: ConfigProvider> DashboardPipeline<Src, S, C> {
    pub fn new(source: Src, storage: S, config: C) -> Result<Self> {
        let patterns = LogPatterns::from_config(config.log_patterns())?;
        Ok(Self {
            source,
            storage,
            config,
            patterns,
            collect_local_metrics: false,
        })
    }

    /// Include memory, disk and CPU of the host running the analyzer.
    pub fn with_local_metrics(mut self, enabled: bool) -> Self {
        self.collect_local_metrics = enabled;
        self
    }

    pub fn source(&self) -> &Src {
        &self.source
    }

    async fn fetch_function(
        &self,
        function: LambdaFunction,
        range: TimeRange,
        warnings: &mut Vec<String>,
    ) -> FunctionSnapshot {
        let analysis = self.config.analysis();
        let query = LogQuery {
            log_group: function.log_group_name(),
            range,
            filter_pattern: None,
            limit: analysis.max_log_events,
        };
        let log_events = or_default(
            self.source.log_events(&query).await,
            &format!("Logs for {}", function.name),
            warnings,
        );

        let mut metrics = BTreeMap::new();
        for (metric_name, statistic) in LAMBDA_METRICS {
            let query = MetricQuery::lambda(
                metric_name,
                &function.name,
                range,
                range.period_within_limit(analysis.metric_period_seconds),
            )
            .with_statistics(&[*statistic]);
            let datapoints = or_default(
                self.source.metric_statistics(&query).await,
                &format!("{} for {}", metric_name, function.name),
                warnings,
            );
            metrics.insert(metric_key(metric_name), datapoints);
        }

        tracing::debug!(
            "Fetched {} log events for {}",
            log_events.len(),
            function.name
        );

        FunctionSnapshot {
            function,
            log_events,
            metrics,
        }
    }

    async fn fetch_instance(
        &self,
        instance: Ec2Instance,
        range: TimeRange,
        utilization_range: TimeRange,
        warnings: &mut Vec<String>,
    ) -> InstanceSnapshot {
        let analysis = self.config.analysis();

        let mut metrics = BTreeMap::new();
        for (metric_name, statistic) in EC2_METRICS {
            let query = MetricQuery::ec2(
                metric_name,
                &instance.id,
                range,
                range.period_within_limit(analysis.metric_period_seconds),
            )
            .with_statistics(&[*statistic]);
            let datapoints = or_default(
                self.source.metric_statistics(&query).await,
                &format!("{} for {}", metric_name, instance.id),
                warnings,
            );
            metrics.insert(metric_key(metric_name), datapoints);
        }

        let cpu_query = MetricQuery::ec2(
            "CPUUtilization",
            &instance.id,
            utilization_range,
            utilization_range.period_within_limit(analysis.utilization_period_seconds),
        )
        .with_statistics(&[Statistic::Average, Statistic::Maximum]);
        let cpu_utilization = or_default(
            self.source.metric_statistics(&cpu_query).await,
            &format!("CPU utilization for {}", instance.id),
            warnings,
        );

        // only present when the CloudWatch agent runs on the instance
        let memory_query = MetricQuery::ec2(
            MEMORY_METRIC,
            &instance.id,
            utilization_range,
            utilization_range.period_within_limit(analysis.utilization_period_seconds),
        )
        .with_namespace(MEMORY_NAMESPACE)
        .with_statistics(&[Statistic::Average, Statistic::Maximum]);
        let memory_utilization: Vec<Datapoint> = match self
            .source
            .metric_statistics(&memory_query)
            .await
        {
            Ok(points) => points,
            Err(e) => {
                tracing::debug!("No memory metrics for {}: {}", instance.id, e);
                Vec::new()
            }
        };

        InstanceSnapshot {
            instance,
            metrics,
            cpu_utilization,
            memory_utilization,
        }
    }
}

/// Applies the "log and continue with defaults" policy to a source call.
fn or_default<T: Default>(result: Result<T>, what: &str, warnings: &mut Vec<String>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("{} unavailable: {}", what, e);
            warnings.push(format!("{}: {}", what, e.user_friendly_message()));
            T::default()
        }
    }
}

#[async_trait::async_trait]
impl<Src: MetricsSource, S: Storage, C: ConfigProvider> Pipeline for DashboardPipeline<Src, S, C> {
    async fn extract(&self) -> Result<RawSnapshot> {
        let analysis = self.config.analysis();
        let now = Utc::now();
        let range = TimeRange::ending_at(now, analysis.hours_back);
        let utilization_range =
            TimeRange::ending_at(now, analysis.utilization_days.saturating_mul(24));
        let mut warnings = Vec::new();

        tracing::debug!(
            "Analyzing {} from {} to {}",
            self.config.region(),
            range.start,
            range.end
        );

        let instances: Vec<Ec2Instance> = or_default(
            self.source.list_instances().await,
            "EC2 instances",
            &mut warnings,
        )
        .into_iter()
        .filter(|i| analysis.includes_instance(&i.id))
        .collect();

        let functions: Vec<LambdaFunction> = or_default(
            self.source.list_functions().await,
            "Lambda functions",
            &mut warnings,
        )
        .into_iter()
        .filter(|f| analysis.includes_function(&f.name))
        .collect();

        tracing::info!(
            "Found {} instances and {} functions",
            instances.len(),
            functions.len()
        );

        let mut function_snapshots = Vec::with_capacity(functions.len());
        for function in functions {
            function_snapshots.push(self.fetch_function(function, range, &mut warnings).await);
        }

        let mut instance_snapshots = Vec::with_capacity(instances.len());
        for instance in instances {
            instance_snapshots.push(
                self.fetch_instance(instance, range, utilization_range, &mut warnings)
                    .await,
            );
        }

        let cost_settings = self.config.cost();
        let actual_costs = if cost_settings.include_actual_costs {
            or_default(
                self.source.actual_costs(cost_settings.actual_cost_days).await,
                "Cost Explorer data",
                &mut warnings,
            )
        } else {
            None
        };

        let local_system = if self.collect_local_metrics {
            tokio::task::spawn_blocking(monitor::collect_local_metrics)
                .await
                .ok()
                .flatten()
        } else {
            None
        };

        Ok(RawSnapshot {
            captured_at: now,
            region: self.config.region().to_string(),
            range,
            utilization_days: analysis.utilization_days,
            demo: self.source.is_demo(),
            functions: function_snapshots,
            instances: instance_snapshots,
            actual_costs,
            local_system,
            warnings,
        })
    }

    async fn transform(&self, snapshot: RawSnapshot) -> Result<DashboardReport> {
        let ctx = ReportContext {
            patterns: &self.patterns,
            analysis: self.config.analysis(),
            default_lambda_usage: self.config.cost().default_lambda_usage(),
        };
        let report = build_report(snapshot, &ctx);

        tracing::info!(
            "Monthly estimate ${:.2}, potential EC2 savings ${:.2}",
            report.cost_analysis.summary.total_monthly_estimate,
            report.ec2_optimization.total_potential_savings
        );
        for warning in &report.warnings {
            tracing::debug!("Report warning: {}", warning);
        }

        Ok(report)
    }

    async fn load(&self, report: DashboardReport) -> Result<String> {
        let filename = self.config.report_filename();
        let json = serde_json::to_vec_pretty(&report)?;

        tracing::debug!("Writing report ({} bytes) to storage", json.len());
        self.storage.write_file(filename, &json).await?;

        if self.config.export_csv() {
            let csv = instance_costs_csv(&report.ec2_optimization)?;
            self.storage
                .write_file(INSTANCE_COSTS_FILENAME, &csv)
                .await?;
        }

        Ok(format!(
            "{}/{}",
            self.config.output_path().trim_end_matches('/'),
            filename
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::domain::model::{CostAndUsage, InstanceState, LogEvent, LogGroup};
    use crate::utils::error::AnalyzerError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                AnalyzerError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    /// Every call fails with access denied.
    struct DeniedSource;

    #[async_trait]
    impl MetricsSource for DeniedSource {
        async fn list_instances(&self) -> Result<Vec<Ec2Instance>> {
            Err(AnalyzerError::from_aws("ec2", "DescribeInstances", "AccessDenied"))
        }

        async fn list_functions(&self) -> Result<Vec<LambdaFunction>> {
            Err(AnalyzerError::from_aws("lambda", "ListFunctions", "AccessDenied"))
        }

        async fn list_log_groups(&self) -> Result<Vec<LogGroup>> {
            Err(AnalyzerError::from_aws("logs", "DescribeLogGroups", "AccessDenied"))
        }

        async fn log_events(&self, _query: &LogQuery) -> Result<Vec<LogEvent>> {
            Err(AnalyzerError::from_aws("logs", "FilterLogEvents", "AccessDenied"))
        }

        async fn metric_statistics(&self, _query: &MetricQuery) -> Result<Vec<Datapoint>> {
            Err(AnalyzerError::from_aws("cloudwatch", "GetMetricStatistics", "AccessDenied"))
        }

        async fn actual_costs(&self, _days: u32) -> Result<Option<CostAndUsage>> {
            Err(AnalyzerError::from_aws("ce", "GetCostAndUsage", "AccessDenied"))
        }

        async fn check_connection(&self) -> Result<()> {
            Err(AnalyzerError::from_aws("sts", "GetCallerIdentity", "AccessDenied"))
        }
    }

    /// One instance and one function; metric calls fail.
    struct PartialSource {
        queries: Arc<Mutex<Vec<MetricQuery>>>,
    }

    #[async_trait]
    impl MetricsSource for PartialSource {
        async fn list_instances(&self) -> Result<Vec<Ec2Instance>> {
            Ok(vec![
                Ec2Instance::new("i-1", "web", "t3.large", InstanceState::Running),
                Ec2Instance::new("i-2", "batch", "m5.large", InstanceState::Stopped),
            ])
        }

        async fn list_functions(&self) -> Result<Vec<LambdaFunction>> {
            Ok(vec![LambdaFunction::new("payment-handler", 512, 30)])
        }

        async fn list_log_groups(&self) -> Result<Vec<LogGroup>> {
            Ok(Vec::new())
        }

        async fn log_events(&self, query: &LogQuery) -> Result<Vec<LogEvent>> {
            assert_eq!(query.log_group, "/aws/lambda/payment-handler");
            let at = query.range.end_millis() - 1000;
            Ok(vec![
                LogEvent::new(at - 2, "START RequestId: 1"),
                LogEvent::new(at - 1, "REPORT RequestId: 1 Duration: 250.00 ms Max Memory Used: 90 MB"),
            ])
        }

        async fn metric_statistics(&self, query: &MetricQuery) -> Result<Vec<Datapoint>> {
            self.queries.lock().await.push(query.clone());
            Err(AnalyzerError::from_aws("cloudwatch", "GetMetricStatistics", "throttled"))
        }

        async fn actual_costs(&self, _days: u32) -> Result<Option<CostAndUsage>> {
            Ok(None)
        }

        async fn check_connection(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_extract_falls_back_to_empty_results() {
        let pipeline =
            DashboardPipeline::new(DeniedSource, MockStorage::new(), AnalyzerConfig::default())
                .unwrap();

        let snapshot = pipeline.extract().await.unwrap();

        assert!(snapshot.instances.is_empty());
        assert!(snapshot.functions.is_empty());
        assert!(snapshot.actual_costs.is_none());
        assert_eq!(snapshot.warnings.len(), 3);
        assert!(snapshot.warnings[0].contains("Access to AWS ec2 was denied"));
        assert!(!snapshot.demo);
    }

    #[tokio::test]
    async fn test_metric_failures_become_warnings() {
        let queries = Arc::new(Mutex::new(Vec::new()));
        let source = PartialSource {
            queries: queries.clone(),
        };
        let pipeline =
            DashboardPipeline::new(source, MockStorage::new(), AnalyzerConfig::default()).unwrap();

        let snapshot = pipeline.extract().await.unwrap();

        assert_eq!(snapshot.functions.len(), 1);
        assert_eq!(snapshot.functions[0].log_events.len(), 2);
        assert_eq!(snapshot.instances.len(), 2);
        // 5 lambda metrics + 2 * (5 ec2 metrics + cpu + memory)
        assert_eq!(queries.lock().await.len(), 19);
        // memory failures are not reported
        assert_eq!(snapshot.warnings.len(), 5 + 2 * 6);

        let memory = queries
            .lock()
            .await
            .iter()
            .find(|q| q.metric_name == "mem_used_percent")
            .cloned()
            .unwrap();
        assert_eq!(memory.namespace, "CWAgent");
        assert_eq!(memory.period_seconds, 3600);
        assert_eq!(memory.range.duration().num_days(), 7);
    }

    #[tokio::test]
    async fn test_filters_restrict_resources() {
        let mut config = AnalyzerConfig::default();
        config.analysis.instance_ids = vec!["i-2".to_string()];
        config.analysis.function_names = vec!["other".to_string()];
        let source = PartialSource {
            queries: Arc::new(Mutex::new(Vec::new())),
        };
        let pipeline = DashboardPipeline::new(source, MockStorage::new(), config).unwrap();

        let snapshot = pipeline.extract().await.unwrap();

        assert_eq!(snapshot.instances.len(), 1);
        assert_eq!(snapshot.instances[0].instance.id, "i-2");
        assert!(snapshot.functions.is_empty());
    }

    #[tokio::test]
    async fn test_week_window_stays_within_datapoint_limit() {
        let queries = Arc::new(Mutex::new(Vec::new()));
        let mut config = AnalyzerConfig::default();
        config.analysis.hours_back = 168;
        let source = PartialSource {
            queries: queries.clone(),
        };
        let pipeline = DashboardPipeline::new(source, MockStorage::new(), config).unwrap();

        pipeline.extract().await.unwrap();

        let queries = queries.lock().await;
        let invocations = queries
            .iter()
            .find(|q| q.metric_name == "Invocations")
            .unwrap();
        assert_eq!(invocations.period_seconds, 420);
        for query in queries.iter() {
            let points = query.range.duration().num_seconds() / i64::from(query.period_seconds);
            assert!(points <= 1440, "{} requests {} points", query.metric_name, points);
        }
    }

    #[tokio::test]
    async fn test_transform_and_load_write_report_and_csv() {
        let storage = MockStorage::new();
        let source = PartialSource {
            queries: Arc::new(Mutex::new(Vec::new())),
        };
        let pipeline =
            DashboardPipeline::new(source, storage.clone(), AnalyzerConfig::default()).unwrap();

        let snapshot = pipeline.extract().await.unwrap();
        let report = pipeline.transform(snapshot).await.unwrap();

        assert_eq!(report.functions[0].log_metrics.total_invocations, 1);
        assert_eq!(report.functions[0].performance.avg, 250.0);
        assert_eq!(report.ec2_optimization.total_instances, 2);

        let path = pipeline.load(report).await.unwrap();
        assert_eq!(path, "./output/dashboard_report.json");

        let json = storage.get_file("dashboard_report.json").await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed["region"], "ap-south-1");
        assert_eq!(parsed["instances"].as_array().unwrap().len(), 2);

        let csv = storage.get_file(INSTANCE_COSTS_FILENAME).await.unwrap();
        assert_eq!(String::from_utf8(csv).unwrap().lines().count(), 3);
    }

    #[tokio::test]
    async fn test_load_without_csv() {
        let storage = MockStorage::new();
        let mut config = AnalyzerConfig::default();
        config.output.export_csv = false;
        config.output.path = "reports/".to_string();
        let pipeline = DashboardPipeline::new(DeniedSource, storage.clone(), config).unwrap();

        let snapshot = pipeline.extract().await.unwrap();
        let report = pipeline.transform(snapshot).await.unwrap();
        let path = pipeline.load(report).await.unwrap();

        assert_eq!(path, "reports/dashboard_report.json");
        assert!(storage.get_file(INSTANCE_COSTS_FILENAME).await.is_none());
        assert!(storage.read_file("dashboard_report.json").await.is_ok());
    }

    #[test]
    fn test_invalid_log_pattern_fails_construction() {
        let mut config = AnalyzerConfig::default();
        config.logs.timeout_pattern = "(".to_string();
        let result = DashboardPipeline::new(DeniedSource, MockStorage::new(), config);
        assert!(matches!(result, Err(AnalyzerError::PatternError(_))));
    }
}
