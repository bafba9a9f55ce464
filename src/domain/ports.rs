use crate::config::{AnalysisSettings, CostSettings, LogPatternConfig};
use crate::core::report::{DashboardReport, RawSnapshot};
use crate::core::time_range::TimeRange;
use crate::domain::model::{
    CostAndUsage, Datapoint, Ec2Instance, LambdaFunction, LogEvent, LogGroup, LogQuery,
    MetricQuery,
};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Read access to the cloud provider's compute, logs, metrics and billing APIs.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Non-terminated EC2 instances.
    async fn list_instances(&self) -> Result<Vec<Ec2Instance>>;

    async fn list_functions(&self) -> Result<Vec<LambdaFunction>>;

    /// All log groups, sorted by name.
    async fn list_log_groups(&self) -> Result<Vec<LogGroup>>;

    async fn lambda_log_groups(&self) -> Result<Vec<LogGroup>> {
        let groups = self.list_log_groups().await?;
        Ok(groups.into_iter().filter(LogGroup::is_lambda).collect())
    }

    async fn log_events(&self, query: &LogQuery) -> Result<Vec<LogEvent>>;

    async fn search_log_events(
        &self,
        log_group: &str,
        filter_pattern: &str,
        range: TimeRange,
        limit: usize,
    ) -> Result<Vec<LogEvent>> {
        let query = LogQuery {
            log_group: log_group.to_string(),
            range,
            filter_pattern: Some(filter_pattern.to_string()),
            limit,
        };
        self.log_events(&query).await
    }

    async fn metric_statistics(&self, query: &MetricQuery) -> Result<Vec<Datapoint>>;

    /// Billed costs over the last `days`; `None` when billing data is not available.
    async fn actual_costs(&self, days: u32) -> Result<Option<CostAndUsage>>;

    async fn check_connection(&self) -> Result<()>;

    /// True when the data is generated rather than fetched.
    fn is_demo(&self) -> bool {
        false
    }
}

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn region(&self) -> &str;
    fn output_path(&self) -> &str;
    fn report_filename(&self) -> &str;
    fn export_csv(&self) -> bool;
    fn analysis(&self) -> &AnalysisSettings;
    fn log_patterns(&self) -> &LogPatternConfig;
    fn cost(&self) -> &CostSettings;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<RawSnapshot>;
    async fn transform(&self, snapshot: RawSnapshot) -> Result<DashboardReport>;
    async fn load(&self, report: DashboardReport) -> Result<String>;
}
