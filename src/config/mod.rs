pub mod cli;
pub mod lambda;
pub mod toml_config;

use crate::core::cost::LambdaUsage;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{AnalyzerError, Result};
use crate::utils::validation::{
    validate_aws_region, validate_capturing_regex, validate_file_name, validate_non_empty_string,
    validate_path, validate_positive_number, validate_range, validate_regex, validate_url,
    Validate,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_REGION: &str = "ap-south-1";

/// Complete analyzer configuration, one struct per TOML section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub aws: AwsSettings,
    pub analysis: AnalysisSettings,
    pub logs: LogPatternConfig,
    pub cost: CostSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsSettings {
    pub region: String,
    /// Custom endpoint, e.g. LocalStack.
    pub endpoint_url: Option<String>,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub hours_back: u32,
    pub metric_period_seconds: u32,
    pub utilization_days: u32,
    pub utilization_period_seconds: u32,
    pub max_log_events: usize,
    pub max_datapoints: usize,
    pub anomaly_threshold_multiplier: f64,
    pub recent_log_limit: usize,
    pub error_timeline_buckets: usize,
    pub cache_ttl_seconds: u64,
    /// Restrict the analysis to these instance ids; empty means all.
    pub instance_ids: Vec<String>,
    /// Restrict the analysis to these function names; empty means all.
    pub function_names: Vec<String>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            hours_back: 24,
            metric_period_seconds: 300,
            utilization_days: 7,
            utilization_period_seconds: 3600,
            max_log_events: 1000,
            max_datapoints: 1440,
            anomaly_threshold_multiplier: 2.0,
            recent_log_limit: 50,
            error_timeline_buckets: 12,
            cache_ttl_seconds: 300,
            instance_ids: Vec::new(),
            function_names: Vec::new(),
        }
    }
}

impl AnalysisSettings {
    pub fn includes_instance(&self, id: &str) -> bool {
        self.instance_ids.is_empty() || self.instance_ids.iter().any(|i| i == id)
    }

    pub fn includes_function(&self, name: &str) -> bool {
        self.function_names.is_empty() || self.function_names.iter().any(|f| f == name)
    }
}

/// Patterns recognised in Lambda runtime logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogPatternConfig {
    /// Plain substrings; any match marks the line as an error.
    pub error_patterns: Vec<String>,
    pub timeout_pattern: String,
    pub memory_pattern: String,
    pub duration_pattern: String,
}

impl Default for LogPatternConfig {
    fn default() -> Self {
        Self {
            error_patterns: ["ERROR", "Exception", "Traceback", "Failed", "Error"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            timeout_pattern: r"Task timed out after".to_string(),
            memory_pattern: r"Max Memory Used: (\d+) MB".to_string(),
            duration_pattern: r"Duration: ([\d.]+) ms".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostSettings {
    pub default_lambda_requests_per_month: f64,
    pub default_lambda_duration_ms: f64,
    pub actual_cost_days: u32,
    pub include_actual_costs: bool,
}

impl Default for CostSettings {
    fn default() -> Self {
        let usage = LambdaUsage::default();
        Self {
            default_lambda_requests_per_month: usage.requests_per_month,
            default_lambda_duration_ms: usage.avg_duration_ms,
            actual_cost_days: 30,
            include_actual_costs: true,
        }
    }
}

impl CostSettings {
    pub fn default_lambda_usage(&self) -> LambdaUsage {
        LambdaUsage {
            requests_per_month: self.default_lambda_requests_per_month,
            avg_duration_ms: self.default_lambda_duration_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub path: String,
    pub report_filename: String,
    pub export_csv: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            path: "./output".to_string(),
            report_filename: "dashboard_report.json".to_string(),
            export_csv: true,
        }
    }
}

impl ConfigProvider for AnalyzerConfig {
    fn region(&self) -> &str {
        &self.aws.region
    }

    fn output_path(&self) -> &str {
        &self.output.path
    }

    fn report_filename(&self) -> &str {
        &self.output.report_filename
    }

    fn export_csv(&self) -> bool {
        self.output.export_csv
    }

    fn analysis(&self) -> &AnalysisSettings {
        &self.analysis
    }

    fn log_patterns(&self) -> &LogPatternConfig {
        &self.logs
    }

    fn cost(&self) -> &CostSettings {
        &self.cost
    }
}

impl Validate for AnalyzerConfig {
    fn validate(&self) -> Result<()> {
        validate_aws_region("aws.region", &self.aws.region)?;
        if let Some(endpoint) = &self.aws.endpoint_url {
            validate_url("aws.endpoint_url", endpoint)?;
        }

        let analysis = &self.analysis;
        validate_range("analysis.hours_back", analysis.hours_back, 1, 24 * 15)?;
        validate_range(
            "analysis.metric_period_seconds",
            analysis.metric_period_seconds,
            60,
            86_400,
        )?;
        validate_range("analysis.utilization_days", analysis.utilization_days, 1, 63)?;
        validate_range(
            "analysis.utilization_period_seconds",
            analysis.utilization_period_seconds,
            60,
            86_400,
        )?;
        validate_range("analysis.max_log_events", analysis.max_log_events, 1, 10_000)?;
        validate_positive_number("analysis.max_datapoints", analysis.max_datapoints, 1)?;
        validate_range(
            "analysis.anomaly_threshold_multiplier",
            analysis.anomaly_threshold_multiplier,
            0.0,
            10.0,
        )?;
        validate_positive_number("analysis.recent_log_limit", analysis.recent_log_limit, 1)?;
        validate_range(
            "analysis.error_timeline_buckets",
            analysis.error_timeline_buckets,
            1,
            1000,
        )?;
        for id in &analysis.instance_ids {
            validate_non_empty_string("analysis.instance_ids", id)?;
        }
        for name in &analysis.function_names {
            validate_non_empty_string("analysis.function_names", name)?;
        }

        if self.logs.error_patterns.is_empty() {
            return Err(AnalyzerError::InvalidConfigValueError {
                field: "logs.error_patterns".to_string(),
                value: "[]".to_string(),
                reason: "At least one error pattern is required".to_string(),
            });
        }
        validate_regex("logs.timeout_pattern", &self.logs.timeout_pattern)?;
        validate_capturing_regex("logs.memory_pattern", &self.logs.memory_pattern)?;
        validate_capturing_regex("logs.duration_pattern", &self.logs.duration_pattern)?;

        validate_range(
            "cost.default_lambda_requests_per_month",
            self.cost.default_lambda_requests_per_month,
            0.0,
            f64::MAX,
        )?;
        validate_range(
            "cost.default_lambda_duration_ms",
            self.cost.default_lambda_duration_ms,
            0.0,
            900_000.0,
        )?;
        validate_range("cost.actual_cost_days", self.cost.actual_cost_days, 1, 365)?;

        validate_path("output.path", &self.output.path)?;
        validate_file_name("output.report_filename", &self.output.report_filename)?;

        Ok(())
    }
}
