#[cfg(feature = "lambda")]
use crate::config::{AnalysisSettings, AnalyzerConfig, CostSettings, LogPatternConfig};
#[cfg(feature = "lambda")]
use crate::domain::ports::{ConfigProvider, Storage};
#[cfg(feature = "lambda")]
use crate::utils::error::{AnalyzerError, Result};
#[cfg(feature = "lambda")]
use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "lambda")]
use std::env;

/// Lambda deployments read everything from environment variables and
/// write the report to S3.
#[cfg(feature = "lambda")]
#[derive(Debug, Clone)]
pub struct LambdaConfig {
    pub analyzer: AnalyzerConfig,
    pub s3_bucket: String,
    pub s3_prefix: String,
}

#[cfg(feature = "lambda")]
impl LambdaConfig {
    pub fn from_env() -> Result<Self> {
        let mut analyzer = AnalyzerConfig::default();

        if let Ok(region) = env::var("AWS_REGION") {
            analyzer.aws.region = region;
        }
        if let Ok(endpoint) = env::var("AWS_ENDPOINT_URL") {
            analyzer.aws.endpoint_url = Some(endpoint);
        }
        analyzer.analysis.hours_back = parse_var("HOURS_BACK", analyzer.analysis.hours_back)?;
        analyzer.analysis.utilization_days =
            parse_var("UTILIZATION_DAYS", analyzer.analysis.utilization_days)?;
        analyzer.cost.include_actual_costs =
            parse_var("INCLUDE_ACTUAL_COSTS", analyzer.cost.include_actual_costs)?;
        if let Ok(name) = env::var("REPORT_FILENAME") {
            analyzer.output.report_filename = name;
        }
        analyzer.output.export_csv = parse_var("EXPORT_CSV", analyzer.output.export_csv)?;

        let s3_bucket = env::var("S3_BUCKET").map_err(|_| AnalyzerError::MissingConfigError {
            field: "S3_BUCKET".to_string(),
        })?;
        let s3_prefix = env::var("S3_PREFIX").unwrap_or_else(|_| "cw-analyzer".to_string());
        analyzer.output.path = s3_prefix.clone();

        Ok(Self {
            analyzer,
            s3_bucket,
            s3_prefix,
        })
    }
}

#[cfg(feature = "lambda")]
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AnalyzerError::InvalidConfigValueError {
                field: name.to_string(),
                value: raw.clone(),
                reason: "Could not parse environment variable".to_string(),
            }),
        Err(_) => Ok(default),
    }
}

#[cfg(feature = "lambda")]
impl ConfigProvider for LambdaConfig {
    fn region(&self) -> &str {
        self.analyzer.region()
    }

    fn output_path(&self) -> &str {
        &self.s3_prefix
    }

    fn report_filename(&self) -> &str {
        self.analyzer.report_filename()
    }

    fn export_csv(&self) -> bool {
        self.analyzer.export_csv()
    }

    fn analysis(&self) -> &AnalysisSettings {
        self.analyzer.analysis()
    }

    fn log_patterns(&self) -> &LogPatternConfig {
        self.analyzer.log_patterns()
    }

    fn cost(&self) -> &CostSettings {
        self.analyzer.cost()
    }
}

#[cfg(feature = "lambda")]
impl crate::utils::validation::Validate for LambdaConfig {
    fn validate(&self) -> Result<()> {
        use crate::utils::validation::*;

        self.analyzer.validate()?;
        validate_s3_bucket_name("s3_bucket", &self.s3_bucket)?;
        validate_non_empty_string("s3_prefix", &self.s3_prefix)?;

        tracing::info!("Lambda configuration validation passed");
        Ok(())
    }
}

#[cfg(feature = "lambda")]
fn validate_s3_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    let invalid = |reason: &str| AnalyzerError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: bucket_name.to_string(),
        reason: reason.to_string(),
    };

    if bucket_name.len() < 3 || bucket_name.len() > 63 {
        return Err(invalid("S3 bucket name must be between 3 and 63 characters"));
    }

    if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(invalid(
            "S3 bucket name can only contain lowercase letters, numbers, hyphens, and dots",
        ));
    }

    if bucket_name.starts_with('-') || bucket_name.ends_with('-') {
        return Err(invalid("S3 bucket name cannot start or end with a hyphen"));
    }

    Ok(())
}

/// Objects are stored under `<prefix>/<path>` in the bucket.
#[cfg(feature = "lambda")]
#[derive(Debug, Clone)]
pub struct S3Storage {
    client: S3Client,
    bucket: String,
    prefix: String,
}

#[cfg(feature = "lambda")]
impl S3Storage {
    pub fn new(client: S3Client, bucket: String, prefix: String) -> Self {
        Self {
            client,
            bucket,
            prefix,
        }
    }

    fn key(&self, path: &str) -> String {
        object_key(&self.prefix, path)
    }
}

#[cfg(feature = "lambda")]
fn object_key(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", prefix, path)
    }
}

#[cfg(feature = "lambda")]
impl Storage for S3Storage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.key(path))
            .send()
            .await
            .map_err(|e| AnalyzerError::StorageError {
                message: format!(
                    "Failed to read s3://{}/{}: {}",
                    self.bucket,
                    self.key(path),
                    aws_sdk_s3::error::DisplayErrorContext(&e)
                ),
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| AnalyzerError::StorageError {
                message: format!("Failed to collect S3 data: {}", e),
            })?;

        Ok(data.into_bytes().to_vec())
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let key = self.key(path);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(data.to_vec().into())
            .send()
            .await
            .map_err(|e| AnalyzerError::StorageError {
                message: format!(
                    "Failed to write s3://{}/{}: {}",
                    self.bucket,
                    key,
                    aws_sdk_s3::error::DisplayErrorContext(&e)
                ),
            })?;

        tracing::debug!("Wrote {} bytes to s3://{}/{}", data.len(), self.bucket, key);
        Ok(())
    }
}
