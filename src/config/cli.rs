use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "cli")]
use crate::config::AnalyzerConfig;
#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "cw-analyzer")]
#[command(about = "Analyze CloudWatch logs and metrics for EC2 and Lambda and estimate costs")]
pub struct CliArgs {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// AWS region to analyze
    #[arg(long)]
    pub region: Option<String>,

    /// Hours of logs and metrics to analyze
    #[arg(long)]
    pub hours: Option<u32>,

    /// Directory the report is written to
    #[arg(short, long)]
    pub output: Option<String>,

    /// Use built-in sample data instead of calling AWS
    #[arg(long)]
    pub demo: bool,

    /// Only analyze these instance ids
    #[arg(long = "instance", value_delimiter = ',')]
    pub instances: Vec<String>,

    /// Only analyze these Lambda functions
    #[arg(long = "function", value_delimiter = ',')]
    pub functions: Vec<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Log process CPU and memory usage per phase
    #[arg(long)]
    pub monitor: bool,

    /// Call AWS directly on every request
    #[arg(long)]
    pub no_cache: bool,

    /// Test AWS connectivity and exit
    #[arg(long)]
    pub check: bool,
}

#[cfg(feature = "cli")]
impl CliArgs {
    /// Loads the configuration file (or defaults) and applies the flags on top.
    pub fn load_config(&self) -> Result<AnalyzerConfig> {
        let mut config = match &self.config {
            Some(path) => AnalyzerConfig::from_file(path)?,
            None => AnalyzerConfig::default(),
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut AnalyzerConfig) {
        if let Some(region) = &self.region {
            tracing::debug!("Region overridden to {}", region);
            config.aws.region = region.clone();
        }
        if let Some(hours) = self.hours {
            config.analysis.hours_back = hours;
        }
        if let Some(output) = &self.output {
            config.output.path = output.clone();
        }
        if !self.instances.is_empty() {
            config.analysis.instance_ids = self.instances.clone();
        }
        if !self.functions.is_empty() {
            config.analysis.function_names = self.functions.clone();
        }
    }
}

/// Writes files below a base directory on the local disk.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(path);
        let data = fs::read(full_path)?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.base_path.join(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(full_path, data)?;
        Ok(())
    }
}
