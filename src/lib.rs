pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliArgs;
pub use config::cli::LocalStorage;
pub use config::AnalyzerConfig;

#[cfg(feature = "lambda")]
pub use config::lambda::{LambdaConfig, S3Storage};

#[cfg(feature = "aws")]
pub use adapters::aws::AwsSource;
pub use adapters::{cache::CachedSource, demo::DemoSource};
pub use core::{engine::AnalyzerEngine, engine::RunSummary, pipeline::DashboardPipeline};
pub use utils::error::{AnalyzerError, Result};
