pub mod cost;
pub mod engine;
pub mod health;
pub mod log_processor;
pub mod metric_processor;
pub mod optimization;
pub mod pipeline;
pub mod pricing;
pub mod report;
pub mod stats;
pub mod time_range;

pub use crate::domain::ports::{ConfigProvider, MetricsSource, Pipeline, Storage};
pub use crate::utils::error::Result;
