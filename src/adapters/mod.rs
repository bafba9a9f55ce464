// Adapters layer: concrete MetricsSource implementations (AWS SDK, demo data, caching).

#[cfg(feature = "aws")]
pub mod aws;
pub mod cache;
pub mod demo;
