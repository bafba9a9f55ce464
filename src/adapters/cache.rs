use crate::core::time_range::TimeRange;
use crate::domain::model::{
    CostAndUsage, Datapoint, Ec2Instance, LambdaFunction, LogEvent, LogGroup, LogQuery,
    MetricQuery,
};
use crate::domain::ports::MetricsSource;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Remembers successful responses of the wrapped source for a fixed TTL.
///
/// Entries are keyed by request parameters with time windows reduced to
/// their length, so "the last 24 hours" asked twice within the TTL is
/// served from memory. Errors are never cached.
pub struct CachedSource<S: MetricsSource> {
    inner: S,
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, serde_json::Value)>>,
}

impl<S: MetricsSource> CachedSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    async fn cached<T, F, Fut>(&self, key: String, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        {
            let entries = self.entries.lock().await;
            if let Some((stored_at, value)) = entries.get(&key) {
                if stored_at.elapsed() < self.ttl {
                    if let Ok(hit) = serde_json::from_value(value.clone()) {
                        tracing::debug!("Cache hit for {}", key);
                        return Ok(hit);
                    }
                }
            }
        }

        let fresh = fetch().await?;
        let value = serde_json::to_value(&fresh)?;
        let mut entries = self.entries.lock().await;
        let ttl = self.ttl;
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
        entries.insert(key, (Instant::now(), value));
        Ok(fresh)
    }
}

fn window(range: &TimeRange) -> i64 {
    range.duration().num_seconds()
}

#[async_trait]
impl<S: MetricsSource> MetricsSource for CachedSource<S> {
    async fn list_instances(&self) -> Result<Vec<Ec2Instance>> {
        self.cached("instances".to_string(), || self.inner.list_instances())
            .await
    }

    async fn list_functions(&self) -> Result<Vec<LambdaFunction>> {
        self.cached("functions".to_string(), || self.inner.list_functions())
            .await
    }

    async fn list_log_groups(&self) -> Result<Vec<LogGroup>> {
        self.cached("log_groups".to_string(), || self.inner.list_log_groups())
            .await
    }

    async fn log_events(&self, query: &LogQuery) -> Result<Vec<LogEvent>> {
        let key = format!(
            "logs:{}:{}:{}:{}",
            query.log_group,
            window(&query.range),
            query.filter_pattern.as_deref().unwrap_or(""),
            query.limit
        );
        self.cached(key, || self.inner.log_events(query)).await
    }

    async fn metric_statistics(&self, query: &MetricQuery) -> Result<Vec<Datapoint>> {
        let statistics: Vec<&str> = query.statistics.iter().map(|s| s.as_str()).collect();
        let key = format!(
            "metrics:{}:{}:{}={}:{}:{}:{}",
            query.namespace,
            query.metric_name,
            query.dimension_name,
            query.dimension_value,
            window(&query.range),
            query.period_seconds,
            statistics.join(",")
        );
        self.cached(key, || self.inner.metric_statistics(query))
            .await
    }

    async fn actual_costs(&self, days: u32) -> Result<Option<CostAndUsage>> {
        self.cached(format!("costs:{}", days), || self.inner.actual_costs(days))
            .await
    }

    async fn check_connection(&self) -> Result<()> {
        self.inner.check_connection().await
    }

    fn is_demo(&self) -> bool {
        self.inner.is_demo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::demo::DemoSource;
    use crate::domain::model::Statistic;
    use crate::utils::error::AnalyzerError;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Counts calls reaching the wrapped source.
    struct CountingSource {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl MetricsSource for CountingSource {
        async fn list_instances(&self) -> Result<Vec<Ec2Instance>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AnalyzerError::from_aws("ec2", "DescribeInstances", "timeout"));
            }
            DemoSource::new().list_instances().await
        }

        async fn list_functions(&self) -> Result<Vec<LambdaFunction>> {
            DemoSource::new().list_functions().await
        }

        async fn list_log_groups(&self) -> Result<Vec<LogGroup>> {
            DemoSource::new().list_log_groups().await
        }

        async fn log_events(&self, query: &LogQuery) -> Result<Vec<LogEvent>> {
            DemoSource::new().log_events(query).await
        }

        async fn metric_statistics(&self, query: &MetricQuery) -> Result<Vec<Datapoint>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            DemoSource::new().metric_statistics(query).await
        }

        async fn actual_costs(&self, days: u32) -> Result<Option<CostAndUsage>> {
            DemoSource::new().actual_costs(days).await
        }

        async fn check_connection(&self) -> Result<()> {
            Ok(())
        }
    }

    fn counting(fail: bool) -> (Arc<AtomicUsize>, CountingSource) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            calls: calls.clone(),
            fail,
        };
        (calls, source)
    }

    #[tokio::test]
    async fn test_repeated_calls_hit_cache() {
        let (calls, inner) = counting(false);
        let cache = CachedSource::new(inner, Duration::from_secs(300));

        let first = cache.list_instances().await.unwrap();
        let second = cache.list_instances().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_same_window_length_shares_entry() {
        let (calls, inner) = counting(false);
        let cache = CachedSource::new(inner, Duration::from_secs(300));
        let end = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let earlier = MetricQuery::ec2(
            "CPUUtilization",
            "i-1234567890abcdef0",
            TimeRange::ending_at(end, 24),
            300,
        );
        let later = MetricQuery::ec2(
            "CPUUtilization",
            "i-1234567890abcdef0",
            TimeRange::ending_at(end + chrono::Duration::minutes(2), 24),
            300,
        );
        cache.metric_statistics(&earlier).await.unwrap();
        cache.metric_statistics(&later).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let other_stats = later.clone().with_statistics(&[Statistic::Maximum]);
        cache.metric_statistics(&other_stats).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let (calls, inner) = counting(false);
        let cache = CachedSource::new(inner, Duration::ZERO);

        cache.list_instances().await.unwrap();
        cache.list_instances().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expired_entries_are_swept_on_insert() {
        let (_, inner) = counting(false);
        let cache = CachedSource::new(inner, Duration::ZERO);

        cache.list_instances().await.unwrap();
        cache.list_functions().await.unwrap();
        cache.list_log_groups().await.unwrap();

        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let (calls, inner) = counting(true);
        let cache = CachedSource::new(inner, Duration::from_secs(300));

        assert!(cache.list_instances().await.is_err());
        assert!(cache.list_instances().await.is_err());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_and_passthrough() {
        let (calls, inner) = counting(false);
        let cache = CachedSource::new(inner, Duration::from_secs(300));

        cache.list_instances().await.unwrap();
        cache.clear().await;
        cache.list_instances().await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!cache.is_demo());
        assert!(cache.check_connection().await.is_ok());
    }
}
