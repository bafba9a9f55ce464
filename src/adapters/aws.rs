use crate::config::AwsSettings;
use crate::domain::model::{
    CostAndUsage, Datapoint, Ec2Instance, InstanceState, LambdaFunction, LogEvent, LogGroup,
    LogQuery, MetricQuery, Statistic,
};
use crate::domain::ports::MetricsSource;
use crate::utils::error::{AnalyzerError, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_cloudwatch::types::{Dimension, Statistic as CwStatistic};
use aws_sdk_costexplorer::types::{
    DateInterval, Granularity, GroupDefinition, GroupDefinitionType, ResultByTime,
};
use aws_smithy_types::DateTime as SmithyDateTime;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Cost Explorer only serves requests from this region.
const COST_EXPLORER_REGION: &str = "us-east-1";
const COST_METRIC: &str = "BlendedCost";
/// FilterLogEvents returns at most this many events per page.
const MAX_LOG_PAGE_SIZE: usize = 10_000;

/// [`MetricsSource`] backed by the AWS SDK clients of one region.
#[derive(Debug, Clone)]
pub struct AwsSource {
    region: String,
    ec2: aws_sdk_ec2::Client,
    lambda: aws_sdk_lambda::Client,
    logs: aws_sdk_cloudwatchlogs::Client,
    cloudwatch: aws_sdk_cloudwatch::Client,
    cost_explorer: aws_sdk_costexplorer::Client,
}

impl AwsSource {
    /// Loads credentials from the default provider chain.
    pub async fn connect(settings: &AwsSettings) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(settings.region.clone()));
        if let Some(endpoint) = &settings.endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let shared = loader.load().await;

        tracing::debug!("AWS clients configured for {}", settings.region);
        Self::from_shared_config(&shared, &settings.region)
    }

    pub fn from_shared_config(shared: &SdkConfig, region: &str) -> Self {
        let cost_config = aws_sdk_costexplorer::config::Builder::from(shared)
            .region(Region::new(COST_EXPLORER_REGION))
            .build();

        Self {
            region: region.to_string(),
            ec2: aws_sdk_ec2::Client::new(shared),
            lambda: aws_sdk_lambda::Client::new(shared),
            logs: aws_sdk_cloudwatchlogs::Client::new(shared),
            cloudwatch: aws_sdk_cloudwatch::Client::new(shared),
            cost_explorer: aws_sdk_costexplorer::Client::from_conf(cost_config),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }
}

fn to_smithy(time: DateTime<Utc>) -> SmithyDateTime {
    SmithyDateTime::from_millis(time.timestamp_millis())
}

fn from_smithy(time: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(time.secs(), time.subsec_nanos())
}

fn cloudwatch_statistic(statistic: Statistic) -> CwStatistic {
    match statistic {
        Statistic::Average => CwStatistic::Average,
        Statistic::Sum => CwStatistic::Sum,
        Statistic::Maximum => CwStatistic::Maximum,
        Statistic::Minimum => CwStatistic::Minimum,
        Statistic::SampleCount => CwStatistic::SampleCount,
    }
}

fn instance_from_sdk(instance: &aws_sdk_ec2::types::Instance) -> Option<Ec2Instance> {
    let id = instance.instance_id()?;
    let state = instance
        .state()
        .and_then(|s| s.name())
        .map(|name| InstanceState::parse(name.as_str()))
        .unwrap_or_else(|| InstanceState::Other("unknown".to_string()));
    let name = instance
        .tags()
        .iter()
        .find(|tag| tag.key() == Some("Name"))
        .and_then(|tag| tag.value())
        .unwrap_or("N/A");
    let instance_type = instance
        .instance_type()
        .map(|t| t.as_str())
        .unwrap_or("unknown");

    let mut result = Ec2Instance::new(id, name, instance_type, state);
    result.private_ip = instance.private_ip_address().map(str::to_string);
    result.public_ip = instance.public_ip_address().map(str::to_string);
    result.availability_zone = instance
        .placement()
        .and_then(|p| p.availability_zone())
        .map(str::to_string);
    result.launch_time = instance.launch_time().and_then(from_smithy);
    result.platform = instance.platform_details().map(str::to_string);
    Some(result)
}

fn datapoint_from_sdk(point: &aws_sdk_cloudwatch::types::Datapoint) -> Option<Datapoint> {
    Some(Datapoint {
        timestamp: point.timestamp().and_then(from_smithy)?,
        average: point.average(),
        sum: point.sum(),
        maximum: point.maximum(),
        minimum: point.minimum(),
        sample_count: point.sample_count(),
        unit: point.unit().map(|u| u.as_str().to_string()),
    })
}

#[async_trait]
impl MetricsSource for AwsSource {
    async fn list_instances(&self) -> Result<Vec<Ec2Instance>> {
        let mut pages = self.ec2.describe_instances().into_paginator().send();
        let mut instances = Vec::new();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                AnalyzerError::from_aws(
                    "ec2",
                    "DescribeInstances",
                    aws_sdk_ec2::error::DisplayErrorContext(&e).to_string(),
                )
            })?;
            for reservation in page.reservations() {
                instances.extend(
                    reservation
                        .instances()
                        .iter()
                        .filter_map(instance_from_sdk)
                        .filter(|i| i.state != InstanceState::Terminated),
                );
            }
        }

        tracing::debug!("DescribeInstances returned {} instances", instances.len());
        Ok(instances)
    }

    async fn list_functions(&self) -> Result<Vec<LambdaFunction>> {
        let mut pages = self.lambda.list_functions().into_paginator().send();
        let mut functions = Vec::new();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                AnalyzerError::from_aws(
                    "lambda",
                    "ListFunctions",
                    aws_sdk_lambda::error::DisplayErrorContext(&e).to_string(),
                )
            })?;
            for config in page.functions() {
                let Some(name) = config.function_name() else {
                    continue;
                };
                let mut function = LambdaFunction::new(
                    name,
                    config.memory_size().unwrap_or(128).max(0) as u32,
                    config.timeout().unwrap_or(3).max(0) as u32,
                );
                function.runtime = config.runtime().map(|r| r.as_str().to_string());
                function.code_size = config.code_size();
                function.handler = config.handler().map(str::to_string);
                function.last_modified = config.last_modified().map(str::to_string);
                functions.push(function);
            }
        }

        Ok(functions)
    }

    async fn list_log_groups(&self) -> Result<Vec<LogGroup>> {
        let mut pages = self.logs.describe_log_groups().into_paginator().send();
        let mut groups = Vec::new();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                AnalyzerError::from_aws(
                    "logs",
                    "DescribeLogGroups",
                    aws_sdk_cloudwatchlogs::error::DisplayErrorContext(&e).to_string(),
                )
            })?;
            groups.extend(page.log_groups().iter().filter_map(|g| {
                Some(LogGroup {
                    name: g.log_group_name()?.to_string(),
                    creation_time: g.creation_time().unwrap_or(0),
                    stored_bytes: g.stored_bytes().unwrap_or(0),
                })
            }));
        }

        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    async fn log_events(&self, query: &LogQuery) -> Result<Vec<LogEvent>> {
        let page_size = query.limit.clamp(1, MAX_LOG_PAGE_SIZE) as i32;
        let mut pages = self
            .logs
            .filter_log_events()
            .log_group_name(&query.log_group)
            .start_time(query.range.start_millis())
            .end_time(query.range.end_millis())
            .set_filter_pattern(query.filter_pattern.clone())
            .limit(page_size)
            .into_paginator()
            .send();
        let mut events = Vec::new();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                AnalyzerError::from_aws(
                    "logs",
                    "FilterLogEvents",
                    aws_sdk_cloudwatchlogs::error::DisplayErrorContext(&e).to_string(),
                )
            })?;
            for event in page.events() {
                if let (Some(timestamp), Some(message)) = (event.timestamp(), event.message()) {
                    events.push(LogEvent::new(timestamp, message.trim_end()));
                }
            }
            if events.len() >= query.limit {
                events.truncate(query.limit);
                break;
            }
        }

        tracing::debug!("{} events from {}", events.len(), query.log_group);
        Ok(events)
    }

    async fn metric_statistics(&self, query: &MetricQuery) -> Result<Vec<Datapoint>> {
        let statistics = query
            .statistics
            .iter()
            .map(|s| cloudwatch_statistic(*s))
            .collect();

        let response = self
            .cloudwatch
            .get_metric_statistics()
            .namespace(&query.namespace)
            .metric_name(&query.metric_name)
            .dimensions(
                Dimension::builder()
                    .name(&query.dimension_name)
                    .value(&query.dimension_value)
                    .build(),
            )
            .start_time(to_smithy(query.range.start))
            .end_time(to_smithy(query.range.end))
            .period(query.period_seconds as i32)
            .set_statistics(Some(statistics))
            .send()
            .await
            .map_err(|e| {
                AnalyzerError::from_aws(
                    "cloudwatch",
                    "GetMetricStatistics",
                    aws_sdk_cloudwatch::error::DisplayErrorContext(&e).to_string(),
                )
            })?;

        let mut points: Vec<Datapoint> = response
            .datapoints()
            .iter()
            .filter_map(datapoint_from_sdk)
            .collect();
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }

    async fn actual_costs(&self, days: u32) -> Result<Option<CostAndUsage>> {
        let end = Utc::now().date_naive();
        let start = end - Duration::days(days as i64);
        let start_text = start.format("%Y-%m-%d").to_string();
        let end_text = end.format("%Y-%m-%d").to_string();

        let interval = DateInterval::builder()
            .start(&start_text)
            .end(&end_text)
            .build()
            .map_err(|e| AnalyzerError::ProcessingError {
                message: format!("Invalid cost period: {}", e),
            })?;

        let response = self
            .cost_explorer
            .get_cost_and_usage()
            .time_period(interval)
            .granularity(Granularity::Monthly)
            .metrics(COST_METRIC)
            .group_by(
                GroupDefinition::builder()
                    .r#type(GroupDefinitionType::Dimension)
                    .key("SERVICE")
                    .build(),
            )
            .send()
            .await
            .map_err(|e| {
                AnalyzerError::from_aws(
                    "ce",
                    "GetCostAndUsage",
                    aws_sdk_costexplorer::error::DisplayErrorContext(&e).to_string(),
                )
            })?;

        let cost_by_service = costs_by_service(response.results_by_time());

        if cost_by_service.is_empty() {
            return Ok(None);
        }

        Ok(Some(CostAndUsage {
            total_cost: cost_by_service.values().sum(),
            cost_by_service,
            period: format!("{} to {}", start_text, end_text),
        }))
    }

    async fn check_connection(&self) -> Result<()> {
        self.logs
            .describe_log_groups()
            .limit(1)
            .send()
            .await
            .map_err(|e| {
                AnalyzerError::from_aws(
                    "logs",
                    "DescribeLogGroups",
                    aws_sdk_cloudwatchlogs::error::DisplayErrorContext(&e).to_string(),
                )
            })?;

        self.ec2
            .describe_instances()
            .max_results(5)
            .send()
            .await
            .map_err(|e| {
                AnalyzerError::from_aws(
                    "ec2",
                    "DescribeInstances",
                    aws_sdk_ec2::error::DisplayErrorContext(&e).to_string(),
                )
            })?;

        tracing::info!("AWS connectivity check passed for {}", self.region);
        Ok(())
    }
}

/// Sums each service over all periods and drops services that cost nothing.
fn costs_by_service(results: &[ResultByTime]) -> BTreeMap<String, f64> {
    let mut cost_by_service: BTreeMap<String, f64> = BTreeMap::new();
    for result in results {
        for group in result.groups() {
            let Some(service) = group.keys().first() else {
                continue;
            };
            let amount = group
                .metrics()
                .and_then(|m| m.get(COST_METRIC))
                .and_then(|v| v.amount())
                .and_then(|a| a.parse::<f64>().ok())
                .unwrap_or(0.0);
            *cost_by_service.entry(service.clone()).or_insert(0.0) += amount;
        }
    }
    cost_by_service.retain(|_, amount| *amount > 0.0);
    cost_by_service
}
