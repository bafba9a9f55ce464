#[cfg(feature = "lambda")]
use aws_config::{BehaviorVersion, Region};
#[cfg(feature = "lambda")]
use aws_sdk_s3::Client as S3Client;
#[cfg(feature = "lambda")]
use cw_analyzer::config::lambda::{LambdaConfig, S3Storage};
#[cfg(feature = "lambda")]
use cw_analyzer::utils::{logger, validation::Validate};
#[cfg(feature = "lambda")]
use cw_analyzer::{AnalyzerEngine, AwsSource, DashboardPipeline};
#[cfg(feature = "lambda")]
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
#[cfg(feature = "lambda")]
use serde::{Deserialize, Serialize};

/// Optional overrides; a scheduled EventBridge event deserializes as all `None`.
#[cfg(feature = "lambda")]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Request {
    pub hours_back: Option<u32>,
    pub s3_bucket: Option<String>,
    pub s3_prefix: Option<String>,
    pub function_names: Option<Vec<String>>,
    pub instance_ids: Option<Vec<String>>,
}

#[cfg(feature = "lambda")]
#[derive(Debug, Serialize)]
pub struct Response {
    pub message: String,
    pub output_path: String,
    pub instances: usize,
    pub functions: usize,
    pub monthly_estimate: f64,
    pub potential_savings: f64,
    pub warnings: Vec<String>,
}

#[cfg(feature = "lambda")]
fn apply_request(config: &mut LambdaConfig, request: Request) {
    if let Some(hours) = request.hours_back {
        config.analyzer.analysis.hours_back = hours;
    }
    if let Some(bucket) = request.s3_bucket {
        config.s3_bucket = bucket;
    }
    if let Some(prefix) = request.s3_prefix {
        config.analyzer.output.path = prefix.clone();
        config.s3_prefix = prefix;
    }
    if let Some(names) = request.function_names {
        config.analyzer.analysis.function_names = names;
    }
    if let Some(ids) = request.instance_ids {
        config.analyzer.analysis.instance_ids = ids;
    }
}

#[cfg(feature = "lambda")]
async fn function_handler(event: LambdaEvent<Request>) -> Result<Response, Error> {
    tracing::info!("Starting cw-analyzer Lambda function");

    let mut lambda_config = LambdaConfig::from_env()?;
    apply_request(&mut lambda_config, event.payload);
    lambda_config.validate()?;

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(lambda_config.analyzer.aws.region.clone()));
    if let Some(endpoint) = &lambda_config.analyzer.aws.endpoint_url {
        loader = loader.endpoint_url(endpoint.clone());
    }
    let shared = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&shared)
        .force_path_style(lambda_config.analyzer.aws.endpoint_url.is_some())
        .build();
    let storage = S3Storage::new(
        S3Client::from_conf(s3_config),
        lambda_config.s3_bucket.clone(),
        lambda_config.s3_prefix.clone(),
    );

    let source = AwsSource::from_shared_config(&shared, &lambda_config.analyzer.aws.region);
    let pipeline = DashboardPipeline::new(source, storage, lambda_config)?;

    let summary = AnalyzerEngine::new(pipeline).run().await?;

    tracing::info!("cw-analyzer Lambda function completed successfully");
    Ok(Response {
        message: "Analysis completed successfully".to_string(),
        output_path: summary.output_path,
        instances: summary.instances,
        functions: summary.functions,
        monthly_estimate: summary.monthly_estimate,
        potential_savings: summary.potential_savings,
        warnings: summary.warnings,
    })
}

#[cfg(feature = "lambda")]
#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();
    run(service_fn(function_handler)).await
}
