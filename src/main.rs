use clap::Parser;
use cw_analyzer::core::engine::RunSummary;
use cw_analyzer::domain::ports::MetricsSource;
use cw_analyzer::utils::error::{AnalyzerError, ErrorSeverity};
use cw_analyzer::utils::{logger, validation::Validate};
use cw_analyzer::{
    AnalyzerConfig, AnalyzerEngine, CachedSource, CliArgs, DashboardPipeline, DemoSource,
    LocalStorage,
};
use std::time::Duration;

fn exit_code(severity: ErrorSeverity) -> i32 {
    match severity {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn fail(e: &AnalyzerError) -> ! {
    tracing::error!(
        "❌ Analysis failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
    std::process::exit(exit_code(e.severity()));
}

async fn run_with<Src: MetricsSource>(
    source: Src,
    args: &CliArgs,
    config: AnalyzerConfig,
) -> cw_analyzer::Result<RunSummary> {
    if args.check {
        source.check_connection().await?;
        println!("✅ Connected to AWS in {}", config.aws.region);
        std::process::exit(0);
    }

    let storage = LocalStorage::new(config.output.path.clone());
    let ttl = Duration::from_secs(config.analysis.cache_ttl_seconds);

    if args.no_cache {
        let pipeline =
            DashboardPipeline::new(source, storage, config)?.with_local_metrics(args.monitor);
        AnalyzerEngine::new_with_monitoring(pipeline, args.monitor)
            .run()
            .await
    } else {
        let pipeline = DashboardPipeline::new(CachedSource::new(source, ttl), storage, config)?
            .with_local_metrics(args.monitor);
        AnalyzerEngine::new_with_monitoring(pipeline, args.monitor)
            .run()
            .await
    }
}

#[cfg(feature = "aws")]
async fn run_live(args: &CliArgs, config: AnalyzerConfig) -> cw_analyzer::Result<RunSummary> {
    let source = cw_analyzer::AwsSource::connect(&config.aws).await;
    run_with(source, args, config).await
}

#[cfg(not(feature = "aws"))]
async fn run_live(_args: &CliArgs, _config: AnalyzerConfig) -> cw_analyzer::Result<RunSummary> {
    Err(AnalyzerError::ConfigError {
        message: "built without the `aws` feature; run with --demo".to_string(),
    })
}

fn print_summary(summary: &RunSummary) {
    if summary.demo {
        println!("🎭 Demo mode: sample data, no AWS calls were made");
    }
    println!("✅ Analysis completed successfully!");
    println!(
        "   {} EC2 instances, {} Lambda functions",
        summary.instances, summary.functions
    );
    println!(
        "   Monthly estimate ${:.2}, potential savings ${:.2}",
        summary.monthly_estimate, summary.potential_savings
    );
    for warning in &summary.warnings {
        println!("⚠️  {}", warning);
    }
    println!("📁 Report saved to: {}", summary.output_path);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    logger::init_cli_logger(args.verbose);
    tracing::info!("Starting cw-analyzer");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => fail(&e),
    };
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        fail(&e);
    }

    if args.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let result = if args.demo {
        run_with(DemoSource::new(), &args, config).await
    } else {
        run_live(&args, config).await
    };

    match result {
        Ok(summary) => {
            tracing::info!("✅ Report saved to: {}", summary.output_path);
            print_summary(&summary);
            Ok(())
        }
        Err(e) => fail(&e),
    }
}
