use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// The AWS SDK crates log every credential lookup and retry at info level.
const SDK_DIRECTIVES: &str = "aws_config=warn,aws_smithy_runtime=warn,aws_sdk_sts=warn";

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,cw_analyzer={},{}",
            default_level, SDK_DIRECTIVES
        ))
    })
}

pub fn init_cli_logger(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    tracing_subscriber::registry()
        .with(filter(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(verbose)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// JSON lines without timestamps; CloudWatch Logs indexes the fields and stamps each event.
fn lambda_layer<S>() -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(false)
        .with_target(false)
        .without_time()
}

pub fn init_lambda_logger() {
    tracing_subscriber::registry()
        .with(filter("info"))
        .with(lambda_layer())
        .init();
}
