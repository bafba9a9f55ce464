use crate::core::report::DashboardReport;
use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;
use serde::Serialize;

/// Headline numbers of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub output_path: String,
    pub instances: usize,
    pub functions: usize,
    pub monthly_estimate: f64,
    pub potential_savings: f64,
    pub warnings: Vec<String>,
    pub demo: bool,
}

impl RunSummary {
    fn from_report(report: &DashboardReport, output_path: String) -> Self {
        Self {
            output_path,
            instances: report.instances.len(),
            functions: report.functions.len(),
            monthly_estimate: report.cost_analysis.summary.total_monthly_estimate,
            potential_savings: report.cost_analysis.summary.total_potential_savings,
            warnings: report.warnings.clone(),
            demo: report.demo,
        }
    }
}

pub struct AnalyzerEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> AnalyzerEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(false),
        }
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        tracing::info!("Starting analysis");
        self.monitor.log_stats("start");

        tracing::info!("Fetching logs and metrics...");
        let snapshot = self.pipeline.extract().await?;
        tracing::info!(
            "Fetched data for {} functions and {} instances",
            snapshot.functions.len(),
            snapshot.instances.len()
        );
        self.monitor.log_stats("extract");

        tracing::info!("Analyzing...");
        let report = self.pipeline.transform(snapshot).await?;
        tracing::info!(
            "Built report with {} summary cards and {} recommendations",
            report.summary.len(),
            report.cost_analysis.recommendations.len()
        );
        self.monitor.log_stats("transform");

        tracing::info!("Writing report...");
        let summary_without_path = RunSummary::from_report(&report, String::new());
        let output_path = self.pipeline.load(report).await?;
        tracing::info!("Report saved to: {}", output_path);
        self.monitor.log_stats("load");
        self.monitor.log_final_stats();

        Ok(RunSummary {
            output_path,
            ..summary_without_path
        })
    }
}
