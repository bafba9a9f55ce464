use crate::core::pricing;
use crate::core::stats::{self, round_to};
use crate::domain::model::{Datapoint, Ec2Instance, InstanceState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const UNDERUTILIZED_CPU: f64 = 10.0;
const LOW_UTILIZATION_CPU: f64 = 25.0;
const HIGH_UTILIZATION_CPU: f64 = 80.0;
const T2_UPGRADE_CPU: f64 = 20.0;

/// CPU utilization over the analysis window, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuUtilization {
    pub average: f64,
    pub max: f64,
    pub datapoints: usize,
    pub period_days: u32,
}

impl CpuUtilization {
    pub fn from_datapoints(datapoints: &[Datapoint], period_days: u32) -> Self {
        let (average, max) = average_and_max(datapoints);
        Self {
            average,
            max,
            datapoints: datapoints.len(),
            period_days,
        }
    }
}

/// Memory utilization reported by the CloudWatch agent (`CWAgent/mem_used_percent`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUtilization {
    pub average: f64,
    pub max: f64,
    pub free: f64,
    pub datapoints: usize,
}

impl MemoryUtilization {
    pub fn from_datapoints(datapoints: &[Datapoint]) -> Self {
        if datapoints.is_empty() {
            return Self::default();
        }

        let (average, max) = average_and_max(datapoints);
        Self {
            average,
            max,
            free: round_to(100.0 - average, 2),
            datapoints: datapoints.len(),
        }
    }
}

fn average_and_max(datapoints: &[Datapoint]) -> (f64, f64) {
    let averages: Vec<f64> = datapoints.iter().filter_map(|p| p.average).collect();
    let maxima: Vec<f64> = datapoints
        .iter()
        .filter_map(|p| p.maximum.or(p.average))
        .collect();

    (
        round_to(stats::mean(&averages), 2),
        round_to(stats::max(&maxima), 2),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationType {
    Underutilized,
    LowUtilization,
    HighUtilization,
    InstanceFamily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationType,
    pub severity: Severity,
    pub message: String,
    pub action: String,
    pub potential_saving: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub recommendations: Vec<InstanceRecommendation>,
    pub total_potential_savings: f64,
    pub optimization_score: u8,
}

/// Applies the utilization rules to a single instance.
///
/// The t2 family hint is informational and does not count toward
/// `total_potential_savings`.
pub fn analyze_instance(
    instance_type: &str,
    cpu: &CpuUtilization,
    monthly_cost: f64,
) -> OptimizationResult {
    let avg = cpu.average;
    let mut recommendations = Vec::new();
    let mut potential_savings = 0.0;

    if avg < UNDERUTILIZED_CPU {
        let saving = monthly_cost * 0.7;
        recommendations.push(InstanceRecommendation {
            kind: RecommendationType::Underutilized,
            severity: Severity::High,
            message: format!(
                "Instance is severely underutilized (avg CPU: {:.1}%). Consider stopping or downsizing.",
                avg
            ),
            action: "Consider t3.nano or t3.micro".to_string(),
            potential_saving: saving,
        });
        potential_savings += saving;
    } else if avg < LOW_UTILIZATION_CPU {
        let saving = monthly_cost * 0.4;
        recommendations.push(InstanceRecommendation {
            kind: RecommendationType::LowUtilization,
            severity: Severity::Medium,
            message: format!(
                "Instance has low utilization (avg CPU: {:.1}%). Consider downsizing.",
                avg
            ),
            action: "Downsize to smaller instance type".to_string(),
            potential_saving: saving,
        });
        potential_savings += saving;
    } else if avg > HIGH_UTILIZATION_CPU {
        recommendations.push(InstanceRecommendation {
            kind: RecommendationType::HighUtilization,
            severity: Severity::Medium,
            message: format!(
                "Instance has high utilization (avg CPU: {:.1}%). Consider upgrading.",
                avg
            ),
            action: "Upgrade to larger instance type".to_string(),
            potential_saving: 0.0,
        });
    }

    if let Some(size) = instance_type.strip_prefix("t2.") {
        if avg > T2_UPGRADE_CPU {
            recommendations.push(InstanceRecommendation {
                kind: RecommendationType::InstanceFamily,
                severity: Severity::Low,
                message: "Consider upgrading from t2 to t3 family for better performance and cost efficiency.".to_string(),
                action: format!("Upgrade to t3.{}", size),
                potential_saving: monthly_cost * 0.1,
            });
        }
    }

    OptimizationResult {
        recommendations,
        total_potential_savings: round_to(potential_savings, 2),
        optimization_score: optimization_score(avg),
    }
}

/// 0-100 rating of how well the instance size matches its CPU load.
pub fn optimization_score(avg_cpu: f64) -> u8 {
    if avg_cpu < 10.0 {
        20
    } else if avg_cpu < 25.0 {
        50
    } else if avg_cpu < 50.0 {
        75
    } else if avg_cpu < 80.0 {
        90
    } else {
        70
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceOptimization {
    pub instance: Ec2Instance,
    pub cpu: CpuUtilization,
    pub memory: MemoryUtilization,
    pub hourly_rate: f64,
    pub monthly_cost: f64,
    pub optimization: OptimizationResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ec2OptimizationReport {
    pub region: String,
    pub total_instances: usize,
    pub total_monthly_cost: f64,
    pub total_potential_savings: f64,
    pub savings_percentage: f64,
    pub instances: Vec<InstanceOptimization>,
    pub generated_at: DateTime<Utc>,
}

/// Utilization figures gathered for one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceUtilization {
    pub instance: Ec2Instance,
    pub cpu: CpuUtilization,
    pub memory: MemoryUtilization,
}

pub fn build_ec2_report(
    region: &str,
    utilizations: Vec<InstanceUtilization>,
    generated_at: DateTime<Utc>,
) -> Ec2OptimizationReport {
    let instances: Vec<InstanceOptimization> = utilizations
        .into_iter()
        .filter(|u| u.instance.state != InstanceState::Terminated)
        .map(|u| {
            // unknown types are priced at zero here, unlike the account-level estimate
            let hourly_rate = pricing::ec2_hourly_rate(&u.instance.instance_type).unwrap_or(0.0);
            let monthly_cost =
                pricing::ec2_monthly_cost(&u.instance.instance_type).unwrap_or(0.0);
            let optimization = analyze_instance(&u.instance.instance_type, &u.cpu, monthly_cost);
            InstanceOptimization {
                instance: u.instance,
                cpu: u.cpu,
                memory: u.memory,
                hourly_rate,
                monthly_cost,
                optimization,
            }
        })
        .collect();

    let total_monthly_cost: f64 = instances.iter().map(|i| i.monthly_cost).sum();
    let total_potential_savings: f64 = instances
        .iter()
        .map(|i| i.optimization.total_potential_savings)
        .sum();
    let savings_percentage = if total_monthly_cost > 0.0 {
        total_potential_savings / total_monthly_cost * 100.0
    } else {
        0.0
    };

    Ec2OptimizationReport {
        region: region.to_string(),
        total_instances: instances.len(),
        total_monthly_cost: round_to(total_monthly_cost, 2),
        total_potential_savings: round_to(total_potential_savings, 2),
        savings_percentage: round_to(savings_percentage, 1),
        instances,
        generated_at,
    }
}
