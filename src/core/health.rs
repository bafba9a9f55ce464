use serde::{Deserialize, Serialize};

const ERROR_KEYWORDS: &[&str] = &["error", "fail", "timeout"];
const UTILIZATION_KEYWORDS: &[&str] = &["cpu", "utilization"];
const LATENCY_KEYWORDS: &[&str] = &["duration", "latency", "response"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Good,
    Warning,
    Critical,
    Neutral,
}

/// Traffic-light classification of a summary figure by its name.
///
/// `None` stands for a non-numeric value.
pub fn classify_metric(name: &str, value: Option<f64>) -> HealthLevel {
    let name = name.to_lowercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| name.contains(k));

    if has_any(ERROR_KEYWORDS) {
        return match value {
            Some(v) if v > 0.0 => HealthLevel::Critical,
            _ => HealthLevel::Good,
        };
    }

    if let Some(v) = value {
        if has_any(UTILIZATION_KEYWORDS) {
            return threshold_level(v, 60.0, 80.0);
        }
        if has_any(LATENCY_KEYWORDS) {
            return threshold_level(v, 1000.0, 5000.0);
        }
    }

    HealthLevel::Neutral
}

fn threshold_level(value: f64, warning: f64, critical: f64) -> HealthLevel {
    if value > critical {
        HealthLevel::Critical
    } else if value > warning {
        HealthLevel::Warning
    } else {
        HealthLevel::Good
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CardValue {
    Count(u64),
    Number(f64),
    Text(String),
}

impl CardValue {
    fn numeric(&self) -> Option<f64> {
        match self {
            CardValue::Count(n) => Some(*n as f64),
            CardValue::Number(v) => Some(*v),
            CardValue::Text(_) => None,
        }
    }

    /// Display form: counts get thousands separators, numbers get fewer
    /// decimals as they grow.
    pub fn display(&self) -> String {
        match self {
            CardValue::Count(n) => group_thousands(*n),
            CardValue::Number(v) if v.abs() < 1.0 => format!("{:.3}", v),
            CardValue::Number(v) if v.abs() < 100.0 => format!("{:.2}", v),
            CardValue::Number(v) => format!("{:.0}", v),
            CardValue::Text(text) => text.clone(),
        }
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricCard {
    pub name: String,
    pub value: CardValue,
    pub display: String,
    pub level: HealthLevel,
}

impl MetricCard {
    pub fn new(name: &str, value: CardValue) -> Self {
        Self {
            name: name.to_string(),
            display: value.display(),
            level: classify_metric(name, value.numeric()),
            value,
        }
    }
}
