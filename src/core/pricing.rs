//! Static on-demand pricing tables (USD, ap-south-1 Linux list prices).

pub const HOURS_PER_MONTH: f64 = 720.0;
pub const HOURS_PER_DAY: f64 = 24.0;

/// Hourly rate used for instance types missing from [`EC2_HOURLY_RATES`].
pub const DEFAULT_EC2_HOURLY_RATE: f64 = 0.05;

pub const EC2_HOURLY_RATES: &[(&str, f64)] = &[
    ("t2.nano", 0.0058),
    ("t2.micro", 0.0116),
    ("t2.small", 0.0232),
    ("t2.medium", 0.0464),
    ("t2.large", 0.0928),
    ("t2.xlarge", 0.1856),
    ("t2.2xlarge", 0.3712),
    ("t3.nano", 0.0052),
    ("t3.micro", 0.0104),
    ("t3.small", 0.0208),
    ("t3.medium", 0.0416),
    ("t3.large", 0.0832),
    ("t3.xlarge", 0.1664),
    ("t3.2xlarge", 0.3328),
    ("m5.large", 0.096),
    ("m5.xlarge", 0.192),
    ("m5.2xlarge", 0.384),
    ("m5.4xlarge", 0.768),
    ("c5.large", 0.085),
    ("c5.xlarge", 0.17),
    ("c5.2xlarge", 0.34),
    ("c5.4xlarge", 0.68),
    ("r5.large", 0.126),
    ("r5.xlarge", 0.252),
    ("r5.2xlarge", 0.504),
];

pub struct LambdaPricing {
    pub requests_per_million: f64,
    pub gb_second_rate: f64,
    pub free_tier_requests: f64,
    pub free_tier_gb_seconds: f64,
}

pub const LAMBDA_PRICING: LambdaPricing = LambdaPricing {
    requests_per_million: 0.20,
    gb_second_rate: 0.0000166667,
    free_tier_requests: 1_000_000.0,
    free_tier_gb_seconds: 400_000.0,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    EbsGp3,
    EbsGp2,
    S3Standard,
    S3InfrequentAccess,
}

impl StorageClass {
    /// Price per GB-month.
    pub fn monthly_rate(&self) -> f64 {
        match self {
            StorageClass::EbsGp3 => 0.08,
            StorageClass::EbsGp2 => 0.10,
            StorageClass::S3Standard => 0.023,
            StorageClass::S3InfrequentAccess => 0.0125,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StorageClass::EbsGp3 => "EBS gp3",
            StorageClass::EbsGp2 => "EBS gp2",
            StorageClass::S3Standard => "S3 Standard",
            StorageClass::S3InfrequentAccess => "S3 Standard-IA",
        }
    }
}

/// Exact table lookup.
pub fn ec2_hourly_rate(instance_type: &str) -> Option<f64> {
    EC2_HOURLY_RATES
        .iter()
        .find(|(name, _)| *name == instance_type)
        .map(|(_, rate)| *rate)
}

/// Table lookup falling back to [`DEFAULT_EC2_HOURLY_RATE`].
pub fn ec2_hourly_rate_or_default(instance_type: &str) -> f64 {
    ec2_hourly_rate(instance_type).unwrap_or(DEFAULT_EC2_HOURLY_RATE)
}

pub fn ec2_monthly_cost(instance_type: &str) -> Option<f64> {
    ec2_hourly_rate(instance_type).map(|rate| rate * HOURS_PER_MONTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_returns_tabulated_constant() {
        assert_eq!(ec2_hourly_rate("t3.medium"), Some(0.0416));
        assert_eq!(ec2_hourly_rate("m5.4xlarge"), Some(0.768));
        assert_eq!(ec2_hourly_rate("r5.2xlarge"), Some(0.504));
        assert_eq!(ec2_hourly_rate("x1e.32xlarge"), None);
    }

    #[test]
    fn test_unknown_type_uses_default_rate() {
        assert_eq!(ec2_hourly_rate_or_default("x1e.32xlarge"), 0.05);
        assert_eq!(ec2_hourly_rate_or_default("t2.micro"), 0.0116);
    }

    #[test]
    fn test_monthly_cost_uses_720_hours() {
        let monthly = ec2_monthly_cost("t3.large").unwrap();
        assert!((monthly - 59.904).abs() < 1e-9);
        assert_eq!(ec2_monthly_cost("unknown"), None);
    }

    #[test]
    fn test_storage_rates() {
        assert_eq!(StorageClass::EbsGp3.monthly_rate(), 0.08);
        assert_eq!(StorageClass::S3InfrequentAccess.monthly_rate(), 0.0125);
    }

    #[test]
    fn test_table_has_unique_types() {
        let mut names: Vec<&str> = EC2_HOURLY_RATES.iter().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EC2_HOURLY_RATES.len());
    }
}
