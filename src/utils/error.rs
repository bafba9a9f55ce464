use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("AWS {service} {operation} failed: {message}")]
    AwsError {
        service: String,
        operation: String,
        message: String,
    },

    #[error("Access denied calling AWS {service}: {message}")]
    AccessDenied { service: String, message: String },

    #[error("AWS credentials unavailable: {message}")]
    CredentialsError { message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    PatternError(#[from] regex::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Aws,
    Configuration,
    Processing,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AnalyzerError {
    /// Classifies a raw SDK error message into the matching variant.
    pub fn from_aws(service: &str, operation: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();

        if lowered.contains("accessdenied")
            || lowered.contains("access denied")
            || lowered.contains("unauthorizedoperation")
            || lowered.contains("not authorized")
        {
            AnalyzerError::AccessDenied {
                service: service.to_string(),
                message,
            }
        } else if lowered.contains("credential") || lowered.contains("no credentials") {
            AnalyzerError::CredentialsError { message }
        } else {
            AnalyzerError::AwsError {
                service: service.to_string(),
                operation: operation.to_string(),
                message,
            }
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AnalyzerError::AwsError { .. }
            | AnalyzerError::AccessDenied { .. }
            | AnalyzerError::CredentialsError { .. } => ErrorCategory::Aws,
            AnalyzerError::ConfigError { .. }
            | AnalyzerError::MissingConfigError { .. }
            | AnalyzerError::InvalidConfigValueError { .. }
            | AnalyzerError::ConfigValidationError { .. }
            | AnalyzerError::PatternError(_)
            | AnalyzerError::TomlError(_) => ErrorCategory::Configuration,
            AnalyzerError::CsvError(_)
            | AnalyzerError::SerializationError(_)
            | AnalyzerError::ProcessingError { .. } => ErrorCategory::Processing,
            AnalyzerError::IoError(_) | AnalyzerError::StorageError { .. } => {
                ErrorCategory::Storage
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            AnalyzerError::AwsError { .. } => ErrorSeverity::Medium,
            AnalyzerError::AccessDenied { .. } | AnalyzerError::CredentialsError { .. } => {
                ErrorSeverity::High
            }
            AnalyzerError::ProcessingError { .. }
            | AnalyzerError::CsvError(_)
            | AnalyzerError::SerializationError(_) => ErrorSeverity::High,
            AnalyzerError::ConfigError { .. }
            | AnalyzerError::MissingConfigError { .. }
            | AnalyzerError::InvalidConfigValueError { .. }
            | AnalyzerError::ConfigValidationError { .. }
            | AnalyzerError::PatternError(_)
            | AnalyzerError::TomlError(_) => ErrorSeverity::High,
            AnalyzerError::IoError(_) | AnalyzerError::StorageError { .. } => {
                ErrorSeverity::Critical
            }
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            AnalyzerError::AwsError { .. } => {
                "Check network connectivity and the selected region, then run again"
            }
            AnalyzerError::AccessDenied { .. } => {
                "Grant the IAM principal read access to CloudWatch, CloudWatch Logs, EC2 and Lambda"
            }
            AnalyzerError::CredentialsError { .. } => {
                "Configure credentials with `aws configure` or set AWS_PROFILE, or run with --demo"
            }
            AnalyzerError::PatternError(_) => "Fix the regular expression in the [logs] section",
            AnalyzerError::TomlError(_) => "Check the configuration file for TOML syntax errors",
            AnalyzerError::ConfigError { .. }
            | AnalyzerError::MissingConfigError { .. }
            | AnalyzerError::InvalidConfigValueError { .. }
            | AnalyzerError::ConfigValidationError { .. } => {
                "Review the configuration file and command line flags"
            }
            AnalyzerError::CsvError(_)
            | AnalyzerError::SerializationError(_)
            | AnalyzerError::ProcessingError { .. } => {
                "Run with --verbose to see which resource produced unexpected data"
            }
            AnalyzerError::IoError(_) | AnalyzerError::StorageError { .. } => {
                "Check that the output location exists and is writable"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            AnalyzerError::AwsError { service, .. } => {
                format!("Could not fetch data from AWS {}", service)
            }
            AnalyzerError::AccessDenied { service, .. } => {
                format!("Access to AWS {} was denied", service)
            }
            AnalyzerError::CredentialsError { .. } => "No usable AWS credentials found".to_string(),
            AnalyzerError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting {}: {}", field, reason)
            }
            AnalyzerError::MissingConfigError { field } => {
                format!("Missing required setting {}", field)
            }
            AnalyzerError::IoError(e) => format!("File operation failed: {}", e),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
