use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("{provider} returned an unexpected response: {message}")]
    ProviderError { provider: String, message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value for {field}: {value} ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

pub type Result<T> = std::result::Result<T, GeocodeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Config,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl GeocodeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiError(_) | Self::ProviderError { .. } => ErrorCategory::Network,
            Self::CsvError(_) | Self::SerializationError(_) | Self::ProcessingError { .. } => {
                ErrorCategory::Data
            }
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Config,
            Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ApiError(_) | Self::ProviderError { .. } => ErrorSeverity::Medium,
            Self::CsvError(_) | Self::SerializationError(_) | Self::ProcessingError { .. } => {
                ErrorSeverity::High
            }
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorSeverity::High,
            Self::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// Whether retrying the same request may succeed (timeouts, dropped connections).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ApiError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::ApiError(_) => {
                "Check network connectivity and provider availability, then re-run; \
                 cached results will be reused"
                    .to_string()
            }
            Self::ProviderError { provider, .. } => format!(
                "The {} service rejected the request; verify endpoint and API key settings",
                provider
            ),
            Self::CsvError(_) => "Verify the input file is valid CSV with a header row".to_string(),
            Self::IoError(_) => "Check file paths and directory permissions".to_string(),
            Self::SerializationError(_) => {
                "The cache file may be corrupt; delete it to rebuild from scratch".to_string()
            }
            Self::ConfigValidationError { field, .. }
            | Self::InvalidConfigValueError { field, .. }
            | Self::MissingConfigError { field } => {
                format!("Fix the '{}' setting and try again", field)
            }
            Self::ProcessingError { .. } => {
                "Inspect the input data for the reported problem".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ApiError(_) => "A geocoding request failed".to_string(),
            Self::ProviderError { provider, message } => {
                format!("{} error: {}", provider, message)
            }
            Self::CsvError(_) => "The address CSV could not be processed".to_string(),
            Self::IoError(_) => "A file could not be read or written".to_string(),
            Self::SerializationError(_) => "The geocode cache could not be parsed".to_string(),
            Self::ConfigValidationError { field, message } => {
                format!("Configuration problem ({}): {}", field, message)
            }
            Self::InvalidConfigValueError {
                field,
                value,
                reason,
            } => {
                format!("Invalid {} '{}': {}", field, value, reason)
            }
            Self::MissingConfigError { field } => {
                format!("Missing required setting: {}", field)
            }
            Self::ProcessingError { message } => message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_high_severity() {
        let err = GeocodeError::MissingConfigError {
            field: "input".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(!err.is_transient());
    }

    #[test]
    fn test_provider_error_messages_name_the_provider() {
        let err = GeocodeError::ProviderError {
            provider: "nominatim".to_string(),
            message: "HTTP 503".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Network);
        assert!(err.user_friendly_message().contains("nominatim"));
        assert!(err.recovery_suggestion().contains("nominatim"));
    }

    #[test]
    fn test_processing_error_is_data_category() {
        let err = GeocodeError::ProcessingError {
            message: "missing address column".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Data);
        assert_eq!(err.severity(), ErrorSeverity::High);
    }
}
