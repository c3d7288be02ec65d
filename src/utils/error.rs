use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("{service} responded with status {status}: {body}")]
    ApiError {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Record {record_id} does not match the expected schema: {message}")]
    SchemaError { record_id: String, message: String },

    #[error("Record {record_id} not found in {collection}")]
    NotFoundError {
        record_id: String,
        collection: String,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Order {order} cannot move from {from} to {to}")]
    InvalidTransitionError {
        order: String,
        from: String,
        to: String,
    },

    #[error("Only {handled}/{total} {items} were handled. Check logs for more info.")]
    PartialFailureError {
        handled: usize,
        total: usize,
        items: String,
    },

    #[error("No {items} have been handled")]
    NothingHandledError { items: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Data,
    Configuration,
    Processing,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DispatchError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DispatchError::HttpError(_) | DispatchError::ApiError { .. } => ErrorCategory::Network,
            DispatchError::SerializationError(_)
            | DispatchError::SchemaError { .. }
            | DispatchError::NotFoundError { .. } => ErrorCategory::Data,
            DispatchError::UrlError(_)
            | DispatchError::ConfigError { .. }
            | DispatchError::ConfigValidationError { .. }
            | DispatchError::MissingConfigError { .. }
            | DispatchError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            DispatchError::InvalidTransitionError { .. }
            | DispatchError::PartialFailureError { .. }
            | DispatchError::NothingHandledError { .. } => ErrorCategory::Processing,
            DispatchError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 單筆記錄失敗不影響整批
            DispatchError::SchemaError { .. } | DispatchError::NotFoundError { .. } => {
                ErrorSeverity::Low
            }
            DispatchError::HttpError(_)
            | DispatchError::ApiError { .. }
            | DispatchError::SerializationError(_) => ErrorSeverity::Medium,
            DispatchError::InvalidTransitionError { .. }
            | DispatchError::PartialFailureError { .. }
            | DispatchError::NothingHandledError { .. } => ErrorSeverity::High,
            DispatchError::UrlError(_)
            | DispatchError::ConfigError { .. }
            | DispatchError::ConfigValidationError { .. }
            | DispatchError::MissingConfigError { .. }
            | DispatchError::InvalidConfigValueError { .. }
            | DispatchError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => {
                "Check network connectivity and the courier/store credentials, then rerun the job"
            }
            ErrorCategory::Data => {
                "Fix the offending record in the backing store; the other records were processed"
            }
            ErrorCategory::Configuration => {
                "Check the configuration file and the environment variables (.env)"
            }
            ErrorCategory::Processing => "Inspect the per-item log lines above for the cause",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            DispatchError::ApiError {
                service, status, ..
            } => format!("{} rejected the request (HTTP {})", service, status),
            DispatchError::HttpError(e) if e.is_timeout() => {
                "A downstream service did not answer in time".to_string()
            }
            DispatchError::MissingConfigError { field } => {
                format!("Required setting '{}' is missing", field)
            }
            other => other.to_string(),
        }
    }

    /// 讀取 HTTP 回應並在非 2xx 時轉成 `ApiError`，保留回應內容以便記錄
    pub async fn check_response(
        service: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(DispatchError::ApiError {
            service: service.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_message() {
        let err = DispatchError::PartialFailureError {
            handled: 2,
            total: 3,
            items: "order(s)".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "Only 2/3 order(s) were handled. Check logs for more info."
        );
        assert_eq!(err.category(), ErrorCategory::Processing);
        assert_eq!(err.severity(), ErrorSeverity::High);
    }

    #[test]
    fn test_api_error_user_message() {
        let err = DispatchError::ApiError {
            service: "DODO".to_string(),
            status: 404,
            body: "{\"error\":\"order not found\"}".to_string(),
        };

        assert_eq!(err.user_friendly_message(), "DODO rejected the request (HTTP 404)");
        assert!(err.to_string().contains("order not found"));
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = DispatchError::MissingConfigError {
            field: "courier.client_id".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.category(), ErrorCategory::Configuration);
    }
}
