//! Error types for Switchyard

use hyper::StatusCode;

/// Main error type for Switchyard operations
#[derive(Debug, thiserror::Error)]
pub enum SwitchyardError {
    /// The requested base path is already owned by another service.
    #[error("Base path {base_path} is already owned by service {owner}")]
    BasePathConflict {
        request_id: String,
        base_path: String,
        owner: String,
    },

    /// One or more requested load-balancer groups are unknown.
    #[error("Unknown load balancer group(s): {}", .0.join(", "))]
    MissingLoadBalancerGroups(Vec<String>),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SwitchyardError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BasePathConflict { .. } => StatusCode::CONFLICT,
            Self::MissingLoadBalancerGroups(_) => StatusCode::BAD_REQUEST,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = self.to_string();
        (status, body)
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for SwitchyardError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for SwitchyardError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for SwitchyardError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for SwitchyardError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type alias for Switchyard operations
pub type Result<T> = std::result::Result<T, SwitchyardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_error_names_the_owner() {
        let err = SwitchyardError::BasePathConflict {
            request_id: "req-1".to_string(),
            base_path: "/svc-a".to_string(),
            owner: "service-a".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        let display = err.to_string();
        assert!(display.contains("/svc-a"));
        assert!(display.contains("service-a"));
    }

    #[test]
    fn missing_groups_error_lists_names() {
        let err = SwitchyardError::MissingLoadBalancerGroups(vec![
            "nonexistent".to_string(),
            "also-missing".to_string(),
        ]);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("nonexistent, also-missing"));
    }
}
