//! Error types for the Update Manager Provider

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdateManagerError {
    #[error("NATS connection error: {0}")]
    NatsConnection(String),

    #[error("NATS subscription error: {0}")]
    NatsSubscribe(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Update engine is not running")]
    EngineStopped,

    #[error("Update service error: {0}")]
    Service(#[from] ServiceError),
}

/// Failures reported by the external update-checking service
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("update service unavailable: {0}")]
    Unavailable(String),

    #[error("update service did not answer within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("{0}")]
    Rejected(String),

    #[error("unknown plugin: {0}")]
    UnknownEntity(String),

    #[error("invalid update service reply: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_the_limit() {
        let err = UpdateManagerError::from(ServiceError::Timeout { timeout_ms: 5000 });
        assert_eq!(
            err.to_string(),
            "Update service error: update service did not answer within 5000ms"
        );
    }

    #[test]
    fn test_rejection_message_is_passed_through() {
        let err = UpdateManagerError::from(ServiceError::Rejected("rate limited".to_string()));
        assert_eq!(err.to_string(), "Update service error: rate limited");
    }
}
