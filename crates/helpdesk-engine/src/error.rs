use helpdesk_core::error::HelpdeskError;

/// Errors from answer generation and summarization backends.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed upstream response: {0}")]
    Decode(String),
    #[error("engine configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            EngineError::Decode(err.to_string())
        } else {
            EngineError::Request(err.to_string())
        }
    }
}

impl From<EngineError> for HelpdeskError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Config(msg) => HelpdeskError::Config(msg),
            other => HelpdeskError::Upstream(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::Request("connection refused".to_string());
        assert_eq!(err.to_string(), "request failed: connection refused");

        let err = EngineError::Status {
            status: 503,
            body: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "upstream returned 503: overloaded");

        let err = EngineError::Decode("missing field `summary`".to_string());
        assert_eq!(err.to_string(), "malformed upstream response: missing field `summary`");
    }

    #[test]
    fn test_engine_error_is_upstream() {
        let err: HelpdeskError = EngineError::Request("timeout".into()).into();
        assert!(matches!(err, HelpdeskError::Upstream(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_config_error_stays_config() {
        let err: HelpdeskError = EngineError::Config("no endpoint".into()).into();
        assert!(matches!(err, HelpdeskError::Config(_)));
    }
}
