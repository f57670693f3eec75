use thiserror::Error;

/// Top-level error type for the helpdesk system.
///
/// The first five variants form the taxonomy callers branch on. Subsystem
/// crates define their own error types and implement
/// `From<SubsystemError> for HelpdeskError` so that `?` works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HelpdeskError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Stale version for chat {chat_id}: expected {expected}, found {found}")]
    StaleVersion {
        chat_id: String,
        expected: u64,
        found: u64,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl HelpdeskError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        HelpdeskError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether a retry of the same call could succeed without caller changes.
    pub fn is_transient(&self) -> bool {
        matches!(self, HelpdeskError::Upstream(_))
    }
}

impl From<toml::de::Error> for HelpdeskError {
    fn from(err: toml::de::Error) -> Self {
        HelpdeskError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for HelpdeskError {
    fn from(err: toml::ser::Error) -> Self {
        HelpdeskError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for HelpdeskError {
    fn from(err: serde_json::Error) -> Self {
        HelpdeskError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for helpdesk operations.
pub type Result<T> = std::result::Result<T, HelpdeskError>;
