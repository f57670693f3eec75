use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HelpdeskError, Result};

/// Top-level configuration for the helpdesk service.
///
/// Loaded from `~/.helpdesk/config.toml` by default. Every section falls back
/// to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HelpdeskConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

impl HelpdeskConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HelpdeskConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the services cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.engine.top_k == 0 {
            return Err(HelpdeskError::Config("engine.top_k must be at least 1".into()));
        }
        if self.engine.timeout_secs == 0 {
            return Err(HelpdeskError::Config(
                "engine.timeout_secs must be at least 1".into(),
            ));
        }
        if self.summarizer.timeout_secs == 0 {
            return Err(HelpdeskError::Config(
                "summarizer.timeout_secs must be at least 1".into(),
            ));
        }
        if self.engine.backend == Backend::Http && self.engine.endpoint.is_none() {
            return Err(HelpdeskError::Config(
                "engine.endpoint is required for the http backend".into(),
            ));
        }
        if self.summarizer.backend == Backend::Http && self.summarizer.endpoint.is_none() {
            return Err(HelpdeskError::Config(
                "summarizer.endpoint is required for the http backend".into(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.helpdesk/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file name inside `general.data_dir`.
    pub db_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_file: "helpdesk.db".to_string(),
        }
    }
}

/// Where engine and summarizer calls are served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// In-process lexical retrieval / extractive summaries.
    Local,
    /// JSON over HTTP to an external service.
    Http,
}

/// Retrieval-generation engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backend: Backend,
    pub endpoint: Option<String>,
    /// Number of knowledge-base documents retrieved per query.
    pub top_k: usize,
    /// Deadline for a single generation call.
    pub timeout_secs: u64,
    /// Text returned to the client when generation fails.
    pub fallback_response: String,
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            endpoint: None,
            top_k: 3,
            timeout_secs: 30,
            fallback_response: "I'm having trouble answering right now. Would you like to raise a ticket or talk to a support agent?".to_string(),
        }
    }
}

/// Handoff summarizer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub backend: Backend,
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    /// Prefix of the summary stored when the summarizer fails.
    pub fallback_summary: String,
}

impl SummarizerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Local,
            endpoint: None,
            timeout_secs: 20,
            fallback_summary: "Automatic summary unavailable.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = HelpdeskConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.top_k, 3);
        assert_eq!(config.engine.backend, Backend::Local);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml_str = r#"
            [engine]
            top_k = 5

            [server]
            port = 9000
        "#;
        let config: HelpdeskConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.top_k, 5);
        assert_eq!(config.engine.timeout_secs, 30);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.storage.db_file, "helpdesk.db");
    }

    #[test]
    fn test_http_backend_requires_endpoint() {
        let mut config = HelpdeskConfig::default();
        config.summarizer.backend = Backend::Http;
        assert!(matches!(config.validate(), Err(HelpdeskError::Config(_))));
        config.summarizer.endpoint = Some("http://localhost:9100/summarize".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let mut config = HelpdeskConfig::default();
        config.engine.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = HelpdeskConfig::default();
        config.engine.top_k = 7;
        config.general.log_level = "debug".to_string();
        config.save(&path).unwrap();

        let loaded = HelpdeskConfig::load(&path).unwrap();
        assert_eq!(loaded.engine.top_k, 7);
        assert_eq!(loaded.general.log_level, "debug");
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = HelpdeskConfig::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(config.engine.top_k, 3);
    }

    #[test]
    fn test_timeouts_as_durations() {
        let config = HelpdeskConfig::default();
        assert_eq!(config.engine.timeout(), Duration::from_secs(30));
        assert_eq!(config.summarizer.timeout(), Duration::from_secs(20));
    }
}
