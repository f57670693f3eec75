//! Helpdesk engine crate - answer generation and handoff summaries.
//!
//! The session layer only talks to [`RetrievalEngine`] and [`Summarizer`].
//! Two families of implementations ship here: in-process lexical retrieval
//! with an extractive summarizer, and thin JSON-over-HTTP clients for
//! external model services. [`build_engine`] and [`build_summarizer`] pick
//! one from configuration.

pub mod emotion;
pub mod error;
pub mod http;
pub mod knowledge;
pub mod lexical;
pub mod summarizer;
pub mod transcript;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use helpdesk_core::config::{Backend, EngineConfig, SummarizerConfig};
use helpdesk_core::types::{AiTurn, Emotion};

pub use emotion::LexiconEmotionDetector;
pub use error::EngineError;
pub use http::{HttpEngine, HttpSummarizer};
pub use knowledge::{Document, KnowledgeBase};
pub use lexical::LexicalEngine;
pub use summarizer::ExtractiveSummarizer;
pub use transcript::{SessionStats, Transcript};

/// One generated answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub response: String,
    /// Retrieval confidence in `[0, 1]`.
    pub confidence: f64,
    /// The retrieved passages the answer was grounded on.
    #[serde(default)]
    pub context: Option<String>,
}

/// Produces grounded answers from a company knowledge base.
#[async_trait]
pub trait RetrievalEngine: Send + Sync {
    async fn generate(
        &self,
        knowledge: &KnowledgeBase,
        query: &str,
        prior_turns: &[AiTurn],
        k: usize,
    ) -> Result<Generation, EngineError>;

    /// Classify the tone of a client message. Engines without a classifier
    /// return `None`.
    async fn detect_emotion(&self, _text: &str) -> Result<Option<Emotion>, EngineError> {
        Ok(None)
    }
}

/// Condenses a finished AI session into one paragraph.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, transcript: &Transcript) -> Result<String, EngineError>;
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, EngineError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| EngineError::Request(e.to_string()))
}

/// Construct the retrieval engine named by `config.backend`.
pub fn build_engine(config: &EngineConfig) -> Result<Arc<dyn RetrievalEngine>, EngineError> {
    match config.backend {
        Backend::Local => {
            info!("Using local lexical retrieval engine");
            Ok(Arc::new(LexicalEngine::new()))
        }
        Backend::Http => {
            let endpoint = config
                .endpoint
                .clone()
                .ok_or_else(|| EngineError::Config("engine.endpoint is not set".into()))?;
            info!(endpoint = %endpoint, "Using HTTP retrieval engine");
            Ok(Arc::new(HttpEngine::new(http_client(config.timeout())?, endpoint)))
        }
    }
}

/// Construct the summarizer named by `config.backend`.
pub fn build_summarizer(config: &SummarizerConfig) -> Result<Arc<dyn Summarizer>, EngineError> {
    match config.backend {
        Backend::Local => {
            info!("Using extractive handoff summarizer");
            Ok(Arc::new(ExtractiveSummarizer::default()))
        }
        Backend::Http => {
            let endpoint = config
                .endpoint
                .clone()
                .ok_or_else(|| EngineError::Config("summarizer.endpoint is not set".into()))?;
            info!(endpoint = %endpoint, "Using HTTP summarizer");
            Ok(Arc::new(HttpSummarizer::new(
                http_client(config.timeout())?,
                endpoint,
            )))
        }
    }
}
