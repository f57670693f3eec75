//! JSON-over-HTTP clients for external model services.
//!
//! The engine endpoint receives the flattened knowledge base with each query,
//! so the remote side can stay stateless. Emotion detection stays local.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use helpdesk_core::types::{AiTurn, Emotion};

use crate::emotion::LexiconEmotionDetector;
use crate::error::EngineError;
use crate::knowledge::{Document, KnowledgeBase};
use crate::transcript::{SessionStats, Transcript};
use crate::{Generation, RetrievalEngine, Summarizer};

const SUMMARY_INSTRUCTION: &str = "Summarize the following chat session between a user and an AI \
agent in a paragraph. Describe the user's tone, emotional state, the AI's responses, and the \
overall flow of the conversation.";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    query: &'a str,
    documents: &'a [Document],
    history: &'a [AiTurn],
    k: usize,
}

#[derive(Serialize)]
struct SummarizeRequest<'a> {
    prompt: String,
    chat_id: &'a str,
    stats: &'a SessionStats,
}

#[derive(Deserialize)]
struct SummarizeResponse {
    summary: String,
}

async fn post_json<Req, Resp>(client: &Client, endpoint: &str, body: &Req) -> Result<Resp, EngineError>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let response = client.post(endpoint).json(body).send().await?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(EngineError::Status { status, body });
    }
    Ok(response.json::<Resp>().await?)
}

/// Retrieval engine served by an external HTTP endpoint.
pub struct HttpEngine {
    client: Client,
    endpoint: String,
    emotions: LexiconEmotionDetector,
}

impl HttpEngine {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            emotions: LexiconEmotionDetector::new(),
        }
    }
}

#[async_trait]
impl RetrievalEngine for HttpEngine {
    async fn generate(
        &self,
        knowledge: &KnowledgeBase,
        query: &str,
        prior_turns: &[AiTurn],
        k: usize,
    ) -> Result<Generation, EngineError> {
        debug!(endpoint = %self.endpoint, documents = knowledge.len(), "Requesting generation");
        let request = GenerateRequest {
            query,
            documents: knowledge.documents(),
            history: prior_turns,
            k,
        };
        let mut generation: Generation = post_json(&self.client, &self.endpoint, &request).await?;
        if !generation.confidence.is_finite() {
            return Err(EngineError::Decode("confidence is not a number".into()));
        }
        generation.confidence = generation.confidence.clamp(0.0, 1.0);
        Ok(generation)
    }

    async fn detect_emotion(&self, text: &str) -> Result<Option<Emotion>, EngineError> {
        Ok(Some(self.emotions.detect(text)))
    }
}

/// Summarizer served by an external HTTP endpoint.
pub struct HttpSummarizer {
    client: Client,
    endpoint: String,
}

impl HttpSummarizer {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

/// Full prompt sent to the summarization model.
pub fn summary_prompt(transcript: &Transcript) -> String {
    format!(
        "{}\n\nChat History:\n{}\nSummary:",
        SUMMARY_INSTRUCTION,
        transcript.render()
    )
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, transcript: &Transcript) -> Result<String, EngineError> {
        debug!(endpoint = %self.endpoint, chat_id = %transcript.chat_id, "Requesting summary");
        let request = SummarizeRequest {
            prompt: summary_prompt(transcript),
            chat_id: &transcript.chat_id,
            stats: &transcript.stats,
        };
        let response: SummarizeResponse = post_json(&self.client, &self.endpoint, &request).await?;
        let summary = response.summary.trim();
        if summary.is_empty() {
            return Err(EngineError::Decode("empty summary".into()));
        }
        Ok(summary.to_string())
    }
}
