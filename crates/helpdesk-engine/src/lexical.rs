//! In-process retrieval by term overlap.
//!
//! Scores each knowledge-base document by the share of query terms it
//! contains. Short follow-up questions ("and for express?") borrow terms from
//! the previous client message so they still land on the right documents.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use helpdesk_core::types::{AiTurn, Emotion};

use crate::emotion::LexiconEmotionDetector;
use crate::error::EngineError;
use crate::knowledge::{Document, KnowledgeBase};
use crate::{Generation, RetrievalEngine};

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z0-9]+").unwrap());

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "can", "do", "does", "for", "from", "how", "i",
    "in", "is", "it", "me", "my", "of", "on", "or", "the", "to", "what", "when", "where", "which",
    "who", "why", "will", "with", "you", "your",
];

/// Queries with fewer content terms than this pull in the previous message.
const FOLLOW_UP_TERMS: usize = 3;

const NO_MATCH_RESPONSE: &str = "I couldn't find anything about that in our knowledge base. \
Would you like to raise a ticket or talk to a support agent?";

pub(crate) fn tokenize(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|t| !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

pub struct LexicalEngine {
    emotions: LexiconEmotionDetector,
}

impl LexicalEngine {
    pub fn new() -> Self {
        Self {
            emotions: LexiconEmotionDetector::new(),
        }
    }

    /// Top `k` documents with a non-zero score, best first. Equal scores keep
    /// knowledge-base order.
    fn rank<'a>(
        &self,
        knowledge: &'a KnowledgeBase,
        terms: &HashSet<String>,
        k: usize,
    ) -> Vec<(f64, &'a Document)> {
        if terms.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<(f64, &Document)> = knowledge
            .documents()
            .iter()
            .filter_map(|doc| {
                let doc_terms = tokenize(&doc.text);
                let overlap = terms.iter().filter(|t| doc_terms.contains(*t)).count();
                (overlap > 0).then(|| (overlap as f64 / terms.len() as f64, doc))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

impl Default for LexicalEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RetrievalEngine for LexicalEngine {
    async fn generate(
        &self,
        knowledge: &KnowledgeBase,
        query: &str,
        prior_turns: &[AiTurn],
        k: usize,
    ) -> Result<Generation, EngineError> {
        let mut terms = tokenize(query);
        if terms.len() < FOLLOW_UP_TERMS {
            if let Some(previous) = prior_turns.last() {
                terms.extend(tokenize(&previous.input));
            }
        }

        let hits = self.rank(knowledge, &terms, k.max(1));
        debug!(terms = terms.len(), hits = hits.len(), "Lexical retrieval complete");

        if hits.is_empty() {
            return Ok(Generation {
                response: NO_MATCH_RESPONSE.to_string(),
                confidence: 0.0,
                context: None,
            });
        }

        let mut context = String::from("Relevant Information:\n\n");
        let mut response = String::from("Here is what I found:");
        for (score, doc) in &hits {
            context.push_str(&format!("[From {} - Confidence: {:.2}]\n{}\n\n", doc.path, score, doc.text));
            response.push_str(&format!("\n- {}", doc.text));
        }
        let confidence = hits.iter().map(|(s, _)| s).sum::<f64>() / hits.len() as f64;

        Ok(Generation {
            response,
            confidence,
            context: Some(context),
        })
    }

    async fn detect_emotion(&self, text: &str) -> Result<Option<Emotion>, EngineError> {
        Ok(Some(self.emotions.detect(text)))
    }
}
