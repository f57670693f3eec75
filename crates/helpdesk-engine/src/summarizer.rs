//! Extractive handoff summaries.
//!
//! Builds a short paragraph from the transcript itself: what the client asked
//! about, how they came across, and how well the assistant did. No model call
//! is involved, so this summarizer never fails on a non-empty transcript.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::lexical::tokenize;
use crate::transcript::Transcript;
use crate::Summarizer;

pub struct ExtractiveSummarizer {
    max_topics: usize,
    max_quote_chars: usize,
}

impl ExtractiveSummarizer {
    /// - `max_topics`: number of recurring client terms to name
    /// - `max_quote_chars`: truncation length for quoted client messages
    pub fn new(max_topics: usize, max_quote_chars: usize) -> Self {
        Self {
            max_topics,
            max_quote_chars,
        }
    }

    fn topics(&self, transcript: &Transcript) -> Vec<String> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for turn in &transcript.turns {
            for term in tokenize(&turn.input) {
                if term.len() >= 4 {
                    *counts.entry(term).or_insert(0) += 1;
                }
            }
        }
        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        // Most frequent first, then alphabetical for a stable result.
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
            .into_iter()
            .take(self.max_topics)
            .map(|(term, _)| term)
            .collect()
    }

    fn quote(&self, text: &str) -> String {
        let trimmed = text.trim();
        if trimmed.chars().count() <= self.max_quote_chars {
            trimmed.to_string()
        } else {
            let cut: String = trimmed.chars().take(self.max_quote_chars).collect();
            format!("{}...", cut.trim_end())
        }
    }
}

impl Default for ExtractiveSummarizer {
    fn default() -> Self {
        Self::new(3, 120)
    }
}

#[async_trait]
impl Summarizer for ExtractiveSummarizer {
    async fn summarize(&self, transcript: &Transcript) -> Result<String, EngineError> {
        let stats = &transcript.stats;
        let (first, last) = match (transcript.turns.first(), transcript.turns.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Ok(
                    "The client was handed to a support agent before asking the assistant anything."
                        .to_string(),
                )
            }
        };

        let mut summary = format!(
            "The client exchanged {} message{} with the assistant over {:.0} seconds, opening with \"{}\"",
            stats.turn_count,
            if stats.turn_count == 1 { "" } else { "s" },
            stats.duration_seconds,
            self.quote(&first.input),
        );
        if transcript.turns.len() > 1 {
            summary.push_str(&format!(" and ending with \"{}\"", self.quote(&last.input)));
        }
        summary.push('.');

        let topics = self.topics(transcript);
        if !topics.is_empty() {
            summary.push_str(&format!(" Recurring topics: {}.", topics.join(", ")));
        }
        if let Some(tone) = stats.dominant_emotion() {
            summary.push_str(&format!(" The client's prevailing tone was {}.", tone));
        }
        summary.push_str(&format!(
            " Average answer confidence was {:.2}",
            stats.average_confidence
        ));
        if stats.average_confidence < 0.3 {
            summary.push_str(", so the assistant mostly failed to find relevant answers");
        }
        summary.push('.');

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::SessionStats;
    use chrono::{Duration, Utc};
    use helpdesk_core::types::{AiTurn, Emotion};

    fn transcript(inputs: &[(&str, f64, &str)]) -> Transcript {
        let start = Utc::now();
        let turns: Vec<AiTurn> = inputs
            .iter()
            .map(|(input, confidence, emotion)| AiTurn {
                input: input.to_string(),
                response: "ok".to_string(),
                confidence: *confidence,
                emotion: Some(Emotion::new(*emotion, 0.8)),
                timestamp: start,
            })
            .collect();
        let stats = SessionStats::from_turns(&turns, turns.len() as u64, start, start + Duration::seconds(42));
        Transcript::new("c-1", turns, stats)
    }

    #[tokio::test]
    async fn test_summary_mentions_topics_and_tone() {
        let summarizer = ExtractiveSummarizer::default();
        let summary = summarizer
            .summarize(&transcript(&[
                ("My parcel tracking stopped updating", 0.2, "fear"),
                ("The parcel was due yesterday", 0.1, "anger"),
                ("Why is my parcel late?", 0.2, "anger"),
            ]))
            .await
            .unwrap();
        assert!(summary.contains("3 messages"));
        assert!(summary.contains("42 seconds"));
        assert!(summary.contains("parcel"));
        assert!(summary.contains("prevailing tone was anger"));
        assert!(summary.contains("mostly failed"));
    }

    #[tokio::test]
    async fn test_single_turn_summary() {
        let summarizer = ExtractiveSummarizer::default();
        let summary = summarizer
            .summarize(&transcript(&[("Refund status please", 0.9, "neutral")]))
            .await
            .unwrap();
        assert!(summary.contains("1 message "));
        assert!(!summary.contains("ending with"));
        assert!(summary.contains("0.90"));
    }

    #[tokio::test]
    async fn test_empty_transcript_still_summarizes() {
        let summarizer = ExtractiveSummarizer::default();
        let summary = summarizer.summarize(&transcript(&[])).await.unwrap();
        assert!(!summary.is_empty());
    }

    #[test]
    fn test_long_quotes_are_truncated() {
        let summarizer = ExtractiveSummarizer::new(3, 10);
        assert_eq!(summarizer.quote("short"), "short");
        assert_eq!(summarizer.quote("a much longer client message"), "a much lon...");
    }
}
