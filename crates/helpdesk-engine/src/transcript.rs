//! Finished AI sessions as handed to a [`Summarizer`](crate::Summarizer).

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use helpdesk_core::types::AiTurn;

/// Label used for turns recorded without an emotion.
pub const UNKNOWN_EMOTION: &str = "unknown";

/// Aggregates over one AI session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub turn_count: usize,
    pub prompt_count: u64,
    pub average_confidence: f64,
    pub emotion_distribution: BTreeMap<String, usize>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
}

impl SessionStats {
    pub fn from_turns(
        turns: &[AiTurn],
        prompt_count: u64,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let average_confidence = if turns.is_empty() {
            0.0
        } else {
            turns.iter().map(|t| t.confidence).sum::<f64>() / turns.len() as f64
        };

        let mut emotion_distribution = BTreeMap::new();
        for turn in turns {
            let label = turn
                .emotion
                .as_ref()
                .map(|e| e.label.clone())
                .unwrap_or_else(|| UNKNOWN_EMOTION.to_string());
            *emotion_distribution.entry(label).or_insert(0) += 1;
        }

        let duration_seconds = (end_time - start_time).num_milliseconds().max(0) as f64 / 1000.0;

        Self {
            turn_count: turns.len(),
            prompt_count,
            average_confidence,
            emotion_distribution,
            start_time,
            end_time,
            duration_seconds,
        }
    }

    /// Most frequent emotion label, ties to the alphabetically first.
    pub fn dominant_emotion(&self) -> Option<&str> {
        let mut best: Option<(&str, usize)> = None;
        for (label, count) in &self.emotion_distribution {
            if best.map_or(true, |(_, c)| *count > c) {
                best = Some((label.as_str(), *count));
            }
        }
        best.map(|(label, _)| label)
    }
}

/// Ordered turns plus their statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub chat_id: String,
    pub turns: Vec<AiTurn>,
    pub stats: SessionStats,
}

impl Transcript {
    pub fn new(chat_id: impl Into<String>, turns: Vec<AiTurn>, stats: SessionStats) -> Self {
        Self {
            chat_id: chat_id.into(),
            turns,
            stats,
        }
    }

    /// Plain-text rendering used in summarization prompts.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            let emotion = turn
                .emotion
                .as_ref()
                .map(|e| e.label.as_str())
                .unwrap_or(UNKNOWN_EMOTION);
            let _ = write!(
                out,
                "User: {}\nBot: {}\nEmotion: {}, Confidence: {:.2}\n\n",
                turn.input,
                turn.response.trim(),
                emotion,
                turn.confidence
            );
        }
        out
    }
}
