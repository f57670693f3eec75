//! Ending an AI session: statistics, summary and the fallback when the
//! summarizer is down.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use helpdesk_engine::{SessionStats, Summarizer, Transcript};

use crate::bot::BotInstance;

/// What a completed handoff produced.
#[derive(Debug, Clone, Serialize)]
pub struct HandoffReport {
    /// `None` when no bot was live, in which case no summary is written.
    pub summary: Option<String>,
    /// True when the stored summary is the fallback text.
    pub fallback: bool,
    pub stats: Option<SessionStats>,
}

impl HandoffReport {
    pub fn without_session() -> Self {
        Self {
            summary: None,
            fallback: false,
            stats: None,
        }
    }
}

/// Freeze a live bot's history into a transcript.
pub fn transcript_of(bot: &BotInstance) -> Transcript {
    let turns = bot.turns();
    let stats = SessionStats::from_turns(&turns, bot.prompt_count(), bot.start_time(), Utc::now());
    Transcript::new(bot.chat_id().as_str(), turns, stats)
}

/// Deterministic summary used whenever the summarizer fails or times out.
pub fn fallback_summary(prefix: &str, stats: &SessionStats) -> String {
    let mut text = format!(
        "{} {} AI turn{}, average confidence {:.2}",
        prefix,
        stats.turn_count,
        if stats.turn_count == 1 { "" } else { "s" },
        stats.average_confidence
    );
    if let Some(tone) = stats.dominant_emotion() {
        text.push_str(&format!(", prevailing emotion {}", tone));
    }
    text.push('.');
    text
}

/// Run the summarizer under a deadline. Never fails: errors, timeouts and
/// blank output all yield the fallback. The flag reports which was used.
pub async fn summarize_with_deadline(
    summarizer: &dyn Summarizer,
    transcript: &Transcript,
    deadline: Duration,
    fallback_prefix: &str,
) -> (String, bool) {
    match tokio::time::timeout(deadline, summarizer.summarize(transcript)).await {
        Ok(Ok(summary)) if !summary.trim().is_empty() => {
            info!(chat_id = %transcript.chat_id, turns = transcript.turns.len(), "Session summarized");
            (summary, false)
        }
        Ok(Ok(_)) => {
            warn!(chat_id = %transcript.chat_id, "Summarizer returned an empty summary, using fallback");
            (fallback_summary(fallback_prefix, &transcript.stats), true)
        }
        Ok(Err(e)) => {
            warn!(chat_id = %transcript.chat_id, error = %e, "Summarizer failed, using fallback");
            (fallback_summary(fallback_prefix, &transcript.stats), true)
        }
        Err(_) => {
            warn!(
                chat_id = %transcript.chat_id,
                deadline_secs = deadline.as_secs_f64(),
                "Summarizer timed out, using fallback"
            );
            (fallback_summary(fallback_prefix, &transcript.stats), true)
        }
    }
}
