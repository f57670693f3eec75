//! Keyword-lexicon emotion classification.
//!
//! Labels follow the seven-way scheme common to English emotion classifiers:
//! anger, disgust, fear, joy, neutral, sadness, surprise.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use helpdesk_core::types::Emotion;

const LEXICON: &[(&str, &[&str])] = &[
    (
        "anger",
        &[
            "angry", "furious", "outraged", "annoyed", "ridiculous", "unacceptable", "mad",
            "terrible", "worst", "useless", "hate", "awful",
        ],
    ),
    ("disgust", &["disgusting", "gross", "disgusted", "sick", "nasty", "revolting"]),
    (
        "fear",
        &[
            "worried", "afraid", "scared", "anxious", "nervous", "concerned", "panic", "fear",
            "lost", "stolen",
        ],
    ),
    (
        "joy",
        &[
            "thanks", "thank", "great", "awesome", "happy", "perfect", "love", "excellent",
            "wonderful", "glad", "appreciate",
        ],
    ),
    (
        "sadness",
        &[
            "sad", "disappointed", "unhappy", "upset", "sorry", "unfortunately", "miss", "broken",
            "damaged",
        ],
    ),
    ("surprise", &["surprised", "unexpected", "wow", "suddenly", "shocked", "strange"]),
];

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z']+").unwrap());

/// Classifies text by counting lexicon hits per label.
pub struct LexiconEmotionDetector {
    index: HashMap<&'static str, &'static str>,
}

impl LexiconEmotionDetector {
    pub fn new() -> Self {
        let mut index = HashMap::new();
        for (label, words) in LEXICON {
            for word in words.iter() {
                index.insert(*word, *label);
            }
        }
        Self { index }
    }

    /// Top label with a score in `[0, 1]`. Text without any cue is neutral.
    pub fn detect(&self, text: &str) -> Emotion {
        let lowered = text.to_lowercase();
        let mut counts: Vec<(&str, usize)> = Vec::new();
        let mut hits = 0usize;

        for m in WORD_RE.find_iter(&lowered) {
            if let Some(label) = self.index.get(m.as_str()) {
                hits += 1;
                match counts.iter_mut().find(|(l, _)| l == label) {
                    Some((_, c)) => *c += 1,
                    None => counts.push((label, 1)),
                }
            }
        }

        // Exclamation marks sharpen an existing cue without creating one.
        let emphasis = lowered.matches('!').count().min(3) as f64 * 0.05;

        let mut best: Option<(&str, usize)> = None;
        for (label, count) in counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((label, count));
            }
        }

        match best {
            Some((label, count)) => {
                let share = count as f64 / hits as f64;
                let score = (0.5 + 0.4 * share + emphasis).min(1.0);
                Emotion::new(label, score)
            }
            None => Emotion::new("neutral", 0.9),
        }
    }
}

impl Default for LexiconEmotionDetector {
    fn default() -> Self {
        Self::new()
    }
}
