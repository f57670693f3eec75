//! Live conversational state for one AI-mode chat.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use helpdesk_core::types::{AiTurn, ChatId};
use helpdesk_engine::KnowledgeBase;

#[derive(Debug, Default)]
struct Conversation {
    turns: Vec<AiTurn>,
    prompt_count: u64,
}

/// An in-process bot bound to one chat and its company's knowledge base.
///
/// Holds the authoritative in-memory turn list. Callers keep it in lockstep
/// with the persisted `ai_history` by only recording a turn once the durable
/// write has succeeded.
#[derive(Debug)]
pub struct BotInstance {
    chat_id: ChatId,
    knowledge: Arc<KnowledgeBase>,
    conversation: Mutex<Conversation>,
    start_time: DateTime<Utc>,
}

impl BotInstance {
    /// Build an instance, rehydrating any turns persisted by an earlier one.
    pub fn new(chat_id: ChatId, knowledge: Arc<KnowledgeBase>, history: Vec<AiTurn>) -> Self {
        Self {
            chat_id,
            knowledge,
            conversation: Mutex::new(Conversation {
                turns: history,
                prompt_count: 0,
            }),
            start_time: Utc::now(),
        }
    }

    fn conversation(&self) -> MutexGuard<'_, Conversation> {
        match self.conversation.lock() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn chat_id(&self) -> &ChatId {
        &self.chat_id
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Snapshot of the accumulated turns.
    pub fn turns(&self) -> Vec<AiTurn> {
        self.conversation().turns.clone()
    }

    pub fn turn_count(&self) -> usize {
        self.conversation().turns.len()
    }

    /// Prompts answered by this instance since it was created.
    pub fn prompt_count(&self) -> u64 {
        self.conversation().prompt_count
    }

    /// Append one answered prompt.
    pub fn record_turn(&self, turn: AiTurn) {
        let mut conversation = self.conversation();
        conversation.turns.push(turn);
        conversation.prompt_count += 1;
    }
}
