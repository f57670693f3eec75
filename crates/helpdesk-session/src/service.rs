//! Chat orchestration: creation, mode changes and message handling.
//!
//! Every operation on a chat runs under that chat's lock, so messages and
//! mode changes for one chat are totally ordered. Unrelated chats run in
//! parallel. Engine and summarizer calls are bounded by configured deadlines.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use helpdesk_core::config::HelpdeskConfig;
use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::sync::KeyedLocks;
use helpdesk_core::types::{
    AiTurn, ChatId, ChatMode, ChatSession, ClientId, CompanyId, Emotion, HumanMessage, Sender,
};
use helpdesk_engine::{KnowledgeBase, RetrievalEngine, Summarizer};
use helpdesk_storage::ChatStore;

use crate::bot::BotInstance;
use crate::handoff::{self, HandoffReport};
use crate::registry::SessionRegistry;
use crate::state_machine::{plan_transition, Transition};

/// Tunables for the AI path.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub top_k: usize,
    pub engine_timeout: Duration,
    pub fallback_response: String,
    pub summarizer_timeout: Duration,
    pub fallback_summary: String,
}

impl SessionSettings {
    pub fn from_config(config: &HelpdeskConfig) -> Self {
        Self {
            top_k: config.engine.top_k,
            engine_timeout: config.engine.timeout(),
            fallback_response: config.engine.fallback_response.clone(),
            summarizer_timeout: config.summarizer.timeout(),
            fallback_summary: config.summarizer.fallback_summary.clone(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&HelpdeskConfig::default())
    }
}

/// Outcome of a mode-change request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ModeChange {
    /// The chat was already in the requested mode.
    Unchanged { mode: ChatMode },
    HandedOff(HandoffReport),
    Resumed,
}

/// The assistant's answer to one client message.
#[derive(Debug, Clone, Serialize)]
pub struct AssistantReply {
    pub response: String,
    pub confidence: f64,
    pub emotion: Option<Emotion>,
    pub timestamp: DateTime<Utc>,
    /// True when the engine failed and the fallback text was returned.
    pub degraded: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MessageReply {
    Ai(AssistantReply),
    Human(HumanMessage),
}

/// Ask the engine under the configured deadline. A failure or timeout
/// yields the fallback text with zero confidence and the degraded flag set.
pub(crate) async fn generate_bounded(
    engine: &dyn RetrievalEngine,
    settings: &SessionSettings,
    bot: &BotInstance,
    message: &str,
    prior: &[AiTurn],
) -> (String, f64, bool) {
    let generated = tokio::time::timeout(
        settings.engine_timeout,
        engine.generate(bot.knowledge(), message, prior, settings.top_k),
    )
    .await;

    match generated {
        Ok(Ok(generation)) => (generation.response, generation.confidence, false),
        Ok(Err(e)) => {
            warn!(chat_id = %bot.chat_id(), error = %e, "Generation failed, replying with fallback");
            (settings.fallback_response.clone(), 0.0, true)
        }
        Err(_) => {
            warn!(chat_id = %bot.chat_id(), "Generation timed out, replying with fallback");
            (settings.fallback_response.clone(), 0.0, true)
        }
    }
}

#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn ChatStore>,
    registry: Arc<SessionRegistry>,
    engine: Arc<dyn RetrievalEngine>,
    summarizer: Arc<dyn Summarizer>,
    locks: Arc<KeyedLocks<ChatId>>,
    settings: Arc<SessionSettings>,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        registry: Arc<SessionRegistry>,
        engine: Arc<dyn RetrievalEngine>,
        summarizer: Arc<dyn Summarizer>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            store,
            registry,
            engine,
            summarizer,
            locks: Arc::new(KeyedLocks::new()),
            settings: Arc::new(settings),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    async fn load_chat(&self, company_id: &CompanyId, chat_id: &ChatId) -> Result<ChatSession> {
        self.store
            .get_chat(company_id, chat_id)
            .await?
            .ok_or_else(|| HelpdeskError::not_found("chat", chat_id.as_str()))
    }

    // =========================================================================
    // Chat lifecycle
    // =========================================================================

    /// Open a new chat in AI mode for a registered client.
    pub async fn create_chat(&self, company_id: &CompanyId, client_id: &ClientId) -> Result<ChatSession> {
        if self.store.get_company(company_id).await?.is_none() {
            return Err(HelpdeskError::not_found("company", company_id.as_str()));
        }
        if !self.store.client_exists(company_id, client_id).await? {
            return Err(HelpdeskError::not_found("client", client_id.as_str()));
        }
        let chat = ChatSession::new(company_id.clone(), client_id.clone());
        self.store.create_chat(&chat).await?;
        info!(company_id = %company_id, chat_id = %chat.chat_id, client_id = %client_id, "Chat created");
        Ok(chat)
    }

    pub async fn get_chat(&self, company_id: &CompanyId, chat_id: &ChatId) -> Result<ChatSession> {
        self.load_chat(company_id, chat_id).await
    }

    /// Add an opaque file reference to the chat. Returns `false` if the chat
    /// already had it.
    pub async fn attach_file(
        &self,
        company_id: &CompanyId,
        chat_id: &ChatId,
        file_ref: &str,
    ) -> Result<bool> {
        if file_ref.trim().is_empty() {
            return Err(HelpdeskError::InvalidState("file reference must not be empty".into()));
        }
        let _guard = self.locks.lock(chat_id).await;
        self.store.add_file_to_chat(company_id, chat_id, file_ref).await
    }

    // =========================================================================
    // Mode transitions
    // =========================================================================

    pub async fn set_mode(
        &self,
        company_id: &CompanyId,
        chat_id: &ChatId,
        target: ChatMode,
    ) -> Result<ModeChange> {
        let guard = self.locks.lock(chat_id).await;
        let chat = self.load_chat(company_id, chat_id).await?;

        match plan_transition(chat.mode, target) {
            Transition::Unchanged => Ok(ModeChange::Unchanged { mode: chat.mode }),
            Transition::Resume => {
                self.store
                    .set_chat_mode(company_id, chat_id, ChatMode::Ai, chat.version)
                    .await?;
                info!(company_id = %company_id, chat_id = %chat_id, "Chat returned to AI mode");
                Ok(ModeChange::Resumed)
            }
            Transition::Handoff => {
                // The handoff owns the chat lock and runs to completion even
                // if the caller goes away.
                let service = self.clone();
                let task = tokio::spawn(async move {
                    let _guard = guard;
                    service.hand_off(chat).await
                });
                let report = task
                    .await
                    .map_err(|e| HelpdeskError::Persistence(format!("handoff task aborted: {}", e)))??;
                Ok(ModeChange::HandedOff(report))
            }
        }
    }

    async fn hand_off(&self, chat: ChatSession) -> Result<HandoffReport> {
        let company_id = &chat.company_id;
        let chat_id = &chat.chat_id;

        let Some(bot) = self.registry.lookup(chat_id) else {
            self.store
                .set_chat_mode(company_id, chat_id, ChatMode::Human, chat.version)
                .await?;
            info!(company_id = %company_id, chat_id = %chat_id, "Chat handed to a human with no live session");
            return Ok(HandoffReport::without_session());
        };

        let transcript = handoff::transcript_of(&bot);
        let (summary, fallback) = handoff::summarize_with_deadline(
            self.summarizer.as_ref(),
            &transcript,
            self.settings.summarizer_timeout,
            &self.settings.fallback_summary,
        )
        .await;

        // Single atomic write. On failure the bot stays live and the chat
        // stays in AI mode.
        if let Err(e) = self
            .store
            .finalize_handoff(company_id, chat_id, &transcript.turns, &summary, chat.version)
            .await
        {
            error!(company_id = %company_id, chat_id = %chat_id, error = %e, "Failed to persist handoff");
            return Err(e);
        }
        self.registry.remove(chat_id);

        info!(
            company_id = %company_id,
            chat_id = %chat_id,
            turns = transcript.stats.turn_count,
            fallback,
            "Chat handed to a human"
        );
        Ok(HandoffReport {
            summary: Some(summary),
            fallback,
            stats: Some(transcript.stats),
        })
    }

    // =========================================================================
    // Messages
    // =========================================================================

    pub async fn post_message(
        &self,
        company_id: &CompanyId,
        chat_id: &ChatId,
        sender: Sender,
        message: &str,
    ) -> Result<MessageReply> {
        if message.trim().is_empty() {
            return Err(HelpdeskError::InvalidState("message must not be empty".into()));
        }
        let _guard = self.locks.lock(chat_id).await;
        let chat = self.load_chat(company_id, chat_id).await?;

        match chat.mode {
            ChatMode::Human => self
                .append_human(&chat, sender, message)
                .await
                .map(MessageReply::Human),
            ChatMode::Ai if sender == Sender::Helper => Err(HelpdeskError::InvalidState(
                "helpers cannot post while the assistant is handling the chat".into(),
            )),
            ChatMode::Ai => self.answer(&chat, message).await.map(MessageReply::Ai),
        }
    }

    async fn append_human(&self, chat: &ChatSession, sender: Sender, message: &str) -> Result<HumanMessage> {
        let now = Utc::now();
        // Clock steps must not reorder the log.
        let timestamp = match chat.last_human_timestamp() {
            Some(last) if last > now => last,
            _ => now,
        };
        let entry = HumanMessage {
            sender,
            message: message.to_string(),
            timestamp,
        };
        self.store
            .append_human_message(&chat.company_id, &chat.chat_id, &entry)
            .await?;
        Ok(entry)
    }

    async fn build_bot(&self, chat: &ChatSession) -> Result<BotInstance> {
        let company = self
            .store
            .get_company(&chat.company_id)
            .await?
            .ok_or_else(|| HelpdeskError::not_found("company", chat.company_id.as_str()))?;
        let knowledge = KnowledgeBase::from_json(&company.knowledge_base);
        info!(
            company_id = %chat.company_id,
            chat_id = %chat.chat_id,
            documents = knowledge.len(),
            restored_turns = chat.ai_history.len(),
            "Bot instance ready"
        );
        Ok(BotInstance::new(
            chat.chat_id.clone(),
            Arc::new(knowledge),
            chat.ai_history.clone(),
        ))
    }

    async fn detect_emotion(&self, chat_id: &ChatId, message: &str) -> Option<Emotion> {
        match tokio::time::timeout(self.settings.engine_timeout, self.engine.detect_emotion(message)).await {
            Ok(Ok(emotion)) => emotion,
            Ok(Err(e)) => {
                warn!(chat_id = %chat_id, error = %e, "Emotion detection failed");
                None
            }
            Err(_) => {
                warn!(chat_id = %chat_id, "Emotion detection timed out");
                None
            }
        }
    }

    async fn answer(&self, chat: &ChatSession, message: &str) -> Result<AssistantReply> {
        let bot = self
            .registry
            .get_or_create(&chat.chat_id, || self.build_bot(chat))
            .await?;

        let prior = bot.turns();
        let emotion = self.detect_emotion(&chat.chat_id, message).await;
        let (response, confidence, degraded) =
            generate_bounded(self.engine.as_ref(), &self.settings, &bot, message, &prior).await;

        let turn = AiTurn {
            input: message.to_string(),
            response: response.clone(),
            confidence,
            emotion: emotion.clone(),
            timestamp: Utc::now(),
        };

        // Persist first, then record in memory, so a failed or abandoned
        // write leaves the bot matching the stored history.
        let mut turns = prior;
        turns.push(turn.clone());
        if let Err(e) = self
            .store
            .set_ai_history(&chat.company_id, &chat.chat_id, &turns, chat.version)
            .await
        {
            error!(company_id = %chat.company_id, chat_id = %chat.chat_id, error = %e, "Failed to persist AI turn");
            return Err(e);
        }
        bot.record_turn(turn.clone());

        Ok(AssistantReply {
            response,
            confidence,
            emotion,
            timestamp: turn.timestamp,
            degraded,
        })
    }

    /// Evict every live bot. Called once the server has stopped taking
    /// requests.
    pub fn shutdown(&self) -> usize {
        let evicted = self.registry.clear();
        info!(evicted, "Session registry cleared");
        evicted
    }
}
