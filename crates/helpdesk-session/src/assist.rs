//! Helper-facing assistant sessions.
//!
//! A helper opens a session over their company's knowledge base and its
//! tickets, asks questions while working a case, and closes the session to
//! get its transcript and statistics back. Sessions live in their own
//! [`SessionRegistry`] and are never persisted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;

use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::sync::KeyedLocks;
use helpdesk_core::types::{AiTurn, ChatId, CompanyId, HelperId, Ticket, TicketId};
use helpdesk_engine::{KnowledgeBase, RetrievalEngine, Transcript};
use helpdesk_storage::ChatStore;

use crate::bot::BotInstance;
use crate::handoff;
use crate::registry::SessionRegistry;
use crate::service::{generate_bounded, SessionSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Owner {
    company_id: CompanyId,
    helper_id: HelperId,
}

/// A freshly opened assist session.
#[derive(Debug, Clone, Serialize)]
pub struct AssistSession {
    pub session_id: ChatId,
    pub company_id: CompanyId,
    pub helper_id: HelperId,
    /// Documents the session answers from, tickets included.
    pub documents: usize,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistReply {
    pub session_id: ChatId,
    pub response: String,
    pub confidence: f64,
    /// Set when the query named one of the company's tickets.
    pub ticket_id: Option<TicketId>,
    pub degraded: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AgentAssistService {
    store: Arc<dyn ChatStore>,
    engine: Arc<dyn RetrievalEngine>,
    sessions: Arc<SessionRegistry>,
    owners: Arc<Mutex<HashMap<ChatId, Owner>>>,
    locks: Arc<KeyedLocks<ChatId>>,
    settings: Arc<SessionSettings>,
}

impl AgentAssistService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        engine: Arc<dyn RetrievalEngine>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            store,
            engine,
            sessions: Arc::new(SessionRegistry::new()),
            owners: Arc::new(Mutex::new(HashMap::new())),
            locks: Arc::new(KeyedLocks::new()),
            settings: Arc::new(settings),
        }
    }

    fn owners(&self) -> MutexGuard<'_, HashMap<ChatId, Owner>> {
        match self.owners.lock() {
            Ok(o) => o,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Session owned by this helper, or `NotFound`.
    fn require_owned(&self, company_id: &CompanyId, helper_id: &HelperId, session_id: &ChatId) -> Result<()> {
        let owner = Owner {
            company_id: company_id.clone(),
            helper_id: helper_id.clone(),
        };
        match self.owners().get(session_id) {
            Some(found) if *found == owner => Ok(()),
            _ => Err(HelpdeskError::not_found("assist session", session_id.as_str())),
        }
    }

    /// Open a session for a helper registered with the company.
    pub async fn open(&self, company_id: &CompanyId, helper_id: &HelperId) -> Result<AssistSession> {
        let company = self
            .store
            .get_company(company_id)
            .await?
            .ok_or_else(|| HelpdeskError::not_found("company", company_id.as_str()))?;
        let pool = self.store.get_helper_pool(company_id).await?;
        if !pool.iter().any(|h| &h.helper_id == helper_id) {
            return Err(HelpdeskError::not_found("helper", helper_id.as_str()));
        }

        let tickets = self.store.list_tickets(company_id).await?;
        let knowledge = KnowledgeBase::from_json(&assist_knowledge(&company.knowledge_base, &tickets));
        let documents = knowledge.len();

        let session_id = ChatId::generate();
        let id = session_id.clone();
        let bot = self
            .sessions
            .get_or_create(&session_id, move || async move {
                Ok(BotInstance::new(id, Arc::new(knowledge), Vec::new()))
            })
            .await?;
        self.owners().insert(
            session_id.clone(),
            Owner {
                company_id: company_id.clone(),
                helper_id: helper_id.clone(),
            },
        );

        info!(
            company_id = %company_id,
            helper_id = %helper_id,
            session_id = %session_id,
            documents,
            "Assist session opened"
        );
        Ok(AssistSession {
            session_id,
            company_id: company_id.clone(),
            helper_id: helper_id.clone(),
            documents,
            started_at: bot.start_time(),
        })
    }

    /// Answer one helper query. A query naming a company ticket by id gets
    /// that ticket's current details and is not recorded as a turn.
    pub async fn ask(
        &self,
        company_id: &CompanyId,
        helper_id: &HelperId,
        session_id: &ChatId,
        query: &str,
    ) -> Result<AssistReply> {
        if query.trim().is_empty() {
            return Err(HelpdeskError::InvalidState("query must not be empty".into()));
        }
        let _guard = self.locks.lock(session_id).await;
        self.require_owned(company_id, helper_id, session_id)?;
        let bot = self
            .sessions
            .lookup(session_id)
            .ok_or_else(|| HelpdeskError::not_found("assist session", session_id.as_str()))?;

        let tickets = self.store.list_tickets(company_id).await?;
        if let Some(ticket) = mentioned_ticket(query, &tickets) {
            return Ok(AssistReply {
                session_id: session_id.clone(),
                response: describe_ticket(ticket),
                confidence: 1.0,
                ticket_id: Some(ticket.ticket_id.clone()),
                degraded: false,
                timestamp: Utc::now(),
            });
        }

        let prior = bot.turns();
        let (response, confidence, degraded) =
            generate_bounded(self.engine.as_ref(), &self.settings, &bot, query, &prior).await;
        let timestamp = Utc::now();
        bot.record_turn(AiTurn {
            input: query.to_string(),
            response: response.clone(),
            confidence,
            emotion: None,
            timestamp,
        });

        Ok(AssistReply {
            session_id: session_id.clone(),
            response,
            confidence,
            ticket_id: None,
            degraded,
            timestamp,
        })
    }

    /// Close the session and return its transcript with statistics.
    pub async fn close(
        &self,
        company_id: &CompanyId,
        helper_id: &HelperId,
        session_id: &ChatId,
    ) -> Result<Transcript> {
        let _guard = self.locks.lock(session_id).await;
        self.require_owned(company_id, helper_id, session_id)?;
        self.owners().remove(session_id);
        let bot = self
            .sessions
            .remove(session_id)
            .ok_or_else(|| HelpdeskError::not_found("assist session", session_id.as_str()))?;

        let transcript = handoff::transcript_of(&bot);
        info!(
            company_id = %company_id,
            helper_id = %helper_id,
            session_id = %session_id,
            turns = transcript.stats.turn_count,
            "Assist session closed"
        );
        Ok(transcript)
    }

    /// Drop every session opened under the company. Returns how many.
    pub fn close_company(&self, company_id: &CompanyId) -> usize {
        let closed: Vec<ChatId> = {
            let mut owners = self.owners();
            let ids: Vec<ChatId> = owners
                .iter()
                .filter(|(_, owner)| &owner.company_id == company_id)
                .map(|(id, _)| id.clone())
                .collect();
            for id in &ids {
                owners.remove(id);
            }
            ids
        };
        for id in &closed {
            self.sessions.remove(id);
        }
        closed.len()
    }

    /// Drop every session. Called once the server has stopped.
    pub fn shutdown(&self) -> usize {
        self.owners().clear();
        self.sessions.clear()
    }
}

/// Company knowledge plus one entry per ticket, keyed by ticket id.
fn assist_knowledge(company_knowledge: &Value, tickets: &[Ticket]) -> Value {
    let mut by_id = Map::new();
    for ticket in tickets {
        by_id.insert(
            ticket.ticket_id.to_string(),
            json!({
                "title": ticket.title,
                "description": ticket.description,
                "status": ticket.status.to_string(),
                "priority": ticket.priority.to_string(),
            }),
        );
    }
    json!({
        "knowledge": company_knowledge,
        "tickets": by_id,
    })
}

/// First ticket whose id appears as a whole word in the query, ignoring case.
fn mentioned_ticket<'a>(query: &str, tickets: &'a [Ticket]) -> Option<&'a Ticket> {
    query
        .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .filter(|word| !word.is_empty())
        .find_map(|word| {
            tickets
                .iter()
                .find(|t| t.ticket_id.as_str().eq_ignore_ascii_case(word))
        })
}

fn describe_ticket(ticket: &Ticket) -> String {
    let mut text = format!(
        "Ticket {}: {}\nStatus: {}\nPriority: {}\nAssigned to: {}",
        ticket.ticket_id,
        ticket.title,
        ticket.status,
        ticket.priority,
        ticket
            .assigned_helper
            .as_ref()
            .map(|h| h.as_str())
            .unwrap_or("nobody"),
    );
    if !ticket.description.is_empty() {
        text.push_str(&format!("\nDescription: {}", ticket.description));
    }
    text
}
