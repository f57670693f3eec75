//! Domain types shared by every helpdesk crate.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HelpdeskError;

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Caller-chosen company identifier.
    CompanyId
);
string_id!(
    /// Client identifier, unique within a company.
    ClientId
);
string_id!(
    /// Helper identifier, unique within a company.
    HelperId
);
string_id!(
    /// Chat identifier, generated on creation.
    ChatId
);
string_id!(
    /// Ticket identifier, caller-supplied or generated.
    TicketId
);

impl ChatId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl TicketId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

// =============================================================================
// Chat mode
// =============================================================================

/// Which party is currently answering the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    #[serde(alias = "AI")]
    Ai,
    #[serde(alias = "Human")]
    Human,
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatMode::Ai => write!(f, "ai"),
            ChatMode::Human => write!(f, "human"),
        }
    }
}

impl std::str::FromStr for ChatMode {
    type Err = HelpdeskError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ai" => Ok(ChatMode::Ai),
            "human" => Ok(ChatMode::Human),
            _ => Err(HelpdeskError::InvalidState(format!(
                "unrecognized chat mode '{}'",
                s
            ))),
        }
    }
}

/// Author of a human-mode message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Client,
    Helper,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::Client => write!(f, "client"),
            Sender::Helper => write!(f, "helper"),
        }
    }
}

impl std::str::FromStr for Sender {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Sender::Client),
            "helper" => Ok(Sender::Helper),
            _ => Err(format!("Unknown sender: {}", s)),
        }
    }
}

// =============================================================================
// Chat history entries
// =============================================================================

/// Emotion label attached to a client query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emotion {
    pub label: String,
    pub score: f64,
}

impl Emotion {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// One AI-mode exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiTurn {
    pub input: String,
    pub response: String,
    pub confidence: f64,
    #[serde(default)]
    pub emotion: Option<Emotion>,
    pub timestamp: DateTime<Utc>,
}

/// One human-mode message. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanMessage {
    pub sender: Sender,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Durable record of one client conversation.
///
/// `version` is bumped on every write to `mode`, `ai_history` or `summary`
/// and is used as an optimistic concurrency token for those fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub chat_id: ChatId,
    pub company_id: CompanyId,
    pub client_id: ClientId,
    pub mode: ChatMode,
    pub ticket_id: Option<TicketId>,
    pub ai_history: Vec<AiTurn>,
    pub human_history: Vec<HumanMessage>,
    pub summary: Option<String>,
    pub files: Vec<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    /// A fresh chat: AI mode, empty histories.
    pub fn new(company_id: CompanyId, client_id: ClientId) -> Self {
        Self {
            chat_id: ChatId::generate(),
            company_id,
            client_id,
            mode: ChatMode::Ai,
            ticket_id: None,
            ai_history: Vec::new(),
            human_history: Vec::new(),
            summary: None,
            files: Vec::new(),
            version: 0,
            created_at: Utc::now(),
        }
    }

    pub fn last_human_timestamp(&self) -> Option<DateTime<Utc>> {
        self.human_history.last().map(|m| m.timestamp)
    }
}

// =============================================================================
// Companies, clients, helpers
// =============================================================================

/// A tenant of the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub company_id: CompanyId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub admin_id: String,
    /// Free-form JSON the assistant answers from.
    #[serde(default)]
    pub knowledge_base: serde_json::Value,
    /// Frequently asked questions, question -> answer.
    #[serde(default)]
    pub faq: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// A human support agent eligible to receive tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Helper {
    pub helper_id: HelperId,
    pub assigned_ticket_ids: Vec<TicketId>,
    pub performance_score: f64,
}

impl Helper {
    pub fn new(helper_id: HelperId) -> Self {
        Self {
            helper_id,
            assigned_ticket_ids: Vec::new(),
            performance_score: 0.0,
        }
    }

    pub fn load(&self) -> usize {
        self.assigned_ticket_ids.len()
    }
}

// =============================================================================
// Tickets
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[serde(alias = "Low")]
    Low,
    #[serde(alias = "Medium")]
    Medium,
    #[serde(alias = "High")]
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Closed,
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketStatus::Open => write!(f, "open"),
            TicketStatus::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "closed" => Ok(TicketStatus::Closed),
            _ => Err(format!("Unknown ticket status: {}", s)),
        }
    }
}

/// A trackable support issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: TicketId,
    pub client_id: ClientId,
    pub chat_id: ChatId,
    pub assigned_helper: Option<HelperId>,
    pub priority: Priority,
    pub status: TicketStatus,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
