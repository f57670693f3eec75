//! SQLite-backed implementation of [`ChatStore`].
//!
//! Each trait method runs as one statement or one transaction on the shared
//! [`Database`], so callers never observe a half-applied write.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info};

use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::types::{
    AiTurn, ChatId, ChatMode, ChatSession, ClientId, Company, CompanyId, Helper, HelperId,
    HumanMessage, Priority, Sender, Ticket, TicketId, TicketStatus,
};

use crate::db::Database;
use crate::store::ChatStore;

/// Chat Store over a local SQLite database.
pub struct SqliteChatStore {
    db: Arc<Database>,
}

impl SqliteChatStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}

// =============================================================================
// Row helpers
// =============================================================================

fn storage_err(context: &str) -> impl Fn(rusqlite::Error) -> HelpdeskError + '_ {
    move |e| HelpdeskError::Persistence(format!("{}: {}", context, e))
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn company_exists(conn: &Connection, company_id: &CompanyId) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM companies WHERE company_id = ?1",
        params![company_id.as_str()],
        |_| Ok(()),
    )
    .optional()
    .map(|r| r.is_some())
    .map_err(storage_err("Failed to look up company"))
}

fn require_company(conn: &Connection, company_id: &CompanyId) -> Result<()> {
    if company_exists(conn, company_id)? {
        Ok(())
    } else {
        Err(HelpdeskError::not_found("company", company_id.as_str()))
    }
}

/// Fail unless the chat exists at exactly `expected` version.
fn check_version(
    conn: &Connection,
    company_id: &CompanyId,
    chat_id: &ChatId,
    expected: u64,
) -> Result<()> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT version FROM chats WHERE company_id = ?1 AND chat_id = ?2",
            params![company_id.as_str(), chat_id.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(storage_err("Failed to read chat version"))?;

    match found {
        None => Err(HelpdeskError::not_found("chat", chat_id.as_str())),
        Some(v) if v as u64 == expected => Ok(()),
        Some(v) => Err(HelpdeskError::StaleVersion {
            chat_id: chat_id.to_string(),
            expected,
            found: v as u64,
        }),
    }
}

fn require_chat(conn: &Connection, company_id: &CompanyId, chat_id: &ChatId) -> Result<()> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM chats WHERE company_id = ?1 AND chat_id = ?2",
            params![company_id.as_str(), chat_id.as_str()],
            |_| Ok(()),
        )
        .optional()
        .map_err(storage_err("Failed to look up chat"))?;
    exists.ok_or_else(|| HelpdeskError::not_found("chat", chat_id.as_str()))
}

fn load_assigned(conn: &Connection, company_id: &CompanyId, helper_id: &str) -> Result<Vec<TicketId>> {
    let mut stmt = conn
        .prepare(
            "SELECT ticket_id FROM helper_tickets
             WHERE company_id = ?1 AND helper_id = ?2
             ORDER BY seq ASC",
        )
        .map_err(storage_err("Failed to prepare assigned tickets query"))?;
    let rows = stmt
        .query_map(params![company_id.as_str(), helper_id], |row| {
            row.get::<_, String>(0)
        })
        .map_err(storage_err("Failed to query assigned tickets"))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(TicketId(row.map_err(storage_err("Failed to read ticket id"))?));
    }
    Ok(ids)
}

fn load_helper(conn: &Connection, company_id: &CompanyId, helper_id: &HelperId) -> Result<Option<Helper>> {
    let score: Option<f64> = conn
        .query_row(
            "SELECT performance_score FROM helpers WHERE company_id = ?1 AND helper_id = ?2",
            params![company_id.as_str(), helper_id.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(storage_err("Failed to look up helper"))?;

    match score {
        None => Ok(None),
        Some(performance_score) => Ok(Some(Helper {
            helper_id: helper_id.clone(),
            assigned_ticket_ids: load_assigned(conn, company_id, helper_id.as_str())?,
            performance_score,
        })),
    }
}

struct CompanyRow {
    company_id: String,
    name: String,
    description: Option<String>,
    admin_id: String,
    knowledge_base: String,
    faq: String,
    created_at: i64,
}

const COMPANY_COLUMNS: &str =
    "company_id, name, description, admin_id, knowledge_base, faq, created_at";

fn read_company_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CompanyRow> {
    Ok(CompanyRow {
        company_id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        admin_id: row.get(3)?,
        knowledge_base: row.get(4)?,
        faq: row.get(5)?,
        created_at: row.get(6)?,
    })
}

impl TryFrom<CompanyRow> for Company {
    type Error = HelpdeskError;

    fn try_from(row: CompanyRow) -> Result<Self> {
        Ok(Company {
            company_id: CompanyId(row.company_id),
            name: row.name,
            description: row.description,
            admin_id: row.admin_id,
            knowledge_base: serde_json::from_str(&row.knowledge_base)?,
            faq: serde_json::from_str(&row.faq)?,
            created_at: from_millis(row.created_at),
        })
    }
}

struct TicketRow {
    ticket_id: String,
    client_id: String,
    chat_id: String,
    assigned_helper: Option<String>,
    priority: String,
    status: String,
    title: String,
    description: String,
    created_at: i64,
}

const TICKET_COLUMNS: &str =
    "ticket_id, client_id, chat_id, assigned_helper, priority, status, title, description, created_at";

fn read_ticket_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TicketRow> {
    Ok(TicketRow {
        ticket_id: row.get(0)?,
        client_id: row.get(1)?,
        chat_id: row.get(2)?,
        assigned_helper: row.get(3)?,
        priority: row.get(4)?,
        status: row.get(5)?,
        title: row.get(6)?,
        description: row.get(7)?,
        created_at: row.get(8)?,
    })
}

impl TryFrom<TicketRow> for Ticket {
    type Error = HelpdeskError;

    fn try_from(row: TicketRow) -> Result<Self> {
        Ok(Ticket {
            ticket_id: TicketId(row.ticket_id),
            client_id: ClientId(row.client_id),
            chat_id: ChatId(row.chat_id),
            assigned_helper: row.assigned_helper.map(HelperId),
            priority: row
                .priority
                .parse::<Priority>()
                .map_err(HelpdeskError::Persistence)?,
            status: row
                .status
                .parse::<TicketStatus>()
                .map_err(HelpdeskError::Persistence)?,
            title: row.title,
            description: row.description,
            created_at: from_millis(row.created_at),
        })
    }
}

fn insert_ticket(conn: &Connection, company_id: &CompanyId, ticket: &Ticket) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO tickets (company_id, {}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            TICKET_COLUMNS
        ),
        params![
            company_id.as_str(),
            ticket.ticket_id.as_str(),
            ticket.client_id.as_str(),
            ticket.chat_id.as_str(),
            ticket.assigned_helper.as_ref().map(|h| h.as_str()),
            ticket.priority.to_string(),
            ticket.status.to_string(),
            ticket.title,
            ticket.description,
            to_millis(ticket.created_at),
        ],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            HelpdeskError::Conflict(format!("ticket {} already exists", ticket.ticket_id))
        } else {
            HelpdeskError::Persistence(format!("Failed to create ticket: {}", e))
        }
    })?;
    Ok(())
}

/// Single conditional insert: the row only appears if the helper does.
fn push_ticket(
    conn: &Connection,
    company_id: &CompanyId,
    helper_id: &HelperId,
    ticket_id: &TicketId,
) -> Result<()> {
    let inserted = conn
        .execute(
            "INSERT INTO helper_tickets (company_id, helper_id, ticket_id)
             SELECT company_id, helper_id, ?3 FROM helpers
             WHERE company_id = ?1 AND helper_id = ?2",
            params![company_id.as_str(), helper_id.as_str(), ticket_id.as_str()],
        )
        .map_err(storage_err("Failed to push ticket to helper"))?;
    if inserted == 0 {
        return Err(HelpdeskError::not_found("helper", helper_id.as_str()));
    }
    debug!(company_id = %company_id, helper_id = %helper_id, ticket_id = %ticket_id, "Ticket pushed to helper");
    Ok(())
}

/// Overwrite a ticket row and, if its owner changed, move the id between
/// helper lists. Callers run this inside a transaction.
fn write_ticket(conn: &Connection, company_id: &CompanyId, ticket: &Ticket) -> Result<()> {
    let previous: Option<Option<String>> = conn
        .query_row(
            "SELECT assigned_helper FROM tickets WHERE company_id = ?1 AND ticket_id = ?2",
            params![company_id.as_str(), ticket.ticket_id.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(storage_err("Failed to read ticket owner"))?;
    let Some(previous) = previous else {
        return Err(HelpdeskError::not_found("ticket", ticket.ticket_id.as_str()));
    };

    conn.execute(
        "UPDATE tickets
         SET assigned_helper = ?3, priority = ?4, status = ?5, title = ?6, description = ?7
         WHERE company_id = ?1 AND ticket_id = ?2",
        params![
            company_id.as_str(),
            ticket.ticket_id.as_str(),
            ticket.assigned_helper.as_ref().map(|h| h.as_str()),
            ticket.priority.to_string(),
            ticket.status.to_string(),
            ticket.title,
            ticket.description,
        ],
    )
    .map_err(storage_err("Failed to update ticket"))?;

    let next = ticket.assigned_helper.as_ref().map(|h| h.as_str());
    if previous.as_deref() == next {
        return Ok(());
    }
    if let Some(old) = &previous {
        conn.execute(
            "DELETE FROM helper_tickets
             WHERE company_id = ?1 AND helper_id = ?2 AND ticket_id = ?3",
            params![company_id.as_str(), old, ticket.ticket_id.as_str()],
        )
        .map_err(storage_err("Failed to pull ticket from helper"))?;
    }
    if let Some(new) = &ticket.assigned_helper {
        push_ticket(conn, company_id, new, &ticket.ticket_id)?;
    }
    Ok(())
}

// =============================================================================
// ChatStore
// =============================================================================

#[async_trait]
impl ChatStore for SqliteChatStore {
    async fn create_company(&self, company: &Company) -> Result<()> {
        let knowledge = serde_json::to_string(&company.knowledge_base)?;
        let faq = serde_json::to_string(&company.faq)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO companies (company_id, name, description, admin_id, knowledge_base, faq, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    company.company_id.as_str(),
                    company.name,
                    company.description,
                    company.admin_id,
                    knowledge,
                    faq,
                    to_millis(company.created_at),
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    HelpdeskError::Conflict(format!(
                        "company {} already exists",
                        company.company_id
                    ))
                } else {
                    HelpdeskError::Persistence(format!("Failed to create company: {}", e))
                }
            })?;
            info!(company_id = %company.company_id, "Company created");
            Ok(())
        })
    }

    async fn get_company(&self, company_id: &CompanyId) -> Result<Option<Company>> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {} FROM companies WHERE company_id = ?1", COMPANY_COLUMNS),
                    params![company_id.as_str()],
                    read_company_row,
                )
                .optional()
                .map_err(storage_err("Failed to read company"))?;
            row.map(Company::try_from).transpose()
        })
    }

    async fn list_companies(&self) -> Result<Vec<Company>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM companies ORDER BY created_at ASC, rowid ASC",
                    COMPANY_COLUMNS
                ))
                .map_err(storage_err("Failed to prepare company list"))?;
            let rows = stmt
                .query_map([], read_company_row)
                .map_err(storage_err("Failed to list companies"))?;

            let mut companies = Vec::new();
            for row in rows {
                companies.push(Company::try_from(
                    row.map_err(storage_err("Failed to read company"))?,
                )?);
            }
            Ok(companies)
        })
    }

    async fn delete_company(&self, company_id: &CompanyId) -> Result<Vec<ChatId>> {
        self.db.with_transaction(|tx| {
            require_company(tx, company_id)?;
            let chat_ids = {
                let mut stmt = tx
                    .prepare("SELECT chat_id FROM chats WHERE company_id = ?1")
                    .map_err(storage_err("Failed to prepare chat id query"))?;
                let rows = stmt
                    .query_map(params![company_id.as_str()], |row| row.get::<_, String>(0))
                    .map_err(storage_err("Failed to query chat ids"))?;
                let mut ids = Vec::new();
                for row in rows {
                    ids.push(ChatId(row.map_err(storage_err("Failed to read chat id"))?));
                }
                ids
            };
            // Child rows go with it through ON DELETE CASCADE.
            tx.execute(
                "DELETE FROM companies WHERE company_id = ?1",
                params![company_id.as_str()],
            )
            .map_err(storage_err("Failed to delete company"))?;
            info!(company_id = %company_id, chats = chat_ids.len(), "Company deleted");
            Ok(chat_ids)
        })
    }

    async fn save_company(&self, company: &Company) -> Result<()> {
        let knowledge = serde_json::to_string(&company.knowledge_base)?;
        let faq = serde_json::to_string(&company.faq)?;
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE companies
                     SET name = ?2, description = ?3, admin_id = ?4, knowledge_base = ?5, faq = ?6
                     WHERE company_id = ?1",
                    params![
                        company.company_id.as_str(),
                        company.name,
                        company.description,
                        company.admin_id,
                        knowledge,
                        faq,
                    ],
                )
                .map_err(storage_err("Failed to update company"))?;
            if changed == 0 {
                return Err(HelpdeskError::not_found("company", company.company_id.as_str()));
            }
            Ok(())
        })
    }

    async fn register_client(&self, company_id: &CompanyId, client_id: &ClientId) -> Result<()> {
        self.db.with_transaction(|tx| {
            require_company(tx, company_id)?;
            tx.execute(
                "INSERT INTO clients (company_id, client_id) VALUES (?1, ?2)",
                params![company_id.as_str(), client_id.as_str()],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    HelpdeskError::Conflict(format!("client {} already exists", client_id))
                } else {
                    HelpdeskError::Persistence(format!("Failed to register client: {}", e))
                }
            })?;
            info!(company_id = %company_id, client_id = %client_id, "Client registered");
            Ok(())
        })
    }

    async fn client_exists(&self, company_id: &CompanyId, client_id: &ClientId) -> Result<bool> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT 1 FROM clients WHERE company_id = ?1 AND client_id = ?2",
                params![company_id.as_str(), client_id.as_str()],
                |_| Ok(()),
            )
            .optional()
            .map(|r| r.is_some())
            .map_err(storage_err("Failed to look up client"))
        })
    }

    async fn register_helper(&self, company_id: &CompanyId, helper: &Helper) -> Result<()> {
        self.db.with_transaction(|tx| {
            require_company(tx, company_id)?;
            tx.execute(
                "INSERT INTO helpers (company_id, helper_id, performance_score) VALUES (?1, ?2, ?3)",
                params![
                    company_id.as_str(),
                    helper.helper_id.as_str(),
                    helper.performance_score
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    HelpdeskError::Conflict(format!("helper {} already exists", helper.helper_id))
                } else {
                    HelpdeskError::Persistence(format!("Failed to register helper: {}", e))
                }
            })?;
            for ticket_id in &helper.assigned_ticket_ids {
                tx.execute(
                    "INSERT INTO helper_tickets (company_id, helper_id, ticket_id) VALUES (?1, ?2, ?3)",
                    params![company_id.as_str(), helper.helper_id.as_str(), ticket_id.as_str()],
                )
                .map_err(storage_err("Failed to seed helper tickets"))?;
            }
            info!(company_id = %company_id, helper_id = %helper.helper_id, "Helper registered");
            Ok(())
        })
    }

    async fn get_helper_pool(&self, company_id: &CompanyId) -> Result<Vec<Helper>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT helper_id, performance_score FROM helpers
                     WHERE company_id = ?1 ORDER BY seq ASC",
                )
                .map_err(storage_err("Failed to prepare helper pool query"))?;
            let rows = stmt
                .query_map(params![company_id.as_str()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
                })
                .map_err(storage_err("Failed to query helper pool"))?;

            let mut pool = Vec::new();
            for row in rows {
                let (helper_id, performance_score) =
                    row.map_err(storage_err("Failed to read helper"))?;
                let assigned_ticket_ids = load_assigned(conn, company_id, &helper_id)?;
                pool.push(Helper {
                    helper_id: HelperId(helper_id),
                    assigned_ticket_ids,
                    performance_score,
                });
            }
            Ok(pool)
        })
    }

    async fn remove_helper_and_reassign(
        &self,
        company_id: &CompanyId,
        helper_id: &HelperId,
        tickets: &[Ticket],
    ) -> Result<()> {
        self.db.with_transaction(|tx| {
            require_company(tx, company_id)?;
            if load_helper(tx, company_id, helper_id)?.is_none() {
                return Err(HelpdeskError::not_found("helper", helper_id.as_str()));
            }
            tx.execute(
                "DELETE FROM helper_tickets WHERE company_id = ?1 AND helper_id = ?2",
                params![company_id.as_str(), helper_id.as_str()],
            )
            .map_err(storage_err("Failed to clear helper tickets"))?;
            tx.execute(
                "DELETE FROM helpers WHERE company_id = ?1 AND helper_id = ?2",
                params![company_id.as_str(), helper_id.as_str()],
            )
            .map_err(storage_err("Failed to delete helper"))?;
            for ticket in tickets {
                write_ticket(tx, company_id, ticket)?;
            }
            info!(
                company_id = %company_id,
                helper_id = %helper_id,
                tickets = tickets.len(),
                "Helper removed"
            );
            Ok(())
        })
    }

    async fn push_ticket_to_helper(
        &self,
        company_id: &CompanyId,
        helper_id: &HelperId,
        ticket_id: &TicketId,
    ) -> Result<()> {
        self.db
            .with_conn(|conn| push_ticket(conn, company_id, helper_id, ticket_id))
    }

    async fn create_chat(&self, chat: &ChatSession) -> Result<()> {
        let ai_history = serde_json::to_string(&chat.ai_history)?;
        self.db.with_transaction(|tx| {
            require_company(tx, &chat.company_id)?;
            tx.execute(
                "INSERT INTO chats (company_id, chat_id, client_id, mode, ticket_id, ai_history, summary, version, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    chat.company_id.as_str(),
                    chat.chat_id.as_str(),
                    chat.client_id.as_str(),
                    chat.mode.to_string(),
                    chat.ticket_id.as_ref().map(|t| t.as_str()),
                    ai_history,
                    chat.summary,
                    chat.version as i64,
                    to_millis(chat.created_at),
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    HelpdeskError::Conflict(format!("chat {} already exists", chat.chat_id))
                } else {
                    HelpdeskError::Persistence(format!("Failed to create chat: {}", e))
                }
            })?;
            for message in &chat.human_history {
                insert_human_message(tx, &chat.company_id, &chat.chat_id, message)?;
            }
            for file_ref in &chat.files {
                insert_file(tx, &chat.company_id, &chat.chat_id, file_ref)?;
            }
            Ok(())
        })
    }

    async fn get_chat(
        &self,
        company_id: &CompanyId,
        chat_id: &ChatId,
    ) -> Result<Option<ChatSession>> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT client_id, mode, ticket_id, ai_history, summary, version, created_at
                     FROM chats WHERE company_id = ?1 AND chat_id = ?2",
                    params![company_id.as_str(), chat_id.as_str()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, Option<String>>(4)?,
                            row.get::<_, i64>(5)?,
                            row.get::<_, i64>(6)?,
                        ))
                    },
                )
                .optional()
                .map_err(storage_err("Failed to read chat"))?;

            let Some((client_id, mode, ticket_id, ai_history, summary, version, created_at)) = row
            else {
                return Ok(None);
            };

            Ok(Some(ChatSession {
                chat_id: chat_id.clone(),
                company_id: company_id.clone(),
                client_id: ClientId(client_id),
                mode: mode.parse::<ChatMode>()?,
                ticket_id: ticket_id.map(TicketId),
                ai_history: serde_json::from_str(&ai_history)?,
                human_history: load_human_history(conn, company_id, chat_id)?,
                summary,
                files: load_files(conn, company_id, chat_id)?,
                version: version as u64,
                created_at: from_millis(created_at),
            }))
        })
    }

    async fn set_chat_mode(
        &self,
        company_id: &CompanyId,
        chat_id: &ChatId,
        mode: ChatMode,
        expected_version: u64,
    ) -> Result<u64> {
        self.db.with_transaction(|tx| {
            check_version(tx, company_id, chat_id, expected_version)?;
            let next = expected_version + 1;
            tx.execute(
                "UPDATE chats SET mode = ?3, version = ?4 WHERE company_id = ?1 AND chat_id = ?2",
                params![company_id.as_str(), chat_id.as_str(), mode.to_string(), next as i64],
            )
            .map_err(storage_err("Failed to update chat mode"))?;
            Ok(next)
        })
    }

    async fn append_human_message(
        &self,
        company_id: &CompanyId,
        chat_id: &ChatId,
        message: &HumanMessage,
    ) -> Result<()> {
        self.db.with_transaction(|tx| {
            require_chat(tx, company_id, chat_id)?;
            insert_human_message(tx, company_id, chat_id, message)
        })
    }

    async fn set_ai_history(
        &self,
        company_id: &CompanyId,
        chat_id: &ChatId,
        turns: &[AiTurn],
        expected_version: u64,
    ) -> Result<u64> {
        let encoded = serde_json::to_string(turns)?;
        self.db.with_transaction(|tx| {
            check_version(tx, company_id, chat_id, expected_version)?;
            let next = expected_version + 1;
            tx.execute(
                "UPDATE chats SET ai_history = ?3, version = ?4 WHERE company_id = ?1 AND chat_id = ?2",
                params![company_id.as_str(), chat_id.as_str(), encoded, next as i64],
            )
            .map_err(storage_err("Failed to write AI history"))?;
            Ok(next)
        })
    }

    async fn finalize_handoff(
        &self,
        company_id: &CompanyId,
        chat_id: &ChatId,
        turns: &[AiTurn],
        summary: &str,
        expected_version: u64,
    ) -> Result<u64> {
        let encoded = serde_json::to_string(turns)?;
        self.db.with_transaction(|tx| {
            check_version(tx, company_id, chat_id, expected_version)?;
            let next = expected_version + 1;
            tx.execute(
                "UPDATE chats SET ai_history = ?3, summary = ?4, mode = 'human', version = ?5
                 WHERE company_id = ?1 AND chat_id = ?2",
                params![company_id.as_str(), chat_id.as_str(), encoded, summary, next as i64],
            )
            .map_err(storage_err("Failed to finalize handoff"))?;
            Ok(next)
        })
    }

    async fn add_file_to_chat(
        &self,
        company_id: &CompanyId,
        chat_id: &ChatId,
        file_ref: &str,
    ) -> Result<bool> {
        self.db.with_transaction(|tx| {
            require_chat(tx, company_id, chat_id)?;
            insert_file(tx, company_id, chat_id, file_ref)
        })
    }

    async fn create_ticket_record(&self, company_id: &CompanyId, ticket: &Ticket) -> Result<()> {
        self.db.with_transaction(|tx| {
            require_company(tx, company_id)?;
            insert_ticket(tx, company_id, ticket)?;
            if let Some(helper_id) = &ticket.assigned_helper {
                push_ticket(tx, company_id, helper_id, &ticket.ticket_id)?;
            }
            // A ticket may name a chat this store has never seen.
            let linked = tx
                .execute(
                    "UPDATE chats SET ticket_id = ?3 WHERE company_id = ?1 AND chat_id = ?2",
                    params![
                        company_id.as_str(),
                        ticket.chat_id.as_str(),
                        ticket.ticket_id.as_str()
                    ],
                )
                .map_err(storage_err("Failed to link ticket to chat"))?;
            info!(
                company_id = %company_id,
                ticket_id = %ticket.ticket_id,
                linked = linked > 0,
                "Ticket created"
            );
            Ok(())
        })
    }

    async fn get_ticket(
        &self,
        company_id: &CompanyId,
        ticket_id: &TicketId,
    ) -> Result<Option<Ticket>> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {} FROM tickets WHERE company_id = ?1 AND ticket_id = ?2",
                        TICKET_COLUMNS
                    ),
                    params![company_id.as_str(), ticket_id.as_str()],
                    read_ticket_row,
                )
                .optional()
                .map_err(storage_err("Failed to read ticket"))?;
            row.map(Ticket::try_from).transpose()
        })
    }

    async fn list_tickets(&self, company_id: &CompanyId) -> Result<Vec<Ticket>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM tickets WHERE company_id = ?1 ORDER BY created_at ASC, rowid ASC",
                    TICKET_COLUMNS
                ))
                .map_err(storage_err("Failed to prepare ticket list"))?;
            let rows = stmt
                .query_map(params![company_id.as_str()], read_ticket_row)
                .map_err(storage_err("Failed to list tickets"))?;

            let mut tickets = Vec::new();
            for row in rows {
                tickets.push(Ticket::try_from(
                    row.map_err(storage_err("Failed to read ticket"))?,
                )?);
            }
            Ok(tickets)
        })
    }

    async fn update_ticket(&self, company_id: &CompanyId, ticket: &Ticket) -> Result<()> {
        self.db
            .with_transaction(|tx| write_ticket(tx, company_id, ticket))
    }
}

fn insert_human_message(
    conn: &Connection,
    company_id: &CompanyId,
    chat_id: &ChatId,
    message: &HumanMessage,
) -> Result<()> {
    conn.execute(
        "INSERT INTO human_messages (company_id, chat_id, sender, message, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            company_id.as_str(),
            chat_id.as_str(),
            message.sender.to_string(),
            message.message,
            to_millis(message.timestamp),
        ],
    )
    .map_err(storage_err("Failed to append human message"))?;
    Ok(())
}

fn insert_file(conn: &Connection, company_id: &CompanyId, chat_id: &ChatId, file_ref: &str) -> Result<bool> {
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO chat_files (company_id, chat_id, file_ref) VALUES (?1, ?2, ?3)",
            params![company_id.as_str(), chat_id.as_str(), file_ref],
        )
        .map_err(storage_err("Failed to attach file"))?;
    Ok(inserted > 0)
}

fn load_human_history(
    conn: &Connection,
    company_id: &CompanyId,
    chat_id: &ChatId,
) -> Result<Vec<HumanMessage>> {
    let mut stmt = conn
        .prepare(
            "SELECT sender, message, timestamp FROM human_messages
             WHERE company_id = ?1 AND chat_id = ?2 ORDER BY seq ASC",
        )
        .map_err(storage_err("Failed to prepare human history query"))?;
    let rows = stmt
        .query_map(params![company_id.as_str(), chat_id.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })
        .map_err(storage_err("Failed to query human history"))?;

    let mut history = Vec::new();
    for row in rows {
        let (sender, message, timestamp) = row.map_err(storage_err("Failed to read message"))?;
        history.push(HumanMessage {
            sender: sender.parse::<Sender>().map_err(HelpdeskError::Persistence)?,
            message,
            timestamp: from_millis(timestamp),
        });
    }
    Ok(history)
}

fn load_files(conn: &Connection, company_id: &CompanyId, chat_id: &ChatId) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(
            "SELECT file_ref FROM chat_files WHERE company_id = ?1 AND chat_id = ?2 ORDER BY seq ASC",
        )
        .map_err(storage_err("Failed to prepare file query"))?;
    let rows = stmt
        .query_map(params![company_id.as_str(), chat_id.as_str()], |row| {
            row.get::<_, String>(0)
        })
        .map_err(storage_err("Failed to query files"))?;

    let mut files = Vec::new();
    for row in rows {
        files.push(row.map_err(storage_err("Failed to read file reference"))?);
    }
    Ok(files)
}
