//! Ticket creation, maintenance and helper pool management.
//!
//! Everything that reads a company's helper pool and then writes an
//! assignment runs under that company's lock, so two tickets created at the
//! same time cannot both see the same helper as least busy.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use helpdesk_core::error::{HelpdeskError, Result};
use helpdesk_core::sync::KeyedLocks;
use helpdesk_core::types::{
    ChatId, ClientId, CompanyId, Helper, HelperId, Priority, Ticket, TicketId, TicketStatus,
};
use helpdesk_storage::ChatStore;

use crate::assign::assign_least_busy_helper;

fn default_priority() -> Priority {
    Priority::Medium
}

/// Ticket creation request.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTicket {
    /// Generated when absent.
    #[serde(default)]
    pub ticket_id: Option<TicketId>,
    pub client_id: ClientId,
    pub chat_id: ChatId,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Partial ticket update; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<TicketStatus>,
    /// Move the ticket to this helper.
    pub assigned_helper: Option<HelperId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketFilter {
    All,
    Client(ClientId),
    Helper(HelperId),
}

impl TicketFilter {
    fn matches(&self, ticket: &Ticket) -> bool {
        match self {
            TicketFilter::All => true,
            TicketFilter::Client(client) => &ticket.client_id == client,
            TicketFilter::Helper(helper) => ticket.assigned_helper.as_ref() == Some(helper),
        }
    }
}

/// Where one ticket of a deleted helper ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reassignment {
    pub ticket_id: TicketId,
    /// `None` when no helper was left to take it.
    pub assigned_helper: Option<HelperId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HelperRemoval {
    pub helper_id: HelperId,
    pub reassigned: Vec<Reassignment>,
    /// Closed tickets that were released without a new owner.
    pub released: Vec<TicketId>,
}

pub struct TicketRouter {
    store: Arc<dyn ChatStore>,
    locks: KeyedLocks<CompanyId>,
}

impl TicketRouter {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    async fn require_company(&self, company_id: &CompanyId) -> Result<()> {
        match self.store.get_company(company_id).await? {
            Some(_) => Ok(()),
            None => Err(HelpdeskError::not_found("company", company_id.as_str())),
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    pub async fn register_helper(
        &self,
        company_id: &CompanyId,
        helper_id: HelperId,
        performance_score: Option<f64>,
    ) -> Result<Helper> {
        if helper_id.as_str().trim().is_empty() {
            return Err(HelpdeskError::InvalidState("helper id must not be empty".into()));
        }
        let mut helper = Helper::new(helper_id);
        if let Some(score) = performance_score {
            helper.performance_score = score;
        }
        let _guard = self.locks.lock(company_id).await;
        self.store.register_helper(company_id, &helper).await?;
        Ok(helper)
    }

    pub async fn list_helpers(&self, company_id: &CompanyId) -> Result<Vec<Helper>> {
        self.require_company(company_id).await?;
        self.store.get_helper_pool(company_id).await
    }

    /// Current least-busy helper, if the pool is not empty.
    pub async fn least_busy_helper(&self, company_id: &CompanyId) -> Result<Option<HelperId>> {
        let pool = self.store.get_helper_pool(company_id).await?;
        Ok(assign_least_busy_helper(&pool).map(|h| h.helper_id.clone()))
    }

    /// Delete a helper and hand each of its open tickets, one at a time, to
    /// the least-busy remaining helper. The plan is built from the current
    /// pool and then written in a single store transaction.
    pub async fn delete_helper(&self, company_id: &CompanyId, helper_id: &HelperId) -> Result<HelperRemoval> {
        let _guard = self.locks.lock(company_id).await;
        self.require_company(company_id).await?;
        let mut pool = self.store.get_helper_pool(company_id).await?;
        let position = pool
            .iter()
            .position(|h| &h.helper_id == helper_id)
            .ok_or_else(|| HelpdeskError::not_found("helper", helper_id.as_str()))?;
        let removed = pool.remove(position);

        let mut writes = Vec::new();
        let mut reassigned = Vec::new();
        let mut released = Vec::new();
        for ticket_id in &removed.assigned_ticket_ids {
            let Some(mut ticket) = self.store.get_ticket(company_id, ticket_id).await? else {
                warn!(company_id = %company_id, ticket_id = %ticket_id, "Deleted helper held an unknown ticket");
                continue;
            };

            if ticket.status == TicketStatus::Closed {
                ticket.assigned_helper = None;
                released.push(ticket.ticket_id.clone());
                writes.push(ticket);
                continue;
            }

            let next = assign_least_busy_helper(&pool).map(|h| h.helper_id.clone());
            if let Some(next_id) = &next {
                if let Some(h) = pool.iter_mut().find(|h| &h.helper_id == next_id) {
                    h.assigned_ticket_ids.push(ticket.ticket_id.clone());
                }
            }
            ticket.assigned_helper = next.clone();
            reassigned.push(Reassignment {
                ticket_id: ticket.ticket_id.clone(),
                assigned_helper: next,
            });
            writes.push(ticket);
        }

        self.store
            .remove_helper_and_reassign(company_id, helper_id, &writes)
            .await?;

        info!(
            company_id = %company_id,
            helper_id = %helper_id,
            reassigned = reassigned.len(),
            released = released.len(),
            "Helper deleted"
        );
        Ok(HelperRemoval {
            helper_id: removed.helper_id,
            reassigned,
            released,
        })
    }

    // =========================================================================
    // Tickets
    // =========================================================================

    pub async fn create_ticket(&self, company_id: &CompanyId, new: NewTicket) -> Result<Ticket> {
        if new.title.trim().is_empty() {
            return Err(HelpdeskError::InvalidState("ticket title must not be empty".into()));
        }
        let _guard = self.locks.lock(company_id).await;
        self.require_company(company_id).await?;

        let pool = self.store.get_helper_pool(company_id).await?;
        let assigned_helper = assign_least_busy_helper(&pool).map(|h| h.helper_id.clone());

        let ticket = Ticket {
            ticket_id: new.ticket_id.unwrap_or_else(TicketId::generate),
            client_id: new.client_id,
            chat_id: new.chat_id,
            assigned_helper,
            priority: new.priority,
            status: TicketStatus::Open,
            title: new.title,
            description: new.description,
            created_at: Utc::now(),
        };
        // Insert, helper push and chat link commit together.
        self.store.create_ticket_record(company_id, &ticket).await?;

        match &ticket.assigned_helper {
            Some(helper_id) => info!(
                company_id = %company_id,
                ticket_id = %ticket.ticket_id,
                helper_id = %helper_id,
                "Ticket assigned"
            ),
            None => warn!(
                company_id = %company_id,
                ticket_id = %ticket.ticket_id,
                "No helpers available, ticket left unassigned"
            ),
        }
        Ok(ticket)
    }

    pub async fn get_ticket(&self, company_id: &CompanyId, ticket_id: &TicketId) -> Result<Ticket> {
        self.store
            .get_ticket(company_id, ticket_id)
            .await?
            .ok_or_else(|| HelpdeskError::not_found("ticket", ticket_id.as_str()))
    }

    pub async fn list_tickets(&self, company_id: &CompanyId, filter: &TicketFilter) -> Result<Vec<Ticket>> {
        self.require_company(company_id).await?;
        let tickets = self.store.list_tickets(company_id).await?;
        Ok(tickets.into_iter().filter(|t| filter.matches(t)).collect())
    }

    pub async fn update_ticket(
        &self,
        company_id: &CompanyId,
        ticket_id: &TicketId,
        update: TicketUpdate,
    ) -> Result<Ticket> {
        let _guard = self.locks.lock(company_id).await;
        let mut ticket = self.get_ticket(company_id, ticket_id).await?;
        let previous_helper = ticket.assigned_helper.clone();

        if let Some(title) = update.title {
            if title.trim().is_empty() {
                return Err(HelpdeskError::InvalidState("ticket title must not be empty".into()));
            }
            ticket.title = title;
        }
        if let Some(description) = update.description {
            ticket.description = description;
        }
        if let Some(priority) = update.priority {
            ticket.priority = priority;
        }
        if let Some(status) = update.status {
            ticket.status = status;
        }

        let moved_to = match update.assigned_helper {
            Some(helper_id) if previous_helper.as_ref() != Some(&helper_id) => {
                ticket.assigned_helper = Some(helper_id.clone());
                Some(helper_id)
            }
            _ => None,
        };

        // The store moves the id between helper lists in the same write and
        // rejects an unknown helper without touching the ticket.
        self.store.update_ticket(company_id, &ticket).await?;
        if let Some(new_helper) = &moved_to {
            info!(
                company_id = %company_id,
                ticket_id = %ticket.ticket_id,
                helper_id = %new_helper,
                "Ticket reassigned"
            );
        }
        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use helpdesk_core::types::{ChatSession, Company};
    use helpdesk_storage::{Database, SqliteChatStore};

    async fn setup(helpers: &[&str]) -> (TicketRouter, Arc<dyn ChatStore>, CompanyId) {
        let (router, store, acme, _db) = setup_with_db(helpers).await;
        (router, store, acme)
    }

    async fn setup_with_db(
        helpers: &[&str],
    ) -> (TicketRouter, Arc<dyn ChatStore>, CompanyId, Arc<Database>) {
        let db = Arc::new(Database::in_memory().unwrap());
        let store: Arc<dyn ChatStore> = Arc::new(SqliteChatStore::new(Arc::clone(&db)));
        let acme = CompanyId::from("acme");
        store
            .create_company(&Company {
                company_id: acme.clone(),
                name: "Acme".to_string(),
                description: None,
                admin_id: "root".to_string(),
                knowledge_base: serde_json::Value::Null,
                faq: BTreeMap::new(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let router = TicketRouter::new(Arc::clone(&store));
        for id in helpers {
            router.register_helper(&acme, HelperId::from(*id), None).await.unwrap();
        }
        (router, store, acme, db)
    }

    fn exec(db: &Database, sql: &str) {
        db.with_conn(|conn| {
            conn.execute_batch(sql)
                .map_err(|e| HelpdeskError::Persistence(e.to_string()))
        })
        .unwrap();
    }

    fn with_id(title: &str, id: &str) -> NewTicket {
        let mut request = new_ticket(title);
        request.ticket_id = Some(TicketId::from(id));
        request
    }

    fn new_ticket(title: &str) -> NewTicket {
        NewTicket {
            ticket_id: None,
            client_id: ClientId::from("alice"),
            chat_id: ChatId::from("chat-1"),
            priority: Priority::Medium,
            title: title.to_string(),
            description: String::new(),
        }
    }

    fn loads(pool: &[Helper]) -> Vec<(String, usize)> {
        pool.iter()
            .map(|h| (h.helper_id.to_string(), h.load()))
            .collect()
    }

    // =========================================================================
    // Creation
    // =========================================================================

    #[tokio::test]
    async fn test_three_tickets_over_two_helpers() {
        let (router, _store, acme) = setup(&["h1", "h2"]).await;
        for title in ["a", "b", "c"] {
            router.create_ticket(&acme, new_ticket(title)).await.unwrap();
        }
        let pool = router.list_helpers(&acme).await.unwrap();
        assert_eq!(
            loads(&pool),
            vec![("h1".to_string(), 2), ("h2".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_concurrent_creation_stays_balanced() {
        let (router, _store, acme) = setup(&["h1", "h2"]).await;
        let router = Arc::new(router);
        let mut handles = Vec::new();
        for i in 0..6 {
            let router = Arc::clone(&router);
            let acme = acme.clone();
            handles.push(tokio::spawn(async move {
                router.create_ticket(&acme, new_ticket(&format!("t{}", i))).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let pool = router.list_helpers(&acme).await.unwrap();
        assert!(pool.iter().all(|h| h.load() == 3));
    }

    #[tokio::test]
    async fn test_ticket_records_helper_and_id() {
        let (router, _store, acme) = setup(&["h1"]).await;
        let mut request = new_ticket("Parcel lost");
        request.ticket_id = Some(TicketId::from("T-100"));
        let ticket = router.create_ticket(&acme, request).await.unwrap();
        assert_eq!(ticket.ticket_id.as_str(), "T-100");
        assert_eq!(ticket.assigned_helper, Some(HelperId::from("h1")));
        assert_eq!(ticket.status, TicketStatus::Open);

        let stored = router.get_ticket(&acme, &TicketId::from("T-100")).await.unwrap();
        assert_eq!(stored.title, "Parcel lost");
        assert_eq!(stored.assigned_helper, ticket.assigned_helper);
        let pool = router.list_helpers(&acme).await.unwrap();
        assert_eq!(pool[0].assigned_ticket_ids, vec![TicketId::from("T-100")]);
    }

    #[tokio::test]
    async fn test_duplicate_ticket_id_conflicts_without_assignment() {
        let (router, _store, acme) = setup(&["h1"]).await;
        let mut request = new_ticket("first");
        request.ticket_id = Some(TicketId::from("T-1"));
        router.create_ticket(&acme, request.clone()).await.unwrap();
        let result = router.create_ticket(&acme, request).await;
        assert!(matches!(result, Err(HelpdeskError::Conflict(_))));
        let pool = router.list_helpers(&acme).await.unwrap();
        assert_eq!(pool[0].load(), 1);
    }

    #[tokio::test]
    async fn test_no_helpers_leaves_ticket_unassigned() {
        let (router, _store, acme) = setup(&[]).await;
        let ticket = router.create_ticket(&acme, new_ticket("orphan")).await.unwrap();
        assert!(ticket.assigned_helper.is_none());
        assert_eq!(router.least_busy_helper(&acme).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_company_is_not_found() {
        let (router, _store, _acme) = setup(&[]).await;
        let result = router
            .create_ticket(&CompanyId::from("ghost"), new_ticket("x"))
            .await;
        assert!(matches!(result, Err(HelpdeskError::NotFound { kind: "company", .. })));
    }

    #[tokio::test]
    async fn test_ticket_is_linked_to_existing_chat() {
        let (router, store, acme) = setup(&["h1"]).await;
        store.register_client(&acme, &ClientId::from("alice")).await.unwrap();
        let chat = ChatSession::new(acme.clone(), ClientId::from("alice"));
        store.create_chat(&chat).await.unwrap();

        let mut request = new_ticket("Refund");
        request.chat_id = chat.chat_id.clone();
        let ticket = router.create_ticket(&acme, request).await.unwrap();

        let chat = store.get_chat(&acme, &chat.chat_id).await.unwrap().unwrap();
        assert_eq!(chat.ticket_id, Some(ticket.ticket_id));
    }

    #[tokio::test]
    async fn test_failed_helper_push_leaves_no_ticket() {
        let (router, _store, acme, db) = setup_with_db(&["h1"]).await;
        exec(
            &db,
            "CREATE TRIGGER block_push BEFORE INSERT ON helper_tickets
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        );

        let result = router.create_ticket(&acme, with_id("Refund", "T-1")).await;
        assert!(matches!(result, Err(HelpdeskError::Persistence(_))));
        let lookup = router.get_ticket(&acme, &TicketId::from("T-1")).await;
        assert!(matches!(lookup, Err(HelpdeskError::NotFound { kind: "ticket", .. })));
        assert_eq!(router.list_helpers(&acme).await.unwrap()[0].load(), 0);

        exec(&db, "DROP TRIGGER block_push;");
        let ticket = router.create_ticket(&acme, with_id("Refund", "T-1")).await.unwrap();
        assert_eq!(ticket.assigned_helper, Some(HelperId::from("h1")));
        let pool = router.list_helpers(&acme).await.unwrap();
        assert_eq!(pool[0].assigned_ticket_ids, vec![TicketId::from("T-1")]);
    }

    #[tokio::test]
    async fn test_failed_chat_link_leaves_no_ticket() {
        let (router, store, acme, db) = setup_with_db(&["h1"]).await;
        store.register_client(&acme, &ClientId::from("alice")).await.unwrap();
        let chat = ChatSession::new(acme.clone(), ClientId::from("alice"));
        store.create_chat(&chat).await.unwrap();
        exec(
            &db,
            "CREATE TRIGGER block_link BEFORE UPDATE OF ticket_id ON chats
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        );

        let mut request = with_id("Refund", "T-1");
        request.chat_id = chat.chat_id.clone();
        let result = router.create_ticket(&acme, request.clone()).await;
        assert!(matches!(result, Err(HelpdeskError::Persistence(_))));
        assert!(store.get_ticket(&acme, &TicketId::from("T-1")).await.unwrap().is_none());
        assert_eq!(router.list_helpers(&acme).await.unwrap()[0].load(), 0);

        exec(&db, "DROP TRIGGER block_link;");
        router.create_ticket(&acme, request).await.unwrap();
        let chat = store.get_chat(&acme, &chat.chat_id).await.unwrap().unwrap();
        assert_eq!(chat.ticket_id, Some(TicketId::from("T-1")));
    }

    #[tokio::test]
    async fn test_duplicate_helper_conflicts() {
        let (router, _store, acme) = setup(&["h1"]).await;
        let result = router.register_helper(&acme, HelperId::from("h1"), Some(4.5)).await;
        assert!(matches!(result, Err(HelpdeskError::Conflict(_))));
        assert_eq!(router.list_helpers(&acme).await.unwrap().len(), 1);
    }

    // =========================================================================
    // Helper deletion
    // =========================================================================

    #[tokio::test]
    async fn test_delete_helper_reassigns_open_tickets() {
        let (router, _store, acme) = setup(&["h1", "h2", "h3"]).await;
        // h1: a, d   h2: b   h3: c
        for title in ["a", "b", "c", "d"] {
            router.create_ticket(&acme, new_ticket(title)).await.unwrap();
        }

        let removal = router.delete_helper(&acme, &HelperId::from("h1")).await.unwrap();
        assert_eq!(removal.reassigned.len(), 2);
        assert!(removal.released.is_empty());
        let targets: Vec<Option<HelperId>> = removal
            .reassigned
            .iter()
            .map(|r| r.assigned_helper.clone())
            .collect();
        assert_eq!(
            targets,
            vec![Some(HelperId::from("h2")), Some(HelperId::from("h3"))]
        );

        let pool = router.list_helpers(&acme).await.unwrap();
        assert_eq!(
            loads(&pool),
            vec![("h2".to_string(), 2), ("h3".to_string(), 2)]
        );
        for r in &removal.reassigned {
            let ticket = router.get_ticket(&acme, &r.ticket_id).await.unwrap();
            assert_eq!(ticket.assigned_helper, r.assigned_helper);
        }
    }

    #[tokio::test]
    async fn test_delete_last_helper_unassigns() {
        let (router, _store, acme) = setup(&["h1"]).await;
        let ticket = router.create_ticket(&acme, new_ticket("a")).await.unwrap();
        let removal = router.delete_helper(&acme, &HelperId::from("h1")).await.unwrap();
        assert_eq!(
            removal.reassigned,
            vec![Reassignment {
                ticket_id: ticket.ticket_id.clone(),
                assigned_helper: None
            }]
        );
        let stored = router.get_ticket(&acme, &ticket.ticket_id).await.unwrap();
        assert!(stored.assigned_helper.is_none());
    }

    #[tokio::test]
    async fn test_delete_helper_releases_closed_tickets() {
        let (router, _store, acme) = setup(&["h1", "h2"]).await;
        let closed = router.create_ticket(&acme, new_ticket("done")).await.unwrap();
        router
            .update_ticket(
                &acme,
                &closed.ticket_id,
                TicketUpdate {
                    status: Some(TicketStatus::Closed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let removal = router.delete_helper(&acme, &HelperId::from("h1")).await.unwrap();
        assert!(removal.reassigned.is_empty());
        assert_eq!(removal.released, vec![closed.ticket_id.clone()]);
        let pool = router.list_helpers(&acme).await.unwrap();
        assert_eq!(pool[0].load(), 0);
    }

    #[tokio::test]
    async fn test_delete_unknown_helper_is_not_found() {
        let (router, _store, acme) = setup(&["h1"]).await;
        let result = router.delete_helper(&acme, &HelperId::from("nobody")).await;
        assert!(matches!(result, Err(HelpdeskError::NotFound { kind: "helper", .. })));
    }

    #[tokio::test]
    async fn test_failed_reassignment_keeps_helper_and_tickets() {
        let (router, _store, acme, db) = setup_with_db(&["h1"]).await;
        router.create_ticket(&acme, with_id("a", "t1")).await.unwrap();
        router.create_ticket(&acme, with_id("b", "t2")).await.unwrap();
        router.register_helper(&acme, HelperId::from("h2"), None).await.unwrap();
        exec(
            &db,
            "CREATE TRIGGER block_t2 BEFORE UPDATE ON tickets WHEN OLD.ticket_id = 't2'
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        );

        let result = router.delete_helper(&acme, &HelperId::from("h1")).await;
        assert!(matches!(result, Err(HelpdeskError::Persistence(_))));

        let pool = router.list_helpers(&acme).await.unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool[0].helper_id, HelperId::from("h1"));
        assert_eq!(
            pool[0].assigned_ticket_ids,
            vec![TicketId::from("t1"), TicketId::from("t2")]
        );
        assert!(pool[1].assigned_ticket_ids.is_empty());
        for id in ["t1", "t2"] {
            let ticket = router.get_ticket(&acme, &TicketId::from(id)).await.unwrap();
            assert_eq!(ticket.assigned_helper, Some(HelperId::from("h1")));
        }

        exec(&db, "DROP TRIGGER block_t2;");
        let removal = router.delete_helper(&acme, &HelperId::from("h1")).await.unwrap();
        assert_eq!(removal.reassigned.len(), 2);
        let pool = router.list_helpers(&acme).await.unwrap();
        assert_eq!(
            loads(&pool),
            vec![("h2".to_string(), 2)]
        );
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    #[tokio::test]
    async fn test_manual_reassignment_moves_ticket() {
        let (router, _store, acme) = setup(&["h1", "h2"]).await;
        let ticket = router.create_ticket(&acme, new_ticket("a")).await.unwrap();
        assert_eq!(ticket.assigned_helper, Some(HelperId::from("h1")));

        let updated = router
            .update_ticket(
                &acme,
                &ticket.ticket_id,
                TicketUpdate {
                    assigned_helper: Some(HelperId::from("h2")),
                    priority: Some(Priority::High),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.assigned_helper, Some(HelperId::from("h2")));
        assert_eq!(updated.priority, Priority::High);

        let pool = router.list_helpers(&acme).await.unwrap();
        assert_eq!(loads(&pool), vec![("h1".to_string(), 0), ("h2".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_reassign_to_unknown_helper_fails_cleanly() {
        let (router, _store, acme) = setup(&["h1"]).await;
        let ticket = router.create_ticket(&acme, new_ticket("a")).await.unwrap();
        let result = router
            .update_ticket(
                &acme,
                &ticket.ticket_id,
                TicketUpdate {
                    assigned_helper: Some(HelperId::from("ghost")),
                    title: Some("renamed".into()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(HelpdeskError::NotFound { kind: "helper", .. })));
        let stored = router.get_ticket(&acme, &ticket.ticket_id).await.unwrap();
        assert_eq!(stored.title, "a");
    }

    #[tokio::test]
    async fn test_list_tickets_filters() {
        let (router, _store, acme) = setup(&["h1", "h2"]).await;
        router.create_ticket(&acme, new_ticket("a")).await.unwrap();
        let mut bobs = new_ticket("b");
        bobs.client_id = ClientId::from("bob");
        router.create_ticket(&acme, bobs).await.unwrap();

        assert_eq!(router.list_tickets(&acme, &TicketFilter::All).await.unwrap().len(), 2);
        let for_bob = router
            .list_tickets(&acme, &TicketFilter::Client(ClientId::from("bob")))
            .await
            .unwrap();
        assert_eq!(for_bob.len(), 1);
        assert_eq!(for_bob[0].title, "b");
        let for_h1 = router
            .list_tickets(&acme, &TicketFilter::Helper(HelperId::from("h1")))
            .await
            .unwrap();
        assert_eq!(for_h1.len(), 1);
        assert_eq!(for_h1[0].title, "a");
    }

    #[tokio::test]
    async fn test_get_unknown_ticket_is_not_found() {
        let (router, _store, acme) = setup(&[]).await;
        let result = router.get_ticket(&acme, &TicketId::from("nope")).await;
        assert!(matches!(result, Err(HelpdeskError::NotFound { kind: "ticket", .. })));
    }
}
