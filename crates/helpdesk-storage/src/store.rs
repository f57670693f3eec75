//! The Chat Store contract.
//!
//! Every method is a single field-scoped operation; implementations must make
//! each one atomic. Methods that write `mode`, `ai_history` or `summary` take
//! the chat version the caller last read and fail with
//! [`HelpdeskError::StaleVersion`] if another writer got there first.
//!
//! [`HelpdeskError::StaleVersion`]: helpdesk_core::HelpdeskError::StaleVersion

use async_trait::async_trait;

use helpdesk_core::error::Result;
use helpdesk_core::types::{
    AiTurn, ChatId, ChatMode, ChatSession, ClientId, Company, CompanyId, Helper, HelperId,
    HumanMessage, Ticket, TicketId,
};

#[async_trait]
pub trait ChatStore: Send + Sync {
    // ---- companies ----

    /// Insert a new company. `Conflict` if the id is taken.
    async fn create_company(&self, company: &Company) -> Result<()>;

    async fn get_company(&self, company_id: &CompanyId) -> Result<Option<Company>>;

    /// Overwrite company metadata and knowledge base. `NotFound` if absent.
    async fn save_company(&self, company: &Company) -> Result<()>;

    /// All companies in creation order.
    async fn list_companies(&self) -> Result<Vec<Company>>;

    /// Delete a company together with its clients, helpers, chats and
    /// tickets. Returns the ids of the chats that went with it. `NotFound`
    /// if absent.
    async fn delete_company(&self, company_id: &CompanyId) -> Result<Vec<ChatId>>;

    // ---- clients ----

    /// `NotFound` for an unknown company, `Conflict` for a duplicate client.
    async fn register_client(&self, company_id: &CompanyId, client_id: &ClientId) -> Result<()>;

    async fn client_exists(&self, company_id: &CompanyId, client_id: &ClientId) -> Result<bool>;

    // ---- helpers ----

    /// `NotFound` for an unknown company, `Conflict` for a duplicate helper.
    async fn register_helper(&self, company_id: &CompanyId, helper: &Helper) -> Result<()>;

    /// Helpers in registration order, each with its assigned tickets in
    /// assignment order. Empty for an unknown company.
    async fn get_helper_pool(&self, company_id: &CompanyId) -> Result<Vec<Helper>>;

    /// Delete a helper and write back every ticket it held, each carrying
    /// its new owner (or none), in one transaction. A ticket whose owner
    /// changes is appended to that helper's list. `NotFound` if the helper
    /// or any new owner does not exist, in which case nothing is written.
    async fn remove_helper_and_reassign(
        &self,
        company_id: &CompanyId,
        helper_id: &HelperId,
        tickets: &[Ticket],
    ) -> Result<()>;

    /// Append a ticket id to a helper's assigned list. `NotFound` if the
    /// helper does not exist.
    async fn push_ticket_to_helper(
        &self,
        company_id: &CompanyId,
        helper_id: &HelperId,
        ticket_id: &TicketId,
    ) -> Result<()>;

    // ---- chats ----

    async fn create_chat(&self, chat: &ChatSession) -> Result<()>;

    async fn get_chat(&self, company_id: &CompanyId, chat_id: &ChatId)
        -> Result<Option<ChatSession>>;

    /// Flip the mode. Returns the new version.
    async fn set_chat_mode(
        &self,
        company_id: &CompanyId,
        chat_id: &ChatId,
        mode: ChatMode,
        expected_version: u64,
    ) -> Result<u64>;

    async fn append_human_message(
        &self,
        company_id: &CompanyId,
        chat_id: &ChatId,
        message: &HumanMessage,
    ) -> Result<()>;

    /// Replace the persisted AI history. Returns the new version.
    async fn set_ai_history(
        &self,
        company_id: &CompanyId,
        chat_id: &ChatId,
        turns: &[AiTurn],
        expected_version: u64,
    ) -> Result<u64>;

    /// Persist final AI history and summary and switch to human mode, all in
    /// one atomic write. Returns the new version.
    async fn finalize_handoff(
        &self,
        company_id: &CompanyId,
        chat_id: &ChatId,
        turns: &[AiTurn],
        summary: &str,
        expected_version: u64,
    ) -> Result<u64>;

    /// Add an opaque file reference. Returns `false` if it was already present.
    async fn add_file_to_chat(
        &self,
        company_id: &CompanyId,
        chat_id: &ChatId,
        file_ref: &str,
    ) -> Result<bool>;

    // ---- tickets ----

    /// Insert a ticket, append it to its assigned helper's list and record it
    /// on its chat when that chat exists, all in one transaction. `Conflict`
    /// if the id is taken, `NotFound` if the assigned helper is gone.
    async fn create_ticket_record(&self, company_id: &CompanyId, ticket: &Ticket) -> Result<()>;

    async fn get_ticket(&self, company_id: &CompanyId, ticket_id: &TicketId)
        -> Result<Option<Ticket>>;

    async fn list_tickets(&self, company_id: &CompanyId) -> Result<Vec<Ticket>>;

    /// Overwrite the mutable ticket fields. When `assigned_helper` changes
    /// the ticket id moves from the old helper's list to the new one in the
    /// same transaction. `NotFound` if the ticket or new helper is absent.
    async fn update_ticket(&self, company_id: &CompanyId, ticket: &Ticket) -> Result<()>;
}
