//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path/query/body via axum extractors, calls one
//! service operation on AppState, and returns the result as JSON.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use helpdesk_core::types::{
    ChatId, ChatMode, ChatSession, ClientId, Company, CompanyId, Helper, HelperId, Sender, Ticket,
    TicketId,
};
use helpdesk_engine::Transcript;
use helpdesk_session::{AssistReply, AssistSession, MessageReply, ModeChange, NewCompany};
use helpdesk_tickets::{HelperRemoval, NewTicket, TicketFilter, TicketUpdate};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterClientRequest {
    pub client_id: ClientId,
}

#[derive(Debug, Deserialize)]
pub struct RegisterHelperRequest {
    pub helper_id: HelperId,
    #[serde(default)]
    pub performance_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub client_id: ClientId,
}

/// Mode is taken as text so an unknown value is reported as a bad request
/// rather than a body decoding failure.
#[derive(Debug, Deserialize)]
pub struct SetModeRequest {
    pub mode: String,
}

fn default_sender() -> Sender {
    Sender::Client
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    #[serde(default = "default_sender")]
    pub sender: Sender,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AttachFileRequest {
    pub file_ref: String,
}

#[derive(Debug, Deserialize)]
pub struct AssistQueryRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct TicketListParams {
    pub client_id: Option<ClientId>,
    pub helper_id: Option<HelperId>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Bots currently held in the session registry.
    pub live_sessions: usize,
    pub assist_sessions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CompanyListResponse {
    pub companies: Vec<Company>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttachFileResponse {
    pub file_ref: String,
    /// False when the chat already carried this reference.
    pub added: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HelperListResponse {
    pub helpers: Vec<Helper>,
    pub least_busy: Option<HelperId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketListResponse {
    pub tickets: Vec<Ticket>,
    pub total: usize,
}

// =============================================================================
// Health
// =============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        live_sessions: state.chats.registry().len(),
        assist_sessions: state.assist.len(),
    })
}

// =============================================================================
// Companies and clients
// =============================================================================

/// POST /companies
pub async fn create_company(
    State(state): State<AppState>,
    Json(body): Json<NewCompany>,
) -> Result<(StatusCode, Json<Company>), ApiError> {
    let company = state.directory.create_company(body).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

/// GET /companies
pub async fn list_companies(
    State(state): State<AppState>,
) -> Result<Json<CompanyListResponse>, ApiError> {
    let companies = state.directory.list_companies().await?;
    Ok(Json(CompanyListResponse {
        total: companies.len(),
        companies,
    }))
}

/// DELETE /companies/{company_id}
pub async fn delete_company(
    State(state): State<AppState>,
    Path(company_id): Path<CompanyId>,
) -> Result<StatusCode, ApiError> {
    state.directory.delete_company(&company_id).await?;
    state.assist.close_company(&company_id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /companies/{company_id}
pub async fn get_company(
    State(state): State<AppState>,
    Path(company_id): Path<CompanyId>,
) -> Result<Json<Company>, ApiError> {
    Ok(Json(state.directory.get_company(&company_id).await?))
}

/// PUT /companies/{company_id}/knowledge-base
pub async fn update_knowledge_base(
    State(state): State<AppState>,
    Path(company_id): Path<CompanyId>,
    Json(knowledge_base): Json<serde_json::Value>,
) -> Result<Json<Company>, ApiError> {
    let company = state
        .directory
        .update_knowledge_base(&company_id, knowledge_base)
        .await?;
    Ok(Json(company))
}

/// POST /companies/{company_id}/clients
pub async fn register_client(
    State(state): State<AppState>,
    Path(company_id): Path<CompanyId>,
    Json(body): Json<RegisterClientRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .directory
        .register_client(&company_id, &body.client_id)
        .await?;
    Ok(StatusCode::CREATED)
}

// =============================================================================
// Helpers
// =============================================================================

/// POST /companies/{company_id}/helpers
pub async fn register_helper(
    State(state): State<AppState>,
    Path(company_id): Path<CompanyId>,
    Json(body): Json<RegisterHelperRequest>,
) -> Result<(StatusCode, Json<Helper>), ApiError> {
    let helper = state
        .tickets
        .register_helper(&company_id, body.helper_id, body.performance_score)
        .await?;
    Ok((StatusCode::CREATED, Json(helper)))
}

/// GET /companies/{company_id}/helpers
pub async fn list_helpers(
    State(state): State<AppState>,
    Path(company_id): Path<CompanyId>,
) -> Result<Json<HelperListResponse>, ApiError> {
    let helpers = state.tickets.list_helpers(&company_id).await?;
    let least_busy = helpdesk_tickets::assign_least_busy_helper(&helpers).map(|h| h.helper_id.clone());
    Ok(Json(HelperListResponse {
        helpers,
        least_busy,
    }))
}

/// DELETE /companies/{company_id}/helpers/{helper_id}
pub async fn delete_helper(
    State(state): State<AppState>,
    Path((company_id, helper_id)): Path<(CompanyId, HelperId)>,
) -> Result<Json<HelperRemoval>, ApiError> {
    Ok(Json(state.tickets.delete_helper(&company_id, &helper_id).await?))
}

// =============================================================================
// Agent assist
// =============================================================================

/// POST /companies/{company_id}/helpers/{helper_id}/assist
pub async fn open_assist(
    State(state): State<AppState>,
    Path((company_id, helper_id)): Path<(CompanyId, HelperId)>,
) -> Result<(StatusCode, Json<AssistSession>), ApiError> {
    let session = state.assist.open(&company_id, &helper_id).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /companies/{company_id}/helpers/{helper_id}/assist/{session_id}/messages
pub async fn ask_assist(
    State(state): State<AppState>,
    Path((company_id, helper_id, session_id)): Path<(CompanyId, HelperId, ChatId)>,
    Json(body): Json<AssistQueryRequest>,
) -> Result<Json<AssistReply>, ApiError> {
    let reply = state
        .assist
        .ask(&company_id, &helper_id, &session_id, &body.query)
        .await?;
    Ok(Json(reply))
}

/// DELETE /companies/{company_id}/helpers/{helper_id}/assist/{session_id}
pub async fn close_assist(
    State(state): State<AppState>,
    Path((company_id, helper_id, session_id)): Path<(CompanyId, HelperId, ChatId)>,
) -> Result<Json<Transcript>, ApiError> {
    let transcript = state
        .assist
        .close(&company_id, &helper_id, &session_id)
        .await?;
    Ok(Json(transcript))
}

// =============================================================================
// Chats
// =============================================================================

/// POST /companies/{company_id}/chats
pub async fn create_chat(
    State(state): State<AppState>,
    Path(company_id): Path<CompanyId>,
    Json(body): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<ChatSession>), ApiError> {
    let chat = state.chats.create_chat(&company_id, &body.client_id).await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

/// GET /companies/{company_id}/chats/{chat_id}
pub async fn get_chat(
    State(state): State<AppState>,
    Path((company_id, chat_id)): Path<(CompanyId, ChatId)>,
) -> Result<Json<ChatSession>, ApiError> {
    Ok(Json(state.chats.get_chat(&company_id, &chat_id).await?))
}

/// PUT /companies/{company_id}/chats/{chat_id}/mode
pub async fn set_mode(
    State(state): State<AppState>,
    Path((company_id, chat_id)): Path<(CompanyId, ChatId)>,
    Json(body): Json<SetModeRequest>,
) -> Result<Json<ModeChange>, ApiError> {
    let target: ChatMode = body.mode.parse()?;
    Ok(Json(state.chats.set_mode(&company_id, &chat_id, target).await?))
}

/// POST /companies/{company_id}/chats/{chat_id}/messages
pub async fn post_message(
    State(state): State<AppState>,
    Path((company_id, chat_id)): Path<(CompanyId, ChatId)>,
    Json(body): Json<PostMessageRequest>,
) -> Result<Json<MessageReply>, ApiError> {
    let reply = state
        .chats
        .post_message(&company_id, &chat_id, body.sender, &body.message)
        .await?;
    Ok(Json(reply))
}

/// POST /companies/{company_id}/chats/{chat_id}/files
pub async fn attach_file(
    State(state): State<AppState>,
    Path((company_id, chat_id)): Path<(CompanyId, ChatId)>,
    Json(body): Json<AttachFileRequest>,
) -> Result<Json<AttachFileResponse>, ApiError> {
    let added = state
        .chats
        .attach_file(&company_id, &chat_id, &body.file_ref)
        .await?;
    Ok(Json(AttachFileResponse {
        file_ref: body.file_ref,
        added,
    }))
}

// =============================================================================
// Tickets
// =============================================================================

/// POST /companies/{company_id}/tickets
pub async fn create_ticket(
    State(state): State<AppState>,
    Path(company_id): Path<CompanyId>,
    Json(body): Json<NewTicket>,
) -> Result<(StatusCode, Json<Ticket>), ApiError> {
    let ticket = state.tickets.create_ticket(&company_id, body).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// GET /companies/{company_id}/tickets?client_id=..&helper_id=..
pub async fn list_tickets(
    State(state): State<AppState>,
    Path(company_id): Path<CompanyId>,
    Query(params): Query<TicketListParams>,
) -> Result<Json<TicketListResponse>, ApiError> {
    let filter = match (params.client_id, params.helper_id) {
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "filter by client_id or helper_id, not both".to_string(),
            ))
        }
        (Some(client), None) => TicketFilter::Client(client),
        (None, Some(helper)) => TicketFilter::Helper(helper),
        (None, None) => TicketFilter::All,
    };
    let tickets = state.tickets.list_tickets(&company_id, &filter).await?;
    Ok(Json(TicketListResponse {
        total: tickets.len(),
        tickets,
    }))
}

/// GET /companies/{company_id}/tickets/{ticket_id}
pub async fn get_ticket(
    State(state): State<AppState>,
    Path((company_id, ticket_id)): Path<(CompanyId, TicketId)>,
) -> Result<Json<Ticket>, ApiError> {
    Ok(Json(state.tickets.get_ticket(&company_id, &ticket_id).await?))
}

/// PUT /companies/{company_id}/tickets/{ticket_id}
pub async fn update_ticket(
    State(state): State<AppState>,
    Path((company_id, ticket_id)): Path<(CompanyId, TicketId)>,
    Json(body): Json<TicketUpdate>,
) -> Result<Json<Ticket>, ApiError> {
    let ticket = state
        .tickets
        .update_ticket(&company_id, &ticket_id, body)
        .await?;
    Ok(Json(ticket))
}
