//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use helpdesk_core::config::HelpdeskConfig;
use helpdesk_engine::{RetrievalEngine, Summarizer};
use helpdesk_session::{AgentAssistService, ChatService, Directory, SessionRegistry, SessionSettings};
use helpdesk_storage::ChatStore;
use helpdesk_tickets::TicketRouter;

/// Shared application state.
///
/// Every field is cheap to clone; the services hold their own `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<HelpdeskConfig>,
    pub chats: ChatService,
    pub directory: Directory,
    pub tickets: Arc<TicketRouter>,
    pub assist: AgentAssistService,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Wire the services over one store and the configured collaborators.
    pub fn new(
        config: HelpdeskConfig,
        store: Arc<dyn ChatStore>,
        engine: Arc<dyn RetrievalEngine>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        let settings = SessionSettings::from_config(&config);
        let registry = Arc::new(SessionRegistry::new());
        let assist = AgentAssistService::new(Arc::clone(&store), Arc::clone(&engine), settings.clone());
        let chats = ChatService::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            engine,
            summarizer,
            settings,
        );
        Self {
            config: Arc::new(config),
            chats,
            directory: Directory::new(Arc::clone(&store), registry),
            tickets: Arc::new(TicketRouter::new(store)),
            assist,
            start_time: Instant::now(),
        }
    }
}
