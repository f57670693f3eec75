//! Router setup with all API routes and middleware.

use axum::http::{header, Method};
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use helpdesk_core::config::HelpdeskConfig;
use helpdesk_core::error::HelpdeskError;

use crate::handlers;
use crate::state::AppState;

/// Create the axum Router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let company_routes = Router::new()
        .route(
            "/companies",
            post(handlers::create_company).get(handlers::list_companies),
        )
        .route(
            "/companies/{company_id}",
            get(handlers::get_company).delete(handlers::delete_company),
        )
        .route(
            "/companies/{company_id}/knowledge-base",
            put(handlers::update_knowledge_base),
        )
        .route(
            "/companies/{company_id}/clients",
            post(handlers::register_client),
        )
        .route(
            "/companies/{company_id}/helpers",
            post(handlers::register_helper).get(handlers::list_helpers),
        )
        .route(
            "/companies/{company_id}/helpers/{helper_id}",
            delete(handlers::delete_helper),
        );

    let assist_routes = Router::new()
        .route(
            "/companies/{company_id}/helpers/{helper_id}/assist",
            post(handlers::open_assist),
        )
        .route(
            "/companies/{company_id}/helpers/{helper_id}/assist/{session_id}",
            delete(handlers::close_assist),
        )
        .route(
            "/companies/{company_id}/helpers/{helper_id}/assist/{session_id}/messages",
            post(handlers::ask_assist),
        );

    let chat_routes = Router::new()
        .route("/companies/{company_id}/chats", post(handlers::create_chat))
        .route(
            "/companies/{company_id}/chats/{chat_id}",
            get(handlers::get_chat),
        )
        .route(
            "/companies/{company_id}/chats/{chat_id}/mode",
            put(handlers::set_mode),
        )
        .route(
            "/companies/{company_id}/chats/{chat_id}/messages",
            post(handlers::post_message),
        )
        .route(
            "/companies/{company_id}/chats/{chat_id}/files",
            post(handlers::attach_file),
        );

    let ticket_routes = Router::new()
        .route(
            "/companies/{company_id}/tickets",
            post(handlers::create_ticket).get(handlers::list_tickets),
        )
        .route(
            "/companies/{company_id}/tickets/{ticket_id}",
            get(handlers::get_ticket).put(handlers::update_ticket),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .merge(company_routes)
        .merge(assist_routes)
        .merge(chat_routes)
        .merge(ticket_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the router on the configured address until `shutdown` resolves.
///
/// In-flight requests are drained before this returns.
pub async fn start_server<F>(
    config: &HelpdeskConfig,
    state: AppState,
    shutdown: F,
) -> Result<(), HelpdeskError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let router = create_router(state);

    tracing::info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| HelpdeskError::Config(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
