//! Helpdesk API crate - axum HTTP boundary over the chat, directory,
//! assist and ticket services.
//!
//! Transport only: every handler decodes its request, calls the service
//! layer and maps the result (or the error taxonomy) onto HTTP.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
