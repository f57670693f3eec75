//! Helpdesk storage crate - the Chat Store contract and its SQLite backend.
//!
//! Companies, clients, helpers, chats and tickets live in a WAL-mode SQLite
//! database. Nested updates are field-scoped statements rather than
//! whole-record rewrites.

pub mod db;
pub mod migrations;
pub mod repository;
pub mod store;

pub use db::Database;
pub use repository::SqliteChatStore;
pub use store::ChatStore;
