//! Helpdesk application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing
//! 3. Open the SQLite store
//! 4. Build the configured retrieval engine and summarizer
//! 5. Serve the axum API until Ctrl-C, then drop every live session

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use helpdesk_api::{routes, AppState};
use helpdesk_core::config::HelpdeskConfig;
use helpdesk_storage::{ChatStore, Database, SqliteChatStore};

use crate::cli::CliArgs;

/// Expand a leading `~` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(rest)
        }
        None => PathBuf::from(path),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        return;
    }
    tracing::info!("Shutdown requested, draining requests");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config is read before tracing so its log level can seed the filter.
    let config_file = args.resolve_config_path();
    let config_exists = config_file.exists();
    let mut config = if config_exists {
        HelpdeskConfig::load(&config_file)?
    } else {
        HelpdeskConfig::default()
    };
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    config.server.port = args.resolve_port(config.server.port);
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(args.resolve_log_filter(&config.general.log_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting helpdesk v{}", env!("CARGO_PKG_VERSION"));
    if config_exists {
        tracing::info!(path = %config_file.display(), "Configuration loaded");
    } else {
        tracing::warn!(path = %config_file.display(), "No configuration file, using defaults");
    }

    // Storage.
    let data_dir = expand_home(&config.general.data_dir);
    let db_path = data_dir.join(&config.storage.db_file);
    let db = Arc::new(Database::new(&db_path)?);
    let store: Arc<dyn ChatStore> = Arc::new(SqliteChatStore::new(db));
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Collaborators.
    let engine = helpdesk_engine::build_engine(&config.engine)?;
    let summarizer = helpdesk_engine::build_summarizer(&config.summarizer)?;
    tracing::info!(
        engine = ?config.engine.backend,
        summarizer = ?config.summarizer.backend,
        "Engine and summarizer ready"
    );

    let state = AppState::new(config.clone(), store, engine, summarizer);
    let chats = state.chats.clone();
    let assist = state.assist.clone();

    if let Err(e) = routes::start_server(&config, state, shutdown_signal()).await {
        tracing::error!(error = %e, "API server stopped with an error");
        return Err(e.into());
    }

    let dropped = chats.shutdown();
    let closed = assist.shutdown();
    tracing::info!(sessions = dropped, assist_sessions = closed, "Session registries cleared, exiting");
    Ok(())
}
