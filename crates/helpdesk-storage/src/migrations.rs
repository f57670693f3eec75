//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use helpdesk_core::error::HelpdeskError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), HelpdeskError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| HelpdeskError::Persistence(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| HelpdeskError::Persistence(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: tenants, people, chats and tickets.
///
/// Child rows carry `company_id` so every lookup is scoped to one tenant.
/// `seq` columns are autoincrement rowids and define pool / history order.
fn apply_v1(conn: &Connection) -> Result<(), HelpdeskError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS companies (
            company_id      TEXT PRIMARY KEY NOT NULL,
            name            TEXT NOT NULL,
            description     TEXT,
            admin_id        TEXT NOT NULL,
            knowledge_base  TEXT NOT NULL DEFAULT 'null',
            faq             TEXT NOT NULL DEFAULT '{}',
            created_at      INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS clients (
            company_id      TEXT NOT NULL REFERENCES companies(company_id) ON DELETE CASCADE,
            client_id       TEXT NOT NULL,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            PRIMARY KEY (company_id, client_id)
        );

        CREATE TABLE IF NOT EXISTS helpers (
            seq                 INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id          TEXT NOT NULL REFERENCES companies(company_id) ON DELETE CASCADE,
            helper_id           TEXT NOT NULL,
            performance_score   REAL NOT NULL DEFAULT 0.0,
            UNIQUE (company_id, helper_id)
        );

        CREATE TABLE IF NOT EXISTS helper_tickets (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id  TEXT NOT NULL,
            helper_id   TEXT NOT NULL,
            ticket_id   TEXT NOT NULL,
            FOREIGN KEY (company_id, helper_id)
                REFERENCES helpers(company_id, helper_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_helper_tickets_helper
            ON helper_tickets (company_id, helper_id, seq);

        CREATE TABLE IF NOT EXISTS chats (
            company_id  TEXT NOT NULL REFERENCES companies(company_id) ON DELETE CASCADE,
            chat_id     TEXT NOT NULL,
            client_id   TEXT NOT NULL,
            mode        TEXT NOT NULL CHECK (mode IN ('ai', 'human')),
            ticket_id   TEXT,
            ai_history  TEXT NOT NULL DEFAULT '[]',
            summary     TEXT,
            version     INTEGER NOT NULL DEFAULT 0,
            created_at  INTEGER NOT NULL,
            PRIMARY KEY (company_id, chat_id)
        );

        CREATE TABLE IF NOT EXISTS human_messages (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id  TEXT NOT NULL,
            chat_id     TEXT NOT NULL,
            sender      TEXT NOT NULL CHECK (sender IN ('client', 'helper')),
            message     TEXT NOT NULL,
            timestamp   INTEGER NOT NULL,
            FOREIGN KEY (company_id, chat_id)
                REFERENCES chats(company_id, chat_id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_human_messages_chat
            ON human_messages (company_id, chat_id, seq);

        CREATE TABLE IF NOT EXISTS chat_files (
            seq         INTEGER PRIMARY KEY AUTOINCREMENT,
            company_id  TEXT NOT NULL,
            chat_id     TEXT NOT NULL,
            file_ref    TEXT NOT NULL,
            UNIQUE (company_id, chat_id, file_ref),
            FOREIGN KEY (company_id, chat_id)
                REFERENCES chats(company_id, chat_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS tickets (
            company_id      TEXT NOT NULL REFERENCES companies(company_id) ON DELETE CASCADE,
            ticket_id       TEXT NOT NULL,
            client_id       TEXT NOT NULL,
            chat_id         TEXT NOT NULL,
            assigned_helper TEXT,
            priority        TEXT NOT NULL CHECK (priority IN ('low', 'medium', 'high')),
            status          TEXT NOT NULL CHECK (status IN ('open', 'closed')),
            title           TEXT NOT NULL,
            description     TEXT NOT NULL DEFAULT '',
            created_at      INTEGER NOT NULL,
            PRIMARY KEY (company_id, ticket_id)
        );

        CREATE INDEX IF NOT EXISTS idx_tickets_helper
            ON tickets (company_id, assigned_helper);

        CREATE INDEX IF NOT EXISTS idx_tickets_client
            ON tickets (company_id, client_id);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| HelpdeskError::Persistence(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_chat_mode_check_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn.execute(
            "INSERT INTO companies (company_id, name, admin_id, created_at) VALUES ('acme', 'Acme', 'root', 0)",
            [],
        )
        .unwrap();
        let bad = conn.execute(
            "INSERT INTO chats (company_id, chat_id, client_id, mode, created_at)
             VALUES ('acme', 'c1', 'alice', 'bot', 0)",
            [],
        );
        assert!(bad.is_err());
    }
}
