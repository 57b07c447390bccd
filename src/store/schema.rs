//! Mail store schema for the libSQL backend, created if missing.
//!
//! Text columns matched by rules have a `*_folded` twin holding the value
//! passed through [`crate::rules::fold`]. Filters compare against the twins
//! so SQL matching folds case exactly like in-memory matching does.

use libsql::Connection;

use crate::error::DatabaseError;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS emails (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        message_id TEXT NOT NULL UNIQUE,
        sender TEXT NOT NULL DEFAULT '',
        recipient TEXT NOT NULL DEFAULT '',
        subject TEXT NOT NULL DEFAULT '',
        sender_folded TEXT NOT NULL DEFAULT '',
        recipient_folded TEXT NOT NULL DEFAULT '',
        subject_folded TEXT NOT NULL DEFAULT '',
        received_at INTEGER NOT NULL,
        stored_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_emails_sender_folded ON emails(sender_folded);
    CREATE INDEX IF NOT EXISTS idx_emails_subject_folded ON emails(subject_folded);
    CREATE INDEX IF NOT EXISTS idx_emails_received_at ON emails(received_at);
"#;

/// Create the `emails` table and its indexes if they do not exist yet.
pub async fn ensure_schema(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(SCHEMA)
        .await
        .map_err(|e| DatabaseError::Schema(format!("Failed to create schema: {e}")))?;
    tracing::debug!("Mail store schema ready");
    Ok(())
}
