//! libSQL `MailStore` implementation.
//!
//! Supports local file and in-memory databases. Rule filters are rendered
//! to a parameterised `WHERE` clause so matching happens inside SQLite.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use futures::StreamExt;
use libsql::params::Params;
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::rules::{Comparison, Condition, EmailRecord, Field, RuleFilter, fold};
use crate::store::schema;
use crate::store::traits::{MailStore, RecordStream};

const EMAIL_COLUMNS: &str = "message_id, sender, recipient, subject, received_at";

/// libSQL mail store.
///
/// Stores a single connection that is reused for all operations.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and create the schema if missing.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        info!(path = %path.display(), "Mail store opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Column a filter on `field` compares against. Text fields use their
/// case-folded twin.
fn column(field: Field) -> &'static str {
    match field {
        Field::Sender => "sender_folded",
        Field::Recipient => "recipient_folded",
        Field::Subject => "subject_folded",
        Field::Received => "received_at",
    }
}

/// Render a filter as a SQL boolean expression plus its positional parameters.
///
/// Text needles are folded by the compiler and compared against the folded
/// columns written at insert time. Timestamps are compared as epoch
/// milliseconds.
fn render_filter(filter: &RuleFilter) -> (String, Vec<Value>) {
    let mut values = Vec::with_capacity(filter.predicates.len());
    let clauses: Vec<String> = filter
        .predicates
        .iter()
        .map(|predicate| {
            let col = column(predicate.field);
            let (template, value) = match &predicate.comparison {
                Comparison::Contains(needle) => {
                    ("instr({col}, ?{n}) > 0", Value::Text(needle.clone()))
                }
                Comparison::NotEquals(other) => ("{col} <> ?{n}", Value::Text(other.clone())),
                Comparison::ReceivedAfter(cutoff) => {
                    ("{col} > ?{n}", Value::Integer(cutoff.timestamp_millis()))
                }
                Comparison::ReceivedBefore(cutoff) => {
                    ("{col} < ?{n}", Value::Integer(cutoff.timestamp_millis()))
                }
            };
            values.push(value);
            template
                .replace("{col}", col)
                .replace("{n}", &values.len().to_string())
        })
        .collect();

    let sql = if clauses.is_empty() {
        match filter.condition {
            Condition::All => "1".to_string(),
            Condition::Any => "0".to_string(),
        }
    } else {
        let joiner = match filter.condition {
            Condition::All => " AND ",
            Condition::Any => " OR ",
        };
        clauses
            .iter()
            .map(|c| format!("({c})"))
            .collect::<Vec<_>>()
            .join(joiner)
    };
    (sql, values)
}

/// Map a libsql Row to an EmailRecord. Column order matches EMAIL_COLUMNS.
fn row_to_record(row: &libsql::Row) -> Result<EmailRecord, DatabaseError> {
    let decode = |e: libsql::Error| DatabaseError::Decode(e.to_string());
    let received_ms: i64 = row.get(4).map_err(decode)?;
    let received_at = DateTime::from_timestamp_millis(received_ms).ok_or_else(|| {
        DatabaseError::Decode(format!("received_at out of range: {received_ms}"))
    })?;

    Ok(EmailRecord {
        message_id: row.get(0).map_err(decode)?,
        sender: row.get(1).map_err(decode)?,
        recipient: row.get(2).map_err(decode)?,
        subject: row.get(3).map_err(decode)?,
        received_at,
    })
}

async fn count_rows(conn: &Connection) -> Result<usize, DatabaseError> {
    let mut rows = conn
        .query("SELECT COUNT(*) FROM emails", ())
        .await
        .map_err(|e| DatabaseError::Query(format!("count: {e}")))?;
    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("count: {e}")))?;
    match row {
        Some(row) => {
            let count: i64 = row
                .get(0)
                .map_err(|e| DatabaseError::Decode(e.to_string()))?;
            Ok(count.max(0) as usize)
        }
        None => Ok(0),
    }
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl MailStore for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        schema::ensure_schema(self.conn()).await
    }

    async fn query(&self, filter: &RuleFilter) -> Result<RecordStream, DatabaseError> {
        let (clause, values) = render_filter(filter);
        let sql = format!(
            "SELECT {EMAIL_COLUMNS} FROM emails WHERE {clause} ORDER BY received_at ASC, id ASC"
        );
        debug!(sql = %sql, params = values.len(), "Querying mail store");

        let rows = self
            .conn()
            .query(&sql, Params::Positional(values))
            .await
            .map_err(|e| DatabaseError::Query(format!("query: {e}")))?;

        // Stop after the first error so a broken cursor is not polled again.
        let stream = futures::stream::unfold(Some(rows), |state| async move {
            let mut rows = state?;
            match rows.next().await {
                Ok(Some(row)) => Some((row_to_record(&row), Some(rows))),
                Ok(None) => None,
                Err(e) => Some((Err(DatabaseError::Query(format!("query: {e}"))), None)),
            }
        });
        Ok(stream.boxed())
    }

    async fn insert_batch(&self, records: &[EmailRecord]) -> Result<usize, DatabaseError> {
        if records.is_empty() {
            return Ok(0);
        }

        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_batch: {e}")))?;

        let mut written = 0;
        for record in records {
            written += tx
                .execute(
                    "INSERT OR IGNORE INTO emails
                        (message_id, sender, recipient, subject,
                         sender_folded, recipient_folded, subject_folded, received_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        record.message_id.as_str(),
                        record.sender.as_str(),
                        record.recipient.as_str(),
                        record.subject.as_str(),
                        fold(&record.sender),
                        fold(&record.recipient),
                        fold(&record.subject),
                        record.received_at.timestamp_millis(),
                    ],
                )
                .await
                .map_err(|e| DatabaseError::Query(format!("insert_batch: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_batch commit: {e}")))?;

        debug!(written, batch = records.len(), "Emails written to store");
        Ok(written as usize)
    }

    async fn clear(&self) -> Result<usize, DatabaseError> {
        let removed = self
            .conn()
            .execute("DELETE FROM emails", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("clear: {e}")))?;
        info!(removed, "Mail store cleared");
        Ok(removed as usize)
    }

    async fn count(&self) -> Result<usize, DatabaseError> {
        count_rows(self.conn()).await
    }
}
