//! `MailStore` trait, the queryable snapshot of the mailbox.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::DatabaseError;
use crate::rules::{EmailRecord, RuleFilter};

/// Lazy, single-pass stream of query results.
pub type RecordStream = BoxStream<'static, Result<EmailRecord, DatabaseError>>;

/// Backend-agnostic mail store.
///
/// `query` receives the compiled filter and is expected to push matching
/// down into the backend rather than have callers scan every record.
#[async_trait]
pub trait MailStore: Send + Sync {
    /// Create tables and indexes if they do not exist yet.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Stream every record matching `filter`, oldest first.
    async fn query(&self, filter: &RuleFilter) -> Result<RecordStream, DatabaseError>;

    /// Insert records, skipping message ids that are already stored.
    /// Returns the number of rows actually written.
    async fn insert_batch(&self, records: &[EmailRecord]) -> Result<usize, DatabaseError>;

    /// Delete every record. Returns the number removed.
    async fn clear(&self) -> Result<usize, DatabaseError>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize, DatabaseError>;
}
