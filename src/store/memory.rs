//! In-memory `MailStore` that applies compiled filters directly to a `Vec`.
//!
//! Handy for tests and dry runs. Results come back in the same order as
//! the libSQL backend: oldest first, insertion order for ties.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::RwLock;

use crate::error::DatabaseError;
use crate::rules::{EmailRecord, RuleFilter};
use crate::store::traits::{MailStore, RecordStream};

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<EmailRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MailStore for MemoryStore {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn query(&self, filter: &RuleFilter) -> Result<RecordStream, DatabaseError> {
        let mut matched: Vec<EmailRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        // stable sort keeps insertion order for equal timestamps
        matched.sort_by_key(|r| r.received_at);
        Ok(futures::stream::iter(matched.into_iter().map(Ok)).boxed())
    }

    async fn insert_batch(&self, records: &[EmailRecord]) -> Result<usize, DatabaseError> {
        let mut stored = self.records.write().await;
        let mut written = 0;
        for record in records {
            if stored.iter().any(|r| r.message_id == record.message_id) {
                continue;
            }
            stored.push(record.clone());
            written += 1;
        }
        Ok(written)
    }

    async fn clear(&self) -> Result<usize, DatabaseError> {
        let mut stored = self.records.write().await;
        let removed = stored.len();
        stored.clear();
        Ok(removed)
    }

    async fn count(&self) -> Result<usize, DatabaseError> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use futures::TryStreamExt;

    use crate::rules::{Action, Condition, Field, Predicate, Property, Rule, compile_rule};

    fn record(id: &str, sender: &str, age_days: i64) -> EmailRecord {
        EmailRecord {
            message_id: id.into(),
            sender: sender.into(),
            recipient: String::new(),
            subject: "hello".into(),
            received_at: Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap()
                - Duration::days(age_days),
        }
    }

    #[tokio::test]
    async fn query_filters_and_orders_oldest_first() {
        let store = MemoryStore::new();
        store
            .insert_batch(&[
                record("a", "x@one.com", 1),
                record("b", "y@two.com", 5),
                record("c", "z@one.com", 3),
            ])
            .await
            .unwrap();

        let rule = Rule {
            description: None,
            condition: Condition::All,
            properties: vec![Property::new(Field::Sender, Predicate::Contains, "@ONE.com").unwrap()],
            actions: vec![Action::mark_read()],
        };
        let filter = compile_rule(&rule, Utc::now()).unwrap();
        let found: Vec<EmailRecord> = store.query(&filter).await.unwrap().try_collect().await.unwrap();
        let ids: Vec<&str> = found.iter().map(|r| r.message_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn insert_skips_duplicates_and_clear_empties() {
        let store = MemoryStore::new();
        assert_eq!(
            store
                .insert_batch(&[record("a", "x", 1), record("a", "x", 1)])
                .await
                .unwrap(),
            1
        );
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.clear().await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
