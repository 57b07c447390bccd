//! Rule evaluation: hand a compiled filter to the store.

use tracing::debug;

use crate::error::DatabaseError;
use crate::rules::RuleFilter;
use crate::store::{MailStore, RecordStream};

/// Stream every stored record the filter matches, oldest first.
///
/// Matching happens inside the store, so the stream carries only hits.
/// Records are passed through untouched.
pub async fn evaluate(
    filter: &RuleFilter,
    store: &dyn MailStore,
) -> Result<RecordStream, DatabaseError> {
    debug!(
        condition = filter.condition.as_str(),
        predicates = filter.predicates.len(),
        "Querying store"
    );
    store.query(filter).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use futures::TryStreamExt;

    use crate::rules::{
        Action, Condition, EmailRecord, Field, Predicate, Property, Rule, compile_rule,
    };
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn streams_only_matching_records() {
        let now = Utc::now();
        let store = MemoryStore::new();
        store
            .insert_batch(&[
                EmailRecord {
                    message_id: "old".into(),
                    sender: "a@x.com".into(),
                    recipient: String::new(),
                    subject: "s".into(),
                    received_at: now - Duration::days(10),
                },
                EmailRecord {
                    message_id: "new".into(),
                    sender: "a@x.com".into(),
                    recipient: String::new(),
                    subject: "s".into(),
                    received_at: now - Duration::hours(1),
                },
            ])
            .await
            .unwrap();

        let rule = Rule {
            description: None,
            condition: Condition::All,
            properties: vec![
                Property::new(Field::Received, Predicate::GreaterThan, "7days").unwrap(),
            ],
            actions: vec![Action::mark_read()],
        };
        let filter = compile_rule(&rule, now).unwrap();
        let hits: Vec<EmailRecord> = evaluate(&filter, &store)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message_id, "old");
    }
}
