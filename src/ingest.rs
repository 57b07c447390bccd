//! Mailbox ingestion: copy remote message metadata into the local store.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::IngestError;
use crate::rules::EmailRecord;
use crate::service::MailSource;
use crate::store::MailStore;

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    /// Records written per store batch.
    pub batch_size: usize,
    /// Clear a non-empty store first instead of refusing.
    pub replace_existing: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            replace_existing: false,
        }
    }
}

impl From<&EngineConfig> for IngestOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            batch_size: config.fetch_batch,
            replace_existing: config.replace_existing,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Records removed before syncing.
    pub cleared: usize,
    /// Message ids seen in the listing.
    pub listed: usize,
    /// Rows actually written.
    pub stored: usize,
    /// Messages whose metadata could not be fetched.
    pub failed: Vec<String>,
}

/// Walk the whole remote listing and store every message's metadata.
///
/// A failed listing page aborts the sync; a failed single-message fetch is
/// logged, counted and skipped.
pub async fn sync_mailbox(
    source: &dyn MailSource,
    store: &dyn MailStore,
    options: IngestOptions,
) -> Result<IngestReport, IngestError> {
    let mut report = IngestReport::default();
    let batch_size = options.batch_size.max(1);

    let existing = store.count().await?;
    if existing > 0 {
        if !options.replace_existing {
            return Err(IngestError::StoreNotEmpty { count: existing });
        }
        report.cleared = store.clear().await?;
        info!(cleared = report.cleared, "Cleared existing records");
    }

    let mut batch: Vec<EmailRecord> = Vec::with_capacity(batch_size);
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = source.list_messages(page_token.as_deref()).await?;
        pages += 1;
        report.listed += page.message_ids.len();
        debug!(page = pages, messages = page.message_ids.len(), "Fetched listing page");

        for message_id in &page.message_ids {
            match source.fetch_record(message_id).await {
                Ok(record) => batch.push(record),
                Err(e) => {
                    warn!(message_id = %message_id, error = %e, "Failed to fetch message");
                    report.failed.push(message_id.clone());
                    continue;
                }
            }
            if batch.len() >= batch_size {
                report.stored += store.insert_batch(&batch).await?;
                batch.clear();
            }
        }

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    if !batch.is_empty() {
        report.stored += store.insert_batch(&batch).await?;
    }

    info!(
        pages,
        listed = report.listed,
        stored = report.stored,
        failed = report.failed.len(),
        "Mailbox sync complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;

    use crate::error::ServiceError;
    use crate::service::MessagePage;
    use crate::store::MemoryStore;

    /// Pages of ids keyed by page token; ids starting with `bad` fail to fetch.
    struct FakeSource {
        pages: HashMap<Option<String>, MessagePage>,
    }

    impl FakeSource {
        fn new(pages: Vec<Vec<&str>>) -> Self {
            let mut map = HashMap::new();
            let count = pages.len();
            for (i, ids) in pages.into_iter().enumerate() {
                let token = (i > 0).then(|| format!("p{i}"));
                let next = (i + 1 < count).then(|| format!("p{}", i + 1));
                map.insert(
                    token,
                    MessagePage {
                        message_ids: ids.into_iter().map(String::from).collect(),
                        next_page_token: next,
                    },
                );
            }
            Self { pages: map }
        }
    }

    #[async_trait]
    impl MailSource for FakeSource {
        async fn list_messages(
            &self,
            page_token: Option<&str>,
        ) -> Result<MessagePage, ServiceError> {
            self.pages
                .get(&page_token.map(String::from))
                .cloned()
                .ok_or_else(|| ServiceError::Rejected("unknown page".into()))
        }

        async fn fetch_record(&self, message_id: &str) -> Result<EmailRecord, ServiceError> {
            if message_id.starts_with("bad") {
                return Err(ServiceError::NotFound(message_id.into()));
            }
            Ok(EmailRecord {
                message_id: message_id.into(),
                sender: "sender@example.com".into(),
                recipient: "me@example.com".into(),
                subject: format!("subject {message_id}"),
                received_at: Utc::now(),
            })
        }
    }

    #[tokio::test]
    async fn walks_all_pages_and_skips_failures() {
        let source = FakeSource::new(vec![vec!["a", "b", "bad1"], vec!["c"], vec!["d", "e"]]);
        let store = MemoryStore::new();

        let report = sync_mailbox(
            &source,
            &store,
            IngestOptions {
                batch_size: 2,
                replace_existing: false,
            },
        )
        .await
        .unwrap();

        assert_eq!(report.listed, 6);
        assert_eq!(report.stored, 5);
        assert_eq!(report.failed, vec!["bad1".to_string()]);
        assert_eq!(store.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn refuses_non_empty_store_unless_replacing() {
        let source = FakeSource::new(vec![vec!["a"]]);
        let store = MemoryStore::new();
        sync_mailbox(&source, &store, IngestOptions::default())
            .await
            .unwrap();

        let err = sync_mailbox(&source, &store, IngestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::StoreNotEmpty { count: 1 }));

        let report = sync_mailbox(
            &source,
            &store,
            IngestOptions {
                replace_existing: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(report.cleared, 1);
        assert_eq!(report.stored, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn listing_failure_is_fatal() {
        let source = FakeSource {
            pages: HashMap::new(),
        };
        let store = MemoryStore::new();
        let err = sync_mailbox(&source, &store, IngestOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Listing(ServiceError::Rejected(_))));
    }
}
