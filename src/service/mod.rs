//! Remote mailbox collaborators.
//!
//! [`MailService`] applies rule actions; [`MailSource`] lists and reads
//! messages for ingestion. Both are pure I/O with no rule logic. Retries
//! and token refresh are the implementor's business.

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::rules::{Destination, EmailRecord};

pub mod gmail;

pub use gmail::GmailClient;

/// Applies remote state changes to a single message.
#[async_trait]
pub trait MailService: Send + Sync {
    /// Mark a message read or unread. Setting the state it already has is
    /// not an error.
    async fn set_read(&self, message_id: &str, read: bool) -> Result<(), ServiceError>;

    /// Move a message to the inbox or the bin.
    async fn move_to(&self, message_id: &str, destination: Destination)
    -> Result<(), ServiceError>;
}

/// One page of message ids from a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub message_ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// Lists remote messages and reads their metadata.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Fetch one page of the mailbox listing. `None` starts from the top.
    async fn list_messages(&self, page_token: Option<&str>) -> Result<MessagePage, ServiceError>;

    /// Read sender, recipient, subject and received time for one message.
    async fn fetch_record(&self, message_id: &str) -> Result<EmailRecord, ServiceError>;
}
