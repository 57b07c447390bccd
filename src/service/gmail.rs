//! Gmail REST client.
//!
//! Rule actions become label edits through `users.messages.modify`;
//! ingestion walks `users.messages.list` and reads each message with
//! `format=metadata`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{MailService, MailSource, MessagePage};
use crate::config::GmailConfig;
use crate::error::{ConfigError, ServiceError};
use crate::rules::{Destination, EmailRecord};

const LABEL_UNREAD: &str = "UNREAD";
const LABEL_INBOX: &str = "INBOX";
const LABEL_TRASH: &str = "TRASH";

/// Gmail API message list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

/// Gmail API message in `metadata` format.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    internal_date: Option<String>,
    payload: Option<GmailPayload>,
}

#[derive(Debug, Deserialize)]
struct GmailPayload {
    #[serde(default)]
    headers: Vec<GmailHeader>,
}

#[derive(Debug, Deserialize)]
struct GmailHeader {
    name: String,
    value: String,
}

/// Gmail modify request body.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    add_label_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    remove_label_ids: Vec<String>,
}

impl ModifyRequest {
    fn read_state(read: bool) -> Self {
        if read {
            Self {
                remove_label_ids: vec![LABEL_UNREAD.to_string()],
                ..Default::default()
            }
        } else {
            Self {
                add_label_ids: vec![LABEL_UNREAD.to_string()],
                ..Default::default()
            }
        }
    }

    /// Both label edits go out in one call so a move is never half-applied
    /// by this client.
    fn move_to(destination: Destination) -> Self {
        let (add, remove) = match destination {
            Destination::Inbox => (LABEL_INBOX, LABEL_TRASH),
            Destination::Trash => (LABEL_TRASH, LABEL_INBOX),
        };
        Self {
            add_label_ids: vec![add.to_string()],
            remove_label_ids: vec![remove.to_string()],
        }
    }
}

/// Authenticated Gmail client for a single mailbox.
pub struct GmailClient {
    client: reqwest::Client,
    api_base: String,
    access_token: SecretString,
}

impl GmailClient {
    pub fn new(config: &GmailConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "GMAIL_REQUEST_TIMEOUT_SECS".to_string(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.api_base, endpoint)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ServiceError> {
        let response = self
            .client
            .get(self.url(endpoint))
            .bearer_auth(self.access_token.expose_secret())
            .query(query)
            .send()
            .await
            .map_err(|e| ServiceError::Transient(e.to_string()))?;

        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ServiceError::Rejected(format!("parse response: {e}")))
    }

    async fn modify(&self, message_id: &str, body: &ModifyRequest) -> Result<(), ServiceError> {
        debug!(message_id, ?body, "Modifying message labels");
        let response = self
            .client
            .post(self.url(&format!("/messages/{message_id}/modify")))
            .bearer_auth(self.access_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::Transient(e.to_string()))?;

        check_status(response).await.map(|_| ())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(map_status(status, body))
}

/// Map a non-success HTTP status to a service error.
fn map_status(status: StatusCode, body: String) -> ServiceError {
    match status.as_u16() {
        401 | 403 => ServiceError::Unauthorized(body),
        404 => ServiceError::NotFound(body),
        429 => ServiceError::Transient(format!("rate limited: {body}")),
        s if status.is_server_error() => ServiceError::Transient(format!("API error ({s}): {body}")),
        s => ServiceError::Rejected(format!("API error ({s}): {body}")),
    }
}

fn header<'a>(headers: &'a [GmailHeader], name: &str) -> &'a str {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
        .unwrap_or("")
}

fn record_from_metadata(message: GmailMessage) -> Result<EmailRecord, ServiceError> {
    let raw_date = message.internal_date.as_deref().ok_or_else(|| {
        ServiceError::Rejected(format!("message {} has no internalDate", message.id))
    })?;
    let received_at = raw_date
        .parse::<i64>()
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .ok_or_else(|| {
            ServiceError::Rejected(format!(
                "message {} has invalid internalDate '{raw_date}'",
                message.id
            ))
        })?;

    let headers = message
        .payload
        .as_ref()
        .map(|p| p.headers.as_slice())
        .unwrap_or(&[]);

    Ok(EmailRecord {
        sender: header(headers, "From").to_string(),
        recipient: header(headers, "To").to_string(),
        subject: header(headers, "Subject").to_string(),
        received_at,
        message_id: message.id,
    })
}

#[async_trait]
impl MailService for GmailClient {
    async fn set_read(&self, message_id: &str, read: bool) -> Result<(), ServiceError> {
        self.modify(message_id, &ModifyRequest::read_state(read)).await
    }

    async fn move_to(
        &self,
        message_id: &str,
        destination: Destination,
    ) -> Result<(), ServiceError> {
        self.modify(message_id, &ModifyRequest::move_to(destination))
            .await
    }
}

#[async_trait]
impl MailSource for GmailClient {
    async fn list_messages(&self, page_token: Option<&str>) -> Result<MessagePage, ServiceError> {
        let mut query = Vec::new();
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }
        let response: MessageListResponse = self.get_json("/messages", &query).await?;
        Ok(MessagePage {
            message_ids: response.messages.into_iter().map(|m| m.id).collect(),
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn fetch_record(&self, message_id: &str) -> Result<EmailRecord, ServiceError> {
        let message: GmailMessage = self
            .get_json(
                &format!("/messages/{message_id}"),
                &[
                    ("format", "metadata"),
                    ("metadataHeaders", "From"),
                    ("metadataHeaders", "To"),
                    ("metadataHeaders", "Subject"),
                ],
            )
            .await?;
        record_from_metadata(message)
    }
}
