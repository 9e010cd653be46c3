// Gmail access for the rest of the bot.
//
// This layer shapes requests and flattens responses. The HTTP work happens
// behind `MailApi`, and credentials come from a `CredentialSource`
// (the token manager in production).

use super::inbox_models::{GmailMessage, InboxSummary, MessageFormat, MessageRef};
use crate::core::credentials::{CredentialRecord, CredentialSource, TokenError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

/// How many recent messages the inbox summary looks at.
pub const INBOX_SUMMARY_LIMIT: u32 = 5;

#[derive(Debug, Error)]
pub enum GmailError {
    #[error("Gmail API returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Gmail request failed: {0}")]
    Transport(String),
    #[error("Unexpected Gmail response: {0}")]
    Decode(String),
    #[error("Gmail credentials unavailable: {0}")]
    Credentials(#[from] TokenError),
}

impl GmailError {
    /// Errors that are worth "try again in a moment".
    pub fn is_transient(&self) -> bool {
        matches!(self, GmailError::Api { .. } | GmailError::Transport(_))
    }
}

/// The Gmail REST calls this bot needs.
#[async_trait]
pub trait MailApi: Send + Sync {
    async fn list_messages(
        &self,
        access_token: &str,
        max_results: u32,
        query: &str,
    ) -> Result<Vec<MessageRef>, GmailError>;

    async fn get_message(
        &self,
        access_token: &str,
        message_id: &str,
        format: MessageFormat,
    ) -> Result<GmailMessage, GmailError>;
}

/// What the orchestrator needs from a mailbox.
#[async_trait]
pub trait InboxSource: Send + Sync {
    async fn inbox_summary(&self) -> Result<InboxSummary, GmailError>;
    async fn is_connected(&self) -> bool;
}

struct GmailConnection {
    credential: CredentialRecord,
    connected_at: DateTime<Utc>,
}

pub struct GmailClient<A: MailApi, C: CredentialSource> {
    api: A,
    credentials: C,
    connection: Mutex<Option<GmailConnection>>,
}

impl<A: MailApi, C: CredentialSource> GmailClient<A, C> {
    /// Nothing is fetched here. The first API call establishes the connection.
    pub fn new(api: A, credentials: C) -> Self {
        Self {
            api,
            credentials,
            connection: Mutex::new(None),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Returns an access token, connecting on first use. A cached credential
    /// that has since expired is swapped for a fresh one from the source.
    async fn ensure_connected(&self) -> Result<String, GmailError> {
        let mut connection = self.connection.lock().await;

        match connection.as_mut() {
            Some(conn) if !conn.credential.is_expired_at(Utc::now()) => {
                return Ok(conn.credential.token.clone());
            }
            Some(conn) => {
                tracing::debug!(
                    connected_at = %conn.connected_at,
                    "Cached Gmail credential expired, renewing"
                );
                conn.credential = self.credentials.credentials().await?;
                return Ok(conn.credential.token.clone());
            }
            None => {}
        }

        let credential = self.credentials.credentials().await?;
        let token = credential.token.clone();
        *connection = Some(GmailConnection {
            credential,
            connected_at: Utc::now(),
        });
        tracing::info!("Gmail service initialized");

        Ok(token)
    }

    /// Lists message IDs, newest first. An empty mailbox is an empty vector.
    pub async fn list_messages(
        &self,
        max_results: u32,
        query: &str,
    ) -> Result<Vec<MessageRef>, GmailError> {
        let token = self.ensure_connected().await?;

        match self.api.list_messages(&token, max_results, query).await {
            Ok(messages) => {
                tracing::debug!("Listed {} messages", messages.len());
                Ok(messages)
            }
            Err(err) => {
                tracing::error!(error = %err, "Gmail API error listing messages");
                Err(err)
            }
        }
    }

    pub async fn get_message(
        &self,
        message_id: &str,
        format: MessageFormat,
    ) -> Result<GmailMessage, GmailError> {
        let token = self.ensure_connected().await?;

        match self.api.get_message(&token, message_id, format).await {
            Ok(message) => {
                tracing::debug!(message_id, "Retrieved message");
                Ok(message)
            }
            Err(err) => {
                tracing::error!(message_id, error = %err, "Gmail API error getting message");
                Err(err)
            }
        }
    }

    /// Subject and sender of the most recent messages.
    ///
    /// A message whose metadata cannot be fetched is skipped. A failed listing
    /// call fails the whole summary.
    pub async fn get_inbox_summary(&self) -> Result<InboxSummary, GmailError> {
        let listed = self.list_messages(INBOX_SUMMARY_LIMIT, "").await?;

        let mut summary = InboxSummary::default();
        for message_ref in &listed {
            match self
                .get_message(&message_ref.id, MessageFormat::Metadata)
                .await
            {
                Ok(message) => summary.messages.push(message.summarize()),
                Err(err) => {
                    tracing::warn!(
                        message_id = %message_ref.id,
                        error = %err,
                        "Skipping message in inbox summary"
                    );
                    summary.skipped += 1;
                }
            }
        }
        summary.message_count = summary.messages.len();

        Ok(summary)
    }
}

#[async_trait]
impl<A: MailApi, C: CredentialSource> InboxSource for GmailClient<A, C> {
    async fn inbox_summary(&self) -> Result<InboxSummary, GmailError> {
        self.get_inbox_summary().await
    }

    async fn is_connected(&self) -> bool {
        GmailClient::is_connected(self).await
    }
}
