// The bot's brain: turns inbox data into the replies users see.
//
// Errors from Gmail never reach the user raw. They are logged here and
// replaced with one of two fixed apologies.

use crate::core::inbox::{GmailError, InboxSource, InboxSummary};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClawError {
    #[error("❌ Sorry, I couldn't reach Gmail right now. Try again in a moment?")]
    GmailUnavailable,
    #[error("❌ Something went wrong. Let me know if this keeps happening.")]
    Unexpected,
}

impl From<&GmailError> for ClawError {
    fn from(err: &GmailError) -> Self {
        if err.is_transient() {
            ClawError::GmailUnavailable
        } else {
            ClawError::Unexpected
        }
    }
}

/// Headline for a message count.
pub fn format_inbox_count(count: usize) -> String {
    match count {
        0 => "📭 Your inbox is empty. Nice!".to_string(),
        1 => "📬 You have 1 message in your inbox".to_string(),
        n => format!("📬 You have {n} messages in your inbox"),
    }
}

pub struct PersonalClaw<I: InboxSource> {
    inbox: I,
}

impl<I: InboxSource> PersonalClaw<I> {
    pub fn new(inbox: I) -> Self {
        Self { inbox }
    }

    /// The full summary, with failures already mapped to user-facing errors.
    pub async fn inbox_report(&self) -> Result<InboxSummary, ClawError> {
        self.inbox.inbox_summary().await.map_err(|err| {
            tracing::error!(error = %err, "Failed to fetch inbox summary");
            ClawError::from(&err)
        })
    }

    /// The reply for a quick inbox check. Always returns something sendable.
    pub async fn check_inbox(&self) -> String {
        match self.inbox_report().await {
            Ok(summary) => format_inbox_count(summary.message_count),
            Err(err) => err.to_string(),
        }
    }

    pub async fn get_message_count(&self) -> usize {
        self.inbox_report()
            .await
            .map(|summary| summary.message_count)
            .unwrap_or(0)
    }

    pub async fn gmail_connected(&self) -> bool {
        self.inbox.is_connected().await
    }
}
