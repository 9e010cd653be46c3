pub mod gmail_client;
pub mod inbox_models;

pub use gmail_client::{GmailClient, GmailError, InboxSource, MailApi};
pub use inbox_models::{GmailMessage, InboxSummary, MessageFormat, MessageRef};
