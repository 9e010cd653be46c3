use super::credential_models::{ClientSecrets, CredentialRecord, RefreshedToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// The token endpoint refused the grant (revoked or expired refresh token,
    /// reused authorization code).
    #[error("OAuth grant rejected: {0}")]
    InvalidGrant(String),
    #[error("OAuth endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },
    #[error("OAuth HTTP error: {0}")]
    Http(String),
    #[error("OAuth callback error: {0}")]
    Callback(String),
    #[error("OAuth state mismatch in browser callback")]
    StateMismatch,
    #[error("Timed out waiting for browser authorization")]
    Timeout,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The network half of the credential lifecycle.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Asks the authorization server how long `record.token` stays valid.
    /// `Ok(None)` means the token is no longer accepted.
    async fn introspect(
        &self,
        record: &CredentialRecord,
    ) -> Result<Option<DateTime<Utc>>, OAuthError>;

    /// Trades the record's refresh token for a new access token.
    async fn refresh(&self, record: &CredentialRecord) -> Result<RefreshedToken, OAuthError>;

    /// Runs the browser consent flow and returns a brand-new record. Blocks
    /// until the user finishes or the flow times out.
    async fn authorize_interactively(
        &self,
        secrets: &ClientSecrets,
        scopes: &[String],
    ) -> Result<CredentialRecord, OAuthError>;
}
