// OAuth token lifecycle for the Gmail account.
//
// Preference order on every request: reuse the stored token, refresh it, and
// only as a last resort open the browser consent flow. Whatever comes out of
// a refresh or a new authorization is written back through the `TokenStore`
// before it is handed to the caller.
//
// The manager assumes it is the only writer of the token file. Two processes
// sharing one token path can race between refresh and write.

use super::credential_models::{
    ClientSecrets, CredentialRecord, CredentialState, HealthReport, HealthStatus,
    GMAIL_READONLY_SCOPE,
};
use super::credential_store::{TokenStore, TokenStoreError};
use super::oauth_provider::{OAuthError, OAuthProvider};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error(
        "Credentials file not found: {}\n\
         Download credentials.json from Google Cloud Console:\n\
         1. Go to https://console.cloud.google.com/apis/credentials\n\
         2. Create OAuth 2.0 Client ID (Desktop app)\n\
         3. Download JSON and save as credentials.json",
        .path.display()
    )]
    MissingCredentialsFile { path: PathBuf },
    #[error("Invalid OAuth client file {}: {reason}", .path.display())]
    InvalidClientSecrets { path: PathBuf, reason: String },
    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[source] OAuthError),
    #[error("Authorization flow failed: {0}")]
    AuthorizationFailed(#[source] OAuthError),
    #[error("Token storage error: {0}")]
    Store(#[from] TokenStoreError),
}

/// Anything that can hand out a currently valid Gmail credential.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn credentials(&self) -> Result<CredentialRecord, TokenError>;
}

pub struct TokenManager<S: TokenStore, P: OAuthProvider> {
    credentials_path: PathBuf,
    store: S,
    provider: P,
    default_scopes: Vec<String>,
}

impl<S: TokenStore, P: OAuthProvider> TokenManager<S, P> {
    /// `credentials_path` is the OAuth client file from the Cloud Console. It
    /// is read on demand, so a missing file only fails Gmail operations.
    pub fn new(credentials_path: impl Into<PathBuf>, store: S, provider: P) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            store,
            provider,
            default_scopes: vec![GMAIL_READONLY_SCOPE.to_string()],
        }
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    /// Returns a valid credential for `scopes` (read-only Gmail when `None`).
    ///
    /// Fails with [`TokenError::MissingCredentialsFile`] when the OAuth client
    /// file is absent. A stored token that is corrupt, lacks the requested
    /// scopes, or cannot be refreshed sends the user through the browser flow.
    pub async fn get_credentials(
        &self,
        scopes: Option<&[String]>,
    ) -> Result<CredentialRecord, TokenError> {
        let secrets = self.load_client_secrets().await?;
        let scopes = scopes.unwrap_or(self.default_scopes.as_slice());

        if let Some(mut record) = self.load_stored_record(scopes).await? {
            if record.expiry.is_none() {
                record.expiry = Some(self.derive_expiry(&record).await);
            }

            match record.state_at(Utc::now()) {
                CredentialState::Valid => {
                    tracing::debug!("Reusing stored Gmail token");
                    return Ok(record);
                }
                CredentialState::Refreshable => {
                    tracing::info!("Token expired, refreshing...");
                    match self.provider.refresh(&record).await {
                        Ok(refreshed) => {
                            record.apply_refresh(refreshed);
                            self.store.save(&record).await?;
                            tracing::info!("Token refreshed successfully");
                            return Ok(record);
                        }
                        Err(OAuthError::InvalidGrant(reason)) => {
                            tracing::warn!(
                                %reason,
                                "Refresh token was rejected, falling back to browser authorization"
                            );
                        }
                        Err(err) => return Err(TokenError::RefreshFailed(err)),
                    }
                }
                CredentialState::Unrecoverable => {
                    tracing::info!("Token expired and no refresh token is stored");
                }
            }
        }

        tracing::info!("No valid token found, starting OAuth flow...");
        let record = self
            .provider
            .authorize_interactively(&secrets, scopes)
            .await
            .map_err(TokenError::AuthorizationFailed)?;
        self.store.save(&record).await?;
        tracing::info!("OAuth flow completed successfully");

        Ok(record)
    }

    /// Reports whether usable credentials can be produced right now.
    ///
    /// This goes through [`get_credentials`](Self::get_credentials), so it may
    /// refresh and rewrite the token file, and with no usable token it opens
    /// the browser flow and waits for the user. Only call it where that is
    /// acceptable (the `check-token` command, not a periodic probe).
    pub async fn health_check(&self) -> HealthReport {
        let status = match self.get_credentials(None).await {
            Ok(_) => HealthStatus::Valid,
            Err(TokenError::MissingCredentialsFile { path }) => HealthStatus::NotFound(path),
            Err(TokenError::RefreshFailed(err)) => HealthStatus::Expired(err.to_string()),
            Err(err) => HealthStatus::Error(err.to_string()),
        };

        HealthReport::from_status(status)
    }

    async fn load_client_secrets(&self) -> Result<ClientSecrets, TokenError> {
        let raw = match tokio::fs::read_to_string(&self.credentials_path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(TokenError::MissingCredentialsFile {
                    path: self.credentials_path.clone(),
                });
            }
            Err(err) => {
                return Err(TokenError::InvalidClientSecrets {
                    path: self.credentials_path.clone(),
                    reason: err.to_string(),
                });
            }
        };

        ClientSecrets::from_json(&raw).map_err(|reason| TokenError::InvalidClientSecrets {
            path: self.credentials_path.clone(),
            reason,
        })
    }

    async fn load_stored_record(
        &self,
        scopes: &[String],
    ) -> Result<Option<CredentialRecord>, TokenError> {
        match self.store.load().await {
            Ok(Some(record)) if record.covers_scopes(scopes) => Ok(Some(record)),
            Ok(Some(_)) => {
                tracing::info!("Stored token does not cover the requested scopes");
                Ok(None)
            }
            Ok(None) => Ok(None),
            Err(TokenStoreError::Corrupt(err)) => {
                tracing::warn!(
                    error = %err,
                    "Token file is corrupt, ignoring it. Delete it to silence this warning."
                );
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Tokens on disk carry no expiry, so ask the server. Anything short of a
    /// definite answer is treated as "expired now".
    async fn derive_expiry(&self, record: &CredentialRecord) -> DateTime<Utc> {
        match self.provider.introspect(record).await {
            Ok(Some(expiry)) => expiry,
            Ok(None) => {
                tracing::debug!("Stored access token is no longer accepted");
                Utc::now()
            }
            Err(err) => {
                tracing::warn!(error = %err, "Token introspection failed, treating token as expired");
                Utc::now()
            }
        }
    }
}

#[async_trait]
impl<S: TokenStore, P: OAuthProvider> CredentialSource for TokenManager<S, P> {
    async fn credentials(&self) -> Result<CredentialRecord, TokenError> {
        self.get_credentials(None).await
    }
}
