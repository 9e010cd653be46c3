use super::credential_models::CredentialRecord;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The file exists but is not a credential record. Callers treat this as
    /// "no token" and re-authorize.
    #[error("Corrupt token file: {0}")]
    Corrupt(#[source] serde_json::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
}

/// Persistence for the single credential record.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    async fn load(&self) -> Result<Option<CredentialRecord>, TokenStoreError>;
    async fn save(&self, record: &CredentialRecord) -> Result<(), TokenStoreError>;
}
