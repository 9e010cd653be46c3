use crate::core::credentials::{CredentialRecord, TokenStore, TokenStoreError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Keeps the credential record in a single pretty-printed JSON file
/// (`token.json` by default).
pub struct JsonTokenStore {
    path: PathBuf,
}

impl JsonTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "token.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl TokenStore for JsonTokenStore {
    async fn load(&self) -> Result<Option<CredentialRecord>, TokenStoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record = serde_json::from_str(&raw).map_err(TokenStoreError::Corrupt)?;
        Ok(Some(record))
    }

    /// Writes to a sibling temp file first and renames it into place, so a
    /// crash mid-write never leaves a truncated token file behind.
    async fn save(&self, record: &CredentialRecord) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json =
            serde_json::to_string_pretty(record).map_err(TokenStoreError::Serialization)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, json).await?;

        // The file holds a refresh token. Keep it owner-only.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).await?;
        }

        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::info!(path = %self.path.display(), "Token saved");

        Ok(())
    }
}
