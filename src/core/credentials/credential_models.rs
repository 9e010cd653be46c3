use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Read-only Gmail access. The bot never sends or modifies mail.
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

pub const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to their expiry are treated as already expired so a
/// request never leaves with a token that dies in flight.
pub const EXPIRY_SKEW_SECS: i64 = 60;

/// Persisted OAuth state for the Gmail account.
///
/// Exactly six fields are written to disk. `expiry` lives in memory only and
/// is filled in from a token response or from introspection.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(skip)]
    pub expiry: Option<DateTime<Utc>>,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Where a credential sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Access token still usable.
    Valid,
    /// Expired, but a refresh token can mint a new access token.
    Refreshable,
    /// Expired with no way back short of a new browser authorization.
    Unrecoverable,
}

impl CredentialRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now >= expiry - Duration::seconds(EXPIRY_SKEW_SECS),
            None => false,
        }
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> CredentialState {
        if !self.is_expired_at(now) {
            CredentialState::Valid
        } else if self.refresh_token.is_some() {
            CredentialState::Refreshable
        } else {
            CredentialState::Unrecoverable
        }
    }

    /// True when every requested scope was granted to this record.
    pub fn covers_scopes(&self, requested: &[String]) -> bool {
        requested.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Folds a refresh response into the record. Google usually omits the
    /// refresh token on refresh, in which case the old one is kept.
    pub fn apply_refresh(&mut self, refreshed: RefreshedToken) {
        self.token = refreshed.access_token;
        self.expiry = refreshed.expiry;
        if let Some(refresh_token) = refreshed.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        if let Some(scopes) = refreshed.scopes {
            self.scopes = scopes;
        }
    }
}

/// Result of a successful refresh-token grant.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expiry: Option<DateTime<Utc>>,
    pub refresh_token: Option<String>,
    pub scopes: Option<Vec<String>>,
}

impl fmt::Debug for RefreshedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshedToken")
            .field("expiry", &self.expiry)
            .field("rotated_refresh_token", &self.refresh_token.is_some())
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// OAuth client identity from the Google Cloud Console download.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ClientSecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecrets")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_uri", &self.auth_uri)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The console wraps the secrets in either an `installed` (desktop app) or a
/// `web` object.
#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn from_json(json: &str) -> Result<Self, String> {
        let file: ClientSecretsFile = serde_json::from_str(json).map_err(|e| e.to_string())?;
        file.installed
            .or(file.web)
            .ok_or_else(|| "expected an \"installed\" or \"web\" client section".to_string())
    }
}

/// Why a health check came out the way it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Valid,
    NotFound(PathBuf),
    Expired(String),
    Error(String),
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Valid => write!(f, "Token valid"),
            HealthStatus::NotFound(path) => {
                write!(f, "Credentials file not found: {}", path.display())
            }
            HealthStatus::Expired(reason) => {
                write!(f, "Token expired and could not be refreshed: {}", reason)
            }
            HealthStatus::Error(reason) => write!(f, "Health check error: {}", reason),
        }
    }
}

/// Outcome of `TokenManager::health_check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub valid: bool,
    pub status: HealthStatus,
}

impl HealthReport {
    pub fn from_status(status: HealthStatus) -> Self {
        Self {
            valid: status == HealthStatus::Valid,
            status,
        }
    }

    pub fn message(&self) -> String {
        self.status.to_string()
    }
}
