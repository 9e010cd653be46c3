// Application configuration.
//
// Everything is read from environment variables (after loading `.env` if one
// exists). Required values are validated eagerly so a misconfigured bot never
// gets as far as connecting to Discord.

use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_CREDENTIALS_PATH: &str = "credentials.json";
pub const DEFAULT_TOKEN_PATH: &str = "token.json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "Missing required environment variables: {}. Copy .env.example to .env and fill in required values.",
        .0.join(", ")
    )]
    Missing(Vec<&'static str>),
    #[error("DISCORD_ALLOWLISTED_USER_ID must be a valid unsigned integer, got: {0}")]
    InvalidUserId(String),
}

/// Where the Gmail OAuth files live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GmailSettings {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
}

impl GmailSettings {
    /// Loads only the Gmail paths. Used by the maintenance commands that never
    /// talk to Discord.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            credentials_path: non_empty("GMAIL_CREDENTIALS_PATH")
                .unwrap_or_else(|| DEFAULT_CREDENTIALS_PATH.to_string())
                .into(),
            token_path: non_empty("GMAIL_TOKEN_PATH")
                .unwrap_or_else(|| DEFAULT_TOKEN_PATH.to_string())
                .into(),
        }
    }
}

impl Default for GmailSettings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// Immutable settings for the whole bot process.
#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub discord_bot_token: String,
    pub discord_allowlisted_user_id: u64,
    pub gmail: GmailSettings,
}

// Hand-written so the bot token never ends up in a log line.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("discord_bot_token", &"<redacted>")
            .field(
                "discord_allowlisted_user_id",
                &self.discord_allowlisted_user_id,
            )
            .field("gmail", &self.gmail)
            .finish()
    }
}

impl AppConfig {
    /// Loads `.env` (if present) and then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Every missing required
    /// variable is reported at once rather than one per run.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("DISCORD_BOT_TOKEN").filter(|v| !v.trim().is_empty());
        let discord_user_id =
            lookup("DISCORD_ALLOWLISTED_USER_ID").filter(|v| !v.trim().is_empty());

        let mut missing = Vec::new();
        if discord_token.is_none() {
            missing.push("DISCORD_BOT_TOKEN");
        }
        if discord_user_id.is_none() {
            missing.push("DISCORD_ALLOWLISTED_USER_ID");
        }

        let (Some(discord_bot_token), Some(raw_user_id)) = (discord_token, discord_user_id) else {
            return Err(ConfigError::Missing(missing));
        };

        let discord_allowlisted_user_id = raw_user_id
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidUserId(raw_user_id.clone()))?;

        Ok(Self {
            discord_bot_token,
            discord_allowlisted_user_id,
            gmail: GmailSettings::from_lookup(&lookup),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn loads_required_values_and_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DISCORD_BOT_TOKEN", "bot-token"),
            ("DISCORD_ALLOWLISTED_USER_ID", "123456789"),
        ]))
        .unwrap();

        assert_eq!(config.discord_bot_token, "bot-token");
        assert_eq!(config.discord_allowlisted_user_id, 123456789);
        assert_eq!(config.gmail.credentials_path, PathBuf::from("credentials.json"));
        assert_eq!(config.gmail.token_path, PathBuf::from("token.json"));
    }

    #[test]
    fn optional_paths_override_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DISCORD_BOT_TOKEN", "bot-token"),
            ("DISCORD_ALLOWLISTED_USER_ID", "42"),
            ("GMAIL_CREDENTIALS_PATH", "secrets/client.json"),
            ("GMAIL_TOKEN_PATH", "data/token.json"),
        ]))
        .unwrap();

        assert_eq!(
            config.gmail.credentials_path,
            PathBuf::from("secrets/client.json")
        );
        assert_eq!(config.gmail.token_path, PathBuf::from("data/token.json"));
    }

    #[test]
    fn reports_every_missing_variable() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing(vec!["DISCORD_BOT_TOKEN", "DISCORD_ALLOWLISTED_USER_ID"])
        );
        assert!(err.to_string().contains("DISCORD_BOT_TOKEN, DISCORD_ALLOWLISTED_USER_ID"));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("DISCORD_BOT_TOKEN", "   "),
            ("DISCORD_ALLOWLISTED_USER_ID", "42"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing(vec!["DISCORD_BOT_TOKEN"]));
    }

    #[test]
    fn rejects_non_numeric_and_negative_user_ids() {
        for bad in ["not-a-number", "-5", "12.5"] {
            let err = AppConfig::from_lookup(lookup_from(&[
                ("DISCORD_BOT_TOKEN", "bot-token"),
                ("DISCORD_ALLOWLISTED_USER_ID", bad),
            ]))
            .unwrap_err();
            assert_eq!(err, ConfigError::InvalidUserId(bad.to_string()));
        }
    }

    #[test]
    fn debug_output_redacts_bot_token() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DISCORD_BOT_TOKEN", "super-secret"),
            ("DISCORD_ALLOWLISTED_USER_ID", "1"),
        ]))
        .unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
