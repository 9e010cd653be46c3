// Discord commands module.
// Each command gets its own file. Shared state lives in `Data`.

pub mod inbox;
pub mod ping;
pub mod presence;
pub mod status;

use crate::core::access::Allowlist;
use crate::core::claw::PersonalClaw;
use crate::core::credentials::TokenManager;
use crate::core::inbox::GmailClient;
use crate::infra::gmail::GmailApiClient;
use crate::infra::google_oauth::GoogleOAuthClient;
use crate::infra::token_store::JsonTokenStore;
use std::sync::Arc;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

pub type ClawTokenManager = TokenManager<JsonTokenStore, GoogleOAuthClient>;
pub type ClawGmailClient = GmailClient<GmailApiClient, ClawTokenManager>;
pub type Claw = PersonalClaw<ClawGmailClient>;

/// Shared across every command invocation.
pub struct Data {
    pub claw: Arc<Claw>,
    pub allowlist: Allowlist,
}

/// Every slash command the bot registers.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    vec![ping::ping(), status::status(), inbox::check_inbox()]
}
