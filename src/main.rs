// This is the entry point of Personal-Claw.
//
// **Architecture Overview:**
// - `core/` = Business logic (config, allowlist, tokens, Gmail, replies)
// - `infra/` = Implementations of core traits (token file, Google APIs)
// - `discord/` = Discord-specific adapters (commands, checks, presence)
// - `cli/` = Maintenance subcommands
//
// This file's job is to:
// 1. Parse the command line and load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "cli/cli_commands.rs"]
mod cli;
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::cli::{Cli, Commands};
use crate::core::access::Allowlist;
use crate::core::claw::PersonalClaw;
use crate::core::config::{AppConfig, GmailSettings};
use crate::core::credentials::TokenManager;
use crate::core::inbox::GmailClient;
use crate::discord::commands::{presence, ClawGmailClient, ClawTokenManager};
use crate::discord::Data;
use crate::infra::gmail::GmailApiClient;
use crate::infra::google_oauth::GoogleOAuthClient;
use crate::infra::token_store::JsonTokenStore;
use anyhow::Context as _;
use clap::Parser;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub(crate) fn build_token_manager(settings: &GmailSettings) -> anyhow::Result<ClawTokenManager> {
    let store = JsonTokenStore::new(&settings.token_path);
    let oauth = GoogleOAuthClient::new().context("Failed to create OAuth HTTP client")?;
    Ok(TokenManager::new(&settings.credentials_path, store, oauth))
}

/// Nothing here touches the network. Gmail connects on first use.
pub(crate) fn build_gmail_client(settings: &GmailSettings) -> anyhow::Result<ClawGmailClient> {
    let api = GmailApiClient::new().context("Failed to create Gmail HTTP client")?;
    Ok(GmailClient::new(api, build_token_manager(settings)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists) so RUST_LOG
    // can live there too
    dotenv::dotenv().ok();

    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Cli::parse();

    match args.command() {
        Commands::Run => run_bot().await,
        Commands::CheckToken => cli::check_token().await,
        Commands::CheckDiscord => cli::check_discord().await,
        Commands::TestGmail => cli::test_gmail().await,
    }
}

async fn run_bot() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Invalid configuration")?;
    println!(
        "Starting bot with allowlisted user ID: {}",
        config.discord_allowlisted_user_id
    );

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let gmail_client = build_gmail_client(&config.gmail)?;
    let claw = Arc::new(PersonalClaw::new(gmail_client));
    let allowlist = Allowlist::new(config.discord_allowlisted_user_id);

    let data = Data { claw, allowlist };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    // Slash commands need no privileged intents.
    let intents = serenity::GatewayIntents::non_privileged();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: discord::commands::all(),
            // Every command goes through the allowlist first
            command_check: Some(|ctx| Box::pin(discord::access::allowlist_check(ctx))),
            on_error: |error| Box::pin(discord::access::on_error(error)),
            pre_command: |ctx| {
                Box::pin(async move {
                    tracing::info!(
                        command = %ctx.command().qualified_name,
                        user_id = ctx.author().id.get(),
                        "Running command"
                    );
                })
            },
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                println!("🤖 Bot is starting up...");

                // Register slash commands globally (can take up to an hour to propagate)
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                println!("✅ Commands registered!");
                println!("✅ Bot connected as {}", ready.user.name);
                println!(
                    "📬 Status: Responding to commands from user {} only",
                    data.allowlist.allowed_user_id()
                );
                presence::on_ready(ctx);
                println!("🎯 Bot is online and ready!");

                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.discord_bot_token, intents)
        .framework(framework)
        .await
        .context("Error creating Discord client")?;

    client.start().await.context("Error running bot")?;
    Ok(())
}
