// Command line surface of the binary.
//
// With no subcommand the bot starts. The other subcommands are maintenance
// checks that print a short report and exit.

use crate::core::config::{AppConfig, GmailSettings};
use crate::core::credentials::TokenError;
use crate::core::inbox::GmailError;
use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serenity::http::{Http, HttpError};

/// Personal-Claw: a private Discord bot for your Gmail inbox
#[derive(Parser, Debug)]
#[command(name = "personal-claw", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Start the Discord bot (default)
    Run,
    /// Validate the stored Gmail token, refreshing it if needed
    CheckToken,
    /// Validate DISCORD_BOT_TOKEN against the Discord API
    CheckDiscord,
    /// Fetch the inbox summary end to end
    TestGmail,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Run)
    }
}

pub async fn check_token() -> anyhow::Result<()> {
    println!("=== Gmail Token Check ===\n");

    let settings = GmailSettings::from_env();
    let token_manager = crate::build_token_manager(&settings)?;

    let report = token_manager.health_check().await;
    if report.valid {
        println!("✓ {}", report.message());
        println!("Token: {}", settings.token_path.display());
        return Ok(());
    }

    println!("✗ {}", report.message());
    println!(
        "If this is unexpected, delete {} and re-authorize with `personal-claw check-token`.",
        settings.token_path.display()
    );
    Ok(())
}

pub async fn check_discord() -> anyhow::Result<()> {
    println!("=== Discord Token Check ===\n");

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let http = Http::new(&config.discord_bot_token);

    match http.get_current_user().await {
        Ok(user) => println!("✓ Discord token valid: {} ({})", user.name, user.id),
        Err(serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)))
            if resp.status_code.as_u16() == 401 =>
        {
            println!("✗ Invalid Discord token");
        }
        Err(e) => println!("✗ Discord token check failed: {e}"),
    }

    Ok(())
}

pub async fn test_gmail() -> anyhow::Result<()> {
    println!("=== Gmail Connection Test ===\n");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            println!("✗ Failed to load configuration: {e}");
            return Ok(());
        }
    };
    println!("✓ Configuration loaded");
    println!("  Credentials: {}", config.gmail.credentials_path.display());
    println!("  Token: {}\n", config.gmail.token_path.display());

    let client = match crate::build_gmail_client(&config.gmail) {
        Ok(client) => client,
        Err(e) => {
            println!("✗ Failed to create Gmail client: {e:#}");
            return Ok(());
        }
    };
    println!("✓ Gmail client created\n");

    println!("Testing Gmail connection...");
    println!("(This may open a browser window for OAuth authorization)\n");

    match client.get_inbox_summary().await {
        Ok(summary) => {
            println!("✓ Gmail connection successful!\n");
            println!("Inbox summary:");
            println!("  Messages fetched: {}", summary.message_count);
            if summary.skipped > 0 {
                println!("  Messages skipped: {}", summary.skipped);
            }
            println!();

            if summary.messages.is_empty() {
                println!("  No messages found (inbox may be empty)");
            } else {
                println!("Recent messages:");
                for (i, msg) in summary.messages.iter().enumerate() {
                    println!("  {}. From: {}", i + 1, msg.from);
                    println!("     Subject: {}", msg.subject);
                    println!("     ID: {}\n", msg.id);
                }
            }

            println!("\n✓ All tests passed!");
            println!("Token saved to: {}", config.gmail.token_path.display());
            println!("Future runs will use saved token (no browser required)");
        }
        Err(GmailError::Credentials(err @ TokenError::MissingCredentialsFile { .. })) => {
            println!("✗ {err}\n");
            println!("Setup instructions:");
            println!("1. Go to https://console.cloud.google.com/apis/credentials");
            println!("2. Create OAuth 2.0 Client ID (Desktop app)");
            println!("3. Download JSON and save as credentials.json");
            println!("4. Enable Gmail API for your project");
        }
        Err(e) => {
            println!("\n✗ Gmail connection failed: {e}");
            println!("\nTroubleshooting:");
            println!("1. Ensure Gmail API is enabled in Google Cloud Console");
            println!("2. Check credentials.json is valid");
            println!("3. Verify OAuth consent screen is configured");
            println!("4. If token.json exists, try deleting it and re-authorizing");
        }
    }

    Ok(())
}
