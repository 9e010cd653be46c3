// Framework-level hooks: the global allowlist gate and error replies.

use crate::core::claw::ClawError;
use crate::discord::{Context, Data, Error};

pub const UNAUTHORIZED_REPLY: &str = "🚫 Sorry, this bot only answers its owner.";

/// Runs before every command. Returning `Ok(false)` stops the command and
/// hands poise a `CommandCheckFailed` error.
pub async fn allowlist_check(ctx: Context<'_>) -> Result<bool, Error> {
    Ok(ctx.data().allowlist.is_authorized(ctx.author().id.get()))
}

pub async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::CommandCheckFailed { ctx, .. } => {
            let reply = poise::CreateReply::default()
                .content(UNAUTHORIZED_REPLY)
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                tracing::warn!("Failed to send rejection message: {e}");
            }
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            tracing::error!(command = %ctx.command().name, "Command failed: {error}");
            if let Err(e) = ctx.say(ClawError::Unexpected.to_string()).await {
                tracing::warn!("Failed to send error reply: {e}");
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                tracing::error!("Error while handling error: {e}");
            }
        }
    }
}
