use crate::discord::{Context, Error};
use std::time::Duration;

/// Check the bot's Gmail and Discord connections.
#[poise::command(slash_command)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    // The first Gmail call may sit in the browser authorization flow.
    ctx.defer().await?;

    let claw = &ctx.data().claw;
    let count = claw.get_message_count().await;
    let gmail_connected = claw.gmail_connected().await;
    let latency = ctx.ping().await;

    ctx.say(render_status(count, gmail_connected, latency)).await?;
    Ok(())
}

/// The command only runs once the gateway has delivered the interaction, so
/// Discord is always reported as connected. A zero latency means no heartbeat
/// has been acknowledged yet.
pub fn render_status(message_count: usize, gmail_connected: bool, latency: Duration) -> String {
    let gmail = if gmail_connected {
        "✅ Connected"
    } else {
        "❌ Disconnected"
    };
    let discord = if latency.is_zero() {
        "✅ Connected".to_string()
    } else {
        format!("✅ Connected ({} ms)", latency.as_millis())
    };

    format!(
        "📬 Status:\n\
         📬 Messages: {message_count}\n\
         📬 Gmail: {gmail}\n\
         📬 Discord: {discord}\n\
         📬 All systems operational"
    )
}
