use crate::discord::{Context, Error};

pub const PONG: &str = "Pong! You're authorized. 🎯";

/// Check that the bot is alive and that you are allowed to use it.
#[poise::command(slash_command)]
pub async fn ping(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say(PONG).await?;
    Ok(())
}
