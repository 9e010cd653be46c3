// Bot presence. Kept to Discord SDK types only.

use poise::serenity_prelude as serenity;

/// Shows "Watching your inbox" under the bot's name.
pub fn on_ready(ctx: &serenity::Context) {
    let activity = serenity::ActivityData::watching("your inbox");
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}
