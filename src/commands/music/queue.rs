use super::*;
use utils::session::SessionSnapshot;

/// Show the current queue
#[poise::command(prefix_command, slash_command, guild_only, category = "Music")]
pub async fn queue(ctx: Context<'_>) -> CommandResult {
    let Some(guild_id) = ctx.guild_id() else {
        return reply_error(ctx, &MusicError::NotInGuild).await;
    };

    let snapshot = match ctx.data().sessions.get(guild_id) {
        Some(session) => session.snapshot().await,
        None => Ok(SessionSnapshot::idle(ctx.data().config.default_volume)),
    };
    respond(ctx, snapshot.map(|s| embedded_messages::music_queue(&s))).await
}
