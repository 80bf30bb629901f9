use super::*;

/// Pause the current track
#[poise::command(prefix_command, slash_command, guild_only, category = "Music")]
pub async fn pause(ctx: Context<'_>) -> CommandResult {
    let result = match guild_session(ctx) {
        Ok(session) => session.pause().await,
        Err(err) => Err(err),
    };
    respond(ctx, result.map(|entry| embedded_messages::paused(&entry))).await
}
