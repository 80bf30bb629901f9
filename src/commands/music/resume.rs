use super::*;

/// Resume the paused track
#[poise::command(prefix_command, slash_command, guild_only, category = "Music")]
pub async fn resume(ctx: Context<'_>) -> CommandResult {
    let result = match guild_session(ctx) {
        Ok(session) => session.resume().await,
        Err(err) => Err(err),
    };
    respond(ctx, result.map(|entry| embedded_messages::resumed(&entry))).await
}
