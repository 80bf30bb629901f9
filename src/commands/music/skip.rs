use super::*;

/// Skip the currently playing song
#[poise::command(prefix_command, slash_command, guild_only, category = "Music")]
pub async fn skip(ctx: Context<'_>) -> CommandResult {
    let result = match guild_session(ctx) {
        Ok(session) => session.skip().await,
        Err(err) => Err(err),
    };
    respond(
        ctx,
        result.map(|entry| CreateReply::default().embed(embedded_messages::skipped(&entry))),
    )
    .await
}
