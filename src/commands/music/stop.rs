use super::*;

/// Stop the music, clear the queue, and leave the voice channel
#[poise::command(prefix_command, slash_command, guild_only, category = "Music")]
pub async fn stop(ctx: Context<'_>) -> CommandResult {
    let Some(guild_id) = ctx.guild_id() else {
        return reply_error(ctx, &MusicError::NotInGuild).await;
    };

    let result = ctx.data().sessions.stop(guild_id).await;
    respond(
        ctx,
        result.map(|()| CreateReply::default().embed(embedded_messages::stopped())),
    )
    .await
}
